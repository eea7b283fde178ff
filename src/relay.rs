use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const RELAY_CHUNK_SIZE: usize = 4096;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("forwarding request upstream failed: {0}")]
    Forward(#[source] io::Error),

    #[error("upstream read failed: {0}")]
    Upstream(#[source] io::Error),

    #[error("client write failed: {0}")]
    Client(#[source] io::Error),
}

/// Writes `initial` upstream verbatim, then copies upstream bytes to the
/// client one chunk at a time until upstream closes.
///
/// Returns the number of bytes delivered to the client. Any error on either
/// side ends the relay; nothing is retried.
pub async fn forward_and_relay<C, U>(
    client: &mut C,
    upstream: &mut U,
    initial: &[u8],
) -> Result<u64, RelayError>
where
    C: AsyncWrite + Unpin + ?Sized,
    U: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    upstream.write_all(initial).await.map_err(RelayError::Forward)?;
    upstream.flush().await.map_err(RelayError::Forward)?;

    let mut buf = vec![0u8; RELAY_CHUNK_SIZE];
    let mut relayed = 0u64;

    loop {
        let n = upstream.read(&mut buf).await.map_err(RelayError::Upstream)?;
        if n == 0 {
            break;
        }

        client.write_all(&buf[..n]).await.map_err(RelayError::Client)?;
        relayed += n as u64;
    }

    client.flush().await.map_err(RelayError::Client)?;

    Ok(relayed)
}
