/// The three leading tokens of a request line.
///
/// Missing tokens are left empty; nothing here validates HTTP syntax.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub target: String,
    pub version: String,
}

/// Splits the first line of `raw` on whitespace and keeps the first three
/// tokens. A request line split across several reads is not reassembled.
pub fn parse_request_line(raw: &[u8]) -> RequestLine {
    let text = String::from_utf8_lossy(raw);
    let first_line = text.lines().next().unwrap_or("");

    let mut parts = first_line.split_whitespace();
    let mut next = || parts.next().unwrap_or("").to_string();

    RequestLine {
        method: next(),
        target: next(),
        version: next(),
    }
}

/// Bare hostname of a request target: scheme, path and port stripped.
///
/// Returns a sub-slice of `target`, so the result can never outgrow it.
/// Malformed targets may yield an empty host.
pub fn extract_host(target: &str) -> &str {
    let rest = match target.find("://") {
        Some(idx) => &target[idx + 3..],
        None => target,
    };

    let rest = match rest.find('/') {
        Some(idx) => &rest[..idx],
        None => rest,
    };

    match rest.find(':') {
        Some(idx) => &rest[..idx],
        None => rest,
    }
}

/// A request as read from the client: the untouched bytes of the first read
/// plus the parsed request line.
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub line: RequestLine,
    raw: Vec<u8>,
}

impl ParsedRequest {
    pub fn from_raw(raw: Vec<u8>) -> Self {
        let line = parse_request_line(&raw);
        Self { line, raw }
    }

    pub fn target(&self) -> &str {
        &self.line.target
    }

    pub fn host(&self) -> &str {
        extract_host(&self.line.target)
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_line() {
        let line = parse_request_line(b"GET http://example.org/ HTTP/1.1\r\nHost: example.org\r\n\r\n");
        assert_eq!(line.method, "GET");
        assert_eq!(line.target, "http://example.org/");
        assert_eq!(line.version, "HTTP/1.1");
    }

    #[test]
    fn test_extra_tokens_ignored() {
        let line = parse_request_line(b"GET /a HTTP/1.1 trailing junk\r\n");
        assert_eq!(line.method, "GET");
        assert_eq!(line.target, "/a");
        assert_eq!(line.version, "HTTP/1.1");
    }

    #[test]
    fn test_missing_tokens_default_empty() {
        let line = parse_request_line(b"GET\r\nHost: example.org\r\n\r\n");
        assert_eq!(line.method, "GET");
        assert_eq!(line.target, "");
        assert_eq!(line.version, "");

        assert_eq!(parse_request_line(b""), RequestLine::default());
        assert_eq!(parse_request_line(b"   \r\n"), RequestLine::default());
    }

    #[test]
    fn test_non_utf8_does_not_panic() {
        let line = parse_request_line(&[0xff, 0xfe, b' ', b'/', b' ', b'X']);
        assert_eq!(line.target, "/");
        assert_eq!(line.version, "X");
    }

    #[test]
    fn test_extract_host() {
        assert_eq!(extract_host("http://example.com:8080/path"), "example.com");
        assert_eq!(extract_host("example.com/path"), "example.com");
        assert_eq!(extract_host("http://example.org/"), "example.org");
        assert_eq!(extract_host("https://a.b.c"), "a.b.c");
        assert_eq!(extract_host("example.com:443"), "example.com");
    }

    #[test]
    fn test_extract_host_idempotent() {
        assert_eq!(extract_host("example.com"), "example.com");
        let once = extract_host("http://example.com:81/x?y=1");
        assert_eq!(extract_host(once), once);
    }

    #[test]
    fn test_extract_host_malformed() {
        assert_eq!(extract_host(""), "");
        assert_eq!(extract_host("/index.html"), "");
        assert_eq!(extract_host("http://"), "");
        assert_eq!(extract_host(":80"), "");
    }

    #[test]
    fn test_parsed_request_keeps_raw_bytes() {
        let raw = b"POST http://example.org:80/form HTTP/1.0\r\n\r\nbody=1".to_vec();
        let request = ParsedRequest::from_raw(raw.clone());
        assert_eq!(request.raw(), raw.as_slice());
        assert_eq!(request.line.method, "POST");
        assert_eq!(request.target(), "http://example.org:80/form");
        assert_eq!(request.host(), "example.org");
    }
}
