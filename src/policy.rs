use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;
const BUFFER_SIZE: usize = 64 * 1024;

/// Read-only set of banned URL substrings.
///
/// Built once before the listener starts and shared behind an `Arc`; lookups
/// never lock.
#[derive(Debug, Default)]
pub struct PolicyStore {
    rules: Vec<String>,
}

impl PolicyStore {
    pub fn from_rules<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = rules
            .into_iter()
            .filter_map(|rule| parse_rule_line(rule.as_ref()))
            .collect();

        Self { rules }
    }

    /// Loads one rule per line. A missing file blocks nothing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No blacklist at {:?}, nothing will be blocked", path);
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read metadata for blacklist file: {:?}", path))
            }
        };

        if metadata.len() > MAX_FILE_SIZE {
            anyhow::bail!("blacklist file too large: {:?}", path);
        }

        let file = File::open(path)
            .with_context(|| format!("Failed to open blacklist file: {:?}", path))?;

        let reader = BufReader::with_capacity(BUFFER_SIZE, file);

        let mut rules = Vec::new();
        let mut raw_count = 0;

        for line in reader.lines() {
            let line = line.with_context(|| format!("Failed to read blacklist file: {:?}", path))?;
            raw_count += 1;

            if let Some(rule) = parse_rule_line(&line) {
                rules.push(rule);
            }
        }

        tracing::info!(
            "Loaded blacklist: {} active rules from {} lines",
            rules.len(),
            raw_count
        );

        Ok(Self { rules })
    }

    /// True iff any rule occurs literally (case-sensitive) inside `url`.
    pub fn is_forbidden(&self, url: &str) -> bool {
        self.rules.iter().any(|rule| url.contains(rule.as_str()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn parse_rule_line(line: &str) -> Option<String> {
    let rule = line.trim();
    if rule.is_empty() {
        return None;
    }
    Some(rule.to_string())
}
