//! Collection targets: a single domain or a file listing one domain per line.
//!
//! File targets keep their path so the local enumeration binary can run in
//! batch mode (`-dL`), while HTTP collectors iterate the parsed domain list.

use anyhow::{bail, Context, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::domain_utils;

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Domain(String),
    File { path: PathBuf, domains: Vec<String> },
}

impl Target {
    /// Resolve user input into a target. An existing file is read as a domain
    /// list; anything else must be a valid domain.
    pub fn resolve(input: &str) -> Result<Self> {
        let cleaned = input.trim().trim_matches('"').trim();
        if cleaned.is_empty() {
            bail!("Target cannot be empty");
        }

        let path = Path::new(cleaned);
        if path.is_file() {
            return Self::from_file(path);
        }

        let domain = domain_utils::normalize_candidate(cleaned);
        if !domain_utils::validate_domain(&domain) {
            bail!("Invalid domain or missing target file: {}", cleaned);
        }
        Ok(Target::Domain(domain))
    }

    /// Load a file target, skipping blank lines, `#` comments and invalid entries.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read target file: {}", path.display()))?;
        let domains = parse_domain_list(&content);
        if domains.is_empty() {
            bail!("Target file contains no valid domains: {}", path.display());
        }
        debug!("Loaded {} domains from {}", domains.len(), path.display());
        Ok(Target::File {
            path: path.to_path_buf(),
            domains,
        })
    }

    /// Root domains this target covers.
    pub fn domains(&self) -> &[String] {
        match self {
            Target::Domain(domain) => std::slice::from_ref(domain),
            Target::File { domains, .. } => domains,
        }
    }

    /// Normalize a raw provider name and keep it only if it is a valid
    /// hostname under one of the target's roots.
    pub fn accept(&self, raw: &str) -> Option<String> {
        let accepted = self
            .domains()
            .iter()
            .find_map(|root| domain_utils::accept_candidate(raw, root));
        if accepted.is_none() {
            debug!("Discarding out-of-scope or malformed name: {}", raw.trim());
        }
        accepted
    }

    /// Short label used in output file names and log lines.
    pub fn label(&self) -> String {
        match self {
            Target::Domain(domain) => domain.clone(),
            Target::File { path, .. } => path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "targets".to_string()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Domain(domain) => write!(f, "{}", domain),
            Target::File { path, domains } => {
                write!(f, "{} ({} domains)", path.display(), domains.len())
            }
        }
    }
}

/// Parse one domain per line. Duplicates are dropped, order is preserved.
pub fn parse_domain_list(content: &str) -> Vec<String> {
    let mut domains: Vec<String> = Vec::new();
    for line in content.lines() {
        let line = line.trim().trim_start_matches('\u{feff}');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let domain = domain_utils::normalize_candidate(line);
        if !domain_utils::validate_domain(&domain) {
            warn!("Skipping invalid domain in target file: {}", line);
            continue;
        }
        if !domains.contains(&domain) {
            domains.push(domain);
        }
    }
    domains
}
