//! Subdomain discovery using Project Discovery's subfinder tool.
//!
//! subfinder writes one hostname per line to the file given with `-o`. Only
//! the exit status and that file are consumed; stdout is logged at debug and
//! stderr at warn level.

use encoding_rs::GBK;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{CollectorError, SubdomainSet};
use crate::domain_utils;
use crate::target::Target;

#[derive(Debug)]
pub struct SubfinderCollector {
    binary_path: PathBuf,
    timeout: Duration,
    /// Directory receiving the raw `-o` output file
    work_dir: PathBuf,
}

impl SubfinderCollector {
    pub fn new(binary_path: impl Into<PathBuf>, timeout: Duration, work_dir: PathBuf) -> Self {
        Self {
            binary_path: binary_path.into(),
            timeout,
            work_dir,
        }
    }

    /// An explicit path wins; a bare name is looked up on PATH.
    fn resolve_binary(&self) -> Result<PathBuf, CollectorError> {
        if self.binary_path.is_file() {
            return Ok(self.binary_path.clone());
        }
        which::which(&self.binary_path).map_err(|_| {
            CollectorError::ToolMissing(format!(
                "subfinder binary not found at '{}' or on PATH",
                self.binary_path.display()
            ))
        })
    }

    /// Raw output location for a target
    pub fn output_path(&self, target: &Target) -> PathBuf {
        let label = domain_utils::sanitize_filename(&target.label());
        self.work_dir.join(format!("subfinder_{}.txt", label))
    }

    pub async fn collect(&self, target: &Target) -> Result<SubdomainSet, CollectorError> {
        let binary = self.resolve_binary()?;
        let output_path = self.output_path(target);

        tokio::fs::create_dir_all(&self.work_dir).await.map_err(|e| {
            CollectorError::Process(format!("cannot create {}: {}", self.work_dir.display(), e))
        })?;
        if tokio::fs::try_exists(&output_path).await.unwrap_or(false) {
            if let Err(e) = tokio::fs::remove_file(&output_path).await {
                warn!("Could not remove stale subfinder output {}: {}", output_path.display(), e);
            }
        }

        let mut command = Command::new(&binary);
        match target {
            Target::Domain(domain) => {
                command.arg("-d").arg(domain);
            }
            Target::File { path, .. } => {
                command.arg("-dL").arg(path);
            }
        }
        command
            .arg("-o")
            .arg(&output_path)
            .arg("-all")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!("Running subfinder for {}", target);
        debug!("Command: {:?}", command.as_std());

        let child = command.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CollectorError::ToolMissing(format!("{}: {}", binary.display(), e)),
            _ => CollectorError::Process(format!("failed to spawn {}: {}", binary.display(), e)),
        })?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(CollectorError::Process(format!("failed to wait for subfinder: {}", e))),
            Err(_) => {
                return Err(CollectorError::Process(format!(
                    "subfinder timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("subfinder stdout: {}", stdout.trim());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            warn!("subfinder stderr: {}", stderr.trim());
        }

        if !output.status.success() {
            return Err(CollectorError::Process(format!("subfinder exited with {}", output.status)));
        }

        if !tokio::fs::try_exists(&output_path).await.unwrap_or(false) {
            return Err(CollectorError::OutputMissing(output_path));
        }

        let found = read_output_file(&output_path, target).await?;
        info!("subfinder found {} subdomains for {}", found.len(), target);
        Ok(found)
    }
}

async fn read_output_file(path: &Path, target: &Target) -> Result<SubdomainSet, CollectorError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| CollectorError::Process(format!("cannot read {}: {}", path.display(), e)))?;
    Ok(parse_subfinder_output(&decode_output(&bytes), target))
}

/// Decode tool output: UTF-8 first, then GBK, then lossy UTF-8. A leading
/// byte-order mark is dropped in every case.
pub fn decode_output(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }
    if let Some(text) = GBK.decode_without_bom_handling_and_without_replacement(bytes) {
        debug!("subfinder output decoded as GBK");
        return text.into_owned();
    }
    warn!("subfinder output is neither UTF-8 nor GBK, decoding lossily");
    String::from_utf8_lossy(bytes).into_owned()
}

/// One hostname per line; blank, malformed and out-of-scope lines are dropped.
pub fn parse_subfinder_output(text: &str, target: &Target) -> SubdomainSet {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| target.accept(line))
        .collect()
}
