//! Subdomain sources.
//!
//! Every source is one variant of the closed [`Collector`] enum. The lookup
//! table of collectors for a run is built from configuration by
//! [`build_collectors`]; key-authenticated sources without a credential are
//! left out of the table entirely.

pub mod ct_logs;
pub mod securitytrails;
pub mod shodan;
pub mod subfinder;
pub mod zoomeye;

pub use ct_logs::CrtShCollector;
pub use securitytrails::SecurityTrailsCollector;
pub use shodan::ShodanCollector;
pub use subfinder::SubfinderCollector;
pub use zoomeye::ZoomEyeCollector;

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api_client::{ApiCallError, ApiClient, LastFailure, Provider};
use crate::config::{AppConfig, ProviderConfig};
use crate::target::Target;

/// Validated, deduplicated subdomains found by one source
pub type SubdomainSet = BTreeSet<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Subfinder,
    CrtSh,
    SecurityTrails,
    ZoomEye,
    Shodan,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Subfinder,
        SourceKind::CrtSh,
        SourceKind::SecurityTrails,
        SourceKind::ZoomEye,
        SourceKind::Shodan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Subfinder => "subfinder",
            SourceKind::CrtSh => "crtsh",
            SourceKind::SecurityTrails => "securitytrails",
            SourceKind::ZoomEye => "zoomeye",
            SourceKind::Shodan => "shodan",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, SourceKind::SecurityTrails | SourceKind::ZoomEye | SourceKind::Shodan)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted || (wanted == "crt.sh" && *kind == SourceKind::CrtSh))
            .ok_or_else(|| {
                let known: Vec<&str> = SourceKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown source '{}' (expected one of: {})", s.trim(), known.join(", "))
            })
    }
}

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("tool not found: {0}")]
    ToolMissing(String),

    #[error("process failed: {0}")]
    Process(String),

    #[error("expected output file was not produced: {}", .0.display())]
    OutputMissing(PathBuf),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("{0} rejected the API key (HTTP 401)")]
    Auth(String),

    #[error("{provider} quota or rate limit exhausted (HTTP {status})")]
    Quota { provider: String, status: u16 },

    #[error("{provider} returned HTTP {status}")]
    Provider { provider: String, status: u16 },
}

impl From<ApiCallError> for CollectorError {
    fn from(err: ApiCallError) -> Self {
        match err {
            ApiCallError::Exhausted { provider, last, .. } => match last {
                LastFailure::Status(401) => CollectorError::Auth(provider),
                LastFailure::Status(status @ (402 | 429)) => CollectorError::Quota { provider, status },
                LastFailure::Status(status) => CollectorError::Provider { provider, status },
                LastFailure::Transport(reason) => CollectorError::Request(format!("{}: {}", provider, reason)),
            },
            other => CollectorError::Request(other.to_string()),
        }
    }
}

/// Accumulates per-domain results for multi-domain targets. The first
/// failure is kept and only surfaces when nothing at all was found.
#[derive(Debug, Default)]
pub(crate) struct DomainSweep {
    found: SubdomainSet,
    first_error: Option<CollectorError>,
}

impl DomainSweep {
    pub(crate) fn record(&mut self, source: SourceKind, domain: &str, result: Result<SubdomainSet, CollectorError>) {
        match result {
            Ok(set) => {
                debug!("{}: {} names for {}", source, set.len(), domain);
                self.found.extend(set);
            }
            Err(e) => {
                warn!("{}: query for {} failed: {}", source, domain, e);
                if self.first_error.is_none() {
                    self.first_error = Some(e);
                }
            }
        }
    }

    pub(crate) fn finish(self) -> Result<SubdomainSet, CollectorError> {
        match self.first_error {
            Some(e) if self.found.is_empty() => Err(e),
            _ => Ok(self.found),
        }
    }
}

/// One configured subdomain source
#[derive(Debug)]
pub enum Collector {
    Subfinder(SubfinderCollector),
    CrtSh(CrtShCollector),
    SecurityTrails(SecurityTrailsCollector),
    ZoomEye(ZoomEyeCollector),
    Shodan(ShodanCollector),
}

impl Collector {
    pub fn kind(&self) -> SourceKind {
        match self {
            Collector::Subfinder(_) => SourceKind::Subfinder,
            Collector::CrtSh(_) => SourceKind::CrtSh,
            Collector::SecurityTrails(_) => SourceKind::SecurityTrails,
            Collector::ZoomEye(_) => SourceKind::ZoomEye,
            Collector::Shodan(_) => SourceKind::Shodan,
        }
    }

    pub async fn collect(&self, target: &Target) -> Result<SubdomainSet, CollectorError> {
        match self {
            Collector::Subfinder(c) => c.collect(target).await,
            Collector::CrtSh(c) => c.collect(target).await,
            Collector::SecurityTrails(c) => c.collect(target).await,
            Collector::ZoomEye(c) => c.collect(target).await,
            Collector::Shodan(c) => c.collect(target).await,
        }
    }
}

/// Build the collector table for a run.
///
/// `selected` restricts the run to the given sources; an empty slice means
/// every source enabled in configuration.
pub fn build_collectors(config: &AppConfig, selected: &[SourceKind], client: &ApiClient) -> Result<Vec<Collector>> {
    let sources = &config.sources;
    let wanted = |kind: SourceKind, enabled: bool| {
        if selected.is_empty() {
            enabled
        } else {
            selected.contains(&kind)
        }
    };

    let mut collectors = Vec::new();

    if wanted(SourceKind::Subfinder, sources.subfinder.enabled) {
        collectors.push(Collector::Subfinder(SubfinderCollector::new(
            &sources.subfinder.path,
            std::time::Duration::from_secs(sources.subfinder.timeout_secs),
            config.output.directory.clone(),
        )));
    }

    if wanted(SourceKind::CrtSh, sources.crtsh.enabled) {
        let crtsh = CrtShCollector::new(
            &sources.crtsh.base_url,
            &config.http.user_agent,
            std::time::Duration::from_secs(sources.crtsh.timeout_secs),
        )
        .context("Failed to build crt.sh HTTP client")?;
        collectors.push(Collector::CrtSh(crtsh));
    }

    if let Some((provider, key)) = keyed_provider(SourceKind::SecurityTrails, &sources.securitytrails, &wanted)? {
        collectors.push(Collector::SecurityTrails(SecurityTrailsCollector::new(
            client.clone(),
            provider,
            Some(key),
        )));
    }

    if let Some((provider, key)) = keyed_provider(SourceKind::ZoomEye, &sources.zoomeye, &wanted)? {
        collectors.push(Collector::ZoomEye(ZoomEyeCollector::new(
            client.clone(),
            provider,
            Some(key),
            sources.zoomeye.page_size,
        )));
    }

    if let Some((provider, key)) = keyed_provider(SourceKind::Shodan, &sources.shodan, &wanted)? {
        collectors.push(Collector::Shodan(ShodanCollector::new(client.clone(), provider, Some(key))));
    }

    debug!(
        "Collector table: [{}]",
        collectors.iter().map(|c| c.kind().as_str()).collect::<Vec<_>>().join(", ")
    );
    Ok(collectors)
}

fn keyed_provider(
    kind: SourceKind,
    config: &ProviderConfig,
    wanted: &impl Fn(SourceKind, bool) -> bool,
) -> Result<Option<(Provider, String)>> {
    if !wanted(kind, config.enabled) {
        return Ok(None);
    }
    let Some(key) = config.api_key() else {
        info!("Skipping {}: no API key configured", kind);
        return Ok(None);
    };
    let provider = Provider::from_config(kind.as_str(), config)
        .with_context(|| format!("No endpoints configured for {}", kind))?;
    Ok(Some((provider, key.to_string())))
}
