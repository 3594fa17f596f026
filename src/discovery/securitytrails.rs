//! SecurityTrails subdomain listing (`GET /v1/domain/<domain>/subdomains`).

use serde::Deserialize;
use tracing::info;

use super::{CollectorError, DomainSweep, SourceKind, SubdomainSet};
use crate::api_client::{ApiClient, ApiRequest, Provider};
use crate::target::Target;

#[derive(Debug, Deserialize)]
struct SubdomainsResponse {
    /// Labels relative to the queried domain (`www`, `mail.eu`)
    #[serde(default)]
    subdomains: Vec<String>,
}

#[derive(Debug)]
pub struct SecurityTrailsCollector {
    client: ApiClient,
    provider: Provider,
    api_key: Option<String>,
}

impl SecurityTrailsCollector {
    pub fn new(client: ApiClient, provider: Provider, api_key: Option<String>) -> Self {
        Self {
            client,
            provider,
            api_key,
        }
    }

    pub async fn collect(&self, target: &Target) -> Result<SubdomainSet, CollectorError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| CollectorError::Config("SecurityTrails API key not configured".to_string()))?;

        let mut sweep = DomainSweep::default();
        for domain in target.domains() {
            let result = self.query(api_key, domain).await;
            sweep.record(SourceKind::SecurityTrails, domain, result);
        }
        let found = sweep.finish()?;
        info!("SecurityTrails found {} subdomains for {}", found.len(), target);
        Ok(found)
    }

    async fn query(&self, api_key: &str, domain: &str) -> Result<SubdomainSet, CollectorError> {
        let request = ApiRequest::get(format!("/v1/domain/{}/subdomains", domain))
            .header("APIKEY", api_key)
            .header("Accept", "application/json");

        let response = self.client.call(&self.provider, &request).await?;
        let body: SubdomainsResponse = response
            .json()
            .map_err(|e| CollectorError::Parse(format!("SecurityTrails: {}", e)))?;

        Ok(join_labels(&body.subdomains, domain))
    }
}

/// Turn relative labels into full names under `domain`, keeping valid ones.
pub(crate) fn join_labels(labels: &[String], domain: &str) -> SubdomainSet {
    let scope = Target::Domain(domain.to_string());
    labels
        .iter()
        .map(|label| label.trim().trim_end_matches('.'))
        .filter(|label| !label.is_empty())
        .filter_map(|label| scope.accept(&format!("{}.{}", label, domain)))
        .collect()
}
