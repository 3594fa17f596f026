//! Shodan DNS domain lookup (`GET /dns/domain/<domain>?key=<key>`).

use serde::Deserialize;
use tracing::info;

use super::securitytrails::join_labels;
use super::{CollectorError, DomainSweep, SourceKind, SubdomainSet};
use crate::api_client::{ApiClient, ApiRequest, Provider};
use crate::target::Target;

#[derive(Debug, Deserialize)]
struct DnsDomainResponse {
    #[serde(default)]
    subdomains: Vec<String>,
    #[serde(default)]
    data: Vec<DnsRecord>,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    #[serde(default)]
    subdomain: Option<String>,
}

#[derive(Debug)]
pub struct ShodanCollector {
    client: ApiClient,
    provider: Provider,
    api_key: Option<String>,
}

impl ShodanCollector {
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
            .ok_or_else(|| CollectorError::Config("Shodan API key not configured".to_string()))?;

        let mut sweep = DomainSweep::default();
        for domain in target.domains() {
            let result = self.query(api_key, domain).await;
            sweep.record(SourceKind::Shodan, domain, result);
        }
        let found = sweep.finish()?;
        info!("Shodan found {} subdomains for {}", found.len(), target);
        Ok(found)
    }

    async fn query(&self, api_key: &str, domain: &str) -> Result<SubdomainSet, CollectorError> {
        let request = ApiRequest::get(format!("/dns/domain/{}", domain)).query("key", api_key);

        let response = self.client.call(&self.provider, &request).await?;
        let body: DnsDomainResponse = response
            .json()
            .map_err(|e| CollectorError::Parse(format!("Shodan: {}", e)))?;

        Ok(extract_names(body, domain))
    }
}

fn extract_names(body: DnsDomainResponse, domain: &str) -> SubdomainSet {
    // Records for the apex carry an empty label and are skipped
    let mut labels = body.subdomains;
    labels.extend(body.data.into_iter().filter_map(|record| record.subdomain));
    join_labels(&labels, domain)
}
