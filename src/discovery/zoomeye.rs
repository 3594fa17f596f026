//! ZoomEye paginated search (`POST /v2/search`).
//!
//! The first page reports `total`; the remaining pages are requested in
//! order. A failure past the first page stops pagination but keeps what was
//! already gathered.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use super::{CollectorError, DomainSweep, SourceKind, SubdomainSet};
use crate::api_client::{ApiClient, ApiRequest, Provider};
use crate::target::Target;

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    data: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug)]
pub struct ZoomEyeCollector {
    client: ApiClient,
    provider: Provider,
    api_key: Option<String>,
    page_size: u32,
}

impl ZoomEyeCollector {
    pub fn new(client: ApiClient, provider: Provider, api_key: Option<String>, page_size: u32) -> Self {
        Self {
            client,
            provider,
            api_key,
            page_size: page_size.max(1),
        }
    }

    pub async fn collect(&self, target: &Target) -> Result<SubdomainSet, CollectorError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| CollectorError::Config("ZoomEye API key not configured".to_string()))?;

        let mut sweep = DomainSweep::default();
        for domain in target.domains() {
            let result = self.search(api_key, domain).await;
            sweep.record(SourceKind::ZoomEye, domain, result);
        }
        let found = sweep.finish()?;
        info!("ZoomEye found {} subdomains for {}", found.len(), target);
        Ok(found)
    }

    async fn search(&self, api_key: &str, domain: &str) -> Result<SubdomainSet, CollectorError> {
        let qbase64 = STANDARD.encode(format!("domain:{}", domain));
        let scope = Target::Domain(domain.to_string());
        let mut found = SubdomainSet::new();

        let first = self.fetch_page(api_key, &qbase64, 1).await?;
        let total_pages = page_count(first.total, self.page_size);
        if total_pages > 1 {
            info!("ZoomEye reports {} results for {} across {} pages", first.total, domain, total_pages);
        }
        collect_items(first.data, &scope, &mut found);

        for page in 2..=total_pages {
            debug!("ZoomEye page {}/{} for {}", page, total_pages, domain);
            match self.fetch_page(api_key, &qbase64, page).await {
                Ok(next) => collect_items(next.data, &scope, &mut found),
                Err(e) => {
                    warn!(
                        "ZoomEye page {}/{} for {} failed, keeping {} names gathered so far: {}",
                        page,
                        total_pages,
                        domain,
                        found.len(),
                        e
                    );
                    break;
                }
            }
        }

        Ok(found)
    }

    async fn fetch_page(&self, api_key: &str, qbase64: &str, page: u64) -> Result<SearchPage, CollectorError> {
        let request = ApiRequest::post_json(
            "/v2/search",
            json!({
                "qbase64": qbase64,
                "page": page,
                "pagesize": self.page_size,
            }),
        )
        .header("API-KEY", api_key);

        let response = self.client.call(&self.provider, &request).await?;
        response
            .json()
            .map_err(|e| CollectorError::Parse(format!("ZoomEye page {}: {}", page, e)))
    }
}

/// ceil(total / page_size); zero results still cost the first page
pub fn page_count(total: u64, page_size: u32) -> u64 {
    let page_size = u64::from(page_size.max(1));
    total.div_ceil(page_size).max(1)
}

fn collect_items(items: Vec<SearchItem>, scope: &Target, found: &mut SubdomainSet) {
    for item in items {
        let host = match (item.domain, item.url) {
            (Some(domain), _) if !domain.trim().is_empty() => Some(domain),
            (_, Some(url)) => host_from_url(&url),
            _ => None,
        };
        if let Some(name) = host.and_then(|h| scope.accept(&h)) {
            found.insert(name);
        }
    }
}

/// Host part of an absolute http(s) URL, without port or credentials
pub fn host_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed.host_str().map(str::to_string)
}
