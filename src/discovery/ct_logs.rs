//! Certificate Transparency discovery via the crt.sh HTML search page.
//!
//! Each result row of the crt.sh table carries the certificate's matching
//! identities in its fifth cell, one name per line.

use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info};

use super::{CollectorError, DomainSweep, SourceKind, SubdomainSet};
use crate::target::Target;

static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid selector"));

/// Index of the identities column in a crt.sh result row
const NAME_CELL: usize = 4;

#[derive(Debug)]
pub struct CrtShCollector {
    client: Client,
    base_url: String,
}

impl CrtShCollector {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).user_agent(user_agent).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn collect(&self, target: &Target) -> Result<SubdomainSet, CollectorError> {
        let mut sweep = DomainSweep::default();
        for domain in target.domains() {
            let result = self.query(domain).await;
            sweep.record(SourceKind::CrtSh, domain, result);
        }
        let found = sweep.finish()?;
        info!("crt.sh found {} subdomains for {}", found.len(), target);
        Ok(found)
    }

    async fn query(&self, domain: &str) -> Result<SubdomainSet, CollectorError> {
        // Wildcard identity search: q=%.<domain>
        let query = format!("%.{}", domain);
        let url = format!("{}/?q={}", self.base_url, urlencoding::encode(&query));
        debug!("Querying crt.sh: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CollectorError::Request(format!("crt.sh: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectorError::Request(format!("crt.sh returned HTTP {}", status.as_u16())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CollectorError::Request(format!("crt.sh: failed to read body: {}", e)))?;

        parse_crtsh_html(&body, &Target::Domain(domain.to_string()))
    }
}

/// Extract in-scope names from a crt.sh result page.
///
/// Rows with fewer than five cells (headers, layout tables) are skipped. A
/// body that is not HTML at all is reported as a parse failure.
pub fn parse_crtsh_html(html: &str, target: &Target) -> Result<SubdomainSet, CollectorError> {
    if !html.contains('<') {
        return Err(CollectorError::Parse("crt.sh response is not an HTML page".to_string()));
    }

    let document = Html::parse_document(html);
    let mut found = SubdomainSet::new();

    for row in document.select(&ROW_SELECTOR) {
        // Direct cells only: crt.sh nests its result table inside a layout table
        let Some(cell) = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "td")
            .nth(NAME_CELL)
        else {
            continue;
        };
        // Names inside the cell are separated by <br> elements
        for fragment in cell.text() {
            for name in fragment.split_whitespace() {
                if let Some(name) = target.accept(name) {
                    found.insert(name);
                }
            }
        }
    }

    Ok(found)
}
