//! Instrument metadata client for the public symbol auto-suggest service.

use super::{DataSourceError, MetadataSource};
use crate::domain::{InstrumentId, InstrumentMetadata};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const NO_RESULT: &str = "No Result Available";

/// Symbol lookup backed by the auto-suggest endpoint (JSONP responses).
#[derive(Debug, Clone)]
pub struct SymbolLookupSource {
    client: Client,
    base_url: String,
}

impl SymbolLookupSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create with the default public service URL.
    pub fn default_url() -> Self {
        Self::new("https://www.moneycontrol.com".to_string())
    }

    pub fn lookup_url(&self, code: &str) -> String {
        format!(
            "{}/mccode/common/autosuggestion_solr.php?classic=true&query={}&type=1&format=json&callback=suggest1",
            self.base_url, code
        )
    }

    async fn get_text(&self, url: &str) -> Result<String, DataSourceError> {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(policy, || async {
            self.get_once(url).await.map_err(|e| {
                if e.is_transient() {
                    debug!(error = %e, "Retrying lookup");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await
    }

    async fn get_once(&self, url: &str) -> Result<String, DataSourceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DataSourceError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataSourceError::RateLimited);
        }
        if !status.is_success() {
            return Err(DataSourceError::Http {
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| DataSourceError::Network(e.to_string()))
    }
}

#[async_trait]
impl MetadataSource for SymbolLookupSource {
    async fn fetch_metadata(
        &self,
        code: &str,
    ) -> Result<Option<InstrumentMetadata>, DataSourceError> {
        debug!("Fetching metadata for code={}", code);
        let body = self.get_text(&self.lookup_url(code)).await?;
        parse_response(code, &body)
    }
}

/// Whether a code is worth sending to the lookup service.
///
/// Accepts numeric exchange codes and `IN` ISINs with a ten digit body.
pub fn is_lookup_candidate(code: &str) -> bool {
    let code = code.trim();
    if code.is_empty() || code == "0000" || code == "000" {
        return false;
    }
    let numeric = code.chars().next().map_or(false, |c| c.is_ascii_digit());
    let isin = code
        .strip_prefix("IN")
        .map_or(false, |rest| {
            rest.len() >= 10 && rest.chars().take(10).all(|c| c.is_ascii_digit())
        });
    numeric || isin
}

/// Parse a JSONP auto-suggest body into metadata for `code`.
///
/// The display field looks like `Infosys Ltd.<span>INE009A01021, INFY, 500209</span>`.
pub fn parse_response(
    code: &str,
    body: &str,
) -> Result<Option<InstrumentMetadata>, DataSourceError> {
    let payload = strip_jsonp(body)?;
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| {
            DataSourceError::MalformedResponse(format!("Invalid JSON payload: {}", e))
        })?;

    let entry = match &value {
        serde_json::Value::Array(items) => match items.first() {
            Some(first) => first,
            None => return Ok(None),
        },
        other => other,
    };

    let display = entry
        .get("pdt_dis_nm")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            DataSourceError::MalformedResponse("Missing pdt_dis_nm field".to_string())
        })?;
    if display.trim() == NO_RESULT {
        debug!("No lookup result for code={}", code);
        return Ok(None);
    }

    let span = extract_span(display)
        .ok_or_else(|| {
            DataSourceError::MalformedResponse(format!("No <span> in: {}", display))
        })?;
    let parts: Vec<&str> = span.split(' ').filter(|p| !p.is_empty()).collect();
    if parts.len() < 3 {
        return Err(DataSourceError::MalformedResponse(format!(
            "Expected ISIN, name and code in: {}",
            span
        )));
    }

    let isin = parts[0].trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
    let name = parts[1].trim_end_matches(|c: char| !c.is_ascii_alphabetic());
    let returned_code = parts[2].trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
    if returned_code != code {
        debug!(
            "Lookup for code={} answered with code={}",
            code, returned_code
        );
    }

    let mut metadata = InstrumentMetadata::new(
        InstrumentId::new(code),
        name.to_string(),
        isin.to_string(),
    );
    if let Some(sector) = entry
        .get("sc_sector")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        metadata = metadata.with_sector(sector.to_string());
    }
    Ok(Some(metadata))
}

/// `suggest1([...])` -> `[...]`
fn strip_jsonp(body: &str) -> Result<&str, DataSourceError> {
    let body = body.trim();
    let open = body.find('(');
    let close = body.rfind(')');
    match (open, close) {
        (Some(open), Some(close)) if open < close => Ok(&body[open + 1..close]),
        _ => Err(DataSourceError::MalformedResponse(
            "Response is not a JSONP callback".to_string(),
        )),
    }
}

fn extract_span(display: &str) -> Option<&str> {
    let start = display.find("<span>")? + "<span>".len();
    let end = start + display[start..].find("</span>")?;
    Some(&display[start..end])
}
