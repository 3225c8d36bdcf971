// src/sources/crtsh.rs
use crate::session::Session;
use crate::sources::CtSource;
use crate::types::{AsmError, CtRecord, Domain, SourceInfo};
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CrtShEntry {
    #[serde(default)]
    name_value: Option<String>,
}

/// crt.sh certificate transparency search
#[derive(Debug, Clone)]
pub struct CrtShSource {
    name: String,
    base_url: String,
}

impl CrtShSource {
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            name: "crtsh".to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Query for every certificate naming a subdomain of `domain`.
    pub fn query_url(&self, domain: &Domain) -> String {
        format!(
            "{}/?q={}&output=json",
            self.base_url,
            urlencoding::encode(&format!("%.{}", domain))
        )
    }

    fn unavailable(&self, message: String) -> AsmError {
        AsmError::SourceUnavailable {
            source_name: self.name.clone(),
            message,
        }
    }
}

#[async_trait]
impl CtSource for CrtShSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: self.name.clone(),
            description: "crt.sh certificate transparency search".to_string(),
        }
    }

    async fn fetch(&self, domain: &Domain, session: &Session) -> Result<Vec<CtRecord>, AsmError> {
        session.wait_for_rate_limit(&self.name).await;

        let url = self.query_url(domain);
        let response = session
            .get(&url)
            .await
            .map_err(|e| self.unavailable(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(self.unavailable(format!("HTTP status {}", response.status())));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.unavailable(format!("Failed to read body: {}", e)))?;

        // crt.sh answers an empty body instead of `[]` for some queries
        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Vec::new());
        }

        let entries: Vec<CrtShEntry> = serde_json::from_slice(&body)
            .map_err(|e| self.unavailable(format!("Failed to parse JSON: {}", e)))?;

        Ok(entries
            .into_iter()
            .filter_map(|entry| entry.name_value)
            .map(|name_value| CtRecord { name_value })
            .collect())
    }
}
