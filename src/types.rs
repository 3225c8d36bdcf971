// src/types.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MAX_SUBDOMAINS: usize = 200;
pub const DEFAULT_PROBE_TIMEOUT_SECS: f64 = 8.0;
pub const DEFAULT_CRTSH_URL: &str = "https://crt.sh";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub timeout: Duration,
    pub user_agent: String,
    pub proxy: Option<String>,
    pub rate_limits: HashMap<String, Option<u32>>,
    pub max_subdomains: usize,
    pub source: SourceConfig,
    pub output: OutputConfig,
    pub resolver: ResolverConfig,
    pub probe: ProbeConfig,
    pub deadline: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        let mut rate_limits = HashMap::new();
        rate_limits.insert("crtsh".to_string(), Some(1));

        Self {
            timeout: Duration::from_secs(15),
            user_agent: format!("asmfinder/{}", env!("CARGO_PKG_VERSION")),
            proxy: None,
            rate_limits,
            max_subdomains: DEFAULT_MAX_SUBDOMAINS,
            source: SourceConfig::default(),
            output: OutputConfig::default(),
            resolver: ResolverConfig::default(),
            probe: ProbeConfig::default(),
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub crtsh_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: "crtsh".to_string(),
            crtsh_url: DEFAULT_CRTSH_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub directory: String,
    pub json: bool,
    pub silent: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "out".to_string(),
            json: false,
            silent: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub threads: usize,
    pub timeout: Duration,
    pub nameservers: Vec<String>,
    pub use_system_resolver: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            threads: 50,
            timeout: Duration::from_secs(5),
            nameservers: vec![
                "8.8.8.8:53".to_string(),
                "1.1.1.1:53".to_string(),
            ],
            use_system_resolver: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub enabled: bool,
    pub concurrency: usize,
    pub timeout: Duration,
    pub max_redirects: usize,
    pub max_body_bytes: usize,
    pub accept_invalid_certs: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: 20,
            timeout: Duration::from_secs_f64(DEFAULT_PROBE_TIMEOUT_SECS),
            max_redirects: 10,
            max_body_bytes: 1024 * 1024,
            accept_invalid_certs: true,
        }
    }
}

/// Validated root domain of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    pub fn parse(raw: &str) -> Result<Self, AsmError> {
        let domain = raw.trim().to_lowercase();

        if domain.is_empty() || domain.len() > 253 {
            return Err(AsmError::InvalidDomain(raw.to_string()));
        }
        if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
            return Err(AsmError::InvalidDomain(raw.to_string()));
        }

        for label in domain.split('.') {
            if label.is_empty() || label.len() > 63 {
                return Err(AsmError::InvalidDomain(raw.to_string()));
            }
            if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(AsmError::InvalidDomain(raw.to_string()));
            }
            if label.starts_with('-') || label.ends_with('-') {
                return Err(AsmError::InvalidDomain(raw.to_string()));
            }
        }

        Ok(Self(domain))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercased hostname that is the root domain or one of its subdomains.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hostname(String);

impl Hostname {
    /// Applies normalisation and scope checks to a raw certificate name.
    /// Returns `None` for wildcards, out-of-scope names and unsafe characters.
    pub fn normalize(raw: &str, domain: &Domain) -> Option<Self> {
        let host = raw.trim().to_lowercase();
        let host = host.trim_end_matches('.');

        if host.is_empty() || host.contains('*') {
            return None;
        }

        let in_scope = host == domain.as_str()
            || host
                .strip_suffix(domain.as_str())
                .map_or(false, |prefix| prefix.len() > 1 && prefix.ends_with('.'));
        if !in_scope {
            return None;
        }

        if !host
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
        {
            return None;
        }

        Some(Self(host.to_string()))
    }

    pub fn root(domain: &Domain) -> Self {
        Self(domain.as_str().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sorted, deduplicated hostnames found for a domain. Always contains the root.
pub type DiscoveryResult = Vec<Hostname>;

/// One certificate-transparency record; `name_value` bundles newline-separated names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtRecord {
    pub name_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub host: Hostname,
    pub ips: Vec<String>,
}

impl Asset {
    pub fn is_resolved(&self) -> bool {
        !self.ips.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Https,
    Http,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Https => "https",
            Scheme::Http => "http",
        }
    }

    pub fn url_for(&self, host: &Hostname) -> String {
        format!("{}://{}", self.as_str(), host)
    }
}

/// Why a single probe check produced no observation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeFailure {
    #[error("timeout: {0}")]
    Timeout(String),

    #[error("dns: {0}")]
    Dns(String),

    #[error("tls: {0}")]
    Tls(String),

    #[error("connect: {0}")]
    Connect(String),

    #[error("redirect: {0}")]
    Redirect(String),

    #[error("cancelled")]
    Cancelled,

    #[error("request: {0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub url: String,
    pub final_url: Option<String>,
    pub status_code: Option<u16>,
    pub title: Option<String>,
    pub server: Option<String>,
    pub tls_not_after: Option<String>,
    pub error: Option<String>,
}

impl Finding {
    pub fn success(
        url: String,
        final_url: String,
        status_code: u16,
        title: Option<String>,
        server: Option<String>,
        tls_not_after: Option<String>,
    ) -> Self {
        Self {
            url,
            final_url: Some(final_url),
            status_code: Some(status_code),
            title,
            server,
            tls_not_after,
            error: None,
        }
    }

    pub fn failure(url: String, failure: ProbeFailure) -> Self {
        Self {
            url,
            final_url: None,
            status_code: None,
            title: None,
            server: None,
            tls_not_after: None,
            error: Some(failure.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub domain: Domain,
    pub generated_at: String,
    pub version: String,
    pub source: String,
    pub subdomain_count: usize,
    pub asset_count: usize,
    pub resolved_count: usize,
    pub finding_count: usize,
    pub error_count: usize,
    pub cancelled: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub metadata: RunMetadata,
    pub subdomains: DiscoveryResult,
    pub assets: Vec<Asset>,
    pub findings: Vec<Finding>,
}

pub struct SourceInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Error)]
pub enum AsmError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Source {source_name} unavailable: {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },

    #[error("Resolution failed for {host}: {message}")]
    ResolutionFailure {
        host: String,
        message: String,
    },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Output error: {0}")]
    OutputError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> Domain {
        Domain::parse("example.com").unwrap()
    }

    #[test]
    fn test_domain_parse() {
        assert_eq!(Domain::parse(" Example.COM ").unwrap().as_str(), "example.com");
        assert!(Domain::parse("sub.example.com").is_ok());
        assert!(Domain::parse("example").is_err());
        assert!(Domain::parse("").is_err());
        assert!(Domain::parse(".example.com").is_err());
        assert!(Domain::parse("example.com.").is_err());
        assert!(Domain::parse("-example.com").is_err());
        assert!(Domain::parse("exa_mple.com").is_err());
        assert!(Domain::parse("a..com").is_err());
    }

    #[test]
    fn test_hostname_normalize() {
        let domain = example();
        assert_eq!(
            Hostname::normalize("EXAMPLE.com.", &domain).unwrap().as_str(),
            "example.com"
        );
        assert_eq!(
            Hostname::normalize("  Api.Example.com ", &domain).unwrap().as_str(),
            "api.example.com"
        );
        assert!(Hostname::normalize("*.example.com", &domain).is_none());
        assert!(Hostname::normalize("", &domain).is_none());
        assert!(Hostname::normalize(".", &domain).is_none());
        assert!(Hostname::normalize("badexample.com", &domain).is_none());
        assert!(Hostname::normalize("example.com.evil.net", &domain).is_none());
        assert!(Hostname::normalize(".example.com", &domain).is_none());
        assert!(Hostname::normalize("a_b.example.com", &domain).is_none());
        assert!(Hostname::normalize("mail@example.com", &domain).is_none());
    }

    #[test]
    fn test_failure_finding_has_no_observations() {
        let finding = Finding::failure(
            "https://a.example.com".to_string(),
            ProbeFailure::Timeout("deadline elapsed".to_string()),
        );
        assert!(finding.is_error());
        assert_eq!(finding.error.as_deref(), Some("timeout: deadline elapsed"));
        assert!(finding.final_url.is_none());
        assert!(finding.status_code.is_none());
        assert!(finding.title.is_none());
        assert!(finding.server.is_none());
        assert!(finding.tls_not_after.is_none());
    }

    #[test]
    fn test_finding_serializes_nulls() {
        let finding = Finding::failure("http://example.com".to_string(), ProbeFailure::Cancelled);
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["status_code"], serde_json::Value::Null);
        assert_eq!(json["error"], "cancelled");
    }

    #[test]
    fn test_asset_serializes_host_as_string() {
        let asset = Asset {
            host: Hostname::root(&example()),
            ips: vec![],
        };
        let json = serde_json::to_string(&asset).unwrap();
        assert_eq!(json, r#"{"host":"example.com","ips":[]}"#);
    }
}
