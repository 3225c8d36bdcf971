// src/prober.rs
//! Passive HTTP(S) exposure checks.
//!
//! Each asset gets one HTTPS and one HTTP GET. Nothing beyond a plain request
//! with the configured user agent is ever sent.

use crate::shutdown::Cancellation;
use crate::types::{AsmError, Asset, Finding, ProbeConfig, ProbeFailure, Scheme};
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use reqwest::header::{CONTENT_TYPE, SERVER};
use reqwest::tls::TlsInfo;
use reqwest::{redirect, Client, Response};
use scraper::{Html, Selector};
use std::error::Error as StdError;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

pub struct Prober {
    client: Client,
    config: ProbeConfig,
    semaphore: Arc<Semaphore>,
    progress: bool,
}

impl Prober {
    pub fn new(config: ProbeConfig, user_agent: &str, proxy: Option<&str>) -> Result<Self, AsmError> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .user_agent(user_agent)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .tls_info(true)
            .gzip(true)
            .deflate(true)
            .pool_max_idle_per_host(0);

        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| AsmError::ConfigError(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| AsmError::ConfigError(format!("Failed to build probe client: {}", e)))?;

        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(config.concurrency.max(1))),
            config,
            progress: false,
        })
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Probes every asset over HTTPS then HTTP.
    ///
    /// Returns exactly two findings per asset, in asset order. Both checks of
    /// an asset share a single deadline of `timeout`.
    pub async fn probe(&self, assets: &[Asset], timeout: Duration, cancel: &Cancellation) -> Vec<Finding> {
        let bar = self.progress_bar(assets.len());
        let mut futures = FuturesUnordered::new();

        for (idx, asset) in assets.iter().enumerate() {
            let semaphore = self.semaphore.clone();
            let bar = bar.clone();

            futures.push(async move {
                let _permit = semaphore.acquire().await.ok();
                let findings = self.probe_asset(asset, timeout, cancel).await;
                bar.inc(1);
                (idx, findings)
            });
        }

        let mut slots: Vec<Option<[Finding; 2]>> = vec![None; assets.len()];
        while let Some((idx, findings)) = futures.next().await {
            slots[idx] = Some(findings);
        }
        bar.finish_and_clear();

        let findings: Vec<Finding> = slots.into_iter().flatten().flatten().collect();
        info!(
            "Probed {} assets: {} findings, {} errors",
            assets.len(),
            findings.len(),
            findings.iter().filter(|f| f.is_error()).count()
        );
        findings
    }

    async fn probe_asset(&self, asset: &Asset, timeout: Duration, cancel: &Cancellation) -> [Finding; 2] {
        let deadline = Instant::now() + timeout;
        let https_url = Scheme::Https.url_for(&asset.host);
        let http_url = Scheme::Http.url_for(&asset.host);

        let (https, http) = tokio::join!(
            self.check(&https_url, Scheme::Https, deadline, cancel),
            self.check(&http_url, Scheme::Http, deadline, cancel),
        );
        [https, http]
    }

    /// Runs one bounded check against `url`. Never fails: errors become error findings.
    pub async fn check(&self, url: &str, scheme: Scheme, deadline: Instant, cancel: &Cancellation) -> Finding {
        if cancel.is_cancelled() {
            return Finding::failure(url.to_string(), ProbeFailure::Cancelled);
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProbeFailure::Cancelled),
            result = tokio::time::timeout_at(deadline, self.fetch(url, scheme)) => match result {
                Ok(outcome) => outcome,
                Err(_) => Err(ProbeFailure::Timeout("per-host deadline exceeded".to_string())),
            },
        };

        match outcome {
            Ok(finding) => {
                debug!("{} -> {:?} {:?}", url, finding.status_code, finding.final_url);
                finding
            }
            Err(failure) => {
                debug!("{} failed: {}", url, failure);
                Finding::failure(url.to_string(), failure)
            }
        }
    }

    async fn fetch(&self, url: &str, scheme: Scheme) -> Result<Finding, ProbeFailure> {
        let response = self.client.get(url).send().await.map_err(classify)?;

        let final_url = response.url().to_string();
        let status_code = response.status().as_u16();
        let server = response
            .headers()
            .get(SERVER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let tls_not_after = match scheme {
            Scheme::Https => response
                .extensions()
                .get::<TlsInfo>()
                .and_then(|info| info.peer_certificate())
                .and_then(certificate_not_after),
            Scheme::Http => None,
        };
        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(true, |ct| ct.to_ascii_lowercase().contains("html"));

        let title = if is_html {
            match read_capped(response, self.config.max_body_bytes).await {
                Ok(body) => extract_title(&String::from_utf8_lossy(&body)),
                Err(e) => {
                    debug!("{}: body read failed: {}", url, error_chain(&e));
                    None
                }
            }
        } else {
            None
        };

        Ok(Finding::success(
            url.to_string(),
            final_url,
            status_code,
            title,
            server,
            tls_not_after,
        ))
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template("{spinner} probing [{bar:30}] {pos}/{len} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        ProgressBar::new(len as u64).with_style(style)
    }
}

async fn read_capped(mut response: Response, max_bytes: usize) -> Result<Vec<u8>, reqwest::Error> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = max_bytes.saturating_sub(body.len());
        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if body.len() >= max_bytes {
            break;
        }
    }
    Ok(body)
}

/// Text of the first `<title>` element, whitespace collapsed.
pub fn extract_title(html: &str) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let document = Html::parse_document(html);
    let title = document
        .select(&selector)
        .next()?
        .text()
        .collect::<Vec<_>>()
        .join(" ");
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

/// Not-after of a DER certificate as an RFC 3339 UTC timestamp.
pub fn certificate_not_after(der: &[u8]) -> Option<String> {
    let (_, cert) = x509_parser::parse_x509_certificate(der).ok()?;
    let timestamp = cert.validity().not_after.timestamp();
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

fn io_error_kind(err: &dyn StdError) -> Option<io::ErrorKind> {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = cause.source();
    }
    None
}

/// Maps a request error onto the failure classes recorded in findings.
///
/// The request URL is stripped first so hostnames such as `ssl.example.com`
/// never decide the class.
pub fn classify(err: reqwest::Error) -> ProbeFailure {
    let err = err.without_url();
    let detail = error_chain(&err);
    let lower = detail.to_ascii_lowercase();

    if err.is_timeout() {
        return ProbeFailure::Timeout(detail);
    }
    if err.is_redirect() {
        return ProbeFailure::Redirect(detail);
    }
    match io_error_kind(&err) {
        Some(io::ErrorKind::ConnectionRefused)
        | Some(io::ErrorKind::ConnectionReset)
        | Some(io::ErrorKind::ConnectionAborted)
        | Some(io::ErrorKind::AddrNotAvailable) => return ProbeFailure::Connect(detail),
        Some(io::ErrorKind::TimedOut) => return ProbeFailure::Timeout(detail),
        _ => {}
    }

    if lower.contains("dns error")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
        || lower.contains("no such host")
    {
        ProbeFailure::Dns(detail)
    } else if lower.contains("certificate")
        || lower.contains("tls")
        || lower.contains("ssl")
        || lower.contains("handshake")
    {
        ProbeFailure::Tls(detail)
    } else if err.is_connect() {
        ProbeFailure::Connect(detail)
    } else {
        ProbeFailure::Other(detail)
    }
}
