// src/report.rs
//! Human-readable `report.html` rendered from a finished scan.

use crate::error::{ErrorContext, Result};
use crate::types::{AsmError, Asset, Finding, ScanReport};
use askama::Template;
use log::debug;
use std::fs;
use std::path::Path;

pub const REPORT_FILE: &str = "report.html";

const EMPTY: &str = "-";

#[derive(Template)]
#[template(path = "report.html")]
struct HtmlReportTemplate {
    domain: String,
    generated_at: String,
    version: String,
    asset_count: usize,
    resolved_count: usize,
    finding_count: usize,
    error_count: usize,
    cancelled: bool,
    findings: Vec<FindingRow>,
    assets: Vec<AssetRow>,
}

struct FindingRow {
    url: String,
    final_url: String,
    status: String,
    title: String,
    server: String,
    tls_not_after: String,
    error: String,
    is_error: bool,
}

struct AssetRow {
    host: String,
    ips: String,
}

fn cell(value: Option<&str>) -> String {
    value.unwrap_or(EMPTY).to_string()
}

impl From<&Finding> for FindingRow {
    fn from(finding: &Finding) -> Self {
        Self {
            url: finding.url.clone(),
            final_url: cell(finding.final_url.as_deref()),
            status: finding
                .status_code
                .map_or_else(|| EMPTY.to_string(), |code| code.to_string()),
            title: cell(finding.title.as_deref()),
            server: cell(finding.server.as_deref()),
            tls_not_after: cell(finding.tls_not_after.as_deref()),
            error: cell(finding.error.as_deref()),
            is_error: finding.is_error(),
        }
    }
}

impl From<&Asset> for AssetRow {
    fn from(asset: &Asset) -> Self {
        Self {
            host: asset.host.to_string(),
            ips: if asset.ips.is_empty() {
                "unresolved".to_string()
            } else {
                asset.ips.join(", ")
            },
        }
    }
}

/// Renders the report as a standalone HTML page. Values are HTML-escaped.
pub fn render_html(report: &ScanReport) -> Result<String> {
    let meta = &report.metadata;
    let template = HtmlReportTemplate {
        domain: meta.domain.to_string(),
        generated_at: meta.generated_at.clone(),
        version: meta.version.clone(),
        asset_count: meta.asset_count,
        resolved_count: meta.resolved_count,
        finding_count: meta.finding_count,
        error_count: meta.error_count,
        cancelled: meta.cancelled,
        findings: report.findings.iter().map(FindingRow::from).collect(),
        assets: report.assets.iter().map(AssetRow::from).collect(),
    };

    template
        .render()
        .with_context(AsmError::OutputError, || "Failed to render HTML report".to_string())
}

pub fn write_html(report: &ScanReport, path: &Path) -> Result<()> {
    debug!("Writing HTML report to {}", path.display());
    let html = render_html(report)?;
    fs::write(path, html).with_context(AsmError::OutputError, || format!("Failed to write {}", path.display()))
}
