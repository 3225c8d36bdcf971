// src/output.rs
use crate::error::{ErrorContext, Result};
use crate::report::{self, REPORT_FILE};
use crate::types::{AsmError, OutputConfig, ScanReport};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const META_FILE: &str = "meta.json";
pub const SUBDOMAINS_FILE: &str = "subdomains.json";
pub const ASSETS_FILE: &str = "assets.json";
pub const HTTP_FILE: &str = "http.json";

pub struct OutputManager {
    config: OutputConfig,
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn directory(&self) -> PathBuf {
        PathBuf::from(&self.config.directory)
    }

    /// Writes the JSON files and `report.html` into the output directory and prints a summary.
    pub fn write_report(&self, report: &ScanReport) -> Result<PathBuf> {
        let dir = self.directory();
        fs::create_dir_all(&dir)
            .with_context(AsmError::OutputError, || format!("Failed to create {}", dir.display()))?;

        write_json(&dir.join(META_FILE), &report.metadata)?;
        write_json(&dir.join(SUBDOMAINS_FILE), &report.subdomains)?;
        write_json(&dir.join(ASSETS_FILE), &report.assets)?;
        write_json(&dir.join(HTTP_FILE), &report.findings)?;
        report::write_html(report, &dir.join(REPORT_FILE))?;

        if self.config.json {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            self.write_json_output(&mut handle, report)?;
        }

        if !self.config.silent {
            let stderr = std::io::stderr();
            let mut handle = stderr.lock();
            self.write_summary(&mut handle, &dir, report)?;
        }

        Ok(dir)
    }

    fn write_json_output<W: Write>(&self, writer: &mut W, report: &ScanReport) -> Result<()> {
        let json = serde_json::to_string_pretty(report)
            .with_context(AsmError::OutputError, || "Failed to serialize JSON".to_string())?;

        writeln!(writer, "{}", json).map_err(|e| AsmError::OutputError(e.to_string()))?;

        Ok(())
    }

    pub fn write_summary<W: Write>(&self, writer: &mut W, dir: &Path, report: &ScanReport) -> Result<()> {
        let meta = &report.metadata;
        let lines = [
            format!("[OK] Wrote outputs to: {}", dir.display()),
            format!(" - {}: {} hosts", SUBDOMAINS_FILE, meta.subdomain_count),
            format!(
                " - {}:      {} hosts ({} resolved)",
                ASSETS_FILE, meta.asset_count, meta.resolved_count
            ),
            format!(
                " - {}:        {} findings ({} errors)",
                HTTP_FILE, meta.finding_count, meta.error_count
            ),
            format!(" - {}", REPORT_FILE),
        ];

        for line in lines {
            writeln!(writer, "{}", line).map_err(|e| AsmError::OutputError(e.to_string()))?;
        }
        if meta.cancelled {
            writeln!(writer, "[!] Run was cancelled, results are partial")
                .map_err(|e| AsmError::OutputError(e.to_string()))?;
        }

        Ok(())
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)
        .with_context(AsmError::OutputError, || format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(AsmError::OutputError, || format!("Failed to serialize {}", path.display()))?;
    writeln!(writer).with_context(AsmError::OutputError, || format!("Failed to write {}", path.display()))?;
    writer
        .flush()
        .with_context(AsmError::OutputError, || format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Asset, Domain, Finding, Hostname, ProbeFailure, RunMetadata};

    fn report() -> ScanReport {
        let domain = Domain::parse("example.com").unwrap();
        let root = Hostname::root(&domain);
        let asset = Asset {
            host: root.clone(),
            ips: vec!["93.184.216.34".to_string()],
        };
        let findings = vec![
            Finding::success(
                "https://example.com".to_string(),
                "https://example.com/".to_string(),
                200,
                Some("Example Domain".to_string()),
                Some("ECS".to_string()),
                Some("2030-01-01T00:00:00Z".to_string()),
            ),
            Finding::failure(
                "http://example.com".to_string(),
                ProbeFailure::Connect("refused".to_string()),
            ),
        ];

        ScanReport {
            metadata: RunMetadata {
                domain,
                generated_at: "2026-10-18T00:00:00.000000Z".to_string(),
                version: "0.1.0".to_string(),
                source: "crtsh".to_string(),
                subdomain_count: 1,
                asset_count: 1,
                resolved_count: 1,
                finding_count: 2,
                error_count: 1,
                cancelled: false,
                duration_ms: 12,
            },
            subdomains: vec![root],
            assets: vec![asset],
            findings,
        }
    }

    #[test]
    fn test_write_report_creates_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested/out");
        let manager = OutputManager::new(OutputConfig {
            directory: dir.to_string_lossy().to_string(),
            silent: true,
            ..OutputConfig::default()
        });

        let written = manager.write_report(&report()).unwrap();
        assert_eq!(written, dir);

        let meta: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join(META_FILE)).unwrap()).unwrap();
        assert_eq!(meta["domain"], "example.com");
        assert_eq!(meta["generated_at"], "2026-10-18T00:00:00.000000Z");

        let subdomains: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join(SUBDOMAINS_FILE)).unwrap()).unwrap();
        assert_eq!(subdomains, serde_json::json!(["example.com"]));

        let assets: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join(ASSETS_FILE)).unwrap()).unwrap();
        assert_eq!(
            assets,
            serde_json::json!([{"host": "example.com", "ips": ["93.184.216.34"]}])
        );

        let http: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join(HTTP_FILE)).unwrap()).unwrap();
        assert_eq!(http.as_array().unwrap().len(), 2);
        assert_eq!(http[0]["title"], "Example Domain");
        assert_eq!(http[1]["error"], "connect: refused");
        assert_eq!(http[1]["final_url"], serde_json::Value::Null);

        let html = fs::read_to_string(dir.join(REPORT_FILE)).unwrap();
        assert!(html.contains("<td>Example Domain</td>"));
        assert!(html.contains("<td>connect: refused</td>"));
    }

    #[test]
    fn test_summary_mentions_counts() {
        let manager = OutputManager::new(OutputConfig::default());
        let mut buf = Vec::new();
        manager
            .write_summary(&mut buf, Path::new("out"), &report())
            .unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("[OK] Wrote outputs to: out"));
        assert!(text.contains("2 findings (1 errors)"));
        assert!(text.contains(REPORT_FILE));
        assert!(!text.contains("partial"));
    }
}
