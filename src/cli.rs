use crate::config;
use crate::types::{AsmError, Config};
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "asmfinder",
    version,
    about = "Passive attack-surface mapping for a single domain",
    long_about = "asmfinder enumerates hostnames for a domain from certificate transparency logs,\nresolves them to A/AAAA records and records HTTP(S) exposure metadata.\nNo brute forcing, no payloads: metadata only."
)]
pub struct Args {
    /// Root domain to scan (e.g. example.com)
    #[arg(short = 'd', long = "domain", value_name = "DOMAIN")]
    pub domain: String,

    /// Output directory
    #[arg(short = 'o', long = "out", value_name = "DIR")]
    pub out: Option<String>,

    /// Cap on discovered hostnames, root domain included [default: 200]
    #[arg(long = "max-subdomains", value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_subdomains: Option<u64>,

    /// Per-host HTTP(S) probe timeout in seconds [default: 8.0]
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Concurrent DNS lookups
    #[arg(long = "threads", value_name = "N")]
    pub threads: Option<usize>,

    /// Concurrent hosts being probed
    #[arg(long = "probe-concurrency", value_name = "N")]
    pub probe_concurrency: Option<usize>,

    /// Abort in-flight work after this many seconds; partial results are still written
    #[arg(long = "deadline", value_name = "SECS")]
    pub deadline: Option<f64>,

    /// Skip HTTP(S) probing
    #[arg(long = "no-probe")]
    pub no_probe: bool,

    /// Also print the full report as JSON to stdout
    #[arg(long = "json")]
    pub json: bool,

    /// Silent mode (no banner, summary or progress)
    #[arg(long = "silent")]
    pub silent: bool,

    /// Verbose mode
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,
}

impl Args {
    /// Command line flags win over the config file.
    pub fn apply_to(&self, config: &mut Config) -> Result<(), AsmError> {
        if let Some(limit) = self.max_subdomains {
            config.max_subdomains = usize::try_from(limit)
                .map_err(|_| AsmError::ConfigError("--max-subdomains is too large".to_string()))?;
        }
        if let Some(timeout) = self.timeout {
            config.probe.timeout = config::seconds(timeout, "--timeout")?;
        }

        if let Some(dir) = &self.out {
            config.output.directory = dir.clone();
        }
        if let Some(threads) = self.threads {
            config.resolver.threads = threads;
        }
        if let Some(concurrency) = self.probe_concurrency {
            config.probe.concurrency = concurrency;
        }
        if let Some(deadline) = self.deadline {
            config.deadline = Some(config::seconds(deadline, "--deadline")?);
        }
        if self.no_probe {
            config.probe.enabled = false;
        }
        config.output.json = self.json;
        config.output.silent = self.silent;

        Ok(())
    }
}
