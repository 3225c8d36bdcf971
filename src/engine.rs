use crate::cli::Args;
use crate::config;
use crate::discoverer::Discoverer;
use crate::output::OutputManager;
use crate::prober::Prober;
use crate::resolver::Resolver;
use crate::session::Session;
use crate::shutdown::{self, CancelHandle, Cancellation};
use crate::sources::create_source;
use crate::types::{AsmError, Config, Domain, RunMetadata, ScanReport};
use chrono::{SecondsFormat, Utc};
use log::info;
use std::time::Instant;

pub struct AsmEngine {
    config: Config,
    discoverer: Discoverer,
    resolver: Resolver,
    prober: Prober,
    output_manager: OutputManager,
    cancel_handle: CancelHandle,
    cancel: Cancellation,
}

impl AsmEngine {
    pub fn new(args: &Args) -> Result<Self, AsmError> {
        let mut config = config::load_config(args.config_path.as_deref())?;
        args.apply_to(&mut config)?;
        config::validate_config(&config)?;

        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Result<Self, AsmError> {
        let session = Session::new(&config)?;

        let source = create_source(&config.source.name, &config).ok_or_else(|| {
            AsmError::ConfigError(format!("Unknown certificate transparency source: {}", config.source.name))
        })?;
        let discoverer = Discoverer::new(source, session);

        let resolver = Resolver::new(config.resolver.clone())?;

        let show_progress = !config.output.silent && atty::is(atty::Stream::Stderr);
        let prober = Prober::new(config.probe.clone(), &config.user_agent, config.proxy.as_deref())?
            .with_progress(show_progress);

        let output_manager = OutputManager::new(config.output.clone());
        let (cancel_handle, cancel) = shutdown::channel();

        Ok(Self {
            config,
            discoverer,
            resolver,
            prober,
            output_manager,
            cancel_handle,
            cancel,
        })
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel_handle.clone()
    }

    /// Runs discovery, resolution and probing for `domain`.
    ///
    /// Only an invalid domain fails the run; per-host failures are recorded
    /// in the report as empty address lists or error findings.
    pub async fn run(&self, domain: &str) -> Result<ScanReport, AsmError> {
        let domain = Domain::parse(domain)?;
        let start = Instant::now();

        if let Some(deadline) = self.config.deadline {
            self.cancel_handle.cancel_after(deadline);
        }

        info!("Discovering hostnames for {}", domain);
        let subdomains = self.discoverer.discover(&domain, self.config.max_subdomains).await;

        info!("Resolving {} hostnames", subdomains.len());
        let assets = self.resolver.resolve(&subdomains, &self.cancel).await;

        let findings = if self.config.probe.enabled {
            info!("Probing {} assets over HTTP(S)", assets.len());
            self.prober
                .probe(&assets, self.config.probe.timeout, &self.cancel)
                .await
        } else {
            info!("Probing disabled, skipping HTTP(S) checks");
            Vec::new()
        };

        let metadata = RunMetadata {
            domain,
            generated_at: utc_now_iso(),
            version: crate::VERSION.to_string(),
            source: self.discoverer.source_name().to_string(),
            subdomain_count: subdomains.len(),
            asset_count: assets.len(),
            resolved_count: assets.iter().filter(|a| a.is_resolved()).count(),
            finding_count: findings.len(),
            error_count: findings.iter().filter(|f| f.is_error()).count(),
            cancelled: self.cancel.is_cancelled(),
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        Ok(ScanReport {
            metadata,
            subdomains,
            assets,
            findings,
        })
    }

    /// Runs the pipeline and persists the report.
    pub async fn run_and_write(&self, domain: &str) -> Result<ScanReport, AsmError> {
        let report = self.run(domain).await?;
        self.output_manager.write_report(&report)?;
        Ok(report)
    }
}

pub fn utc_now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
