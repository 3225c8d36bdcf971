use anyhow::Result;
use asmfinder::{AsmEngine, Args, Domain};
use clap::Parser;
use log::{error, info};
use std::process;

const BANNER: &str = r#"
   __ _ ___ _ __ ___  / _(_)_ __   __| | ___ _ __
  / _` / __| '_ ` _ \| |_| | '_ \ / _` |/ _ \ '__|
 | (_| \__ \ | | | | |  _| | | | | (_| |  __/ |
  \__,_|___/_| |_| |_|_| |_|_| |_|\__,_|\___|_|

     CT discovery / DNS resolution / HTTP(S) exposure
"#;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let level = if args.verbose {
        log::LevelFilter::Debug
    } else if args.silent {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if !args.silent {
        eprintln!("{}", BANNER);
    }

    // Nothing runs against an invalid root domain
    let domain = match Domain::parse(&args.domain) {
        Ok(domain) => domain,
        Err(e) => {
            error!("{}", e);
            process::exit(2);
        }
    };

    let engine = AsmEngine::new(&args)?;
    engine.cancel_handle().cancel_on_ctrl_c();

    let report = engine
        .run_and_write(domain.as_str())
        .await
        .map_err(|e| anyhow::anyhow!("Scan failed: {}", e))?;

    info!(
        "Scan of {} completed: {} hosts, {} resolved, {} findings in {:.2}s",
        report.metadata.domain,
        report.metadata.asset_count,
        report.metadata.resolved_count,
        report.metadata.finding_count,
        report.metadata.duration_ms as f64 / 1000.0
    );

    Ok(())
}
