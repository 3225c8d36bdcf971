// src/lib.rs
pub mod cli;
pub mod config;
pub mod discoverer;
pub mod engine;
pub mod error;
pub mod output;
pub mod prober;
pub mod report;
pub mod resolver;
pub mod session;
pub mod shutdown;
pub mod sources;
pub mod types;

pub use cli::Args;
pub use discoverer::Discoverer;
pub use engine::AsmEngine;
pub use prober::Prober;
pub use resolver::Resolver;
pub use types::{AsmError, Asset, Config, DiscoveryResult, Domain, Finding, Hostname, ScanReport};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
