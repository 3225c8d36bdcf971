// src/sources/mod.rs
use crate::session::Session;
use crate::types::{AsmError, Config, CtRecord, Domain, SourceInfo};
use async_trait::async_trait;

mod crtsh;

pub use crtsh::CrtShSource;

/// A certificate-transparency search backend.
///
/// Implementations only fetch raw records; hostname validation, deduplication
/// and capping belong to the discoverer.
#[async_trait]
pub trait CtSource: Send + Sync {
    fn name(&self) -> &str;
    fn info(&self) -> SourceInfo;
    async fn fetch(&self, domain: &Domain, session: &Session) -> Result<Vec<CtRecord>, AsmError>;
}

pub fn create_source(name: &str, config: &Config) -> Option<Box<dyn CtSource>> {
    match name.to_lowercase().as_str() {
        "crtsh" => Some(Box::new(CrtShSource::with_base_url(&config.source.crtsh_url))),
        _ => None,
    }
}
