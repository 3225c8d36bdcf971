// src/discoverer.rs
//! Hostname discovery from certificate transparency.
//!
//! Discovery is best effort: it only sees names that have appeared on a
//! publicly logged certificate, and an unreachable source degrades to the
//! root domain alone rather than failing the run.

use crate::session::Session;
use crate::sources::CtSource;
use crate::types::{CtRecord, DiscoveryResult, Domain, Hostname};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::time::Instant;

pub struct Discoverer {
    source: Box<dyn CtSource>,
    session: Session,
}

impl Discoverer {
    pub fn new(source: Box<dyn CtSource>, session: Session) -> Self {
        Self { source, session }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub async fn discover(&self, domain: &Domain, limit: usize) -> DiscoveryResult {
        let start = Instant::now();
        debug!("Querying {} for {}", self.source.info().description, domain);

        let records = match self.source.fetch(domain, &self.session).await {
            Ok(records) => {
                debug!(
                    "{}: {} certificate records for {} in {:?}",
                    self.source.name(),
                    records.len(),
                    domain,
                    start.elapsed()
                );
                records
            }
            Err(e) => {
                warn!("{}: no records for {} ({})", self.source.name(), domain, e);
                Vec::new()
            }
        };

        let hostnames = collect_hostnames(&records, domain, limit);
        info!(
            "Discovered {} hostnames for {} via {}",
            hostnames.len(),
            domain,
            self.source.name()
        );
        hostnames
    }
}

/// Flattens certificate records into a sorted, scope-checked, capped hostname list.
///
/// The root domain is always part of the result. While it has not been seen
/// in the records one slot stays reserved for it, so the result never holds
/// more than `limit` names (a `limit` of 0 is treated as 1).
pub fn collect_hostnames(records: &[CtRecord], domain: &Domain, limit: usize) -> DiscoveryResult {
    let limit = limit.max(1);
    let root = Hostname::root(domain);
    let mut hosts = BTreeSet::new();

    let is_full = |hosts: &BTreeSet<Hostname>| {
        let reserved = usize::from(!hosts.contains(&root));
        hosts.len() + reserved >= limit
    };

    'records: for record in records {
        for raw in record.name_value.lines() {
            if is_full(&hosts) {
                break 'records;
            }
            if let Some(host) = Hostname::normalize(raw, domain) {
                hosts.insert(host);
            }
        }
    }

    hosts.insert(root);
    hosts.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AsmError, Config, SourceInfo};
    use async_trait::async_trait;

    struct StaticSource(Vec<CtRecord>);

    #[async_trait]
    impl CtSource for StaticSource {
        fn name(&self) -> &str {
            "static"
        }

        fn info(&self) -> SourceInfo {
            SourceInfo {
                name: "static".to_string(),
                description: "fixed records".to_string(),
            }
        }

        async fn fetch(&self, _domain: &Domain, _session: &Session) -> Result<Vec<CtRecord>, AsmError> {
            Ok(self.0.clone())
        }
    }

    struct DownSource;

    #[async_trait]
    impl CtSource for DownSource {
        fn name(&self) -> &str {
            "down"
        }

        fn info(&self) -> SourceInfo {
            SourceInfo {
                name: "down".to_string(),
                description: "always unavailable".to_string(),
            }
        }

        async fn fetch(&self, _domain: &Domain, _session: &Session) -> Result<Vec<CtRecord>, AsmError> {
            Err(AsmError::SourceUnavailable {
                source_name: "down".to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    fn example() -> Domain {
        Domain::parse("example.com").unwrap()
    }

    fn record(name_value: &str) -> CtRecord {
        CtRecord {
            name_value: name_value.to_string(),
        }
    }

    fn names(result: &DiscoveryResult) -> Vec<&str> {
        result.iter().map(|h| h.as_str()).collect()
    }

    fn discoverer(source: Box<dyn CtSource>) -> Discoverer {
        Discoverer::new(source, Session::new(&Config::default()).unwrap())
    }

    #[test]
    fn test_bundled_record_is_normalized() {
        let records = vec![record("*.example.com\na.example.com\nEXAMPLE.com.")];
        let result = collect_hostnames(&records, &example(), 200);
        assert_eq!(names(&result), vec!["a.example.com", "example.com"]);
    }

    #[test]
    fn test_limit_one_yields_root_only() {
        let records = vec![record("a.example.com\nb.example.com"), record("c.example.com")];
        let result = collect_hostnames(&records, &example(), 1);
        assert_eq!(names(&result), vec!["example.com"]);
    }

    #[test]
    fn test_limit_bounds_result_size() {
        let bundle: Vec<String> = (0..50).map(|i| format!("h{}.example.com", i)).collect();
        let records = vec![record(&bundle.join("\n"))];

        for limit in 1..10 {
            let result = collect_hostnames(&records, &example(), limit);
            assert_eq!(result.len(), limit);
            assert!(result.contains(&Hostname::root(&example())));
        }
    }

    #[test]
    fn test_root_seen_early_does_not_waste_slot() {
        let records = vec![record("example.com\na.example.com\nb.example.com\nc.example.com")];
        let result = collect_hostnames(&records, &example(), 3);
        assert_eq!(names(&result), vec!["a.example.com", "b.example.com", "example.com"]);
    }

    #[test]
    fn test_out_of_scope_and_unsafe_names_dropped() {
        let records = vec![
            record("notexample.com\nexample.com.evil.org\nwww.example.com"),
            record("bad_host.example.com\n\n   \nAPI.Example.COM"),
        ];
        let result = collect_hostnames(&records, &example(), 200);
        assert_eq!(
            names(&result),
            vec!["api.example.com", "example.com", "www.example.com"]
        );
        for host in &result {
            assert!(host.as_str() == "example.com" || host.as_str().ends_with(".example.com"));
        }
    }

    #[test]
    fn test_duplicates_across_records_merge() {
        let records = vec![
            record("a.example.com\nA.example.com."),
            record("a.example.com"),
        ];
        let result = collect_hostnames(&records, &example(), 200);
        assert_eq!(names(&result), vec!["a.example.com", "example.com"]);
    }

    #[tokio::test]
    async fn test_discover_uses_injected_source() {
        let d = discoverer(Box::new(StaticSource(vec![record(
            "*.example.com\na.example.com\nEXAMPLE.com.",
        )])));
        let result = d.discover(&example(), 200).await;
        assert_eq!(names(&result), vec!["a.example.com", "example.com"]);
    }

    #[tokio::test]
    async fn test_discover_unavailable_source_degrades_to_root() {
        let d = discoverer(Box::new(DownSource));
        let result = d.discover(&example(), 200).await;
        assert_eq!(names(&result), vec!["example.com"]);
    }

    #[tokio::test]
    async fn test_discover_unreachable_crtsh_degrades_to_root() {
        // Nothing listens on port 9 locally; the request fails fast.
        let source = crate::sources::CrtShSource::with_base_url("http://127.0.0.1:9");
        let d = discoverer(Box::new(source));
        let result = d.discover(&example(), 200).await;
        assert_eq!(names(&result), vec!["example.com"]);
    }
}
