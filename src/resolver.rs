// src/resolver.rs
use crate::shutdown::Cancellation;
use crate::types::{AsmError, Asset, Hostname, ResolverConfig};
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use trust_dns_resolver::config::{
    LookupIpStrategy, NameServerConfig, Protocol, ResolverConfig as DnsResolverConfig, ResolverOpts,
};
use trust_dns_resolver::TokioAsyncResolver;

pub struct Resolver {
    resolver: TokioAsyncResolver,
    semaphore: Arc<Semaphore>,
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Result<Self, AsmError> {
        let resolver = if config.use_system_resolver {
            match trust_dns_resolver::system_conf::read_system_conf() {
                Ok((system_config, opts)) => {
                    TokioAsyncResolver::tokio(system_config, Self::tune(opts, &config))
                }
                Err(e) => {
                    warn!("Failed to read system resolver configuration ({}), using configured nameservers", e);
                    Self::from_nameservers(&config)?
                }
            }
        } else {
            Self::from_nameservers(&config)?
        };

        Ok(Self {
            resolver,
            semaphore: Arc::new(Semaphore::new(config.threads.max(1))),
            config,
        })
    }

    fn from_nameservers(config: &ResolverConfig) -> Result<TokioAsyncResolver, AsmError> {
        let mut resolver_config = DnsResolverConfig::new();

        for ns in &config.nameservers {
            let socket_addr = SocketAddr::from_str(ns)
                .map_err(|e| AsmError::ConfigError(format!("Invalid nameserver address {}: {}", ns, e)))?;
            resolver_config.add_name_server(NameServerConfig {
                socket_addr,
                protocol: Protocol::Udp,
                tls_dns_name: None,
                trust_negative_responses: false,
                bind_addr: None,
            });
        }

        if resolver_config.name_servers().is_empty() {
            return Err(AsmError::ConfigError("No nameservers configured".to_string()));
        }

        Ok(TokioAsyncResolver::tokio(
            resolver_config,
            Self::tune(ResolverOpts::default(), config),
        ))
    }

    fn tune(mut opts: ResolverOpts, config: &ResolverConfig) -> ResolverOpts {
        opts.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
        opts.timeout = config.timeout;
        opts.attempts = 1;
        opts
    }

    /// Resolves every hostname to its A/AAAA addresses.
    ///
    /// The output has one asset per input hostname, in input order. Hosts that
    /// fail to resolve, time out or are cancelled get an empty address list.
    pub async fn resolve(&self, hostnames: &[Hostname], cancel: &Cancellation) -> Vec<Asset> {
        let mut futures = FuturesUnordered::new();

        for (idx, hostname) in hostnames.iter().enumerate() {
            let semaphore = self.semaphore.clone();

            futures.push(async move {
                let _permit = semaphore.acquire().await.ok();
                let ips = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Resolution of {} cancelled", hostname);
                        Vec::new()
                    }
                    result = self.resolve_hostname(hostname) => match result {
                        Ok(ips) => ips,
                        Err(e) => {
                            debug!("{}", e);
                            Vec::new()
                        }
                    },
                };
                (idx, ips)
            });
        }

        let mut resolved: Vec<Vec<String>> = vec![Vec::new(); hostnames.len()];
        while let Some((idx, ips)) = futures.next().await {
            resolved[idx] = ips;
        }

        let assets: Vec<Asset> = hostnames
            .iter()
            .cloned()
            .zip(resolved)
            .map(|(host, ips)| Asset { host, ips })
            .collect();

        info!(
            "Resolved {}/{} hostnames",
            assets.iter().filter(|a| a.is_resolved()).count(),
            assets.len()
        );
        assets
    }

    /// Looks up one hostname, returning its addresses sorted and deduplicated.
    pub async fn resolve_hostname(&self, hostname: &Hostname) -> Result<Vec<String>, AsmError> {
        // trust-dns treats names without a trailing dot as relative to the search list
        let fqdn = format!("{}.", hostname);
        let lookup = tokio::time::timeout(self.config.timeout * 2, self.resolver.lookup_ip(fqdn))
            .await
            .map_err(|_| AsmError::ResolutionFailure {
                host: hostname.to_string(),
                message: "lookup timed out".to_string(),
            })?
            .map_err(|e| AsmError::ResolutionFailure {
                host: hostname.to_string(),
                message: e.to_string(),
            })?;

        let ips: BTreeSet<IpAddr> = lookup.iter().collect();
        Ok(ips.into_iter().map(|ip| ip.to_string()).collect())
    }
}
