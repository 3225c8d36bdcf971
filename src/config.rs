use crate::error::{ErrorContext, Result};
use crate::types::{AsmError, Config};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Loads configuration from an optional TOML file, then applies environment overrides.
///
/// Recognised tables: `[general]`, `[source]`, `[resolver]`, `[probe]`, `[output]`.
/// Unknown keys are ignored so older config files keep working.
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            let contents = fs::read_to_string(path)
                .with_context(AsmError::ConfigError, || format!("Failed to read config file {}", path))?;
            apply_toml(&mut config, &contents)?;
        } else {
            log::warn!("Config file {} not found, using defaults", path);
        }
    }

    apply_env_overrides(&mut config);
    validate_config(&config)?;

    Ok(config)
}

pub fn apply_toml(config: &mut Config, contents: &str) -> Result<()> {
    let value: toml::Value =
        toml::from_str(contents)
        .with_context(AsmError::ConfigError, || "Failed to parse config file".to_string())?;

    let Some(table) = value.as_table() else {
        return Ok(());
    };

    if let Some(general) = table.get("general").and_then(|v| v.as_table()) {
        if let Some(ua) = general.get("user_agent").and_then(|v| v.as_str()) {
            config.user_agent = ua.to_string();
        }
        if let Some(proxy) = general.get("proxy").and_then(|v| v.as_str()) {
            config.proxy = Some(proxy.to_string());
        }
        if let Some(secs) = float_field(general, "timeout") {
            config.timeout = seconds(secs, "general.timeout")?;
        }
        if let Some(limit) = general.get("max_subdomains").and_then(|v| v.as_integer()) {
            config.max_subdomains = positive(limit, "general.max_subdomains")?;
        }
        if let Some(secs) = float_field(general, "deadline") {
            config.deadline = Some(seconds(secs, "general.deadline")?);
        }
    }

    if let Some(source) = table.get("source").and_then(|v| v.as_table()) {
        if let Some(name) = source.get("name").and_then(|v| v.as_str()) {
            config.source.name = name.to_string();
        }
        if let Some(url) = source.get("crtsh_url").and_then(|v| v.as_str()) {
            config.source.crtsh_url = url.trim_end_matches('/').to_string();
        }
        if let Some(rate) = source.get("rate_limit").and_then(|v| v.as_integer()) {
            let rate = u32::try_from(rate).ok().filter(|r| *r > 0);
            config.rate_limits.insert(config.source.name.clone(), rate);
        }
    }

    if let Some(resolver) = table.get("resolver").and_then(|v| v.as_table()) {
        if let Some(threads) = resolver.get("threads").and_then(|v| v.as_integer()) {
            config.resolver.threads = positive(threads, "resolver.threads")?;
        }
        if let Some(secs) = float_field(resolver, "timeout") {
            config.resolver.timeout = seconds(secs, "resolver.timeout")?;
        }
        if let Some(system) = resolver.get("use_system_resolver").and_then(|v| v.as_bool()) {
            config.resolver.use_system_resolver = system;
        }
        if let Some(servers) = resolver.get("nameservers").and_then(|v| v.as_array()) {
            config.resolver.nameservers = servers
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect();
        }
    }

    if let Some(probe) = table.get("probe").and_then(|v| v.as_table()) {
        if let Some(enabled) = probe.get("enabled").and_then(|v| v.as_bool()) {
            config.probe.enabled = enabled;
        }
        if let Some(concurrency) = probe.get("concurrency").and_then(|v| v.as_integer()) {
            config.probe.concurrency = positive(concurrency, "probe.concurrency")?;
        }
        if let Some(secs) = float_field(probe, "timeout") {
            config.probe.timeout = seconds(secs, "probe.timeout")?;
        }
        if let Some(redirects) = probe.get("max_redirects").and_then(|v| v.as_integer()) {
            config.probe.max_redirects = positive(redirects, "probe.max_redirects")?;
        }
        if let Some(insecure) = probe.get("accept_invalid_certs").and_then(|v| v.as_bool()) {
            config.probe.accept_invalid_certs = insecure;
        }
    }

    if let Some(output) = table.get("output").and_then(|v| v.as_table()) {
        if let Some(dir) = output.get("directory").and_then(|v| v.as_str()) {
            config.output.directory = dir.to_string();
        }
    }

    Ok(())
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(ua) = env::var("ASM_USER_AGENT") {
        config.user_agent = ua;
    }
    if let Ok(proxy) = env::var("ASM_PROXY") {
        if !proxy.trim().is_empty() {
            config.proxy = Some(proxy.trim().to_string());
        }
    }
    if let Ok(url) = env::var("ASM_CRTSH_URL") {
        config.source.crtsh_url = url.trim().trim_end_matches('/').to_string();
    }
}

pub fn validate_config(config: &Config) -> Result<()> {
    if config.timeout.is_zero() {
        return Err(AsmError::ConfigError("Timeout must be greater than 0".to_string()));
    }
    if config.max_subdomains == 0 {
        return Err(AsmError::ConfigError("max_subdomains must be at least 1".to_string()));
    }
    if config.resolver.threads == 0 {
        return Err(AsmError::ConfigError("Resolver threads must be greater than 0".to_string()));
    }
    if config.resolver.timeout.is_zero() {
        return Err(AsmError::ConfigError("Resolver timeout must be greater than 0".to_string()));
    }
    if config.probe.concurrency == 0 {
        return Err(AsmError::ConfigError("Probe concurrency must be greater than 0".to_string()));
    }
    if config.probe.max_redirects == 0 {
        return Err(AsmError::ConfigError("Probe max_redirects must be at least 1".to_string()));
    }
    if config.probe.timeout.is_zero() {
        return Err(AsmError::ConfigError("Probe timeout must be greater than 0".to_string()));
    }
    if !config.resolver.use_system_resolver && config.resolver.nameservers.is_empty() {
        return Err(AsmError::ConfigError(
            "At least one nameserver is required when the system resolver is disabled".to_string(),
        ));
    }
    Ok(())
}

/// Converts a user-supplied seconds value, rejecting zero, negatives and NaN.
pub fn seconds(secs: f64, field: &str) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(AsmError::ConfigError(format!("{} must be a positive number of seconds", field)));
    }
    Duration::try_from_secs_f64(secs).with_context(AsmError::ConfigError, || format!("Invalid {}", field))
}

fn positive(value: i64, field: &str) -> Result<usize> {
    usize::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| AsmError::ConfigError(format!("{} must be a positive integer", field)))
}

fn float_field(table: &toml::map::Map<String, toml::Value>, key: &str) -> Option<f64> {
    table
        .get(key)
        .and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.max_subdomains, 200);
        assert_eq!(config.probe.timeout, Duration::from_secs(8));
    }

    #[test]
    fn test_apply_toml_sections() {
        let mut config = Config::default();
        let contents = r#"
            [general]
            user_agent = "scanner/2"
            max_subdomains = 50
            timeout = 20

            [source]
            crtsh_url = "http://localhost:8080/"

            [resolver]
            threads = 8
            timeout = 2.5
            use_system_resolver = false
            nameservers = ["9.9.9.9:53"]

            [probe]
            concurrency = 4
            timeout = 3.0
            accept_invalid_certs = false
        "#;

        apply_toml(&mut config, contents).unwrap();

        assert_eq!(config.user_agent, "scanner/2");
        assert_eq!(config.max_subdomains, 50);
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.source.crtsh_url, "http://localhost:8080");
        assert_eq!(config.resolver.threads, 8);
        assert_eq!(config.resolver.timeout, Duration::from_millis(2500));
        assert!(!config.resolver.use_system_resolver);
        assert_eq!(config.resolver.nameservers, vec!["9.9.9.9:53".to_string()]);
        assert_eq!(config.probe.concurrency, 4);
        assert_eq!(config.probe.timeout, Duration::from_secs(3));
        assert!(!config.probe.accept_invalid_certs);
    }

    #[test]
    fn test_example_config_parses() {
        let mut config = Config::default();
        apply_toml(&mut config, include_str!("../config.example.toml")).unwrap();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.source.crtsh_url, "https://crt.sh");
        assert_eq!(config.rate_limits.get("crtsh"), Some(&Some(1)));
    }

    #[test]
    fn test_apply_toml_rejects_zero_threads() {
        let mut config = Config::default();
        let err = apply_toml(&mut config, "[resolver]\nthreads = 0\n").unwrap_err();
        assert!(err.to_string().contains("resolver.threads"));
    }

    #[test]
    fn test_zero_redirects_rejected() {
        let mut config = Config::default();
        let err = apply_toml(&mut config, "[probe]\nmax_redirects = 0\n").unwrap_err();
        assert!(err.to_string().contains("probe.max_redirects"));

        config.probe.max_redirects = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_apply_toml_rejects_garbage() {
        let mut config = Config::default();
        assert!(apply_toml(&mut config, "not = [valid").is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[probe]\nenabled = false").unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert!(!config.probe.enabled);
    }

    #[test]
    fn test_seconds_rejects_non_positive() {
        assert!(seconds(0.0, "timeout").is_err());
        assert!(seconds(-1.0, "timeout").is_err());
        assert!(seconds(f64::NAN, "timeout").is_err());
        assert_eq!(seconds(0.5, "timeout").unwrap(), Duration::from_millis(500));
    }
}
