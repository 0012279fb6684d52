use crate::config::types::{
    Config, CrawlerConfig, FetchConfig, FilterConfig, ReclaimConfig, StorageConfig,
    UserAgentConfig,
};
use crate::url::normalize_url;
use crate::ConfigError;
use url::Url;

const MAX_WORKERS: u32 = 256;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_storage_config(&config.storage)?;
    validate_reclaim_config(&config.reclaim, &config.fetch)?;
    validate_fetch_config(&config.fetch)?;
    validate_filter_config(&config.filter)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.idle_poll_ms < 10 {
        return Err(ConfigError::Validation(format!(
            "idle-poll-ms must be >= 10ms, got {}ms",
            config.idle_poll_ms
        )));
    }

    if config.progress_interval_secs < 1 {
        return Err(ConfigError::Validation(
            "progress-interval-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.max_retries > 20 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= 20, got {}",
            config.max_retries
        )));
    }

    if config.retry_backoff_ms < 1 {
        return Err(ConfigError::Validation(
            "retry-backoff-ms must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the reclaim window against the fetch timeout
fn validate_reclaim_config(reclaim: &ReclaimConfig, fetch: &FetchConfig) -> Result<(), ConfigError> {
    if reclaim.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "reclaim timeout-secs must be >= 1".to_string(),
        ));
    }

    if reclaim.interval_secs < 1 {
        return Err(ConfigError::Validation(
            "reclaim interval-secs must be >= 1".to_string(),
        ));
    }

    if reclaim.timeout_secs <= fetch.timeout_secs {
        return Err(ConfigError::Validation(format!(
            "reclaim timeout-secs ({}) must exceed fetch timeout-secs ({})",
            reclaim.timeout_secs, fetch.timeout_secs
        )));
    }

    Ok(())
}

/// Validates fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.render_pool_size == Some(0) {
        return Err(ConfigError::Validation(
            "render-pool-size must be >= 1 when set".to_string(),
        ));
    }

    if matches!(&config.archive_dir, Some(dir) if dir.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "archive-dir cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates admission filter configuration
fn validate_filter_config(config: &FilterConfig) -> Result<(), ConfigError> {
    for pattern in &config.allowed_domains {
        validate_domain_pattern(pattern)?;
    }
    Ok(())
}

/// Validates seed URLs
fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    for seed in seeds {
        normalize_url(seed, None)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;
    }
    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    let domain = pattern.strip_prefix("*.").unwrap_or(pattern);
    validate_domain_string(domain)
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = email.split('@').collect();
    match parts.as_slice() {
        [local, domain] if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ConfigError::Validation(format!(
            "Invalid contact-email: '{}'",
            email
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const BASE: &str = r#"
[crawler]
max-depth = 2

[user-agent]
crawler-name = "TestSpider"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[storage]
database-path = "./frontier.db"
"#;

    fn with_extra(extra: &str) -> String {
        format!("{}\n{}", BASE, extra)
    }

    #[test]
    fn test_base_config_is_valid() {
        assert!(parse_config(BASE).is_ok());
    }

    #[test]
    fn test_validate_domain_pattern() {
        assert!(validate_domain_pattern("example.com").is_ok());
        assert!(validate_domain_pattern("*.example.com").is_ok());
        assert!(validate_domain_pattern("localhost").is_ok());
        assert!(validate_domain_pattern("127.0.0.1").is_ok());

        assert!(validate_domain_pattern("").is_err());
        assert!(validate_domain_pattern("*.").is_err());
        assert!(validate_domain_pattern(".example.com").is_err());
        assert!(validate_domain_pattern("example.com.").is_err());
        assert!(validate_domain_pattern("exa mple.com").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@domain").is_err());
        assert!(validate_email("a@b@c.com").is_err());
    }

    #[test]
    fn test_reclaim_timeout_must_exceed_fetch_timeout() {
        let content = with_extra("[reclaim]\ntimeout-secs = 10\n\n[fetch]\ntimeout-secs = 30\n");
        let err = parse_config(&content).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("must exceed")));
    }

    #[test]
    fn test_zero_render_pool_rejected() {
        let content = with_extra("[fetch]\nrender-pool-size = 0\n");
        assert!(matches!(
            parse_config(&content),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_bad_allowed_domain_rejected() {
        let content = with_extra("[filter]\nallowed-domains = [\"bad domain\"]\n");
        assert!(matches!(
            parse_config(&content),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_bad_seed_rejected() {
        let content = format!("seeds = [\"ftp://example.com/\"]\n{}", BASE);
        assert!(matches!(
            parse_config(&content),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_too_many_workers_rejected() {
        let content = BASE.replace("max-depth = 2", "max-depth = 2\nworkers = 1000");
        assert!(matches!(
            parse_config(&content),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_idle_poll_floor() {
        let content = BASE.replace("max-depth = 2", "max-depth = 2\nidle-poll-ms = 1");
        assert!(matches!(
            parse_config(&content),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_crawler_name_characters() {
        let content = BASE.replace("\"TestSpider\"", "\"Test Spider!\"");
        assert!(matches!(
            parse_config(&content),
            Err(ConfigError::Validation(_))
        ));
    }
}
