use crate::config::types::{
    CompanyEntry, Config, ConsolidationConfig, CrawlerConfig, OutputConfig, PolicyConfig,
    RankingConfig, UserAgentConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_ranking_config(&config.ranking)?;
    validate_consolidation_config(&config.consolidation)?;
    validate_output_config(&config.output)?;
    validate_policy_config(&config.policy)?;
    validate_companies(&config.company)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and 100, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.politeness_delay_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "politeness_delay_ms must be >= 100ms, got {}ms",
            config.politeness_delay_ms
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.time_budget_secs < 1 {
        return Err(ConfigError::Validation(
            "time_budget_secs must be >= 1".to_string(),
        ));
    }

    if config.max_retries < 1 || config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be between 1 and 10, got {}",
            config.max_retries
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.years_back < 1 {
        return Err(ConfigError::Validation(
            "years_back must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_ranking_config(config: &RankingConfig) -> Result<(), ConfigError> {
    if config.best_margin < 0 {
        return Err(ConfigError::Validation(format!(
            "best_margin must be >= 0, got {}",
            config.best_margin
        )));
    }
    Ok(())
}

fn validate_consolidation_config(config: &ConsolidationConfig) -> Result<(), ConfigError> {
    let tolerance = config.relative_tolerance;
    if !tolerance.is_finite() || !(0.0..1.0).contains(&tolerance) {
        return Err(ConfigError::Validation(format!(
            "relative_tolerance must be in [0, 1), got {}",
            tolerance
        )));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("database_path", &config.database_path),
        ("registry_path", &config.registry_path),
        ("consolidated_path", &config.consolidated_path),
        ("quality_path", &config.quality_path),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }
    Ok(())
}

fn validate_policy_config(config: &PolicyConfig) -> Result<(), ConfigError> {
    for pattern in &config.deny_domains {
        validate_domain_pattern(pattern)?;
    }

    for segment in &config.deny_path_segments {
        if segment.is_empty() || segment.contains('/') {
            return Err(ConfigError::Validation(format!(
                "deny_path_segments entries must be single non-empty path segments, got '{}'",
                segment
            )));
        }
    }
    Ok(())
}

/// Validates company entries
///
/// Tickers must be unique since they key the report registry.
pub fn validate_companies(companies: &[CompanyEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for company in companies {
        validate_ticker(&company.ticker)?;

        if !seen.insert(company.ticker.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate ticker '{}'",
                company.ticker
            )));
        }

        let url = Url::parse(&company.root_url).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Invalid root URL '{}' for {}: {}",
                company.root_url, company.ticker, e
            ))
        })?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::InvalidUrl(format!(
                "Root URL '{}' must use HTTP or HTTPS",
                company.root_url
            )));
        }

        for pattern in &company.allowed_hosts {
            validate_domain_pattern(pattern)?;
        }
    }

    Ok(())
}

fn validate_ticker(ticker: &str) -> Result<(), ConfigError> {
    if ticker.is_empty() {
        return Err(ConfigError::Validation("ticker cannot be empty".to_string()));
    }

    if !ticker
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "ticker must contain only letters, digits, '.' and '-', got '{}'",
            ticker
        )));
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

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::Validation(format!("Invalid email format: '{}'", email));

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(invalid());
    }
    Ok(())
}
