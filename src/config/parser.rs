use crate::config::types::{CompanyEntry, Config};
use crate::config::validation::{validate, validate_companies};
use crate::ConfigError;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use filing_finder::config::load_config;
///
/// let config = load_config(Path::new("finder.toml")).unwrap();
/// println!("Max depth: {}", config.crawler.max_depth);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Recorded with every run so results can be traced to the settings that
/// produced them.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// One entry of a companies JSON file
#[derive(Debug, Deserialize)]
struct CompanySeed {
    company_name: String,
    ticker: String,
    #[serde(alias = "reports_link")]
    root_url: String,
    #[serde(default)]
    allowed_hosts: Vec<String>,
}

/// Loads a list of companies from a JSON file
///
/// The file holds an array of `{company_name, ticker, root_url}` objects;
/// `reports_link` is accepted in place of `root_url`.
///
/// # Arguments
///
/// * `path` - Path to the JSON file
///
/// # Returns
///
/// * `Ok(Vec<CompanyEntry>)` - The validated companies, in file order
/// * `Err(ConfigError)` - Failed to read, parse, or validate the file
pub fn load_companies(path: &Path) -> Result<Vec<CompanyEntry>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let seeds: Vec<CompanySeed> = serde_json::from_str(&content)?;

    let companies: Vec<CompanyEntry> = seeds
        .into_iter()
        .map(|seed| CompanyEntry {
            name: seed.company_name,
            ticker: seed.ticker,
            root_url: seed.root_url,
            allowed_hosts: seed.allowed_hosts,
        })
        .collect();

    validate_companies(&companies)?;
    Ok(companies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const VALID_CONFIG: &str = r#"
[crawler]
max-depth = 2
max-concurrent-fetches = 4
politeness-delay-ms = 500
years-back = 5

[user-agent]
crawler-name = "FilingFinder"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[ranking]
best-margin = 10

[output]
database-path = "./test.db"
registry-path = "./annual_reports_ranked.json"

[[company]]
name = "Adyen"
ticker = "ADYEN"
root-url = "https://investors.adyen.com/financials"
allowed-hosts = ["*.adyen.com"]
"#;

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_file(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_depth, 2);
        assert_eq!(config.crawler.years_back, 5);
        assert_eq!(config.ranking.best_margin, 10);
        assert_eq!(config.user_agent.crawler_name, "FilingFinder");
        assert_eq!(config.company.len(), 1);
        assert_eq!(config.company[0].allowed_hosts, vec!["*.adyen.com"]);
    }

    #[test]
    fn test_defaults_applied() {
        let file = create_temp_file(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_retries, 3);
        assert_eq!(config.crawler.retry_base_delay_ms, 1000);
        assert!(config.crawler.respect_robots);
        assert_eq!(config.ranking.max_secondary, 2);
        assert!((config.consolidation.relative_tolerance - 0.005).abs() < f64::EPSILON);
        assert!(config
            .policy
            .deny_domains
            .contains(&"*.linkedin.com".to_string()));
        assert!(config
            .policy
            .deny_path_segments
            .contains(&"login".to_string()));
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/finder.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_file("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = VALID_CONFIG.replace("max-concurrent-fetches = 4", "max-concurrent-fetches = 0");
        let file = create_temp_file(&content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_file("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_file("content 1");
        let file2 = create_temp_file("content 2");

        assert_ne!(
            compute_config_hash(file1.path()).unwrap(),
            compute_config_hash(file2.path()).unwrap()
        );
    }

    #[test]
    fn test_load_companies_accepts_reports_link() {
        let file = create_temp_file(
            r#"[
                {"company_name": "Adyen", "ticker": "ADYEN", "reports_link": "https://investors.adyen.com/financials"},
                {"company_name": "SAP", "ticker": "SAP", "root_url": "https://www.sap.com/investors/en/reports.html"}
            ]"#,
        );

        let companies = load_companies(file.path()).unwrap();
        assert_eq!(companies.len(), 2);
        assert_eq!(companies[0].ticker, "ADYEN");
        assert_eq!(companies[0].root_url, "https://investors.adyen.com/financials");
        assert_eq!(companies[1].name, "SAP");
    }

    #[test]
    fn test_load_companies_rejects_bad_url() {
        let file = create_temp_file(
            r#"[{"company_name": "Broken", "ticker": "BRK", "root_url": "not a url"}]"#,
        );
        let result = load_companies(file.path());
        assert!(matches!(result, Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_load_companies_malformed_json() {
        let file = create_temp_file("[{");
        let result = load_companies(file.path());
        assert!(matches!(result, Err(ConfigError::Companies(_))));
    }
}
