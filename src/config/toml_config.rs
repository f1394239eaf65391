use crate::core::aggregator::ReportFormat;
use crate::utils::error::{CheckError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub probe: ProbeSection,
    pub retry: RetrySection,
    pub cache: CacheSection,
    pub store: StoreSection,
    pub output: OutputSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSection {
    /// Page fetched per identifier; `{id}` is replaced by the digits.
    pub url_template: String,
    /// Link rendered next to each positive identifier.
    pub link_template: String,
    /// Checked in order, case-insensitively. First match means positive.
    pub positive_phrases: Vec<String>,
    pub timeout_seconds: u64,
    pub max_concurrency: usize,
    pub pool_max_idle_per_host: usize,
    pub user_agent: String,
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self {
            url_template: "https://fragment.com/number/{id}".to_string(),
            link_template: "https://fragment.com/number/{id}".to_string(),
            positive_phrases: vec![
                "restricted on telegram".to_string(),
                "this number is restricted".to_string(),
            ],
            timeout_seconds: 10,
            max_concurrency: 100,
            pool_max_idle_per_host: 20,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_retries: u32,
    /// Delay before each retry; the last value repeats.
    pub backoff_ms: Vec<u64>,
    /// Status codes that signal rate limiting.
    pub retry_statuses: Vec<u16>,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff_ms: vec![1000],
            retry_statuses: vec![429],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub enabled: bool,
    pub ttl_seconds: u64,
    /// Lifetime of Unknown outcomes, capped at `ttl_seconds`.
    pub unknown_ttl_seconds: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 3600,
            unknown_ttl_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub path: String,
    pub max_per_owner: usize,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: "saved_numbers.json".to_string(),
            max_per_owner: 400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub lines_per_chunk: usize,
    pub max_chunk_chars: usize,
    pub unknown_sample_cap: usize,
    pub inline_max: usize,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            lines_per_chunk: 30,
            max_chunk_chars: 4096,
            unknown_sample_cap: 20,
            inline_max: 50,
        }
    }
}

impl ProbeConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CheckError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| CheckError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${PROBE_HOST})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| CheckError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url_template("probe.url_template", &self.probe.url_template)?;
        validation::validate_url_template("probe.link_template", &self.probe.link_template)?;
        validation::validate_phrases("probe.positive_phrases", &self.probe.positive_phrases)?;
        validation::validate_positive_number(
            "probe.timeout_seconds",
            self.probe.timeout_seconds as usize,
            1,
        )?;
        validation::validate_positive_number(
            "probe.max_concurrency",
            self.probe.max_concurrency,
            1,
        )?;
        validation::validate_positive_number(
            "probe.pool_max_idle_per_host",
            self.probe.pool_max_idle_per_host,
            1,
        )?;
        validation::validate_path("store.path", &self.store.path)?;
        validation::validate_positive_number("store.max_per_owner", self.store.max_per_owner, 1)?;
        validation::validate_positive_number(
            "output.lines_per_chunk",
            self.output.lines_per_chunk,
            1,
        )?;
        // header plus one line has to fit
        validation::validate_positive_number(
            "output.max_chunk_chars",
            self.output.max_chunk_chars,
            256,
        )?;
        validation::validate_positive_number("output.inline_max", self.output.inline_max, 1)?;
        validation::validate_range("retry.max_retries", self.retry.max_retries, 0, 1)?;

        let widest = ReportFormat::from_config(&self.output, &self.probe.link_template)
            .widest_line(self.store.max_per_owner.max(self.output.inline_max));
        if widest > self.output.max_chunk_chars {
            return Err(CheckError::InvalidConfigValueError {
                field: "probe.link_template".to_string(),
                value: self.probe.link_template.clone(),
                reason: format!(
                    "A result line can reach {} characters, over output.max_chunk_chars ({})",
                    widest, self.output.max_chunk_chars
                ),
            });
        }

        if self.retry.max_retries > 0 && self.retry.backoff_ms.is_empty() {
            return Err(CheckError::MissingConfigError {
                field: "retry.backoff_ms".to_string(),
            });
        }

        Ok(())
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache.ttl_seconds as i64)
    }

    pub fn unknown_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache.unknown_ttl_seconds.min(self.cache.ttl_seconds) as i64)
    }
}

impl Validate for ProbeConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ProbeConfig::from_toml_str("").unwrap();

        assert_eq!(config.probe.max_concurrency, 100);
        assert_eq!(config.retry.retry_statuses, vec![429]);
        assert_eq!(config.cache.ttl_seconds, 3600);
        assert_eq!(config.output.lines_per_chunk, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[probe]
url_template = "https://example.com/n/{id}"
link_template = "https://example.com/n/{id}"
positive_phrases = ["Restricted", "banned"]
timeout_seconds = 3
max_concurrency = 8

[retry]
max_retries = 1
backoff_ms = [250]
retry_statuses = [429, 503]

[cache]
enabled = false

[store]
path = "/tmp/saved.json"
max_per_owner = 1000

[output]
unknown_sample_cap = 100
"#;

        let config = ProbeConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.probe.url_template, "https://example.com/n/{id}");
        assert_eq!(config.probe.positive_phrases, vec!["Restricted", "banned"]);
        assert_eq!(config.probe.max_concurrency, 8);
        assert_eq!(config.retry.retry_statuses, vec![429, 503]);
        assert!(!config.cache.enabled);
        assert_eq!(config.store.max_per_owner, 1000);
        assert_eq!(config.output.unknown_sample_cap, 100);
        assert_eq!(config.output.lines_per_chunk, 30);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TEST_PROBE_HOST", "probe.example.org");

        let toml_content = r#"
[probe]
url_template = "https://${TEST_PROBE_HOST}/number/{id}"
"#;

        let config = ProbeConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.probe.url_template,
            "https://probe.example.org/number/{id}"
        );

        std::env::remove_var("TEST_PROBE_HOST");
    }

    #[test]
    fn test_config_validation() {
        let toml_content = r#"
[probe]
url_template = "https://example.com/no-placeholder"
"#;
        let config = ProbeConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());

        let toml_content = r#"
[probe]
positive_phrases = []
"#;
        let config = ProbeConfig::from_toml_str(toml_content).unwrap();
        assert!(matches!(
            config.validate(),
            Err(CheckError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_retry_count_is_capped_at_one() {
        let config = ProbeConfig::from_toml_str("[retry]\nmax_retries = 5\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(CheckError::InvalidConfigValueError { ref field, .. }) if field == "retry.max_retries"
        ));

        let config = ProbeConfig::from_toml_str("[retry]\nmax_retries = 0\n").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_link_template_must_fit_one_chunk() {
        let long_path = "x".repeat(400);
        let toml_content = format!(
            "[probe]\nlink_template = \"https://example.com/{}/{{id}}\"\n[output]\nmax_chunk_chars = 300\n",
            long_path
        );
        let config = ProbeConfig::from_toml_str(&toml_content).unwrap();
        assert!(matches!(
            config.validate(),
            Err(CheckError::InvalidConfigValueError { ref field, .. }) if field == "probe.link_template"
        ));
    }

    #[test]
    fn test_unknown_ttl_never_exceeds_ttl() {
        let config =
            ProbeConfig::from_toml_str("[cache]\nttl_seconds = 30\nunknown_ttl_seconds = 600\n")
                .unwrap();
        assert_eq!(config.unknown_ttl(), chrono::Duration::seconds(30));
        assert_eq!(
            ProbeConfig::default().unknown_ttl(),
            chrono::Duration::seconds(60)
        );
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[store]\nmax_per_owner = 2\n")
            .unwrap();

        let config = ProbeConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.store.max_per_owner, 2);
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = ProbeConfig::from_toml_str("[probe\n").unwrap_err();
        assert!(matches!(err, CheckError::ConfigValidationError { .. }));
    }
}
