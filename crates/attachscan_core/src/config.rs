use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::labels::Locale;

pub const DEFAULT_CONFIG_FILENAME: &str = "attachscan.toml";
pub const DEFAULT_USER_AGENT: &str = "attachscan/0.1";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_TOP_ROWS: usize = 100;

const ENV_BASE_URL: &str = "CONFLUENCE_BASE_URL";
const ENV_USER: &str = "CONFLUENCE_USER";
const ENV_API_TOKEN: &str = "CONFLUENCE_API_TOKEN";
const ENV_LABELS: &str = "ATTACHSCAN_LABELS";
const ENV_TIMEOUT_MS: &str = "ATTACHSCAN_HTTP_TIMEOUT_MS";
const ENV_USER_AGENT: &str = "ATTACHSCAN_USER_AGENT";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct AuditConfig {
    #[serde(default)]
    pub confluence: ConfluenceSection,
    #[serde(default)]
    pub report: ReportSection,
    #[serde(default)]
    pub http: HttpSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ConfluenceSection {
    pub base_url: Option<String>,
    pub user: Option<String>,
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ReportSection {
    pub labels: Option<String>,
    pub top_rows: Option<usize>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct HttpSection {
    pub timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
}

/// Values given on the command line; they win over env and config.
#[derive(Debug, Clone, Default)]
pub struct CredentialOverrides {
    pub base_url: Option<String>,
    pub user: Option<String>,
    pub api_token: Option<String>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub base_url: String,
    pub user: String,
    pub api_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

impl AuditConfig {
    /// Resolve the site base URL: env CONFLUENCE_BASE_URL > config > None.
    pub fn base_url(&self) -> Option<String> {
        env_override(ENV_BASE_URL).or_else(|| usable(self.confluence.base_url.as_deref()))
    }

    /// Resolve the account identifier: env CONFLUENCE_USER > config > None.
    pub fn user(&self) -> Option<String> {
        env_override(ENV_USER).or_else(|| usable(self.confluence.user.as_deref()))
    }

    /// Resolve the access token: env CONFLUENCE_API_TOKEN > config > None.
    pub fn api_token(&self) -> Option<String> {
        env_override(ENV_API_TOKEN).or_else(|| usable(self.confluence.api_token.as_deref()))
    }

    pub fn locale(&self) -> Result<Locale> {
        match env_override(ENV_LABELS).or_else(|| usable(self.report.labels.as_deref())) {
            Some(value) => Locale::parse(&value),
            None => Ok(Locale::default()),
        }
    }

    pub fn top_rows(&self) -> usize {
        self.report.top_rows.unwrap_or(DEFAULT_TOP_ROWS)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.report
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn timeout_ms(&self) -> u64 {
        env_override(ENV_TIMEOUT_MS)
            .and_then(|value| value.parse::<u64>().ok())
            .or(self.http.timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    /// Resolve user agent: env ATTACHSCAN_USER_AGENT > config > DEFAULT_USER_AGENT.
    pub fn user_agent(&self) -> String {
        env_override(ENV_USER_AGENT)
            .or_else(|| usable(self.http.user_agent.as_deref()))
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    /// Combine flags, env and config into credentials.
    ///
    /// Every missing key is named in one error so the operator can fix them
    /// all before the next attempt.
    pub fn credentials(&self, overrides: &CredentialOverrides) -> Result<Credentials> {
        let base_url = usable(overrides.base_url.as_deref()).or_else(|| self.base_url());
        let user = usable(overrides.user.as_deref()).or_else(|| self.user());
        let api_token = usable(overrides.api_token.as_deref()).or_else(|| self.api_token());

        match (base_url, user, api_token) {
            (Some(base_url), Some(user), Some(api_token)) => Ok(Credentials {
                base_url,
                user,
                api_token,
            }),
            (base_url, user, api_token) => {
                let mut missing = Vec::new();
                if base_url.is_none() {
                    missing.push(format!(
                        "base URL (--base-url, {ENV_BASE_URL}, confluence.base_url)"
                    ));
                }
                if user.is_none() {
                    missing.push(format!("account (--user, {ENV_USER}, confluence.user)"));
                }
                if api_token.is_none() {
                    missing.push(format!(
                        "API token (--token, {ENV_API_TOKEN}, confluence.api_token)"
                    ));
                }
                bail!(
                    "missing required configuration:\n  - {}",
                    missing.join("\n  - ")
                )
            }
        }
    }
}

/// Load and parse an AuditConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<AuditConfig> {
    if !config_path.exists() {
        return Ok(AuditConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: AuditConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

fn env_override(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| usable(Some(&value)))
}

/// Blank values and untouched `YOUR_...` template placeholders count as unset.
fn usable(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() || trimmed.starts_with("YOUR_") || trimmed.contains("YOUR_DOMAIN") {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_has_no_credentials() {
        let config = AuditConfig::default();
        assert!(config.confluence.base_url.is_none());
        assert!(config.confluence.user.is_none());
        assert!(config.confluence.api_token.is_none());
        assert_eq!(config.top_rows(), DEFAULT_TOP_ROWS);
        assert_eq!(config.output_dir(), PathBuf::from("."));
    }

    #[test]
    fn load_config_returns_default_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/attachscan.toml")).expect("load config");
        assert_eq!(config, AuditConfig::default());
    }

    #[test]
    fn load_config_parses_all_sections() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join(DEFAULT_CONFIG_FILENAME);
        fs::write(
            &config_path,
            r#"
[confluence]
base_url = "https://example.atlassian.net/wiki"
user = "ops@example.com"
api_token = "secret"

[report]
labels = "de"
top_rows = 25
output_dir = "reports"

[http]
timeout_ms = 5000
user_agent = "audit-test/1.0"
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(
            config.confluence.base_url.as_deref(),
            Some("https://example.atlassian.net/wiki")
        );
        assert_eq!(config.confluence.user.as_deref(), Some("ops@example.com"));
        assert_eq!(config.report.labels.as_deref(), Some("de"));
        assert_eq!(config.top_rows(), 25);
        assert_eq!(config.output_dir(), PathBuf::from("reports"));
        assert_eq!(config.http.timeout_ms, Some(5000));
        assert_eq!(config.http.user_agent.as_deref(), Some("audit-test/1.0"));
    }

    #[test]
    fn load_config_tolerates_partial_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join(DEFAULT_CONFIG_FILENAME);
        fs::write(&config_path, "[report]\ntop_rows = 10\n").expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert!(config.confluence.base_url.is_none());
        assert_eq!(config.top_rows(), 10);
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join(DEFAULT_CONFIG_FILENAME);
        fs::write(&config_path, "[confluence\nbase_url = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn flags_win_over_config_values() {
        let config = AuditConfig {
            confluence: ConfluenceSection {
                base_url: Some("https://config.example.org".to_string()),
                user: Some("config-user".to_string()),
                api_token: Some("config-token".to_string()),
            },
            ..AuditConfig::default()
        };
        let credentials = config
            .credentials(&CredentialOverrides {
                base_url: Some("https://flag.example.org".to_string()),
                user: None,
                api_token: Some("  ".to_string()),
            })
            .expect("credentials");
        assert_eq!(credentials.base_url, "https://flag.example.org");
        assert_eq!(credentials.user, "config-user");
        assert_eq!(credentials.api_token, "config-token");
    }

    #[test]
    fn missing_credentials_are_listed_together() {
        if [ENV_BASE_URL, ENV_USER, ENV_API_TOKEN]
            .iter()
            .any(|key| env::var(key).is_ok())
        {
            return;
        }
        let error = AuditConfig::default()
            .credentials(&CredentialOverrides::default())
            .expect_err("must fail");
        let message = error.to_string();
        assert!(message.contains("missing required configuration"));
        assert!(message.contains(ENV_BASE_URL));
        assert!(message.contains(ENV_USER));
        assert!(message.contains(ENV_API_TOKEN));
    }

    #[test]
    fn placeholders_count_as_missing() {
        assert_eq!(usable(Some("YOUR_API_TOKEN")), None);
        assert_eq!(usable(Some("https://YOUR_DOMAIN.atlassian.net/wiki")), None);
        assert_eq!(usable(Some("")), None);
        assert_eq!(usable(Some(" token ")), Some("token".to_string()));
    }

    #[test]
    fn credentials_debug_redacts_token() {
        let credentials = Credentials {
            base_url: "https://wiki.example.org".to_string(),
            user: "me".to_string(),
            api_token: "hunter2".to_string(),
        };
        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn default_user_agent_and_timeout() {
        let config = AuditConfig::default();
        if env::var(ENV_USER_AGENT).is_err() {
            assert_eq!(config.user_agent(), DEFAULT_USER_AGENT);
        }
        if env::var(ENV_TIMEOUT_MS).is_err() {
            assert_eq!(config.timeout_ms(), DEFAULT_TIMEOUT_MS);
        }
    }
}
