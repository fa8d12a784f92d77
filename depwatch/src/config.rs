use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::report::RepositoryTarget;

pub const GITHUB_API_BASE: &str = "https://api.github.com";
pub const NPM_REGISTRY_BASE: &str = "https://registry.npmjs.org";
pub const AI_API_BASE: &str = "https://api.openai.com/v1";
pub const MAIL_API_BASE: &str = "https://api.resend.com";

/// Credentials read once from the process environment at entry.
///
/// Only the binary's `main` constructs this; everything downstream
/// receives values through [`Config`].
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub github_token: Option<String>,
    pub ai_api_key: Option<String>,
    pub mail_sender: Option<String>,
    pub mail_password: Option<String>,
    pub recipient: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            github_token: env::var("GITHUB_TOKEN").ok(),
            ai_api_key: env::var("OPENAI_API_KEY").ok(),
            mail_sender: env::var("MAIL_SENDER").ok(),
            mail_password: env::var("MAIL_PASSWORD").ok(),
            recipient: env::var("NOTIFY_EMAIL").ok(),
        }
    }
}

/// Base URLs for the four external services. Overridable from the
/// targets file so tests can point the run at fixture servers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Endpoints {
    pub github: String,
    pub registry: String,
    pub ai: String,
    pub mail: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            github: GITHUB_API_BASE.to_string(),
            registry: NPM_REGISTRY_BASE.to_string(),
            ai: AI_API_BASE.to_string(),
            mail: MAIL_API_BASE.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct TargetsFile {
    repositories: Vec<String>,
    /// Informational only; actual scheduling is an external trigger.
    #[serde(default)]
    schedule: Option<String>,
    #[serde(default)]
    endpoints: Endpoints,
}

/// Fully resolved run configuration. Built once at process entry and
/// passed by parameter; no component reads the environment itself.
#[derive(Debug, Clone)]
pub struct Config {
    pub repositories: Vec<RepositoryTarget>,
    pub schedule: Option<String>,
    pub endpoints: Endpoints,
    pub github_token: String,
    pub ai_api_key: Option<String>,
    pub mail_sender: Option<String>,
    pub mail_password: Option<String>,
    pub recipient: Option<String>,
}

impl Config {
    pub fn load(path: &Path, credentials: Credentials) -> Result<Self> {
        let github_token = credentials
            .github_token
            .context("GITHUB_TOKEN is not set")?;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file: TargetsFile = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let repositories = file
            .repositories
            .iter()
            .map(|raw| raw.parse::<RepositoryTarget>())
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            repositories,
            schedule: file.schedule,
            endpoints: file.endpoints,
            github_token,
            ai_api_key: credentials.ai_api_key,
            mail_sender: credentials.mail_sender,
            mail_password: credentials.mail_password,
            recipient: credentials.recipient,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn creds() -> Credentials {
        Credentials {
            github_token: Some("ghp_test".to_string()),
            ai_api_key: None,
            mail_sender: None,
            mail_password: None,
            recipient: None,
        }
    }

    fn write_targets(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_parses_repositories_in_order() {
        let file = write_targets(
            "repositories:\n  - acme/webapp\n  - acme/api\nschedule: \"daily 06:00 UTC\"\n",
        );
        let config = Config::load(file.path(), creds()).unwrap();
        assert_eq!(config.repositories.len(), 2);
        assert_eq!(config.repositories[0].to_string(), "acme/webapp");
        assert_eq!(config.repositories[1].to_string(), "acme/api");
        assert_eq!(config.schedule.as_deref(), Some("daily 06:00 UTC"));
    }

    #[test]
    fn load_defaults_endpoints_to_live_services() {
        let file = write_targets("repositories: [acme/webapp]\n");
        let config = Config::load(file.path(), creds()).unwrap();
        assert_eq!(config.endpoints.github, GITHUB_API_BASE);
        assert_eq!(config.endpoints.registry, NPM_REGISTRY_BASE);
        assert_eq!(config.endpoints.ai, AI_API_BASE);
        assert_eq!(config.endpoints.mail, MAIL_API_BASE);
    }

    #[test]
    fn load_accepts_endpoint_overrides() {
        let file = write_targets(
            "repositories: [acme/webapp]\nendpoints:\n  github: \"http://localhost:8080\"\n",
        );
        let config = Config::load(file.path(), creds()).unwrap();
        assert_eq!(config.endpoints.github, "http://localhost:8080");
        assert_eq!(config.endpoints.registry, NPM_REGISTRY_BASE);
    }

    #[test]
    fn load_fails_without_github_token() {
        let file = write_targets("repositories: [acme/webapp]\n");
        let err = Config::load(file.path(), Credentials::default()).unwrap_err();
        assert!(err.to_string().contains("GITHUB_TOKEN"));
    }

    #[test]
    fn load_fails_on_malformed_repository() {
        let file = write_targets("repositories: [not-a-repo]\n");
        let err = Config::load(file.path(), creds()).unwrap_err();
        assert!(err.to_string().contains("owner/name"));
    }

    #[test]
    fn load_fails_on_missing_file() {
        let err = Config::load(Path::new("/nonexistent/targets.yml"), creds()).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
