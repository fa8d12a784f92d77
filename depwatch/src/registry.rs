use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// What the registry knows about a package's newest release.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageInfo {
    pub latest: String,
    pub description: Option<String>,
}

pub struct RegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("depwatch")
                .build()
                .expect("failed to build HTTP client"),
            base_url: base_url.into(),
        }
    }

    /// Look up a package's latest published version. Absence of registry
    /// data is a normal outcome (private or unpublished packages), so
    /// every failure maps to `None` rather than an error.
    #[instrument(skip(self))]
    pub async fn latest(&self, name: &str) -> Option<PackageInfo> {
        match self.try_fetch(name).await {
            Ok(Some(info)) => Some(info),
            Ok(None) => {
                debug!(package = name, "no registry data");
                None
            }
            Err(e) => {
                warn!(package = name, error = %e, "registry lookup failed");
                None
            }
        }
    }

    async fn try_fetch(&self, name: &str) -> Result<Option<PackageInfo>> {
        let url = format!("{}/{}", self.base_url, encode_package_name(name));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            bail!("{url} returned HTTP {status}");
        }

        let json: Value = response
            .json()
            .await
            .with_context(|| format!("failed to parse JSON from {url}"))?;

        Ok(parse_package_info(&json))
    }
}

/// Scoped package names keep their `@` but the inner slash must be
/// percent-encoded for the registry URL.
fn encode_package_name(name: &str) -> String {
    name.replace('/', "%2F")
}

fn parse_package_info(json: &Value) -> Option<PackageInfo> {
    let latest = json
        .pointer("/dist-tags/latest")?
        .as_str()?
        .to_string();
    let description = json
        .get("description")
        .and_then(|d| d.as_str())
        .map(str::to_string);
    Some(PackageInfo {
        latest,
        description,
    })
}
