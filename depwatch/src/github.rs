use anyhow::{Context, Result, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use crate::report::{RepositoryTarget, SecurityAdvisory, Severity};

#[derive(Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("depwatch")
                .build()
                .expect("failed to build HTTP client"),
            token: token.into(),
            base_url: base_url.into(),
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
    }

    /// Confirm the access token is usable before any repository work.
    /// Failure here is fatal for the run.
    #[instrument(skip(self))]
    pub async fn verify_token(&self) -> Result<()> {
        let url = format!("{}/user", self.base_url);
        let response = self
            .get(&url)
            .send()
            .await
            .context("GitHub credential check failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("GitHub credential check returned HTTP {status}");
        }
        Ok(())
    }

    /// Fetch and decode a repository's package.json, merged across the
    /// regular and development dependency groups.
    #[instrument(skip(self), fields(repo = %target))]
    pub async fn fetch_manifest(&self, target: &RepositoryTarget) -> Result<Vec<(String, String)>> {
        let url = format!(
            "{}/repos/{}/{}/contents/package.json",
            self.base_url, target.owner, target.name
        );
        let response = self
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("{url} returned HTTP {status}");
        }

        let json: Value = response
            .json()
            .await
            .with_context(|| format!("failed to parse JSON from {url}"))?;

        let encoded = json
            .get("content")
            .and_then(|v| v.as_str())
            .context("missing 'content' in contents response")?;

        parse_manifest(&decode_content(encoded)?)
    }

    /// Fetch the repository's published security advisories.
    #[instrument(skip(self), fields(repo = %target))]
    pub async fn fetch_advisories(
        &self,
        target: &RepositoryTarget,
    ) -> Result<Vec<SecurityAdvisory>> {
        let url = format!(
            "{}/repos/{}/{}/security-advisories",
            self.base_url, target.owner, target.name
        );
        let response = self
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("{url} returned HTTP {status}");
        }

        let json: Value = response
            .json()
            .await
            .with_context(|| format!("failed to parse JSON from {url}"))?;

        parse_advisories(json)
    }
}

/// The contents API wraps base64 at 60 columns; strip the line breaks
/// before decoding.
fn decode_content(encoded: &str) -> Result<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .context("manifest content is not valid base64")?;
    String::from_utf8(bytes).context("manifest content is not valid UTF-8")
}

/// Merge `dependencies` and `devDependencies` into one name -> range
/// mapping. Development entries override same-named regular entries in
/// place; first-seen order is preserved otherwise.
fn parse_manifest(content: &str) -> Result<Vec<(String, String)>> {
    let pkg: Value = serde_json::from_str(content).context("failed to parse package.json")?;

    let mut merged: Vec<(String, String)> = Vec::new();
    for group in ["dependencies", "devDependencies"] {
        let Some(deps) = pkg.get(group).and_then(|d| d.as_object()) else {
            continue;
        };
        for (name, version) in deps {
            let Some(version) = version.as_str() else {
                continue;
            };
            match merged.iter_mut().find(|(n, _)| n == name) {
                Some((_, existing)) => *existing = version.to_string(),
                None => merged.push((name.clone(), version.to_string())),
            }
        }
    }
    Ok(merged)
}

#[derive(Deserialize)]
struct AdvisoryResponse {
    summary: Option<String>,
    severity: Option<String>,
    cve_id: Option<String>,
    html_url: Option<String>,
    #[serde(default)]
    vulnerabilities: Vec<AdvisoryVulnerability>,
}

#[derive(Deserialize)]
struct AdvisoryVulnerability {
    package: Option<AdvisoryPackage>,
    vulnerable_version_range: Option<String>,
    patched_versions: Option<String>,
}

#[derive(Deserialize)]
struct AdvisoryPackage {
    name: Option<String>,
}

fn parse_advisories(json: Value) -> Result<Vec<SecurityAdvisory>> {
    let responses: Vec<AdvisoryResponse> =
        serde_json::from_value(json).context("expected JSON array from advisory API")?;

    let advisories = responses
        .into_iter()
        .map(|item| {
            let vuln = item.vulnerabilities.into_iter().next();
            let (package, vulnerable_range, first_patched) = match vuln {
                Some(v) => (
                    v.package.and_then(|p| p.name),
                    v.vulnerable_version_range,
                    v.patched_versions,
                ),
                None => (None, None, None),
            };

            SecurityAdvisory {
                package: package.unwrap_or_else(|| "unknown".to_string()),
                severity: Severity::parse(item.severity.as_deref().unwrap_or_default()),
                summary: item.summary.unwrap_or_default(),
                cve_id: item.cve_id,
                vulnerable_range,
                first_patched,
                url: item.html_url.unwrap_or_default(),
            }
        })
        .collect();

    Ok(advisories)
}
