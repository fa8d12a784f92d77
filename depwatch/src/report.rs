use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use serde::Serialize;

/// A repository to check, identified as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryTarget {
    pub owner: String,
    pub name: String,
}

impl FromStr for RepositoryTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((owner, name)) = s.split_once('/') else {
            bail!("invalid repository '{s}': expected owner/name");
        };
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            bail!("invalid repository '{s}': expected owner/name");
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepositoryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Advisory severity as rated by the repository host.
///
/// Ordered so that `max()` over a report picks the worst finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse a host-reported severity string. Anything unrecognized is
    /// treated as `Low` rather than dropped.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" | "moderate" => Self::Medium,
            _ => Self::Low,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        };
        f.write_str(s)
    }
}

/// An open security advisory affecting one of a repository's packages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityAdvisory {
    pub package: String,
    pub severity: Severity,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cve_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vulnerable_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_patched: Option<String>,
    pub url: String,
}

impl fmt::Display for SecurityAdvisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.package, self.summary)?;
        if let Some(cve) = &self.cve_id {
            write!(f, " ({cve})")?;
        }
        if let Some(range) = &self.vulnerable_range {
            write!(f, "\n    affected: {range}")?;
        }
        if let Some(patched) = &self.first_patched {
            write!(f, "\n    patched in: {patched}")?;
        }
        write!(f, "\n    {}", self.url)
    }
}

/// A dependency whose pinned version no longer matches the registry's
/// latest release. `current` is the declared version with any range
/// marker already stripped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyRecord {
    pub name: String,
    pub current: String,
    pub latest: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl fmt::Display for DependencyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.name, self.current, self.latest)
    }
}

/// Everything learned about one repository during a run.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryReport {
    pub target: RepositoryTarget,
    pub outdated: Vec<DependencyRecord>,
    pub advisories: Vec<SecurityAdvisory>,
}

impl RepositoryReport {
    pub fn has_findings(&self) -> bool {
        !self.outdated.is_empty() || !self.advisories.is_empty()
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.advisories.iter().map(|a| a.severity).max()
    }
}
