use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::instrument;

use crate::report::RepositoryReport;

/// At most this many outdated packages are itemized per repository in
/// the prompt; the remainder collapses to a `(+N more)` marker.
pub const OUTDATED_PREVIEW_LIMIT: usize = 10;

const AI_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You are a dependency maintenance assistant. \
You receive dependency health findings for a set of repositories and \
produce a concise, prioritized plan for the maintainers.";

/// Serialize the aggregated findings into one natural-language prompt:
/// advisories first, then a bounded preview of outdated packages, with
/// instructions to bucket everything into three priority tiers.
pub fn build_prompt(reports: &[RepositoryReport]) -> String {
    let mut prompt = String::from(
        "Group the findings below into three priority tiers: \
         critical-security, important, and low-priority. \
         Give a short rationale for each tier.\n",
    );

    prompt.push_str("\nSecurity advisories:\n");
    let mut any_advisory = false;
    for report in reports {
        for adv in &report.advisories {
            any_advisory = true;
            prompt.push_str(&format!("- {}: {adv}\n", report.target));
        }
    }
    if !any_advisory {
        prompt.push_str("- none\n");
    }

    prompt.push_str("\nOutdated packages:\n");
    let mut any_outdated = false;
    for report in reports {
        if report.outdated.is_empty() {
            continue;
        }
        any_outdated = true;
        prompt.push_str(&format!("{}:\n", report.target));
        for record in report.outdated.iter().take(OUTDATED_PREVIEW_LIMIT) {
            match &record.description {
                Some(desc) => prompt.push_str(&format!("- {record} ({desc})\n")),
                None => prompt.push_str(&format!("- {record}\n")),
            }
        }
        let hidden = report.outdated.len().saturating_sub(OUTDATED_PREVIEW_LIMIT);
        if hidden > 0 {
            prompt.push_str(&format!("(+{hidden} more)\n"));
        }
    }
    if !any_outdated {
        prompt.push_str("- none\n");
    }

    prompt
}

pub struct SummarizerClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SummarizerClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("depwatch")
                .build()
                .expect("failed to build HTTP client"),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Send the prompt for analysis and return the model's narrative.
    /// Any failure here is fatal for the run; a findings report without
    /// analysis is considered incomplete.
    #[instrument(skip(self, prompt))]
    pub async fn summarize(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": AI_MODEL,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ]
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("summarization request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("summarization API returned HTTP {status}");
        }

        let json: Value = response
            .json()
            .await
            .context("failed to parse summarization response")?;

        extract_analysis(&json)
    }
}

fn extract_analysis(json: &Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .context("missing message content in summarization response")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{DependencyRecord, RepositoryReport, SecurityAdvisory, Severity};
    use serde_json::json;

    fn record(name: &str) -> DependencyRecord {
        DependencyRecord {
            name: name.to_string(),
            current: "1.0.0".to_string(),
            latest: "2.0.0".to_string(),
            description: None,
        }
    }

    fn report(outdated: Vec<DependencyRecord>, advisories: Vec<SecurityAdvisory>) -> RepositoryReport {
        RepositoryReport {
            target: "acme/webapp".parse().unwrap(),
            outdated,
            advisories,
        }
    }

    fn advisory(package: &str) -> SecurityAdvisory {
        SecurityAdvisory {
            package: package.to_string(),
            severity: Severity::Critical,
            summary: "remote code execution".to_string(),
            cve_id: Some("CVE-2025-0001".to_string()),
            vulnerable_range: None,
            first_patched: None,
            url: "https://example.com/adv".to_string(),
        }
    }

    #[test]
    fn prompt_lists_advisories_before_outdated() {
        let prompt = build_prompt(&[report(vec![record("left-pad")], vec![advisory("lodash")])]);
        let adv_pos = prompt.find("Security advisories:").unwrap();
        let outdated_pos = prompt.find("Outdated packages:").unwrap();
        assert!(adv_pos < outdated_pos);
        assert!(prompt.contains("lodash"));
        assert!(prompt.contains("left-pad: 1.0.0 -> 2.0.0"));
    }

    #[test]
    fn prompt_asks_for_three_tiers() {
        let prompt = build_prompt(&[report(vec![record("left-pad")], vec![])]);
        assert!(prompt.contains("critical-security"));
        assert!(prompt.contains("important"));
        assert!(prompt.contains("low-priority"));
    }

    #[test]
    fn prompt_truncates_long_outdated_lists() {
        let outdated: Vec<DependencyRecord> =
            (0..14).map(|i| record(&format!("pkg-{i}"))).collect();
        let prompt = build_prompt(&[report(outdated, vec![])]);
        assert!(prompt.contains("pkg-9"));
        assert!(!prompt.contains("pkg-10:"));
        assert!(prompt.contains("(+4 more)"));
    }

    #[test]
    fn prompt_at_limit_has_no_more_marker() {
        let outdated: Vec<DependencyRecord> =
            (0..OUTDATED_PREVIEW_LIMIT).map(|i| record(&format!("pkg-{i}"))).collect();
        let prompt = build_prompt(&[report(outdated, vec![])]);
        assert!(!prompt.contains("more)"));
    }

    #[test]
    fn prompt_marks_empty_sections() {
        let prompt = build_prompt(&[report(vec![], vec![])]);
        assert!(prompt.contains("Security advisories:\n- none"));
        assert!(prompt.contains("Outdated packages:\n- none"));
    }

    #[test]
    fn extract_analysis_reads_first_choice() {
        let json = json!({
            "choices": [{"message": {"role": "assistant", "content": "Patch lodash first."}}]
        });
        assert_eq!(extract_analysis(&json).unwrap(), "Patch lodash first.");
    }

    #[test]
    fn extract_analysis_errors_on_empty_choices() {
        let err = extract_analysis(&json!({"choices": []})).unwrap_err();
        assert!(err.to_string().contains("missing message content"));
    }
}
