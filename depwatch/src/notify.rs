use anyhow::{Context, Result, bail};
use tracing::instrument;

use crate::report::{RepositoryReport, Severity};

/// A fully rendered outbound message.
#[derive(Debug, Clone)]
pub struct Email {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Subject line reflecting the most severe condition across all
/// repositories: critical vulnerabilities > any vulnerabilities >
/// outdated-only > none.
pub fn subject_for(reports: &[RepositoryReport]) -> String {
    let advisory_count: usize = reports.iter().map(|r| r.advisories.len()).sum();
    let outdated_count: usize = reports.iter().map(|r| r.outdated.len()).sum();
    let worst = reports.iter().filter_map(|r| r.max_severity()).max();

    if worst == Some(Severity::Critical) {
        "[depwatch] SECURITY ALERT: critical vulnerabilities found".to_string()
    } else if advisory_count > 0 {
        format!("[depwatch] {advisory_count} open security advisories")
    } else if outdated_count > 0 {
        format!("[depwatch] {outdated_count} outdated packages")
    } else {
        "[depwatch] All dependencies up to date".to_string()
    }
}

/// Short confirmation for a run with nothing outdated or vulnerable.
pub fn all_clear_message(reports: &[RepositoryReport]) -> Email {
    let repo_list: Vec<String> = reports.iter().map(|r| r.target.to_string()).collect();
    let text = format!(
        "All {} checked repositories are up to date with no open security advisories.\n\nChecked: {}\n",
        reports.len(),
        repo_list.join(", ")
    );
    let html = format!(
        "<p>All {} checked repositories are up to date with no open security advisories.</p>\n<p>Checked: {}</p>\n",
        reports.len(),
        escape_html(&repo_list.join(", "))
    );
    Email {
        subject: subject_for(reports),
        text,
        html,
    }
}

/// Full breakdown: the analysis narrative followed by per-repository
/// itemized advisory and outdated-package lists.
pub fn report_message(analysis: &str, reports: &[RepositoryReport]) -> Email {
    let mut text = String::from("Prioritized analysis:\n\n");
    text.push_str(analysis.trim_end());
    text.push_str("\n\n");

    let mut html = String::from("<h2>Prioritized analysis</h2>\n");
    html.push_str(&format!("<pre>{}</pre>\n", escape_html(analysis.trim_end())));

    for report in reports {
        text.push_str(&format!("== {} ==\n", report.target));
        html.push_str(&format!("<h3>{}</h3>\n", escape_html(&report.target.to_string())));

        if report.advisories.is_empty() {
            text.push_str("advisories: none\n");
        } else {
            text.push_str("advisories:\n");
            html.push_str("<h4>Advisories</h4>\n<ul>\n");
            for adv in &report.advisories {
                text.push_str(&format!("  {adv}\n"));
                html.push_str(&format!(
                    "<li><strong>[{}]</strong> {}: {} — <a href=\"{}\">details</a></li>\n",
                    adv.severity,
                    escape_html(&adv.package),
                    escape_html(&adv.summary),
                    escape_html(&adv.url)
                ));
            }
            html.push_str("</ul>\n");
        }

        if report.outdated.is_empty() {
            text.push_str("outdated: none\n");
        } else {
            text.push_str("outdated:\n");
            html.push_str("<h4>Outdated packages</h4>\n<ul>\n");
            for record in &report.outdated {
                text.push_str(&format!("  {record}\n"));
                html.push_str(&format!(
                    "<li><code>{}</code> {} &rarr; {}</li>\n",
                    escape_html(&record.name),
                    escape_html(&record.current),
                    escape_html(&record.latest)
                ));
            }
            html.push_str("</ul>\n");
        }
        text.push('\n');
    }

    Email {
        subject: subject_for(reports),
        text,
        html,
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub struct MailClient {
    client: reqwest::Client,
    base_url: String,
    sender: String,
    credential: String,
}

impl MailClient {
    pub fn new(
        sender: impl Into<String>,
        credential: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("depwatch")
                .build()
                .expect("failed to build HTTP client"),
            base_url: base_url.into(),
            sender: sender.into(),
            credential: credential.into(),
        }
    }

    /// Submit one message through the relay. No retry; a failed send is
    /// fatal for the run.
    #[instrument(skip(self, email), fields(subject = %email.subject))]
    pub async fn send(&self, recipient: &str, email: &Email) -> Result<()> {
        let body = serde_json::json!({
            "from": self.sender,
            "to": [recipient],
            "subject": email.subject,
            "text": email.text,
            "html": email.html,
        });

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .header("Authorization", format!("Bearer {}", self.credential))
            .json(&body)
            .send()
            .await
            .context("mail relay request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("mail relay returned HTTP {status}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{DependencyRecord, SecurityAdvisory};

    fn record(name: &str) -> DependencyRecord {
        DependencyRecord {
            name: name.to_string(),
            current: "1.0.0".to_string(),
            latest: "1.3.0".to_string(),
            description: None,
        }
    }

    fn advisory(severity: Severity) -> SecurityAdvisory {
        SecurityAdvisory {
            package: "lodash".to_string(),
            severity,
            summary: "Prototype pollution".to_string(),
            cve_id: None,
            vulnerable_range: None,
            first_patched: None,
            url: "https://example.com/adv".to_string(),
        }
    }

    fn report(
        outdated: Vec<DependencyRecord>,
        advisories: Vec<SecurityAdvisory>,
    ) -> RepositoryReport {
        RepositoryReport {
            target: "acme/webapp".parse().unwrap(),
            outdated,
            advisories,
        }
    }

    #[test]
    fn subject_critical_wins_even_with_nothing_outdated() {
        let reports = vec![report(vec![], vec![advisory(Severity::Critical)])];
        assert!(subject_for(&reports).contains("SECURITY ALERT"));
    }

    #[test]
    fn subject_any_advisory_beats_outdated_only() {
        let reports = vec![report(vec![record("left-pad")], vec![advisory(Severity::Medium)])];
        let subject = subject_for(&reports);
        assert!(subject.contains("security advisories"), "got: {subject}");
    }

    #[test]
    fn subject_outdated_only() {
        let reports = vec![report(vec![record("left-pad"), record("lodash")], vec![])];
        assert_eq!(subject_for(&reports), "[depwatch] 2 outdated packages");
    }

    #[test]
    fn subject_all_clean() {
        let reports = vec![report(vec![], vec![])];
        assert_eq!(subject_for(&reports), "[depwatch] All dependencies up to date");
    }

    #[test]
    fn all_clear_message_names_the_repositories() {
        let email = all_clear_message(&[report(vec![], vec![])]);
        assert!(email.subject.contains("up to date"));
        assert!(email.text.contains("acme/webapp"));
        assert!(email.html.contains("acme/webapp"));
    }

    #[test]
    fn report_message_contains_analysis_and_items() {
        let email = report_message(
            "Patch lodash first.",
            &[report(vec![record("left-pad")], vec![advisory(Severity::High)])],
        );
        assert!(email.text.contains("Patch lodash first."));
        assert!(email.text.contains("left-pad: 1.0.0 -> 1.3.0"));
        assert!(email.text.contains("[high] lodash"));
        assert!(email.html.contains("<h3>acme/webapp</h3>"));
        assert!(email.html.contains("<code>left-pad</code>"));
    }

    #[test]
    fn report_message_marks_empty_sections() {
        let email = report_message("ok", &[report(vec![record("left-pad")], vec![])]);
        assert!(email.text.contains("advisories: none"));
    }

    #[test]
    fn html_is_escaped() {
        assert_eq!(escape_html("a <b> & c"), "a &lt;b&gt; &amp; c");
    }
}
