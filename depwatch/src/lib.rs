pub mod compare;
pub mod config;
pub mod github;
pub mod notify;
pub mod registry;
pub mod report;
pub mod summarize;

use std::collections::HashMap;

use anyhow::{Context, Result};
use tracing::{info, warn};

use config::Config;
use github::GitHubClient;
use notify::MailClient;
use registry::{PackageInfo, RegistryClient};
use report::{RepositoryReport, RepositoryTarget};
use summarize::SummarizerClient;

/// Execute one full run: check every configured repository, then send
/// either the short all-clear notice or the analyzed full report.
///
/// Per-repository failures degrade to empty results; a failed credential
/// check, summarization call, or mail dispatch aborts the run.
pub async fn run(config: &Config) -> Result<()> {
    let github = GitHubClient::new(&config.github_token, &config.endpoints.github);
    github.verify_token().await?;

    let registry = RegistryClient::new(&config.endpoints.registry);
    let mut reports = Vec::with_capacity(config.repositories.len());
    for target in &config.repositories {
        let report = check_repository(&github, &registry, target).await;
        info!(
            repo = %report.target,
            outdated = report.outdated.len(),
            advisories = report.advisories.len(),
            "repository checked"
        );
        reports.push(report);
    }

    let recipient = config.recipient.as_deref().context("NOTIFY_EMAIL is not set")?;
    let sender = config.mail_sender.as_deref().context("MAIL_SENDER is not set")?;
    let credential = config
        .mail_password
        .as_deref()
        .context("MAIL_PASSWORD is not set")?;
    let mailer = MailClient::new(sender, credential, &config.endpoints.mail);

    if reports.iter().all(|r| !r.has_findings()) {
        info!("all repositories up to date");
        mailer.send(recipient, &notify::all_clear_message(&reports)).await?;
        return Ok(());
    }

    let api_key = config.ai_api_key.as_deref().context("OPENAI_API_KEY is not set")?;
    let summarizer = SummarizerClient::new(api_key, &config.endpoints.ai);
    let analysis = summarizer
        .summarize(&summarize::build_prompt(&reports))
        .await?;

    let email = notify::report_message(&analysis, &reports);
    mailer.send(recipient, &email).await?;
    info!(subject = %email.subject, "report dispatched");
    Ok(())
}

/// Check one repository. Manifest, advisory, and registry failures are
/// logged and substituted with empty results so one bad repository
/// never blocks the rest of the run.
async fn check_repository(
    github: &GitHubClient,
    registry: &RegistryClient,
    target: &RepositoryTarget,
) -> RepositoryReport {
    let manifest = match github.fetch_manifest(target).await {
        Ok(deps) => deps,
        Err(e) => {
            warn!(repo = %target, error = %e, "failed to fetch manifest");
            Vec::new()
        }
    };

    let advisories = match github.fetch_advisories(target).await {
        Ok(advisories) => advisories,
        Err(e) => {
            warn!(repo = %target, error = %e, "failed to fetch advisories");
            Vec::new()
        }
    };

    let mut snapshot: HashMap<String, PackageInfo> = HashMap::new();
    for (name, _) in &manifest {
        if let Some(info) = registry.latest(name).await {
            snapshot.insert(name.clone(), info);
        }
    }

    RepositoryReport {
        target: target.clone(),
        outdated: compare::diff_manifest(&manifest, &snapshot),
        advisories,
    }
}
