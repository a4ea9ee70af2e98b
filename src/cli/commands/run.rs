//! `run`: fetch missing pages and report.

use std::path::Path;

use super::super::Settings;

/// Fetch pending pages, save the cache and print the outline.
#[cfg(feature = "browser")]
pub(crate) async fn cmd_run(settings: &Settings, json: Option<&Path>) -> anyhow::Result<()> {
    use console::{style, Term};

    use crate::browser::ChromeLauncher;
    use crate::checkpoint::TerminalCheckpoint;
    use crate::credentials::Credential;
    use crate::error::ScrapeError;
    use crate::scrape::{ContentExtractor, Orchestrator, PageFetcher, SessionController};

    let config = &settings.config;

    let controller = SessionController::new(
        ChromeLauncher::new(config.browser.clone()),
        TerminalCheckpoint,
        config.login.clone(),
        config.challenge.clone(),
    )
    .with_assist(
        config.browser.extension.clone(),
        config.browser.confirm_extension_setup,
    );
    let orchestrator = Orchestrator::new(
        controller,
        PageFetcher::new(config.fetch.clone()),
        ContentExtractor::new(&config.extract)?,
        &settings.cache_path,
    )
    .with_progress(Term::stderr().is_term());

    let credentials_path = config.credentials_file(&settings.base_dir);
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let summary = orchestrator
        .run(
            &settings.requested,
            || Credential::load(credentials_path.as_deref(), &config.credentials_key),
            shutdown,
        )
        .await?;

    eprintln!(
        "{} {} requested, {} already cached, {} fetched",
        style("→").cyan(),
        summary.requested,
        summary.cached,
        summary.fetched.len()
    );
    for (url, err) in &summary.failed {
        eprintln!("  {} {}: {}", style("✗").red(), url, err);
    }
    super::print_extraction_summary(&summary.report);

    print!("{}", summary.report.render());
    if let Some(path) = json {
        super::write_json(&summary.report, path)?;
    }

    match summary.aborted {
        None => Ok(()),
        Some(ScrapeError::Cancelled) => {
            eprintln!("{} Interrupted, progress saved", style("!").yellow());
            // A pending stdin prompt would keep the runtime alive.
            std::process::exit(130);
        }
        Some(e) => Err(anyhow::Error::new(e).context("Run did not complete")),
    }
}

#[cfg(not(feature = "browser"))]
pub(crate) async fn cmd_run(_settings: &Settings, _json: Option<&Path>) -> anyhow::Result<()> {
    anyhow::bail!("coursegrab was built without the `browser` feature; use `report` or `status`")
}
