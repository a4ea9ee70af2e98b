//! End-to-end run: cache → pending → session → fetch → save → extract.

use std::future::Future;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use super::cache::ScrapeCache;
use super::extract::ContentExtractor;
use super::fetcher::PageFetcher;
use super::session::{SessionController, SessionWork};
use crate::browser::{DriverLauncher, PageDriver};
use crate::checkpoint::Checkpoint;
use crate::credentials::Credential;
use crate::error::{CredentialError, ScrapeError};
use crate::report::Report;

/// What a run did.
#[derive(Debug)]
pub struct RunSummary {
    pub requested: usize,
    /// Requested pages that were already cached at start.
    pub cached: usize,
    pub fetched: Vec<String>,
    /// Pages skipped after exhausting their retries.
    pub failed: Vec<(String, ScrapeError)>,
    /// Error that ended the fetch phase early, if any.
    pub aborted: Option<ScrapeError>,
    /// Outline of every cached page after the run.
    pub report: Report,
}

/// Fetches each pending URL in order, isolating per-page failures.
struct FetchPass<'a> {
    fetcher: &'a PageFetcher,
    pending: &'a [String],
    cache: &'a mut ScrapeCache,
    progress: ProgressBar,
    fetched: Vec<String>,
    failed: Vec<(String, ScrapeError)>,
}

#[async_trait]
impl<'a, D: PageDriver> SessionWork<D> for FetchPass<'a> {
    async fn run(&mut self, driver: &mut D) -> Result<(), ScrapeError> {
        for url in self.pending {
            self.progress.set_message(url.clone());
            match self.fetcher.fetch(driver, url).await {
                Ok(page) => {
                    self.cache.put(url.clone(), page);
                    self.fetched.push(url.clone());
                }
                Err(e @ ScrapeError::Fetch { .. }) => {
                    warn!(url = %url, "Skipping page: {}", e);
                    self.failed.push((url.clone(), e));
                }
                Err(e) => return Err(e),
            }
            self.progress.inc(1);
        }
        self.progress.finish_and_clear();
        Ok(())
    }
}

/// Sequences one scraping run.
pub struct Orchestrator<L, C> {
    controller: SessionController<L, C>,
    fetcher: PageFetcher,
    extractor: ContentExtractor,
    cache_path: PathBuf,
    progress: bool,
}

impl<L, C> Orchestrator<L, C>
where
    L: DriverLauncher,
    C: Checkpoint,
{
    pub fn new(
        controller: SessionController<L, C>,
        fetcher: PageFetcher,
        extractor: ContentExtractor,
        cache_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            controller,
            fetcher,
            extractor,
            cache_path: cache_path.into(),
            progress: false,
        }
    }

    /// Show a progress bar over pending pages.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.progress = show;
        self
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Fetch whatever is missing from the cache, save it and report on
    /// everything cached.
    ///
    /// `credential` is only called when there is something to fetch. Login,
    /// driver and cancellation errors end up in [`RunSummary::aborted`]; the
    /// cache is saved regardless. Only a failed save is returned as an error.
    pub async fn run<K, F>(
        &self,
        requested: &[String],
        credential: K,
        shutdown: F,
    ) -> Result<RunSummary, ScrapeError>
    where
        K: FnOnce() -> Result<Credential, CredentialError>,
        F: Future<Output = ()>,
    {
        let mut cache = ScrapeCache::load(&self.cache_path);

        let mut pending_set = cache.pending(requested);
        let pending: Vec<String> = requested
            .iter()
            .filter(|url| pending_set.remove(url.as_str()))
            .cloned()
            .collect();

        let mut summary = RunSummary {
            requested: requested.len(),
            cached: requested.len() - pending.len(),
            fetched: Vec::new(),
            failed: Vec::new(),
            aborted: None,
            report: Report::default(),
        };

        if pending.is_empty() {
            info!(
                "All {} requested pages are cached, not starting a browser",
                requested.len()
            );
        } else {
            info!("{} of {} pages to fetch", pending.len(), requested.len());
            let outcome = match credential() {
                Ok(credential) => {
                    let mut pass = FetchPass {
                        fetcher: &self.fetcher,
                        pending: &pending,
                        cache: &mut cache,
                        progress: self.progress_bar(pending.len()),
                        fetched: Vec::new(),
                        failed: Vec::new(),
                    };
                    let result = self.controller.scoped(&credential, &mut pass, shutdown).await;
                    pass.progress.finish_and_clear();
                    summary.fetched = pass.fetched;
                    summary.failed = pass.failed;
                    result
                }
                Err(e) => Err(e.into()),
            };
            if let Err(e) = outcome {
                warn!("Fetching stopped early: {}", e);
                summary.aborted = Some(e);
            }
        }

        cache
            .save(&self.cache_path)
            .map_err(|source| ScrapeError::Persist {
                path: self.cache_path.clone(),
                source,
            })?;

        summary.report = Report::build(cache.iter().map(|(_, page)| page), &self.extractor);
        Ok(summary)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb
    }
}
