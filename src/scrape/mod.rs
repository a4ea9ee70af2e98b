//! Resumable scraping pipeline: cache, challenge solving, page capture,
//! session lifecycle and extraction.

mod backoff;
mod cache;
mod challenge;
mod extract;
mod fetcher;
mod run;
mod session;
mod urls;

pub use backoff::Backoff;
pub use cache::{CacheStatus, ScrapeCache, CACHE_VERSION};
pub use challenge::{
    ChallengeConfig, ChallengeOutcome, ChallengeReport, ChallengeSolver, ChallengeState,
    RetryReason,
};
pub use extract::{ContentExtractor, ExtractConfig};
pub use fetcher::{FetchConfig, PageFetcher};
pub use run::{Orchestrator, RunSummary};
pub use session::{LoginConfig, Session, SessionController, SessionWork};
pub use urls::{week_number, week_urls, CourseConfig};
