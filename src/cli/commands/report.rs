//! `report`: outline from the cache alone.

use std::path::Path;

use console::style;

use super::super::Settings;
use crate::report::Report;
use crate::scrape::{ContentExtractor, ScrapeCache};

pub(crate) fn cmd_report(settings: &Settings, json: Option<&Path>) -> anyhow::Result<()> {
    let cache = ScrapeCache::load(&settings.cache_path);
    if cache.is_empty() {
        eprintln!(
            "{} No cached pages in {}. Run 'coursegrab run' first.",
            style("!").yellow(),
            settings.cache_path.display()
        );
        return Ok(());
    }

    let extractor = ContentExtractor::new(&settings.config.extract)?;
    let report = Report::build(cache.iter().map(|(_, page)| page), &extractor);

    super::print_extraction_summary(&report);
    print!("{}", report.render());
    if let Some(path) = json {
        super::write_json(&report, path)?;
    }
    Ok(())
}
