//! `status`: cached versus pending pages.

use console::style;

use super::super::Settings;
use crate::scrape::{CacheStatus, ScrapeCache};

pub(crate) fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let (cache, status) = ScrapeCache::load_with_status(&settings.cache_path);
    let pending = cache.pending(&settings.requested);
    let separator = "─".repeat(60);

    println!();
    println!("{}", style("coursegrab status").bold());
    println!("{}", separator);
    println!("Cache: {}", settings.cache_path.display());
    match status {
        CacheStatus::Missing => println!("  {}", style("not created yet").dim()),
        CacheStatus::Loaded(n) => println!("  {} pages stored", n),
        CacheStatus::Degraded(e) => {
            println!("  {} unusable, will be replaced: {}", style("!").yellow(), e)
        }
    }
    println!();

    println!("{}", style("PAGES").cyan().bold());
    println!("  {:<12} {:>6}", "Requested:", settings.requested.len());
    println!(
        "  {:<12} {:>6}",
        "Cached:",
        settings.requested.len() - pending.len()
    );
    println!("  {:<12} {:>6}", "Pending:", pending.len());

    // Requested order, not set order.
    for url in settings.requested.iter().filter(|u| pending.contains(*u)) {
        println!("    {} {}", style("·").dim(), url);
    }
    println!();
    Ok(())
}
