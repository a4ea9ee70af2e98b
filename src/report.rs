//! Outline report over every cached page.

use std::cmp::Reverse;
use std::fmt::Write as _;

use serde::Serialize;
use tracing::warn;

use crate::error::ExtractionError;
use crate::models::{CapturedPage, ModuleRecord};
use crate::scrape::{week_number, ContentExtractor};

/// Extraction result for one cached page.
#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub week: Option<u32>,
    pub url: String,
    pub record: Result<ModuleRecord, ExtractionError>,
}

/// Extracted modules, newest week first.
#[derive(Debug, Clone, Default)]
pub struct Report {
    entries: Vec<ReportEntry>,
}

#[derive(Serialize)]
struct ExportEntry<'a> {
    week: Option<u32>,
    url: &'a str,
    module: &'a ModuleRecord,
}

impl Report {
    /// Extract every page. A page that fails extraction gets an error entry;
    /// the others are unaffected.
    pub fn build<'a, I>(pages: I, extractor: &ContentExtractor) -> Self
    where
        I: IntoIterator<Item = &'a CapturedPage>,
    {
        let mut entries: Vec<ReportEntry> = pages
            .into_iter()
            .map(|page| {
                let record = extractor.parse(page);
                if let Err(ref e) = record {
                    warn!(url = %page.url, "Extraction failed: {}", e);
                }
                ReportEntry {
                    week: week_number(&page.url),
                    url: page.url.clone(),
                    record,
                }
            })
            .collect();

        entries.sort_by(|a, b| {
            (a.week.is_none(), Reverse(a.week), &a.url).cmp(&(b.week.is_none(), Reverse(b.week), &b.url))
        });

        Self { entries }
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &ExtractionError)> {
        self.entries
            .iter()
            .filter_map(|e| e.record.as_ref().err().map(|err| (e.url.as_str(), err)))
    }

    /// Markdown outline: module, then tab-indented sections and lessons.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let week = entry
                .week
                .map(|w| w.to_string())
                .unwrap_or_else(|| "?".to_string());
            match &entry.record {
                Ok(module) => {
                    let _ = writeln!(out, "- {}. {}", week, module.title);
                    for section in &module.sections {
                        let _ = writeln!(out, "\t- {}", section.title);
                        for lesson in &section.lessons {
                            let _ = writeln!(out, "\t\t- {}", lesson);
                        }
                    }
                }
                Err(e) => {
                    let _ = writeln!(out, "- {}. [extraction failed: {}]", week, e);
                }
            }
        }
        out
    }

    /// Successfully extracted modules as pretty JSON, in report order.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let export: Vec<ExportEntry<'_>> = self
            .entries
            .iter()
            .filter_map(|e| {
                e.record.as_ref().ok().map(|module| ExportEntry {
                    week: e.week,
                    url: &e.url,
                    module,
                })
            })
            .collect();
        serde_json::to_string_pretty(&export)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::ExtractConfig;

    fn module_page(week: u32, title: &str) -> CapturedPage {
        CapturedPage::new(
            format!("https://x/week/{week}"),
            format!(
                r#"<div class="rc-ModuleSection"><h3 class="card-headline-text">{title}</h3>
                <div class="rc-NamedItemList"><h4 class="card-headline-text">Part A</h4>
                  <div class="rc-WeekItemName">Lesson one</div>
                  <div class="rc-WeekItemName">Lesson two</div>
                </div></div>"#
            ),
        )
    }

    fn extractor() -> ContentExtractor {
        ContentExtractor::new(&ExtractConfig::default()).unwrap()
    }

    #[test]
    fn orders_by_descending_week() {
        let pages = vec![module_page(5, "Five"), module_page(11, "Eleven"), module_page(7, "Seven")];
        let report = Report::build(&pages, &extractor());
        let weeks: Vec<_> = report.entries().iter().map(|e| e.week).collect();
        assert_eq!(weeks, vec![Some(11), Some(7), Some(5)]);
    }

    #[test]
    fn renders_outline_lines() {
        let pages = vec![module_page(6, "Galaxies")];
        let report = Report::build(&pages, &extractor());
        assert_eq!(
            report.render(),
            "- 6. Galaxies\n\t- Part A\n\t\t- Lesson one\n\t\t- Lesson two\n"
        );
    }

    #[test]
    fn failed_page_does_not_hide_others() {
        let pages = vec![
            module_page(5, "Five"),
            CapturedPage::new("https://x/week/6", "<html><body>Sign in</body></html>"),
        ];
        let report = Report::build(&pages, &extractor());

        assert_eq!(report.failures().count(), 1);
        let rendered = report.render();
        assert!(rendered.starts_with("- 6. [extraction failed: missing module section"));
        assert!(rendered.contains("- 5. Five\n"));
    }

    #[test]
    fn pages_without_week_sort_last() {
        let pages = vec![
            CapturedPage::new("https://x/info", "<p></p>"),
            module_page(5, "Five"),
        ];
        let report = Report::build(&pages, &extractor());
        assert_eq!(report.entries()[0].week, Some(5));
        assert!(report.render().contains("- ?. [extraction failed"));
    }

    #[test]
    fn json_export_skips_failures() {
        let pages = vec![
            module_page(5, "Five"),
            CapturedPage::new("https://x/week/6", "<p></p>"),
        ];
        let json = Report::build(&pages, &extractor()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["week"], 5);
        assert_eq!(items[0]["module"]["title"], "Five");
    }
}
