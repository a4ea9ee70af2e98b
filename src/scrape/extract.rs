//! Turns captured module pages into ordered outline records.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;
use crate::models::{CapturedPage, ModuleRecord, SectionRecord};

/// CSS selectors describing the page structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractConfig {
    #[serde(default = "default_module")]
    pub module: String,
    /// Searched within the module node.
    #[serde(default = "default_module_title")]
    pub module_title: String,
    /// Searched within the module node.
    #[serde(default = "default_section")]
    pub section: String,
    /// Searched within each section node.
    #[serde(default = "default_section_title")]
    pub section_title: String,
    /// Searched within each section node.
    #[serde(default = "default_lesson")]
    pub lesson: String,
}

fn default_module() -> String {
    ".rc-ModuleSection".to_string()
}
fn default_module_title() -> String {
    "h3.card-headline-text".to_string()
}
fn default_section() -> String {
    ".rc-NamedItemList".to_string()
}
fn default_section_title() -> String {
    ".card-headline-text".to_string()
}
fn default_lesson() -> String {
    ".rc-WeekItemName".to_string()
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            module: default_module(),
            module_title: default_module_title(),
            section: default_section(),
            section_title: default_section_title(),
            lesson: default_lesson(),
        }
    }
}

struct Compiled {
    source: String,
    selector: Selector,
}

impl Compiled {
    fn new(source: &str) -> Result<Self, ExtractionError> {
        let selector = Selector::parse(source).map_err(|e| ExtractionError::InvalidSelector {
            selector: source.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: source.to_string(),
            selector,
        })
    }

    fn first<'a>(&self, scope: ElementRef<'a>, what: &'static str) -> Result<ElementRef<'a>, ExtractionError> {
        scope
            .select(&self.selector)
            .next()
            .ok_or_else(|| ExtractionError::MissingNode {
                what,
                selector: self.source.clone(),
            })
    }
}

/// Deterministic HTML → [`ModuleRecord`] parser.
pub struct ContentExtractor {
    module: Compiled,
    module_title: Compiled,
    section: Compiled,
    section_title: Compiled,
    lesson: Compiled,
}

impl ContentExtractor {
    pub fn new(config: &ExtractConfig) -> Result<Self, ExtractionError> {
        Ok(Self {
            module: Compiled::new(&config.module)?,
            module_title: Compiled::new(&config.module_title)?,
            section: Compiled::new(&config.section)?,
            section_title: Compiled::new(&config.section_title)?,
            lesson: Compiled::new(&config.lesson)?,
        })
    }

    pub fn parse(&self, page: &CapturedPage) -> Result<ModuleRecord, ExtractionError> {
        self.parse_html(&page.content)
    }

    /// Sections and lessons keep document order. A lesson's name is its first
    /// direct text child with visible characters; later text and child
    /// elements are ignored, and lessons without such a child are skipped.
    pub fn parse_html(&self, html: &str) -> Result<ModuleRecord, ExtractionError> {
        let document = Html::parse_document(html);
        let module = self.module.first(document.root_element(), "module section")?;
        let title = element_text(self.module_title.first(module, "module title")?);

        let mut sections = Vec::new();
        for section in module.select(&self.section.selector) {
            let title = element_text(self.section_title.first(section, "section title")?);
            let lessons = section
                .select(&self.lesson.selector)
                .filter_map(first_text_child)
                .collect();
            sections.push(SectionRecord { title, lessons });
        }

        Ok(ModuleRecord { title, sections })
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Lesson name: the first direct text child with visible characters,
/// trimmed. Whitespace-only text nodes (indentation between tags) are
/// skipped, and text inside child elements is never used.
fn first_text_child(element: ElementRef<'_>) -> Option<String> {
    element.children().find_map(|child| {
        child
            .value()
            .as_text()
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    })
}
