//! Extracted course outline records.

use serde::Serialize;

/// One module (week) page: its title and its sections in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleRecord {
    pub title: String,
    pub sections: Vec<SectionRecord>,
}

/// A section within a module and its lesson names in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionRecord {
    pub title: String,
    pub lessons: Vec<String>,
}

impl ModuleRecord {
    /// Total number of lessons across all sections.
    pub fn lesson_count(&self) -> usize {
        self.sections.iter().map(|s| s.lessons.len()).sum()
    }
}
