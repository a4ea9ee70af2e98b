//! Data models for captured pages and extracted course outlines.

mod page;
mod record;

pub use page::CapturedPage;
pub use record::{ModuleRecord, SectionRecord};
