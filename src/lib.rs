//! coursegrab - resumable scraper for login- and challenge-gated course outlines.
//!
//! Pages are fetched through an automated browser after logging in and
//! solving the site's verification challenge, cached on disk so an
//! interrupted run resumes where it stopped, and parsed into ordered
//! module/section/lesson outlines.

pub mod browser;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod report;
pub mod scrape;
