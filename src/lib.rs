//! # ipcheck
//!
//! Status bar helper that reports geolocation and network details for an
//! IP address, by default your own external one.
//!
//! - Self-IP discovery through a plain text echo service
//! - Geolocation lookup (ipapi.co compatible JSON)
//! - JSON result cache keyed by IP
//! - `{placeholder}` templates for the Waybar `text`, `alt` and `tooltip`
//!   fields, plus `class` tags for styling
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use ipcheck::{Checker, CheckerOptions, Endpoints, Formatter, GeoClient};
//!
//! fn main() -> anyhow::Result<()> {
//!     let client = GeoClient::new(Endpoints::default(), Duration::from_secs(10))?;
//!     let mut checker = Checker::new(client, Formatter::with_defaults()?, CheckerOptions::default());
//!
//!     let record = checker.check("8.8.8.8")?;
//!     println!("{}", serde_json::to_string(&record)?);
//!     Ok(())
//! }
//! ```

pub mod checker;
pub mod config;
pub mod core;
pub mod error;
pub mod format;
pub mod geo;
pub mod storage;
pub mod utils;

// Re-export commonly used types for convenience
pub use checker::{Checker, CheckerOptions};
pub use error::{CacheError, FlagError, LookupError, TemplateError};
pub use format::Formatter;
pub use geo::{Endpoints, GeoClient, GeoInfo, GeoLookup, LookupOutcome, PresentationRecord};
pub use storage::ResultCache;
