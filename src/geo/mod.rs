// Sub-modules
pub mod client;
pub mod constants;
pub mod flag;
pub mod types;
pub mod utils;

// Re-export public API
pub use client::{Endpoints, GeoClient, GeoLookup};
pub use types::{ClassField, ErrorInfo, GeoInfo, LookupOutcome, PresentationRecord};
