// Sub-modules
pub mod formatter;
pub mod template;

// Re-export public API
pub use formatter::Formatter;
pub use template::Template;
