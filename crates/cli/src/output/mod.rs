//! Output configuration and formatting

mod formatter;

pub use formatter::Formatter;

/// How command results are written
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Emit JSON instead of human-readable text
    pub json: bool,
    pub no_color: bool,
    /// Suppress everything but errors
    pub quiet: bool,
}
