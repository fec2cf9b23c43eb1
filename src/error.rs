use std::path::PathBuf;
use std::time::Duration;

/// Failures a caller may want to tell apart. Everything else travels as a
/// plain `anyhow::Error`.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("scroll container not found: no element matched {selector:?} within {waited:?}")]
    ContainerNotFound { selector: String, waited: Duration },

    #[error("feed content not found: no element matched {selector:?} within {waited:?}")]
    ContentNotFound { selector: String, waited: Duration },

    #[error("no links file (products_*.json) found in {}", dir.display())]
    NoInputFile { dir: PathBuf },

    #[error("invalid raw record input: {0}")]
    Schema(String),
}
