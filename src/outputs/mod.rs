//! Persistence of scraped articles.
//!
//! The pipeline hands records over in batches through [`ArticleStore`]; the
//! store decides where they go and reports the location it wrote.
//!
//! # Submodules
//!
//! - [`json`]: writes each batch to a timestamped, pretty-printed JSON file
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── techinasia_articles_artificial-intelligence_batch_1_20250506_143000.json
//! └── techinasia_articles_artificial-intelligence_batch_2_20250506_143000.json
//! ```

use crate::models::ArticleRecord;
use std::error::Error;
use std::path::PathBuf;

pub mod json;

/// Destination for finished records.
pub trait ArticleStore {
    /// Persist one batch and return where it was written. Implementations
    /// create their output location on demand.
    async fn save_batch(&self, records: &[ArticleRecord]) -> Result<PathBuf, Box<dyn Error>>;
}
