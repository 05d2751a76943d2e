//! JSON batch files.
//!
//! Each call to [`JsonStore::save_batch`] writes one file named
//! `{prefix}_{category}_batch_{n}_{YYYYmmdd_HHMMSS}.json`, where `category`
//! is the slugified category and `n` counts batches written by this store
//! starting at 1. The category part is left out when its slug is empty.

use super::ArticleStore;
use crate::models::ArticleRecord;
use crate::utils::{file_stamp, slugify};
use std::error::Error;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::fs;
use tracing::{error, info, instrument};

#[derive(Debug)]
pub struct JsonStore {
    output_dir: PathBuf,
    prefix: String,
    category: String,
    batches: AtomicUsize,
}

impl JsonStore {
    pub fn new(output_dir: impl Into<PathBuf>, prefix: impl Into<String>, category: &str) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
            category: slugify(category),
            batches: AtomicUsize::new(0),
        }
    }

    fn file_name(&self, n: usize) -> String {
        if self.category.is_empty() {
            format!("{}_batch_{}_{}.json", self.prefix, n, file_stamp())
        } else {
            format!("{}_{}_batch_{}_{}.json", self.prefix, self.category, n, file_stamp())
        }
    }
}

impl ArticleStore for JsonStore {
    #[instrument(level = "info", skip_all, fields(output_dir = %self.output_dir.display(), count = records.len()))]
    async fn save_batch(&self, records: &[ArticleRecord]) -> Result<PathBuf, Box<dyn Error>> {
        let json = serde_json::to_string_pretty(records)?;

        if let Err(e) = fs::create_dir_all(&self.output_dir).await {
            error!(error = %e, "Failed to create output dir");
            return Err(e.into());
        }

        let n = self.batches.fetch_add(1, Ordering::SeqCst) + 1;
        let path = self.output_dir.join(self.file_name(n));

        info!(path = %path.display(), "Writing JSON batch");
        fs::write(&path, json).await?;
        info!(path = %path.display(), "Wrote JSON batch");

        Ok(path)
    }
}
