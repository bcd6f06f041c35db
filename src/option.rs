//! Retention and reader configuration.

use std::time::Duration;

/// Per-column version retention limits applied by the versioned merger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionConfig {
    pub(crate) min_data_versions: usize,
    pub(crate) max_data_versions: usize,
    pub(crate) min_data_ttl: Duration,
    pub(crate) max_data_ttl: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        RetentionConfig {
            min_data_versions: 1,
            max_data_versions: 1,
            min_data_ttl: Duration::from_secs(5 * 60),
            max_data_ttl: Duration::from_secs(5 * 60),
        }
    }
}

impl RetentionConfig {
    /// Versions kept regardless of age.
    pub fn min_data_versions(self, min_data_versions: usize) -> Self {
        RetentionConfig {
            min_data_versions,
            ..self
        }
    }

    /// Cap on versions kept once past `min_data_ttl`.
    pub fn max_data_versions(self, max_data_versions: usize) -> Self {
        RetentionConfig {
            max_data_versions,
            ..self
        }
    }

    /// Age below which versions beyond `min_data_versions` are still kept.
    pub fn min_data_ttl(self, min_data_ttl: Duration) -> Self {
        RetentionConfig {
            min_data_ttl,
            ..self
        }
    }

    /// Age beyond which versions are always purged.
    pub fn max_data_ttl(self, max_data_ttl: Duration) -> Self {
        RetentionConfig {
            max_data_ttl,
            ..self
        }
    }

    /// Configured `min_data_versions`.
    pub fn get_min_data_versions(&self) -> usize {
        self.min_data_versions
    }

    /// Configured `max_data_versions`.
    pub fn get_max_data_versions(&self) -> usize {
        self.max_data_versions
    }

    /// Configured `min_data_ttl`.
    pub fn get_min_data_ttl(&self) -> Duration {
        self.min_data_ttl
    }

    /// Configured `max_data_ttl`.
    pub fn get_max_data_ttl(&self) -> Duration {
        self.max_data_ttl
    }
}

/// Tuning of the overlapping readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    pub(crate) min_concurrency: usize,
    pub(crate) batch_size: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            min_concurrency: 1,
            batch_size: 1024,
        }
    }
}

impl ReaderOptions {
    /// Sessions kept open even when the merge key has not reached their
    /// boundary yet. Clamped to at least one.
    pub fn min_concurrency(self, min_concurrency: usize) -> Self {
        ReaderOptions {
            min_concurrency: min_concurrency.max(1),
            ..self
        }
    }

    /// Upper bound on rows returned by one read.
    pub fn batch_size(self, batch_size: usize) -> Self {
        ReaderOptions {
            batch_size: batch_size.max(1),
            ..self
        }
    }

    /// Configured minimum number of open sessions.
    pub fn get_min_concurrency(&self) -> usize {
        self.min_concurrency
    }

    /// Configured batch size.
    pub fn get_batch_size(&self) -> usize {
        self.batch_size
    }
}
