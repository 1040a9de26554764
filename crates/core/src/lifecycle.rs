//! Record lifecycle: pending placeholder, one fetch, one terminal write.
//!
//! [`Collector::collect`] is the synchronous path used by create requests and
//! by deferred workers alike. [`Collector::reserve`] is the first half of the
//! deferred path: it claims the URL with a pending placeholder so concurrent
//! misses agree on a single record.

use std::sync::Arc;

use crate::Error;
use crate::fetch::Fetcher;
use crate::record::{MetadataRecord, MetadataStatus};
use crate::store::MetadataDb;

/// Orchestrates fetch-and-store for a URL.
#[derive(Clone)]
pub struct Collector {
    fetcher: Arc<dyn Fetcher>,
    db: MetadataDb,
}

impl Collector {
    pub fn new(fetcher: Arc<dyn Fetcher>, db: MetadataDb) -> Self {
        Self { fetcher, db }
    }

    pub fn db(&self) -> &MetadataDb {
        &self.db
    }

    /// Fetch `url` once and store the terminal record.
    ///
    /// Fetch failures are stored as `failed` records and reported through the
    /// returned status; only store errors are returned as `Err`.
    pub async fn collect(&self, url: &str) -> Result<MetadataStatus, Error> {
        let outcome = self.fetcher.fetch(url).await;
        let record = MetadataRecord::from_outcome(url, outcome);
        let status = record.status();

        if let Err(e) = self.db.upsert(&record).await {
            tracing::error!(url, error = %e, "failed to store metadata");
            return Err(e);
        }

        tracing::info!(url, status = %status, "collected metadata");
        Ok(status)
    }

    /// Claim `url` with a pending placeholder.
    ///
    /// Returns `true` when this call created the placeholder, which makes the
    /// caller responsible for scheduling the deferred collection.
    pub async fn reserve(&self, url: &str) -> Result<bool, Error> {
        match self.db.insert_if_absent(url).await {
            Ok(true) => {
                tracing::debug!(url, "created pending placeholder");
                Ok(true)
            }
            Ok(false) => {
                tracing::debug!(url, "record already present, skipping placeholder");
                Ok(false)
            }
            Err(e) => {
                tracing::error!(url, error = %e, "failed to create pending placeholder");
                Err(e)
            }
        }
    }

    /// Current record for `url`, if any.
    pub async fn lookup(&self, url: &str) -> Result<Option<MetadataRecord>, Error> {
        self.db.get(url).await.inspect_err(|e| {
            tracing::error!(url, error = %e, "failed to read metadata");
        })
    }
}
