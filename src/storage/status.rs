//! Append-only run status log.
//!
//! Each update adds one field to the `last-run-status` document, keyed by a
//! month/day/time label such as `Jul_17_123456`. Fields are never rewritten,
//! so the document reads as a chronological audit trail of every run.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::storage::deployment::keys::LAST_RUN_STATUS;
use crate::storage::encoding::NULL_SENTINEL;
use crate::storage::{StateStore, StoreResult};

pub struct StatusLog {
    store: Arc<dyn StateStore>,
    deployment: String,
    last_label: Mutex<Option<(String, u32)>>,
}

impl StatusLog {
    pub fn new(store: Arc<dyn StateStore>, deployment: impl Into<String>) -> Self {
        Self {
            store,
            deployment: deployment.into(),
            last_label: Mutex::new(None),
        }
    }

    /// Create the status document on the first run of a deployment
    pub async fn ensure_initialized(&self) -> StoreResult<()> {
        let existing = self
            .store
            .get_field(&self.deployment, LAST_RUN_STATUS, LAST_RUN_STATUS)
            .await?;
        if existing.is_none() {
            self.store
                .put_field(&self.deployment, LAST_RUN_STATUS, LAST_RUN_STATUS, NULL_SENTINEL)
                .await?;
        }
        Ok(())
    }

    /// Append a status message stamped with the current time
    pub async fn update(&self, message: &str) -> StoreResult<()> {
        self.update_at(message, Utc::now()).await
    }

    pub async fn update_at(&self, message: &str, at: DateTime<Utc>) -> StoreResult<()> {
        let label = self.next_label(at).await?;
        info!(status = %label, "📝 {}", message);
        self.store
            .put_field(&self.deployment, LAST_RUN_STATUS, &label, message)
            .await
    }

    /// First unused label for `at`. Same-second updates, a restarted run or a
    /// label from a previous year get a `_n` suffix instead of overwriting.
    async fn next_label(&self, at: DateTime<Utc>) -> StoreResult<String> {
        let base = status_label(at);
        let mut count = {
            let last = self.last_label.lock().unwrap_or_else(|e| e.into_inner());
            match &*last {
                Some((prev, n)) if *prev == base => n + 1,
                _ => 0,
            }
        };

        loop {
            let candidate = suffixed(&base, count);
            let taken = self
                .store
                .get_field(&self.deployment, LAST_RUN_STATUS, &candidate)
                .await?
                .is_some();
            if !taken {
                let mut last = self.last_label.lock().unwrap_or_else(|e| e.into_inner());
                *last = Some((base, count));
                return Ok(candidate);
            }
            count += 1;
        }
    }
}

fn suffixed(base: &str, count: u32) -> String {
    if count == 0 {
        base.to_string()
    } else {
        format!("{}_{}", base, count)
    }
}

/// `Mon_DD_HHMMSS` label for a status field
pub fn status_label(at: DateTime<Utc>) -> String {
    at.format("%b_%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::adapters::InMemoryStateStore;
    use chrono::TimeZone;

    #[test]
    fn test_label_format() {
        let at = Utc.with_ymd_and_hms(2025, 7, 17, 12, 34, 56).unwrap();
        assert_eq!(status_label(at), "Jul_17_123456");
    }

    #[tokio::test]
    async fn test_updates_never_overwrite() {
        let store = Arc::new(InMemoryStateStore::new());
        let log = StatusLog::new(store.clone(), "deploy-a");
        let at = Utc.with_ymd_and_hms(2025, 7, 17, 12, 34, 56).unwrap();

        log.ensure_initialized().await.unwrap();
        log.update_at("first", at).await.unwrap();
        log.update_at("second", at).await.unwrap();

        assert_eq!(
            store.get_field("deploy-a", LAST_RUN_STATUS, "Jul_17_123456").await.unwrap().as_deref(),
            Some("first")
        );
        assert_eq!(
            store.get_field("deploy-a", LAST_RUN_STATUS, "Jul_17_123456_1").await.unwrap().as_deref(),
            Some("second")
        );
        assert_eq!(
            store.get_field("deploy-a", LAST_RUN_STATUS, LAST_RUN_STATUS).await.unwrap().as_deref(),
            Some("null")
        );
    }

    #[tokio::test]
    async fn test_labels_left_by_an_earlier_run_are_kept() {
        let store = Arc::new(InMemoryStateStore::new());
        let at = Utc.with_ymd_and_hms(2025, 7, 17, 12, 34, 56).unwrap();
        store
            .put_field("deploy-a", LAST_RUN_STATUS, "Jul_17_123456", "previous run")
            .await
            .unwrap();
        store
            .put_field("deploy-a", LAST_RUN_STATUS, "Jul_17_123456_1", "previous run again")
            .await
            .unwrap();

        // a fresh log has no memory of those labels
        let log = StatusLog::new(store.clone(), "deploy-a");
        log.update_at("this run", at).await.unwrap();

        let fields = store.fields("deploy-a", LAST_RUN_STATUS).await;
        assert_eq!(fields.get("Jul_17_123456").map(String::as_str), Some("previous run"));
        assert_eq!(
            fields.get("Jul_17_123456_1").map(String::as_str),
            Some("previous run again")
        );
        assert_eq!(fields.get("Jul_17_123456_2").map(String::as_str), Some("this run"));
    }

    #[tokio::test]
    async fn test_initialization_keeps_existing_document() {
        let store = Arc::new(InMemoryStateStore::new());
        store
            .put_field("deploy-a", LAST_RUN_STATUS, LAST_RUN_STATUS, "previous")
            .await
            .unwrap();
        let log = StatusLog::new(store.clone(), "deploy-a");
        log.ensure_initialized().await.unwrap();
        assert_eq!(
            store.get_field("deploy-a", LAST_RUN_STATUS, LAST_RUN_STATUS).await.unwrap().as_deref(),
            Some("previous")
        );
    }
}
