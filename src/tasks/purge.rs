//! Purge Task
//!
//! Background task that periodically runs a collector pass over the cache tree.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::FileSystemDriver;

/// Spawns a background task that periodically purges expired cache entries.
///
/// The task sleeps for `interval_secs` between passes. Each pass walks the
/// filesystem, so it runs on the blocking thread pool.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let driver = Arc::new(FileSystemDriver::new(Config::from_env())?);
/// let purge_handle = spawn_purge_task(driver.clone(), 300);
/// // Later, during shutdown:
/// purge_handle.abort();
/// ```
pub fn spawn_purge_task(driver: Arc<FileSystemDriver>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting purge task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let pass_driver = driver.clone();
            match tokio::task::spawn_blocking(move || pass_driver.purge_with_report()).await {
                Ok(report) if report.files_removed > 0 => {
                    info!("Purge: removed {} expired entries", report.files_removed);
                }
                Ok(_) => debug!("Purge: no expired entries found"),
                Err(e) => warn!("Purge pass panicked: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheDriver, Value};
    use crate::config::Config;
    use chrono::Utc;

    fn driver(root: &std::path::Path) -> Arc<FileSystemDriver> {
        Arc::new(FileSystemDriver::new(Config::new(root)).unwrap())
    }

    #[tokio::test]
    async fn test_purge_task_removes_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(dir.path());

        let expired = Utc::now() - chrono::Duration::seconds(1);
        driver.store(&["expire_soon"], &Value::from("value"), Some(expired)).unwrap();

        let handle = spawn_purge_task(driver.clone(), 1);

        // Wait for the first pass to run
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(
            driver.get(&["expire_soon"]).unwrap().is_none(),
            "Expired entry should have been purged"
        );

        handle.abort();
    }

    #[tokio::test]
    async fn test_purge_task_preserves_valid_entries() {
        let dir = tempfile::tempdir().unwrap();
        let driver = driver(dir.path());

        let later = Utc::now() + chrono::Duration::hours(1);
        driver.store(&["long_lived"], &Value::from("value"), Some(later)).unwrap();
        driver.store(&["forever"], &Value::Int(1), None).unwrap();

        let handle = spawn_purge_task(driver.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let entry = driver.get(&["long_lived"]).unwrap();
        assert_eq!(entry.map(|e| e.value), Some(Value::from("value")));
        assert!(driver.get(&["forever"]).unwrap().is_some());

        handle.abort();
    }

    #[tokio::test]
    async fn test_purge_task_can_be_aborted() {
        let dir = tempfile::tempdir().unwrap();
        let handle = spawn_purge_task(driver(dir.path()), 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
