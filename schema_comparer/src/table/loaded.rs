//! Lazily populated metadata caches

use std::future::Future;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// State of one lazily loaded cache
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded<T> {
    NotLoaded,
    Loaded(T),
    /// The last fetch failed; reads serve an empty value until the next reload
    Failed(String),
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Loaded::NotLoaded
    }
}

impl<T> Loaded<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Loaded::Loaded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Loaded::Failed(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Loaded::Loaded(value) => Some(value),
            _ => None,
        }
    }
}

/// Cache cell shared by concurrent readers.
///
/// The lock is held across the fetch, so readers arriving while a fetch is
/// in flight wait for it instead of starting their own.
#[derive(Debug, Default)]
pub struct CacheCell<T> {
    state: Mutex<Loaded<T>>,
}

impl<T: Clone + Default> CacheCell<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Loaded::NotLoaded),
        }
    }

    /// Return the cached value, fetching it first when not loaded.
    ///
    /// A failed fetch is reported once as [`Error::MetadataFetchError`];
    /// later reads return `T::default()` without fetching again.
    pub async fn get_or_fetch<F>(&self, table: &str, cache: &str, fetch: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let mut state = self.state.lock().await;
        match &*state {
            Loaded::Loaded(value) => return Ok(value.clone()),
            Loaded::Failed(_) => return Ok(T::default()),
            Loaded::NotLoaded => {}
        }

        match fetch.await {
            Ok(value) => {
                tracing::debug!(table = table, cache = cache, "Metadata cache populated");
                *state = Loaded::Loaded(value.clone());
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(table = table, cache = cache, error = %e, "Metadata fetch failed");
                *state = Loaded::Failed(e.to_string());
                Err(Error::MetadataFetchError(format!(
                    "Failed to load {} of {}: {}",
                    cache, table, e
                )))
            }
        }
    }

    /// Forget the cached value so the next read fetches again
    pub async fn invalidate(&self) {
        *self.state.lock().await = Loaded::NotLoaded;
    }

    /// Copy of the current state
    pub async fn state(&self) -> Loaded<T> {
        self.state.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_second_read_uses_cache() {
        let cell: CacheCell<Vec<u32>> = CacheCell::new();
        let fetches = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = cell
                .get_or_fetch("T", "columns", async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![1, 2])
                })
                .await
                .unwrap();
            assert_eq!(value, vec![1, 2]);
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_reported_once() {
        let cell: CacheCell<Vec<u32>> = CacheCell::new();

        let first = cell
            .get_or_fetch("T", "indexes", async {
                Err(Error::DatabaseError("connection lost".to_string()))
            })
            .await;
        assert!(matches!(first, Err(Error::MetadataFetchError(_))));
        assert!(cell.state().await.is_failed());

        let refetches = AtomicUsize::new(0);
        let second = cell
            .get_or_fetch("T", "indexes", async {
                refetches.fetch_add(1, Ordering::SeqCst);
                Ok(vec![9])
            })
            .await
            .unwrap();
        assert!(second.is_empty());
        assert_eq!(refetches.load(Ordering::SeqCst), 0);

        cell.invalidate().await;
        let third = cell
            .get_or_fetch("T", "indexes", async { Ok(vec![7]) })
            .await
            .unwrap();
        assert_eq!(third, vec![7]);
    }
}
