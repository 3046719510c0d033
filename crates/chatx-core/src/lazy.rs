//! Fetch-on-read resolution shared by every entity field.
//!
//! A [`LazyField`] pairs a synchronous getter over some backing record with
//! an asynchronous updater that fills that record (usually by fetching and
//! scraping a page). Reads that find a value never touch the network. Reads
//! that find nothing queue on one gate, so concurrent readers of a field
//! that is still being fetched wait for the in-flight fetch instead of
//! starting their own.
//!
//! One gate is meant to guard one fetch source: every field populated by the
//! same page should resolve through the same `LazyField`.

use std::future::Future;

use tokio::sync::Mutex;
use tracing::trace;

use crate::errors::{ChatExchangeError, Result};

/// Coalescing gate for one lazily fetched source.
#[derive(Debug, Default)]
pub struct LazyField {
    gate: Mutex<()>,
}

impl LazyField {
    /// New gate with no fetch in flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the value yielded by `getter`, running `updater` first if the
    /// getter comes back empty.
    ///
    /// The updater runs at most once per gap: readers arriving while it is in
    /// flight wait for it and then re-check the getter. If the getter is
    /// still empty after a successful update the read fails with
    /// [`ChatExchangeError::MissingField`]; it is not retried.
    pub async fn resolve<T, G, U, Fut>(&self, field: &'static str, getter: G, updater: U) -> Result<T>
    where
        G: Fn() -> Option<T>,
        U: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        if let Some(value) = getter() {
            return Ok(value);
        }

        let _guard = self.gate.lock().await;
        if let Some(value) = getter() {
            trace!(field, "resolved by concurrent fetch");
            return Ok(value);
        }

        trace!(field, "fetching");
        updater().await?;
        getter().ok_or(ChatExchangeError::MissingField { field })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Backing {
        lazy: LazyField,
        value: std::sync::Mutex<Option<String>>,
        fetches: AtomicUsize,
    }

    impl Backing {
        fn get(&self) -> Option<String> {
            self.value.lock().unwrap().clone()
        }

        async fn fetch(&self, fill: Option<&str>) -> Result<()> {
            let _ = self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            *self.value.lock().unwrap() = fill.map(str::to_string);
            Ok(())
        }

        async fn read(&self, fill: Option<&str>) -> Result<String> {
            self.lazy
                .resolve("name", || self.get(), || self.fetch(fill))
                .await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cached_value_skips_updater() {
        let backing = Backing::default();
        *backing.value.lock().unwrap() = Some("seeded".into());

        assert_eq!(backing.read(Some("fetched")).await.unwrap(), "seeded");
        assert_eq!(backing.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_once_then_reads_from_cache() {
        let backing = Backing::default();

        assert_eq!(backing.read(Some("alice")).await.unwrap(), "alice");
        assert_eq!(backing.read(Some("other")).await.unwrap(), "alice");
        assert_eq!(backing.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_reads_share_one_fetch() {
        let backing = Arc::new(Backing::default());

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let backing = Arc::clone(&backing);
                tokio::spawn(async move { backing.read(Some("alice")).await })
            })
            .collect();

        for reader in readers {
            assert_eq!(reader.await.unwrap().unwrap(), "alice");
        }
        assert_eq!(backing.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_after_update_is_missing_field() {
        let backing = Backing::default();

        let err = backing.read(None).await.unwrap_err();
        assert_matches!(err, ChatExchangeError::MissingField { field: "name" });
    }

    #[tokio::test(start_paused = true)]
    async fn updater_error_propagates_and_next_read_retries() {
        let lazy = LazyField::new();
        let attempts = AtomicUsize::new(0);

        let err = lazy
            .resolve(
                "key",
                || None::<u32>,
                || async {
                    let _ = attempts.fetch_add(1, Ordering::SeqCst);
                    Err(ChatExchangeError::Request("offline".into()))
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_transport());

        let value = lazy
            .resolve("key", || Some(7_u32), || async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
