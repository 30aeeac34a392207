use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::{
    error::{ProgressError, Result},
    store::ProgressStore,
};

#[derive(Debug, Default)]
struct State {
    value: usize,
    writes: Vec<usize>,
    fail_from: Option<usize>,
}

/// In-memory checkpoint.
///
/// Every accepted write is recorded, and writes can be made to fail from the
/// Nth one on to exercise persistence failures.
#[derive(Debug, Clone, Default)]
pub struct MemoryProgressStore {
    state: Arc<Mutex<State>>,
}

impl MemoryProgressStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `value`.
    #[must_use]
    pub fn starting_at(value: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                value,
                ..State::default()
            })),
        }
    }

    /// Fail the `n`th write (1-based) and every write after it.
    #[must_use]
    pub fn failing_from(self, n: usize) -> Self {
        self.lock().fail_from = Some(n);
        self
    }

    #[must_use]
    pub fn value(&self) -> usize {
        self.lock().value
    }

    /// Values accepted so far, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<usize> {
        self.lock().writes.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn read(&self) -> usize {
        self.lock().value
    }

    async fn write(&self, next_index: usize) -> Result<()> {
        let mut state = self.lock();
        let attempt = state.writes.len() + 1;

        if state.fail_from.is_some_and(|n| attempt >= n) {
            return Err(ProgressError::Persistence(format!(
                "write {attempt} rejected"
            )));
        }

        state.value = next_index;
        state.writes.push(next_index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_writes() {
        let store = MemoryProgressStore::starting_at(3);
        assert_eq!(store.read().await, 3);

        store.write(4).await.unwrap();
        store.write(5).await.unwrap();
        assert_eq!(store.writes(), vec![4, 5]);
        assert_eq!(store.value(), 5);

        store.reset().await.unwrap();
        assert_eq!(store.read().await, 0);
    }

    #[tokio::test]
    async fn test_failing_from() {
        let store = MemoryProgressStore::new().failing_from(2);

        store.write(1).await.unwrap();
        assert!(matches!(
            store.write(2).await,
            Err(ProgressError::Persistence(_))
        ));
        assert!(store.write(3).await.is_err());
        assert_eq!(store.value(), 1);
        assert_eq!(store.writes(), vec![1]);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryProgressStore::new();
        let observer = store.clone();
        store.write(9).await.unwrap();
        assert_eq!(observer.value(), 9);
    }
}
