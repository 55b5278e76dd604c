use std::{collections::HashSet, sync::Arc};

use tokio::sync::RwLock;

/// A shared, concurrently mutable set of chat ids.
///
/// Used for command and job ban lists and for the admin set. Clones share the
/// same underlying set, so a ban written by the dispatcher is seen by the
/// scheduler on its next read.
#[derive(Debug, Clone, Default)]
pub struct IdSet {
    inner: Arc<RwLock<HashSet<i64>>>,
}

pub type BanList = IdSet;
pub type AdminSet = IdSet;

impl IdSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, id: i64) -> bool {
        self.inner.read().await.contains(&id)
    }

    /// Returns `true` if the id was not already present.
    pub async fn insert(&self, id: i64) -> bool {
        self.inner.write().await.insert(id)
    }

    /// Returns `true` if the id was present.
    pub async fn remove(&self, id: i64) -> bool {
        self.inner.write().await.remove(&id)
    }

    /// Sorted copy of the current members.
    pub async fn snapshot(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.inner.read().await.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl From<HashSet<i64>> for IdSet {
    fn from(ids: HashSet<i64>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ids)),
        }
    }
}

impl FromIterator<i64> for IdSet {
    fn from_iter<T: IntoIterator<Item = i64>>(iter: T) -> Self {
        Self::from(iter.into_iter().collect::<HashSet<_>>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_membership() {
        let bans = IdSet::new();
        let seen_by_scheduler = bans.clone();
        assert!(!seen_by_scheduler.contains(7).await);

        assert!(bans.insert(7).await);
        assert!(!bans.insert(7).await);
        assert!(seen_by_scheduler.contains(7).await);
        assert_eq!(seen_by_scheduler.snapshot().await, vec![7]);
    }

    #[tokio::test]
    async fn snapshot_is_sorted() {
        let ids: IdSet = [30, 10, 20].into_iter().collect();
        assert_eq!(ids.snapshot().await, vec![10, 20, 30]);
        assert!(ids.remove(20).await);
        assert_eq!(ids.snapshot().await, vec![10, 30]);
    }
}
