//! Fixed-size worker pools and the registry that shares them between submissions.

use std::{
    fmt::{self, Debug, Formatter},
    sync::atomic::{AtomicUsize, Ordering},
};

use dashmap::DashMap;
use rayon::{ThreadPool, ThreadPoolBuilder};
use smol_str::SmolStr;
use tracing::info;
use tvm_core::{Error, Result, Shared};

/// Counts a task as active for as long as it lives.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    fn enter(active: &'a AtomicUsize) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self(active)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A rayon pool that tracks how many of its tasks are running.
pub struct WorkerPool {
    pool: ThreadPool,
    max: usize,
    active: Shared<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<Self> {
        let max = size.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(max)
            .thread_name(|index| format!("tvm-rx-{}", index))
            .build()
            .map_err(|e| Error::PoolBuild(e.to_string()))?;

        Ok(Self {
            pool,
            max,
            active: Shared::new(AtomicUsize::new(0)),
        })
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Whether every worker is busy.
    pub fn is_saturated(&self) -> bool {
        self.active_count() >= self.max
    }

    /// Runs `task` on a worker without waiting for it.
    pub fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let active = Shared::clone(&self.active);
        self.pool.spawn(move || {
            let _guard = ActiveGuard::enter(&active);
            task();
        });
    }

    /// Applies `f` to every item on the pool and returns the results in item order.
    pub fn map_ordered<I, T, F>(&self, items: Vec<I>, f: F) -> Vec<T>
    where
        I: Send,
        T: Send,
        F: Fn(I) -> T + Sync,
    {
        let mut slots: Vec<Option<T>> = items.iter().map(|_| None).collect();
        let active = &*self.active;
        let f = &f;

        self.pool.scope(|scope| {
            for (slot, item) in slots.iter_mut().zip(items) {
                scope.spawn(move |_| {
                    let _guard = ActiveGuard::enter(active);
                    *slot = Some(f(item));
                });
            }
        });

        slots.into_iter().flatten().collect()
    }
}

impl Debug for WorkerPool {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("max", &self.max)
            .field("active", &self.active_count())
            .finish()
    }
}

/// Maps query ids to the worker pool serving them.
///
/// Lookup-or-create is atomic per id, so concurrent submissions of one query share a
/// single pool. Pools live until removed from the registry that owns them.
#[derive(Debug, Default)]
pub struct PoolRegistry {
    pools: DashMap<SmolStr, Shared<WorkerPool>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Shared<WorkerPool>> {
        self.pools.get(id).map(|pool| Shared::clone(pool.value()))
    }

    /// Returns the pool for `id`, creating one with `size` workers on first use.
    pub fn get_or_create(&self, id: &str, size: usize) -> Result<Shared<WorkerPool>> {
        self.pools
            .entry(SmolStr::new(id))
            .or_try_insert_with(|| {
                let pool = WorkerPool::new(size)?;
                info!(id, size = pool.max(), "created worker pool");
                Ok(Shared::new(pool))
            })
            .map(|pool| Shared::clone(pool.value()))
    }

    pub fn remove(&self, id: &str) -> Option<Shared<WorkerPool>> {
        self.pools.remove(id).map(|(_, pool)| pool)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use rstest::rstest;

    #[test]
    fn test_active_count_tracks_spawned_tasks() {
        let pool = WorkerPool::new(1).unwrap();
        let (started_tx, started_rx) = bounded(0);
        let (release_tx, release_rx) = bounded::<()>(0);

        pool.spawn(move || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        });
        started_rx.recv().unwrap();

        assert_eq!(pool.active_count(), 1);
        assert!(pool.is_saturated());

        release_tx.send(()).unwrap();
        while pool.active_count() > 0 {
            std::thread::yield_now();
        }
        assert!(!pool.is_saturated());
    }

    #[rstest]
    #[case(1)]
    #[case(4)]
    fn test_map_ordered_keeps_item_order(#[case] size: usize) {
        let pool = WorkerPool::new(size).unwrap();
        let squares = pool.map_ordered((0..32).collect(), |i: i64| i * i);
        assert_eq!(squares, (0..32).map(|i| i * i).collect::<Vec<_>>());
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_zero_size_pool_has_one_worker() {
        assert_eq!(WorkerPool::new(0).unwrap().max(), 1);
    }

    #[test]
    fn test_registry_reuses_pool_per_id() {
        let registry = PoolRegistry::new();
        let first = registry.get_or_create("q", 2).unwrap();
        let second = registry.get_or_create("q", 8).unwrap();
        let other = registry.get_or_create("r", 2).unwrap();

        assert!(Shared::ptr_eq(&first, &second));
        assert!(!Shared::ptr_eq(&first, &other));
        assert_eq!(second.max(), 2);
        assert_eq!(registry.len(), 2);

        assert!(registry.remove("q").is_some());
        assert!(registry.get("q").is_none());
    }
}
