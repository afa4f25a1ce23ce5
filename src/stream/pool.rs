//! Recycling arena for grains.

use crate::grain::Grain;

// -------------------------------------------------------------------------------------------------

/// Arena of grains, addressed by index, split into an active and a dead (unused) index list.
///
/// Every arena slot is referenced by exactly one of the two lists. Both lists keep a capacity
/// of at least the arena's size, so moving indices between them never allocates. Only growing
/// the arena, when no dead grain is available, allocates.
#[derive(Debug, Default)]
pub(crate) struct GrainPool {
    grains: Vec<Grain>,
    active: Vec<usize>,
    dead: Vec<usize>,
}

impl GrainPool {
    /// Create a new pool with the given number of preallocated dead grains.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut grains = Vec::with_capacity(capacity);
        grains.resize_with(capacity, Grain::default);
        Self {
            grains,
            active: Vec::with_capacity(capacity),
            dead: (0..capacity).rev().collect(),
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn dead_count(&self) -> usize {
        self.dead.len()
    }

    /// Total number of grains the pool has created so far.
    pub fn grain_count(&self) -> usize {
        self.grains.len()
    }

    /// Get a dead grain or create a new one, and move it into the active list.
    /// Returns the index of the reset grain.
    pub fn acquire(&mut self) -> usize {
        let index = match self.dead.pop() {
            Some(index) => index,
            None => {
                self.grains.push(Grain::default());
                let len = self.grains.len();
                if self.active.capacity() < len {
                    self.active.reserve(len - self.active.len());
                }
                if self.dead.capacity() < len {
                    self.dead.reserve(len - self.dead.len());
                }
                len - 1
            }
        };
        self.grains[index].reset();
        self.active.push(index);
        index
    }

    /// Move the most recently acquired active grain back into the dead list.
    pub fn release_last(&mut self) {
        if let Some(index) = self.active.pop() {
            self.dead.push(index);
        }
    }

    pub fn grain(&self, index: usize) -> &Grain {
        &self.grains[index]
    }

    pub fn grain_mut(&mut self, index: usize) -> &mut Grain {
        &mut self.grains[index]
    }

    /// Iterate over all active grains.
    pub fn active_grains(&self) -> impl Iterator<Item = &Grain> {
        self.active.iter().map(|index| &self.grains[*index])
    }

    /// Call the given function for all active grains, moving all grains for which it returns
    /// false into the dead list. Preserves the order of the remaining active grains.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Grain) -> bool,
    {
        let grains = &mut self.grains;
        let dead = &mut self.dead;
        self.active.retain(|index| {
            let keep = f(&mut grains[*index]);
            if !keep {
                dead.push(*index);
            }
            keep
        });
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exclusive(pool: &GrainPool) {
        assert_eq!(pool.active_count() + pool.dead_count(), pool.grain_count());
        let mut seen = vec![false; pool.grain_count()];
        for index in pool.active.iter().chain(pool.dead.iter()) {
            assert!(!seen[*index], "grain {index} is referenced twice");
            seen[*index] = true;
        }
        assert!(pool.active.capacity() >= pool.grain_count());
        assert!(pool.dead.capacity() >= pool.grain_count());
    }

    #[test]
    fn lifecycle() {
        let mut pool = GrainPool::with_capacity(2);
        assert_eq!(pool.dead_count(), 2);
        assert_exclusive(&pool);

        let a = pool.acquire();
        let b = pool.acquire();
        let c = pool.acquire();
        assert_eq!(pool.grain_count(), 3);
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_exclusive(&pool);

        pool.grain_mut(b).stop();
        pool.retain(|grain| !grain.is_finished());
        // all default grains have zero duration, so they are finished
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.dead_count(), 3);
        assert_exclusive(&pool);

        // reuse without growing
        let d = pool.acquire();
        assert_eq!(pool.grain(d).elapsed(), 0);
        assert_eq!(pool.grain_count(), 3);
        pool.release_last();
        assert_eq!(pool.active_count(), 0);
        assert_exclusive(&pool);
    }

    #[test]
    fn retain_keeps_order() {
        let mut pool = GrainPool::with_capacity(0);
        for duration in [10, 0, 20, 0, 30] {
            let index = pool.acquire();
            pool.grain_mut(index).duration_samples = duration;
        }
        pool.retain(|grain| !grain.is_finished());
        let durations = pool
            .active_grains()
            .map(|grain| grain.duration_samples())
            .collect::<Vec<_>>();
        assert_eq!(durations, vec![10, 20, 30]);
        assert_exclusive(&pool);
    }
}
