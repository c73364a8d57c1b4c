//! Pooled object lifecycle
//!
//! Avatars and observers are large (per-variant buffers, view lists,
//! working packet buffers) and churn with every login and logout. Freed
//! objects go back to a free list and are reset on their next allocation.
//! Objects are boxed so slabs of them stay small and reuse keeps the
//! allocation. An object flagged destroyed is never pooled again; it is
//! dropped.

use tracing::trace;

/// Lifecycle hooks for pooled objects
pub trait PooledObject: Sized {
    /// Parameters of an allocation
    type Args;

    /// Build a fresh object
    fn create(args: Self::Args) -> Self;

    /// Reset logical state when the object is taken from the free list
    fn on_alloc(&mut self, args: Self::Args);

    /// Drop buffer and reference state when the object is returned.
    /// Primitive fields are left as is; `on_alloc` overwrites them.
    fn on_dealloc(&mut self);

    /// Destroyed objects are never returned to the free list
    fn is_destroyed(&self) -> bool;
}

/// Allocation counters of a pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub created: u64,
    pub reused: u64,
    pub returned: u64,
    pub discarded: u64,
}

/// Free list of reusable objects
#[derive(Debug)]
pub struct ObjectPool<T: PooledObject> {
    free: Vec<Box<T>>,
    max_idle: usize,
    stats: PoolStats,
}

impl<T: PooledObject> ObjectPool<T> {
    /// Create a pool keeping at most `max_idle` objects
    pub fn new(max_idle: usize) -> Self {
        Self {
            free: Vec::new(),
            max_idle,
            stats: PoolStats::default(),
        }
    }

    /// Take an object from the free list or build a new one
    pub fn alloc(&mut self, args: T::Args) -> Box<T> {
        match self.free.pop() {
            Some(mut object) => {
                object.on_alloc(args);
                self.stats.reused += 1;
                object
            }
            None => {
                self.stats.created += 1;
                Box::new(T::create(args))
            }
        }
    }

    /// Return an object; destroyed objects are dropped instead
    pub fn dealloc(&mut self, mut object: Box<T>) {
        object.on_dealloc();
        if object.is_destroyed() {
            self.stats.discarded += 1;
            trace!("Discarding destroyed pooled object");
            return;
        }
        if self.free.len() >= self.max_idle {
            return;
        }
        self.stats.returned += 1;
        self.free.push(object);
    }

    /// Number of idle objects ready for reuse
    pub fn idle(&self) -> usize {
        self.free.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}
