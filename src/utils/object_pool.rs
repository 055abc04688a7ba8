//! Object pooling for scratch buffers
//!
//! Reuses short-lived allocations (byte buffers for random string generation)
//! instead of allocating one per call.

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

type Reset<T> = Arc<dyn Fn(&mut T) + Send + Sync>;

/// A bounded pool of reusable objects
pub struct ObjectPool<T> {
    /// Idle objects
    idle: Arc<Mutex<Vec<T>>>,

    /// Creates an object when the pool is empty
    factory: Arc<dyn Fn() -> T + Send + Sync>,

    /// Cleans an object before it goes back to the pool
    reset: Reset<T>,

    /// Maximum number of idle objects kept
    max_idle: usize,
}

impl<T> ObjectPool<T> {
    /// Create a new object pool
    pub fn new<F, R>(factory: F, reset: R, max_idle: usize) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        R: Fn(&mut T) + Send + Sync + 'static,
    {
        Self {
            idle: Arc::new(Mutex::new(Vec::with_capacity(max_idle))),
            factory: Arc::new(factory),
            reset: Arc::new(reset),
            max_idle,
        }
    }

    /// Take an object from the pool, creating one if none is idle
    pub fn get(&self) -> PooledObject<T> {
        let value = self.idle.lock().pop().unwrap_or_else(|| (self.factory)());
        PooledObject {
            value: Some(value),
            idle: Arc::clone(&self.idle),
            reset: Arc::clone(&self.reset),
            max_idle: self.max_idle,
        }
    }

    /// Number of idle objects
    pub fn size(&self) -> usize {
        self.idle.lock().len()
    }
}

/// A pooled object that returns to its pool when dropped
pub struct PooledObject<T> {
    value: Option<T>,
    idle: Arc<Mutex<Vec<T>>>,
    reset: Reset<T>,
    max_idle: usize,
}

impl<T> Drop for PooledObject<T> {
    fn drop(&mut self) {
        if let Some(mut value) = self.value.take() {
            let mut idle = self.idle.lock();
            if idle.len() < self.max_idle {
                (self.reset)(&mut value);
                idle.push(value);
            }
        }
    }
}

impl<T> Deref for PooledObject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value.as_ref().expect("PooledObject already dropped")
    }
}

impl<T> DerefMut for PooledObject<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value.as_mut().expect("PooledObject already dropped")
    }
}

/// Pool of byte buffers
pub fn byte_buffer_pool(capacity: usize, max_idle: usize) -> ObjectPool<Vec<u8>> {
    ObjectPool::new(move || Vec::with_capacity(capacity), |buf| buf.clear(), max_idle)
}
