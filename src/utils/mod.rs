//! Shared helpers

pub mod object_pool;

pub use object_pool::{byte_buffer_pool, ObjectPool, PooledObject};
