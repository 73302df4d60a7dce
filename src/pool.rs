//! Fixed-size block allocator backing every in-flight connection.
//!
//! A [`BufferPool`] owns equal-size boxed blocks and a stack of free slots.
//! [`BufferPool::acquire`] moves a block out into a [`PoolBuf`]; dropping the
//! handle moves it back. Because every block is its own allocation, growing
//! the pool never relocates a block that is currently on loan.

use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;

/// Block size shared by the request, decode and response pools.
pub const REQUEST_BLOCK_SIZE: usize = 4096;
/// Percent-encoding can triple its input, so the encode pool is 3x larger.
pub const ENCODE_BLOCK_SIZE: usize = REQUEST_BLOCK_SIZE * 3;
pub const DEFAULT_POOL_CAPACITY: usize = 64;

struct Slot {
    index: usize,
    data: Box<[u8]>,
}

impl Slot {
    fn new(index: usize, block_size: usize) -> Self {
        Self {
            index,
            data: vec![0u8; block_size].into_boxed_slice(),
        }
    }
}

struct State {
    free: Vec<Slot>,
    capacity: usize,
}

impl State {
    /// Appends `capacity / 2 + 1` blocks and hands one of them straight back.
    fn grow(&mut self, block_size: usize) -> Slot {
        let added = self.capacity / 2 + 1;
        let first = self.capacity;
        self.free.reserve(added - 1);
        for index in (first + 1..first + added).rev() {
            self.free.push(Slot::new(index, block_size));
        }
        self.capacity += added;
        Slot::new(first, block_size)
    }
}

struct Shared {
    block_size: usize,
    state: Mutex<State>,
}

/// Growable pool of `block_size`-byte blocks. Cloning shares the same pool.
#[derive(Clone)]
pub struct BufferPool {
    shared: Arc<Shared>,
}

impl BufferPool {
    pub fn new(block_size: usize, initial_capacity: usize) -> Self {
        let free = (0..initial_capacity)
            .rev()
            .map(|index| Slot::new(index, block_size))
            .collect();
        Self {
            shared: Arc::new(Shared {
                block_size,
                state: Mutex::new(State {
                    free,
                    capacity: initial_capacity,
                }),
            }),
        }
    }

    /// Takes a block off the free stack, growing the pool when it is empty.
    pub fn acquire(&self) -> PoolBuf {
        let slot = {
            let mut state = self.shared.state.lock();
            match state.free.pop() {
                Some(slot) => slot,
                None => state.grow(self.shared.block_size),
            }
        };
        PoolBuf {
            index: slot.index,
            data: slot.data,
            pool: Arc::clone(&self.shared),
        }
    }

    pub fn block_size(&self) -> usize {
        self.shared.block_size
    }

    /// Total number of blocks ever created by this pool.
    pub fn capacity(&self) -> usize {
        self.shared.state.lock().capacity
    }

    pub fn available(&self) -> usize {
        self.shared.state.lock().free.len()
    }

    pub fn in_use(&self) -> usize {
        let state = self.shared.state.lock();
        state.capacity - state.free.len()
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("BufferPool")
            .field("block_size", &self.shared.block_size)
            .field("capacity", &state.capacity)
            .field("available", &state.free.len())
            .finish()
    }
}

/// A block on loan from a [`BufferPool`]. Returned to its pool on drop.
pub struct PoolBuf {
    index: usize,
    data: Box<[u8]>,
    pool: Arc<Shared>,
}

impl PoolBuf {
    /// Slot index inside the owning pool; stable for the life of the pool.
    pub fn slot(&self) -> usize {
        self.index
    }

    /// Returns the block to its pool now rather than at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for PoolBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for PoolBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for PoolBuf {
    fn drop(&mut self) {
        let data = mem::take(&mut self.data);
        self.pool.state.lock().free.push(Slot {
            index: self.index,
            data,
        });
    }
}

impl fmt::Debug for PoolBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuf")
            .field("slot", &self.index)
            .field("len", &self.data.len())
            .finish()
    }
}

/// The three process-wide pools, constructed once before the reactor starts.
#[derive(Clone, Debug)]
pub struct Pools {
    pub request: BufferPool,
    pub encode: BufferPool,
    pub response: BufferPool,
}

impl Pools {
    pub fn new(capacity: usize) -> Self {
        Self::with_block_size(REQUEST_BLOCK_SIZE, capacity)
    }

    /// Request, decode and response blocks are `block_size`; encode blocks are 3x.
    pub fn with_block_size(block_size: usize, capacity: usize) -> Self {
        Self {
            request: BufferPool::new(block_size, capacity),
            encode: BufferPool::new(block_size * 3, capacity),
            response: BufferPool::new(block_size, capacity),
        }
    }

    /// Checks out the four buffers one connection owns for its lifetime.
    pub fn checkout(&self) -> ConnBuffers {
        ConnBuffers {
            request: self.request.acquire(),
            decode: self.request.acquire(),
            encode: self.encode.acquire(),
            response: self.response.acquire(),
        }
    }
}

impl Default for Pools {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

/// Per-connection buffer set. Dropping it returns all four blocks.
#[derive(Debug)]
pub struct ConnBuffers {
    pub request: PoolBuf,
    pub decode: PoolBuf,
    pub encode: PoolBuf,
    pub response: PoolBuf,
}
