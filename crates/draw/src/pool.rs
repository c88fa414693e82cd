use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(1);

/// Return an object to its inert default state, keeping any allocations.
pub trait Reset {
    fn reset(&mut self);
}

/// Exclusive claim on one pooled object.
///
/// Deliberately neither `Clone` nor `Copy`: `Pool::release` consumes the
/// handle, so double-return and use-after-return do not compile.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    pool: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Slot index inside the owning pool.
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Copyable reference to this checkout, for deferred lookups.
    pub fn key(&self) -> SlotKey {
        SlotKey {
            index: self.index,
            generation: self.generation,
        }
    }
}

/// Identifies one checkout of one slot.
///
/// A slot's generation advances on every checkout, so a key taken before a
/// release no longer resolves once the slot is handed out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    index: u32,
    generation: u32,
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("index", &self.index)
            .field("generation", &self.generation)
            .field("pool", &self.pool)
            .finish()
    }
}

/// Usage counters for one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Warm capacity the pool was configured with.
    pub capacity: usize,
    /// Objects actually allocated, including overflow growth.
    pub allocated: usize,
    pub in_use: usize,
    pub peak_in_use: usize,
    /// Objects allocated because the free list was empty.
    pub overflow_allocations: usize,
}

impl PoolStats {
    /// Fraction of allocated objects currently checked out.
    pub fn utilization(&self) -> f32 {
        if self.allocated == 0 {
            0.0
        } else {
            self.in_use as f32 / self.allocated as f32
        }
    }
}

/// Growable free-list pool of reusable objects.
///
/// Objects are created at warm-up or on overflow and never freed while the
/// pool lives. When the free list runs dry the pool grows instead of
/// failing, logging a warning once its size passes the sanity ceiling.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe; the overlay drives it from a single thread.
pub struct Pool<T> {
    id: u32,
    label: &'static str,
    slots: Vec<T>,
    active: Vec<bool>,
    generations: Vec<u32>,
    free: Vec<u32>,
    capacity: usize,
    ceiling: usize,
    in_use: usize,
    peak_in_use: usize,
    overflow_allocations: usize,
    warned: bool,
}

impl<T: Default + Reset> Pool<T> {
    /// Create a pool pre-warmed with `capacity` objects.
    pub fn new(label: &'static str, capacity: usize, ceiling: usize) -> Self {
        let mut pool = Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            label,
            slots: Vec::with_capacity(capacity),
            active: Vec::with_capacity(capacity),
            generations: Vec::with_capacity(capacity),
            free: Vec::with_capacity(capacity),
            capacity: 0,
            ceiling: ceiling.max(capacity),
            in_use: 0,
            peak_in_use: 0,
            overflow_allocations: 0,
            warned: false,
        };
        pool.reserve_to(capacity);
        pool
    }

    /// Grow the warm capacity to `capacity`. Pools never shrink.
    pub fn reserve_to(&mut self, capacity: usize) {
        while self.slots.len() < capacity {
            let index = self.push_slot();
            self.free.push(index);
        }
        // Keep low indices at the top of the free list.
        self.free.sort_unstable_by(|a, b| b.cmp(a));
        self.capacity = self.capacity.max(capacity);
        self.ceiling = self.ceiling.max(self.capacity);
    }

    pub fn set_ceiling(&mut self, ceiling: usize) {
        self.ceiling = ceiling.max(self.capacity);
        self.warned = false;
    }

    /// Claim an object, growing the pool if none is free.
    pub fn checkout(&mut self) -> Handle<T> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.overflow_allocations += 1;
                let index = self.push_slot();
                if self.slots.len() > self.ceiling && !self.warned {
                    self.warned = true;
                    tracing::warn!(
                        pool = self.label,
                        allocated = self.slots.len(),
                        ceiling = self.ceiling,
                        "pool grew past its sanity ceiling"
                    );
                }
                index
            }
        };
        let slot = index as usize;
        self.active[slot] = true;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.in_use += 1;
        self.peak_in_use = self.peak_in_use.max(self.in_use);
        Handle {
            index,
            generation: self.generations[slot],
            pool: self.id,
            _marker: PhantomData,
        }
    }

    /// Reset the object to its inert state and return it to the free list.
    pub fn release(&mut self, handle: Handle<T>) {
        debug_assert_eq!(handle.pool, self.id, "handle released to a foreign pool");
        let index = handle.index as usize;
        debug_assert!(self.active[index], "pooled object released twice");
        self.slots[index].reset();
        self.active[index] = false;
        self.free.push(handle.index);
        self.in_use -= 1;
    }

    fn push_slot(&mut self) -> u32 {
        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(T::default());
        self.active.push(false);
        self.generations.push(0);
        index
    }
}

impl<T> Pool<T> {
    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn get(&self, handle: &Handle<T>) -> &T {
        debug_assert_eq!(handle.pool, self.id, "handle used with a foreign pool");
        &self.slots[handle.index as usize]
    }

    pub fn get_mut(&mut self, handle: &Handle<T>) -> &mut T {
        debug_assert_eq!(handle.pool, self.id, "handle used with a foreign pool");
        &mut self.slots[handle.index as usize]
    }

    /// The object behind `key`, if that checkout has not been released.
    pub fn get_live(&self, key: SlotKey) -> Option<&T> {
        let index = key.index as usize;
        match (self.active.get(index), self.generations.get(index)) {
            (Some(true), Some(&generation)) if generation == key.generation => self.slots.get(index),
            _ => None,
        }
    }

    /// Objects currently sitting in the free list.
    pub fn iter_free(&self) -> impl Iterator<Item = &T> {
        self.slots
            .iter()
            .zip(&self.active)
            .filter(|(_, active)| !**active)
            .map(|(slot, _)| slot)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.capacity,
            allocated: self.slots.len(),
            in_use: self.in_use,
            peak_in_use: self.peak_in_use,
            overflow_allocations: self.overflow_allocations,
        }
    }

    pub fn in_use(&self) -> usize {
        self.in_use
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("label", &self.label)
            .field("stats", &self.stats())
            .finish()
    }
}
