use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, bounded};
use tessera_mesh_cpu::LayerBuffers;

/// Fixed set of reusable staging packs. The pack count never changes: every
/// acquired pack comes back through either `release` or `discard`.
pub struct BufferPool {
    available_tx: Sender<LayerBuffers>,
    available_rx: Receiver<LayerBuffers>,
    capacity: usize,
    acquired: AtomicU64,
    released: AtomicU64,
    discarded: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferPoolStats {
    pub capacity: usize,
    pub free: usize,
    pub acquired: u64,
    pub released: u64,
    pub discarded: u64,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        for _ in 0..capacity {
            let _ = tx.send(LayerBuffers::new());
        }
        Self {
            available_tx: tx,
            available_rx: rx,
            capacity,
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    pub fn with_capacity_from_workers(worker_count: usize) -> Arc<Self> {
        Arc::new(Self::new(worker_count.max(1)))
    }

    /// Takes a free pack, or `None` when every pack is out.
    pub fn acquire(&self) -> Option<LayerBuffers> {
        let pack = self.available_rx.try_recv().ok()?;
        self.acquired.fetch_add(1, Ordering::Relaxed);
        Some(pack)
    }

    /// Returns a pack for reuse, keeping its allocations.
    pub fn release(&self, mut pack: LayerBuffers) {
        pack.clear_all();
        self.released.fetch_add(1, Ordering::Relaxed);
        let _ = self.available_tx.send(pack);
    }

    /// Returns the slot with a fresh pack; the old allocations are dropped.
    pub fn discard(&self, mut pack: LayerBuffers) {
        pack.discard_all();
        self.discarded.fetch_add(1, Ordering::Relaxed);
        let _ = self.available_tx.send(pack);
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn free_count(&self) -> usize {
        self.available_rx.len()
    }

    #[inline]
    pub fn has_free(&self) -> bool {
        !self.available_rx.is_empty()
    }

    pub fn stats(&self) -> BufferPoolStats {
        BufferPoolStats {
            capacity: self.capacity,
            free: self.free_count(),
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}
