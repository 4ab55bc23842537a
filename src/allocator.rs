//! Host allocator handle with live-object accounting.
//!
//! Every runtime object (instance, device, session, call, buffer, buffer view) registers itself with the host
//! allocator it was created with and unregisters on drop. The counters make leaks and double releases
//! observable: after a full teardown every [`ObjectKind`] must report zero live objects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Kinds of runtime objects tracked by a [`HostAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// [`Instance`](crate::runtime::Instance)
    Instance,
    /// [`Device`](crate::hal::Device)
    Device,
    /// [`Session`](crate::runtime::Session)
    Session,
    /// [`Call`](crate::runtime::Call)
    Call,
    /// [`Buffer`](crate::hal::Buffer)
    Buffer,
    /// [`BufferView`](crate::hal::BufferView)
    BufferView,
}
impl ObjectKind {
    const ALL: [ObjectKind; 6] = [
        ObjectKind::Instance,
        ObjectKind::Device,
        ObjectKind::Session,
        ObjectKind::Call,
        ObjectKind::Buffer,
        ObjectKind::BufferView,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Default)]
struct Counters {
    acquired: [AtomicU64; 6],
    released: [AtomicU64; 6],
    bytes_allocated: AtomicU64,
    bytes_freed: AtomicU64,
}

/// A handle to the host allocator.
///
/// Cloning the handle shares the same counters.
#[derive(Clone, Default)]
pub struct HostAllocator(Arc<Counters>);
impl HostAllocator {
    /// The default system allocator with fresh counters.
    pub fn system() -> Self {
        Self::default()
    }

    /// Snapshot of the current counters.
    pub fn statistics(&self) -> AllocatorStatistics {
        let load = |counters: &[AtomicU64; 6]| {
            let mut out = [0; 6];
            for kind in ObjectKind::ALL {
                out[kind.index()] = counters[kind.index()].load(Ordering::Acquire);
            }
            out
        };
        AllocatorStatistics {
            acquired: load(&self.0.acquired),
            released: load(&self.0.released),
            bytes_allocated: self.0.bytes_allocated.load(Ordering::Acquire),
            bytes_freed: self.0.bytes_freed.load(Ordering::Acquire),
        }
    }

    /// Whether two handles share the same counters.
    pub fn ptr_eq(&self, other: &HostAllocator) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn track(&self, kind: ObjectKind, bytes: usize) -> Tracked {
        self.0.acquired[kind.index()].fetch_add(1, Ordering::AcqRel);
        self.0
            .bytes_allocated
            .fetch_add(bytes as u64, Ordering::AcqRel);
        Tracked {
            allocator: self.clone(),
            kind,
            bytes,
        }
    }
}
impl std::fmt::Debug for HostAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HostAllocator")
            .field(&self.statistics())
            .finish()
    }
}

/// Registration of one live object; unregisters on drop.
pub(crate) struct Tracked {
    allocator: HostAllocator,
    kind: ObjectKind,
    bytes: usize,
}
impl Tracked {
    pub(crate) fn allocator(&self) -> &HostAllocator {
        &self.allocator
    }
}
impl Drop for Tracked {
    fn drop(&mut self) {
        let counters = &self.allocator.0;
        counters.released[self.kind.index()].fetch_add(1, Ordering::AcqRel);
        counters
            .bytes_freed
            .fetch_add(self.bytes as u64, Ordering::AcqRel);
    }
}

/// Snapshot of a [`HostAllocator`]'s counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorStatistics {
    acquired: [u64; 6],
    released: [u64; 6],
    bytes_allocated: u64,
    bytes_freed: u64,
}
impl AllocatorStatistics {
    /// Number of objects of the given kind ever created.
    pub fn acquired(&self, kind: ObjectKind) -> u64 {
        self.acquired[kind.index()]
    }

    /// Number of objects of the given kind released.
    pub fn released(&self, kind: ObjectKind) -> u64 {
        self.released[kind.index()]
    }

    /// Number of objects of the given kind currently alive.
    pub fn live(&self, kind: ObjectKind) -> u64 {
        self.acquired(kind) - self.released(kind)
    }

    /// Total number of live objects of all kinds.
    pub fn total_live(&self) -> u64 {
        ObjectKind::ALL.iter().map(|&kind| self.live(kind)).sum()
    }

    /// Total bytes of buffer storage allocated.
    pub fn bytes_allocated(&self) -> u64 {
        self.bytes_allocated
    }

    /// Total bytes of buffer storage freed.
    pub fn bytes_freed(&self) -> u64 {
        self.bytes_freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_and_release() {
        let allocator = HostAllocator::system();
        let a = allocator.track(ObjectKind::Buffer, 16);
        let b = allocator.track(ObjectKind::Buffer, 8);
        let c = allocator.track(ObjectKind::Call, 0);

        let stats = allocator.statistics();
        assert_eq!(stats.acquired(ObjectKind::Buffer), 2);
        assert_eq!(stats.live(ObjectKind::Call), 1);
        assert_eq!(stats.total_live(), 3);
        assert_eq!(stats.bytes_allocated(), 24);

        drop(a);
        drop(c);
        let stats = allocator.statistics();
        assert_eq!(stats.released(ObjectKind::Buffer), 1);
        assert_eq!(stats.total_live(), 1);
        assert_eq!(stats.bytes_freed(), 16);

        drop(b);
        let stats = allocator.statistics();
        assert_eq!(stats.total_live(), 0);
        assert_eq!(stats.bytes_allocated(), stats.bytes_freed());
    }

    #[test]
    fn clones_share_counters() {
        let allocator = HostAllocator::system();
        let other = allocator.clone();
        assert!(allocator.ptr_eq(&other));
        assert!(!allocator.ptr_eq(&HostAllocator::system()));

        let _t = other.track(ObjectKind::Instance, 0);
        assert_eq!(allocator.statistics().live(ObjectKind::Instance), 1);
    }
}
