use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// A handle whose GPU-side part can be released on the render thread.
///
/// `release` must tolerate being called for an object that was already
/// released.
pub trait Releasable<C>: Send + Sync {
    fn release(&self, ctx: &mut C);
}

/// Weak list of every live GPU-backed handle, swept at shutdown.
///
/// Handles register on creation. The registry never keeps them alive; a
/// handle dropped before shutdown releases itself.
pub struct ResourceRegistry<C> {
    live: Mutex<Vec<Weak<dyn Releasable<C>>>>,
}

impl<C> Default for ResourceRegistry<C> {
    fn default() -> Self {
        Self { live: Mutex::new(Vec::new()) }
    }
}

impl<C: 'static> ResourceRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<R: Releasable<C> + 'static>(&self, resource: &Arc<R>) {
        let resource: Arc<dyn Releasable<C>> = resource.clone();
        let mut live = self.live.lock();
        // Drop dead entries now and then so the list tracks the live set.
        if live.len() >= 64 && live.len().is_power_of_two() {
            live.retain(|w| w.strong_count() > 0);
        }
        live.push(Arc::downgrade(&resource));
    }

    /// Handles still alive.
    pub fn live_count(&self) -> usize {
        self.live.lock().iter().filter(|w| w.strong_count() > 0).count()
    }

    /// Releases every live handle's GPU part and empties the registry.
    /// Returns how many were released.
    pub fn sweep(&self, ctx: &mut C) -> usize {
        let entries = std::mem::take(&mut *self.live.lock());
        let mut released = 0;
        for resource in entries.iter().filter_map(Weak::upgrade) {
            resource.release(ctx);
            released += 1;
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockCtx {
        released: Vec<u32>,
    }

    struct Handle(u32);

    impl Releasable<MockCtx> for Handle {
        fn release(&self, ctx: &mut MockCtx) {
            ctx.released.push(self.0);
        }
    }

    #[test]
    fn sweep_releases_only_live_handles() {
        let registry = ResourceRegistry::<MockCtx>::new();
        let a = Arc::new(Handle(1));
        let b = Arc::new(Handle(2));
        let c = Arc::new(Handle(3));
        registry.register(&a);
        registry.register(&b);
        registry.register(&c);
        drop(b);
        assert_eq!(registry.live_count(), 2);

        let mut ctx = MockCtx::default();
        assert_eq!(registry.sweep(&mut ctx), 2);
        assert_eq!(ctx.released, vec![1, 3]);

        // Emptied: a second sweep finds nothing.
        assert_eq!(registry.sweep(&mut ctx), 0);
        drop((a, c));
    }

    #[test]
    fn registry_does_not_keep_handles_alive() {
        let registry = ResourceRegistry::<MockCtx>::new();
        let h = Arc::new(Handle(7));
        registry.register(&h);
        let weak = Arc::downgrade(&h);
        drop(h);
        assert!(weak.upgrade().is_none());
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn dead_entries_are_pruned() {
        let registry = ResourceRegistry::<MockCtx>::new();
        for i in 0..200 {
            registry.register(&Arc::new(Handle(i)));
        }
        assert!(registry.live.lock().len() < 200);
        assert_eq!(registry.live_count(), 0);
    }
}
