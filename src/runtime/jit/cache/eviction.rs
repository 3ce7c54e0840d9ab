use ahash::AHashSet;

use crate::runtime::jit::method::MethodId;

/// Eviction policy for the compiled-code cache
pub trait EvictionPolicy: Send {
    /// Decide which of the resident `candidates` to evict
    fn evict(&mut self, candidates: &AHashSet<MethodId>) -> Option<MethodId>;

    /// Called when a compile is triggered for a method
    fn on_trigger(&mut self, method: MethodId);

    /// Called when a method leaves the cache
    fn on_remove(&mut self, method: MethodId);

    fn clear(&mut self);
}

/// Least-recently-triggered policy.
///
/// Recency is the last time a compile was triggered for the method, not the
/// last call: calls into compiled code never reach the manager's counters.
pub struct LruEvictionPolicy {
    trigger_order: Vec<MethodId>,
}

impl LruEvictionPolicy {
    pub fn new() -> Self {
        Self {
            trigger_order: Vec::new(),
        }
    }
}

impl EvictionPolicy for LruEvictionPolicy {
    fn evict(&mut self, candidates: &AHashSet<MethodId>) -> Option<MethodId> {
        self.trigger_order
            .iter()
            .find(|method| candidates.contains(*method))
            .copied()
    }

    fn on_trigger(&mut self, method: MethodId) {
        // Move to end (most recently triggered)
        self.trigger_order.retain(|m| *m != method);
        self.trigger_order.push(method);
    }

    fn on_remove(&mut self, method: MethodId) {
        self.trigger_order.retain(|m| *m != method);
    }

    fn clear(&mut self) {
        self.trigger_order.clear();
    }
}

impl Default for LruEvictionPolicy {
    fn default() -> Self {
        Self::new()
    }
}
