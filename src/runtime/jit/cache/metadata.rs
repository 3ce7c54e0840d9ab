use std::time::{Duration, Instant};

/// Bookkeeping for a compile entry
#[derive(Debug, Clone)]
pub struct CacheMetadata {
    pub created_at: Instant,
    /// Last time the trigger engine (or an invalidation) started a compile.
    pub triggered_at: Option<Instant>,
    pub compiled_at: Option<Instant>,
    pub compile_count: u32,
    pub compilation_time: Duration,
}

impl CacheMetadata {
    pub fn new() -> Self {
        Self {
            created_at: Instant::now(),
            triggered_at: None,
            compiled_at: None,
            compile_count: 0,
            compilation_time: Duration::ZERO,
        }
    }

    pub fn record_trigger(&mut self) {
        self.triggered_at = Some(Instant::now());
    }

    pub fn record_compile(&mut self, compilation_time: Duration) {
        self.compiled_at = Some(Instant::now());
        self.compile_count += 1;
        self.compilation_time += compilation_time;
    }
}

impl Default for CacheMetadata {
    fn default() -> Self {
        Self::new()
    }
}
