use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Compile counters collected when `stats` is enabled.
#[derive(Debug, Default)]
pub struct JitMetrics {
    enabled: AtomicBool,
    compiles_started: AtomicU64,
    compiles_succeeded: AtomicU64,
    compiles_failed: AtomicU64,
    stale_results: AtomicU64,
    invalidations: AtomicU64,
    recompilations: AtomicU64,
    evictions: AtomicU64,
    compile_time_us: AtomicU64,
    insn_usage: Mutex<AHashMap<u32, u64>>,
}

impl JitMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn bump(&self, counter: &AtomicU64) {
        if self.is_enabled() {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_compile_started(&self, recompile: bool) {
        self.bump(&self.compiles_started);
        if recompile {
            self.bump(&self.recompilations);
        }
    }

    pub fn record_compile_succeeded(&self, elapsed: Duration) {
        if self.is_enabled() {
            self.compiles_succeeded.fetch_add(1, Ordering::Relaxed);
            let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
            self.compile_time_us.fetch_add(micros, Ordering::Relaxed);
        }
    }

    pub fn record_compile_failed(&self) {
        self.bump(&self.compiles_failed);
    }

    pub fn record_stale_result(&self) {
        self.bump(&self.stale_results);
    }

    pub fn record_invalidation(&self) {
        self.bump(&self.invalidations);
    }

    pub fn record_eviction(&self) {
        self.bump(&self.evictions);
    }

    /// Counts one execution of VM instruction `insn` by the interpreter.
    pub fn record_insn(&self, insn: u32) {
        if self.is_enabled() {
            *self.insn_usage.lock().entry(insn).or_insert(0) += 1;
        }
    }

    pub fn snapshot(&self) -> JitStatsSnapshot {
        let mut insn_usage: Vec<(u32, u64)> = self
            .insn_usage
            .lock()
            .iter()
            .map(|(insn, count)| (*insn, *count))
            .collect();
        insn_usage.sort_unstable();

        JitStatsSnapshot {
            compiles_started: self.compiles_started.load(Ordering::Relaxed),
            compiles_succeeded: self.compiles_succeeded.load(Ordering::Relaxed),
            compiles_failed: self.compiles_failed.load(Ordering::Relaxed),
            stale_results: self.stale_results.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            recompilations: self.recompilations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            compile_time: Duration::from_micros(self.compile_time_us.load(Ordering::Relaxed)),
            insn_usage,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JitStatsSnapshot {
    pub compiles_started: u64,
    pub compiles_succeeded: u64,
    pub compiles_failed: u64,
    pub stale_results: u64,
    pub invalidations: u64,
    pub recompilations: u64,
    pub evictions: u64,
    pub compile_time: Duration,
    /// (instruction, executions), sorted by instruction.
    pub insn_usage: Vec<(u32, u64)>,
}
