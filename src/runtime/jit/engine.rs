use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::artifacts::ArtifactDir;
use super::backend::{CodeGenerator, CompileRequest, CompiledCode};
use super::cache::{
    CacheStats, CompileEntry, EntrySnapshot, EntryState, EvictionPolicy, FunctionCache,
    LruEvictionPolicy, StateKind,
};
use super::flags::{Optimization, OptimizationFlags};
use super::invalidation::{
    BasicOperator, ConstantId, DependencyIndex, InvalidationEvent, InvalidationReason,
    MethodEntryId, Targets,
};
use super::method::{MethodId, NativeFunction};
use super::metrics::{JitMetrics, JitStatsSnapshot};
use super::trigger::{self, TriggerDecision};
use super::worker::{CompileSink, CompileWorker, WorkGate};
use crate::config::JitConfig;
use crate::error::{CompileError, JitError};

/// Lifecycle flags. Compiles start only while enabled, not paused and not
/// shutting down.
#[derive(Debug, Default)]
pub struct ManagerState {
    enabled: AtomicBool,
    paused: AtomicBool,
    shutting_down: AtomicBool,
    cancelled: AtomicBool,
}

impl ManagerState {
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn accepts_compiles(&self) -> bool {
        self.is_enabled() && !self.is_paused() && !self.is_shutting_down()
    }
}

struct EngineCore {
    config: OnceCell<JitConfig>,
    state: ManagerState,
    cache: FunctionCache,
    // Lock order: cache table, entry, then any of the mutexes below.
    dependencies: Mutex<DependencyIndex>,
    eviction: Mutex<Box<dyn EvictionPolicy>>,
    artifacts: Mutex<Option<ArtifactDir>>,
    worker: Mutex<Option<CompileWorker>>,
    generator: Arc<dyn CodeGenerator>,
    custom_generator: Option<Arc<dyn CodeGenerator>>,
    gate: WorkGate,
    metrics: JitMetrics,
    next_generation: AtomicU64,
    trace_events: AtomicU32,
}

/// Method JIT manager.
///
/// Owned by the host VM. Decides when methods get compiled, serves compiled
/// entry points to the interpreter and throws code away when the runtime
/// assumptions behind it stop holding.
pub struct JitEngine {
    core: Arc<EngineCore>,
}

impl JitEngine {
    pub fn new(generator: Arc<dyn CodeGenerator>) -> Self {
        Self::build(generator, None, Box::new(LruEvictionPolicy::new()))
    }

    /// Engine that uses `custom` instead of `generator` when the
    /// configuration sets `custom`.
    pub fn with_custom_compiler(
        generator: Arc<dyn CodeGenerator>,
        custom: Arc<dyn CodeGenerator>,
    ) -> Self {
        Self::build(generator, Some(custom), Box::new(LruEvictionPolicy::new()))
    }

    pub fn with_eviction_policy(
        generator: Arc<dyn CodeGenerator>,
        policy: Box<dyn EvictionPolicy>,
    ) -> Self {
        Self::build(generator, None, policy)
    }

    fn build(
        generator: Arc<dyn CodeGenerator>,
        custom_generator: Option<Arc<dyn CodeGenerator>>,
        policy: Box<dyn EvictionPolicy>,
    ) -> Self {
        Self {
            core: Arc::new(EngineCore {
                config: OnceCell::new(),
                state: ManagerState::default(),
                cache: FunctionCache::new(),
                dependencies: Mutex::new(DependencyIndex::new()),
                eviction: Mutex::new(policy),
                artifacts: Mutex::new(None),
                worker: Mutex::new(None),
                generator,
                custom_generator,
                gate: WorkGate::new(),
                metrics: JitMetrics::new(),
                next_generation: AtomicU64::new(0),
                trace_events: AtomicU32::new(0),
            }),
        }
    }

    /// Applies `config` and starts the engine. Only the first call succeeds.
    pub fn init(&self, config: JitConfig) -> Result<(), JitError> {
        let core = &self.core;
        if core.state.is_shutting_down() {
            return Err(JitError::ShutDown);
        }
        config.validate()?;
        if config.custom && core.custom_generator.is_none() {
            return Err(JitError::MissingCustomCompiler);
        }
        let settings = config.clone();
        core.config
            .set(config)
            .map_err(|_| JitError::AlreadyInitialized)?;

        core.metrics.set_enabled(settings.stats);
        if !settings.enabled {
            if settings.verbose >= 1 {
                info!("method JIT disabled by configuration");
            }
            return Ok(());
        }

        let artifacts = ArtifactDir::create(settings.temp_dir.as_deref(), settings.save_temps)
            .map_err(JitError::Artifacts)?;
        *core.artifacts.lock() = Some(artifacts);

        if settings.pause {
            core.state.paused.store(true, Ordering::Release);
            core.gate.set_paused(true);
        }
        if !settings.wait {
            let worker =
                CompileWorker::spawn(Arc::clone(&self.core)).map_err(JitError::WorkerSpawn)?;
            *core.worker.lock() = Some(worker);
        }
        core.state.enabled.store(true, Ordering::Release);

        if settings.verbose >= 1 {
            info!(
                call_threshold = settings.call_threshold,
                max_cache_size = settings.max_cache_size,
                wait = settings.wait,
                paused = settings.pause,
                generator = core.generator().name(),
                "method JIT initialized"
            );
        }
        Ok(())
    }

    pub fn config(&self) -> Option<&JitConfig> {
        self.core.config.get()
    }

    pub fn state(&self) -> &ManagerState {
        &self.core.state
    }

    pub fn is_enabled(&self) -> bool {
        self.core.state.is_enabled()
    }

    pub fn is_paused(&self) -> bool {
        self.core.state.is_paused()
    }

    /// Interpreter call hook: counts the call and returns code to run, or
    /// `None` to interpret this call.
    pub fn on_call(&self, method: MethodId) -> Option<NativeFunction> {
        let core = &self.core;
        if !core.state.is_enabled() {
            return None;
        }
        if core.state.is_shutting_down() {
            return core.cache.lookup(method);
        }
        let threshold = core.config.get()?.call_threshold;
        let shared = core
            .cache
            .get_or_insert_with(method, || core.next_generation());
        let request = {
            let mut entry = shared.lock();
            match trigger::count_call(&mut entry, threshold) {
                TriggerDecision::Serve(function) => return function,
                TriggerDecision::Compile if !core.state.accepts_compiles() => return None,
                TriggerDecision::Compile => core.begin_compile(&mut entry),
            }
        };
        core.dispatch(request);
        core.cache.lookup(method)
    }

    /// Code currently callable for `method`. Never blocks.
    pub fn lookup(&self, method: MethodId) -> Option<NativeFunction> {
        self.core.cache.lookup(method)
    }

    /// Starts a compile of `method` with at least the restrictions in `flags`.
    ///
    /// Returns whether a compile was started; a method that is already
    /// compiling, has failed, or is compiled with the same flags is left alone.
    pub fn request_compile(&self, method: MethodId, flags: OptimizationFlags) -> bool {
        self.core.request_compile(method, flags)
    }

    pub fn invalidate(&self, method: MethodId, reason: InvalidationReason) -> bool {
        self.core.invalidate(method, reason)
    }

    /// Recompiles `method` without `optimization`.
    pub fn recompile(&self, method: MethodId, optimization: Optimization) -> bool {
        self.core
            .invalidate(method, InvalidationReason::OptimizationDisabled(optimization))
    }

    pub fn remove(&self, method: MethodId) -> bool {
        self.core.remove(method)
    }

    pub fn on_method_unit_destroyed(&self, method: MethodId) {
        self.core.remove(method);
    }

    pub fn notify(&self, event: InvalidationEvent) {
        self.core.notify(event);
    }

    pub fn on_basic_operator_redefined(&self, redefined_flag: u32, operator: BasicOperator) {
        self.notify(InvalidationEvent::BasicOperatorRedefined {
            operator,
            redefined_flag,
        });
    }

    pub fn on_method_entry_invalidated(&self, entry: MethodEntryId) {
        self.notify(InvalidationEvent::MethodEntryInvalidated(entry));
    }

    pub fn on_ivar_shape_changed(&self, method: MethodId, extended: bool) {
        self.notify(InvalidationEvent::InstanceVariableShapeChanged { method, extended });
    }

    pub fn on_constant_state_changed(&self, constant: ConstantId) {
        self.notify(InvalidationEvent::ConstantRedefined(constant));
    }

    pub fn on_constant_cache_update(&self, method: MethodId, insn_index: u32) {
        self.notify(InvalidationEvent::ConstantCacheUpdated { method, insn_index });
    }

    pub fn on_call_site_changed(&self, method: MethodId) {
        self.notify(InvalidationEvent::CallSiteSpecializationChanged { method });
    }

    pub fn on_tracing_changed(&self, events: u32) {
        self.notify(InvalidationEvent::TracingChanged { events });
    }

    pub fn before_parallel_spawn(&self) {
        self.notify(InvalidationEvent::BeforeParallelSpawn);
    }

    /// Gives up on compiling for the rest of the engine's life. Every entry
    /// ends `Failed` and the interpreter runs everything itself.
    pub fn cancel_all(&self, reason: &str) {
        self.core.cancel_all(reason);
    }

    /// Stops new compiles from starting. With `wait`, also waits for the
    /// running compile to finish. Returns `false` if the engine is not
    /// running or already paused.
    pub fn pause(&self, wait: bool) -> bool {
        let core = &self.core;
        if !core.state.is_enabled() || core.state.is_shutting_down() {
            return false;
        }
        if core.state.paused.swap(true, Ordering::AcqRel) {
            return false;
        }
        core.gate.set_paused(true);
        if wait {
            core.gate.wait_running();
        }
        if core.verbose(1) {
            info!(wait, "method JIT paused");
        }
        true
    }

    /// Returns `false` if the engine is not running or not paused.
    pub fn resume(&self) -> bool {
        let core = &self.core;
        if !core.state.is_enabled() || core.state.is_shutting_down() {
            return false;
        }
        if !core.state.paused.swap(false, Ordering::AcqRel) {
            return false;
        }
        core.gate.set_paused(false);
        if core.verbose(1) {
            info!("method JIT resumed");
        }
        true
    }

    /// Shuts the engine down for good. Idempotent and safe before `init`.
    ///
    /// With `release_resources`, all native code is released and the artifact
    /// directory is removed unless `save_temps` is set.
    pub fn finish(&self, release_resources: bool) {
        self.core.finish(release_resources);
    }

    /// Child-side fork hook.
    ///
    /// The compile worker thread does not exist in the child, so its handle is
    /// dropped without joining and a fresh worker is started. Compiles the
    /// parent had in flight are started again; compiled code stays usable.
    pub fn after_fork(&self) {
        let core = &self.core;
        let inherited = core.worker.lock().take();
        if let Some(worker) = inherited {
            worker.detach();
        }
        core.gate.reset_after_fork();

        let Some(config) = core.config.get() else {
            return;
        };
        if !core.state.is_enabled() || core.state.is_shutting_down() {
            return;
        }
        if !config.wait {
            match CompileWorker::spawn(Arc::clone(&self.core)) {
                Ok(worker) => *core.worker.lock() = Some(worker),
                Err(err) => {
                    warn!(error = %err, "failed to restart compile worker after fork; compiling inline");
                }
            }
        }

        let accepting = core.state.accepts_compiles();
        let mut requests = Vec::new();
        for (_, shared) in core.cache.entries() {
            let released = {
                let mut entry = shared.lock();
                if !matches!(entry.state, EntryState::Compiling { .. }) {
                    continue;
                }
                if accepting {
                    requests.push(core.begin_compile(&mut entry));
                    None
                } else {
                    entry.generation = core.next_generation();
                    core.park(&mut entry)
                }
            };
            core.release(released);
        }
        if core.verbose(1) {
            info!(requeued = requests.len(), "method JIT reset after fork");
        }
        for request in requests {
            core.dispatch(request);
        }
    }

    /// Blocks until queued and running compiles are done (queued ones are
    /// not waited for while paused).
    pub fn wait_until_idle(&self) {
        self.core.gate.wait_idle();
    }

    pub fn entry(&self, method: MethodId) -> Option<EntrySnapshot> {
        self.core
            .cache
            .get(method)
            .map(|shared| shared.lock().snapshot())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.core.cache.stats()
    }

    pub fn stats(&self) -> JitStatsSnapshot {
        self.core.metrics.snapshot()
    }

    /// Counts one execution of VM instruction `insn` when stats are on.
    pub fn record_vm_insn(&self, insn: u32) {
        self.core.metrics.record_insn(insn);
    }

    pub fn artifact_dir(&self) -> Option<PathBuf> {
        self.core
            .artifacts
            .lock()
            .as_ref()
            .map(|artifacts| artifacts.path().to_path_buf())
    }

    pub fn trace_events(&self) -> u32 {
        self.core.trace_events.load(Ordering::Relaxed)
    }
}

impl Drop for JitEngine {
    fn drop(&mut self) {
        self.core.finish(false);
    }
}

impl CompileSink for EngineCore {
    fn run_queued(&self, request: CompileRequest) -> bool {
        self.run(request, true)
    }
}

impl EngineCore {
    fn config(&self) -> Option<&JitConfig> {
        self.config.get()
    }

    fn verbose(&self, level: u8) -> bool {
        self.config().is_some_and(|config| config.verbose >= level)
    }

    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn generator(&self) -> &Arc<dyn CodeGenerator> {
        match (&self.custom_generator, self.config()) {
            (Some(custom), Some(config)) if config.custom => custom,
            _ => &self.generator,
        }
    }

    fn release(&self, function: Option<NativeFunction>) {
        if let Some(function) = function {
            self.generator().release(&function);
        }
    }

    /// Moves `entry` to `Compiling` under a fresh generation, keeping any
    /// callable code as the fallback.
    fn begin_compile(&self, entry: &mut CompileEntry) -> CompileRequest {
        let fallback = match std::mem::replace(&mut entry.state, EntryState::NotCompiled) {
            EntryState::Compiled(function) => Some(function),
            EntryState::Compiling { fallback } => fallback,
            EntryState::NotCompiled | EntryState::Failed => None,
        };
        entry.state = EntryState::Compiling { fallback };
        entry.generation = self.next_generation();
        entry.call_count = 0;
        entry.metadata.record_trigger();
        self.eviction.lock().on_trigger(entry.method());
        self.metrics
            .record_compile_started(entry.metadata.compile_count > 0);

        if self.verbose(2) {
            debug!(
                method = %entry.method(),
                generation = entry.generation,
                "compile started"
            );
        }

        let config = self.config();
        CompileRequest {
            method: entry.method(),
            flags: entry.flags,
            generation: entry.generation,
            trace_events: self.trace_events.load(Ordering::Relaxed),
            debug: config.is_some_and(|config| config.debug),
            dump_disasm: config.is_some_and(|config| config.dump_disasm),
            debug_flags: config.and_then(|config| config.debug_flags.clone()),
            artifact_dir: self
                .artifacts
                .lock()
                .as_ref()
                .map(|artifacts| artifacts.path().to_path_buf()),
        }
    }

    /// Drops an entry back to `NotCompiled`, returning its code for release.
    fn park(&self, entry: &mut CompileEntry) -> Option<NativeFunction> {
        let released = entry.state.take_code();
        entry.state = EntryState::NotCompiled;
        entry.call_count = 0;
        self.dependencies.lock().forget(entry.method());
        released
    }

    fn dispatch(&self, mut request: CompileRequest) {
        if !self.config().is_some_and(|config| config.wait) {
            let worker = self.worker.lock();
            if let Some(worker) = worker.as_ref() {
                self.gate.record_queued();
                match worker.submit(request) {
                    Ok(()) => return,
                    Err(returned) => {
                        self.gate.unqueue();
                        request = returned;
                    }
                }
            }
        }
        self.run(request, false);
    }

    /// Runs the generator for `request` and applies the result. Returns
    /// `false` once the engine stopped accepting work.
    fn run(&self, request: CompileRequest, from_queue: bool) -> bool {
        let Some(_running) = self.gate.enter(from_queue) else {
            return false;
        };
        let started = Instant::now();
        let result = self.generator().compile(&request);
        self.complete(&request, result, started.elapsed());
        true
    }

    fn complete(
        &self,
        request: &CompileRequest,
        result: Result<CompiledCode, CompileError>,
        elapsed: Duration,
    ) {
        let method = request.method;
        let Some(shared) = self.cache.get(method) else {
            self.discard(request, result, None);
            return;
        };
        let mut entry = shared.lock();
        if entry.generation != request.generation {
            let current = entry.generation;
            drop(entry);
            self.discard(request, result, Some(current));
            return;
        }
        if !matches!(entry.state, EntryState::Compiling { .. }) {
            let state = entry.state.kind();
            drop(entry);
            if let Ok(code) = &result {
                self.generator().release(&code.function);
            }
            self.cancel_all(&format!(
                "{method} is {state:?} while generation {} was compiling",
                request.generation
            ));
            return;
        }

        match result {
            Ok(code) => {
                let previous = std::mem::replace(&mut entry.state, EntryState::Compiled(code.function));
                entry.metadata.record_compile(elapsed);
                self.dependencies.lock().record(method, code.dependencies);
                drop(entry);
                if let EntryState::Compiling { fallback } = previous {
                    self.release(fallback);
                }
                self.metrics.record_compile_succeeded(elapsed);
                if self.verbose(1) {
                    info!(
                        method = %method,
                        generation = request.generation,
                        elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
                        "method compiled"
                    );
                }
                self.enforce_cache_bound();
            }
            Err(CompileError::FatalInternalError(reason)) => {
                drop(entry);
                self.cancel_all(&reason);
            }
            Err(err) => {
                let released = self.park(&mut entry);
                if err.is_permanent() {
                    entry.state = EntryState::Failed;
                }
                drop(entry);
                self.release(released);
                self.metrics.record_compile_failed();
                if self.verbose(1) {
                    info!(method = %method, error = %err, "compile failed; staying interpreted");
                }
                if matches!(err, CompileError::ResourceExhausted(_)) {
                    self.evict_oldest();
                }
            }
        }
    }

    /// Throws away a result that lost the race against an invalidation.
    fn discard(
        &self,
        request: &CompileRequest,
        result: Result<CompiledCode, CompileError>,
        current: Option<u64>,
    ) {
        if let Ok(code) = &result {
            self.generator().release(&code.function);
        }
        self.metrics.record_stale_result();
        if self.verbose(2) {
            let err = CompileError::StaleGeneration {
                produced: request.generation,
                current: current.unwrap_or_default(),
            };
            debug!(method = %request.method, error = %err, "compile result discarded");
        }
    }

    fn request_compile(&self, method: MethodId, flags: OptimizationFlags) -> bool {
        if !self.state.accepts_compiles() {
            return false;
        }
        let shared = self
            .cache
            .get_or_insert_with(method, || self.next_generation());
        let request = {
            let mut entry = shared.lock();
            match entry.state.kind() {
                StateKind::Compiling | StateKind::Failed => return false,
                StateKind::Compiled => {
                    if !entry.flags.merge(flags) {
                        return false;
                    }
                }
                StateKind::NotCompiled => {
                    entry.flags.merge(flags);
                }
            }
            self.begin_compile(&mut entry)
        };
        self.dispatch(request);
        true
    }

    fn invalidate(&self, method: MethodId, reason: InvalidationReason) -> bool {
        if self.state.is_cancelled() {
            return false;
        }
        let live = self.state.is_enabled() && !self.state.is_shutting_down();
        let shared = if live && reason.disables().is_some() {
            // Remember the restriction even if the method has no entry yet.
            self.cache
                .get_or_insert_with(method, || self.next_generation())
        } else {
            match self.cache.get(method) {
                Some(shared) => shared,
                None => return false,
            }
        };

        let (request, released) = {
            let mut entry = shared.lock();
            entry.generation = self.next_generation();
            let flags_changed = reason
                .disables()
                .is_some_and(|optimization| entry.flags.disable(optimization));
            self.metrics.record_invalidation();
            if self.verbose(2) {
                debug!(
                    method = %method,
                    reason = ?reason,
                    state = ?entry.state.kind(),
                    generation = entry.generation,
                    "invalidating"
                );
            }

            match entry.state.kind() {
                StateKind::Compiled | StateKind::Compiling if self.state.accepts_compiles() => {
                    (Some(self.begin_compile(&mut entry)), None)
                }
                StateKind::Compiled | StateKind::Compiling => (None, self.park(&mut entry)),
                StateKind::Failed if flags_changed => {
                    entry.state = EntryState::NotCompiled;
                    entry.call_count = 0;
                    (None, None)
                }
                StateKind::NotCompiled | StateKind::Failed => (None, None),
            }
        };
        self.release(released);
        if let Some(request) = request {
            self.dispatch(request);
        }
        true
    }

    fn notify(&self, event: InvalidationEvent) {
        if self.config().is_none() || self.state.is_cancelled() {
            return;
        }
        if let InvalidationEvent::TracingChanged { events } = event {
            self.trace_events.store(events, Ordering::Relaxed);
        }
        let targets: Vec<MethodId> = match event.targets() {
            Targets::All => self
                .cache
                .entries()
                .into_iter()
                .map(|(method, _)| method)
                .collect(),
            Targets::Dependents(dependency) => self.dependencies.lock().dependents(&dependency),
            Targets::Method(method) => vec![method],
        };
        if self.verbose(1) {
            info!(event = ?event, affected = targets.len(), "invalidation event");
        }
        let reason = event.reason();
        for method in targets {
            self.invalidate(method, reason);
        }
    }

    fn remove(&self, method: MethodId) -> bool {
        let Some(shared) = self.cache.remove(method) else {
            return false;
        };
        let released = {
            let mut entry = shared.lock();
            entry.generation = self.next_generation();
            self.park(&mut entry)
        };
        self.eviction.lock().on_remove(method);
        self.release(released);
        if self.verbose(2) {
            debug!(method = %method, "compile entry removed");
        }
        true
    }

    fn enforce_cache_bound(&self) {
        let Some(max) = self
            .config()
            .filter(|config| config.cache_is_bounded())
            .map(|config| config.max_cache_size)
        else {
            return;
        };
        loop {
            let compiled = self.cache.compiled_ids();
            if compiled.len() <= max {
                break;
            }
            let victim = self.eviction.lock().evict(&compiled);
            let Some(victim) = victim else {
                break;
            };
            self.evict(victim);
        }
    }

    fn evict_oldest(&self) {
        let compiled = self.cache.compiled_ids();
        let victim = self.eviction.lock().evict(&compiled);
        if let Some(victim) = victim {
            self.evict(victim);
        }
    }

    /// Releases `method`'s code and sends it back to `NotCompiled`. Only
    /// `Compiled` entries are touched.
    fn evict(&self, method: MethodId) -> bool {
        let Some(shared) = self.cache.get(method) else {
            self.eviction.lock().on_remove(method);
            return false;
        };
        let released = {
            let mut entry = shared.lock();
            if !matches!(entry.state, EntryState::Compiled(_)) {
                return false;
            }
            let released = self.park(&mut entry);
            self.eviction.lock().on_remove(method);
            released
        };
        self.release(released);
        self.metrics.record_eviction();
        if self.verbose(1) {
            info!(method = %method, "evicted compiled code");
        }
        true
    }

    fn cancel_all(&self, reason: &str) {
        if self.state.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        self.state.enabled.store(false, Ordering::Release);
        warn!(reason, "method JIT cancelled; continuing interpreted");

        self.gate.close();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.detach();
        }

        for (_, shared) in self.cache.entries() {
            let released = {
                let mut entry = shared.lock();
                entry.generation = self.next_generation();
                let released = entry.state.take_code();
                entry.state = EntryState::Failed;
                released
            };
            self.release(released);
        }
        self.dependencies.lock().clear();
        self.eviction.lock().clear();
    }

    fn finish(&self, release_resources: bool) {
        if self.state.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.gate.close();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.shutdown();
        }

        if release_resources {
            for (_, shared) in self.cache.drain() {
                let released = {
                    let mut entry = shared.lock();
                    entry.generation = self.next_generation();
                    entry.state.take_code()
                };
                self.release(released);
            }
            self.dependencies.lock().clear();
            self.eviction.lock().clear();

            let artifacts = self.artifacts.lock().take();
            if let Some(artifacts) = artifacts {
                match artifacts.close() {
                    Ok(Some(kept)) => info!("jit artifacts kept" = %kept.display()),
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "failed to remove JIT artifacts"),
                }
            }
        }

        if self.verbose(1) {
            info!(release_resources, "method JIT finished");
        }
    }
}
