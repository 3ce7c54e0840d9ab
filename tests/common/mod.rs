#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use ahash::AHashMap;
use otterjit::runtime::jit::Dependency;
use otterjit::{
    CodeGenerator, CompileError, CompileRequest, CompiledCode, JitConfig, JitEngine, MethodId,
    NativeCode, NativeFunction,
};
use parking_lot::{Condvar, Mutex};

/// Scriptable generator that records what the engine asked of it.
#[derive(Default)]
pub struct MockGenerator {
    name: String,
    next_address: AtomicUsize,
    requests: Mutex<Vec<CompileRequest>>,
    released: Mutex<Vec<NativeFunction>>,
    script: Mutex<VecDeque<Result<(), CompileError>>>,
    dependencies: Mutex<AHashMap<MethodId, Vec<Dependency>>>,
    hold: Mutex<bool>,
    released_hold: Condvar,
    started: Mutex<usize>,
    started_changed: Condvar,
}

impl MockGenerator {
    pub fn new() -> Arc<Self> {
        Self::named("mock")
    }

    pub fn named(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            next_address: AtomicUsize::new(0x1000),
            ..Self::default()
        })
    }

    /// Next compile results, in order. Unscripted compiles succeed.
    pub fn push_result(&self, result: Result<(), CompileError>) {
        self.script.lock().push_back(result);
    }

    pub fn depends_on(&self, method: MethodId, dependency: Dependency) {
        self.dependencies
            .lock()
            .entry(method)
            .or_default()
            .push(dependency);
    }

    /// Makes compiles block inside the generator until [`unblock`](Self::unblock).
    pub fn block(&self) {
        *self.hold.lock() = true;
    }

    pub fn unblock(&self) {
        *self.hold.lock() = false;
        self.released_hold.notify_all();
    }

    /// Waits until `count` compiles have entered the generator.
    pub fn wait_started(&self, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut started = self.started.lock();
        while *started < count {
            assert!(
                !self.started_changed.wait_until(&mut started, deadline).timed_out(),
                "generator never reached {count} compiles"
            );
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<CompileRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<CompileRequest> {
        self.requests.lock().last().cloned()
    }

    pub fn released(&self) -> Vec<NativeFunction> {
        self.released.lock().clone()
    }
}

impl CodeGenerator for MockGenerator {
    fn compile(&self, request: &CompileRequest) -> Result<CompiledCode, CompileError> {
        self.requests.lock().push(request.clone());
        {
            let mut started = self.started.lock();
            *started += 1;
            self.started_changed.notify_all();
        }
        {
            let mut hold = self.hold.lock();
            while *hold {
                self.released_hold.wait(&mut hold);
            }
        }

        if let Some(Err(err)) = self.script.lock().pop_front() {
            return Err(err);
        }

        let address = self.next_address.fetch_add(0x100, Ordering::Relaxed);
        let function = NativeFunction::new(NativeCode::new(
            address,
            0x80,
            format!("{}_{}_{}", self.name, request.method.raw(), request.generation),
        ));
        let mut code = CompiledCode::new(function);
        if let Some(dependencies) = self.dependencies.lock().get(&request.method) {
            for dependency in dependencies {
                code = code.with_dependency(*dependency);
            }
        }
        Ok(code)
    }

    fn release(&self, function: &NativeFunction) {
        self.released.lock().push(function.clone());
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Synchronous config: compiles run inline on the calling thread.
pub fn wait_config(call_threshold: u32) -> JitConfig {
    JitConfig {
        call_threshold,
        wait: true,
        ..JitConfig::default()
    }
}

pub fn async_config(call_threshold: u32) -> JitConfig {
    JitConfig {
        call_threshold,
        ..JitConfig::default()
    }
}

pub fn engine_with(config: JitConfig) -> anyhow::Result<(JitEngine, Arc<MockGenerator>)> {
    let generator = MockGenerator::new();
    let engine = JitEngine::new(generator.clone());
    engine.init(config)?;
    Ok((engine, generator))
}

/// Calls `method` `times` times, returning the result of the last call.
pub fn call_n(engine: &JitEngine, method: MethodId, times: u32) -> Option<NativeFunction> {
    let mut last = None;
    for _ in 0..times {
        last = engine.on_call(method);
    }
    last
}
