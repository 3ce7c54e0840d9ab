//! Background compile worker.
//!
//! A single thread consumes compile requests from a channel. The [`WorkGate`]
//! lets the lifecycle controller hold new work while paused, drain running
//! work, and stop the worker for good.

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

use super::backend::CompileRequest;

#[derive(Debug, Default)]
struct GateState {
    paused: bool,
    closed: bool,
    queued: usize,
    running: usize,
}

/// Admission control for compile jobs.
#[derive(Debug, Default)]
pub struct WorkGate {
    state: Mutex<GateState>,
    condvar: Condvar,
}

impl WorkGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_queued(&self) {
        self.state.lock().queued += 1;
    }

    /// Takes back a [`record_queued`](Self::record_queued) whose job never
    /// reached the worker.
    pub fn unqueue(&self) {
        let mut state = self.state.lock();
        state.queued = state.queued.saturating_sub(1);
        self.condvar.notify_all();
    }

    /// Waits until compiling is allowed and marks one job as running.
    ///
    /// `from_queue` jobs were counted by [`record_queued`](Self::record_queued).
    /// Returns `None` once the gate is closed.
    pub fn enter(&self, from_queue: bool) -> Option<RunningGuard<'_>> {
        let mut state = self.state.lock();
        while state.paused && !state.closed {
            self.condvar.wait(&mut state);
        }
        if from_queue {
            state.queued = state.queued.saturating_sub(1);
        }
        if state.closed {
            self.condvar.notify_all();
            return None;
        }
        state.running += 1;
        Some(RunningGuard { gate: self })
    }

    pub fn set_paused(&self, paused: bool) {
        self.state.lock().paused = paused;
        self.condvar.notify_all();
    }

    pub fn close(&self) {
        self.state.lock().closed = true;
        self.condvar.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Blocks until no compile is running.
    pub fn wait_running(&self) {
        let mut state = self.state.lock();
        while state.running > 0 {
            self.condvar.wait(&mut state);
        }
    }

    /// Blocks until nothing is running and, unless paused or closed, nothing
    /// is queued either.
    pub fn wait_idle(&self) {
        let mut state = self.state.lock();
        while state.running > 0 || (state.queued > 0 && !state.paused && !state.closed) {
            self.condvar.wait(&mut state);
        }
    }

    /// Forgets jobs owned by threads that do not exist in a forked child.
    pub fn reset_after_fork(&self) {
        let mut state = self.state.lock();
        state.queued = 0;
        state.running = 0;
        self.condvar.notify_all();
    }

    pub fn running(&self) -> usize {
        self.state.lock().running
    }

    pub fn queued(&self) -> usize {
        self.state.lock().queued
    }
}

pub struct RunningGuard<'a> {
    gate: &'a WorkGate,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.gate.state.lock();
        state.running = state.running.saturating_sub(1);
        self.gate.condvar.notify_all();
    }
}

/// Receiver side of the worker: runs one request to completion.
pub trait CompileSink: Send + Sync + 'static {
    /// Returns `false` when the worker should stop.
    fn run_queued(&self, request: CompileRequest) -> bool;
}

pub struct CompileWorker {
    sender: Sender<CompileRequest>,
    handle: JoinHandle<()>,
}

impl CompileWorker {
    pub fn spawn<S: CompileSink>(sink: Arc<S>) -> io::Result<Self> {
        let (sender, receiver) = unbounded();
        let handle = thread::Builder::new()
            .name("otter-jit-worker".to_string())
            .spawn(move || worker_loop(sink, receiver))?;
        Ok(Self { sender, handle })
    }

    /// Queues `request`, handing it back if the worker is gone.
    pub fn submit(&self, request: CompileRequest) -> Result<(), CompileRequest> {
        self.sender.send(request).map_err(|err| err.into_inner())
    }

    /// Stops accepting work and waits for the thread to exit.
    pub fn shutdown(self) {
        let Self { sender, handle } = self;
        drop(sender);
        if handle.join().is_err() {
            debug!("compile worker panicked during shutdown");
        }
    }

    /// Drops the handle without joining. Used where the thread may not exist
    /// (forked child) or may be stuck inside the generator.
    pub fn detach(self) {
        let Self { sender, handle } = self;
        drop(sender);
        drop(handle);
    }
}

fn worker_loop<S: CompileSink>(sink: Arc<S>, receiver: Receiver<CompileRequest>) {
    while let Ok(request) = receiver.recv() {
        if !sink.run_queued(request) {
            break;
        }
    }
    debug!("compile worker exiting");
}
