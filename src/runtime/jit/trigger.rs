use super::cache::{CompileEntry, EntryState};
use super::method::NativeFunction;

/// What the interpreter should do for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    /// Run this code, or interpret when `None`.
    Serve(Option<NativeFunction>),
    /// The method just crossed the threshold and should be compiled.
    Compile,
}

/// Counts one call of `entry`'s method.
///
/// Only `NotCompiled` entries are counted; everything else is answered from
/// the entry's current state.
pub fn count_call(entry: &mut CompileEntry, threshold: u32) -> TriggerDecision {
    match &entry.state {
        EntryState::NotCompiled => {}
        state => return TriggerDecision::Serve(state.callable().cloned()),
    }
    entry.call_count = entry.call_count.saturating_add(1);
    if entry.call_count >= u64::from(threshold) {
        TriggerDecision::Compile
    } else {
        TriggerDecision::Serve(None)
    }
}
