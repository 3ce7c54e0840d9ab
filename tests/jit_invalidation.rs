mod common;

use anyhow::Result;
use common::{async_config, engine_with, wait_config};
use otterjit::runtime::jit::{
    BasicOperator, ConstantId, Dependency, MethodEntryId, StateKind,
};
use otterjit::{InvalidationEvent, InvalidationReason, MethodId, Optimization};

#[test]
fn constant_redefinition_serves_old_code_until_recompiled() -> Result<()> {
    let (engine, generator) = engine_with(async_config(1))?;
    let method = MethodId::new(1);
    let constant = ConstantId::new(42);
    generator.depends_on(method, Dependency::Constant(constant));

    engine.on_call(method);
    engine.wait_until_idle();
    let old_code = engine.lookup(method).expect("compiled");
    let old_generation = engine.entry(method).expect("entry").generation;

    generator.block();
    engine.on_constant_state_changed(constant);
    generator.wait_started(2);

    let entry = engine.entry(method).expect("entry");
    assert_eq!(entry.state, StateKind::Compiling);
    assert!(entry.generation > old_generation);
    assert!(!entry.flags.is_enabled(Optimization::ConstCache));
    assert_eq!(engine.lookup(method), Some(old_code.clone()));
    assert_eq!(engine.on_call(method), Some(old_code.clone()));

    generator.unblock();
    engine.wait_until_idle();

    let new_code = engine.lookup(method).expect("recompiled");
    assert_ne!(new_code, old_code);
    assert!(generator.released().contains(&old_code));
    let request = generator.last_request().expect("request");
    assert!(!request.flags.is_enabled(Optimization::ConstCache));
    assert!(request.flags.is_enabled(Optimization::SendCache));
    Ok(())
}

#[test]
fn basic_operator_redefinition_only_hits_dependents() -> Result<()> {
    let (engine, generator) = engine_with(wait_config(1))?;
    let (plus_user, bystander) = (MethodId::new(1), MethodId::new(2));
    let plus = BasicOperator::new(3);
    generator.depends_on(plus_user, Dependency::BasicOperator(plus));

    let user_code = engine.on_call(plus_user).expect("compiled");
    let bystander_code = engine.on_call(bystander).expect("compiled");

    engine.on_basic_operator_redefined(1 << 2, plus);

    let recompiled = engine.lookup(plus_user).expect("recompiled inline");
    assert_ne!(recompiled, user_code);
    assert!(
        !engine
            .entry(plus_user)
            .expect("entry")
            .flags
            .is_enabled(Optimization::SendCache)
    );
    assert_eq!(engine.lookup(bystander), Some(bystander_code));
    assert_eq!(generator.calls(), 3);
    Ok(())
}

#[test]
fn method_entry_invalidation_keeps_flags() -> Result<()> {
    let (engine, generator) = engine_with(wait_config(1))?;
    let method = MethodId::new(5);
    let callee = MethodEntryId::new(77);
    generator.depends_on(method, Dependency::MethodEntry(callee));

    let before = engine.on_call(method).expect("compiled");
    engine.on_method_entry_invalidated(callee);

    let entry = engine.entry(method).expect("entry");
    assert_eq!(entry.flags, Default::default());
    assert_eq!(entry.compile_count, 2);
    assert_ne!(engine.lookup(method), Some(before));

    // Unknown entries touch nothing.
    engine.on_method_entry_invalidated(MethodEntryId::new(78));
    assert_eq!(generator.calls(), 2);
    Ok(())
}

#[test]
fn per_method_events_disable_matching_optimization() -> Result<()> {
    let (engine, _generator) = engine_with(wait_config(1))?;
    let method = MethodId::new(9);
    engine.on_call(method).expect("compiled");

    engine.on_constant_cache_update(method, 4);
    engine.on_ivar_shape_changed(method, false);
    engine.on_ivar_shape_changed(method, true);
    engine.on_call_site_changed(method);
    engine.notify(InvalidationEvent::InliningInvalidated { method });

    let flags = engine.entry(method).expect("entry").flags;
    assert_eq!(flags.disabled().count(), Optimization::ALL.len());
    assert!(engine.lookup(method).is_some());
    Ok(())
}

#[test]
fn tracing_change_recompiles_everything() -> Result<()> {
    let (engine, generator) = engine_with(wait_config(1))?;
    let methods = [MethodId::new(1), MethodId::new(2), MethodId::new(3)];
    for method in methods {
        engine.on_call(method).expect("compiled");
    }

    engine.on_tracing_changed(0b101);
    assert_eq!(engine.trace_events(), 0b101);
    assert_eq!(generator.calls(), 6);
    for request in &generator.requests()[3..] {
        assert_eq!(request.trace_events, 0b101);
    }

    engine.before_parallel_spawn();
    assert_eq!(generator.calls(), 9);
    assert_eq!(engine.cache_stats().compiled, 3);
    Ok(())
}

#[test]
fn failed_entry_retries_only_after_flag_change() -> Result<()> {
    let (engine, generator) = engine_with(wait_config(1))?;
    let method = MethodId::new(4);
    generator.push_result(Err(otterjit::CompileError::GeneratorFailure(
        "unsupported calling convention".into(),
    )));
    assert!(engine.on_call(method).is_none());

    // An invalidation that changes no flag leaves the failure in place.
    assert!(engine.invalidate(method, InvalidationReason::Explicit));
    assert_eq!(engine.entry(method).map(|entry| entry.state), Some(StateKind::Failed));

    // Disabling an optimization that was on gives it another chance.
    assert!(engine.recompile(method, Optimization::Inlining));
    let entry = engine.entry(method).expect("entry");
    assert_eq!(entry.state, StateKind::NotCompiled);
    assert_eq!(entry.call_count, 0);

    assert!(engine.on_call(method).is_some());
    let request = generator.last_request().expect("request");
    assert!(!request.flags.is_enabled(Optimization::Inlining));

    // Already disabled, but the compiled code is still rebuilt.
    let code = engine.lookup(method);
    assert!(engine.recompile(method, Optimization::Inlining));
    assert_ne!(engine.lookup(method), code);
    Ok(())
}

#[test]
fn restriction_recorded_before_first_compile() -> Result<()> {
    let (engine, generator) = engine_with(wait_config(2))?;
    let method = MethodId::new(6);

    assert!(engine.recompile(method, Optimization::SendCache));
    assert_eq!(generator.calls(), 0);

    engine.on_call(method);
    engine.on_call(method).expect("compiled");
    let request = generator.last_request().expect("request");
    assert!(!request.flags.is_enabled(Optimization::SendCache));
    Ok(())
}

#[test]
fn explicit_invalidation_of_unknown_method_is_a_no_op() -> Result<()> {
    let (engine, generator) = engine_with(wait_config(1))?;
    assert!(!engine.invalidate(MethodId::new(99), InvalidationReason::Explicit));
    assert!(engine.entry(MethodId::new(99)).is_none());
    assert_eq!(generator.calls(), 0);
    Ok(())
}

#[test]
fn invalidation_while_paused_drops_code() -> Result<()> {
    let (engine, generator) = engine_with(async_config(1))?;
    let method = MethodId::new(2);
    engine.on_call(method);
    engine.wait_until_idle();
    let code = engine.lookup(method).expect("compiled");

    assert!(engine.pause(true));
    engine.recompile(method, Optimization::IvarCache);

    assert!(engine.lookup(method).is_none());
    assert_eq!(
        engine.entry(method).map(|entry| entry.state),
        Some(StateKind::NotCompiled)
    );
    assert!(generator.released().contains(&code));
    assert_eq!(generator.calls(), 1);

    assert!(engine.resume());
    engine.on_call(method);
    engine.wait_until_idle();
    assert!(engine.lookup(method).is_some());
    let request = generator.last_request().expect("request");
    assert!(!request.flags.is_enabled(Optimization::IvarCache));
    Ok(())
}

#[test]
fn events_after_cancellation_are_ignored() -> Result<()> {
    let (engine, generator) = engine_with(wait_config(1))?;
    let method = MethodId::new(1);
    engine.on_call(method).expect("compiled");

    engine.cancel_all("test");
    engine.on_tracing_changed(1);
    engine.before_parallel_spawn();

    assert_eq!(generator.calls(), 1);
    assert_eq!(engine.trace_events(), 0);
    assert_eq!(engine.entry(method).map(|entry| entry.state), Some(StateKind::Failed));
    Ok(())
}

#[test]
fn direct_invalidation_after_cancellation_changes_nothing() -> Result<()> {
    let (engine, generator) = engine_with(wait_config(1))?;
    let (method, fresh) = (MethodId::new(1), MethodId::new(2));
    engine.on_call(method).expect("compiled");

    engine.cancel_all("fatal");
    assert!(!engine.recompile(method, Optimization::ConstCache));
    assert!(!engine.recompile(fresh, Optimization::SendCache));
    assert!(!engine.invalidate(method, InvalidationReason::Explicit));

    assert_eq!(engine.entry(method).map(|entry| entry.state), Some(StateKind::Failed));
    assert!(engine.entry(fresh).is_none());
    assert_eq!(generator.calls(), 1);
    Ok(())
}

#[test]
fn disabled_engine_does_not_record_entries_for_events() -> Result<()> {
    let (engine, _generator) = engine_with(otterjit::JitConfig {
        enabled: false,
        ..wait_config(1)
    })?;
    for raw in 0..100 {
        let method = MethodId::new(raw);
        engine.on_ivar_shape_changed(method, false);
        engine.on_constant_cache_update(method, 2);
        engine.on_call_site_changed(method);
        engine.recompile(method, Optimization::Inlining);
    }
    assert_eq!(engine.cache_stats().total_entries, 0);
    Ok(())
}

#[test]
fn finished_engine_does_not_grow_registry() -> Result<()> {
    let (engine, _generator) = engine_with(wait_config(1))?;
    engine.on_call(MethodId::new(1)).expect("compiled");
    engine.finish(true);

    for raw in 0..50 {
        let method = MethodId::new(raw);
        engine.on_ivar_shape_changed(method, true);
        assert!(engine.on_call(method).is_none());
    }
    assert_eq!(engine.cache_stats().total_entries, 0);
    Ok(())
}
