//! Closure Tests
//!
//! Tests validate:
//! - Lazy promotion of an activation's locals on block creation
//! - Shared (not copied) captured state between a method and its blocks
//! - Nested blocks taking self from the method-level scope
//! - Blocks outliving their creating method, across compaction
//! - Proc-style argument binding and `yield`
//!
//! # Running Tests
//! ```bash
//! cargo test --test closure_tests
//! ```

use garnet_core::{
    Arity, CallContext, ExecutableMethod, ModuleId, Runtime, Value, Visibility, VmError, VmResult,
};

fn define<F>(runtime: &Runtime, module: ModuleId, name: &str, method: F, locals: usize)
where
    F: Fn(&mut CallContext<'_>) -> VmResult<Value> + Send + Sync + 'static,
{
    let sym = runtime.symbol(name);
    let method = ExecutableMethod::native(sym, Arity::fixed(0), method).with_locals(locals);
    runtime
        .install(module, sym, method, &runtime.top_scope(), Visibility::Public)
        .unwrap();
}

fn fixnum(value: Value) -> i64 {
    value.as_fixnum().unwrap_or(-1)
}

/// Block body: `x += 1` on the enclosing scope's first local
fn incrementer(ctx: &CallContext<'_>) -> ExecutableMethod {
    ExecutableMethod::native(ctx.symbol("block"), Arity::fixed(0), |ctx| {
        let x = fixnum(ctx.outer_local(1, 0)?) + 1;
        ctx.set_outer_local(1, 0, Value::Fixnum(x))?;
        Ok(Value::Fixnum(x))
    })
}

// ===== Promotion =====

#[test]
fn test_block_mutation_visible_to_method() {
    let runtime = Runtime::default();
    let object = runtime.specials().object;
    define(
        &runtime,
        object,
        "m",
        |ctx| {
            ctx.set_local(0, Value::Fixnum(1))?;
            assert!(!ctx.frame()?.is_promoted());
            let scopes_before = ctx.runtime().heap_stats().live_scopes;

            let code = incrementer(ctx);
            let block = ctx.create_block(code)?;
            assert!(ctx.frame()?.is_promoted());
            assert_eq!(ctx.runtime().heap_stats().live_scopes, scopes_before + 1);

            ctx.call_block(block, vec![])?;
            ctx.call_block(block, vec![])?;
            ctx.local(0)
        },
        1,
    );

    let mut task = runtime.new_task();
    let result = runtime.send(&mut task, Value::Nil, runtime.symbol("m"), vec![]).unwrap();
    assert_eq!(result, Value::Fixnum(3));
}

#[test]
fn test_method_write_visible_to_block() {
    let runtime = Runtime::default();
    let object = runtime.specials().object;
    define(
        &runtime,
        object,
        "m",
        |ctx| {
            let code = incrementer(ctx);
            let block = ctx.create_block(code)?;
            ctx.set_local(0, Value::Fixnum(41))?;
            ctx.call_block(block, vec![])
        },
        1,
    );

    let mut task = runtime.new_task();
    let result = runtime.send(&mut task, Value::Nil, runtime.symbol("m"), vec![]).unwrap();
    assert_eq!(result, Value::Fixnum(42));
}

#[test]
fn test_promote_is_idempotent() {
    let runtime = Runtime::default();
    let object = runtime.specials().object;
    define(
        &runtime,
        object,
        "m",
        |ctx| {
            let first = ctx.promote()?;
            let live = ctx.runtime().heap_stats().live_scopes;
            let second = ctx.promote()?;
            assert_eq!(first, second);
            assert_eq!(ctx.runtime().heap_stats().live_scopes, live);
            Ok(Value::Bool(true))
        },
        0,
    );

    let mut task = runtime.new_task();
    assert_eq!(
        runtime.send(&mut task, Value::Nil, runtime.symbol("m"), vec![]).unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn test_methods_without_blocks_stay_transient() {
    let runtime = Runtime::default();
    let object = runtime.specials().object;
    define(
        &runtime,
        object,
        "plain",
        |ctx| {
            ctx.set_local(0, Value::Fixnum(5))?;
            assert!(!ctx.frame()?.is_promoted());
            ctx.local(0)
        },
        1,
    );

    let mut task = runtime.new_task();
    runtime.send(&mut task, Value::Nil, runtime.symbol("plain"), vec![]).unwrap();
    assert_eq!(runtime.heap_stats().live_scopes, 0);
}

// ===== Nested Blocks =====

#[test]
fn test_nested_block_context() {
    let runtime = Runtime::default();
    let class = runtime.define_class("Host", None).unwrap();
    define(
        &runtime,
        class,
        "outer",
        |ctx| {
            ctx.set_local(0, Value::Fixnum(10))?;
            let block_name = ctx.symbol("block");
            let outer_block = ExecutableMethod::native(block_name, Arity::fixed(0), |ctx| {
                ctx.set_local(0, Value::Fixnum(20))?;
                let block_name = ctx.symbol("block");
                let inner_block = ExecutableMethod::native(block_name, Arity::fixed(0), |ctx| {
                    let values = vec![
                        ctx.self_value()?,
                        ctx.outer_local(1, 0)?,
                        ctx.outer_local(2, 0)?,
                    ];
                    ctx.new_tuple(values)
                });
                let inner = ctx.create_block(inner_block)?;
                ctx.call_block(inner, vec![])
            })
            .with_locals(1);
            let block = ctx.create_block(outer_block)?;
            ctx.call_block(block, vec![])
        },
        1,
    );

    let mut task = runtime.new_task();
    let host = runtime.new_object(class).unwrap();
    let tuple = runtime.send(&mut task, host, runtime.symbol("outer"), vec![]).unwrap();
    assert_eq!(
        runtime.tuple_values(tuple).unwrap(),
        vec![host, Value::Fixnum(20), Value::Fixnum(10)]
    );
}

#[test]
fn test_block_reaches_method_block() {
    let runtime = Runtime::default();
    let object = runtime.specials().object;
    // `relay` hands its own block to a nested block, which yields to it.
    define(
        &runtime,
        object,
        "relay",
        |ctx| {
            let code = ExecutableMethod::native(ctx.symbol("block"), Arity::fixed(0), |ctx| {
                ctx.yield_block(vec![Value::Fixnum(6)])
            });
            let block = ctx.create_block(code)?;
            ctx.call_block(block, vec![])
        },
        0,
    );
    define(
        &runtime,
        object,
        "caller",
        |ctx| {
            let code = ExecutableMethod::native(ctx.symbol("block"), Arity::fixed(1), |ctx| {
                Ok(Value::Fixnum(fixnum(ctx.local(0)?) * 7))
            })
            .with_locals(1);
            let block = ctx.create_block(code)?;
            let relay = ctx.symbol("relay");
            let receiver = ctx.self_value()?;
            ctx.send_with_block(receiver, relay, vec![], block)
        },
        0,
    );

    let mut task = runtime.new_task();
    let result = runtime.send(&mut task, Value::Nil, runtime.symbol("caller"), vec![]).unwrap();
    assert_eq!(result, Value::Fixnum(42));
}

#[test]
fn test_yield_without_block() {
    let runtime = Runtime::default();
    let object = runtime.specials().object;
    define(&runtime, object, "gen", |ctx| ctx.yield_block(vec![]), 0);

    let mut task = runtime.new_task();
    assert!(matches!(
        runtime.send(&mut task, Value::Nil, runtime.symbol("gen"), vec![]),
        Err(VmError::NoBlockGiven)
    ));
}

// ===== Argument Binding =====

#[test]
fn test_proc_style_binding() {
    let runtime = Runtime::default();
    let object = runtime.specials().object;
    define(
        &runtime,
        object,
        "make",
        |ctx| {
            let code = ExecutableMethod::native(ctx.symbol("block"), Arity::fixed(2), |ctx| {
                ctx.new_tuple(vec![ctx.local(0)?, ctx.local(1)?])
            });
            ctx.create_block(code)
        },
        0,
    );

    let mut task = runtime.new_task();
    let block = runtime.send(&mut task, Value::Nil, runtime.symbol("make"), vec![]).unwrap();
    runtime.add_global_root(block);

    let short = runtime.call_block(&mut task, block, vec![Value::Fixnum(1)]).unwrap();
    assert_eq!(runtime.tuple_values(short).unwrap(), vec![Value::Fixnum(1), Value::Nil]);

    let long = runtime
        .call_block(&mut task, block, vec![Value::Fixnum(1), Value::Fixnum(2), Value::Fixnum(3)])
        .unwrap();
    assert_eq!(runtime.tuple_values(long).unwrap(), vec![Value::Fixnum(1), Value::Fixnum(2)]);
}

// ===== Lifetime =====

#[test]
fn test_block_outlives_method_across_compaction() {
    let runtime = Runtime::default();
    let object = runtime.specials().object;
    define(
        &runtime,
        object,
        "make_counter",
        |ctx| {
            ctx.set_local(0, Value::Fixnum(0))?;
            let code = incrementer(ctx);
            ctx.create_block(code)
        },
        1,
    );

    let mut task = runtime.new_task();
    let make_counter = runtime.symbol("make_counter");
    let _dropped = runtime.send(&mut task, Value::Nil, make_counter, vec![]).unwrap();
    let _also_dropped = runtime.send(&mut task, Value::Nil, make_counter, vec![]).unwrap();
    let kept = runtime.send(&mut task, Value::Nil, make_counter, vec![]).unwrap();
    runtime.add_global_root(kept);
    assert_eq!(runtime.heap_stats().live_scopes, 3);

    let cycle = runtime.collect_garbage(&mut task).unwrap();
    assert_eq!(cycle.scopes_freed, 2);
    assert_eq!(cycle.scopes_relocated, 1);
    assert_eq!(runtime.heap_stats().live_scopes, 1);

    assert_eq!(runtime.call_block(&mut task, kept, vec![]).unwrap(), Value::Fixnum(1));
    assert_eq!(runtime.call_block(&mut task, kept, vec![]).unwrap(), Value::Fixnum(2));
}

#[test]
fn test_call_block_rejects_non_blocks() {
    let runtime = Runtime::default();
    let mut task = runtime.new_task();
    assert!(matches!(
        runtime.call_block(&mut task, Value::Fixnum(1), vec![]),
        Err(VmError::TypeError(_))
    ));
}
