//! `garnet scenario`: Run the built-in behavioural scenarios.

use anyhow::{ensure, Context};
use garnet_core::{
    Arity, ExecutableMethod, LexicalScope, ModuleId, Runtime, Value, Visibility, VmError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Scenario = fn(&Runtime) -> anyhow::Result<()>;

const SCENARIOS: &[(&str, Scenario)] = &[
    ("cache-redefinition", cache_redefinition),
    ("closure-shared-local", closure_shared_local),
    ("method-missing-once", method_missing_once),
    ("private-self-call", private_self_call),
    ("nested-constants", nested_constants),
];

pub fn execute(runtime: &Runtime, pattern: Option<&str>) -> anyhow::Result<bool> {
    let mut failed = 0;
    let mut ran = 0;

    for (name, scenario) in SCENARIOS {
        if pattern.is_some_and(|p| !name.contains(p)) {
            continue;
        }
        ran += 1;
        match scenario(runtime) {
            Ok(()) => println!("  PASS  {name}"),
            Err(err) => {
                failed += 1;
                println!("  FAIL  {name}: {err:#}");
            }
        }
    }

    println!();
    println!("{} scenarios, {} passed, {} failed", ran, ran - failed, failed);
    super::print_stats(runtime);
    runtime.shutdown();
    Ok(failed == 0)
}

fn constant(runtime: &Runtime, name: &str, result: i64) -> ExecutableMethod {
    ExecutableMethod::native(runtime.symbol(name), Arity::fixed(0), move |_| {
        Ok(Value::Fixnum(result))
    })
}

fn install(
    runtime: &Runtime,
    module: ModuleId,
    name: &str,
    method: ExecutableMethod,
    visibility: Visibility,
) -> anyhow::Result<()> {
    runtime
        .install(module, runtime.symbol(name), method, &runtime.top_scope(), visibility)
        .with_context(|| format!("installing {name}"))?;
    Ok(())
}

fn cache_redefinition(runtime: &Runtime) -> anyhow::Result<()> {
    let animal = runtime.define_class("Animal", None)?;
    let dog = runtime.define_class("Dog", Some(animal))?;
    install(runtime, animal, "foo", constant(runtime, "foo", 1), Visibility::Public)?;

    let mut task = runtime.new_task();
    let rex = runtime.new_object(dog)?;
    let foo = runtime.symbol("foo");
    let first = runtime.send(&mut task, rex, foo, vec![])?;
    ensure!(first == Value::Fixnum(1), "Animal#foo not reached");

    install(runtime, dog, "foo", constant(runtime, "foo", 2), Visibility::Public)?;
    let second = runtime.send(&mut task, rex, foo, vec![])?;
    ensure!(second == Value::Fixnum(2), "stale cache entry served");
    Ok(())
}

fn closure_shared_local(runtime: &Runtime) -> anyhow::Result<()> {
    let host = runtime.define_class("ClosureHost", None)?;
    let name = "capture";
    let method = ExecutableMethod::native(runtime.symbol(name), Arity::fixed(0), |ctx| {
        ctx.set_local(0, Value::Fixnum(1))?;
        let code = ExecutableMethod::native(ctx.symbol("block"), Arity::fixed(0), |ctx| {
            let x = ctx.outer_local(1, 0)?.as_fixnum().unwrap_or(0);
            ctx.set_outer_local(1, 0, Value::Fixnum(x + 1))?;
            Ok(Value::Nil)
        });
        let block = ctx.create_block(code)?;
        ctx.call_block(block, vec![])?;
        ctx.local(0)
    })
    .with_locals(1);
    install(runtime, host, name, method, Visibility::Public)?;

    let mut task = runtime.new_task();
    let obj = runtime.new_object(host)?;
    let seen = runtime.send(&mut task, obj, runtime.symbol(name), vec![])?;
    ensure!(seen == Value::Fixnum(2), "method observed {seen:?} after block mutation");
    Ok(())
}

fn method_missing_once(runtime: &Runtime) -> anyhow::Result<()> {
    let ghost = runtime.define_class("Ghost", None)?;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let name = runtime.symbol("method_missing");
    let hook = ExecutableMethod::native(name, Arity::new(1, 0, true), move |ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
        ctx.arg(0)
    });
    install(runtime, ghost, "method_missing", hook, Visibility::Private)?;

    let mut task = runtime.new_task();
    let obj = runtime.new_object(ghost)?;
    let boo = runtime.symbol("boo");
    let first = runtime.send(&mut task, obj, boo, vec![Value::Fixnum(1)])?;
    ensure!(first == Value::Symbol(boo), "hook did not receive the name first");
    ensure!(calls.load(Ordering::SeqCst) == 1, "hook ran {} times", calls.load(Ordering::SeqCst));
    Ok(())
}

fn private_self_call(runtime: &Runtime) -> anyhow::Result<()> {
    let vault = runtime.define_class("Vault", None)?;
    install(runtime, vault, "secret", constant(runtime, "secret", 7), Visibility::Private)?;
    let reveal = ExecutableMethod::native(runtime.symbol("reveal"), Arity::fixed(0), |ctx| {
        let secret = ctx.symbol("secret");
        ctx.send_self(secret, vec![])
    });
    install(runtime, vault, "reveal", reveal, Visibility::Public)?;

    let mut task = runtime.new_task();
    let obj = runtime.new_object(vault)?;
    let outside = runtime.send(&mut task, obj, runtime.symbol("secret"), vec![]);
    ensure!(
        matches!(outside, Err(VmError::PrivacyViolation { .. })),
        "explicit receiver reached a private method"
    );
    let inside = runtime.send(&mut task, obj, runtime.symbol("reveal"), vec![])?;
    ensure!(inside == Value::Fixnum(7), "self call failed");
    Ok(())
}

fn nested_constants(runtime: &Runtime) -> anyhow::Result<()> {
    let object = runtime.specials().object;
    let a = runtime.define_module("Outer")?;
    let b = runtime.open_module(a, runtime.symbol("Inner"))?;
    let x = runtime.symbol("X");
    runtime.set_const(a, x, Value::Fixnum(1))?;
    runtime.set_const(b, x, Value::Fixnum(2))?;

    let scope = LexicalScope::root(object).push(a).push(b);
    let inner = runtime.resolve_constant(&scope, x).value();
    ensure!(inner == Some(Value::Fixnum(2)), "inner X not preferred");
    runtime.remove_const(b, x)?;
    let outer = runtime.resolve_constant(&scope, x).value();
    ensure!(outer == Some(Value::Fixnum(1)), "no fallback to outer X");
    Ok(())
}
