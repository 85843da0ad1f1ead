//! `garnet stress`: Drive sends through a deep hierarchy.

use anyhow::{ensure, Context};
use garnet_core::{Arity, ExecutableMethod, ModuleId, Runtime, Value, Visibility};
use std::time::Instant;

pub struct StressOptions {
    pub depth: usize,
    pub iterations: usize,
    pub redefine_every: usize,
    pub closures: bool,
}

fn target(runtime: &Runtime, generation: i64, closures: bool) -> ExecutableMethod {
    let name = runtime.symbol("target");
    if !closures {
        return ExecutableMethod::native(name, Arity::fixed(0), move |_| {
            Ok(Value::Fixnum(generation))
        });
    }
    ExecutableMethod::native(name, Arity::fixed(0), move |ctx| {
        ctx.set_local(0, Value::Fixnum(generation))?;
        let read = ctx.symbol("read");
        let code = ExecutableMethod::native(read, Arity::fixed(0), |ctx| ctx.outer_local(1, 0));
        let block = ctx.create_block(code)?;
        ctx.call_block(block, Vec::new())
    })
    .with_locals(1)
}

fn hierarchy(runtime: &Runtime, depth: usize) -> anyhow::Result<(ModuleId, ModuleId)> {
    let root = runtime.define_class("Level0", None)?;
    let mut leaf = root;
    for level in 1..=depth {
        leaf = runtime
            .define_class(&format!("Level{level}"), Some(leaf))
            .with_context(|| format!("defining Level{level}"))?;
    }
    Ok((root, leaf))
}

pub fn execute(runtime: &Runtime, options: &StressOptions) -> anyhow::Result<bool> {
    let (root, leaf) = hierarchy(runtime, options.depth)?;
    let name = runtime.symbol("target");
    let scope = runtime.top_scope();
    runtime.install(root, name, target(runtime, 0, options.closures), &scope, Visibility::Public)?;

    let mut task = runtime.new_task();
    let receiver = runtime.new_object(leaf)?;
    runtime.add_global_root(receiver);

    let mut generation = 0;
    let start = Instant::now();
    for i in 1..=options.iterations {
        let value = runtime.send(&mut task, receiver, name, Vec::new())?;
        ensure!(
            value == Value::Fixnum(generation),
            "send {i} returned {value:?}, expected generation {generation}"
        );
        if options.redefine_every > 0 && i % options.redefine_every == 0 {
            generation += 1;
            let method = target(runtime, generation, options.closures);
            runtime.install(root, name, method, &scope, Visibility::Public)?;
        }
    }
    let elapsed = start.elapsed();

    println!(
        "{} sends through {} levels in {:?} ({:.1} ns/send)",
        options.iterations,
        options.depth,
        elapsed,
        elapsed.as_nanos() as f64 / options.iterations.max(1) as f64
    );
    println!("{} redefinitions", generation);
    super::print_stats(runtime);

    runtime.remove_global_root(receiver);
    runtime.shutdown();
    Ok(true)
}
