//! Method Cache Coherence Tests
//!
//! Every hierarchy or method table mutation must be visible to the next
//! dispatch; the cache may never serve a stale resolution.
//!
//! # Running Tests
//! ```bash
//! cargo test --test cache_coherence_tests
//! ```

use garnet_core::{
    Arity, ExecutableMethod, InvalidationGranularity, ModuleId, Runtime, Value, Visibility,
    VmError, VmOptions,
};
use std::sync::Arc;
use std::thread;

fn define(runtime: &Runtime, module: ModuleId, name: &str, result: i64) {
    let sym = runtime.symbol(name);
    runtime
        .install(
            module,
            sym,
            ExecutableMethod::native(sym, Arity::fixed(0), move |_| Ok(Value::Fixnum(result))),
            &runtime.top_scope(),
            Visibility::Public,
        )
        .unwrap();
}

fn coherence_runtime(granularity: InvalidationGranularity) -> Runtime {
    Runtime::new(VmOptions::with_invalidation(granularity))
}

// ===== Redefinition =====

fn redefinition_in_subclass(granularity: InvalidationGranularity) {
    let runtime = coherence_runtime(granularity);
    let animal = runtime.define_class("Animal", None).unwrap();
    let dog = runtime.define_class("Dog", Some(animal)).unwrap();
    define(&runtime, animal, "foo", 1);

    let mut task = runtime.new_task();
    let rex = runtime.new_object(dog).unwrap();
    let foo = runtime.symbol("foo");

    assert_eq!(runtime.send(&mut task, rex, foo, vec![]).unwrap(), Value::Fixnum(1));
    let (_, owner) = runtime.locate_method(rex, foo, false).unwrap().unwrap();
    assert_eq!(owner, animal);
    let hits_before = runtime.cache_stats().hits;

    define(&runtime, dog, "foo", 2);
    assert_eq!(runtime.send(&mut task, rex, foo, vec![]).unwrap(), Value::Fixnum(2));
    let (_, owner) = runtime.locate_method(rex, foo, false).unwrap().unwrap();
    assert_eq!(owner, dog);
    assert!(runtime.cache_stats().invalidations >= 1);
    assert!(runtime.cache_stats().hits > hits_before);
}

#[test]
fn test_redefinition_in_subclass_whole_invalidation() {
    redefinition_in_subclass(InvalidationGranularity::Whole);
}

#[test]
fn test_redefinition_in_subclass_by_name_invalidation() {
    redefinition_in_subclass(InvalidationGranularity::ByName);
}

#[test]
fn test_second_dispatch_hits_cache() {
    let runtime = Runtime::default();
    let class = runtime.define_class("Cached", None).unwrap();
    define(&runtime, class, "value", 5);

    let mut task = runtime.new_task();
    let obj = runtime.new_object(class).unwrap();
    let value = runtime.symbol("value");
    runtime.send(&mut task, obj, value, vec![]).unwrap();
    let first = runtime.cache_stats();
    runtime.send(&mut task, obj, value, vec![]).unwrap();
    let second = runtime.cache_stats();

    assert_eq!(second.hits, first.hits + 1);
    assert_eq!(second.misses, first.misses);
}

// ===== Hierarchy Mutation =====

#[test]
fn test_include_after_caching() {
    let runtime = coherence_runtime(InvalidationGranularity::ByName);
    let mixin = runtime.define_module("Override").unwrap();
    define(&runtime, mixin, "kind", 2);
    let base = runtime.define_class("Root", None).unwrap();
    let leaf = runtime.define_class("Leaf", Some(base)).unwrap();
    define(&runtime, base, "kind", 3);

    let mut task = runtime.new_task();
    let obj = runtime.new_object(leaf).unwrap();
    let kind = runtime.symbol("kind");
    assert_eq!(runtime.send(&mut task, obj, kind, vec![]).unwrap(), Value::Fixnum(3));

    runtime.include_module(leaf, mixin).unwrap();
    assert_eq!(runtime.send(&mut task, obj, kind, vec![]).unwrap(), Value::Fixnum(2));
}

#[test]
fn test_superclass_change_after_caching() {
    let runtime = Runtime::default();
    let first = runtime.define_class("First", None).unwrap();
    let second = runtime.define_class("Second", None).unwrap();
    let child = runtime.define_class("Child", Some(first)).unwrap();
    define(&runtime, first, "origin", 1);
    define(&runtime, second, "origin", 2);

    let mut task = runtime.new_task();
    let obj = runtime.new_object(child).unwrap();
    let origin = runtime.symbol("origin");
    assert_eq!(runtime.send(&mut task, obj, origin, vec![]).unwrap(), Value::Fixnum(1));

    runtime.set_superclass(child, second).unwrap();
    assert_eq!(runtime.send(&mut task, obj, origin, vec![]).unwrap(), Value::Fixnum(2));
}

#[test]
fn test_superclass_change_relinks_metaclass() {
    let runtime = Runtime::default();
    let first = runtime.define_class("Former", None).unwrap();
    let second = runtime.define_class("Latter", None).unwrap();
    let child = runtime.define_class("Heir", Some(first)).unwrap();
    let child_meta = runtime.singleton_class(Value::Module(child)).unwrap();

    let hello = runtime.symbol("hello");
    runtime
        .attach_method(
            Value::Module(second),
            hello,
            ExecutableMethod::native(hello, Arity::fixed(0), |_| Ok(Value::Fixnum(4))),
            &runtime.top_scope(),
            Visibility::Public,
        )
        .unwrap();

    let mut task = runtime.new_task();
    assert!(matches!(
        runtime.send(&mut task, Value::Module(child), hello, vec![]),
        Err(VmError::MethodNotFound { .. })
    ));

    runtime.set_superclass(child, second).unwrap();
    let second_meta = runtime.singleton_class(Value::Module(second)).unwrap();
    assert_eq!(runtime.ancestors(child_meta)[..2], [child_meta, second_meta]);
    assert_eq!(
        runtime
            .send(&mut task, Value::Module(child), hello, vec![])
            .unwrap(),
        Value::Fixnum(4)
    );
}

#[test]
fn test_singleton_after_caching() {
    let runtime = Runtime::default();
    let class = runtime.define_class("Shared", None).unwrap();
    define(&runtime, class, "label", 1);

    let mut task = runtime.new_task();
    let obj = runtime.new_object(class).unwrap();
    let label = runtime.symbol("label");
    assert_eq!(runtime.send(&mut task, obj, label, vec![]).unwrap(), Value::Fixnum(1));

    runtime
        .attach_method(
            obj,
            label,
            ExecutableMethod::native(label, Arity::fixed(0), |_| Ok(Value::Fixnum(9))),
            &runtime.top_scope(),
            Visibility::Public,
        )
        .unwrap();
    assert_eq!(runtime.send(&mut task, obj, label, vec![]).unwrap(), Value::Fixnum(9));
}

#[test]
fn test_visibility_change_after_caching() {
    let runtime = coherence_runtime(InvalidationGranularity::ByName);
    let class = runtime.define_class("Door", None).unwrap();
    define(&runtime, class, "open", 1);

    let mut task = runtime.new_task();
    let obj = runtime.new_object(class).unwrap();
    let open = runtime.symbol("open");
    assert!(runtime.send(&mut task, obj, open, vec![]).is_ok());

    runtime.set_visibility(class, open, Visibility::Private).unwrap();
    assert!(matches!(
        runtime.send(&mut task, obj, open, vec![]),
        Err(VmError::PrivacyViolation { .. })
    ));
    assert!(matches!(
        runtime.set_visibility(class, runtime.symbol("missing"), Visibility::Public),
        Err(VmError::NameError(_))
    ));
}

#[test]
fn test_undefine_after_caching() {
    let runtime = coherence_runtime(InvalidationGranularity::ByName);
    let class = runtime.define_class("Fading", None).unwrap();
    define(&runtime, class, "here", 1);

    let mut task = runtime.new_task();
    let obj = runtime.new_object(class).unwrap();
    let here = runtime.symbol("here");
    assert!(runtime.send(&mut task, obj, here, vec![]).is_ok());

    runtime.undefine_method(class, here).unwrap();
    assert!(matches!(
        runtime.send(&mut task, obj, here, vec![]),
        Err(VmError::MethodNotFound { .. })
    ));
}

// ===== Concurrency =====

#[test]
fn test_readers_observe_redefinition() {
    let runtime = Arc::new(Runtime::default());
    let object = runtime.specials().object;
    define(&runtime, object, "version", 1);
    let version = runtime.symbol("version");

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let runtime = Arc::clone(&runtime);
            thread::spawn(move || {
                let mut task = runtime.new_task();
                let mut last = 0;
                for _ in 0..2_000 {
                    let seen = runtime
                        .send(&mut task, Value::Fixnum(0), version, vec![])
                        .unwrap()
                        .as_fixnum()
                        .unwrap();
                    // Versions only move forward.
                    assert!(seen >= last);
                    last = seen;
                }
            })
        })
        .collect();

    for n in 2..=50 {
        define(&runtime, object, "version", n);
    }
    for reader in readers {
        reader.join().unwrap();
    }

    let mut task = runtime.new_task();
    assert_eq!(
        runtime.send(&mut task, Value::Fixnum(0), version, vec![]).unwrap(),
        Value::Fixnum(50)
    );
}
