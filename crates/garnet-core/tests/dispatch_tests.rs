//! Dispatch Integration Tests
//!
//! Tests validate:
//! - Method resolution order across superclasses and included modules
//! - Visibility checks (private, protected) versus absence
//! - `method_missing` routing
//! - `super` dispatch
//! - Arity and call depth limits
//! - Specialization and pluggable executors
//!
//! # Running Tests
//! ```bash
//! cargo test --test dispatch_tests
//! ```

use garnet_core::{
    Arity, CallContext, ExecutableMethod, Executor, InstructionSequence, Message, ModuleId,
    Runtime, SpecializationError, SpecializedCode, Specializer, TypeInfo, Value, Visibility,
    VmError, VmOptions, VmResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn define(runtime: &Runtime, module: ModuleId, name: &str, arity: Arity, result: i64) {
    define_with(runtime, module, name, arity, Visibility::Public, move |_| {
        Ok(Value::Fixnum(result))
    });
}

fn define_with<F>(
    runtime: &Runtime,
    module: ModuleId,
    name: &str,
    arity: Arity,
    visibility: Visibility,
    body: F,
) where
    F: Fn(&mut CallContext<'_>) -> VmResult<Value> + Send + Sync + 'static,
{
    let sym = runtime.symbol(name);
    runtime
        .install(
            module,
            sym,
            ExecutableMethod::native(sym, arity, body),
            &runtime.top_scope(),
            visibility,
        )
        .unwrap();
}

// ===== Resolution Order =====

#[test]
fn test_last_included_module_wins() {
    let runtime = Runtime::default();
    let a = runtime.define_module("A").unwrap();
    let b = runtime.define_module("B").unwrap();
    let class = runtime.define_class("C", None).unwrap();
    define(&runtime, a, "who", Arity::fixed(0), 1);
    define(&runtime, b, "who", Arity::fixed(0), 2);
    runtime.include_module(class, a).unwrap();
    runtime.include_module(class, b).unwrap();

    let mut task = runtime.new_task();
    let obj = runtime.new_object(class).unwrap();
    let result = runtime.send(&mut task, obj, runtime.symbol("who"), vec![]).unwrap();
    assert_eq!(result, Value::Fixnum(2));

    let object = runtime.specials().object;
    assert_eq!(runtime.ancestors(class)[..4], [class, b, a, object]);
}

#[test]
fn test_class_method_beats_included_module() {
    let runtime = Runtime::default();
    let mixin = runtime.define_module("Mixin").unwrap();
    let class = runtime.define_class("Widget", None).unwrap();
    runtime.include_module(class, mixin).unwrap();
    define(&runtime, mixin, "size", Arity::fixed(0), 1);
    define(&runtime, class, "size", Arity::fixed(0), 2);

    let mut task = runtime.new_task();
    let obj = runtime.new_object(class).unwrap();
    assert_eq!(
        runtime.send(&mut task, obj, runtime.symbol("size"), vec![]).unwrap(),
        Value::Fixnum(2)
    );
}

#[test]
fn test_singleton_method_shadows_class() {
    let runtime = Runtime::default();
    let class = runtime.define_class("Thing", None).unwrap();
    define(&runtime, class, "name", Arity::fixed(0), 1);

    let special = runtime.new_object(class).unwrap();
    let plain = runtime.new_object(class).unwrap();
    let sym = runtime.symbol("name");
    runtime
        .attach_method(
            special,
            sym,
            ExecutableMethod::native(sym, Arity::fixed(0), |_| Ok(Value::Fixnum(99))),
            &runtime.top_scope(),
            Visibility::Public,
        )
        .unwrap();

    let mut task = runtime.new_task();
    assert_eq!(runtime.send(&mut task, special, sym, vec![]).unwrap(), Value::Fixnum(99));
    assert_eq!(runtime.send(&mut task, plain, sym, vec![]).unwrap(), Value::Fixnum(1));
}

#[test]
fn test_class_methods_inherit_through_metaclasses() {
    let runtime = Runtime::default();
    let base = runtime.define_class("Base", None).unwrap();
    let derived = runtime.define_class("Derived", Some(base)).unwrap();
    let sym = runtime.symbol("create");
    runtime
        .attach_method(
            Value::Module(base),
            sym,
            ExecutableMethod::native(sym, Arity::fixed(0), |ctx| ctx.self_value()),
            &runtime.top_scope(),
            Visibility::Public,
        )
        .unwrap();

    let mut task = runtime.new_task();
    let result = runtime.send(&mut task, Value::Module(derived), sym, vec![]).unwrap();
    assert_eq!(result, Value::Module(derived));
}

// ===== Visibility =====

#[test]
fn test_private_method_requires_self_call() {
    let runtime = Runtime::default();
    let class = runtime.define_class("Vault", None).unwrap();
    define_with(&runtime, class, "secret", Arity::fixed(0), Visibility::Private, |_| {
        Ok(Value::Fixnum(7))
    });
    define_with(&runtime, class, "reveal", Arity::fixed(0), Visibility::Public, |ctx| {
        let secret = ctx.symbol("secret");
        ctx.send_self(secret, vec![])
    });

    let mut task = runtime.new_task();
    let obj = runtime.new_object(class).unwrap();

    let err = runtime
        .send(&mut task, obj, runtime.symbol("secret"), vec![])
        .unwrap_err();
    assert!(matches!(
        err,
        VmError::PrivacyViolation {
            visibility: Visibility::Private,
            ..
        }
    ));

    let result = runtime.send(&mut task, obj, runtime.symbol("reveal"), vec![]).unwrap();
    assert_eq!(result, Value::Fixnum(7));
}

#[test]
fn test_privacy_violation_does_not_call_method_missing() {
    let runtime = Runtime::default();
    let class = runtime.define_class("Guarded", None).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    define_with(
        &runtime,
        class,
        "method_missing",
        Arity::new(1, 0, true),
        Visibility::Private,
        move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Nil)
        },
    );
    define_with(
        &runtime,
        class,
        "hidden",
        Arity::fixed(0),
        Visibility::Private,
        |_| Ok(Value::Nil),
    );

    let mut task = runtime.new_task();
    let obj = runtime.new_object(class).unwrap();
    assert!(runtime.send(&mut task, obj, runtime.symbol("hidden"), vec![]).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_protected_method_needs_kind_of_sender() {
    let runtime = Runtime::default();
    let class = runtime.define_class("Account", None).unwrap();
    let other = runtime.define_class("Stranger", None).unwrap();
    define_with(&runtime, class, "balance", Arity::fixed(0), Visibility::Protected, |_| {
        Ok(Value::Fixnum(100))
    });

    let mut task = runtime.new_task();
    let a = runtime.new_object(class).unwrap();
    let b = runtime.new_object(class).unwrap();
    let stranger = runtime.new_object(other).unwrap();
    let balance = runtime.symbol("balance");

    let peer = Message::new(b, balance, vec![]).from_sender(a);
    assert_eq!(runtime.dispatch(&mut task, peer).unwrap(), Value::Fixnum(100));

    let outsider = Message::new(b, balance, vec![]).from_sender(stranger);
    assert!(matches!(
        runtime.dispatch(&mut task, outsider),
        Err(VmError::PrivacyViolation { .. })
    ));
    assert!(runtime.send(&mut task, b, balance, vec![]).is_err());
}

// ===== method_missing =====

#[test]
fn test_method_missing_invoked_exactly_once_with_name_first() {
    let runtime = Runtime::default();
    let class = runtime.define_class("Ghost", None).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    define_with(
        &runtime,
        class,
        "method_missing",
        Arity::new(1, 0, true),
        Visibility::Private,
        move |ctx| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert_eq!(ctx.args()?.len(), 3);
            assert_eq!(ctx.arg(1)?, Value::Fixnum(10));
            ctx.arg(0)
        },
    );

    let mut task = runtime.new_task();
    let obj = runtime.new_object(class).unwrap();
    let boo = runtime.symbol("boo");
    let result = runtime
        .send(&mut task, obj, boo, vec![Value::Fixnum(10), Value::Fixnum(20)])
        .unwrap();
    assert_eq!(result, Value::Symbol(boo));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_undefined_method_routes_to_method_missing() {
    let runtime = Runtime::default();
    let base = runtime.define_class("Base", None).unwrap();
    let derived = runtime.define_class("Derived", Some(base)).unwrap();
    define(&runtime, base, "ping", Arity::fixed(0), 1);
    runtime.undefine_method(derived, runtime.symbol("ping")).unwrap();

    let mut task = runtime.new_task();
    let obj = runtime.new_object(derived).unwrap();
    let err = runtime.send(&mut task, obj, runtime.symbol("ping"), vec![]).unwrap_err();
    assert!(matches!(err, VmError::MethodNotFound { .. }));

    runtime.remove_method(derived, runtime.symbol("ping")).unwrap();
    assert_eq!(
        runtime.send(&mut task, obj, runtime.symbol("ping"), vec![]).unwrap(),
        Value::Fixnum(1)
    );
    assert!(matches!(
        runtime.remove_method(derived, runtime.symbol("ping")),
        Err(VmError::NameError(_))
    ));
}

// ===== Introspection =====

#[test]
fn test_respond_to_respects_visibility() {
    let runtime = Runtime::default();
    let class = runtime.define_class("Responder", None).unwrap();
    define_with(&runtime, class, "inner", Arity::fixed(0), Visibility::Private, |_| Ok(Value::Nil));
    define(&runtime, class, "outer", Arity::fixed(0), 0);

    let obj = runtime.new_object(class).unwrap();
    let inner = runtime.symbol("inner");
    assert!(runtime.respond_to(obj, runtime.symbol("outer"), false).unwrap());
    assert!(!runtime.respond_to(obj, inner, false).unwrap());
    assert!(runtime.respond_to(obj, inner, true).unwrap());

    let (method, module) = runtime.locate_method(obj, inner, true).unwrap().unwrap();
    assert_eq!(module, class);
    assert_eq!(method.name(), inner);
    assert!(runtime.locate_method(obj, runtime.symbol("absent"), true).unwrap().is_none());
}

// ===== super =====

#[test]
fn test_super_walks_past_defining_module() {
    let runtime = Runtime::default();
    let base = runtime.define_class("Base", None).unwrap();
    let mixin = runtime.define_module("Loud").unwrap();
    let derived = runtime.define_class("Derived", Some(base)).unwrap();
    runtime.include_module(derived, mixin).unwrap();

    define_with(&runtime, base, "greet", Arity::fixed(1), Visibility::Public, |ctx| {
        let n = ctx.arg(0)?.as_fixnum().unwrap_or(0);
        Ok(Value::Fixnum(n + 1))
    });
    define_with(&runtime, mixin, "greet", Arity::fixed(1), Visibility::Public, |ctx| {
        let n = ctx.arg(0)?.as_fixnum().unwrap_or(0);
        ctx.send_super(vec![Value::Fixnum(n * 10)])
    });
    define_with(&runtime, derived, "greet", Arity::fixed(1), Visibility::Public, |ctx| {
        let n = ctx.arg(0)?.as_fixnum().unwrap_or(0);
        ctx.send_super(vec![Value::Fixnum(n + 2)])
    });

    let mut task = runtime.new_task();
    let obj = runtime.new_object(derived).unwrap();
    // derived: 1 + 2 = 3, mixin: 3 * 10 = 30, base: 30 + 1
    let result = runtime
        .send(&mut task, obj, runtime.symbol("greet"), vec![Value::Fixnum(1)])
        .unwrap();
    assert_eq!(result, Value::Fixnum(31));
}

#[test]
fn test_super_without_parent_definition() {
    let runtime = Runtime::default();
    let class = runtime.define_class("Lonely", None).unwrap();
    define_with(&runtime, class, "solo", Arity::fixed(0), Visibility::Public, |ctx| {
        ctx.send_super(vec![])
    });

    let mut task = runtime.new_task();
    let obj = runtime.new_object(class).unwrap();
    assert!(matches!(
        runtime.send(&mut task, obj, runtime.symbol("solo"), vec![]),
        Err(VmError::MethodNotFound { .. })
    ));
}

// ===== Limits =====

#[test]
fn test_optional_arguments_default_to_nil() {
    let runtime = Runtime::default();
    let object = runtime.specials().object;
    define_with(&runtime, object, "pair", Arity::new(1, 1, false), Visibility::Public, |ctx| {
        ctx.local(1)
    });

    let mut task = runtime.new_task();
    let pair = runtime.symbol("pair");
    assert_eq!(
        runtime
            .send(&mut task, Value::Nil, pair, vec![Value::Fixnum(1)])
            .unwrap(),
        Value::Nil
    );
    assert_eq!(
        runtime
            .send(&mut task, Value::Nil, pair, vec![Value::Fixnum(1), Value::Fixnum(2)])
            .unwrap(),
        Value::Fixnum(2)
    );
    match runtime.send(&mut task, Value::Nil, pair, vec![]) {
        Err(VmError::ArgumentError { given, expected, .. }) => {
            assert_eq!(given, 0);
            assert_eq!(expected, "1..2");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_unbounded_recursion_overflows() {
    let options = VmOptions {
        max_call_depth: 64,
        ..VmOptions::default()
    };
    let runtime = Runtime::new(options);
    let object = runtime.specials().object;
    define_with(&runtime, object, "forever", Arity::fixed(0), Visibility::Public, |ctx| {
        let name = ctx.method_name()?;
        ctx.send_self(name, vec![])
    });

    let mut task = runtime.new_task();
    let err = runtime
        .send(&mut task, Value::Nil, runtime.symbol("forever"), vec![])
        .unwrap_err();
    assert!(matches!(err, VmError::StackOverflow));
    assert_eq!(task.depth(), 0);
}

// ===== Backends =====

struct Doubler;

impl SpecializedCode for Doubler {
    fn invoke(&self, _ctx: &mut CallContext<'_>) -> VmResult<Value> {
        Ok(Value::Fixnum(2))
    }
}

struct PickySpecializer {
    class_name: &'static str,
}

impl Specializer for PickySpecializer {
    fn specialize(
        &self,
        _method: &ExecutableMethod,
        info: &TypeInfo,
    ) -> Result<Arc<dyn SpecializedCode>, SpecializationError> {
        if info.class_name == self.class_name {
            Ok(Arc::new(Doubler))
        } else {
            Err(SpecializationError::Unsupported(info.class_name.clone()))
        }
    }
}

#[test]
fn test_specialized_form_preferred_for_matching_class() {
    let runtime =
        Runtime::default().with_specializer(Arc::new(PickySpecializer { class_name: "Fast" }));
    let fast = runtime.define_class("Fast", None).unwrap();
    let slow = runtime.define_class("Slow", None).unwrap();
    define(&runtime, fast, "value", Arity::fixed(0), 1);
    define(&runtime, slow, "value", Arity::fixed(0), 1);
    assert_eq!(runtime.specialization_failures(), 1);

    let mut task = runtime.new_task();
    let value = runtime.symbol("value");
    let fast_obj = runtime.new_object(fast).unwrap();
    let slow_obj = runtime.new_object(slow).unwrap();
    assert_eq!(runtime.send(&mut task, fast_obj, value, vec![]).unwrap(), Value::Fixnum(2));
    // Failed specialization falls back to the generic body.
    assert_eq!(runtime.send(&mut task, slow_obj, value, vec![]).unwrap(), Value::Fixnum(1));
}

#[test]
fn test_module_methods_are_not_specialized() {
    let runtime =
        Runtime::default().with_specializer(Arc::new(PickySpecializer { class_name: "Nope" }));
    let module = runtime.define_module("Plain").unwrap();
    define(&runtime, module, "value", Arity::fixed(0), 1);
    assert_eq!(runtime.specialization_failures(), 0);
}

struct LengthExecutor;

impl Executor for LengthExecutor {
    fn execute(
        &self,
        _method: &ExecutableMethod,
        code: &InstructionSequence,
        _ctx: &mut CallContext<'_>,
    ) -> VmResult<Value> {
        Ok(Value::Fixnum(code.bytes().len() as i64))
    }
}

#[test]
fn test_bytecode_runs_through_executor() {
    let runtime = Runtime::default().with_executor(Arc::new(LengthExecutor));
    let object = runtime.specials().object;
    let name = runtime.symbol("compiled");
    let code = InstructionSequence::new(vec![1u8, 2, 3]);
    let method = ExecutableMethod::bytecode(name, Arity::fixed(0), code);
    runtime
        .install(object, name, method, &runtime.top_scope(), Visibility::Public)
        .unwrap();

    let mut task = runtime.new_task();
    assert_eq!(runtime.send(&mut task, Value::Nil, name, vec![]).unwrap(), Value::Fixnum(3));
}

#[test]
fn test_dispatch_after_shutdown() {
    let runtime = Runtime::default();
    runtime.shutdown();
    let mut task = runtime.new_task();
    assert!(matches!(
        runtime.send(&mut task, Value::Nil, runtime.symbol("x"), vec![]),
        Err(VmError::RuntimeShutdown)
    ));
}
