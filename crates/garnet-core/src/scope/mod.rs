//! Variable scopes and activations
//!
//! Every call gets an [`Activation`] whose locals live in a *transient*
//! [`VariableScope`] embedded in the activation itself. The first time a
//! closure captures the activation, the scope is *promoted*: moved into the
//! managed heap, after which the activation and every block created from it
//! share the heap copy through a [`ScopeRef`](crate::gc::ScopeRef).
//!
//! ```text
//!   Activation (method m)                 heap
//!   ┌────────────────────────┐
//!   │ storage: Transient ────┼──promote──► VariableScope { x }
//!   │          Promoted(r) ◄─┼─────────────┘    ▲       ▲
//!   └────────────────────────┘                  │ home  │ top
//!                                         BlockObject { code }
//! ```
//!
//! A block activation's scope takes `self`, `module` and the captured block
//! from the method-level scope (`top`), while its `parent` is the immediate
//! lexical parent (`home`), which is what local variable walks follow.

mod activation;
mod variable;

pub use activation::{Activation, ActivationKind, ScopeStorage};
pub use variable::VariableScope;
