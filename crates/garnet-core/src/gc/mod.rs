//! Garbage collection system
//!
//! This module hosts the managed heap: instances, blocks, splat tuples and
//! promoted variable scopes. Collection is mark-sweep; the scope arena is
//! additionally compactable, which relocates promoted scopes and rewrites
//! every [`ScopeRef`] holder in place through the [`Visitor`] hook.
//!
//! # Architecture
//!
//! - **ObjectRef / ScopeRef**: typed handles into the two arenas
//! - **GcHeader**: per-slot mark metadata
//! - **Arena**: slot storage with a free list
//! - **RootSet**: embedder-registered global roots
//! - **Trace / Visitor**: the reference enumeration protocol
//! - **GarbageCollector**: mark, sweep and compaction
//!
//! # Slot Layout
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ GcHeader                                │
//! │  - marked: bool                         │
//! │  - survived: u32                        │
//! ├─────────────────────────────────────────┤  ← ObjectRef / ScopeRef index
//! │ HeapObject | VariableScope              │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Object slots never move. Scope slots move only during compaction, which
//! happens inside a collection and therefore only at a safepoint.

mod arena;
mod collector;
mod header;
mod ptr;
mod roots;
mod trace;

pub use arena::Arena;
pub use collector::{GarbageCollector, GcCycle, GcStats, HeapStats};
pub use header::GcHeader;
pub use ptr::{ObjectRef, ScopeRef};
pub use roots::RootSet;
pub use trace::{Trace, Visitor};
