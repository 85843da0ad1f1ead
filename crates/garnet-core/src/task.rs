//! Tasks
//!
//! A [`Task`] is the activation stack of one logical thread of user code.
//! The runtime executes one task at a time; the scheduler that switches
//! between tasks lives outside this crate.
//!
//! Tasks created by [`Runtime::new_task`](crate::Runtime::new_task) share a
//! counter of tasks that currently have frames. The collector only traces
//! the task it runs on, so it defers while any other task is mid-call.

use crate::gc::{Trace, Visitor};
use crate::scope::Activation;
use crate::{VmError, VmResult};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Unique identifier for a Task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Create a new unique task ID
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        TaskId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

/// Activation stack of one logical task
#[derive(Debug)]
pub struct Task {
    id: TaskId,
    frames: Vec<Activation>,
    max_depth: usize,
    busy: Arc<AtomicUsize>,
}

impl Task {
    /// Create an empty task allowing `max_depth` nested activations that
    /// reports into a runtime's busy-task counter
    pub(crate) fn attached(max_depth: usize, busy: Arc<AtomicUsize>) -> Self {
        Self {
            id: TaskId::new(),
            frames: Vec::new(),
            max_depth,
            busy,
        }
    }

    /// Task id
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Push an activation, failing with `StackOverflow` past the depth limit
    pub fn push(&mut self, activation: Activation) -> VmResult<()> {
        if self.frames.len() >= self.max_depth {
            return Err(VmError::StackOverflow);
        }
        if self.frames.is_empty() {
            self.busy.fetch_add(1, Ordering::AcqRel);
        }
        self.frames.push(activation);
        Ok(())
    }

    /// Pop the innermost activation
    pub fn pop(&mut self) -> Option<Activation> {
        let frame = self.frames.pop();
        if frame.is_some() && self.frames.is_empty() {
            self.busy.fetch_sub(1, Ordering::AcqRel);
        }
        frame
    }

    /// Innermost activation
    pub fn current(&self) -> VmResult<&Activation> {
        self.frames.last().ok_or(VmError::NoActiveFrame)
    }

    /// Innermost activation, mutably
    pub fn current_mut(&mut self) -> VmResult<&mut Activation> {
        self.frames.last_mut().ok_or(VmError::NoActiveFrame)
    }

    /// Number of activations
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Activations, outermost first
    pub fn frames(&self) -> &[Activation] {
        &self.frames
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        if !self.frames.is_empty() {
            self.busy.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl Trace for Task {
    fn trace(&mut self, visitor: &mut dyn Visitor) {
        for frame in self.frames.iter_mut() {
            frame.trace(visitor);
        }
    }
}
