//! Variable bindings: contexts, frames and the context stack.
//!
//! ```text
//! global ◄── frame(file) ◄── frame(for) ◄── frame(if)      lookup: right to left,
//!                                             ▲             then global
//!                                          push / pop
//! ```
//!
//! Frames are pushed when a scoped node starts rendering its body and popped
//! when that body is done, so bindings never outlive their scope.
//!
//! A component instance gets a marked frame holding its caller's defines and
//! slots. A `slot` in the component's template only defers to that frame.

use super::expr::Value;
use compact_str::CompactString;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// One set of name to value bindings.
#[derive(Debug, Clone, Default)]
pub struct Context {
    vars: FxHashMap<CompactString, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<CompactString>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    /// Copy every binding of `other` over this context.
    pub fn extend(&mut self, other: Context) {
        self.vars.extend(other.vars);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub context: Context,
    /// Holds a component caller's defines, slots and `__contents__`.
    component: bool,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn component() -> Self {
        Self {
            component: true,
            ..Self::default()
        }
    }

    pub fn with(mut self, name: impl Into<CompactString>, value: Value) -> Self {
        self.context.set(name, value);
        self
    }
}

/// Chain of active frames, innermost last, over an optional global context.
#[derive(Debug, Default)]
pub struct Stack {
    frames: SmallVec<[Frame; 8]>,
    global: Option<Arc<Context>>,
    /// Files whose top-level scope is being computed right now.
    resolving: Vec<PathBuf>,
}

impl Stack {
    pub fn new(global: Option<Arc<Context>>) -> Self {
        Self {
            frames: SmallVec::new(),
            global,
            resolving: Vec::new(),
        }
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::new());
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Bind in the innermost frame. With no frame pushed the binding is dropped.
    pub fn set(&mut self, name: impl Into<CompactString>, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.context.set(name, value);
        }
    }

    pub fn remove(&mut self, name: &str) {
        if let Some(frame) = self.frames.last_mut() {
            frame.context.remove(name);
        }
    }

    /// Innermost binding of `name`, falling back to the global context.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.context.get(name))
            .or_else(|| self.global.as_deref().and_then(|g| g.get(name)))
    }

    /// Whether the innermost component frame already binds `name`.
    ///
    /// Bindings outside that frame (page defines, outer components, the
    /// global context) do not count.
    pub fn filled_by_caller(&self, name: &str) -> bool {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.component)
            .is_some_and(|frame| frame.context.get(name).is_some())
    }

    pub fn is_resolving(&self, path: &Path) -> bool {
        self.resolving.iter().any(|p| p == path)
    }

    pub fn begin_resolving(&mut self, path: PathBuf) {
        self.resolving.push(path);
    }

    pub fn end_resolving(&mut self) {
        self.resolving.pop();
    }
}
