//! Lexical frames for the tree-walking evaluator.
//!
//! The parser resolves every local reference to a [`Binding`] naming a frame
//! depth and a slot, so lookups here never compare names.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::Binding;
use crate::interpreter::value::Value;

/// One frame of slots, linked to the frame it was created in.
pub struct Environment {
    slots: RefCell<Vec<Value>>,
    parent: Option<Rc<Environment>>,
    depth: usize,
}

impl Environment {
    /// Create a frame below `parent` holding `slots`.
    pub fn new(parent: Option<Rc<Environment>>, slots: Vec<Value>) -> Rc<Self> {
        let depth = parent.as_ref().map_or(0, |p| p.depth + 1);
        Rc::new(Self {
            slots: RefCell::new(slots),
            parent,
            depth,
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Append a slot to this frame (used while evaluating `let` bindings in order).
    pub fn push(&self, value: Value) {
        self.slots.borrow_mut().push(value);
    }

    fn frame(&self, depth: usize) -> Option<&Environment> {
        let mut env = self;
        while env.depth > depth {
            env = env.parent.as_deref()?;
        }
        (env.depth == depth).then_some(env)
    }

    pub fn get(&self, binding: &Binding) -> Option<Value> {
        self.frame(binding.frame)?
            .slots
            .borrow()
            .get(binding.index)
            .cloned()
    }

    /// Overwrite an existing slot. Returns false when the slot does not exist.
    pub fn set(&self, binding: &Binding, value: Value) -> bool {
        let Some(frame) = self.frame(binding.frame) else {
            return false;
        };
        let mut slots = frame.slots.borrow_mut();
        match slots.get_mut(binding.index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}
