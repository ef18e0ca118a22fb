//! Upvalue and closure types for the Jolt VM.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::interpreter::value::Value;

use super::chunk::FunctionProto;

/// A VM closure: a function prototype paired with captured upvalues.
#[derive(Clone)]
pub struct VmClosure {
    pub proto: Rc<FunctionProto>,
    pub upvalues: Vec<Rc<RefCell<Upvalue>>>,
}

impl VmClosure {
    pub fn new(proto: Rc<FunctionProto>, upvalues: Vec<Rc<RefCell<Upvalue>>>) -> Self {
        Self { proto, upvalues }
    }

    pub fn arity(&self) -> usize {
        self.proto.arity as usize
    }
}

impl fmt::Debug for VmClosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<vm fn {}>", self.proto.name)
    }
}

/// A captured variable.
///
/// While the owning frame is live the upvalue is open and aliases an absolute
/// stack slot; every closure that captured that slot holds the same cell.
/// When the slot is about to be discarded the value is copied into the cell
/// and the upvalue is closed for good.
#[derive(Debug, Clone)]
pub enum Upvalue {
    Open(usize),
    Closed(Value),
}
