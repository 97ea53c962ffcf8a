//! Host-provided values: callable primitives and opaque objects

use super::env::Dict;
use super::error::EvalResult;
use super::eval::Interpreter;
use super::value::Value;
use std::any::Any;
use std::rc::Rc;

/// Signature of a native primitive. Receives the call frame holding the
/// block's bound parameters.
pub type NativeFnPtr = fn(&mut Interpreter, &Dict) -> EvalResult<Value>;

/// A named host function; evaluating it runs the function in the current
/// environment.
pub struct NativeFn {
    pub name: Rc<str>,
    pub func: NativeFnPtr,
}

/// An opaque host object carried through scripts.
///
/// Scripts cannot look inside; the host recognizes its own objects through
/// `as_any`. Objects that return a record from `freeze` can be persisted and
/// are rebuilt by the defroster registered under the record's `native` tag
/// (defaulting to `type_tag`).
pub trait NativeObject {
    fn type_tag(&self) -> &str;

    fn freeze(&self) -> Option<Dict> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone)]
pub enum Native {
    Func(Rc<NativeFn>),
    Object(Rc<dyn NativeObject>),
}

impl Native {
    pub fn func(name: &str, func: NativeFnPtr) -> Self {
        Native::Func(Rc::new(NativeFn {
            name: Rc::from(name),
            func,
        }))
    }

    pub fn object<T: NativeObject + 'static>(obj: T) -> Self {
        Native::Object(Rc::new(obj))
    }

    pub fn type_tag(&self) -> &str {
        match self {
            Native::Func(_) => "native-fn",
            Native::Object(obj) => obj.type_tag(),
        }
    }

    /// Downcast an object to the host type `T`.
    pub fn downcast<T: 'static>(&self) -> Option<&T> {
        match self {
            Native::Object(obj) => obj.as_any().downcast_ref::<T>(),
            Native::Func(_) => None,
        }
    }

    pub fn ptr_eq(&self, other: &Native) -> bool {
        self.addr() == other.addr()
    }

    /// Identity key, stable while any clone is alive.
    pub fn addr(&self) -> usize {
        match self {
            Native::Func(f) => Rc::as_ptr(f) as *const () as usize,
            Native::Object(o) => Rc::as_ptr(o) as *const () as usize,
        }
    }
}
