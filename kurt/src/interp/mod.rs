//! Runtime for kurt scripts
//!
//! Scripts arrive as `Value` trees (built by a host reader or thawed from a
//! frozen token stream) and are evaluated against a root `Dict`.

pub mod builtins;
mod env;
mod error;
mod eval;
pub mod forms;
mod native;
pub mod print;
mod value;

pub use env::{CALLER, Dict, PARENT, SELF, canonical};
pub use error::{ErrorKind, EvalResult, RuntimeError};
pub use eval::{ENV, Interpreter};
pub use native::{Native, NativeFn, NativeFnPtr, NativeObject};
pub use value::{BLOCK_BAR, Block, List, REST_PREFIX, Value, eq};
