//! Runtime errors for the interpreter

use super::env::Dict;
use super::print;
use std::fmt;

/// Runtime error during evaluation, freezing or thawing
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    /// Rendered call-frame chain, innermost first
    pub stack: Option<String>,
}

/// Kinds of runtime errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Symbol not bound anywhere along the scope chain
    UnboundIdentifier,
    /// Wrong variant at a required position
    TypeMismatch,
    /// Too many positional arguments, or a form with the wrong shape
    ArityMismatch,
    /// A dictionary would become its own ancestor
    CycleError,
    /// Thaw met a `native` tag with no defroster
    UnregisteredNativeTag,
    /// A defroster tag was registered twice
    DuplicateNativeRegistration,
    /// Nesting exceeded the configured depth
    StackExhaustion,
    /// Token stream is truncated or contains an unknown token
    MalformedFrozen,
}

impl RuntimeError {
    fn new(kind: ErrorKind, message: String) -> Self {
        RuntimeError {
            kind,
            message,
            stack: None,
        }
    }

    pub fn unbound(name: &str, suggestion: Option<&str>) -> Self {
        let message = match suggestion {
            Some(s) => format!("unbound identifier {name} (did you mean `{s}`?)"),
            None => format!("unbound identifier {name}"),
        };
        Self::new(ErrorKind::UnboundIdentifier, message)
    }

    pub fn type_error(expected: &str, got: &str) -> Self {
        Self::new(
            ErrorKind::TypeMismatch,
            format!("type error: expected {expected}, got {got}"),
        )
    }

    /// Type mismatch with a free-form message.
    pub fn mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message.into())
    }

    pub fn arity_mismatch(name: &str, expected: usize, got: usize) -> Self {
        Self::new(
            ErrorKind::ArityMismatch,
            format!("{name} expects {expected} argument(s), got {got}"),
        )
    }

    pub fn cycle(name: &str) -> Self {
        Self::new(
            ErrorKind::CycleError,
            format!("dictionary {name} cannot become its own ancestor"),
        )
    }

    pub fn unregistered_native(tag: &str) -> Self {
        Self::new(
            ErrorKind::UnregisteredNativeTag,
            format!("no defroster registered for native tag `{tag}`"),
        )
    }

    pub fn duplicate_native(tag: &str) -> Self {
        Self::new(
            ErrorKind::DuplicateNativeRegistration,
            format!("initialization failure: defroster `{tag}` registered multiple times"),
        )
    }

    pub fn stack_exhaustion(limit: usize) -> Self {
        Self::new(
            ErrorKind::StackExhaustion,
            format!("stack exhausted: nesting deeper than {limit}"),
        )
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::MalformedFrozen,
            format!("malformed frozen data: {}", message.into()),
        )
    }

    /// Attach a dump of the frame chain active at `env`, unless one is
    /// already attached closer to the failure.
    pub fn at(mut self, env: &Dict) -> Self {
        if self.stack.is_none() {
            self.stack = Some(print::frame_dump(env));
        }
        self
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(stack) = &self.stack {
            write!(f, "\n{stack}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

/// Result type for runtime operations
pub type EvalResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::value::Value;

    #[test]
    fn test_unbound_message() {
        let err = RuntimeError::unbound("foo", None);
        assert_eq!(err.kind, ErrorKind::UnboundIdentifier);
        assert_eq!(err.message, "unbound identifier foo");
    }

    #[test]
    fn test_unbound_with_suggestion() {
        let err = RuntimeError::unbound("fo", Some("foo"));
        assert!(err.message.contains("did you mean `foo`?"));
    }

    #[test]
    fn test_type_error_message_format() {
        let err = RuntimeError::type_error("boolean", "number");
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
        assert_eq!(err.message, "type error: expected boolean, got number");
    }

    #[test]
    fn test_arity_mismatch_message_format() {
        let err = RuntimeError::arity_mismatch("add", 2, 3);
        assert_eq!(err.message, "add expects 2 argument(s), got 3");
    }

    #[test]
    fn test_duplicate_native() {
        let err = RuntimeError::duplicate_native("Env");
        assert_eq!(err.kind, ErrorKind::DuplicateNativeRegistration);
        assert!(err.message.contains("Env"));
    }

    #[test]
    fn test_display_without_stack() {
        let err = RuntimeError::malformed("unexpected end");
        assert_eq!(err.to_string(), "malformed frozen data: unexpected end");
    }

    #[test]
    fn test_at_keeps_innermost_stack() {
        let inner = Dict::new();
        inner.set_name(Some("inner".into()));
        inner.define("x", Value::Num(1.0)).unwrap();
        let outer = Dict::new();
        outer.set_name(Some("outer".into()));

        let err = RuntimeError::stack_exhaustion(10).at(&inner).at(&outer);
        let stack = err.stack.clone().unwrap();
        assert!(stack.contains("inner"));
        assert!(!stack.contains("outer"));
        assert!(err.to_string().contains("x: 1"));
    }

    #[test]
    fn test_error_is_std_error() {
        let err = RuntimeError::cycle("d");
        let std_err: &dyn std::error::Error = &err;
        assert!(std_err.source().is_none());
    }
}
