//! Multi-definition action dispatch
//!
//! An action name maps to an ordered list of definitions, each guarded by the
//! argument names it requires. Calling a name evaluates the arguments once,
//! then runs every definition whose required names are all present, in
//! registration order. The result is that of the last definition run, or
//! `nil` when none matched.
//!
//! Names in action bodies read the frame stack outermost first, and a name
//! bound nowhere reads as `nil`.

mod stack;

pub use stack::FrameStack;

use crate::config::{DEFAULT_STACK_GROW_SIZE, DEFAULT_STACK_RED_ZONE};
use crate::interp::{Dict, EvalResult, List, RuntimeError, Value};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use std::rc::Rc;
use tracing::{debug, trace};

/// Host implementation of an action, given the host context and the
/// evaluated argument frame.
pub type NativeAction<C> = Rc<dyn Fn(&mut C, &Dict) -> EvalResult<Value>>;

pub enum Implementation<C> {
    Native(NativeAction<C>),
    /// Expressions evaluated in order with the argument frame pushed
    Body(Vec<Value>),
}

pub struct Definition<C> {
    pub required: Vec<String>,
    pub implementation: Implementation<C>,
}

impl<C> Definition<C> {
    fn matches(&self, frame: &Dict) -> bool {
        self.required.iter().all(|name| frame.exists(name))
    }
}

/// Action registry over a host context `C`.
pub struct Actions<C> {
    definitions: IndexMap<String, Vec<Rc<Definition<C>>>, FxBuildHasher>,
    stack: FrameStack,
}

impl<C> Default for Actions<C> {
    fn default() -> Self {
        Actions {
            definitions: IndexMap::default(),
            stack: FrameStack::new(),
        }
    }
}

impl<C> Actions<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a definition for `name`.
    pub fn define(&mut self, name: &str, required: &[&str], implementation: Implementation<C>) {
        let definition = Definition {
            required: required.iter().map(|r| r.to_string()).collect(),
            implementation,
        };
        self.definitions
            .entry(name.to_string())
            .or_default()
            .push(Rc::new(definition));
    }

    pub fn define_native<F>(&mut self, name: &str, required: &[&str], f: F)
    where
        F: Fn(&mut C, &Dict) -> EvalResult<Value> + 'static,
    {
        self.define(name, required, Implementation::Native(Rc::new(f)));
    }

    pub fn define_body(&mut self, name: &str, required: &[&str], body: Vec<Value>) {
        self.define(name, required, Implementation::Body(body));
    }

    /// Number of definitions registered under `name`
    pub fn count(&self, name: &str) -> usize {
        self.definitions.get(name).map_or(0, Vec::len)
    }

    /// Registered names in first-registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn stack(&self) -> &FrameStack {
        &self.stack
    }

    /// Evaluate `args` and dispatch `name` with them.
    #[tracing::instrument(level = "debug", skip_all, fields(action = name))]
    pub fn call(&mut self, ctx: &mut C, name: &str, args: &Dict) -> EvalResult<Value> {
        let frame = Dict::new();
        for arg in args.names() {
            let value = self.eval(ctx, &args.get(&arg))?;
            frame.define(&arg, value)?;
        }
        self.dispatch(ctx, name, &frame)
    }

    fn dispatch(&mut self, ctx: &mut C, name: &str, frame: &Dict) -> EvalResult<Value> {
        // Definitions may register more definitions while running.
        let definitions = self.definitions.get(name).cloned().unwrap_or_default();
        let mut result = Value::Nil;
        let mut ran = 0;
        for definition in definitions.iter().filter(|d| d.matches(frame)) {
            result = self.run(ctx, definition, frame)?;
            ran += 1;
        }
        debug!(action = name, defined = definitions.len(), ran, "dispatched");
        Ok(result)
    }

    fn run(&mut self, ctx: &mut C, definition: &Definition<C>, frame: &Dict) -> EvalResult<Value> {
        match &definition.implementation {
            Implementation::Native(f) => f(ctx, frame),
            Implementation::Body(body) => {
                self.stack.push(frame.clone());
                let result = self.eval_body(ctx, body);
                self.stack.pop();
                result
            }
        }
    }

    fn eval_body(&mut self, ctx: &mut C, body: &[Value]) -> EvalResult<Value> {
        let mut result = Value::Nil;
        for expr in body {
            result = self.eval(ctx, expr)?;
        }
        Ok(result)
    }

    /// Evaluate an action expression against the frame stack.
    pub fn eval(&mut self, ctx: &mut C, expr: &Value) -> EvalResult<Value> {
        stacker::maybe_grow(DEFAULT_STACK_RED_ZONE, DEFAULT_STACK_GROW_SIZE, || {
            self.eval_inner(ctx, expr)
        })
    }

    fn eval_inner(&mut self, ctx: &mut C, expr: &Value) -> EvalResult<Value> {
        match expr {
            Value::Sym(name) => Ok(self.lookup(name)),
            Value::Quote(inner) => Ok((**inner).clone()),
            Value::List(list) => self.eval_list(ctx, list),
            other => Ok(other.clone()),
        }
    }

    fn lookup(&self, name: &str) -> Value {
        self.stack.get(name).unwrap_or_else(|| {
            trace!(name, depth = self.stack.depth(), "unbound action name");
            Value::Nil
        })
    }

    fn eval_list(&mut self, ctx: &mut C, list: &List) -> EvalResult<Value> {
        let items = list.items();
        let Some(head) = items.first().and_then(Value::as_sym) else {
            return Ok(Value::List(list.clone()));
        };
        match (head, &items[1..]) {
            ("get", [name]) => Ok(self.lookup(&name_of(name)?)),
            ("let", [Value::Dict(bindings), body @ ..]) => {
                let frame = Dict::new();
                for name in bindings.names() {
                    let value = self.eval(ctx, &bindings.get(&name))?;
                    frame.define(&name, value)?;
                }
                self.stack.push(frame);
                let result = self.eval_body(ctx, body);
                self.stack.pop();
                result.map(|_| Value::Nil)
            }
            ("def", [name, Value::List(required), body @ ..]) => {
                let name = name_of(name)?;
                let required = required
                    .items()
                    .iter()
                    .map(name_of)
                    .collect::<EvalResult<Vec<Rc<str>>>>()?;
                let required: Vec<&str> = required.iter().map(|r| &**r).collect();
                self.define_body(&name, &required, body.to_vec());
                Ok(Value::Nil)
            }
            (name, [Value::Dict(args)]) => self.call(ctx, name, args),
            (name, []) => self.call(ctx, name, &Dict::new()),
            _ => Ok(Value::List(list.clone())),
        }
    }
}

/// A name written as a symbol or a quoted symbol.
fn name_of(value: &Value) -> EvalResult<Rc<str>> {
    match value {
        Value::Sym(name) => Ok(name.clone()),
        Value::Quote(inner) => name_of(inner),
        other => Err(RuntimeError::type_error("symbol", other.type_name())),
    }
}
