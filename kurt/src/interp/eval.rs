//! Expression evaluator
//!
//! `eval` is a single recursive walk over the value tree. Lists are either
//! special forms (matched on their literal head symbol, see `forms`) or
//! applications, which come in two shapes:
//!
//! * `[dict expr]` evaluates `expr` inside `dict`. A symbol result reads the
//!   field of that name (method access); a block result is invoked with the
//!   dictionary's names as its arguments.
//! * `[block arg...]` binds `arg...` positionally into a fresh frame and then
//!   takes the first path with that frame as the dictionary.

use super::builtins;
use super::env::{Dict, SELF};
use super::error::{EvalResult, RuntimeError};
use super::forms;
use super::native::{Native, NativeFnPtr};
use super::value::{Block, List, REST_PREFIX, Value};
use crate::config::Config;
use crate::util::{SUGGESTION_THRESHOLD, find_similar_name};
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Name that always evaluates to the active environment.
pub const ENV: &str = "env";

/// The interpreter
pub struct Interpreter {
    /// Root environment holding the builtins
    root: Dict,
    /// Current application depth
    depth: usize,
    config: Config,
}

impl Interpreter {
    /// Create a new interpreter with default limits
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let root = Dict::new();
        root.set_name(Some(Rc::from("root")));
        root.set_tag("root");
        let mut interp = Interpreter {
            root,
            depth: 0,
            config,
        };
        builtins::install(&mut interp);
        interp
    }

    pub fn root(&self) -> &Dict {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Install a host function as a block in the root environment.
    ///
    /// The function receives the call frame; parameters are read from it
    /// by name.
    pub fn define_native(&mut self, name: &str, params: &[&str], func: NativeFnPtr) {
        let block = Block {
            name: Some(Rc::from(name)),
            params: params.iter().map(|p| Rc::from(*p)).collect(),
            body: vec![Value::Native(Native::func(name, func))],
            env: Dict::new(),
            receiver: None,
        };
        // Plain names never fail to define.
        let _ = self.root.define(name, Value::block(block));
    }

    /// Evaluate `expr` in the root environment.
    ///
    /// This is the host boundary: errors escaping here are logged with their
    /// frame dump before being returned.
    pub fn evaluate(&mut self, expr: &Value) -> EvalResult<Value> {
        let root = self.root.clone();
        self.evaluate_in(expr, &root)
    }

    /// Evaluate `expr` in `env` as a host-level call.
    pub fn evaluate_in(&mut self, expr: &Value, env: &Dict) -> EvalResult<Value> {
        self.eval(expr, env).inspect_err(|err| {
            warn!(kind = ?err.kind, stack = err.stack.as_deref().unwrap_or(""), "{}", err.message);
        })
    }

    /// Evaluate an expression with automatic stack growth for deep recursion
    pub fn eval(&mut self, expr: &Value, env: &Dict) -> EvalResult<Value> {
        let (red_zone, grow_size) = (self.config.stack_red_zone, self.config.stack_grow_size);
        stacker::maybe_grow(red_zone, grow_size, || self.eval_inner(expr, env))
    }

    fn eval_inner(&mut self, expr: &Value, env: &Dict) -> EvalResult<Value> {
        trace!(expr = %expr, "eval");
        match expr {
            Value::Nil | Value::Num(_) | Value::Bool(_) | Value::Str(_) => Ok(expr.clone()),
            Value::Sym(name) => self.eval_symbol(name, env),
            Value::Quote(inner) => Ok((**inner).clone()),
            Value::FullQuote(_) => Ok(expr.clone()),
            Value::Block(_) => Ok(expr.clone()),
            Value::Dict(literal) => self.eval_dict_literal(literal, env),
            Value::List(list) => self.eval_list(list, env),
            Value::Native(Native::Func(func)) => (func.func)(self, env),
            Value::Native(Native::Object(_)) => Ok(expr.clone()),
        }
    }

    /// Evaluate each expression in order; the result is the last one.
    pub fn eval_body(&mut self, body: &[Value], env: &Dict) -> EvalResult<Value> {
        let mut result = Value::Nil;
        for expr in body {
            result = self.eval(expr, env)?;
        }
        Ok(result)
    }

    fn eval_symbol(&self, name: &str, env: &Dict) -> EvalResult<Value> {
        if name == ENV {
            return Ok(Value::Dict(env.clone()));
        }
        match env.find(name) {
            Some(scope) => Ok(scope.get(name)),
            None => {
                let visible = env.visible_names();
                let suggestion = find_similar_name(
                    name,
                    visible.iter().map(String::as_str),
                    SUGGESTION_THRESHOLD,
                );
                Err(RuntimeError::unbound(name, suggestion).at(env))
            }
        }
    }

    /// Build a dictionary from a literal.
    ///
    /// A parent the literal declares is kept; otherwise the new dictionary
    /// inherits from the active scope. Values are evaluated with
    /// the new dictionary's earlier keys in view, and anonymous blocks take
    /// the name of their key.
    fn eval_dict_literal(&mut self, literal: &Dict, env: &Dict) -> EvalResult<Value> {
        let dict = Dict::new();
        match literal.declared_parent() {
            Some(parent) => dict.set_parent(Some(&parent))?,
            None => dict.attach(&env.anchor()),
        }
        let scope = Dict::tee(&dict, env);
        for name in literal.names() {
            let value = match self.eval(&literal.get(&name), &scope)? {
                Value::Block(block) if block.name.is_none() => {
                    Value::block(block.named(Rc::from(name.as_str())))
                }
                value => value,
            };
            dict.define(&name, value)?;
        }
        Ok(Value::Dict(dict))
    }

    fn eval_list(&mut self, list: &List, env: &Dict) -> EvalResult<Value> {
        let items = list.items();
        let Some(head) = items.first() else {
            return Ok(Value::Nil);
        };

        if let Some(block) = forms::block_literal(&items, env) {
            return Ok(Value::block(block));
        }
        if let Some(form) = head.as_sym().and_then(forms::lookup) {
            return form(self, &items[1..], env);
        }

        let args = &items[1..];
        let callee = self.eval(head, env)?;
        match callee {
            Value::Block(block) => self.call_positional(env, &block, args),
            Value::Dict(dict) if args.len() == 1 => self.apply_in_env(env, &dict, &args[0]),
            Value::List(list) if args.len() == 1 => self.index(&list, &args[0], env),
            other if args.is_empty() => Ok(other),
            other => Err(
                RuntimeError::mismatch(format!("cannot apply {}", other.type_name())).at(env),
            ),
        }
    }

    /// `[xs n]`; `n` may also evaluate to a numeric symbol, as in `[xs :1]`.
    fn index(&mut self, list: &List, index: &Value, env: &Dict) -> EvalResult<Value> {
        let n = match self.eval(index, env)? {
            Value::Num(n) => n,
            Value::Sym(s) => s
                .parse::<f64>()
                .map_err(|_| RuntimeError::type_error("number", "symbol").at(env))?,
            other => return Err(RuntimeError::type_error("number", other.type_name()).at(env)),
        };
        if n < 0.0 || n.fract() != 0.0 {
            return Ok(Value::Nil);
        }
        Ok(list.get(n as usize).unwrap_or(Value::Nil))
    }

    /// Call `block` with already-evaluated arguments.
    pub fn call_block(&mut self, env: &Dict, block: &Rc<Block>, args: Vec<Value>) -> EvalResult<Value> {
        let args: Vec<Value> = args.into_iter().map(Value::quote).collect();
        self.call_positional(env, block, &args)
    }

    fn call_positional(&mut self, env: &Dict, block: &Rc<Block>, args: &[Value]) -> EvalResult<Value> {
        let frame = self.bind_args(env, block, args)?;
        self.apply_in_env(env, &frame, &Value::Block(block.clone()))
    }

    /// Evaluate `args` at the call site and bind them to `block`'s
    /// parameters in a new frame.
    fn bind_args(&mut self, env: &Dict, block: &Block, args: &[Value]) -> EvalResult<Dict> {
        let fixed = block.fixed_arity();
        if args.len() > fixed && !block.has_rest() {
            return Err(RuntimeError::arity_mismatch(block.display_name(), fixed, args.len()).at(env));
        }

        let frame = Dict::frame(env, env, block.name.clone());
        let mut args = args.iter();
        for param in &block.params {
            if let Some(rest) = param.strip_prefix(REST_PREFIX) {
                let collected = List::default();
                for arg in args.by_ref() {
                    collected.push(self.eval(arg, env)?);
                }
                frame.define(rest, Value::List(collected))?;
                break;
            }
            // Missing arguments leave the parameter unbound.
            let Some(arg) = args.next() else { break };
            let value = self.eval(arg, env)?;
            frame.define(param, value)?;
        }
        Ok(frame)
    }

    /// Evaluate `target` inside `arg_env`.
    ///
    /// A symbol result is looked up as a field of `arg_env`; a block result
    /// is invoked with `arg_env`'s names as arguments. Anything else is the
    /// result as is.
    pub fn apply_in_env(&mut self, env: &Dict, arg_env: &Dict, target: &Value) -> EvalResult<Value> {
        let scope = if arg_env.parent().is_some() {
            arg_env.clone()
        } else {
            Dict::tee(arg_env, env)
        };
        match self.eval(target, &scope)? {
            Value::Sym(name) => field(arg_env, &name, env),
            Value::Block(block) => self.invoke(env, arg_env, &block),
            other => Ok(other),
        }
    }

    fn invoke(&mut self, env: &Dict, arg_env: &Dict, block: &Rc<Block>) -> EvalResult<Value> {
        let lexical = match arg_env.get(ENV) {
            Value::Dict(over) if over.parent().is_some() => over,
            Value::Dict(over) => Dict::tee(&over, env),
            _ => block.env.clone(),
        };
        let frame = Dict::frame(&lexical, env, block.name.clone());
        for name in arg_env.names() {
            if name != ENV {
                frame.define(&name, arg_env.get(&name))?;
            }
        }
        if let Some(receiver) = &block.receiver {
            frame.define(SELF, Value::Dict(receiver.clone()))?;
        }

        self.depth += 1;
        if self.depth > self.config.max_depth {
            self.depth -= 1;
            return Err(RuntimeError::stack_exhaustion(self.config.max_depth).at(&frame));
        }
        debug!(block = block.display_name(), depth = self.depth, "apply");
        let result = self.eval_body(&block.body, &frame);
        self.depth -= 1;
        result.map_err(|err| err.at(&frame))
    }
}

/// Field access through the prototype chain. Blocks come back bound to the
/// dictionary they were found through; a missing field is unbound.
fn field(dict: &Dict, name: &Rc<str>, env: &Dict) -> EvalResult<Value> {
    let Some(owner) = dict.find(name) else {
        let visible = dict.visible_names();
        let suggestion =
            find_similar_name(name, visible.iter().map(String::as_str), SUGGESTION_THRESHOLD);
        return Err(RuntimeError::unbound(name, suggestion).at(env));
    };
    match owner.get(name) {
        Value::Block(block) => Ok(Value::block(block.bind(name.clone(), dict.clone()))),
        other => Ok(other),
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
