//! Runtime values for the interpreter
//!
//! Scripts and their results share one representation: the reader hands the
//! runtime a `Value` tree, and evaluating that tree produces more `Value`s.
//! Lists double as call expressions, dictionaries as scopes.

use super::env::Dict;
use super::native::Native;
use rustc_hash::FxHashSet;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Marks a block parameter that collects all remaining positional arguments.
pub const REST_PREFIX: &str = "...";

/// Separates a block literal's parameters from its body: `[x y | body]`.
pub const BLOCK_BAR: &str = "|";

/// Runtime value
#[derive(Clone)]
pub enum Value {
    /// Absence of a value; distinct from `false`
    Nil,
    Num(f64),
    Bool(bool),
    Str(Rc<str>),
    /// Identifier, compared by name
    Sym(Rc<str>),
    /// `:expr`, evaluates to `expr` without evaluating it
    Quote(Rc<Value>),
    /// Inert data; evaluates to itself and is never re-attached to a scope
    FullQuote(Rc<Value>),
    List(List),
    Dict(Dict),
    Block(Rc<Block>),
    Native(Native),
}

/// Shared, mutable sequence of values.
///
/// Lists have reference identity: clones alias the same storage.
#[derive(Clone, Default)]
pub struct List(Rc<RefCell<Vec<Value>>>);

impl List {
    pub fn new(items: Vec<Value>) -> Self {
        List(Rc::new(RefCell::new(items)))
    }

    /// Snapshot of the current elements.
    pub fn items(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    pub fn push(&self, value: Value) {
        self.0.borrow_mut().push(value);
    }

    pub fn ptr_eq(&self, other: &List) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Identity key, stable while any clone is alive.
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

/// A closure.
pub struct Block {
    /// Diagnostic name, set when the block is reached through a named field
    pub name: Option<Rc<str>>,
    pub params: Vec<Rc<str>>,
    pub body: Vec<Value>,
    /// Defining (lexical) environment
    pub env: Dict,
    /// Dictionary the block was retrieved through, bound as `self` on call
    pub receiver: Option<Dict>,
}

impl Block {
    pub fn new(params: Vec<Rc<str>>, body: Vec<Value>, env: Dict) -> Self {
        Block {
            name: None,
            params,
            body,
            env,
            receiver: None,
        }
    }

    /// Copy of this block carrying a diagnostic name.
    pub fn named(&self, name: Rc<str>) -> Self {
        Block {
            name: Some(name),
            params: self.params.clone(),
            body: self.body.clone(),
            env: self.env.clone(),
            receiver: self.receiver.clone(),
        }
    }

    /// Copy of this block bound to `receiver` under `name`.
    pub fn bind(&self, name: Rc<str>, receiver: Dict) -> Self {
        Block {
            name: Some(name),
            params: self.params.clone(),
            body: self.body.clone(),
            env: self.env.clone(),
            receiver: Some(receiver),
        }
    }

    /// Number of parameters that bind exactly one argument.
    pub fn fixed_arity(&self) -> usize {
        self.params
            .iter()
            .take_while(|p| !p.starts_with(REST_PREFIX))
            .count()
    }

    pub fn has_rest(&self) -> bool {
        self.params.iter().any(|p| p.starts_with(REST_PREFIX))
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<block>")
    }
}

impl Value {
    pub fn num(n: f64) -> Self {
        Value::Num(n)
    }

    pub fn str(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn sym(name: &str) -> Self {
        Value::Sym(Rc::from(name))
    }

    pub fn quote(inner: Value) -> Self {
        Value::Quote(Rc::new(inner))
    }

    pub fn full_quote(inner: Value) -> Self {
        Value::FullQuote(Rc::new(inner))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(List::new(items))
    }

    pub fn block(block: Block) -> Self {
        Value::Block(Rc::new(block))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    pub fn is_dict(&self) -> bool {
        matches!(self, Value::Dict(_))
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Value::Block(_))
    }

    pub fn is_quote(&self) -> bool {
        matches!(self, Value::Quote(_) | Value::FullQuote(_))
    }

    pub fn is_sym(&self) -> bool {
        matches!(self, Value::Sym(_))
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sym(&self) -> Option<&str> {
        match self {
            Value::Sym(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&Rc<Block>> {
        match self {
            Value::Block(b) => Some(b),
            _ => None,
        }
    }

    /// Get type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Num(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::Sym(_) => "symbol",
            Value::Quote(_) => "quote",
            Value::FullQuote(_) => "full-quote",
            Value::List(_) => "list",
            Value::Dict(_) => "dictionary",
            Value::Block(_) => "block",
            Value::Native(_) => "native",
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<Dict> for Value {
    fn from(d: Dict) -> Self {
        Value::Dict(d)
    }
}

impl From<List> for Value {
    fn from(l: List) -> Self {
        Value::List(l)
    }
}

/// Structural equality.
///
/// Lists compare element-wise, dictionaries by their non-reserved keys,
/// blocks by body and parameters plus the *identity* of their defining
/// environment. Pairs already under comparison are assumed equal, so cyclic
/// graphs terminate.
pub fn eq(a: &Value, b: &Value) -> bool {
    Equality::default().eq(a, b)
}

#[derive(Default)]
struct Equality {
    in_progress: FxHashSet<(usize, usize)>,
}

impl Equality {
    fn eq(&mut self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Nil, Value::Nil) => true,
            (Value::Num(x), Value::Num(y)) => x == y,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Str(x), Value::Str(y)) => x == y,
            (Value::Sym(x), Value::Sym(y)) => x == y,
            (Value::Quote(x), Value::Quote(y)) => self.eq(x, y),
            (Value::FullQuote(x), Value::FullQuote(y)) => self.eq(x, y),
            (Value::List(x), Value::List(y)) => {
                if x.ptr_eq(y) || !self.enter(x.addr(), y.addr()) {
                    return true;
                }
                let (xs, ys) = (x.items(), y.items());
                xs.len() == ys.len() && xs.iter().zip(&ys).all(|(p, q)| self.eq(p, q))
            }
            (Value::Dict(x), Value::Dict(y)) => {
                if x.ptr_eq(y) || !self.enter(x.addr(), y.addr()) {
                    return true;
                }
                let names = x.names();
                if names.len() != y.len() {
                    return false;
                }
                names
                    .iter()
                    .all(|name| y.exists(name) && self.eq(&x.get(name), &y.get(name)))
            }
            (Value::Block(x), Value::Block(y)) => {
                Rc::ptr_eq(x, y)
                    || (x.params == y.params
                        && x.env.ptr_eq(&y.env)
                        && x.body.len() == y.body.len()
                        && x.body.iter().zip(&y.body).all(|(p, q)| self.eq(p, q)))
            }
            (Value::Native(x), Value::Native(y)) => x.ptr_eq(y),
            _ => false,
        }
    }

    /// Returns false if this pair is already being compared further up.
    fn enter(&mut self, a: usize, b: usize) -> bool {
        self.in_progress.insert((a, b))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        eq(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::List(self.clone()))
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}
