//! Freezing value graphs to a flat token stream, and thawing them back
//!
//! The stream is a JSON array read left to right:
//!
//! | Token | Meaning |
//! |---|---|
//! | `null`, `true`, `false`, number | themselves |
//! | `"'text"` | string |
//! | `"$name"` | symbol |
//! | `":"` v | quote |
//! | `"\\"` v | full quote |
//! | `"["` v... `"]"` | list |
//! | `"{"` (`"'key"` v)... `"}"` | dictionary |
//! | `"("` name params env body `")"` | block |
//! | `"&N"` | the N-th list, dictionary or native opened so far |
//!
//! Shared and cyclic structure survives a round trip because every list and
//! dictionary is numbered in the order it is opened, on both sides.

mod registry;

pub use registry::{
    Defroster, NATIVE, NATIVE_FN_TAG, ROOT_TAG, ThawContext, is_registered, register_defroster,
};

use crate::config::{DEFAULT_STACK_GROW_SIZE, DEFAULT_STACK_RED_ZONE};
use crate::interp::{Block, Dict, EvalResult, List, Native, RuntimeError, Value};
use rustc_hash::FxHashMap;
use serde_json::Value as Json;
use std::rc::Rc;
use tracing::debug;

const QUOTE: &str = ":";
const FULL_QUOTE: &str = "\\";
const LIST_OPEN: &str = "[";
const LIST_CLOSE: &str = "]";
const DICT_OPEN: &str = "{";
const DICT_CLOSE: &str = "}";
const BLOCK_OPEN: &str = "(";
const BLOCK_CLOSE: &str = ")";

const STR_PREFIX: char = '\'';
const SYM_PREFIX: char = '$';
const REF_PREFIX: char = '&';

/// Largest integer magnitude a double represents exactly
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Freeze `value` into a token stream.
pub fn freeze(value: &Value) -> EvalResult<Json> {
    let mut encoder = Encoder::default();
    encoder.encode(value)?;
    debug!(tokens = encoder.out.len(), objects = encoder.next_id, "freeze");
    Ok(Json::Array(encoder.out))
}

pub fn freeze_to_string(value: &Value) -> EvalResult<String> {
    Ok(freeze(value)?.to_string())
}

/// Rebuild a value from a token stream.
///
/// Dictionaries are parented to `scope` unless they sit under a full quote.
pub fn thaw(frozen: &Json, scope: Option<&Dict>) -> EvalResult<Value> {
    let Json::Array(tokens) = frozen else {
        return Err(RuntimeError::malformed("expected a token array"));
    };
    let mut decoder = Decoder {
        tokens: tokens.as_slice(),
        pos: 0,
        table: Vec::new(),
        ctx: ThawContext {
            scope: scope.cloned(),
        },
        inert: 0,
    };
    let value = decoder.decode()?;
    if decoder.pos != tokens.len() {
        return Err(RuntimeError::malformed(format!(
            "{} trailing token(s)",
            tokens.len() - decoder.pos
        )));
    }
    debug!(tokens = tokens.len(), objects = decoder.table.len(), "thaw");
    Ok(value)
}

pub fn thaw_str(text: &str, scope: Option<&Dict>) -> EvalResult<Value> {
    let frozen: Json =
        serde_json::from_str(text).map_err(|e| RuntimeError::malformed(e.to_string()))?;
    thaw(&frozen, scope)
}

#[derive(Default)]
struct Encoder {
    out: Vec<Json>,
    /// Object address to id, for this freeze only
    ids: FxHashMap<usize, usize>,
    next_id: usize,
    /// Records built during this freeze; held so their addresses stay unique
    records: Vec<Dict>,
}

impl Encoder {
    fn marker(&mut self, marker: &str) {
        self.out.push(Json::String(marker.to_string()));
    }

    fn string(&mut self, prefix: char, text: &str) {
        self.out.push(Json::String(format!("{prefix}{text}")));
    }

    /// Number a freshly opened list or dictionary.
    fn open(&mut self, marker: &str) {
        self.next_id += 1;
        self.marker(marker);
    }

    /// Emit a back-reference if `addr` was seen; otherwise number it.
    fn visit(&mut self, addr: usize) -> bool {
        if let Some(id) = self.ids.get(&addr) {
            self.string(REF_PREFIX, &id.to_string());
            return true;
        }
        self.ids.insert(addr, self.next_id);
        false
    }

    fn encode(&mut self, value: &Value) -> EvalResult<()> {
        stacker::maybe_grow(DEFAULT_STACK_RED_ZONE, DEFAULT_STACK_GROW_SIZE, || {
            self.encode_value(value)
        })
    }

    fn encode_value(&mut self, value: &Value) -> EvalResult<()> {
        match value {
            Value::Nil => self.out.push(Json::Null),
            Value::Bool(b) => self.out.push(Json::Bool(*b)),
            Value::Num(n) => self.out.push(number(*n)?),
            Value::Str(s) => self.string(STR_PREFIX, s),
            Value::Sym(s) => self.string(SYM_PREFIX, s),
            Value::Quote(inner) => {
                self.marker(QUOTE);
                self.encode(inner)?;
            }
            Value::FullQuote(inner) => {
                self.marker(FULL_QUOTE);
                self.encode(inner)?;
            }
            Value::List(list) => {
                if !self.visit(list.addr()) {
                    self.encode_seq(&list.items())?;
                }
            }
            Value::Dict(dict) => self.encode_dict(dict)?,
            Value::Block(block) => self.encode_block(block)?,
            Value::Native(native) => self.encode_native(native)?,
        }
        Ok(())
    }

    fn encode_seq(&mut self, items: &[Value]) -> EvalResult<()> {
        self.open(LIST_OPEN);
        for item in items {
            self.encode(item)?;
        }
        self.marker(LIST_CLOSE);
        Ok(())
    }

    fn encode_dict(&mut self, dict: &Dict) -> EvalResult<()> {
        let dict = dict.tee_target();
        if self.visit(dict.addr()) {
            return Ok(());
        }
        match dict.tag() {
            Some(tag) => self.encode_entries(&Dict::from_pairs([(NATIVE, Value::Str(tag))])?),
            None => self.encode_entries(&dict),
        }
    }

    fn encode_entries(&mut self, dict: &Dict) -> EvalResult<()> {
        self.open(DICT_OPEN);
        for name in dict.names() {
            self.string(STR_PREFIX, &name);
            self.encode(&dict.get(&name))?;
        }
        self.marker(DICT_CLOSE);
        Ok(())
    }

    fn encode_block(&mut self, block: &Block) -> EvalResult<()> {
        self.marker(BLOCK_OPEN);
        match &block.name {
            Some(name) => self.string(STR_PREFIX, name),
            None => self.out.push(Json::Null),
        }
        let params: Vec<Value> = block.params.iter().map(|p| Value::Sym(p.clone())).collect();
        self.encode_seq(&params)?;
        self.encode_dict(&block.env)?;
        self.encode_seq(&block.body)?;
        self.marker(BLOCK_CLOSE);
        Ok(())
    }

    /// Natives freeze as their defroster record, numbered as the native.
    fn encode_native(&mut self, native: &Native) -> EvalResult<()> {
        if self.visit(native.addr()) {
            return Ok(());
        }
        let record = match native {
            Native::Func(func) => Dict::from_pairs([
                (NATIVE, Value::str(NATIVE_FN_TAG)),
                ("name", Value::Str(func.name.clone())),
            ])?,
            Native::Object(object) => {
                let record = object.freeze().ok_or_else(|| {
                    RuntimeError::mismatch(format!("cannot freeze native {}", object.type_tag()))
                })?;
                if !record.exists(NATIVE) {
                    record.define(NATIVE, Value::str(object.type_tag()))?;
                }
                record
            }
        };
        self.encode_entries(&record)?;
        self.records.push(record);
        Ok(())
    }
}

fn number(n: f64) -> EvalResult<Json> {
    if !n.is_finite() {
        return Err(RuntimeError::mismatch(format!("cannot freeze non-finite number {n}")));
    }
    if n.fract() == 0.0 && n.abs() <= MAX_EXACT_INT {
        return Ok(Json::from(n as i64));
    }
    serde_json::Number::from_f64(n)
        .map(Json::Number)
        .ok_or_else(|| RuntimeError::mismatch(format!("cannot freeze number {n}")))
}

struct Decoder<'a> {
    tokens: &'a [Json],
    pos: usize,
    /// Objects by id, in the order they were opened
    table: Vec<Value>,
    ctx: ThawContext,
    /// Nesting depth of full quotes around the cursor
    inert: usize,
}

impl<'a> Decoder<'a> {
    fn next(&mut self) -> EvalResult<&'a Json> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| RuntimeError::malformed("unexpected end of input"))?;
        self.pos += 1;
        Ok(token)
    }

    /// Consume `marker` if it is the next token.
    fn close(&mut self, marker: &str) -> EvalResult<bool> {
        match self.tokens.get(self.pos) {
            None => Err(RuntimeError::malformed(format!("missing `{marker}`"))),
            Some(Json::String(s)) if s == marker => {
                self.pos += 1;
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    fn expect(&mut self, marker: &str) -> EvalResult<()> {
        if self.close(marker)? {
            Ok(())
        } else {
            Err(RuntimeError::malformed(format!("expected `{marker}`")))
        }
    }

    fn register(&mut self, value: Value) -> usize {
        self.table.push(value);
        self.table.len() - 1
    }

    fn decode(&mut self) -> EvalResult<Value> {
        stacker::maybe_grow(DEFAULT_STACK_RED_ZONE, DEFAULT_STACK_GROW_SIZE, || {
            self.decode_token()
        })
    }

    fn decode_token(&mut self) -> EvalResult<Value> {
        match self.next()? {
            Json::Null => Ok(Value::Nil),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => n
                .as_f64()
                .map(Value::Num)
                .ok_or_else(|| RuntimeError::malformed(format!("unrepresentable number {n}"))),
            Json::String(s) => self.decode_string(s),
            other => Err(RuntimeError::malformed(format!("unexpected token {other}"))),
        }
    }

    fn decode_string(&mut self, token: &str) -> EvalResult<Value> {
        if let Some(text) = token.strip_prefix(STR_PREFIX) {
            return Ok(Value::str(text));
        }
        if let Some(name) = token.strip_prefix(SYM_PREFIX) {
            return Ok(Value::sym(name));
        }
        if let Some(id) = token.strip_prefix(REF_PREFIX) {
            return id
                .parse::<usize>()
                .ok()
                .and_then(|id| self.table.get(id).cloned())
                .ok_or_else(|| RuntimeError::malformed(format!("dangling reference {token}")));
        }
        match token {
            QUOTE => Ok(Value::quote(self.decode()?)),
            FULL_QUOTE => {
                self.inert += 1;
                let inner = self.decode();
                self.inert -= 1;
                Ok(Value::full_quote(inner?))
            }
            LIST_OPEN => self.decode_list(),
            DICT_OPEN => self.decode_dict(),
            BLOCK_OPEN => self.decode_block(),
            other => Err(RuntimeError::malformed(format!("unknown token {other:?}"))),
        }
    }

    fn decode_list(&mut self) -> EvalResult<Value> {
        let list = List::default();
        self.register(Value::List(list.clone()));
        while !self.close(LIST_CLOSE)? {
            list.push(self.decode()?);
        }
        Ok(Value::List(list))
    }

    fn decode_dict(&mut self) -> EvalResult<Value> {
        let dict = Dict::new();
        if self.inert == 0 {
            if let Some(scope) = &self.ctx.scope {
                dict.attach(scope);
            }
        }
        let id = self.register(Value::Dict(dict.clone()));
        while !self.close(DICT_CLOSE)? {
            let key = match self.next()? {
                Json::String(s) if s.starts_with(STR_PREFIX) => &s[STR_PREFIX.len_utf8()..],
                other => return Err(RuntimeError::malformed(format!("expected a key, got {other}"))),
            };
            let value = self.decode()?;
            dict.define(key, value)?;
        }

        if !dict.exists(NATIVE) {
            return Ok(Value::Dict(dict));
        }
        let tag = match dict.get(NATIVE) {
            Value::Str(tag) => tag,
            other => return Err(RuntimeError::type_error("string", other.type_name())),
        };
        let value = registry::defrost(&tag, &dict, &self.ctx)?;
        self.table[id] = value.clone();
        Ok(value)
    }

    fn decode_block(&mut self) -> EvalResult<Value> {
        let name = match self.next()? {
            Json::Null => None,
            Json::String(s) if s.starts_with(STR_PREFIX) => {
                Some(Rc::from(&s[STR_PREFIX.len_utf8()..]))
            }
            other => return Err(RuntimeError::malformed(format!("bad block name {other}"))),
        };
        let params = match self.decode()? {
            Value::List(list) => list
                .items()
                .iter()
                .map(|p| p.as_sym().map(Rc::from))
                .collect::<Option<Vec<Rc<str>>>>()
                .ok_or_else(|| RuntimeError::malformed("block parameters must be symbols"))?,
            other => return Err(RuntimeError::malformed(format!("bad block parameters {other}"))),
        };
        let env = match self.decode()? {
            Value::Dict(env) => env,
            Value::Nil => self.ctx.scope.clone().unwrap_or_default(),
            other => return Err(RuntimeError::malformed(format!("bad block environment {other}"))),
        };
        let body = match self.decode()? {
            Value::List(list) => list.items(),
            other => return Err(RuntimeError::malformed(format!("bad block body {other}"))),
        };
        self.expect(BLOCK_CLOSE)?;
        Ok(Value::block(Block {
            name,
            params,
            body,
            env,
            receiver: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::{ErrorKind, Interpreter, NativeObject};
    use std::any::Any;

    fn num(n: f64) -> Value {
        Value::Num(n)
    }

    fn round_trip(value: &Value) -> Value {
        thaw(&freeze(value).unwrap(), None).unwrap()
    }

    #[test]
    fn test_token_shape() {
        let dict = Dict::from_pairs([("x", Value::Bool(true))]).unwrap();
        let value = Value::list(vec![
            num(1.0),
            Value::str("hi"),
            Value::quote(Value::sym("b")),
            Value::Dict(dict),
        ]);
        insta::assert_snapshot!(freeze_to_string(&value).unwrap(), @r#"["[",1,"'hi",":","$b","{","'x",true,"}","]"]"#);
    }

    #[test]
    fn test_fractional_numbers() {
        let frozen = freeze_to_string(&Value::list(vec![num(2.5), num(-3.0)])).unwrap();
        assert_eq!(frozen, r#"["[",2.5,-3,"]"]"#);
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = freeze(&num(f64::NAN)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_acyclic_round_trip() {
        let inner = Dict::from_pairs([("s", Value::str("text")), ("n", Value::Nil)]).unwrap();
        let value = Value::list(vec![
            num(1.5),
            Value::Bool(false),
            Value::sym("name"),
            Value::full_quote(Value::list(vec![Value::sym("+"), num(1.0)])),
            Value::Dict(inner),
            Value::list(vec![]),
        ]);
        assert_eq!(round_trip(&value), value);
    }

    #[test]
    fn test_shared_structure_preserved() {
        let shared = List::new(vec![num(1.0)]);
        let value = Value::list(vec![Value::List(shared.clone()), Value::List(shared)]);
        let thawed = round_trip(&value);
        let items = thawed.as_list().unwrap().items();
        assert!(items[0].as_list().unwrap().ptr_eq(items[1].as_list().unwrap()));
    }

    #[test]
    fn test_self_reference() {
        let list = List::default();
        list.push(Value::List(list.clone()));
        let frozen = freeze_to_string(&Value::List(list)).unwrap();
        assert_eq!(frozen, r#"["[","&0","]"]"#);

        let thawed = thaw_str(&frozen, None).unwrap();
        let thawed = thawed.as_list().unwrap();
        assert!(thawed.get(0).unwrap().as_list().unwrap().ptr_eq(thawed));
    }

    #[test]
    fn test_dicts_attach_to_scope_unless_inert() {
        let scope = Dict::new();
        let value = Value::list(vec![
            Value::Dict(Dict::new()),
            Value::full_quote(Value::Dict(Dict::new())),
        ]);
        let thawed = thaw(&freeze(&value).unwrap(), Some(&scope)).unwrap();
        let items = thawed.as_list().unwrap().items();
        assert!(items[0].as_dict().unwrap().parent().is_some_and(|p| p.ptr_eq(&scope)));
        match &items[1] {
            Value::FullQuote(inner) => assert!(inner.as_dict().unwrap().parent().is_none()),
            other => panic!("expected full quote, got {other}"),
        }
    }

    #[test]
    fn test_root_freezes_by_tag() {
        let interp = Interpreter::new();
        let root = Value::Dict(interp.root().clone());
        assert_eq!(freeze_to_string(&root).unwrap(), r#"["{","'native","'root","}"]"#);
        let thawed = thaw(&freeze(&root).unwrap(), Some(interp.root())).unwrap();
        assert!(thawed.as_dict().unwrap().ptr_eq(interp.root()));
    }

    #[test]
    fn test_block_round_trip_runs() {
        let mut interp = Interpreter::new();
        let literal = Value::list(vec![
            Value::sym("x"),
            Value::sym("|"),
            Value::list(vec![Value::sym("*"), Value::sym("x"), num(2.0)]),
        ]);
        let block = interp.evaluate(&literal).unwrap();
        let thawed = thaw(&freeze(&block).unwrap(), Some(interp.root())).unwrap();
        assert!(thawed.is_block());
        let call = Value::list(vec![Value::quote(thawed), num(21.0)]);
        // `:block` evaluates to the block, which is then applied.
        assert_eq!(interp.evaluate(&call).unwrap(), num(42.0));
    }

    #[test]
    fn test_builtin_block_freezes_native_by_name() {
        let interp = Interpreter::new();
        let plus = interp.root().get("+");
        let frozen = freeze_to_string(&plus).unwrap();
        assert!(frozen.contains(r#""'native","'native-fn","'name","'+""#));
        let thawed = thaw_str(&frozen, Some(interp.root())).unwrap();
        let body = &thawed.as_block().unwrap().body;
        assert!(matches!(body.as_slice(), [Value::Native(_)]));
    }

    struct Opaque;

    impl NativeObject for Opaque {
        fn type_tag(&self) -> &str {
            "Opaque"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_opaque_native_cannot_freeze() {
        let err = freeze(&Value::Native(Native::object(Opaque))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_unregistered_tag() {
        let err = thaw_str(r#"["{","'native","'freeze-test-nothing","}"]"#, None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnregisteredNativeTag);
    }

    #[test]
    fn test_deep_nesting() {
        const DEPTH: usize = 10_000;
        let mut tokens = vec![Json::from(LIST_OPEN); DEPTH];
        tokens.extend(vec![Json::from(LIST_CLOSE); DEPTH]);

        let thawed = thaw(&Json::Array(tokens), None).unwrap();
        let frozen = freeze(&thawed).unwrap();
        assert_eq!(frozen.as_array().map(Vec::len), Some(2 * DEPTH));
        // Dropping the chain recurses once per level.
        std::mem::forget(thawed);
    }

    #[test]
    fn test_malformed_streams() {
        for text in [r#"["["]"#, r#"["?"]"#, r#"["&4"]"#, r#"[1,2]"#, r#"{}"#, r#"["{",1,"}"]"#] {
            let err = thaw_str(text, None).unwrap_err();
            assert_eq!(err.kind, ErrorKind::MalformedFrozen, "{text}");
        }
    }
}
