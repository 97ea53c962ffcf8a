//! Primitive operations installed into the root environment
//!
//! Each primitive is a block whose body is a native function; the function
//! reads its arguments from the call frame by parameter name.

use super::env::Dict;
use super::error::{EvalResult, RuntimeError};
use super::eval::Interpreter;
use super::native::{Native, NativeFnPtr};
use super::print::print;
use super::value::{self, List, Value};
use crate::freeze;
use tracing::info;

pub struct Builtin {
    pub name: &'static str,
    pub params: &'static [&'static str],
    pub func: NativeFnPtr,
}

const fn builtin(name: &'static str, params: &'static [&'static str], func: NativeFnPtr) -> Builtin {
    Builtin { name, params, func }
}

pub static BUILTINS: &[Builtin] = &[
    builtin("+", &["a", "b"], add),
    builtin("-", &["a", "b"], sub),
    builtin("*", &["a", "b"], mul),
    builtin("/", &["a", "b"], div),
    builtin("<", &["a", "b"], lt),
    builtin("<=", &["a", "b"], le),
    builtin(">", &["a", "b"], gt),
    builtin(">=", &["a", "b"], ge),
    builtin("=", &["a", "b"], equal),
    builtin("not", &["a"], not),
    builtin("and", &["a", "b"], and),
    builtin("or", &["a", "b"], or),
    builtin("if", &["cond", "then", "else"], if_),
    builtin("list", &["...items"], list),
    builtin("len", &["value"], len),
    builtin("names", &["dict"], names),
    builtin("log", &["...values"], log),
    builtin("freeze", &["value"], freeze_),
    builtin("thaw", &["text"], thaw_),
];

pub fn install(interp: &mut Interpreter) {
    for b in BUILTINS {
        interp.define_native(b.name, b.params, b.func);
    }
}

/// Native function for the builtin called `name`.
pub fn lookup(name: &str) -> Option<Native> {
    BUILTINS
        .iter()
        .find(|b| b.name == name)
        .map(|b| Native::func(b.name, b.func))
}

fn num_arg(frame: &Dict, name: &str) -> EvalResult<f64> {
    let value = frame.get(name);
    value
        .as_num()
        .ok_or_else(|| RuntimeError::type_error("number", value.type_name()))
}

fn bool_arg(frame: &Dict, name: &str) -> EvalResult<bool> {
    let value = frame.get(name);
    value
        .as_bool()
        .ok_or_else(|| RuntimeError::type_error("boolean", value.type_name()))
}

fn numbers(frame: &Dict) -> EvalResult<(f64, f64)> {
    Ok((num_arg(frame, "a")?, num_arg(frame, "b")?))
}

fn add(_: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
    match (frame.get("a"), frame.get("b")) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::str(&format!("{a}{b}"))),
        _ => numbers(frame).map(|(a, b)| Value::Num(a + b)),
    }
}

fn sub(_: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
    numbers(frame).map(|(a, b)| Value::Num(a - b))
}

fn mul(_: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
    numbers(frame).map(|(a, b)| Value::Num(a * b))
}

fn div(_: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
    numbers(frame).map(|(a, b)| Value::Num(a / b))
}

fn lt(_: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
    numbers(frame).map(|(a, b)| Value::Bool(a < b))
}

fn le(_: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
    numbers(frame).map(|(a, b)| Value::Bool(a <= b))
}

fn gt(_: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
    numbers(frame).map(|(a, b)| Value::Bool(a > b))
}

fn ge(_: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
    numbers(frame).map(|(a, b)| Value::Bool(a >= b))
}

fn equal(_: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
    Ok(Value::Bool(value::eq(&frame.get("a"), &frame.get("b"))))
}

fn not(_: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
    Ok(Value::Bool(!bool_arg(frame, "a")?))
}

fn and(_: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
    Ok(Value::Bool(bool_arg(frame, "a")? && bool_arg(frame, "b")?))
}

fn or(_: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
    Ok(Value::Bool(bool_arg(frame, "a")? || bool_arg(frame, "b")?))
}

/// `[if cond then else]`. A block branch runs with no arguments; any other
/// branch value is the result.
fn if_(interp: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
    let branch = if bool_arg(frame, "cond")? { "then" } else { "else" };
    match frame.get(branch) {
        Value::Block(block) => interp.call_block(frame, &block, Vec::new()),
        other => Ok(other),
    }
}

fn list(_: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
    match frame.get("items") {
        Value::Nil => Ok(Value::List(List::default())),
        items => Ok(items),
    }
}

fn len(_: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
    let n = match frame.get("value") {
        Value::List(list) => list.len(),
        Value::Dict(dict) => dict.len(),
        Value::Str(s) => s.chars().count(),
        other => return Err(RuntimeError::type_error("list, dictionary or string", other.type_name())),
    };
    Ok(Value::Num(n as f64))
}

fn names(_: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
    match frame.get("dict") {
        Value::Dict(dict) => Ok(Value::list(
            dict.names().iter().map(|n| Value::str(n)).collect(),
        )),
        other => Err(RuntimeError::type_error("dictionary", other.type_name())),
    }
}

fn log(_: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
    let text = match frame.get("values") {
        Value::List(values) => values
            .items()
            .iter()
            .map(|v| match v {
                Value::Str(s) => s.to_string(),
                other => print(other),
            })
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    };
    info!(target: "kurt::script", "{text}");
    Ok(Value::Nil)
}

fn freeze_(_: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
    let text = freeze::freeze_to_string(&frame.get("value"))?;
    Ok(Value::str(&text))
}

fn thaw_(interp: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
    match frame.get("text") {
        Value::Str(text) => freeze::thaw_str(&text, Some(interp.root())),
        other => Err(RuntimeError::type_error("string", other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::error::ErrorKind;
    use crate::interp::value::Block;
    use std::rc::Rc;

    fn call(head: &str, args: Vec<Value>) -> Value {
        let mut items = vec![Value::sym(head)];
        items.extend(args);
        Value::list(items)
    }

    fn num(n: f64) -> Value {
        Value::Num(n)
    }

    #[test]
    fn test_arithmetic() {
        let mut interp = Interpreter::new();
        let expr = call("*", vec![call("+", vec![num(1.0), num(2.0)]), num(4.0)]);
        assert_eq!(interp.evaluate(&expr).unwrap(), num(12.0));
        let expr = call("/", vec![num(1.0), num(4.0)]);
        assert_eq!(interp.evaluate(&expr).unwrap(), num(0.25));
    }

    #[test]
    fn test_string_concat() {
        let mut interp = Interpreter::new();
        let expr = call("+", vec![Value::str("ab"), Value::str("cd")]);
        assert_eq!(interp.evaluate(&expr).unwrap(), Value::str("abcd"));
    }

    #[test]
    fn test_arithmetic_type_error() {
        let mut interp = Interpreter::new();
        let err = interp
            .evaluate(&call("-", vec![Value::str("a"), num(1.0)]))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
        assert!(err.stack.unwrap().contains("at -"));
    }

    #[test]
    fn test_if_requires_boolean() {
        let mut interp = Interpreter::new();
        let err = interp
            .evaluate(&call("if", vec![num(1.0), num(2.0), num(3.0)]))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_if_runs_block_branch() {
        let mut interp = Interpreter::new();
        let then = Value::list(vec![Value::sym("|"), num(1.0)]);
        let expr = call("if", vec![call("<", vec![num(1.0), num(2.0)]), then, num(0.0)]);
        assert_eq!(interp.evaluate(&expr).unwrap(), num(1.0));

        let expr = call("if", vec![Value::Bool(false), num(1.0)]);
        assert_eq!(interp.evaluate(&expr).unwrap(), Value::Nil);
    }

    #[test]
    fn test_and_or_not() {
        let mut interp = Interpreter::new();
        let t = Value::Bool(true);
        let f = Value::Bool(false);
        assert_eq!(interp.evaluate(&call("and", vec![t.clone(), f.clone()])).unwrap(), f);
        assert_eq!(interp.evaluate(&call("or", vec![t.clone(), f.clone()])).unwrap(), t);
        assert_eq!(interp.evaluate(&call("not", vec![f])).unwrap(), t);
        let err = interp.evaluate(&call("and", vec![t, Value::Nil])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_list_len_names() {
        let mut interp = Interpreter::new();
        let xs = call("list", vec![num(1.0), num(2.0), num(3.0)]);
        assert_eq!(interp.evaluate(&call("len", vec![xs])).unwrap(), num(3.0));
        assert_eq!(interp.evaluate(&call("list", vec![])).unwrap(), Value::list(vec![]));

        let literal = Dict::from_pairs([("b", num(1.0)), ("a", num(2.0))]).unwrap();
        let expr = call("names", vec![Value::Dict(literal)]);
        assert_eq!(
            interp.evaluate(&expr).unwrap(),
            Value::list(vec![Value::str("b"), Value::str("a")])
        );
    }

    #[test]
    fn test_equality_is_structural() {
        let mut interp = Interpreter::new();
        let a = call("list", vec![num(1.0), Value::str("x")]);
        let b = call("list", vec![num(1.0), Value::str("x")]);
        assert_eq!(interp.evaluate(&call("=", vec![a, b])).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_freeze_and_thaw_builtins() {
        let mut interp = Interpreter::new();
        let frozen = interp
            .evaluate(&call("freeze", vec![Value::quote(Value::list(vec![num(1.0), Value::str("hi")]))]))
            .unwrap();
        assert_eq!(frozen, Value::str(r#"["[",1,"'hi","]"]"#));
        let thawed = interp.evaluate(&call("thaw", vec![frozen])).unwrap();
        assert_eq!(thawed, Value::list(vec![num(1.0), Value::str("hi")]));
    }

    #[test]
    fn test_host_native() {
        fn double(_: &mut Interpreter, frame: &Dict) -> EvalResult<Value> {
            Ok(Value::Num(num_arg(frame, "x")? * 2.0))
        }
        let mut interp = Interpreter::new();
        interp.define_native("double", &["x"], double);
        assert_eq!(interp.evaluate(&call("double", vec![num(21.0)])).unwrap(), num(42.0));

        let block: Rc<Block> = interp.root().get("double").as_block().cloned().unwrap();
        assert_eq!(block.display_name(), "double");
    }

    #[test]
    fn test_lookup() {
        assert!(lookup("+").is_some_and(|n| n.type_tag() == "native-fn"));
        assert!(lookup("nope").is_none());
    }
}
