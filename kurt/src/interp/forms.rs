//! Special forms
//!
//! Recognized by the literal symbol at the head of a list, before any
//! application. Arguments arrive unevaluated.

use super::env::Dict;
use super::error::{EvalResult, RuntimeError};
use super::eval::Interpreter;
use super::value::{BLOCK_BAR, Block, Value};
use crate::util::{SUGGESTION_THRESHOLD, find_similar_name};
use std::rc::Rc;

/// A special form: interpreter, unevaluated arguments, active environment.
pub type Form = fn(&mut Interpreter, &[Value], &Dict) -> EvalResult<Value>;

pub fn lookup(name: &str) -> Option<Form> {
    let form: Form = match name {
        "do" => eval_do,
        "def" => eval_def,
        "set" => eval_set,
        "?" => eval_exists,
        "!?" => eval_not_exists,
        _ => return None,
    };
    Some(form)
}

/// `[params... | body...]`: a run of symbols, the bar, then the body.
pub fn block_literal(items: &[Value], env: &Dict) -> Option<Block> {
    let bar = items.iter().position(|item| item.as_sym() == Some(BLOCK_BAR))?;
    let params = items[..bar]
        .iter()
        .map(|item| item.as_sym().map(Rc::from))
        .collect::<Option<Vec<Rc<str>>>>()?;
    Some(Block::new(params, items[bar + 1..].to_vec(), env.clone()))
}

fn eval_do(interp: &mut Interpreter, args: &[Value], env: &Dict) -> EvalResult<Value> {
    interp.eval_body(args, env)
}

/// `def(bindings)`, `def(target, bindings)` or `def(target, :name, value)`:
/// bind directly into the active (or target) environment.
fn eval_def(interp: &mut Interpreter, args: &[Value], env: &Dict) -> EvalResult<Value> {
    match args {
        [bindings] => {
            let bindings = eval_dict(interp, bindings, env)?;
            define_all(env, &bindings)
        }
        [target, bindings] => {
            let target = eval_dict(interp, target, env)?;
            let bindings = eval_dict(interp, bindings, env)?;
            define_all(&target, &bindings)
        }
        [target, name, value] => {
            let target = eval_dict(interp, target, env)?;
            let name = eval_name(interp, name, env)?;
            let value = interp.eval(value, env)?;
            target.define(&name, value.clone())?;
            Ok(value)
        }
        _ => Err(RuntimeError::arity_mismatch("def", 2, args.len()).at(env)),
    }
}

/// `set(bindings)` rebinds each name where it is nearest bound, and fails if
/// it is bound nowhere. The targeted forms bind directly, like `def`.
fn eval_set(interp: &mut Interpreter, args: &[Value], env: &Dict) -> EvalResult<Value> {
    let [bindings] = args else {
        return eval_def(interp, args, env);
    };
    let bindings = eval_dict(interp, bindings, env)?;
    for name in bindings.names() {
        let Some(scope) = env.find(&name) else {
            let visible = env.visible_names();
            let suggestion = find_similar_name(
                &name,
                visible.iter().map(String::as_str),
                SUGGESTION_THRESHOLD,
            );
            return Err(RuntimeError::unbound(&name, suggestion).at(env));
        };
        scope.define(&name, bindings.get(&name))?;
    }
    Ok(Value::Nil)
}

/// `?(name)` or `?(target, name)`: whether `name` is bound along the chain.
fn eval_exists(interp: &mut Interpreter, args: &[Value], env: &Dict) -> EvalResult<Value> {
    let found = match args {
        [name] => {
            let name = eval_name(interp, name, env)?;
            env.find(&name).is_some()
        }
        [target, name] => {
            let target = interp.eval(target, env)?;
            let name = eval_name(interp, name, env)?;
            target.as_dict().is_some_and(|t| t.find(&name).is_some())
        }
        _ => return Err(RuntimeError::arity_mismatch("?", 2, args.len()).at(env)),
    };
    Ok(Value::Bool(found))
}

fn eval_not_exists(interp: &mut Interpreter, args: &[Value], env: &Dict) -> EvalResult<Value> {
    match eval_exists(interp, args, env)? {
        Value::Bool(found) => Ok(Value::Bool(!found)),
        other => Ok(other),
    }
}

fn define_all(target: &Dict, bindings: &Dict) -> EvalResult<Value> {
    for name in bindings.names() {
        target.define(&name, bindings.get(&name))?;
    }
    Ok(Value::Nil)
}

fn eval_dict(interp: &mut Interpreter, expr: &Value, env: &Dict) -> EvalResult<Dict> {
    match interp.eval(expr, env)? {
        Value::Dict(dict) => Ok(dict),
        other => Err(RuntimeError::type_error("dictionary", other.type_name()).at(env)),
    }
}

fn eval_name(interp: &mut Interpreter, expr: &Value, env: &Dict) -> EvalResult<Rc<str>> {
    match interp.eval(expr, env)? {
        Value::Sym(name) => Ok(name),
        other => Err(RuntimeError::type_error("symbol", other.type_name()).at(env)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::error::ErrorKind;

    fn sym(s: &str) -> Value {
        Value::sym(s)
    }

    fn num(n: f64) -> Value {
        Value::Num(n)
    }

    fn call(head: &str, args: Vec<Value>) -> Value {
        let mut items = vec![sym(head)];
        items.extend(args);
        Value::list(items)
    }

    fn bindings(pairs: Vec<(&str, Value)>) -> Value {
        Value::Dict(Dict::from_pairs(pairs).unwrap())
    }

    #[test]
    fn test_block_literal_shape() {
        let env = Dict::new();
        let items = [sym("a"), sym("...rest"), sym("|"), sym("a")];
        let block = block_literal(&items, &env).unwrap();
        assert_eq!(block.params.len(), 2);
        assert_eq!(block.body, vec![sym("a")]);
        assert!(block.env.ptr_eq(&env));

        assert!(block_literal(&[sym("a"), num(1.0), sym("|")], &env).is_none());
        assert!(block_literal(&[sym("a"), sym("b")], &env).is_none());
    }

    #[test]
    fn test_do_returns_last() {
        let mut interp = Interpreter::new();
        let expr = call("do", vec![num(1.0), num(2.0)]);
        assert_eq!(interp.evaluate(&expr).unwrap(), num(2.0));
        assert_eq!(interp.evaluate(&call("do", vec![])).unwrap(), Value::Nil);
    }

    #[test]
    fn test_def_then_set() {
        let mut interp = Interpreter::new();
        let program = call("do", vec![
            call("def", vec![bindings(vec![("x", num(1.0))])]),
            call("set", vec![bindings(vec![("x", call("+", vec![sym("x"), num(1.0)]))])]),
            sym("x"),
        ]);
        assert_eq!(interp.evaluate(&program).unwrap(), num(2.0));
    }

    #[test]
    fn test_set_rebinds_nearest() {
        let mut interp = Interpreter::new();
        interp.root().define("x", num(1.0)).unwrap();
        // [[| set({x = 5})]] runs inside a frame that does not hold x
        let body = Value::list(vec![sym("|"), call("set", vec![bindings(vec![("x", num(5.0))])])]);
        interp.evaluate(&Value::list(vec![body])).unwrap();
        assert_eq!(interp.root().get("x"), num(5.0));
    }

    #[test]
    fn test_set_unbound_fails() {
        let mut interp = Interpreter::new();
        let err = interp
            .evaluate(&call("set", vec![bindings(vec![("nope", num(1.0))])]))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnboundIdentifier);
    }

    #[test]
    fn test_def_into_target() {
        let mut interp = Interpreter::new();
        let target = Dict::new();
        interp.root().define("obj", Value::Dict(target.clone())).unwrap();
        interp
            .evaluate(&call("def", vec![sym("obj"), Value::quote(sym("k")), num(3.0)]))
            .unwrap();
        interp
            .evaluate(&call("set", vec![sym("obj"), bindings(vec![("j", num(4.0))])]))
            .unwrap();
        assert_eq!(target.get("k"), num(3.0));
        assert_eq!(target.get("j"), num(4.0));
        assert!(!interp.root().exists("k"));
    }

    #[test]
    fn test_def_target_must_be_dict() {
        let mut interp = Interpreter::new();
        let err = interp
            .evaluate(&call("def", vec![num(1.0), bindings(vec![])]))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_exists_forms() {
        let mut interp = Interpreter::new();
        interp.root().define("x", num(1.0)).unwrap();
        let has = |name: &str| call("?", vec![Value::quote(sym(name))]);
        assert_eq!(interp.evaluate(&has("x")).unwrap(), Value::Bool(true));
        assert_eq!(interp.evaluate(&has("y")).unwrap(), Value::Bool(false));

        let hasnt = call("!?", vec![Value::quote(sym("y"))]);
        assert_eq!(interp.evaluate(&hasnt).unwrap(), Value::Bool(true));

        let on_number = call("?", vec![num(1.0), Value::quote(sym("x"))]);
        assert_eq!(interp.evaluate(&on_number).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_exists_requires_symbol() {
        let mut interp = Interpreter::new();
        let err = interp.evaluate(&call("?", vec![num(1.0)])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }
}
