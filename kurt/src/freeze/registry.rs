//! Process-wide table of defrosters
//!
//! A frozen dictionary carrying a `native` key is handed to the defroster
//! registered under that tag, and the defroster's result takes the
//! dictionary's place in the thawed graph. Hosts register their tags once at
//! startup; a tag can never be replaced.

use crate::interp::{Dict, EvalResult, RuntimeError, Value, builtins};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::LazyLock;
use tracing::debug;

/// Key naming the defroster in a frozen record
pub const NATIVE: &str = "native";

/// Tag of the root environment
pub const ROOT_TAG: &str = "root";

/// Tag of host functions
pub const NATIVE_FN_TAG: &str = "native-fn";

/// What a defroster can see besides the record itself
#[derive(Debug, Clone, Default)]
pub struct ThawContext {
    /// Environment the thawed graph is attached to
    pub scope: Option<Dict>,
}

/// Rebuilds a value from its frozen record.
pub type Defroster = fn(&Dict, &ThawContext) -> EvalResult<Value>;

static DEFROSTERS: LazyLock<RwLock<FxHashMap<String, Defroster>>> = LazyLock::new(|| {
    let mut table: FxHashMap<String, Defroster> = FxHashMap::default();
    table.insert(ROOT_TAG.to_string(), defrost_root);
    table.insert(NATIVE_FN_TAG.to_string(), defrost_native_fn);
    RwLock::new(table)
});

/// Register the defroster for `tag`. Fails if the tag is already taken.
pub fn register_defroster(tag: &str, defroster: Defroster) -> EvalResult<()> {
    let mut table = DEFROSTERS.write();
    if table.contains_key(tag) {
        return Err(RuntimeError::duplicate_native(tag));
    }
    table.insert(tag.to_string(), defroster);
    debug!(tag, "registered defroster");
    Ok(())
}

pub fn is_registered(tag: &str) -> bool {
    DEFROSTERS.read().contains_key(tag)
}

pub(crate) fn defrost(tag: &str, record: &Dict, ctx: &ThawContext) -> EvalResult<Value> {
    // Copy the hook out so defrosters may thaw recursively.
    let defroster = DEFROSTERS.read().get(tag).copied();
    match defroster {
        Some(defroster) => defroster(record, ctx),
        None => Err(RuntimeError::unregistered_native(tag)),
    }
}

fn defrost_root(_: &Dict, ctx: &ThawContext) -> EvalResult<Value> {
    ctx.scope
        .clone()
        .map(Value::Dict)
        .ok_or_else(|| RuntimeError::mismatch("cannot thaw the root environment without a scope"))
}

/// Builtins resolve by name; other host functions are looked up as native
/// blocks bound in the thaw scope.
fn defrost_native_fn(record: &Dict, ctx: &ThawContext) -> EvalResult<Value> {
    let name = match record.get("name") {
        Value::Str(name) => name,
        other => return Err(RuntimeError::type_error("string", other.type_name())),
    };
    if let Some(native) = builtins::lookup(&name) {
        return Ok(Value::Native(native));
    }
    let bound = ctx.scope.as_ref().map(|scope| scope.resolve(&name));
    if let Some(Value::Block(block)) = bound {
        if let [Value::Native(native)] = block.body.as_slice() {
            return Ok(Value::Native(native.clone()));
        }
    }
    Err(RuntimeError::mismatch(format!("unknown native function `{name}`")))
}
