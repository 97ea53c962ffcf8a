//! Dictionaries, which serve as records, objects and scopes
//!
//! A `Dict` is an insertion-ordered map from name to value with two reserved
//! links: `parent` (inheritance and lexical scope) and `caller` (the frame
//! active at the call site, for diagnostics). Both links are weak; call
//! frames and tee views additionally retain their lexical scope so closures
//! keep their defining environment alive.

use super::error::{EvalResult, RuntimeError};
use super::value::Value;
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

pub const PARENT: &str = "parent";
pub const CALLER: &str = "caller";
pub const SELF: &str = "self";

/// Maps surface aliases onto reserved names: `^` is `parent`, `@` is `self`.
pub fn canonical(name: &str) -> &str {
    match name {
        "^" => PARENT,
        "@" => SELF,
        other => other,
    }
}

/// True for names that are links rather than slots.
pub fn is_reserved(name: &str) -> bool {
    matches!(canonical(name), PARENT | CALLER)
}

type Slots = IndexMap<String, Value, FxBuildHasher>;

#[derive(Default)]
struct DictData {
    slots: Slots,
    parent: Option<Weak<RefCell<DictData>>>,
    /// Set when `parent` was assigned through the key rather than by attaching
    /// the dictionary to a scope
    declared_parent: bool,
    caller: Option<Weak<RefCell<DictData>>>,
    /// Strong hold on the lexical scope of call frames and tee views
    scope: Option<Dict>,
    /// Slot operations are forwarded here when set
    tee: Option<Dict>,
    name: Option<Rc<str>>,
    /// Freezes as `{native = tag}` instead of its contents
    tag: Option<Rc<str>>,
}

/// Shared reference to a dictionary
#[derive(Clone)]
pub struct Dict(Rc<RefCell<DictData>>);

impl Dict {
    /// Create an empty dictionary with no parent
    pub fn new() -> Self {
        Dict(Rc::new(RefCell::new(DictData::default())))
    }

    /// Create an empty dictionary inheriting from `parent`
    pub fn child(parent: &Dict) -> Self {
        let dict = Dict::new();
        dict.attach(parent);
        dict
    }

    /// Create a call frame: lexically parented to (and retaining) `scope`,
    /// with `caller` recorded for stack dumps.
    pub fn frame(scope: &Dict, caller: &Dict, name: Option<Rc<str>>) -> Self {
        let dict = Dict::child(scope);
        {
            let mut data = dict.0.borrow_mut();
            data.scope = Some(scope.clone());
            data.caller = Some(Rc::downgrade(&caller.0));
            data.name = name;
        }
        dict
    }

    /// Create a view whose slots are `target`'s but whose parent is `parent`.
    ///
    /// Reads and writes of ordinary names go to `target`; lookups that miss
    /// continue into `parent` rather than `target`'s own parent.
    pub fn tee(target: &Dict, parent: &Dict) -> Self {
        let dict = Dict::child(parent);
        {
            let mut data = dict.0.borrow_mut();
            data.scope = Some(parent.clone());
            data.tee = Some(target.tee_target());
            data.name = target.name();
        }
        dict
    }

    /// Build a dictionary from name/value pairs, in order.
    pub fn from_pairs<I, K>(pairs: I) -> EvalResult<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let dict = Dict::new();
        for (name, value) in pairs {
            dict.define(name.as_ref(), value)?;
        }
        Ok(dict)
    }

    /// The dictionary that actually owns this one's slots.
    pub fn tee_target(&self) -> Dict {
        match &self.0.borrow().tee {
            Some(target) => target.clone(),
            None => self.clone(),
        }
    }

    pub fn is_tee(&self) -> bool {
        self.0.borrow().tee.is_some()
    }

    /// Nearest dictionary that is not a tee view: the scope a newly created
    /// value should attach to.
    pub fn anchor(&self) -> Dict {
        let mut current = self.clone();
        while current.is_tee() {
            match current.parent() {
                Some(parent) => current = parent,
                None => return current.tee_target(),
            }
        }
        current
    }

    /// True iff `name` is a direct key (no chain traversal)
    pub fn exists(&self, name: &str) -> bool {
        match canonical(name) {
            PARENT => self.parent().is_some(),
            CALLER => self.caller().is_some(),
            name => {
                if let Some(target) = &self.0.borrow().tee {
                    return target.exists(name);
                }
                self.0.borrow().slots.contains_key(name)
            }
        }
    }

    /// Direct lookup; `Nil` if absent
    pub fn get(&self, name: &str) -> Value {
        match canonical(name) {
            PARENT => self.parent().map_or(Value::Nil, Value::Dict),
            CALLER => self.caller().map_or(Value::Nil, Value::Dict),
            name => {
                if let Some(target) = &self.0.borrow().tee {
                    return target.get(name);
                }
                self.0.borrow().slots.get(name).cloned().unwrap_or(Value::Nil)
            }
        }
    }

    /// Direct insertion or overwrite.
    ///
    /// `parent` and `caller` accept a dictionary or nil; a `parent` that
    /// would make this dictionary its own ancestor is rejected.
    pub fn define(&self, name: &str, value: Value) -> EvalResult<()> {
        match canonical(name) {
            PARENT => match value {
                Value::Dict(parent) => self.set_parent(Some(&parent)),
                Value::Nil => self.set_parent(None),
                other => Err(RuntimeError::type_error("dictionary", other.type_name())),
            },
            CALLER => match value {
                Value::Dict(caller) => {
                    self.0.borrow_mut().caller = Some(Rc::downgrade(&caller.0));
                    Ok(())
                }
                Value::Nil => {
                    self.0.borrow_mut().caller = None;
                    Ok(())
                }
                other => Err(RuntimeError::type_error("dictionary", other.type_name())),
            },
            name => {
                let target = self.0.borrow().tee.clone();
                match target {
                    Some(target) => target.define(name, value),
                    None => {
                        self.0.borrow_mut().slots.insert(name.to_string(), value);
                        Ok(())
                    }
                }
            }
        }
    }

    /// Remove a direct binding, returning its value.
    pub fn remove(&self, name: &str) -> Value {
        let name = canonical(name);
        if is_reserved(name) {
            let old = self.get(name);
            // Clearing a link cannot fail.
            let _ = self.define(name, Value::Nil);
            return old;
        }
        let target = self.0.borrow().tee.clone();
        match target {
            Some(target) => target.remove(name),
            None => self
                .0
                .borrow_mut()
                .slots
                .shift_remove(name)
                .unwrap_or(Value::Nil),
        }
    }

    /// Replace the parent link, refusing cycles. The new link counts as
    /// declared, see [`Dict::declared_parent`].
    pub fn set_parent(&self, parent: Option<&Dict>) -> EvalResult<()> {
        if let Some(parent) = parent {
            let mut ancestor = Some(parent.clone());
            while let Some(current) = ancestor {
                if current.ptr_eq(self) {
                    return Err(RuntimeError::cycle(&self.display_name()));
                }
                ancestor = current.parent();
            }
        }
        let mut data = self.0.borrow_mut();
        data.parent = parent.map(|p| Rc::downgrade(&p.0));
        data.declared_parent = parent.is_some();
        Ok(())
    }

    /// Parent a fresh dictionary to the scope it was created in.
    ///
    /// Unlike `set_parent` the link is not declared, so evaluating this
    /// dictionary as a literal re-parents the result to the active scope.
    pub fn attach(&self, scope: &Dict) {
        let mut data = self.0.borrow_mut();
        data.parent = Some(Rc::downgrade(&scope.0));
        data.declared_parent = false;
    }

    /// Parent link assigned through `parent` (or `^`), if any.
    pub fn declared_parent(&self) -> Option<Dict> {
        if self.0.borrow().declared_parent {
            self.parent()
        } else {
            None
        }
    }

    /// Parent link; a parent that has been dropped counts as absent.
    pub fn parent(&self) -> Option<Dict> {
        self.0
            .borrow()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Dict)
    }

    pub fn caller(&self) -> Option<Dict> {
        self.0
            .borrow()
            .caller
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Dict)
    }

    /// Walk this dictionary and its parents, returning the first one that
    /// directly holds `name`.
    ///
    /// Serves both lexical scoping and inherited field lookup.
    pub fn find(&self, name: &str) -> Option<Dict> {
        let mut current = Some(self.clone());
        while let Some(dict) = current {
            if dict.exists(name) {
                return Some(dict);
            }
            current = dict.parent();
        }
        None
    }

    /// Lexical lookup: the nearest binding of `name`, or `Nil`.
    pub fn resolve(&self, name: &str) -> Value {
        self.find(name).map_or(Value::Nil, |dict| dict.get(name))
    }

    /// Direct keys in insertion order, without `parent`/`caller`
    pub fn names(&self) -> Vec<String> {
        if let Some(target) = &self.0.borrow().tee {
            return target.names();
        }
        self.0.borrow().slots.keys().cloned().collect()
    }

    /// Every name visible from here, nearest first, without duplicates.
    pub fn visible_names(&self) -> Vec<String> {
        let mut seen = Vec::new();
        let mut current = Some(self.clone());
        while let Some(dict) = current {
            for name in dict.names() {
                if !seen.contains(&name) {
                    seen.push(name);
                }
            }
            current = dict.parent();
        }
        seen
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self) -> Option<Rc<str>> {
        self.0.borrow().name.clone()
    }

    pub fn set_name(&self, name: Option<Rc<str>>) {
        self.0.borrow_mut().name = name;
    }

    pub fn display_name(&self) -> String {
        self.name().map_or_else(|| "(anon)".to_string(), |n| n.to_string())
    }

    pub fn tag(&self) -> Option<Rc<str>> {
        self.0.borrow().tag.clone()
    }

    /// Freeze this dictionary as a reference to the defroster named `tag`.
    pub fn set_tag(&self, tag: &str) {
        self.0.borrow_mut().tag = Some(Rc::from(tag));
    }

    pub fn ptr_eq(&self, other: &Dict) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Identity key, stable while any clone is alive.
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl Default for Dict {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Dict(self.clone()))
    }
}
