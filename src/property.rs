//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! Typed, named, finalizable properties owned by tasks and projects.
//!
//! A [`Property`] augments a [`Supplier`] with a declared item-type (a
//! union of value adapters, checked in declaration order), input/output
//! direction, and finalization. Rather than a runtime type registry
//! consulted via reflection, item-types are a closed `Value` enum plus a
//! `lazy_static` registry of named [`ValueAdapter`]s consulted in the order
//! a property's item-type union lists them.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use lazy_static::lazy_static;

use crate::error::{KrakenError, Result};
use crate::supplier::{Supplier, SupplierHandle};

/// The closed set of value shapes a property can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    String(String),
    Path(PathBuf),
    List(Vec<Value>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&PathBuf> {
        match self {
            Value::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::String(_) => "string",
            Value::Path(_) => "Path",
            Value::List(_) => "list",
        }
    }
}

/// Converts raw values into a property's declared item-type, one adapter
/// per scalar/collection variant (plus user-registered opaque adapters).
pub trait ValueAdapter: Send + Sync {
    /// The name this adapter is registered under; this is what a property's
    /// item-type union names (e.g. `&["string", "Path"]`).
    fn name(&self) -> &'static str;

    /// Whether this adapter can convert `value` into its target shape.
    fn accepts(&self, value: &Value) -> bool;

    /// Perform the conversion. Only called after `accepts` returned `true`.
    fn convert(&self, value: Value) -> Result<Value>;
}

struct BoolAdapter;
impl ValueAdapter for BoolAdapter {
    fn name(&self) -> &'static str {
        "bool"
    }
    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Bool(_))
    }
    fn convert(&self, value: Value) -> Result<Value> {
        Ok(value)
    }
}

struct IntAdapter;
impl ValueAdapter for IntAdapter {
    fn name(&self) -> &'static str {
        "int"
    }
    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Int(_))
    }
    fn convert(&self, value: Value) -> Result<Value> {
        Ok(value)
    }
}

struct StringAdapter;
impl ValueAdapter for StringAdapter {
    fn name(&self) -> &'static str {
        "string"
    }
    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::String(_))
    }
    fn convert(&self, value: Value) -> Result<Value> {
        Ok(value)
    }
}

/// Accepts both `Value::String` and `Value::Path`; a string is converted to
/// a path, a path passes through unchanged.
struct PathAdapter;
impl ValueAdapter for PathAdapter {
    fn name(&self) -> &'static str {
        "Path"
    }
    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::String(_) | Value::Path(_))
    }
    fn convert(&self, value: Value) -> Result<Value> {
        match value {
            Value::Path(p) => Ok(Value::Path(p)),
            Value::String(s) => Ok(Value::Path(PathBuf::from(s))),
            other => Err(KrakenError::TypeMismatch {
                expected: "Path".to_string(),
                reason: format!("cannot convert {} to Path", other.kind_name()),
            }),
        }
    }
}

struct ListAdapter;
impl ValueAdapter for ListAdapter {
    fn name(&self) -> &'static str {
        "list"
    }
    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::List(_))
    }
    fn convert(&self, value: Value) -> Result<Value> {
        Ok(value)
    }
}

lazy_static! {
    /// Global registry of named value adapters, consulted in the order a
    /// property's item-type union lists their names.
    static ref ADAPTERS: HashMap<&'static str, Box<dyn ValueAdapter>> = {
        let mut m: HashMap<&'static str, Box<dyn ValueAdapter>> = HashMap::new();
        for adapter in [
            Box::new(BoolAdapter) as Box<dyn ValueAdapter>,
            Box::new(IntAdapter),
            Box::new(StringAdapter),
            Box::new(PathAdapter),
            Box::new(ListAdapter),
        ] {
            m.insert(adapter.name(), adapter);
        }
        m
    };
}

/// A named supplier owned by a task or project, with a declared item-type
/// and input/output direction.
pub struct Property {
    name: String,
    owner_path: String,
    is_output: bool,
    item_type: Vec<&'static str>,
    /// The element type for a `"list"` branch of `item_type`, if declared
    /// via [`Property::new_list`]. `item_type` itself has no generic
    /// parameters (it's a flat union of branch names), so the list's
    /// element type is tracked alongside it rather than inside it.
    list_element_type: Option<&'static str>,
    supplier: RefCell<Supplier<Value>>,
    finalized: Cell<bool>,
    error_message: RefCell<Option<String>>,
    /// Task paths this property's current value is lineage-derived from,
    /// i.e. the owners of upstream properties it was `set` to. Used by
    /// [`crate::task::TaskHandle::get_relationships`] to derive strict
    /// predecessors from property assignment.
    derived_task_paths: RefCell<Vec<String>>,
}

impl Property {
    pub fn new(owner_path: impl Into<String>, name: impl Into<String>, is_output: bool, item_type: Vec<&'static str>) -> Rc<Self> {
        Self::new_inner(owner_path, name, is_output, item_type, None)
    }

    /// Declares a property whose item-type is a list of `element_type`.
    /// `provides`/`get_of_type` then also answer for `element_type` itself,
    /// honoring the "or a sequence element" clause of their contract.
    pub fn new_list(owner_path: impl Into<String>, name: impl Into<String>, is_output: bool, element_type: &'static str) -> Rc<Self> {
        Self::new_inner(owner_path, name, is_output, vec!["list"], Some(element_type))
    }

    fn new_inner(
        owner_path: impl Into<String>,
        name: impl Into<String>,
        is_output: bool,
        item_type: Vec<&'static str>,
        list_element_type: Option<&'static str>,
    ) -> Rc<Self> {
        Rc::new(Property {
            name: name.into(),
            owner_path: owner_path.into(),
            is_output,
            item_type,
            list_element_type,
            supplier: RefCell::new(Supplier::void()),
            finalized: Cell::new(false),
            error_message: RefCell::new(None),
            derived_task_paths: RefCell::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner_path(&self) -> &str {
        &self.owner_path
    }

    pub fn is_output(&self) -> bool {
        self.is_output
    }

    pub fn is_input(&self) -> bool {
        !self.is_output
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.get()
    }

    /// Resolve the current value, failing with `Empty` if unset.
    pub fn get(&self) -> Result<Value> {
        self.supplier.borrow().get().map_err(|e| match e {
            KrakenError::Empty { .. } => KrakenError::Empty {
                label: format!("Property({}.{})", self.owner_path, self.name),
                message: self.error_message.borrow().clone(),
            },
            other => other,
        })
    }

    pub fn get_or(&self, fallback: Value) -> Value {
        self.get().unwrap_or(fallback)
    }

    pub fn is_empty(&self) -> bool {
        self.get().is_err()
    }

    /// Type-check and assign a raw value, consulting this property's
    /// item-type union in declaration order.
    pub fn set(&self, value: Value) -> Result<()> {
        self.check_not_finalized()?;
        let converted = self.convert(value)?;
        *self.supplier.borrow_mut() = Supplier::of(converted);
        self.derived_task_paths.borrow_mut().clear();
        Ok(())
    }

    /// Bind this property to the current value of `other`, introducing a
    /// lineage edge: reads of `self` will re-resolve `other` lazily, and
    /// `other`'s owning task (plus anything *it* was derived from) becomes
    /// part of this property's derived task paths.
    pub fn set_from(&self, other: &Rc<Property>) -> Result<()> {
        self.check_not_finalized()?;
        let upstream = Rc::clone(other);
        *self.supplier.borrow_mut() = Supplier::of_callable(move || upstream.get());
        let mut derived = vec![other.owner_path.clone()];
        derived.extend(other.derived_task_paths.borrow().iter().cloned());
        *self.derived_task_paths.borrow_mut() = derived;
        Ok(())
    }

    /// The task paths contributing to this property's current value via
    /// assignment lineage (transitively flattened).
    pub fn derived_task_paths(&self) -> Vec<String> {
        self.derived_task_paths.borrow().clone()
    }

    pub fn setmap(&self, func: impl Fn(Value) -> Value + 'static) -> Result<()> {
        self.check_not_finalized()?;
        let current = self.supplier.borrow().clone();
        *self.supplier.borrow_mut() = current.map(func);
        Ok(())
    }

    pub fn setdefault(&self, value: Value) -> Result<()> {
        if self.is_empty() {
            self.set(value)
        } else {
            Ok(())
        }
    }

    pub fn setfinal(&self, value: Value) -> Result<()> {
        self.set(value)?;
        self.finalize();
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.check_not_finalized()?;
        *self.supplier.borrow_mut() = Supplier::void();
        self.derived_task_paths.borrow_mut().clear();
        Ok(())
    }

    pub fn seterror(&self, message: impl Into<String>) {
        *self.error_message.borrow_mut() = Some(message.into());
    }

    pub fn finalize(&self) {
        self.finalized.set(true);
    }

    /// Whether the static item-type can deliver a value of `type_name`
    /// (e.g. `"string"`, `"Path"`) — either directly, or (for lists) as a
    /// sequence element, i.e. `type_name` is this property's declared
    /// list-element type (see [`Property::new_list`]).
    pub fn provides(&self, type_name: &str) -> bool {
        self.item_type.iter().any(|t| *t == type_name) || self.list_element_type == Some(type_name)
    }

    /// Returns a value of `type_name` this property can currently deliver,
    /// or `None` if its static item-type doesn't `provide` it or it has no
    /// value set. For a direct branch this is the property's own value; for
    /// a list-element match it's the list's first element.
    pub fn get_of_type(&self, type_name: &str) -> Option<Value> {
        if !self.provides(type_name) {
            return None;
        }
        let value = self.get().ok()?;
        if self.list_element_type == Some(type_name) && !self.item_type.iter().any(|t| *t == type_name) {
            match &value {
                Value::List(items) => items.first().cloned(),
                _ => None,
            }
        } else {
            Some(value)
        }
    }

    pub fn item_type(&self) -> &[&'static str] {
        &self.item_type
    }

    fn check_not_finalized(&self) -> Result<()> {
        if self.finalized.get() {
            return Err(KrakenError::Finalized(format!("{}.{}", self.owner_path, self.name)));
        }
        Ok(())
    }

    fn convert(&self, value: Value) -> Result<Value> {
        let mut tried = Vec::new();
        for adapter_name in &self.item_type {
            if let Some(adapter) = ADAPTERS.get(adapter_name) {
                if adapter.accepts(&value) {
                    return adapter.convert(value);
                }
                tried.push(*adapter_name);
            }
        }
        Err(KrakenError::TypeMismatch {
            expected: self.item_type.join(" | "),
            reason: format!(
                "value of kind {:?} satisfies none of the branches tried ({})",
                value.kind_name(),
                tried.join(", ")
            ),
        })
    }
}

impl SupplierHandle for Property {
    fn label(&self) -> String {
        format!("Property({}.{})", self.owner_path, self.name)
    }

    fn derived_from(&self) -> Vec<Rc<dyn SupplierHandle>> {
        self.supplier.borrow().derived_from()
    }

    fn is_void(&self) -> bool {
        self.supplier.borrow().is_void()
    }

    fn owner_task_path(&self) -> Option<String> {
        Some(self.owner_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_rejects_wrong_type() {
        let p = Property::new(":proj:t", "count", false, vec!["int"]);
        let err = p.set(Value::String("x".into())).unwrap_err();
        assert!(matches!(err, KrakenError::TypeMismatch { .. }));
    }

    #[test]
    fn set_finalized_fails() {
        let p = Property::new(":proj:t", "count", false, vec!["int"]);
        p.set(Value::Int(1)).unwrap();
        p.finalize();
        let err = p.set(Value::Int(2)).unwrap_err();
        assert!(matches!(err, KrakenError::Finalized(_)));
    }

    #[test]
    fn get_fails_when_empty() {
        let p = Property::new(":proj:t", "count", false, vec!["int"]);
        let err = p.get().unwrap_err();
        assert!(matches!(err, KrakenError::Empty { .. }));
    }

    #[test]
    fn union_order_determines_conversion_string_then_path() {
        let p = Property::new(":proj:t", "dest", false, vec!["string", "Path"]);
        p.set(Value::String("foo/bar".into())).unwrap();
        assert_eq!(p.get().unwrap(), Value::String("foo/bar".into()));
    }

    #[test]
    fn union_order_determines_conversion_path_then_string() {
        let p = Property::new(":proj:t", "dest", false, vec!["Path", "string"]);
        p.set(Value::String("foo/bar".into())).unwrap();
        assert_eq!(p.get().unwrap(), Value::Path(PathBuf::from("foo/bar")));
    }

    #[test]
    fn setdefault_only_assigns_when_empty() {
        let p = Property::new(":proj:t", "flag", false, vec!["bool"]);
        p.setdefault(Value::Bool(true)).unwrap();
        p.setdefault(Value::Bool(false)).unwrap();
        assert_eq!(p.get().unwrap(), Value::Bool(true));
    }

    #[test]
    fn set_from_tracks_lineage() {
        let upstream = Property::new(":proj:t1", "out", true, vec!["string"]);
        upstream.set(Value::String("hi".into())).unwrap();
        let downstream = Property::new(":proj:t2", "in", false, vec!["string"]);
        downstream.set_from(&upstream).unwrap();
        assert_eq!(downstream.get().unwrap(), Value::String("hi".into()));
        assert_eq!(downstream.derived_task_paths(), vec![":proj:t1".to_string()]);
    }

    #[test]
    fn provides_direct_branch() {
        let p = Property::new(":proj:t", "dest", false, vec!["string", "Path"]);
        assert!(p.provides("string"));
        assert!(p.provides("Path"));
        assert!(!p.provides("int"));
    }

    #[test]
    fn provides_and_get_of_type_honor_list_element() {
        let p = Property::new_list(":proj:t", "items", false, "string");
        assert!(p.provides("list"));
        assert!(p.provides("string"));
        assert!(p.get_of_type("string").is_none(), "no value set yet");

        p.set(Value::List(vec![Value::String("a".into()), Value::String("b".into())])).unwrap();
        assert_eq!(p.get_of_type("list"), Some(Value::List(vec![Value::String("a".into()), Value::String("b".into())])));
        assert_eq!(p.get_of_type("string"), Some(Value::String("a".into())));
        assert_eq!(p.get_of_type("int"), None);
    }
}
