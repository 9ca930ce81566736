//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! Lazy values with provenance.
//!
//! A [`Supplier`] is a value that is computed on demand and that remembers
//! which other suppliers it was derived from (its "lineage"), shaped as a
//! closed set of supplier kinds behind a single handle type instead of an
//! open class hierarchy.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::{KrakenError, Result};

/// A type-erased handle into a supplier's lineage.
///
/// Suppliers of different item types can appear in the same lineage walk
/// (e.g. a `Supplier<PathBuf>` derived from a `Supplier<String>`), so the
/// lineage walker operates on this object-safe, non-generic view rather
/// than on `Supplier<T>` directly.
pub trait SupplierHandle {
    /// A short human-readable label, used in error messages and `Debug` output.
    fn label(&self) -> String;

    /// The suppliers this one is directly derived from.
    fn derived_from(&self) -> Vec<Rc<dyn SupplierHandle>>;

    /// Whether this supplier always fails with [`KrakenError::Empty`].
    fn is_void(&self) -> bool {
        false
    }

    /// The path of the task that owns this supplier, if it is backed by a
    /// task property. Used by [`crate::task`] to derive strict relationships
    /// from property lineage.
    fn owner_task_path(&self) -> Option<String> {
        None
    }
}

trait Inner<T> {
    fn get(&self) -> Result<T>;
    fn derived_from(&self) -> Vec<Rc<dyn SupplierHandle>> {
        Vec::new()
    }
    fn is_void(&self) -> bool {
        false
    }
    fn owner_task_path(&self) -> Option<String> {
        None
    }
}

/// A lazy value. See the module documentation for the concept.
pub struct Supplier<T> {
    label: String,
    inner: Rc<dyn Inner<T>>,
}

impl<T> Clone for Supplier<T> {
    fn clone(&self) -> Self {
        Supplier {
            label: self.label.clone(),
            inner: Rc::clone(&self.inner),
        }
    }
}

struct ConstantInner<T> {
    value: T,
    derived_from: Vec<Rc<dyn SupplierHandle>>,
}

impl<T: Clone> Inner<T> for ConstantInner<T> {
    fn get(&self) -> Result<T> {
        Ok(self.value.clone())
    }

    fn derived_from(&self) -> Vec<Rc<dyn SupplierHandle>> {
        self.derived_from.clone()
    }
}

struct CallableInner<T> {
    func: Box<dyn Fn() -> Result<T>>,
    derived_from: Vec<Rc<dyn SupplierHandle>>,
}

impl<T> Inner<T> for CallableInner<T> {
    fn get(&self) -> Result<T> {
        (self.func)()
    }

    fn derived_from(&self) -> Vec<Rc<dyn SupplierHandle>> {
        self.derived_from.clone()
    }
}

struct VoidInner {
    derived_from: Vec<Rc<dyn SupplierHandle>>,
}

impl<T> Inner<T> for VoidInner {
    fn get(&self) -> Result<T> {
        Err(KrakenError::Empty { label: "void".to_string(), message: None })
    }

    fn derived_from(&self) -> Vec<Rc<dyn SupplierHandle>> {
        self.derived_from.clone()
    }

    fn is_void(&self) -> bool {
        true
    }
}

struct MapInner<T, U> {
    upstream: Supplier<T>,
    func: Box<dyn Fn(T) -> U>,
}

impl<T: Clone + 'static, U> Inner<U> for MapInner<T, U> {
    fn get(&self) -> Result<U> {
        let value = self.upstream.get().map_err(|_| KrakenError::Empty {
            label: self.upstream.label.clone(),
            message: None,
        })?;
        Ok((self.func)(value))
    }

    fn derived_from(&self) -> Vec<Rc<dyn SupplierHandle>> {
        vec![self.upstream.as_handle()]
    }
}

struct OnceInner<T> {
    upstream: Supplier<T>,
    // The failure case is stored as a rendered message rather than the
    // original `KrakenError`, since the latter is not `Clone` (it boxes an
    // arbitrary `anyhow::Error` in one of its variants).
    cache: RefCell<Option<std::result::Result<T, String>>>,
}

impl<T: Clone> Inner<T> for OnceInner<T> {
    fn get(&self) -> Result<T> {
        if let Some(cached) = self.cache.borrow().as_ref() {
            return cached.clone().map_err(|msg| KrakenError::Empty { label: msg, message: None });
        }
        let stored = self.upstream.get().map_err(|e| e.to_string());
        *self.cache.borrow_mut() = Some(stored.clone());
        stored.map_err(|msg| KrakenError::Empty { label: msg, message: None })
    }

    fn derived_from(&self) -> Vec<Rc<dyn SupplierHandle>> {
        vec![self.upstream.as_handle()]
    }
}

impl<T: Clone + 'static> Supplier<T> {
    /// A supplier that always returns `value`.
    pub fn of(value: T) -> Self {
        Self::of_with_derivation(value, Vec::new())
    }

    /// Like [`of`](Self::of), but records an explicit lineage (used when the
    /// constant was itself computed from other suppliers).
    pub fn of_with_derivation(value: T, derived_from: Vec<Rc<dyn SupplierHandle>>) -> Self {
        Supplier {
            label: std::any::type_name::<T>().to_string(),
            inner: Rc::new(ConstantInner { value, derived_from }),
        }
    }

    /// A supplier that calls `func` every time it is resolved.
    pub fn of_callable(func: impl Fn() -> Result<T> + 'static) -> Self {
        Self::of_callable_with_derivation(func, Vec::new())
    }

    pub fn of_callable_with_derivation(
        func: impl Fn() -> Result<T> + 'static,
        derived_from: Vec<Rc<dyn SupplierHandle>>,
    ) -> Self {
        Supplier {
            label: std::any::type_name::<T>().to_string(),
            inner: Rc::new(CallableInner { func: Box::new(func), derived_from }),
        }
    }

    /// A supplier that always fails with [`KrakenError::Empty`].
    pub fn void() -> Self {
        Self::void_with_derivation(Vec::new())
    }

    pub fn void_with_derivation(derived_from: Vec<Rc<dyn SupplierHandle>>) -> Self {
        Supplier {
            label: std::any::type_name::<T>().to_string(),
            inner: Rc::new(VoidInner { derived_from }),
        }
    }

    /// Resolve the value, or fail with [`KrakenError::Empty`].
    pub fn get(&self) -> Result<T> {
        self.inner.get().map_err(|e| match e {
            KrakenError::Empty { message: None, .. } => {
                KrakenError::Empty { label: self.label.clone(), message: None }
            }
            other => other,
        })
    }

    /// Resolve the value, or return `fallback` if empty.
    pub fn get_or(&self, fallback: T) -> T {
        self.get().unwrap_or(fallback)
    }

    /// Resolve the value, or invoke `get_exception` to produce an error.
    pub fn get_or_raise(&self, get_exception: impl FnOnce() -> KrakenError) -> Result<T> {
        self.get().map_err(|_| get_exception())
    }

    pub fn is_empty(&self) -> bool {
        self.get().is_err()
    }

    pub fn is_filled(&self) -> bool {
        !self.is_empty()
    }

    pub fn is_void(&self) -> bool {
        self.inner.is_void()
    }

    /// Map this supplier's value through `func`, lazily.
    pub fn map<U: 'static>(&self, func: impl Fn(T) -> U + 'static) -> Supplier<U> {
        Supplier {
            label: std::any::type_name::<U>().to_string(),
            inner: Rc::new(MapInner { upstream: self.clone(), func: Box::new(func) }),
        }
    }

    /// Cache the first resolved value (or failure) forever.
    pub fn once(&self) -> Supplier<T> {
        Supplier {
            label: self.label.clone(),
            inner: Rc::new(OnceInner { upstream: self.clone(), cache: RefCell::new(None) }),
        }
    }

    /// A type-erased handle usable for lineage walking.
    pub fn as_handle(&self) -> Rc<dyn SupplierHandle> {
        Rc::new(self.clone())
    }

    /// Breadth-first enumeration of `(supplier, [direct upstream])` pairs.
    /// Does not deduplicate suppliers reachable via more than one path.
    pub fn lineage(&self) -> Vec<(Rc<dyn SupplierHandle>, Vec<Rc<dyn SupplierHandle>>)> {
        let mut out = Vec::new();
        let mut stack: VecDeque<Rc<dyn SupplierHandle>> = VecDeque::new();
        stack.push_back(self.as_handle());
        while let Some(current) = stack.pop_front() {
            let derived_from = current.derived_from();
            out.push((Rc::clone(&current), derived_from.clone()));
            for d in derived_from {
                stack.push_back(d);
            }
        }
        out
    }
}

impl<T: Clone + 'static> SupplierHandle for Supplier<T> {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn derived_from(&self) -> Vec<Rc<dyn SupplierHandle>> {
        self.inner.derived_from()
    }

    fn is_void(&self) -> bool {
        self.inner.is_void()
    }

    fn owner_task_path(&self) -> Option<String> {
        self.inner.owner_task_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn of_returns_value() {
        let s = Supplier::of(42);
        assert_eq!(s.get().unwrap(), 42);
    }

    #[test]
    fn void_is_always_empty() {
        let s: Supplier<i32> = Supplier::void();
        assert!(s.is_void());
        assert!(s.is_empty());
        assert_eq!(s.get_or(7), 7);
    }

    #[test]
    fn map_propagates_upstream_emptiness() {
        let s: Supplier<i32> = Supplier::void();
        let mapped = s.map(|v| v + 1);
        assert!(mapped.is_empty());
    }

    #[test]
    fn map_applies_function() {
        let s = Supplier::of(1);
        let mapped = s.map(|v| v * 10);
        assert_eq!(mapped.get().unwrap(), 10);
    }

    #[test]
    fn once_memoizes() {
        let calls = Rc::new(RefCell::new(0));
        let calls2 = Rc::clone(&calls);
        let s = Supplier::of_callable(move || {
            *calls2.borrow_mut() += 1;
            Ok(5)
        })
        .once();
        assert_eq!(s.get().unwrap(), 5);
        assert_eq!(s.get().unwrap(), 5);
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn lineage_walks_breadth_first() {
        let a = Supplier::of(1);
        let b = a.map(|v| v + 1);
        let c = b.map(|v| v + 1);
        let lineage = c.lineage();
        // c -> [b], b -> [a], a -> []
        assert_eq!(lineage.len(), 3);
        assert_eq!(lineage[0].1.len(), 1);
        assert_eq!(lineage[1].1.len(), 1);
        assert_eq!(lineage[2].1.len(), 0);
    }
}
