//! Variable bindings for evaluation

use crate::error::CelResult;
use crate::value::Value;
use indexmap::IndexMap;
use std::fmt;

/// Resolves variable names to values during evaluation
///
/// Names are fully qualified; `None` means the name is not bound here.
pub trait Activation: fmt::Debug {
    fn resolve(&self, name: &str) -> Option<CelResult>;
}

/// Activation with no bindings
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyActivation;

impl Activation for EmptyActivation {
    fn resolve(&self, _name: &str) -> Option<CelResult> {
        None
    }
}

/// Bindings held in a map
#[derive(Debug, Clone, Default)]
pub struct MapActivation {
    bindings: IndexMap<String, Value>,
}

impl MapActivation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`MapActivation::insert`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.bindings.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for MapActivation {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            bindings: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

impl Activation for MapActivation {
    fn resolve(&self, name: &str) -> Option<CelResult> {
        self.bindings.get(name).cloned().map(Ok)
    }
}

/// Two activations searched child first
#[derive(Debug, Clone, Copy)]
pub struct HierarchicalActivation<'a> {
    parent: &'a dyn Activation,
    child: &'a dyn Activation,
}

impl<'a> HierarchicalActivation<'a> {
    pub fn new(parent: &'a dyn Activation, child: &'a dyn Activation) -> Self {
        Self { parent, child }
    }
}

impl Activation for HierarchicalActivation<'_> {
    fn resolve(&self, name: &str) -> Option<CelResult> {
        self.child
            .resolve(name)
            .or_else(|| self.parent.resolve(name))
    }
}

/// Binds one name over a parent activation
///
/// The bound result may be an error, which is surfaced when the name is read.
#[derive(Debug)]
pub struct VarActivation<'p> {
    name: &'p str,
    value: CelResult,
    parent: &'p dyn Activation,
}

impl<'p> VarActivation<'p> {
    pub fn new(name: &'p str, value: CelResult, parent: &'p dyn Activation) -> Self {
        Self {
            name,
            value,
            parent,
        }
    }
}

impl Activation for VarActivation<'_> {
    fn resolve(&self, name: &str) -> Option<CelResult> {
        if name == self.name {
            return Some(self.value.clone());
        }
        self.parent.resolve(name)
    }
}

/// Scope of one comprehension iteration: the accumulator plus the iteration variables
#[derive(Debug)]
pub(crate) struct FoldActivation<'a> {
    pub(crate) parent: &'a dyn Activation,
    pub(crate) accu_var: &'a str,
    pub(crate) accu: &'a CelResult,
    pub(crate) iter_var: &'a str,
    pub(crate) iter_value: Value,
    pub(crate) iter_var2: Option<(&'a str, Value)>,
}

impl Activation for FoldActivation<'_> {
    fn resolve(&self, name: &str) -> Option<CelResult> {
        if name == self.iter_var {
            return Some(Ok(self.iter_value.clone()));
        }
        if let Some((var, value)) = &self.iter_var2 {
            if name == *var {
                return Some(Ok(value.clone()));
            }
        }
        if name == self.accu_var {
            return Some(self.accu.clone());
        }
        self.parent.resolve(name)
    }
}
