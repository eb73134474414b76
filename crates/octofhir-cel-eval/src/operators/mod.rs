//! CEL standard function implementations
//!
//! Implementations are organized by category:
//! - Arithmetic operators (`_+_`, `_-_`, `_*_`, `_/_`, `_%_`, `-_`)
//! - Comparison operators (`_==_`, `_!=_`, `_<_`, `_<=_`, `_>_`, `_>=_`)
//! - Logical operators (`_&&_`, `_||_`, `!_`, `@not_strictly_false`)
//! - List and map functions (`@in`, `size`)
//! - String functions (`contains`, `startsWith`, `endsWith`, `matches`)
//! - Type conversions (`int`, `uint`, `double`, `bool`, `string`, `bytes`, `dyn`, `type`)
//! - Optional values (`hasValue`, `value`, `orValue`)
//!
//! Overload ids match the declarations the checker uses.

pub mod arithmetic;
pub mod comparison;
pub mod list;
pub mod logical;
pub mod optional;
pub mod string;
pub mod type_ops;

use crate::registry::{Func, FuncRegistry};

/// The standard function table
pub fn standard_functions() -> FuncRegistry {
    let mut registry = FuncRegistry::new();
    let groups: [fn() -> Vec<Func>; 7] = [
        arithmetic::functions,
        comparison::functions,
        logical::functions,
        list::functions,
        string::functions,
        type_ops::functions,
        optional::functions,
    ];
    for func in groups.into_iter().flat_map(|group| group()) {
        registry.merge(func);
    }
    log::debug!("standard function table holds {} functions", registry.len());
    registry
}
