//! Semantic-resolution interface.
//!
//! The rewrite engine consumes type and variable facts from whatever
//! compilation model the invoking layer runs on. That facility stays behind
//! the [`Resolution`] trait; [`StaticResolution`] is a table-driven
//! implementation for hosts (and tests) that can describe the context
//! declaratively.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::syntax::{Expr, ExprKind, Stmt};

/// Coarse type classification of a variable, used to pick named reduce
/// combinators (`Integer::sum`, `String::concat`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeClass {
    Integer,
    Long,
    Double,
    Str,
    Other,
}

/// Resolved facts about one local variable or parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarProperties {
    pub is_parameter_or_local: bool,
    pub is_effectively_final: bool,
    pub declared_in_loop: bool,
    pub type_class: TypeClass,
}

impl VarProperties {
    pub fn local(effectively_final: bool, type_class: TypeClass) -> Self {
        Self {
            is_parameter_or_local: true,
            is_effectively_final: effectively_final,
            declared_in_loop: false,
            type_class,
        }
    }

    pub fn loop_local(type_class: TypeClass) -> Self {
        Self {
            is_parameter_or_local: true,
            is_effectively_final: true,
            declared_in_loop: true,
            type_class,
        }
    }
}

/// External semantic facility: subtype facts about the iterated source,
/// variable properties, and escaping checked exceptions.
pub trait Resolution {
    /// Facts for a name, or `None` when the name does not resolve to a
    /// local variable or parameter (fields, type names, method names).
    fn var_properties(&self, name: &str) -> Option<VarProperties>;

    /// Whether the iterated expression's type is a supported collection
    /// (subtype of the collection supertype; arrays are not).
    fn is_iterable_collection(&self, source: &Expr) -> bool;

    /// Whether the source type consumes a lambda directly, so a lone
    /// terminal step needs no lazy-sequence adapter.
    fn supports_direct_foreach(&self, source: &Expr) -> bool;

    /// Checked exceptions that may escape the subtree, already filtered
    /// against the runtime-exception/error supertypes.
    fn checked_exceptions_of(&self, stmt: &Stmt) -> Vec<String>;
}

/// Table-driven [`Resolution`]: the invoking layer declares variables,
/// iterable sources and throwing methods up front.
#[derive(Debug, Clone, Default)]
pub struct StaticResolution {
    vars: BTreeMap<String, VarProperties>,
    iterable_sources: BTreeSet<String>,
    direct_foreach_sources: BTreeSet<String>,
    method_throws: BTreeMap<String, Vec<String>>,
    unchecked_supertypes: BTreeSet<String>,
}

impl StaticResolution {
    pub fn new() -> Self {
        let mut unchecked_supertypes = BTreeSet::new();
        unchecked_supertypes.insert("RuntimeException".to_string());
        unchecked_supertypes.insert("Error".to_string());
        Self {
            unchecked_supertypes,
            ..Self::default()
        }
    }

    pub fn with_var(mut self, name: impl Into<String>, props: VarProperties) -> Self {
        self.vars.insert(name.into(), props);
        self
    }

    /// Declare `name` as an iterable collection source that also supports
    /// direct terminal consumption (the common `List` case).
    pub fn with_collection(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.iterable_sources.insert(name.clone());
        self.direct_foreach_sources.insert(name);
        self
    }

    /// Declare `name` as iterable but requiring the lazy-sequence adapter
    /// even for a lone terminal step.
    pub fn with_lazy_collection(mut self, name: impl Into<String>) -> Self {
        self.iterable_sources.insert(name.into());
        self
    }

    pub fn with_throwing_method(
        mut self,
        method: impl Into<String>,
        exceptions: Vec<String>,
    ) -> Self {
        self.method_throws.insert(method.into(), exceptions);
        self
    }

    fn source_name(source: &Expr) -> Option<&str> {
        source.as_ident()
    }
}

impl Resolution for StaticResolution {
    fn var_properties(&self, name: &str) -> Option<VarProperties> {
        self.vars.get(name).copied()
    }

    fn is_iterable_collection(&self, source: &Expr) -> bool {
        Self::source_name(source)
            .map(|name| self.iterable_sources.contains(name))
            .unwrap_or(false)
    }

    fn supports_direct_foreach(&self, source: &Expr) -> bool {
        Self::source_name(source)
            .map(|name| self.direct_foreach_sources.contains(name))
            .unwrap_or(false)
    }

    fn checked_exceptions_of(&self, stmt: &Stmt) -> Vec<String> {
        let mut escaping = Vec::new();
        stmt.visit_exprs(&mut |expr| {
            let callee = match &expr.kind {
                ExprKind::Call(callee, _) => callee.as_ident(),
                ExprKind::MethodCall(_, name, _) => Some(name.as_str()),
                _ => None,
            };
            if let Some(name) = callee {
                if let Some(exceptions) = self.method_throws.get(name) {
                    for exception in exceptions {
                        if !self.unchecked_supertypes.contains(exception)
                            && !escaping.contains(exception)
                        {
                            escaping.push(exception.clone());
                        }
                    }
                }
            }
        });
        escaping
    }
}
