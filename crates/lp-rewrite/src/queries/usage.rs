//! Variable usage facts for a syntax subtree.
//!
//! Two sets drive the whole pipeline construction: the names a subtree
//! declares, and the locals/parameters it references. Needed-variable and
//! available-variable sets for every pipeline stage are derived from them.

use std::collections::BTreeSet;

use lp_core::sema::Resolution;
use lp_core::syntax::{Expr, ExprKind, Stmt, StmtKind, Symbol};

/// Usage facts for one subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageSummary {
    /// Names declared by the subtree itself, at any nesting depth.
    pub declared: BTreeSet<Symbol>,
    /// Locals and parameters the subtree references, declared ones included.
    pub referenced: BTreeSet<Symbol>,
}

/// Stateless analyzer; resolution is consulted to keep method and type names
/// out of the referenced set.
pub struct UsageAnalyzer<'a, R: Resolution + ?Sized> {
    resolution: &'a R,
}

impl<'a, R: Resolution + ?Sized> UsageAnalyzer<'a, R> {
    pub fn new(resolution: &'a R) -> Self {
        Self { resolution }
    }

    pub fn analyze_stmt(&self, stmt: &Stmt) -> UsageSummary {
        let mut summary = UsageSummary {
            declared: declared_in(stmt),
            referenced: BTreeSet::new(),
        };
        stmt.visit_exprs(&mut |expr| self.record(expr, &mut summary));
        summary.referenced.extend(summary.declared.iter().cloned());
        summary
    }

    pub fn analyze_expr(&self, expr: &Expr) -> UsageSummary {
        let mut summary = UsageSummary::default();
        expr.visit(&mut |expr| self.record(expr, &mut summary));
        summary
    }

    fn record(&self, expr: &Expr, summary: &mut UsageSummary) {
        if let ExprKind::Ident(name) = &expr.kind {
            let is_local = self
                .resolution
                .var_properties(name)
                .map(|props| props.is_parameter_or_local)
                .unwrap_or(false);
            if is_local {
                summary.referenced.insert(name.clone());
            }
        }
    }
}

/// Names declared anywhere inside `stmt`, independent of resolution.
pub fn declared_in(stmt: &Stmt) -> BTreeSet<Symbol> {
    let mut declared = BTreeSet::new();
    collect_declared(stmt, &mut declared);
    declared
}

fn collect_declared(stmt: &Stmt, declared: &mut BTreeSet<Symbol>) {
    match &stmt.kind {
        StmtKind::Block(block) => {
            for stmt in &block.stmts {
                collect_declared(stmt, declared);
            }
        }
        StmtKind::If(if_stmt) => {
            collect_declared(&if_stmt.then_branch, declared);
            if let Some(else_branch) = &if_stmt.else_branch {
                collect_declared(else_branch, declared);
            }
        }
        StmtKind::Decl(decl) => {
            declared.insert(decl.name.clone());
        }
        StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue | StmtKind::Expr(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lp_core::sema::{StaticResolution, TypeClass, VarProperties};
    use lp_core::syntax::BinOp;
    use pretty_assertions::assert_eq;

    fn names(items: &[&str]) -> BTreeSet<Symbol> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn declared_set_covers_nested_branches() {
        let body = Stmt::block(vec![
            Stmt::decl("s", Some("String"), Some(Expr::ident("l"))),
            Stmt::if_then(
                Expr::binary(BinOp::Ne, Expr::ident("s"), Expr::null()),
                Stmt::block(vec![Stmt::decl("t", Some("String"), None)]),
            ),
        ]);
        assert_eq!(declared_in(&body), names(&["s", "t"]));
    }

    #[test]
    fn referenced_set_keeps_locals_and_drops_method_names() {
        let resolution = StaticResolution::new()
            .with_var("l", VarProperties::loop_local(TypeClass::Other))
            .with_var("s", VarProperties::loop_local(TypeClass::Other));
        let body = Stmt::block(vec![
            Stmt::decl("s", Some("String"), Some(Expr::method_call(Expr::ident("l"), "toString", vec![]))),
            Stmt::expr(Expr::call("println", vec![Expr::ident("s")])),
        ]);

        let summary = UsageAnalyzer::new(&resolution).analyze_stmt(&body);
        assert_eq!(summary.declared, names(&["s"]));
        assert_eq!(summary.referenced, names(&["l", "s"]));
    }
}
