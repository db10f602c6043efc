//! Splitting a loop body into prospective pipeline stages.
//!
//! Each statement of the body becomes its own stage. Trailing else-less
//! `if`s become filters, `if (cond) continue;` guards invert into filters
//! over the rest of the block, boolean-return guards become match
//! terminals, and the one permitted accumulator statement splits into a
//! value map plus a reduce. Anything else becomes an opaque map.

use std::collections::BTreeSet;

use lp_core::sema::Resolution;
use lp_core::syntax::{BinOp, Expr, ExprKind, Stmt, StmtKind, Symbol};

use crate::ops::{OpKind, ProspectiveOperation, ReducerInfo};
use crate::preconditions::{as_continue_guard, bool_return_of, LoopFacts};
use crate::queries::usage::UsageAnalyzer;

pub struct OperationDecomposer<'a, R: Resolution + ?Sized> {
    resolution: &'a R,
    facts: &'a LoopFacts,
}

impl<'a, R: Resolution + ?Sized> OperationDecomposer<'a, R> {
    pub fn new(resolution: &'a R, facts: &'a LoopFacts) -> Self {
        Self { resolution, facts }
    }

    /// Produce the stage list for `body`, or `None` when the body has a
    /// shape the stage algebra cannot express.
    pub fn decompose(&self, body: &Stmt) -> Option<Vec<ProspectiveOperation>> {
        let mut ops = Vec::new();
        self.decompose_block(std::slice::from_ref(body), &mut ops)?;

        // A trailing lazy map would never run; eagerize it.
        if let Some(last) = ops.last_mut() {
            if last.kind == OpKind::Map {
                last.kind = OpKind::ForEach;
            }
        }
        match ops.last() {
            None => None,
            Some(op) if op.kind == OpKind::Filter => None,
            Some(_) => Some(ops),
        }
    }

    fn decompose_block(&self, stmts: &[Stmt], ops: &mut Vec<ProspectiveOperation>) -> Option<()> {
        for (index, stmt) in stmts.iter().enumerate() {
            if let Some(guard) = as_continue_guard(stmt) {
                // Invert the guard over everything after it; the rewritten
                // `if` is trailing by construction.
                let remaining = stmts[index + 1..].to_vec();
                let inverted =
                    Stmt::if_then(Expr::not(guard.cond.clone()), Stmt::block(remaining));
                return self.decompose_stmt(&inverted, true, ops);
            }
            let is_last = index == stmts.len() - 1;
            self.decompose_stmt(stmt, is_last, ops)?;
        }
        Some(())
    }

    fn decompose_stmt(
        &self,
        stmt: &Stmt,
        is_last: bool,
        ops: &mut Vec<ProspectiveOperation>,
    ) -> Option<()> {
        let stmt = stmt.reduced();
        match &stmt.kind {
            StmtKind::Block(block) if is_last => self.decompose_block(&block.stmts, ops),
            StmtKind::If(if_stmt) if if_stmt.else_branch.is_none() => {
                if let Some(literal) = bool_return_of(if_stmt) {
                    if !is_last {
                        return None;
                    }
                    let needed = self.needed_of_expr(&if_stmt.cond);
                    let op = if literal {
                        ProspectiveOperation::any_match(if_stmt.cond.clone(), needed)
                    } else {
                        ProspectiveOperation::none_match(if_stmt.cond.clone(), needed)
                    };
                    ops.push(op);
                    return Some(());
                }
                if is_last {
                    let needed = self.needed_of_expr(&if_stmt.cond);
                    ops.push(ProspectiveOperation::filter(if_stmt.cond.clone(), needed));
                    self.decompose_stmt(&if_stmt.then_branch, true, ops)
                } else {
                    // A non-trailing if cannot filter: the statements after
                    // it run either way. Keep it whole.
                    self.push_map(stmt, ops);
                    Some(())
                }
            }
            StmtKind::Decl(decl) => {
                let needed = match &decl.init {
                    Some(init) => self.needed_of_expr(init),
                    None => BTreeSet::new(),
                };
                let mut available = BTreeSet::new();
                available.insert(decl.name.clone());
                ops.push(ProspectiveOperation::map_stmts(
                    vec![stmt.clone()],
                    needed,
                    available,
                ));
                Some(())
            }
            StmtKind::Expr(_) if self.facts.reducer.as_ref() == Some(stmt) => {
                self.push_reducer(stmt, ops)
            }
            StmtKind::Expr(_) | StmtKind::If(_) | StmtKind::Block(_) => {
                self.push_map(stmt, ops);
                Some(())
            }
            StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue => None,
        }
    }

    /// Split the accumulator statement into the value it contributes per
    /// element and the fold that collects it.
    fn push_reducer(&self, stmt: &Stmt, ops: &mut Vec<ProspectiveOperation>) -> Option<()> {
        let expr = match &stmt.kind {
            StmtKind::Expr(expr) => expr,
            _ => return None,
        };
        match &expr.kind {
            ExprKind::CompoundAssign(op, lhs, rhs) => {
                let target = lhs.as_ident()?.to_string();
                let needed = self.needed_of_expr(rhs);
                ops.push(ProspectiveOperation::map_expr((**rhs).clone(), needed));
                ops.push(ProspectiveOperation::reduce(ReducerInfo { target, op: *op }));
                Some(())
            }
            ExprKind::IncDec(op, target) => {
                let target = target.as_ident()?.to_string();
                let op = if op.is_increment() {
                    BinOp::Add
                } else {
                    BinOp::Sub
                };
                ops.push(ProspectiveOperation::map_expr(Expr::int(1), BTreeSet::new()));
                ops.push(ProspectiveOperation::reduce(ReducerInfo { target, op }));
                Some(())
            }
            _ => None,
        }
    }

    fn push_map(&self, stmt: &Stmt, ops: &mut Vec<ProspectiveOperation>) {
        let summary = UsageAnalyzer::new(self.resolution).analyze_stmt(stmt);
        let needed: BTreeSet<Symbol> = summary
            .referenced
            .intersection(&self.facts.inner_vars)
            .filter(|name| !summary.declared.contains(*name))
            .cloned()
            .collect();
        ops.push(ProspectiveOperation::map_stmts(
            vec![stmt.clone()],
            needed.clone(),
            needed,
        ));
    }

    fn needed_of_expr(&self, expr: &Expr) -> BTreeSet<Symbol> {
        let summary = UsageAnalyzer::new(self.resolution).analyze_expr(expr);
        summary
            .referenced
            .intersection(&self.facts.inner_vars)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::OpBody;
    use lp_core::sema::{StaticResolution, TypeClass, VarProperties};
    use lp_core::syntax::render_expr;
    use pretty_assertions::assert_eq;

    fn set(items: &[&str]) -> BTreeSet<Symbol> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn facts(inner: &[&str], reducer: Option<Stmt>) -> LoopFacts {
        LoopFacts {
            inner_vars: set(inner),
            reducer,
        }
    }

    fn resolution_with(locals: &[&str]) -> StaticResolution {
        locals.iter().fold(StaticResolution::new(), |acc, name| {
            acc.with_var(*name, VarProperties::loop_local(TypeClass::Other))
        })
    }

    fn kinds(ops: &[ProspectiveOperation]) -> Vec<OpKind> {
        ops.iter().map(|op| op.kind).collect()
    }

    #[test]
    fn lone_statement_becomes_an_eager_stage() {
        let resolution = resolution_with(&["x"]);
        let facts = facts(&["x"], None);
        let body = Stmt::block(vec![Stmt::expr(Expr::call(
            "println",
            vec![Expr::ident("x")],
        ))]);
        let ops = OperationDecomposer::new(&resolution, &facts)
            .decompose(&body)
            .unwrap();
        assert_eq!(kinds(&ops), vec![OpKind::ForEach]);
        assert_eq!(ops[0].needed, set(&["x"]));
    }

    #[test]
    fn trailing_if_becomes_filter_then_stage() {
        let resolution = resolution_with(&["it"]);
        let facts = facts(&["it"], None);
        let body = Stmt::block(vec![Stmt::if_then(
            Expr::method_call(Expr::ident("it"), "isValid", vec![]),
            Stmt::block(vec![Stmt::expr(Expr::call(
                "process",
                vec![Expr::ident("it")],
            ))]),
        )]);
        let ops = OperationDecomposer::new(&resolution, &facts)
            .decompose(&body)
            .unwrap();
        assert_eq!(kinds(&ops), vec![OpKind::Filter, OpKind::ForEach]);
    }

    #[test]
    fn non_trailing_if_stays_an_opaque_map() {
        let resolution = resolution_with(&["l"]);
        let facts = facts(&["l"], None);
        let body = Stmt::block(vec![
            Stmt::if_then(
                Expr::binary(lp_core::syntax::BinOp::Eq, Expr::ident("l"), Expr::null()),
                Stmt::block(vec![Stmt::expr(Expr::call("report", vec![]))]),
            ),
            Stmt::expr(Expr::call("println", vec![Expr::ident("l")])),
        ]);
        let ops = OperationDecomposer::new(&resolution, &facts)
            .decompose(&body)
            .unwrap();
        assert_eq!(kinds(&ops), vec![OpKind::Map, OpKind::ForEach]);
        match &ops[0].body {
            OpBody::Stmts(stmts) => assert!(matches!(stmts[0].kind, StmtKind::If(_))),
            OpBody::Expr(_) => panic!("opaque stages carry statements"),
        }
    }

    #[test]
    fn continue_guard_inverts_into_filter() {
        let resolution = resolution_with(&["l"]);
        let facts = facts(&["l"], None);
        let body = Stmt::block(vec![
            Stmt::if_then(
                Expr::binary(lp_core::syntax::BinOp::Eq, Expr::ident("l"), Expr::null()),
                Stmt::cont(),
            ),
            Stmt::expr(Expr::call("println", vec![Expr::ident("l")])),
        ]);
        let ops = OperationDecomposer::new(&resolution, &facts)
            .decompose(&body)
            .unwrap();
        assert_eq!(kinds(&ops), vec![OpKind::Filter, OpKind::ForEach]);
        match &ops[0].body {
            OpBody::Expr(cond) => assert_eq!(render_expr(cond), "!(l == null)"),
            OpBody::Stmts(_) => panic!("filters carry a condition expression"),
        }
    }

    #[test]
    fn boolean_return_guard_becomes_match_terminal() {
        let resolution = resolution_with(&["t"]);
        let facts = facts(&["t"], None);
        let body = Stmt::block(vec![Stmt::if_then(
            Expr::call("pred", vec![Expr::ident("t")]),
            Stmt::ret(Expr::bool(false)),
        )]);
        let ops = OperationDecomposer::new(&resolution, &facts)
            .decompose(&body)
            .unwrap();
        assert_eq!(kinds(&ops), vec![OpKind::NoneMatch]);
    }

    #[test]
    fn accumulator_splits_into_map_and_reduce() {
        let resolution = resolution_with(&["x"])
            .with_var("total", VarProperties::local(false, TypeClass::Integer));
        let accumulate = Stmt::expr(Expr::compound_assign(
            BinOp::Add,
            Expr::ident("total"),
            Expr::ident("x"),
        ));
        let facts = facts(&["x"], Some(accumulate.clone()));
        let body = Stmt::block(vec![accumulate]);
        let ops = OperationDecomposer::new(&resolution, &facts)
            .decompose(&body)
            .unwrap();
        assert_eq!(kinds(&ops), vec![OpKind::Map, OpKind::Reduce]);
        assert_eq!(ops[0].body, OpBody::Expr(Expr::ident("x")));
        assert_eq!(
            ops[1].reducer,
            Some(ReducerInfo {
                target: "total".to_string(),
                op: BinOp::Add,
            })
        );
    }

    #[test]
    fn guard_with_nothing_after_it_yields_no_stages() {
        let resolution = resolution_with(&["l"]);
        let facts = facts(&["l"], None);
        let body = Stmt::block(vec![Stmt::if_then(
            Expr::binary(lp_core::syntax::BinOp::Eq, Expr::ident("l"), Expr::null()),
            Stmt::cont(),
        )]);
        let decomposer = OperationDecomposer::new(&resolution, &facts);
        assert_eq!(decomposer.decompose(&body), None);
    }
}
