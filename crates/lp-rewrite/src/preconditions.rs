//! Eligibility verdict for a loop candidate.
//!
//! A loop is rejected when anything about it would change meaning under a
//! pipeline rendition: checked exceptions escaping the body, mutation of
//! outer non-effectively-final variables outside the one accumulator shape,
//! `break`, and `continue`/`return` outside their consumable patterns.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use lp_core::sema::Resolution;
use lp_core::syntax::{Expr, ExprKind, If, Lit, LoopConstruct, Stmt, StmtKind, Symbol};
use lp_core::Result;

use crate::error::internal_error;
use crate::queries::usage::declared_in;

/// Why a loop cannot be rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    ThrowsCheckedException,
    NonEffectivelyFinalViolation,
    HasBreak,
    UnsupportedContinue,
    UnsupportedReturn,
    SourceNotIterable,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            RejectReason::ThrowsCheckedException => "body may throw a checked exception",
            RejectReason::NonEffectivelyFinalViolation => {
                "body mutates an outer variable outside the accumulator shape"
            }
            RejectReason::HasBreak => "body contains break",
            RejectReason::UnsupportedContinue => "continue outside the guard pattern",
            RejectReason::UnsupportedReturn => "return outside the boolean-match pattern",
            RejectReason::SourceNotIterable => "iterated source is not a supported collection",
        };
        f.write_str(text)
    }
}

/// The checker's answer: either eligible, or the full list of reasons it
/// is not. The verdict is pure; checking the same loop twice against the
/// same resolution yields the same answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityVerdict {
    pub eligible: bool,
    pub reasons: Vec<RejectReason>,
}

impl EligibilityVerdict {
    pub fn eligible() -> Self {
        Self {
            eligible: true,
            reasons: Vec::new(),
        }
    }

    pub fn rejected(reasons: Vec<RejectReason>) -> Self {
        Self {
            eligible: false,
            reasons,
        }
    }
}

/// Facts the checker gathers on the way that later phases reuse.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopFacts {
    /// The loop variable plus every name declared inside the body.
    pub inner_vars: BTreeSet<Symbol>,
    /// The one permitted accumulator statement, if the body has one.
    pub reducer: Option<Stmt>,
}

pub struct PreconditionChecker<'a, R: Resolution + ?Sized> {
    resolution: &'a R,
}

impl<'a, R: Resolution + ?Sized> PreconditionChecker<'a, R> {
    pub fn new(resolution: &'a R) -> Self {
        Self { resolution }
    }

    /// Scan the loop once and produce the verdict plus reusable facts.
    ///
    /// Errors only on internal inconsistency: a variable the body declares
    /// that the resolution cannot describe.
    pub fn check(&self, loop_construct: &LoopConstruct) -> Result<(EligibilityVerdict, LoopFacts)> {
        let mut inner_vars = declared_in(&loop_construct.body);
        inner_vars.insert(loop_construct.var.clone());
        for name in &inner_vars {
            if self.resolution.var_properties(name).is_none() {
                return Err(internal_error(format!(
                    "no variable properties for loop-local `{name}`"
                )));
            }
        }

        let mut scan = BodyScan {
            resolution: self.resolution,
            inner_vars: &inner_vars,
            reasons: Vec::new(),
            reducer: None,
            bool_return_seen: false,
        };
        if !self.resolution.is_iterable_collection(&loop_construct.source) {
            scan.reject(RejectReason::SourceNotIterable);
        }
        if !self
            .resolution
            .checked_exceptions_of(&loop_construct.body)
            .is_empty()
        {
            scan.reject(RejectReason::ThrowsCheckedException);
        }
        scan.scan_block(std::slice::from_ref(&loop_construct.body), true, true);

        let reducer = scan.reducer;
        let verdict = if scan.reasons.is_empty() {
            EligibilityVerdict::eligible()
        } else {
            EligibilityVerdict::rejected(scan.reasons)
        };
        Ok((verdict, LoopFacts { inner_vars, reducer }))
    }
}

/// `if (cond) continue;` with no else, consumable at block level by
/// inverting the condition over the remaining statements.
pub(crate) fn as_continue_guard(stmt: &Stmt) -> Option<&If> {
    match &stmt.reduced().kind {
        StmtKind::If(if_stmt)
            if if_stmt.else_branch.is_none() && if_stmt.then_branch.is_continue() =>
        {
            Some(if_stmt)
        }
        _ => None,
    }
}

/// The boolean literal of an `if (cond) return <bool>;` then-branch.
pub(crate) fn bool_return_of(if_stmt: &If) -> Option<bool> {
    match &if_stmt.then_branch.reduced().kind {
        StmtKind::Return(Some(value)) => match &value.kind {
            ExprKind::Literal(Lit::Bool(literal)) => Some(*literal),
            _ => None,
        },
        _ => None,
    }
}

/// One walk over the body.
///
/// `tail` is true on the last statement reachable along every control-flow
/// path, and propagates into both branches of a trailing `if`. `decomposable`
/// is true only where the decomposer will actually take the tree apart: the
/// body's own statement list and then-branches of trailing else-less `if`s.
/// Consumable `continue`/`return`/accumulator shapes are legal only there.
struct BodyScan<'a, R: Resolution + ?Sized> {
    resolution: &'a R,
    inner_vars: &'a BTreeSet<Symbol>,
    reasons: Vec<RejectReason>,
    reducer: Option<Stmt>,
    bool_return_seen: bool,
}

impl<'a, R: Resolution + ?Sized> BodyScan<'a, R> {
    fn reject(&mut self, reason: RejectReason) {
        if !self.reasons.contains(&reason) {
            self.reasons.push(reason);
        }
    }

    fn scan_block(&mut self, stmts: &[Stmt], tail: bool, decomposable: bool) {
        let last_index = stmts.len().saturating_sub(1);
        for (index, stmt) in stmts.iter().enumerate() {
            if decomposable {
                if let Some(guard) = as_continue_guard(stmt) {
                    self.scan_expr(&guard.cond);
                    continue;
                }
            }
            let is_last = index == last_index;
            self.scan_stmt(stmt, tail && is_last, decomposable && is_last);
        }
    }

    fn scan_stmt(&mut self, stmt: &Stmt, tail: bool, decomposable: bool) {
        match &stmt.kind {
            StmtKind::Block(block) => self.scan_block(&block.stmts, tail, decomposable),
            StmtKind::If(if_stmt) => {
                self.scan_expr(&if_stmt.cond);
                if if_stmt.else_branch.is_none() && bool_return_of(if_stmt).is_some() {
                    if tail && decomposable && !self.bool_return_seen {
                        self.bool_return_seen = true;
                    } else {
                        self.reject(RejectReason::UnsupportedReturn);
                    }
                    return;
                }
                self.scan_stmt(
                    &if_stmt.then_branch,
                    tail,
                    decomposable && if_stmt.else_branch.is_none(),
                );
                if let Some(else_branch) = &if_stmt.else_branch {
                    self.scan_stmt(else_branch, tail, false);
                }
            }
            StmtKind::Return(_) => self.reject(RejectReason::UnsupportedReturn),
            StmtKind::Break => self.reject(RejectReason::HasBreak),
            StmtKind::Continue => self.reject(RejectReason::UnsupportedContinue),
            StmtKind::Decl(decl) => {
                if let Some(init) = &decl.init {
                    self.scan_expr(init);
                }
            }
            StmtKind::Expr(expr) => self.scan_expr_stmt(stmt, expr, tail && decomposable),
        }
    }

    /// An expression statement is the only place the one accumulator
    /// mutation may live, and only as the whole statement.
    fn scan_expr_stmt(&mut self, stmt: &Stmt, expr: &Expr, permitted_site: bool) {
        match &expr.kind {
            ExprKind::IncDec(_, target)
                if target.as_ident().map_or(false, |name| self.is_nef(name)) =>
            {
                self.reducer_site(stmt, permitted_site);
            }
            ExprKind::CompoundAssign(_, lhs, rhs)
                if lhs.as_ident().map_or(false, |name| self.is_nef(name)) =>
            {
                self.scan_expr(rhs);
                self.reducer_site(stmt, permitted_site);
            }
            _ => self.scan_expr(expr),
        }
    }

    fn reducer_site(&mut self, stmt: &Stmt, permitted: bool) {
        if permitted && self.reducer.is_none() {
            self.reducer = Some(stmt.clone());
        } else {
            self.reject(RejectReason::NonEffectivelyFinalViolation);
        }
    }

    fn scan_expr(&mut self, expr: &Expr) {
        let mut violation = false;
        expr.visit(&mut |expr| {
            if let ExprKind::Ident(name) = &expr.kind {
                if self.is_nef(name) {
                    violation = true;
                }
            }
        });
        if violation {
            self.reject(RejectReason::NonEffectivelyFinalViolation);
        }
    }

    /// Outer variable that is not effectively final. Mutation shapes over
    /// these are restricted; any other reference to one is a violation.
    fn is_nef(&self, name: &str) -> bool {
        match self.resolution.var_properties(name) {
            Some(props) => {
                props.is_parameter_or_local
                    && !props.is_effectively_final
                    && !props.declared_in_loop
                    && !self.inner_vars.contains(name)
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lp_core::sema::{StaticResolution, TypeClass, VarProperties};
    use lp_core::syntax::{BinOp, IncDecOp};
    use pretty_assertions::assert_eq;

    fn base_resolution() -> StaticResolution {
        StaticResolution::new()
            .with_collection("items")
            .with_var("x", VarProperties::loop_local(TypeClass::Other))
    }

    fn loop_over(body: Stmt) -> LoopConstruct {
        LoopConstruct::new("x", Expr::ident("items"), body)
    }

    fn check(resolution: &StaticResolution, body: Stmt) -> EligibilityVerdict {
        PreconditionChecker::new(resolution)
            .check(&loop_over(body))
            .map(|(verdict, _)| verdict)
            .unwrap()
    }

    #[test]
    fn plain_body_is_eligible() {
        let body = Stmt::block(vec![Stmt::expr(Expr::call(
            "println",
            vec![Expr::ident("x")],
        ))]);
        assert_eq!(check(&base_resolution(), body), EligibilityVerdict::eligible());
    }

    #[test]
    fn break_is_rejected() {
        let body = Stmt::block(vec![Stmt::if_then(
            Expr::method_call(Expr::ident("x"), "bad", vec![]),
            Stmt::brk(),
        )]);
        let verdict = check(&base_resolution(), body);
        assert_eq!(verdict.reasons, vec![RejectReason::HasBreak]);
    }

    #[test]
    fn continue_guard_is_permitted_at_block_level() {
        let body = Stmt::block(vec![
            Stmt::if_then(
                Expr::binary(BinOp::Eq, Expr::ident("x"), Expr::null()),
                Stmt::cont(),
            ),
            Stmt::expr(Expr::call("println", vec![Expr::ident("x")])),
        ]);
        assert!(check(&base_resolution(), body).eligible);
    }

    #[test]
    fn continue_inside_opaque_branch_is_rejected() {
        // The guard sits inside a non-trailing if, which the decomposer
        // would wrap whole; the continue cannot be consumed there.
        let body = Stmt::block(vec![
            Stmt::if_then(
                Expr::call("flaky", vec![Expr::ident("x")]),
                Stmt::block(vec![
                    Stmt::if_then(Expr::call("skip", vec![Expr::ident("x")]), Stmt::cont()),
                    Stmt::expr(Expr::call("touch", vec![Expr::ident("x")])),
                ]),
            ),
            Stmt::expr(Expr::call("println", vec![Expr::ident("x")])),
        ]);
        let verdict = check(&base_resolution(), body);
        assert_eq!(verdict.reasons, vec![RejectReason::UnsupportedContinue]);
    }

    #[test]
    fn trailing_boolean_return_is_permitted() {
        let body = Stmt::block(vec![Stmt::if_then(
            Expr::call("pred", vec![Expr::ident("x")]),
            Stmt::ret(Expr::bool(true)),
        )]);
        assert!(check(&base_resolution(), body).eligible);
    }

    #[test]
    fn non_trailing_return_is_rejected() {
        let body = Stmt::block(vec![
            Stmt::if_then(
                Expr::call("pred", vec![Expr::ident("x")]),
                Stmt::ret(Expr::bool(true)),
            ),
            Stmt::expr(Expr::call("println", vec![Expr::ident("x")])),
        ]);
        let verdict = check(&base_resolution(), body);
        assert_eq!(verdict.reasons, vec![RejectReason::UnsupportedReturn]);
    }

    #[test]
    fn value_return_is_rejected() {
        let body = Stmt::block(vec![Stmt::if_then(
            Expr::call("pred", vec![Expr::ident("x")]),
            Stmt::ret(Expr::ident("x")),
        )]);
        let verdict = check(&base_resolution(), body);
        assert_eq!(verdict.reasons, vec![RejectReason::UnsupportedReturn]);
    }

    #[test]
    fn trailing_accumulator_mutation_is_recorded_not_rejected() {
        let resolution = base_resolution()
            .with_collection("nums")
            .with_var("total", VarProperties::local(false, TypeClass::Integer));
        let accumulate = Stmt::expr(Expr::compound_assign(
            BinOp::Add,
            Expr::ident("total"),
            Expr::ident("x"),
        ));
        let body = Stmt::block(vec![accumulate.clone()]);

        let (verdict, facts) = PreconditionChecker::new(&resolution)
            .check(&loop_over(body))
            .unwrap();
        assert!(verdict.eligible);
        assert_eq!(facts.reducer, Some(accumulate));
    }

    #[test]
    fn second_mutation_site_is_rejected() {
        let resolution = base_resolution()
            .with_var("i", VarProperties::local(false, TypeClass::Integer))
            .with_var("j", VarProperties::local(false, TypeClass::Integer));
        let body = Stmt::block(vec![
            Stmt::expr(Expr::inc_dec(IncDecOp::PostInc, Expr::ident("i"))),
            Stmt::expr(Expr::inc_dec(IncDecOp::PostInc, Expr::ident("j"))),
        ]);
        let verdict = check(&resolution, body);
        assert_eq!(
            verdict.reasons,
            vec![RejectReason::NonEffectivelyFinalViolation]
        );
    }

    #[test]
    fn plain_read_of_mutable_outer_variable_is_rejected() {
        let resolution = base_resolution()
            .with_var("count", VarProperties::local(false, TypeClass::Integer));
        let body = Stmt::block(vec![Stmt::expr(Expr::call(
            "println",
            vec![Expr::ident("count")],
        ))]);
        let verdict = check(&resolution, body);
        assert_eq!(
            verdict.reasons,
            vec![RejectReason::NonEffectivelyFinalViolation]
        );
    }

    #[test]
    fn checked_exception_and_bad_source_are_both_reported() {
        let resolution = StaticResolution::new()
            .with_var("x", VarProperties::loop_local(TypeClass::Other))
            .with_throwing_method("read", vec!["IOException".to_string()]);
        let body = Stmt::block(vec![Stmt::expr(Expr::call(
            "read",
            vec![Expr::ident("x")],
        ))]);
        let verdict = check(&resolution, body);
        assert_eq!(
            verdict.reasons,
            vec![
                RejectReason::SourceNotIterable,
                RejectReason::ThrowsCheckedException,
            ]
        );
    }

    #[test]
    fn unresolvable_loop_local_is_an_internal_error() {
        let resolution = StaticResolution::new().with_collection("items");
        let body = Stmt::block(vec![Stmt::expr(Expr::ident("x"))]);
        let err = PreconditionChecker::new(&resolution)
            .check(&loop_over(body))
            .unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn verdicts_are_deterministic() {
        let body = Stmt::block(vec![Stmt::brk()]);
        let resolution = base_resolution();
        let first = check(&resolution, body.clone());
        let second = check(&resolution, body);
        assert_eq!(first, second);
    }
}
