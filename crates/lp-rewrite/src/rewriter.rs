//! The engine entry point: verdict first, then stage construction, fusion,
//! cleanup, and assembly of the replacement statement.

use itertools::Itertools;

use lp_core::sema::Resolution;
use lp_core::syntax::{LoopConstruct, Stmt};
use lp_core::Result;

use crate::assemble::PipelineAssembler;
use crate::decompose::OperationDecomposer;
use crate::ops::{beautify_operations, merge_operations};
use crate::preconditions::{EligibilityVerdict, PreconditionChecker};

/// What the engine decided about one loop. `replacement` is present only
/// when the loop was eligible and every later phase succeeded; an eligible
/// loop the stage algebra cannot express keeps its verdict but stays
/// untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteOutcome {
    pub verdict: EligibilityVerdict,
    pub replacement: Option<Stmt>,
}

impl RewriteOutcome {
    fn untouched(verdict: EligibilityVerdict) -> Self {
        Self {
            verdict,
            replacement: None,
        }
    }
}

pub struct LoopRewriter<'a> {
    resolution: &'a dyn Resolution,
}

impl<'a> LoopRewriter<'a> {
    pub fn new(resolution: &'a dyn Resolution) -> Self {
        Self { resolution }
    }

    /// Verdict only, without constructing a pipeline. Internal errors
    /// degrade to "not eligible": a half-broken engine must never suggest
    /// a rewrite.
    pub fn check(&self, loop_construct: &LoopConstruct) -> EligibilityVerdict {
        match PreconditionChecker::new(self.resolution).check(loop_construct) {
            Ok((verdict, _)) => verdict,
            Err(error) => {
                tracing::error!(%error, "eligibility check failed");
                EligibilityVerdict::rejected(Vec::new())
            }
        }
    }

    /// Full run over one loop candidate.
    pub fn rewrite(&self, loop_construct: &LoopConstruct) -> RewriteOutcome {
        match self.try_rewrite(loop_construct) {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(%error, "rewrite failed, leaving the loop untouched");
                RewriteOutcome::untouched(EligibilityVerdict::rejected(Vec::new()))
            }
        }
    }

    fn try_rewrite(&self, loop_construct: &LoopConstruct) -> Result<RewriteOutcome> {
        let (verdict, facts) =
            PreconditionChecker::new(self.resolution).check(loop_construct)?;
        if !verdict.eligible {
            tracing::debug!(
                reasons = %verdict.reasons.iter().join(", "),
                "loop is not eligible"
            );
            return Ok(RewriteOutcome::untouched(verdict));
        }

        let decomposer = OperationDecomposer::new(self.resolution, &facts);
        let Some(ops) = decomposer.decompose(&loop_construct.body) else {
            tracing::debug!("body shape does not decompose, leaving the loop untouched");
            return Ok(RewriteOutcome::untouched(verdict));
        };
        let Some(ops) = merge_operations(ops) else {
            tracing::debug!("stages would not fuse, leaving the loop untouched");
            return Ok(RewriteOutcome::untouched(verdict));
        };
        // The head stage receives stream elements, so it may draw on the
        // loop variable and nothing else.
        if !ops[0].needed.iter().all(|name| name == &loop_construct.var) {
            tracing::debug!("head stage needs more than the loop variable");
            return Ok(RewriteOutcome::untouched(verdict));
        }

        let ops = beautify_operations(ops);
        let replacement =
            PipelineAssembler::new(self.resolution).assemble(&loop_construct.source, &ops)?;
        tracing::debug!(stages = ops.len(), "loop rewritten");
        Ok(RewriteOutcome {
            verdict,
            replacement: Some(replacement),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lp_core::sema::{StaticResolution, TypeClass, VarProperties};
    use lp_core::syntax::{render_stmt, BinOp, Expr};
    use pretty_assertions::assert_eq;

    #[test]
    fn eligible_loop_with_undecomposable_body_keeps_its_verdict() {
        // The guard consumes the whole body; nothing remains to pipeline.
        let resolution = StaticResolution::new()
            .with_collection("ls")
            .with_var("l", VarProperties::loop_local(TypeClass::Other));
        let body = Stmt::block(vec![Stmt::if_then(
            Expr::binary(BinOp::Eq, Expr::ident("l"), Expr::null()),
            Stmt::cont(),
        )]);
        let candidate = LoopConstruct::new("l", Expr::ident("ls"), body);

        let outcome = LoopRewriter::new(&resolution).rewrite(&candidate);
        assert!(outcome.verdict.eligible);
        assert_eq!(outcome.replacement, None);
    }

    #[test]
    fn internal_inconsistency_degrades_to_not_eligible() {
        // `s` is declared by the body but the resolution cannot describe it.
        let resolution = StaticResolution::new()
            .with_collection("ls")
            .with_var("l", VarProperties::loop_local(TypeClass::Other));
        let body = Stmt::block(vec![
            Stmt::decl(
                "s",
                Some("String"),
                Some(Expr::method_call(Expr::ident("l"), "toString", vec![])),
            ),
            Stmt::expr(Expr::call("println", vec![Expr::ident("s")])),
        ]);
        let candidate = LoopConstruct::new("l", Expr::ident("ls"), body);

        let rewriter = LoopRewriter::new(&resolution);
        let outcome = rewriter.rewrite(&candidate);
        assert!(!outcome.verdict.eligible);
        assert_eq!(outcome.replacement, None);
        assert!(!rewriter.check(&candidate).eligible);
    }

    #[test]
    fn head_stage_may_only_draw_on_the_loop_variable() {
        // A filter over an outer final local is fine to reference, but the
        // head stage itself must consume the stream element.
        let resolution = StaticResolution::new()
            .with_collection("ls")
            .with_var("l", VarProperties::loop_local(TypeClass::Other))
            .with_var("limit", VarProperties::local(true, TypeClass::Integer));
        let body = Stmt::block(vec![Stmt::expr(Expr::call(
            "println",
            vec![Expr::ident("l")],
        ))]);
        let candidate = LoopConstruct::new("l", Expr::ident("ls"), body);

        let outcome = LoopRewriter::new(&resolution).rewrite(&candidate);
        assert_eq!(
            outcome.replacement.map(|stmt| render_stmt(&stmt)),
            Some("ls.forEach(l -> println(l));".to_string())
        );
    }
}
