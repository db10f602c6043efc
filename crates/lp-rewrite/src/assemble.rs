//! Turning a finished stage chain into the replacement statement.

use lp_core::sema::Resolution;
use lp_core::syntax::{Expr, Stmt};
use lp_core::Result;

use crate::error::internal_error;
use crate::ops::{OpKind, ProspectiveOperation};

pub struct PipelineAssembler<'a> {
    resolution: &'a dyn Resolution,
}

impl<'a> PipelineAssembler<'a> {
    pub fn new(resolution: &'a dyn Resolution) -> Self {
        Self { resolution }
    }

    /// Build the statement that replaces the loop.
    ///
    /// A lone consuming stage over a source that takes a lambda directly
    /// skips the lazy-sequence adapter; every other chain starts with it.
    /// The terminal stage decides the statement shape around the chain.
    pub fn assemble(&self, source: &Expr, ops: &[ProspectiveOperation]) -> Result<Stmt> {
        let terminal = ops
            .last()
            .ok_or_else(|| internal_error("assembling an empty stage chain"))?;

        let direct = ops.len() == 1
            && terminal.kind == OpKind::ForEach
            && self.resolution.supports_direct_foreach(source);
        let mut chain = if direct {
            source.clone()
        } else {
            Expr::method_call(source.clone(), "stream", vec![])
        };
        for op in ops {
            let args = op.codegen(self.resolution)?;
            chain = Expr::method_call(chain, op.kind.method_name(), args);
        }

        let stmt = match terminal.kind {
            OpKind::AnyMatch => Stmt::if_then(chain, Stmt::ret(Expr::bool(true))),
            OpKind::NoneMatch => Stmt::if_then(Expr::not(chain), Stmt::ret(Expr::bool(false))),
            OpKind::Reduce => {
                let info = terminal
                    .reducer
                    .as_ref()
                    .ok_or_else(|| internal_error("reduce stage without accumulator info"))?;
                Stmt::expr(Expr::assign(Expr::ident(info.target.clone()), chain))
            }
            _ => Stmt::expr(chain),
        };
        Ok(stmt)
    }
}
