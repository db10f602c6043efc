//! Loop-to-pipeline rewrite engine.
//!
//! Takes a `for (var : source) body` candidate plus a semantic resolution,
//! decides whether the loop can become a functional pipeline without
//! changing meaning, and when it can, builds the replacement statement:
//! `source.stream().filter(..).map(..).forEach(..)` and friends, including
//! the `anyMatch`/`noneMatch` early-return shapes and `reduce`
//! accumulation.

pub mod assemble;
pub mod decompose;
pub mod error;
pub mod ops;
pub mod preconditions;
pub mod queries;
pub mod rewriter;

pub use assemble::PipelineAssembler;
pub use decompose::OperationDecomposer;
pub use ops::{OpBody, OpKind, ProspectiveOperation, ReducerInfo};
pub use preconditions::{EligibilityVerdict, LoopFacts, PreconditionChecker, RejectReason};
pub use rewriter::{LoopRewriter, RewriteOutcome};
