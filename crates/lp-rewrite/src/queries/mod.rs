// Stateless queries over syntax subtrees.

pub mod usage;

pub use usage::{UsageAnalyzer, UsageSummary};
