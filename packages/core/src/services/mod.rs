//! Axis Services
//!
//! This module contains the query side of the accelerator:
//!
//! - `AxisEvaluator` - exact axis evaluation with a closure or range strategy
//! - `BoundedEvaluator` - range evaluation with leaf pruning, typed sibling
//!   scans and an opt-in depth bound
//! - `verification` - encoding invariants and strategy cross-checks
//!
//! Services sit between the structural store and callers; they never write.

pub mod axis_evaluator;
pub mod bounded_evaluator;
pub mod error;
pub mod strategy;
pub mod verification;

pub use axis_evaluator::AxisEvaluator;
pub use bounded_evaluator::{BoundedEvaluator, BoundedOptions, DepthBound};
pub use error::AxisError;
pub use strategy::{AxisStrategy, ClosureStrategy, RangeStrategy};
pub use verification::{
    check_pairwise_nesting, compare_bounded, verify_encoding, AxisMismatch, EncodingReport,
    EncodingViolation, StrategyComparison,
};
