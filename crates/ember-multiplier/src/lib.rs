//! # ember-multiplier — Loyalty multiplier engine.
//!
//! All calculations use integer arithmetic only for determinism.
//!
//! - **Accrual**: every epoch with a nonzero balance after the deposit epoch
//!   adds the balance to the member's multiplier points.
//! - **Linear growth**: the factor grows by a fixed number of basis points per
//!   loyalty level and is clamped at a cap.
//! - **Span integration**: the factor-weighted reward-per-share over any epoch
//!   span is computed in O(1) from the ledger's two prefix sums, split at the
//!   epoch where the cap is reached.

pub mod engine;

pub use engine::MultiplierEngine;
