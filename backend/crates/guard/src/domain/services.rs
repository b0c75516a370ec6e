//! Domain Services
//!
//! Question generation and answer comparison for the captcha guard.

use std::ops::RangeInclusive;

use platform::crypto::constant_time_eq;
use rand::Rng;

use crate::domain::value_objects::MathOperator;

/// Both operands are drawn from this range.
pub const OPERAND_RANGE: RangeInclusive<i32> = 1..=10;

/// A generated arithmetic question and its canonical answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathQuestion {
    pub text: String,
    pub answer: String,
}

/// Draw two operands and an operator, e.g. `"7 × 3 = ?"` answering `"21"`.
pub fn generate_math_question<R: Rng + ?Sized>(rng: &mut R) -> MathQuestion {
    let lhs = rng.random_range(OPERAND_RANGE);
    let rhs = rng.random_range(OPERAND_RANGE);
    let operator = MathOperator::ALL[rng.random_range(0..MathOperator::ALL.len())];

    MathQuestion {
        text: format!("{lhs} {} {rhs} = ?", operator.symbol()),
        answer: operator.apply(lhs, rhs).to_string(),
    }
}

/// Exact string comparison after trimming surrounding whitespace.
pub fn answer_matches(expected: &str, submitted: &str) -> bool {
    constant_time_eq(expected.trim().as_bytes(), submitted.trim().as_bytes())
}
