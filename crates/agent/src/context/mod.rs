//! Context budgeting for planner requests.
//!
//! See [`budgeter`] for the tier order and the greedy fill policy.

pub mod budgeter;

pub use budgeter::{
    BudgetError, BudgetInput, BudgetShares, BudgetStats, BudgetedContext, ContextBudgeter, DropInfo,
    TierStats,
};
