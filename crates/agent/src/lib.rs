//! The Tandem planning agent.
//!
//! Each query runs a bounded **plan → act → observe** cycle:
//!
//! 1. **Retrieve** short-term results, long-term knowledge and recent history
//! 2. **Budget** them into one request ([`ContextBudgeter`])
//! 3. **Decide** with a single model call ([`Planner`] → [`Decision`])
//! 4. **Act** through the [`ActionRegistry`](tandem_core::ActionRegistry) and
//!    record the result in short-term memory, or **respond** and promote
//!
//! The loop ends on a response, on unparseable output, on a failure, on the
//! stop flag, or when the action credit reaches zero.

pub mod context;
pub mod decision;
pub mod loop_runner;
pub mod planner;
pub mod prompt;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{
    BudgetError, BudgetInput, BudgetShares, BudgetStats, BudgetedContext, ContextBudgeter, DropInfo,
    TierStats,
};
pub use decision::{Decision, Thoughts};
pub use loop_runner::{
    AgentLoop, AgentReply, ERROR_RESPONSE, FALLBACK_RESPONSE, LoopSettings, ReplyOutcome, STOPPED_RESPONSE,
};
pub use planner::{Planner, PlannerError, PlannerInput, PlannerOutcome};
pub use session::{AgentSession, StopHandle};
