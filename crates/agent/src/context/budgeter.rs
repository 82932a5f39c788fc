//! Context budgeter: fits prompt tiers into a fixed token budget.
//!
//! Filling order and policy:
//!
//! | Tier | Source | Policy |
//! |------|--------|--------|
//! | Prefix + guide | Identity, catalogue, query | Mandatory, subtracted first |
//! | Short-term | Ranked action results | Greedy, most relevant first |
//! | Long-term | Threshold-gated recall | Greedy, closest first |
//! | History | Recent turns | Greedy, newest first, then reversed |
//!
//! Each tier gets `min(share, remaining)`. Candidates are appended one at a
//! time and the cumulative cost is measured with the provider's own token
//! counter; the item that overflows is dropped and the tier stops there.
//! An item landing exactly on the quota is kept.

use serde::{Deserialize, Serialize};
use tandem_core::memory::{LongTermEntry, ShortTermEntry};
use tandem_core::message::Message;
use tandem_core::provider::Provider;
use tandem_memory::HistoryEntry;
use thiserror::Error;
use tracing::debug;

use crate::prompt;

/// Token budget: a hard total plus a discretionary share per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetShares {
    pub total: usize,
    pub short_term: usize,
    pub long_term: usize,
    pub history: usize,
}

impl Default for BudgetShares {
    fn default() -> Self {
        Self {
            total: 4000,
            short_term: 2000,
            long_term: 800,
            history: 1200,
        }
    }
}

/// Everything competing for space in one planner request.
pub struct BudgetInput<'a> {
    /// Mandatory leading messages
    pub prefix: Vec<Message>,
    /// Most relevant first
    pub short_term: &'a [ShortTermEntry],
    /// Closest first
    pub long_term: &'a [LongTermEntry],
    /// Chronological, oldest first
    pub history: &'a [HistoryEntry],
    /// Mandatory closing message
    pub guide: Message,
}

/// The messages that made it in, in request order.
#[derive(Debug, Clone)]
pub struct BudgetedContext {
    pub messages: Vec<Message>,
    /// Ids of the short-term entries included in `messages`
    pub short_term_ids: Vec<String>,
    /// Ids of the long-term entries included in `messages`
    pub long_term_ids: Vec<String>,
    pub stats: BudgetStats,
}

/// Accounting for one allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetStats {
    /// Cost of the final message list as counted by the provider
    pub total_tokens: usize,
    pub budget: usize,
    pub per_tier: Vec<TierStats>,
    pub drops: Vec<DropInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierStats {
    pub name: String,
    pub tokens: usize,
    pub items_included: usize,
    pub items_total: usize,
}

/// Items a tier had to leave out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropInfo {
    pub tier: String,
    pub items_dropped: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BudgetError {
    #[error("Mandatory messages ({mandatory_tokens} tokens) exceed the budget ({budget} tokens)")]
    MandatoryExceedsBudget { mandatory_tokens: usize, budget: usize },
}

const SHORT_TERM: &str = "short_term";
const LONG_TERM: &str = "long_term";
const HISTORY: &str = "history";

/// Stateless allocator; create one and reuse it.
#[derive(Debug, Clone, Default)]
pub struct ContextBudgeter {
    shares: BudgetShares,
}

impl ContextBudgeter {
    pub fn new(shares: BudgetShares) -> Self {
        Self { shares }
    }

    pub fn shares(&self) -> BudgetShares {
        self.shares
    }

    /// Allocate the budget across tiers, counting with `counter`.
    pub fn allocate(
        &self,
        counter: &dyn Provider,
        input: BudgetInput<'_>,
    ) -> Result<BudgetedContext, BudgetError> {
        let budget = self.shares.total;

        let mut mandatory = input.prefix.clone();
        mandatory.push(input.guide.clone());
        let mandatory_tokens = counter.count_tokens(&mandatory);
        if mandatory_tokens > budget {
            return Err(BudgetError::MandatoryExceedsBudget {
                mandatory_tokens,
                budget,
            });
        }
        let mut remaining = budget - mandatory_tokens;

        let mut per_tier = Vec::with_capacity(3);
        let mut drops = Vec::new();

        // ── Short-term ─────────────────────────────────────────────────────
        let candidates: Vec<Message> = input.short_term.iter().map(prompt::short_term_message).collect();
        let mut short_term = fill_tier(counter, candidates, self.shares.short_term.min(remaining));
        remaining = remaining.saturating_sub(short_term.tokens);
        record(SHORT_TERM, &short_term, input.short_term.len(), &mut per_tier, &mut drops);

        // ── Long-term ──────────────────────────────────────────────────────
        let candidates: Vec<Message> = input.long_term.iter().map(prompt::long_term_message).collect();
        let mut long_term = fill_tier(counter, candidates, self.shares.long_term.min(remaining));
        remaining = remaining.saturating_sub(long_term.tokens);
        record(LONG_TERM, &long_term, input.long_term.len(), &mut per_tier, &mut drops);

        // ── History (newest first, reversed below) ─────────────────────────
        let candidates: Vec<Message> = input.history.iter().rev().map(HistoryEntry::to_message).collect();
        let mut history = fill_tier(counter, candidates, self.shares.history.min(remaining));
        record(HISTORY, &history, input.history.len(), &mut per_tier, &mut drops);
        history.messages.reverse();

        // Token counters need not be additive across tiers; trim from the
        // lowest priority until the whole request fits.
        let mut trimmed = 0;
        let mut total_tokens = counter.count_tokens(&assemble(
            &input.prefix,
            &short_term.messages,
            &long_term.messages,
            &history.messages,
            &input.guide,
        ));
        while total_tokens > budget {
            let dropped = if history.messages.is_empty() {
                long_term
                    .messages
                    .pop()
                    .or_else(|| short_term.messages.pop())
                    .is_some()
            } else {
                history.messages.remove(0);
                true
            };
            if !dropped {
                return Err(BudgetError::MandatoryExceedsBudget {
                    mandatory_tokens: total_tokens,
                    budget,
                });
            }
            trimmed += 1;
            total_tokens = counter.count_tokens(&assemble(
                &input.prefix,
                &short_term.messages,
                &long_term.messages,
                &history.messages,
                &input.guide,
            ));
        }
        if trimmed > 0 {
            drops.push(DropInfo {
                tier: "combined".into(),
                items_dropped: trimmed,
                reason: "Combined request over budget".into(),
            });
        }

        let short_term_ids = input.short_term[..short_term.messages.len()]
            .iter()
            .map(|e| e.id.clone())
            .collect();
        let long_term_ids = input.long_term[..long_term.messages.len()]
            .iter()
            .map(|e| e.id.clone())
            .collect();

        let messages = assemble(
            &input.prefix,
            &short_term.messages,
            &long_term.messages,
            &history.messages,
            &input.guide,
        );

        debug!(
            total_tokens,
            budget,
            short_term = short_term.messages.len(),
            long_term = long_term.messages.len(),
            history = history.messages.len(),
            "Context budgeted"
        );

        Ok(BudgetedContext {
            messages,
            short_term_ids,
            long_term_ids,
            stats: BudgetStats {
                total_tokens,
                budget,
                per_tier,
                drops,
            },
        })
    }
}

struct Filled {
    messages: Vec<Message>,
    tokens: usize,
}

/// Greedy fill: stop at the first candidate that pushes the tier past `quota`.
fn fill_tier(counter: &dyn Provider, candidates: Vec<Message>, quota: usize) -> Filled {
    let mut messages = Vec::new();
    let mut tokens = 0;
    for candidate in candidates {
        messages.push(candidate);
        let cost = counter.count_tokens(&messages);
        if cost > quota {
            messages.pop();
            break;
        }
        tokens = cost;
    }
    Filled { messages, tokens }
}

fn record(
    tier: &str,
    filled: &Filled,
    available: usize,
    per_tier: &mut Vec<TierStats>,
    drops: &mut Vec<DropInfo>,
) {
    per_tier.push(TierStats {
        name: tier.into(),
        tokens: filled.tokens,
        items_included: filled.messages.len(),
        items_total: available,
    });
    let dropped = available - filled.messages.len();
    if dropped > 0 {
        drops.push(DropInfo {
            tier: tier.into(),
            items_dropped: dropped,
            reason: "Tier quota exhausted".into(),
        });
    }
}

fn assemble(
    prefix: &[Message],
    short_term: &[Message],
    long_term: &[Message],
    history: &[Message],
    guide: &Message,
) -> Vec<Message> {
    let mut messages =
        Vec::with_capacity(prefix.len() + short_term.len() + long_term.len() + history.len() + 1);
    messages.extend_from_slice(prefix);
    messages.extend_from_slice(short_term);
    messages.extend_from_slice(long_term);
    messages.extend_from_slice(history);
    messages.push(guide.clone());
    messages
}
