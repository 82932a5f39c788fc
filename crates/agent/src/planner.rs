//! The decision step: one budgeted request, one model call, one parsed decision.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tandem_core::action::ActionSpec;
use tandem_core::error::ProviderError;
use tandem_core::identity::Identity;
use tandem_core::memory::{LongTermEntry, ShortTermEntry};
use tandem_core::message::Message;
use tandem_core::provider::{Provider, ProviderRequest, Usage};
use tandem_memory::HistoryEntry;
use thiserror::Error;
use tracing::debug;

use crate::context::{BudgetError, BudgetInput, BudgetStats, ContextBudgeter};
use crate::decision::Decision;
use crate::prompt;

const TRUNCATION_MARK: &str = " [...]";

/// Inputs for one planner call.
pub struct PlannerInput<'a> {
    pub identity: &'a Identity,
    /// Registered actions, shown in the command catalogue
    pub catalogue: &'a [ActionSpec],
    pub query: &'a str,
    /// Chronological
    pub history: &'a [HistoryEntry],
    /// Most relevant first
    pub short_term: &'a [ShortTermEntry],
    /// Closest first
    pub long_term: &'a [LongTermEntry],
    /// Attempted-command notes for the current query
    pub attempted: &'a [String],
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PlannerOutcome {
    pub decision: Decision,
    /// Short-term entries that were actually part of the request
    pub consumed_short_term_ids: Vec<String>,
    pub usage: Option<Usage>,
    pub budget: BudgetStats,
}

#[derive(Debug, Clone, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Budget(#[from] BudgetError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub struct Planner {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    budgeter: ContextBudgeter,
}

impl Planner {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, budgeter: ContextBudgeter) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            budgeter,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn budgeter(&self) -> &ContextBudgeter {
        &self.budgeter
    }

    /// Build the request within budget, call the model once, parse the result.
    pub async fn decide(&self, input: PlannerInput<'_>) -> Result<PlannerOutcome, PlannerError> {
        let prefix = prompt::prefix_messages(input.identity, input.catalogue, input.now);
        let guide = self.fit_guide(&prefix, input.query, input.attempted);
        let context = self.budgeter.allocate(
            self.provider.as_ref(),
            BudgetInput {
                prefix,
                short_term: input.short_term,
                long_term: input.long_term,
                history: input.history,
                guide,
            },
        )?;

        let mut request = ProviderRequest::new(self.model.clone(), context.messages);
        request.temperature = self.temperature;

        debug!(
            model = %self.model,
            tokens = context.stats.total_tokens,
            short_term = context.short_term_ids.len(),
            long_term = context.long_term_ids.len(),
            "Planner request"
        );

        let response = self.provider.complete(request).await?;
        let decision = Decision::parse(&response.content);

        debug!(
            terminal = decision.is_terminal(),
            tokens_used = response.total_tokens(),
            "Planner decision"
        );

        Ok(PlannerOutcome {
            decision,
            consumed_short_term_ids: context.short_term_ids,
            usage: response.usage,
            budget: context.stats,
        })
    }

    /// The guide message, with the query cut down so that prefix and guide
    /// together fit the total budget. The full query stays in history.
    fn fit_guide(&self, prefix: &[Message], query: &str, attempted: &[String]) -> Message {
        let budget = self.budgeter.shares().total;
        let cost = |guide: &Message| {
            let mut messages = prefix.to_vec();
            messages.push(guide.clone());
            self.provider.count_tokens(&messages)
        };

        let full = prompt::guide_message(query, attempted);
        if cost(&full) <= budget {
            return full;
        }

        // Largest char-boundary prefix of the query that still fits.
        let boundaries: Vec<usize> = query.char_indices().map(|(i, _)| i).collect();
        let (mut lo, mut hi) = (0, boundaries.len().saturating_sub(1));
        while lo < hi {
            let mid = (lo + hi).div_ceil(2);
            let cut = format!("{}{TRUNCATION_MARK}", &query[..boundaries[mid]]);
            if cost(&prompt::guide_message(&cut, attempted)) <= budget {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        debug!(
            query_chars = boundaries.len(),
            kept_chars = lo,
            "Query truncated to fit the planner budget"
        );
        let kept = boundaries.get(lo).map_or(query, |&end| &query[..end]);
        prompt::guide_message(&format!("{kept}{TRUNCATION_MARK}"), attempted)
    }
}
