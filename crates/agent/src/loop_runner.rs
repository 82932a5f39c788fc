//! The agent loop: plan, act, observe, until a response or the credit runs out.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tandem_core::action::{ActionArgs, ActionRegistry};
use tandem_core::error::ActionError;
use tandem_core::event::{AgentEvent, EventSink, NullSink};
use tandem_core::memory::MemoryKey;
use tandem_core::provider::Provider;
use tandem_memory::PromotionReport;
use tracing::{debug, info, warn};

use crate::context::ContextBudgeter;
use crate::decision::Decision;
use crate::planner::{Planner, PlannerInput};
use crate::prompt;
use crate::session::AgentSession;

/// Reply when the credit runs out without a terminal decision.
pub const FALLBACK_RESPONSE: &str = "I was unable to respond within my action budget.";

/// Reply when an action or the model fails.
pub const ERROR_RESPONSE: &str = "System error, please retry.";

/// Reply when the stop flag ends the query.
pub const STOPPED_RESPONSE: &str = "Stopped before a response was ready.";

const PROMOTION_NOTICE: &str = "Moving short-term memory to long-term memory...";

/// Loop tunables.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Planner iterations allowed per query
    pub action_credit: u32,
    pub history_window: usize,
    pub short_term_top_k: usize,
    pub long_term_top_k: usize,
    /// Long-term recall gate (distance, inclusive)
    pub relevance_threshold: f32,
    /// Promotion dedup gate (distance, inclusive)
    pub dedup_threshold: f32,
    pub action_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            action_credit: 5,
            history_window: 5,
            short_term_top_k: 5,
            long_term_top_k: 5,
            relevance_threshold: 0.35,
            dedup_threshold: 0.1,
            action_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// How a query ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyOutcome {
    /// The planner chose `respond`.
    Responded,
    /// The planner output was not a decision; its raw text is the reply.
    Unparsed,
    /// An action, the model, or memory failed.
    Failed,
    /// The credit ran out.
    Exhausted,
    /// The stop flag was observed.
    Stopped,
}

#[derive(Debug, Clone)]
pub struct AgentReply {
    pub response: String,
    pub outcome: ReplyOutcome,
    /// Planner invocations made for this query
    pub iterations: u32,
    /// Present only on the respond path, when promotion succeeded
    pub promotion: Option<PromotionReport>,
}

/// The core agent loop that orchestrates planner calls and action dispatch.
pub struct AgentLoop {
    planner: Planner,

    /// Action registry
    actions: Arc<ActionRegistry>,

    /// Status events for the front end
    events: Arc<dyn EventSink>,

    settings: LoopSettings,
}

impl AgentLoop {
    /// Create a new agent loop with default budget and settings.
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, actions: Arc<ActionRegistry>) -> Self {
        Self {
            planner: Planner::new(provider, model, ContextBudgeter::default()),
            actions,
            events: Arc::new(NullSink),
            settings: LoopSettings::default(),
        }
    }

    /// Replace the planner (model, temperature, budget).
    pub fn with_planner(mut self, planner: Planner) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_settings(mut self, settings: LoopSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Answer one query. Never fails: every error becomes a degraded reply.
    pub async fn run(&self, session: &mut AgentSession, query: &str) -> AgentReply {
        info!(session = %session.token(), query = %query, "Processing query");

        session.history.push_user(query);
        session.begin_query(self.settings.action_credit);

        let catalogue = self.actions.catalogue();
        let mut iterations = 0;

        loop {
            if session.stop_requested() {
                info!(session = %session.token(), iterations, "Stop requested");
                return self.finish(STOPPED_RESPONSE, ReplyOutcome::Stopped, iterations, None);
            }
            if session.credit == 0 {
                warn!(session = %session.token(), iterations, "Action credit exhausted");
                return self.finish(FALLBACK_RESPONSE, ReplyOutcome::Exhausted, iterations, None);
            }

            session.credit -= 1;
            iterations += 1;
            debug!(session = %session.token(), iteration = iterations, credit = session.credit, "Agent loop iteration");

            self.emit(session, AgentEvent::Thinking { query: query.to_string() });

            // ── Retrieval ──
            let short_term = match session
                .short_term
                .query(query, self.settings.short_term_top_k)
                .await
            {
                Ok(ranked) => ranked.into_iter().map(|r| r.entry).collect::<Vec<_>>(),
                Err(e) => return self.fail(session, format!("Short-term recall failed: {e}"), iterations),
            };
            let long_term = match session
                .long_term
                .query(query, self.settings.long_term_top_k, self.settings.relevance_threshold)
                .await
            {
                Ok(hits) => hits.into_iter().map(|h| h.entry).collect::<Vec<_>>(),
                Err(e) => return self.fail(session, format!("Long-term recall failed: {e}"), iterations),
            };

            // ── Plan ──
            let input = PlannerInput {
                identity: session.identity(),
                catalogue: &catalogue,
                query,
                history: session.history.recent(self.settings.history_window),
                short_term: &short_term,
                long_term: &long_term,
                attempted: &session.attempted,
                now: Utc::now(),
            };
            let outcome = match tokio::time::timeout(self.settings.request_timeout, self.planner.decide(input)).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => return self.fail(session, format!("Planner failed: {e}"), iterations),
                Err(_) => {
                    return self.fail(
                        session,
                        format!(
                            "Planner timed out after {}s",
                            self.settings.request_timeout.as_secs()
                        ),
                        iterations,
                    );
                }
            };
            session.candidates.extend(outcome.consumed_short_term_ids);

            if let Some(speak) = outcome.decision.thoughts().and_then(|t| t.speak.clone()) {
                self.emit(session, AgentEvent::Speak { content: speak });
            }

            // ── Act ──
            match outcome.decision {
                Decision::Invalid { raw, reason } => {
                    debug!(session = %session.token(), reason = %reason, "Unparseable decision");
                    session.history.push_assistant(raw.clone());
                    self.emit(session, AgentEvent::Speak { content: raw.clone() });
                    return self.finish(&raw, ReplyOutcome::Unparsed, iterations, None);
                }
                Decision::Respond { response, .. } => {
                    self.emit(session, AgentEvent::Speak { content: response.clone() });
                    session.history.push_assistant(response.clone());
                    let promotion = self.promote(session, query, &response).await;
                    return self.finish(&response, ReplyOutcome::Responded, iterations, promotion);
                }
                Decision::Act { name, args, .. } => {
                    if let Err(e) = self.dispatch(session, &name, &args).await {
                        return self.fail(session, format!("Action '{name}' failed: {e}"), iterations);
                    }
                    session.attempted.push(prompt::attempted_note(&name, &args));
                }
            }
        }
    }

    /// Run one action and record its result. Unknown names are a no-op.
    async fn dispatch(&self, session: &mut AgentSession, name: &str, args: &ActionArgs) -> Result<(), ActionError> {
        let Some(action) = self.actions.get(name) else {
            debug!(session = %session.token(), action = %name, "Unknown action, skipping");
            return Ok(());
        };

        self.emit(
            session,
            AgentEvent::ActionStarted {
                name: name.to_string(),
                args: args.clone(),
            },
        );

        let start = std::time::Instant::now();
        let output = tokio::time::timeout(self.settings.action_timeout, action.execute(args))
            .await
            .map_err(|_| ActionError::Timeout {
                action: name.to_string(),
                timeout_secs: self.settings.action_timeout.as_secs(),
            })??;

        let id = session
            .short_term
            .add(MemoryKey::action(name, args.clone()), output.content)
            .await
            .map_err(|e| ActionError::ExecutionFailed {
                action: name.to_string(),
                reason: e.to_string(),
            })?;

        info!(
            session = %session.token(),
            action = %name,
            entry = %id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Action completed"
        );
        Ok(())
    }

    /// Promote this query's candidates and store the exchange.
    async fn promote(&self, session: &AgentSession, query: &str, response: &str) -> Option<PromotionReport> {
        self.emit(
            session,
            AgentEvent::System {
                message: PROMOTION_NOTICE.into(),
            },
        );

        let candidates = session.short_term.entries_by_ids(session.candidates.iter());
        let result = async {
            let mut report = session
                .long_term
                .promote(&candidates, self.settings.dedup_threshold)
                .await?;
            let exchange = session.long_term.remember_exchange(query, response).await?;
            report.inserted.push(exchange);
            Ok::<_, tandem_core::error::MemoryError>(report)
        }
        .await;

        match result {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(session = %session.token(), "Promotion to long-term memory failed: {e}");
                None
            }
        }
    }

    fn fail(&self, session: &AgentSession, message: String, iterations: u32) -> AgentReply {
        warn!(session = %session.token(), iteration = iterations, "{message}");
        self.emit(session, AgentEvent::Error { message });
        self.emit(
            session,
            AgentEvent::Speak {
                content: ERROR_RESPONSE.into(),
            },
        );
        self.finish(ERROR_RESPONSE, ReplyOutcome::Failed, iterations, None)
    }

    fn finish(
        &self,
        response: &str,
        outcome: ReplyOutcome,
        iterations: u32,
        promotion: Option<PromotionReport>,
    ) -> AgentReply {
        AgentReply {
            response: response.to_string(),
            outcome,
            iterations,
            promotion,
        }
    }

    fn emit(&self, session: &AgentSession, event: AgentEvent) {
        self.events.emit(session.token(), event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StopHandle;
    use crate::test_helpers::{
        EchoAction, FailingAction, SequentialMockProvider, SlowAction, decision_json, respond_json,
        test_session,
    };
    use tandem_core::event::ChannelSink;
    use tandem_core::message::Role;
    use tandem_core::action::{Action, ActionOutput, ActionSpec};

    fn registry(actions: Vec<Arc<dyn Action>>) -> Arc<ActionRegistry> {
        let mut registry = ActionRegistry::new();
        for action in actions {
            registry.register(action);
        }
        Arc::new(registry)
    }

    fn build_agent(provider: Arc<SequentialMockProvider>, actions: Arc<ActionRegistry>) -> AgentLoop {
        AgentLoop::new(provider, "mock-model", actions)
    }

    #[tokio::test]
    async fn action_then_respond_uses_two_credits() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            &decision_json("echo", serde_json::json!({"text": "four"})),
            &respond_json("The answer is 4."),
        ]));
        let agent = build_agent(provider.clone(), registry(vec![Arc::new(EchoAction)]));
        let mut session = test_session();

        let reply = agent.run(&mut session, "What is 2+2?").await;

        assert_eq!(reply.outcome, ReplyOutcome::Responded);
        assert_eq!(reply.response, "The answer is 4.");
        assert_eq!(reply.iterations, 2);
        assert_eq!(session.credit(), 3);
        assert_eq!(provider.call_count(), 2);
        assert_eq!(session.short_term().len(), 1);

        // The action result reached the second planner request.
        let second = &provider.requests()[1];
        assert!(second.messages.iter().any(|m| m.role == Role::Assistant && m.content.contains("four")));
        assert!(second.messages.last().unwrap().content.contains("has been tried"));

        let roles: Vec<Role> = session.history().entries().iter().map(|e| e.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn respond_promotes_candidates_and_the_exchange() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            &decision_json("echo", serde_json::json!({"text": "Paris is the capital of France"})),
            &respond_json("Paris."),
        ]));
        let agent = build_agent(provider, registry(vec![Arc::new(EchoAction)]));
        let mut session = test_session();

        let reply = agent.run(&mut session, "capital of France?").await;

        let promotion = reply.promotion.unwrap();
        // One promoted action result plus the exchange.
        assert_eq!(promotion.inserted.len(), 2);
        assert_eq!(session.long_term().count().await.unwrap(), 2);
        assert_eq!(session.candidates().len(), 1);
        for id in session.candidates() {
            assert!(session.short_term().contains(id));
        }
    }

    #[tokio::test]
    async fn unknown_command_exhausts_credit_without_memory_writes() {
        let provider = Arc::new(SequentialMockProvider::repeating(
            &decision_json("teleport", serde_json::json!({"to": "mars"})),
            5,
        ));
        let agent = build_agent(provider.clone(), registry(vec![Arc::new(EchoAction)]));
        let (sink, mut rx) = ChannelSink::new();
        let agent = agent.with_events(Arc::new(sink));
        let mut session = test_session();

        let reply = agent.run(&mut session, "go to mars").await;

        assert_eq!(reply.outcome, ReplyOutcome::Exhausted);
        assert_eq!(reply.response, FALLBACK_RESPONSE);
        assert_eq!(reply.iterations, 5);
        assert_eq!(provider.call_count(), 5);
        assert_eq!(session.credit(), 0);
        assert!(session.short_term().is_empty());
        assert_eq!(session.attempted().len(), 5);

        // Exhaustion is not an error event.
        while let Ok(event) = rx.try_recv() {
            assert!(!matches!(event.event, AgentEvent::Error { .. }));
        }
    }

    #[tokio::test]
    async fn unparseable_output_is_returned_verbatim() {
        let provider = Arc::new(SequentialMockProvider::single_text("Just text, no JSON."));
        let agent = build_agent(provider, registry(vec![]));
        let mut session = test_session();

        let reply = agent.run(&mut session, "hi").await;

        assert_eq!(reply.outcome, ReplyOutcome::Unparsed);
        assert_eq!(reply.response, "Just text, no JSON.");
        assert_eq!(reply.iterations, 1);
        let last = session.history().entries().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "Just text, no JSON.");
        assert_eq!(session.long_term().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn earlier_results_survive_a_later_failure() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            &decision_json("echo", serde_json::json!({"text": "kept"})),
            &decision_json("fail", serde_json::json!({})),
        ]));
        let agent = build_agent(
            provider.clone(),
            registry(vec![Arc::new(EchoAction), Arc::new(FailingAction)]),
        );
        let mut session = test_session();

        let reply = agent.run(&mut session, "echo then break").await;

        assert_eq!(reply.outcome, ReplyOutcome::Failed);
        assert_eq!(reply.iterations, 2);
        assert_eq!(session.short_term().len(), 1);
        let id = &session.short_term().ids()[0];
        assert_eq!(session.short_term().get(id).unwrap().content, "kept");
        assert_eq!(session.long_term().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn oversized_query_still_reaches_the_model() {
        let provider = Arc::new(SequentialMockProvider::texts(&[&respond_json("Here is a summary.")]));
        let agent = build_agent(provider.clone(), registry(vec![]));
        let mut session = test_session();
        let query = "please summarise this pasted text ".repeat(500);

        let reply = agent.run(&mut session, &query).await;

        assert_eq!(reply.outcome, ReplyOutcome::Responded);
        assert_eq!(reply.response, "Here is a summary.");
        assert_eq!(provider.call_count(), 1);
        // History keeps the full query even though the request carried a cut.
        assert_eq!(session.history().entries()[0].content, query);
    }

    #[tokio::test]
    async fn action_failure_degrades_and_stops_the_loop() {
        let provider = Arc::new(SequentialMockProvider::texts(&[&decision_json(
            "fail",
            serde_json::json!({}),
        )]));
        let agent = build_agent(provider.clone(), registry(vec![Arc::new(FailingAction)]));
        let (sink, mut rx) = ChannelSink::new();
        let agent = agent.with_events(Arc::new(sink));
        let mut session = test_session();

        let reply = agent.run(&mut session, "break something").await;

        assert_eq!(reply.outcome, ReplyOutcome::Failed);
        assert_eq!(reply.response, ERROR_RESPONSE);
        assert_eq!(provider.call_count(), 1);

        let mut saw_error = false;
        while let Ok(event) = rx.try_recv() {
            if let AgentEvent::Error { message } = &event.event {
                assert!(message.contains("fail"));
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_action_times_out() {
        let provider = Arc::new(SequentialMockProvider::texts(&[&decision_json(
            "slow",
            serde_json::json!({}),
        )]));
        let agent = build_agent(provider, registry(vec![Arc::new(SlowAction(Duration::from_secs(600)))]))
            .with_settings(LoopSettings {
                action_timeout: Duration::from_secs(1),
                ..LoopSettings::default()
            });
        let mut session = test_session();

        let reply = agent.run(&mut session, "wait").await;

        assert_eq!(reply.outcome, ReplyOutcome::Failed);
        assert!(session.short_term().is_empty());
    }

    #[tokio::test]
    async fn gateway_error_is_an_action_failure() {
        let provider = Arc::new(SequentialMockProvider::failing(
            tandem_core::error::ProviderError::Timeout("upstream".into()),
        ));
        let agent = build_agent(provider, registry(vec![]));
        let mut session = test_session();

        let reply = agent.run(&mut session, "hello").await;

        assert_eq!(reply.outcome, ReplyOutcome::Failed);
        assert_eq!(reply.iterations, 1);
    }

    /// Flips the stop flag while it runs.
    struct StoppingAction(StopHandle);

    #[async_trait::async_trait]
    impl Action for StoppingAction {
        fn name(&self) -> &str {
            "stop"
        }

        fn spec(&self) -> ActionSpec {
            ActionSpec {
                name: "stop".into(),
                label: "Stop".into(),
                args: vec![],
            }
        }

        async fn execute(&self, _args: &ActionArgs) -> Result<ActionOutput, ActionError> {
            self.0.stop();
            Ok(ActionOutput::text("stopping"))
        }
    }

    #[tokio::test]
    async fn stop_flag_ends_the_query_at_the_next_boundary() {
        let provider = Arc::new(SequentialMockProvider::repeating(
            &decision_json("stop", serde_json::json!({})),
            5,
        ));
        let mut session = test_session();
        let agent = build_agent(
            provider.clone(),
            registry(vec![Arc::new(StoppingAction(session.stop_handle()))]),
        );

        let reply = agent.run(&mut session, "stop soon").await;

        assert_eq!(reply.outcome, ReplyOutcome::Stopped);
        assert_eq!(reply.iterations, 1);
        assert_eq!(provider.call_count(), 1);
        // The in-flight action still completed and was recorded.
        assert_eq!(session.short_term().len(), 1);
    }

    #[tokio::test]
    async fn speak_thought_is_emitted_before_dispatch() {
        let raw = serde_json::json!({
            "thoughts": {"speak": "Let me check."},
            "command_name": "echo",
            "command_args": {"text": "ok"}
        })
        .to_string();
        let provider = Arc::new(SequentialMockProvider::texts(&[&raw, &respond_json("done")]));
        let (sink, mut rx) = ChannelSink::new();
        let agent = build_agent(provider, registry(vec![Arc::new(EchoAction)])).with_events(Arc::new(sink));
        let mut session = test_session();

        agent.run(&mut session, "check").await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event.event);
        }
        let speak = events
            .iter()
            .position(|e| matches!(e, AgentEvent::Speak { content } if content == "Let me check."))
            .unwrap();
        let started = events
            .iter()
            .position(|e| matches!(e, AgentEvent::ActionStarted { .. }))
            .unwrap();
        assert!(speak < started);
        assert!(matches!(events.first(), Some(AgentEvent::Thinking { .. })));
        assert!(events.iter().any(|e| matches!(e, AgentEvent::System { message } if message == PROMOTION_NOTICE)));
    }

    #[tokio::test]
    async fn each_query_starts_with_fresh_credit() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            &respond_json("first"),
            &respond_json("second"),
        ]));
        let agent = build_agent(provider, registry(vec![]));
        let mut session = test_session();

        agent.run(&mut session, "one").await;
        let reply = agent.run(&mut session, "two").await;

        assert_eq!(reply.response, "second");
        assert_eq!(session.credit(), 4);
        assert_eq!(session.history().len(), 4);
    }

    #[tokio::test]
    async fn planner_calls_never_exceed_credit() {
        for credit in 1..=4 {
            let provider = Arc::new(SequentialMockProvider::repeating(
                &decision_json("echo", serde_json::json!({"text": "again"})),
                credit as usize,
            ));
            let agent = build_agent(provider.clone(), registry(vec![Arc::new(EchoAction)])).with_settings(LoopSettings {
                action_credit: credit,
                ..LoopSettings::default()
            });
            let mut session = test_session();

            let reply = agent.run(&mut session, "loop").await;

            assert_eq!(reply.outcome, ReplyOutcome::Exhausted);
            assert_eq!(provider.call_count(), credit as usize);
        }
    }
}
