//! Per-agent session state.
//!
//! An [`AgentSession`] owns everything one conversation mutates: history,
//! short-term memory, the action credit and the promotion candidates of the
//! query in flight. Long-term memory is a shared handle; its store is the
//! one component sessions may have in common.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tandem_core::event::SessionToken;
use tandem_core::identity::Identity;
use tandem_memory::{ConversationHistory, LongTermMemory, ShortTermMemory};

/// Cooperative cancellation. The loop checks it between iterations.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct AgentSession {
    token: SessionToken,
    identity: Identity,
    pub(crate) history: ConversationHistory,
    pub(crate) short_term: ShortTermMemory,
    pub(crate) long_term: LongTermMemory,
    pub(crate) credit: u32,
    pub(crate) candidates: BTreeSet<String>,
    pub(crate) attempted: Vec<String>,
    stop: StopHandle,
}

impl AgentSession {
    pub fn new(identity: Identity, short_term: ShortTermMemory, long_term: LongTermMemory) -> Self {
        Self {
            token: SessionToken::new(),
            identity,
            history: ConversationHistory::new(),
            short_term,
            long_term,
            credit: 0,
            candidates: BTreeSet::new(),
            attempted: Vec::new(),
            stop: StopHandle::default(),
        }
    }

    pub fn with_token(mut self, token: SessionToken) -> Self {
        self.token = token;
        self
    }

    /// Reset per-query state: credit, candidates, attempted notes, stop flag.
    /// Memory stores carry over.
    pub fn begin_query(&mut self, credit: u32) {
        self.credit = credit;
        self.candidates.clear();
        self.attempted.clear();
        self.stop.reset();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.is_stopped()
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn credit(&self) -> u32 {
        self.credit
    }

    /// Promotion candidates gathered so far for the current query.
    pub fn candidates(&self) -> &BTreeSet<String> {
        &self.candidates
    }

    pub fn attempted(&self) -> &[String] {
        &self.attempted
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn short_term(&self) -> &ShortTermMemory {
        &self.short_term
    }

    pub fn long_term(&self) -> &LongTermMemory {
        &self.long_term
    }
}
