use crate::error::{RecordError, RecordResult};
use std::collections::HashMap;

/// Negotiation steps that wait for a server acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingAction {
    ConnectTransport,
    Produce,
}

impl PendingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingAction::ConnectTransport => "connect-transport",
            PendingAction::Produce => "produce",
        }
    }

    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "connect-transport" => Some(PendingAction::ConnectTransport),
            "produce" => Some(PendingAction::Produce),
            _ => None,
        }
    }
}

/// One pending callback per action.
///
/// Replies carry only their action name, so at most one negotiation per
/// action may be in flight; a second `push` is refused.
pub struct CorrelationQueue<C> {
    pending: HashMap<PendingAction, C>,
}

impl<C> Default for CorrelationQueue<C> {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }
}

impl<C> CorrelationQueue<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: PendingAction, callback: C) -> RecordResult<()> {
        if self.pending.contains_key(&action) {
            return Err(RecordError::DuplicatePending(action.as_str().to_string()));
        }
        self.pending.insert(action, callback);
        Ok(())
    }

    pub fn take(&mut self, action: PendingAction) -> RecordResult<C> {
        self.pending
            .remove(&action)
            .ok_or_else(|| RecordError::NoPendingAction(action.as_str().to_string()))
    }

    pub fn is_pending(&self, action: PendingAction) -> bool {
        self.pending.contains_key(&action)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
