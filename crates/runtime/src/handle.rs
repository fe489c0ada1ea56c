//! Cloneable façade handed to host event sources.
//!
//! [`RuntimeHandle`] offers both the direct, synchronous entry points of the
//! engine and a queued path through the dispatch worker.
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};

use reflex_core::{ActionKind, EntityId, StateKind, TriggerTiming};

use crate::engine::RuleEngine;
use crate::error::{Result, RuntimeError};
use crate::session::StateSession;

/// One normalized host observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ActionEnvelope {
    pub entity: EntityId,
    pub action: ActionKind,
    pub timing: TriggerTiming,
}

impl ActionEnvelope {
    pub fn new(entity: EntityId, action: ActionKind, timing: TriggerTiming) -> Self {
        Self {
            entity,
            action,
            timing,
        }
    }
}

/// Client-facing handle to interact with the runtime.
#[derive(Clone)]
pub struct RuntimeHandle {
    engine: Arc<RuleEngine>,
    envelopes: mpsc::Sender<ActionEnvelope>,
}

impl RuntimeHandle {
    pub(crate) fn new(engine: Arc<RuleEngine>, envelopes: mpsc::Sender<ActionEnvelope>) -> Self {
        Self { engine, envelopes }
    }

    /// Queues an envelope for the dispatch worker, waiting for capacity.
    pub async fn submit(&self, envelope: ActionEnvelope) -> Result<()> {
        self.envelopes
            .send(envelope)
            .await
            .map_err(|_| RuntimeError::DispatchChannelClosed)
    }

    /// Queues an envelope without waiting.
    pub fn try_submit(&self, envelope: ActionEnvelope) -> Result<()> {
        self.envelopes.try_send(envelope).map_err(|e| match e {
            TrySendError::Full(_) => RuntimeError::DispatchChannelFull,
            TrySendError::Closed(_) => RuntimeError::DispatchChannelClosed,
        })
    }

    /// Evaluates rules immediately on the caller's thread.
    pub fn fire(&self, entity: EntityId, action: ActionKind, timing: TriggerTiming) -> usize {
        self.engine.fire(entity, action, timing)
    }

    pub fn should_suppress_event(
        &self,
        entity: EntityId,
        action: ActionKind,
        timing: TriggerTiming,
    ) -> bool {
        self.engine.should_suppress_event(entity, action, timing)
    }

    /// The entity's session, created on first use.
    pub fn session(&self, entity: EntityId) -> Arc<StateSession> {
        self.engine.sessions().get_or_create(entity)
    }

    /// Sets a named state, refreshes active membership and fires the matching
    /// START or END rules if the state actually changed.
    ///
    /// Returns the number of successful effect invocations.
    pub fn apply_state(&self, entity: EntityId, kind: StateKind, on: bool) -> usize {
        let session = self.session(entity);
        if !session.set_state(kind, on) {
            return 0;
        }
        self.engine.sessions().update_active_status(&session);
        let timing = if on {
            TriggerTiming::Start
        } else {
            TriggerTiming::End
        };
        self.engine.fire(entity, kind.action(), timing)
    }

    /// Resets the entity's session, as on the host's "entity left" event.
    pub fn entity_left(&self, entity: EntityId) {
        self.engine.sessions().reset_session(entity);
    }

    pub fn engine(&self) -> &Arc<RuleEngine> {
        &self.engine
    }
}
