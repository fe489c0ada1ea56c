//! Envelope dispatch worker.
//!
//! Receives [`ActionEnvelope`]s from [`RuntimeHandle::submit`](crate::RuntimeHandle::submit)
//! and feeds them to [`RuleEngine::fire`] in arrival order.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, trace};

use crate::engine::RuleEngine;
use crate::handle::ActionEnvelope;
use crate::sync::panic_message;

pub(crate) struct DispatchWorker {
    engine: Arc<RuleEngine>,
    envelopes: mpsc::Receiver<ActionEnvelope>,
    shutdown: watch::Receiver<bool>,
}

impl DispatchWorker {
    pub(crate) fn new(
        engine: Arc<RuleEngine>,
        envelopes: mpsc::Receiver<ActionEnvelope>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            engine,
            envelopes,
            shutdown,
        }
    }

    /// Main worker loop.
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                envelope = self.envelopes.recv() => {
                    let Some(envelope) = envelope else { break };
                    self.dispatch(envelope);
                }
            }
        }
        debug!(target: "runtime::workers", worker = "dispatch", "worker stopped");
    }

    fn dispatch(&self, envelope: ActionEnvelope) {
        let ActionEnvelope {
            entity,
            action,
            timing,
        } = envelope;
        // Rule panics are contained by the engine; this guards scope lookup.
        let fired = match catch_unwind(AssertUnwindSafe(|| self.engine.fire(entity, action, timing))) {
            Ok(fired) => fired,
            Err(panic) => {
                error!(
                    target: "runtime::workers",
                    entity = %entity,
                    %action,
                    %timing,
                    panic = panic_message(&*panic),
                    "envelope dispatch panicked; worker continues"
                );
                return;
            }
        };
        trace!(
            target: "runtime::workers",
            entity = %entity,
            %action,
            %timing,
            fired,
            "envelope dispatched"
        );
    }
}
