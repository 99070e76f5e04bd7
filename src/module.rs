//! Pluggable interceptors invoked by a [`crate::channel::Channel`] as
//! envelopes cross it and as the owning session changes state.

use crate::envelope::{Envelope, SessionState};

/// Runs synchronously on the channel's worker task, in registration order.
/// A module that wants to suppress an envelope returns `None`.
pub trait ChannelModule: Send + Sync {
    fn on_sending(&self, envelope: Envelope) -> Option<Envelope> {
        Some(envelope)
    }

    fn on_receiving(&self, envelope: Envelope) -> Option<Envelope> {
        Some(envelope)
    }

    fn on_state_changed(&self, _state: SessionState) {}
}

/// Logs every envelope at `trace` and every state transition at `debug`,
/// under the `lime::module` target.
#[derive(Debug, Default)]
pub struct TracingModule;

impl ChannelModule for TracingModule {
    fn on_sending(&self, envelope: Envelope) -> Option<Envelope> {
        tracing::trace!(target: "lime::module", kind = ?envelope.kind(), id = envelope.id(), "sending");
        Some(envelope)
    }

    fn on_receiving(&self, envelope: Envelope) -> Option<Envelope> {
        tracing::trace!(target: "lime::module", kind = ?envelope.kind(), id = envelope.id(), "receiving");
        Some(envelope)
    }

    fn on_state_changed(&self, state: SessionState) {
        tracing::debug!(target: "lime::module", ?state, "session state changed");
    }
}
