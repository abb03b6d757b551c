use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::warn;

use crate::view_model::ViewModel;

/// Normalized failure as published to the display layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionFailure {
    pub summary: String,
}

/// Notifications published by the control point.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlEvent {
    /// A freshly derived view model, always complete.
    ViewModelChanged(ViewModel),
    /// The renderer's current-track identity differs from the one carried by
    /// the previous view model; the active playlist entry must be recomputed.
    CurrentTrackChanged { uri: String },
    /// The playlist was mutated.
    PlaylistChanged { len: usize },
    ActionFailed(ActionFailure),
}

/// Fan-out of [`ControlEvent`]s to any number of receivers.
///
/// Disconnected receivers are pruned on the next broadcast.
#[derive(Clone, Default)]
pub struct NotificationBus {
    subscribers: Arc<Mutex<Vec<Sender<ControlEvent>>>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> Receiver<ControlEvent> {
        let (tx, rx) = unbounded::<ControlEvent>();
        {
            let mut subscribers = self.subscribers.lock().expect("Event bus mutex poisoned");
            subscribers.push(tx);
        }
        rx
    }

    pub fn broadcast(&self, event: ControlEvent) {
        let mut subscribers = self.subscribers.lock().expect("Event bus mutex poisoned");
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Publishes a failure on the single failure channel.
    pub fn report_failure(&self, summary: impl Into<String>) {
        let summary = summary.into();
        warn!(summary = summary.as_str(), "Action failed");
        self.broadcast(ControlEvent::ActionFailed(ActionFailure { summary }));
    }
}
