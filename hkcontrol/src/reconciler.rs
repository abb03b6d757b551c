//! Property store of the selected renderer and its debounced publication.
//!
//! Push events land in the [`PropertySet`] immediately, but the display only
//! sees a new [`ViewModel`] once the event burst has settled for the quiet
//! period. The view model is then derived from the latest values of every
//! property, so intermediate states are never published.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, trace};

use crate::debounce::Debouncer;
use crate::events::{ControlEvent, NotificationBus};
use crate::properties::{PropertyName, PropertySet};
use crate::view_model::ViewModel;

struct ReconcilerInner {
    properties: Mutex<PropertySet>,
    /// Current-track identity carried by the last published view model.
    published_identity: Mutex<String>,
    debouncer: Debouncer,
    bus: NotificationBus,
}

/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct PropertyReconciler {
    inner: Arc<ReconcilerInner>,
}

impl PropertyReconciler {
    pub fn new(quiet_period: Duration, bus: NotificationBus) -> Self {
        Self {
            inner: Arc::new(ReconcilerInner {
                properties: Mutex::new(PropertySet::new()),
                published_identity: Mutex::new(String::new()),
                debouncer: Debouncer::new(quiet_period),
                bus,
            }),
        }
    }

    fn properties(&self) -> MutexGuard<'_, PropertySet> {
        self.inner
            .properties
            .lock()
            .expect("Property set mutex poisoned")
    }

    pub fn quiet_period(&self) -> Duration {
        self.inner.debouncer.quiet_period()
    }

    /// Restores the defaults and publishes them right away. A pending
    /// debounced publication is dropped.
    pub fn reset(&self) {
        self.inner.debouncer.cancel();
        self.properties().reset();
        self.publish();
    }

    /// Records a pushed property value and (re)starts the quiet period.
    pub fn on_remote_event(&self, name: &str, value: &str) {
        let tracked = self.properties().set_raw(name, value);
        if tracked {
            debug!(property = name, value, "Renderer property changed");
        } else {
            trace!(property = name, value, "Untracked renderer property stored");
        }
        self.schedule_publish();
    }

    /// Overwrites a value locally without publishing, until the
    /// authoritative event arrives.
    pub fn write_local(&self, name: PropertyName, value: &str) {
        debug!(property = name.as_str(), value, "Local property overwrite");
        self.properties().set(name, value);
    }

    fn schedule_publish(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.debouncer.schedule(async move {
            if let Some(inner) = weak.upgrade() {
                PropertyReconciler { inner }.publish();
            }
        });
    }

    pub fn is_publish_pending(&self) -> bool {
        self.inner.debouncer.is_pending()
    }

    /// Derives and broadcasts the view model from the current values, plus a
    /// [`ControlEvent::CurrentTrackChanged`] when the playing identity moved.
    pub fn publish(&self) {
        let (view_model, identity) = {
            let properties = self.properties();
            (
                ViewModel::derive(&properties),
                properties.current_track_identity().to_string(),
            )
        };

        let identity_changed = {
            let mut published = self
                .inner
                .published_identity
                .lock()
                .expect("Published identity mutex poisoned");
            if *published != identity {
                *published = identity.clone();
                true
            } else {
                false
            }
        };

        self.inner
            .bus
            .broadcast(ControlEvent::ViewModelChanged(view_model));
        if identity_changed {
            debug!(uri = identity.as_str(), "Current track changed");
            self.inner
                .bus
                .broadcast(ControlEvent::CurrentTrackChanged { uri: identity });
        }
    }

    pub fn view_model(&self) -> ViewModel {
        ViewModel::derive(&self.properties())
    }

    pub fn get(&self, name: PropertyName) -> String {
        self.properties().get(name).to_string()
    }

    pub fn snapshot(&self) -> PropertySet {
        self.properties().clone()
    }

    pub fn current_track_identity(&self) -> String {
        self.properties().current_track_identity().to_string()
    }
}
