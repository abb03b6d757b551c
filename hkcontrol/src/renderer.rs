//! The remote renderer context.
//!
//! [`RemoteRenderer`] owns everything tied to one renderer selection: the
//! property store, the push subscription feeding it, the playlist and the
//! dispatcher targeting the device. [`RemoteRenderer::select_device`] is the
//! only way to switch device and brings all of them back to their zero
//! state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::DeviceId;
use crate::config::ControlConfig;
use crate::debounce::Debouncer;
use crate::dispatcher::{ActionDispatcher, RendererTarget};
use crate::errors::ControlError;
use crate::events::{ControlEvent, NotificationBus};
use crate::gateway::{ActionResult, SubscriptionEvent, TransportGateway};
use crate::playlist::{Playlist, PlaylistItem};
use crate::properties::{PropertyName, PropertySet};
use crate::reconciler::PropertyReconciler;
use crate::view_model::ViewModel;

/// Background task forwarding pushed events into the reconciler.
struct SubscriptionPump {
    device: DeviceId,
    cancel: CancellationToken,
    /// Token of the open subscription, once the gateway handed it over.
    channel: Arc<Mutex<Option<CancellationToken>>>,
    task: JoinHandle<()>,
}

impl SubscriptionPump {
    /// Closes the channel right away; the task itself winds down later.
    fn stop(self) {
        debug!(device = self.device.as_str(), "Closing renderer subscription");
        self.cancel.cancel();
        if let Some(channel) = self
            .channel
            .lock()
            .expect("Subscription channel mutex poisoned")
            .take()
        {
            channel.cancel();
        }
        self.task.abort();
    }
}

struct RendererInner {
    config: ControlConfig,
    bus: NotificationBus,
    reconciler: PropertyReconciler,
    dispatcher: ActionDispatcher,
    playlist: Mutex<Playlist>,
    volume_debouncer: Debouncer,
    pump: Mutex<Option<SubscriptionPump>>,
    /// Bumped by every device selection.
    selection: AtomicU64,
}

impl Drop for RendererInner {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.get_mut().ok().and_then(Option::take) {
            pump.stop();
        }
    }
}

/// Control context of the selected renderer. Clones share the same state.
///
/// Methods spawning background work (device selection, debounced
/// publication, volume input) must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct RemoteRenderer {
    inner: Arc<RendererInner>,
}

impl std::fmt::Debug for RemoteRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRenderer")
            .field("config", &self.inner.config)
            .field("target", &self.inner.dispatcher.target())
            .field("playlist_len", &self.playlist_len())
            .finish()
    }
}

impl RemoteRenderer {
    pub fn new(gateway: Arc<dyn TransportGateway>, config: ControlConfig) -> Self {
        Self::with_bus(gateway, config, NotificationBus::new())
    }

    /// Builds a renderer publishing on an existing bus.
    pub fn with_bus(
        gateway: Arc<dyn TransportGateway>,
        config: ControlConfig,
        bus: NotificationBus,
    ) -> Self {
        let reconciler = PropertyReconciler::new(config.debounce_quiet_period, bus.clone());
        let dispatcher = ActionDispatcher::new(gateway, bus.clone());
        let volume_debouncer = Debouncer::new(config.volume_quiet_period);
        Self {
            inner: Arc::new(RendererInner {
                config,
                bus,
                reconciler,
                dispatcher,
                playlist: Mutex::new(Playlist::new()),
                volume_debouncer,
                pump: Mutex::new(None),
                selection: AtomicU64::new(0),
            }),
        }
    }

    pub fn subscribe(&self) -> crossbeam_channel::Receiver<ControlEvent> {
        self.inner.bus.subscribe()
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.inner.bus
    }

    pub fn config(&self) -> &ControlConfig {
        &self.inner.config
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.inner.dispatcher
    }

    pub fn device(&self) -> Option<DeviceId> {
        self.inner.dispatcher.target().map(|t| t.device)
    }

    pub fn instance_id(&self) -> Option<String> {
        self.inner.dispatcher.target().map(|t| t.instance_id)
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner
            .pump
            .lock()
            .expect("Subscription pump mutex poisoned")
            .as_ref()
            .is_some_and(|pump| !pump.task.is_finished())
    }

    // ------------------------------------------------------------------
    // Device selection and properties
    // ------------------------------------------------------------------

    /// Switches to `device` (or to no device at all).
    ///
    /// The previous subscription is closed, the properties fall back to
    /// their defaults and are published right away, and the playlist is
    /// emptied. When a device is given, its push channel is opened in the
    /// background; this call does not wait for it.
    pub fn select_device(&self, device: Option<DeviceId>, instance_id: Option<&str>) {
        if let Some(pump) = self
            .inner
            .pump
            .lock()
            .expect("Subscription pump mutex poisoned")
            .take()
        {
            pump.stop();
        }
        self.inner.volume_debouncer.cancel();
        self.inner.selection.fetch_add(1, Ordering::SeqCst);

        let target = device.map(|device| RendererTarget {
            device,
            instance_id: instance_id
                .unwrap_or(&self.inner.config.default_instance_id)
                .to_string(),
        });
        self.inner.dispatcher.set_target(target.clone());

        self.inner.reconciler.reset();
        self.new_playlist();

        match target {
            Some(target) => {
                info!(
                    device = target.device.as_str(),
                    instance = target.instance_id.as_str(),
                    "Renderer selected"
                );
                let pump = self.spawn_pump(target);
                *self
                    .inner
                    .pump
                    .lock()
                    .expect("Subscription pump mutex poisoned") = Some(pump);
            }
            None => info!("Renderer deselected"),
        }
    }

    fn spawn_pump(&self, target: RendererTarget) -> SubscriptionPump {
        let cancel = CancellationToken::new();
        let gateway = self.inner.dispatcher.gateway();
        let reconciler = self.inner.reconciler.clone();
        let bus = self.inner.bus.clone();
        let token = cancel.clone();
        let channel = Arc::new(Mutex::new(None));
        let channel_slot = channel.clone();
        let device = target.device.clone();

        let task = tokio::spawn(async move {
            let subscribed = tokio::select! {
                _ = token.cancelled() => return,
                result = gateway.subscribe(&target.device, &target.instance_id) => result,
            };
            let mut subscription = match subscribed {
                Ok(subscription) => subscription,
                Err(err) => {
                    bus.report_failure(format!("Subscription failed: {}", err.summary()));
                    return;
                }
            };
            *channel_slot
                .lock()
                .expect("Subscription channel mutex poisoned") =
                Some(subscription.cancellation_token());
            if token.is_cancelled() {
                subscription.close();
                return;
            }

            loop {
                let event = tokio::select! {
                    _ = token.cancelled() => break,
                    event = subscription.next_event() => event,
                };
                match event {
                    Some(SubscriptionEvent::Initialized(names)) => {
                        debug!(
                            device = target.device.as_str(),
                            properties = ?names,
                            "Renderer subscription initialized"
                        );
                    }
                    Some(SubscriptionEvent::PropertyChanged { name, value }) => {
                        reconciler.on_remote_event(&name, &value);
                    }
                    Some(SubscriptionEvent::Error(message)) => {
                        warn!(
                            device = target.device.as_str(),
                            error = message.as_str(),
                            "Renderer subscription failed"
                        );
                        subscription.close();
                        bus.report_failure(ControlError::Disconnected.summary());
                        break;
                    }
                    None => {
                        warn!(
                            device = target.device.as_str(),
                            "Renderer subscription ended"
                        );
                        bus.report_failure(ControlError::Disconnected.summary());
                        break;
                    }
                }
            }
            subscription.close();
        });

        SubscriptionPump {
            device,
            cancel,
            channel,
            task,
        }
    }

    pub fn view_model(&self) -> ViewModel {
        self.inner.reconciler.view_model()
    }

    pub fn property(&self, name: PropertyName) -> String {
        self.inner.reconciler.get(name)
    }

    pub fn properties(&self) -> PropertySet {
        self.inner.reconciler.snapshot()
    }

    pub fn is_publish_pending(&self) -> bool {
        self.inner.reconciler.is_publish_pending()
    }

    // ------------------------------------------------------------------
    // Transport and rendering actions
    // ------------------------------------------------------------------

    pub async fn play(&self) -> Result<ActionResult, ControlError> {
        self.inner.dispatcher.play().await
    }

    pub async fn pause(&self) -> Result<ActionResult, ControlError> {
        self.inner.dispatcher.pause().await
    }

    pub async fn stop(&self) -> Result<ActionResult, ControlError> {
        self.inner.dispatcher.stop().await
    }

    pub async fn next(&self) -> Result<ActionResult, ControlError> {
        self.inner.dispatcher.next().await
    }

    pub async fn previous(&self) -> Result<ActionResult, ControlError> {
        self.inner.dispatcher.previous().await
    }

    /// Sets the volume. Once the device accepted it, the value is written
    /// into the local properties so the control does not jump back before
    /// the pushed confirmation arrives.
    ///
    /// The local write is skipped when a device selection happened while
    /// the call was in flight.
    pub async fn set_volume(&self, volume: &str) -> Result<ActionResult, ControlError> {
        let selection = self.inner.selection.load(Ordering::SeqCst);
        let result = self.inner.dispatcher.set_volume(volume).await?;
        if !self.inner.config.optimistic_volume {
            return Ok(result);
        }
        if self.inner.selection.load(Ordering::SeqCst) == selection {
            self.inner.reconciler.write_local(PropertyName::Volume, volume);
        } else {
            debug!(volume, "Renderer changed during SetVolume, local write skipped");
        }
        Ok(result)
    }

    /// Volume slider input: only the last value of a burst is sent, once the
    /// input has been quiet for the configured period.
    pub fn request_volume(&self, volume: impl Into<String>) {
        let volume = volume.into();
        let weak: Weak<RendererInner> = Arc::downgrade(&self.inner);
        self.inner.volume_debouncer.schedule(async move {
            if let Some(inner) = weak.upgrade() {
                let renderer = RemoteRenderer { inner };
                // failures are already reported on the bus
                let _ = renderer.set_volume(&volume).await;
            }
        });
    }

    pub async fn toggle_mute(&self) -> Result<ActionResult, ControlError> {
        let muted = self.inner.reconciler.snapshot().is_muted();
        self.inner.dispatcher.set_mute(!muted).await
    }

    pub async fn set_transport_item(
        &self,
        item: &PlaylistItem,
    ) -> Result<ActionResult, ControlError> {
        self.inner.dispatcher.set_transport_item(item).await
    }

    // ------------------------------------------------------------------
    // Playlist
    // ------------------------------------------------------------------

    fn playlist(&self) -> std::sync::MutexGuard<'_, Playlist> {
        self.inner.playlist.lock().expect("Playlist mutex poisoned")
    }

    fn notify_playlist_changed(&self, len: usize) {
        self.inner.bus.broadcast(ControlEvent::PlaylistChanged { len });
    }

    fn report(&self, err: ControlError) -> ControlError {
        self.inner.bus.report_failure(err.summary());
        err
    }

    pub fn playlist_items(&self) -> Vec<PlaylistItem> {
        self.playlist().items().to_vec()
    }

    pub fn playlist_len(&self) -> usize {
        self.playlist().len()
    }

    pub fn new_playlist(&self) {
        self.playlist().clear();
        self.notify_playlist_changed(0);
    }

    /// Queues `item` and returns its index.
    ///
    /// An item whose URI is already queued is refused and reported. The
    /// first item of a playlist also becomes the renderer's transport item.
    pub async fn add_to_playlist(
        &self,
        item: PlaylistItem,
        replace: bool,
    ) -> Result<usize, ControlError> {
        let (added, len) = {
            let mut playlist = self.playlist();
            let added = playlist.add(item.clone(), replace);
            (added, playlist.len())
        };
        if replace || added.is_some() {
            self.notify_playlist_changed(len);
        }
        let Some(index) = added else {
            return Err(self.report(ControlError::AlreadyQueued(item.uri)));
        };
        debug!(uri = item.uri.as_str(), index, "Item queued");

        if index == 0 {
            if let Err(err) = self.set_transport_item(&item).await {
                debug!(error = %err, "First playlist item could not be loaded");
            }
        }
        Ok(index)
    }

    /// Removes the entry at `index`, unless it is the one playing.
    pub fn remove_item(&self, index: usize) -> Result<PlaylistItem, ControlError> {
        let identity = self.inner.reconciler.current_track_identity();
        let removed = {
            let mut playlist = self.playlist();
            let active = playlist.find_index(&identity);
            playlist.remove(index, active).map(|item| (item, playlist.len()))
        };
        match removed {
            Ok((item, len)) => {
                self.notify_playlist_changed(len);
                Ok(item)
            }
            Err(err) => Err(self.report(err)),
        }
    }

    /// Drag-and-drop reorder, see [`Playlist::move_item`].
    pub fn move_item(&self, from: usize, to: usize) -> Result<(), ControlError> {
        let moved = {
            let mut playlist = self.playlist();
            playlist.move_item(from, to).map(|_| playlist.len())
        };
        match moved {
            Ok(len) => {
                self.notify_playlist_changed(len);
                Ok(())
            }
            Err(err) => Err(self.report(err)),
        }
    }

    /// Index of the playlist entry the renderer is playing, matched by URI
    /// against the current-track identity. Computed on every call.
    pub fn find_current_index(&self) -> Option<usize> {
        let identity = self.inner.reconciler.current_track_identity();
        self.playlist().find_index(&identity)
    }

    pub async fn next_media(&self) -> Result<ActionResult, ControlError> {
        let target = {
            let playlist = self.playlist();
            let current = playlist.find_index(&self.inner.reconciler.current_track_identity());
            playlist
                .next_index(current)
                .and_then(|index| playlist.get(index).cloned())
        };
        match target {
            Some(item) => self.set_transport_item(&item).await,
            None => Err(self.report(ControlError::NoNextMedia)),
        }
    }

    pub async fn previous_media(&self) -> Result<ActionResult, ControlError> {
        let target = {
            let playlist = self.playlist();
            let current = playlist.find_index(&self.inner.reconciler.current_track_identity());
            playlist
                .previous_index(current)
                .and_then(|index| playlist.get(index).cloned())
        };
        match target {
            Some(item) => self.set_transport_item(&item).await,
            None => Err(self.report(ControlError::NoPreviousMedia)),
        }
    }
}
