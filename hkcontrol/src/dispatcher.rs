//! Turns user intents into service actions on the selected renderer.
//!
//! Every call goes through [`ActionDispatcher::call`], which checks that a
//! device is selected, forwards the action to the gateway and reports any
//! failure once on the [`NotificationBus`] before handing it back to the
//! caller.

use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::DeviceId;
use crate::errors::ControlError;
use crate::events::NotificationBus;
use crate::gateway::{ActionResult, ServiceCall, TransportGateway};
use crate::playlist::PlaylistItem;

pub const AV_TRANSPORT: &str = "AVTransport";
pub const RENDERING_CONTROL: &str = "RenderingControl";
const MASTER_CHANNEL: &str = "Master";

/// The renderer the dispatcher currently talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RendererTarget {
    pub device: DeviceId,
    pub instance_id: String,
}

#[derive(Clone)]
pub struct ActionDispatcher {
    gateway: Arc<dyn TransportGateway>,
    target: Arc<RwLock<Option<RendererTarget>>>,
    bus: NotificationBus,
}

impl ActionDispatcher {
    pub fn new(gateway: Arc<dyn TransportGateway>, bus: NotificationBus) -> Self {
        Self {
            gateway,
            target: Arc::new(RwLock::new(None)),
            bus,
        }
    }

    pub fn set_target(&self, target: Option<RendererTarget>) {
        *self.target.write().expect("Renderer target lock poisoned") = target;
    }

    pub fn target(&self) -> Option<RendererTarget> {
        self.target.read().expect("Renderer target lock poisoned").clone()
    }

    pub fn gateway(&self) -> Arc<dyn TransportGateway> {
        self.gateway.clone()
    }

    /// Sends `call` to the selected device.
    ///
    /// Without a device nothing is sent. Failures are reported on the bus
    /// and returned unchanged.
    pub async fn call(&self, call: ServiceCall) -> Result<ActionResult, ControlError> {
        let target = self.require_target()?;
        self.send(&target, call).await
    }

    async fn call_with<F>(&self, build: F) -> Result<ActionResult, ControlError>
    where
        F: FnOnce(&str) -> ServiceCall,
    {
        let target = self.require_target()?;
        let call = build(&target.instance_id);
        self.send(&target, call).await
    }

    fn require_target(&self) -> Result<RendererTarget, ControlError> {
        self.target().ok_or_else(|| {
            let err = ControlError::NoDevice;
            self.bus.report_failure(err.summary());
            err
        })
    }

    async fn send(
        &self,
        target: &RendererTarget,
        call: ServiceCall,
    ) -> Result<ActionResult, ControlError> {
        match self.gateway.invoke_action(&target.device, &call).await {
            Ok(result) => {
                debug!(
                    device = target.device.as_str(),
                    action = call.action.as_str(),
                    status = result.status_code,
                    "Action accepted"
                );
                Ok(result)
            }
            Err(err) => {
                self.bus
                    .report_failure(format!("Action failed: {}", err.summary()));
                Err(err)
            }
        }
    }

    async fn transport_action(&self, action: &str) -> Result<ActionResult, ControlError> {
        self.call_with(|instance_id| {
            ServiceCall::new(AV_TRANSPORT, action).arg("InstanceID", instance_id)
        })
        .await
    }

    pub async fn play(&self) -> Result<ActionResult, ControlError> {
        self.call_with(|instance_id| {
            ServiceCall::new(AV_TRANSPORT, "Play")
                .arg("InstanceID", instance_id)
                .arg("Speed", "1")
        })
        .await
    }

    pub async fn pause(&self) -> Result<ActionResult, ControlError> {
        self.transport_action("Pause").await
    }

    pub async fn stop(&self) -> Result<ActionResult, ControlError> {
        self.transport_action("Stop").await
    }

    pub async fn next(&self) -> Result<ActionResult, ControlError> {
        self.transport_action("Next").await
    }

    pub async fn previous(&self) -> Result<ActionResult, ControlError> {
        self.transport_action("Previous").await
    }

    pub async fn set_volume(&self, volume: &str) -> Result<ActionResult, ControlError> {
        self.call_with(|instance_id| {
            ServiceCall::new(RENDERING_CONTROL, "SetVolume")
                .arg("InstanceID", instance_id)
                .arg("Channel", MASTER_CHANNEL)
                .arg("DesiredVolume", volume)
        })
        .await
    }

    pub async fn set_mute(&self, mute: bool) -> Result<ActionResult, ControlError> {
        self.call_with(|instance_id| {
            ServiceCall::new(RENDERING_CONTROL, "SetMute")
                .arg("InstanceID", instance_id)
                .arg("Channel", MASTER_CHANNEL)
                .arg("DesiredMute", mute.to_string())
        })
        .await
    }

    pub async fn set_transport_item(
        &self,
        item: &PlaylistItem,
    ) -> Result<ActionResult, ControlError> {
        self.call_with(|instance_id| {
            ServiceCall::new(AV_TRANSPORT, "SetAVTransportURI")
                .arg("InstanceID", instance_id)
                .arg("CurrentURI", item.uri.as_str())
                .arg("CurrentURIMetaData", item.metadata_document.as_str())
        })
        .await
    }
}
