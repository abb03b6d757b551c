//! Abstract access to the REST/event-stream gateway that fronts the UPnP
//! devices.
//!
//! The core only talks to devices through [`TransportGateway`]. The
//! [`rest`] module provides the HTTP implementation; tests plug in scripted
//! gateways.

pub mod rest;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::DeviceId;
use crate::errors::ControlError;

pub use rest::RestGateway;

/// Role advertised by a device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceKind {
    MediaRenderer,
    MediaServer,
    Other(String),
}

impl From<String> for DeviceKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "MediaRenderer" => DeviceKind::MediaRenderer,
            "MediaServer" => DeviceKind::MediaServer,
            _ => DeviceKind::Other(value),
        }
    }
}

impl From<DeviceKind> for String {
    fn from(value: DeviceKind) -> Self {
        match value {
            DeviceKind::MediaRenderer => "MediaRenderer".to_string(),
            DeviceKind::MediaServer => "MediaServer".to_string(),
            DeviceKind::Other(other) => other,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(rename = "udn", alias = "id")]
    pub id: String,
    pub friendly_name: String,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
}

impl DeviceInfo {
    pub fn device_id(&self) -> DeviceId {
        DeviceId(self.id.clone())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceList {
    #[serde(default)]
    pub devices: Vec<DeviceInfo>,
}

impl DeviceList {
    pub fn renderers(&self) -> impl Iterator<Item = &DeviceInfo> {
        self.devices
            .iter()
            .filter(|d| d.kind == DeviceKind::MediaRenderer)
    }

    pub fn servers(&self) -> impl Iterator<Item = &DeviceInfo> {
        self.devices
            .iter()
            .filter(|d| d.kind == DeviceKind::MediaServer)
    }
}

/// One row of a content directory listing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryChild {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub is_container: bool,
    #[serde(default)]
    pub child_count: Option<u32>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    /// DIDL-Lite description of the item, when the server provides one.
    #[serde(default, rename = "metaDataUri", alias = "metadataDocument")]
    pub metadata_document: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryListing {
    #[serde(default)]
    pub child_count: Option<u32>,
    #[serde(default)]
    pub children: Vec<DirectoryChild>,
}

/// A remote service action, as sent to the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCall {
    pub service_id: String,
    pub action: String,
    pub input_arguments: BTreeMap<String, String>,
}

impl ServiceCall {
    pub fn new(service_id: &str, action: &str) -> Self {
        Self {
            service_id: service_id.to_string(),
            action: action.to_string(),
            input_arguments: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, name: &str, value: impl Into<String>) -> Self {
        self.input_arguments.insert(name.to_string(), value.into());
        self
    }
}

/// Status reported by the gateway for an accepted action.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    #[serde(default)]
    pub status_code: i64,
    #[serde(default)]
    pub message: String,
}

/// Items delivered by a renderer subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubscriptionEvent {
    /// One-time listing of the property names the channel will push.
    Initialized(Vec<String>),
    PropertyChanged { name: String, value: String },
    /// The channel failed; nothing follows.
    Error(String),
}

/// Receiving side of a renderer push channel.
///
/// Closing (or dropping) the subscription cancels its token, which tells
/// the producing side to stop and release the underlying connection.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::UnboundedReceiver<SubscriptionEvent>,
    cancel: CancellationToken,
}

/// Producing side of a [`Subscription`].
#[derive(Clone, Debug)]
pub struct SubscriptionSender {
    tx: mpsc::UnboundedSender<SubscriptionEvent>,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn channel() -> (SubscriptionSender, Subscription) {
        let (tx, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        (
            SubscriptionSender {
                tx,
                cancel: cancel.clone(),
            },
            Subscription { events, cancel },
        )
    }

    /// Next event, or `None` once the producer is gone.
    pub async fn next_event(&mut self) -> Option<SubscriptionEvent> {
        self.events.recv().await
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl SubscriptionSender {
    /// Forwards an event; returns false once the subscription is closed.
    pub fn send(&self, event: SubscriptionEvent) -> bool {
        !self.cancel.is_cancelled() && self.tx.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves when the receiving side closes the subscription.
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }
}

/// Capabilities of the device gateway consumed by the control point.
#[async_trait]
pub trait TransportGateway: Send + Sync {
    async fn list_devices(&self) -> Result<DeviceList, ControlError>;

    async fn browse_directory(
        &self,
        device: &DeviceId,
        container_id: &str,
    ) -> Result<DirectoryListing, ControlError>;

    /// Invokes a service action. A device-side refusal is reported as
    /// [`ControlError::Rejected`], distinct from transport failures.
    async fn invoke_action(
        &self,
        device: &DeviceId,
        call: &ServiceCall,
    ) -> Result<ActionResult, ControlError>;

    async fn subscribe(
        &self,
        device: &DeviceId,
        instance_id: &str,
    ) -> Result<Subscription, ControlError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_list_split_by_kind() {
        let list: DeviceList = serde_json::from_str(
            r#"{"devices":[
                {"udn":"r1","friendlyName":"Living room","type":"MediaRenderer"},
                {"udn":"s1","friendlyName":"NAS","type":"MediaServer"},
                {"udn":"x1","friendlyName":"Router","type":"InternetGatewayDevice"}
            ]}"#,
        )
        .unwrap();

        let renderers: Vec<_> = list.renderers().map(|d| d.id.as_str()).collect();
        let servers: Vec<_> = list.servers().map(|d| d.id.as_str()).collect();
        assert_eq!(renderers, vec!["r1"]);
        assert_eq!(servers, vec!["s1"]);
        assert_eq!(
            list.devices[2].kind,
            DeviceKind::Other("InternetGatewayDevice".to_string())
        );
    }

    #[test]
    fn test_directory_child_wire_names() {
        let child: DirectoryChild = serde_json::from_str(
            r#"{"id":"12","parentId":"3","title":"Track","isContainer":false,
                "mimeType":"audio/flac","uri":"http://nas/12.flac",
                "metaDataUri":"<DIDL-Lite/>"}"#,
        )
        .unwrap();
        assert_eq!(child.mime_type.as_deref(), Some("audio/flac"));
        assert_eq!(child.metadata_document.as_deref(), Some("<DIDL-Lite/>"));
        assert!(!child.is_container);
    }

    #[test]
    fn test_service_call_serialization() {
        let call = ServiceCall::new("AVTransport", "Play")
            .arg("InstanceID", "0")
            .arg("Speed", "1");
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["serviceId"], "AVTransport");
        assert_eq!(json["action"], "Play");
        assert_eq!(json["inputArguments"]["Speed"], "1");
    }

    #[tokio::test]
    async fn test_closed_subscription_stops_sender() {
        let (tx, mut sub) = Subscription::channel();
        assert!(tx.send(SubscriptionEvent::Initialized(vec!["Volume".into()])));
        assert_eq!(
            sub.next_event().await,
            Some(SubscriptionEvent::Initialized(vec!["Volume".into()]))
        );

        sub.close();
        assert!(sub.is_closed());
        assert!(tx.is_closed());
        assert!(!tx.send(SubscriptionEvent::Error("late".into())));
        tx.closed().await;
    }
}
