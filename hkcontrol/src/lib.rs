//! # hkcontrol - control point core
//!
//! Drives a remote media renderer through a REST/event-stream gateway:
//!
//! - [`PropertyReconciler`] mirrors the renderer's transport and rendering
//!   properties from its push channel and publishes a debounced
//!   [`ViewModel`].
//! - [`Playlist`] is the client-side queue; the entry playing is derived
//!   from the renderer's current-track URI.
//! - [`ActionDispatcher`] turns user intents into service actions and
//!   reports every failure on one channel.
//! - [`RemoteRenderer`] ties them together for the selected device.
//! - [`DirectoryBrowser`] walks a media server's content directory.
//!
//! Everything is published on a [`NotificationBus`] as [`ControlEvent`]s.

pub mod browser;
pub mod config;
pub mod debounce;
pub mod dispatcher;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod playlist;
pub mod properties;
pub mod reconciler;
pub mod renderer;
pub mod view_model;

use std::fmt;

pub use browser::{BrowserActivation, BrowserRow, DirectoryBrowser, PathEntry};
pub use config::ControlConfig;
pub use dispatcher::{ActionDispatcher, RendererTarget};
pub use errors::ControlError;
pub use events::{ActionFailure, ControlEvent, NotificationBus};
pub use gateway::{
    ActionResult, DeviceInfo, DeviceKind, DeviceList, DirectoryChild, DirectoryListing,
    RestGateway, ServiceCall, Subscription, SubscriptionEvent, SubscriptionSender,
    TransportGateway,
};
pub use playlist::{MimeCategory, Playlist, PlaylistItem};
pub use properties::{NOT_IMPLEMENTED, PropertyName, PropertySet};
pub use reconciler::PropertyReconciler;
pub use renderer::RemoteRenderer;
pub use view_model::ViewModel;

/// Unique device name as advertised by the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        DeviceId(value.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(value: String) -> Self {
        DeviceId(value)
    }
}
