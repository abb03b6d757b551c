//! Last-known values of the renderer's evented properties.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Value sent by renderers for metadata they do not provide.
pub const NOT_IMPLEMENTED: &str = "NOT_IMPLEMENTED";

/// Properties mirrored from the AVTransport and RenderingControl services.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyName {
    AvTransportUri,
    AvTransportUriMetaData,
    CurrentTrackUri,
    CurrentTrackMetaData,
    CurrentTrack,
    NumberOfTracks,
    TransportState,
    Mute,
    Volume,
    RelativeTimePosition,
}

impl PropertyName {
    pub const ALL: [PropertyName; 10] = [
        PropertyName::AvTransportUri,
        PropertyName::AvTransportUriMetaData,
        PropertyName::CurrentTrackUri,
        PropertyName::CurrentTrackMetaData,
        PropertyName::CurrentTrack,
        PropertyName::NumberOfTracks,
        PropertyName::TransportState,
        PropertyName::Mute,
        PropertyName::Volume,
        PropertyName::RelativeTimePosition,
    ];

    /// UPnP state variable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyName::AvTransportUri => "AVTransportURI",
            PropertyName::AvTransportUriMetaData => "AVTransportURIMetaData",
            PropertyName::CurrentTrackUri => "CurrentTrackURI",
            PropertyName::CurrentTrackMetaData => "CurrentTrackMetaData",
            PropertyName::CurrentTrack => "CurrentTrack",
            PropertyName::NumberOfTracks => "NumberOfTracks",
            PropertyName::TransportState => "TransportState",
            PropertyName::Mute => "Mute",
            PropertyName::Volume => "Volume",
            PropertyName::RelativeTimePosition => "RelativeTimePosition",
        }
    }

    pub fn default_value(&self) -> &'static str {
        match self {
            PropertyName::TransportState => "STOPPED",
            PropertyName::Volume => "100",
            _ => "",
        }
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PropertyName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or(())
    }
}

/// Mapping from property name to its last received string value.
///
/// Always holds every tracked property; names outside the tracked set are
/// kept as well so newer gateways can push more than this client knows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertySet {
    values: BTreeMap<String, String>,
}

impl Default for PropertySet {
    fn default() -> Self {
        let values = PropertyName::ALL
            .into_iter()
            .map(|name| (name.as_str().to_string(), name.default_value().to_string()))
            .collect();
        Self { values }
    }
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores the documented defaults and drops untracked entries.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn get(&self, name: PropertyName) -> &str {
        self.values
            .get(name.as_str())
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Lookup by raw name, for untracked properties.
    pub fn get_raw(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: PropertyName, value: impl Into<String>) {
        self.values.insert(name.as_str().to_string(), value.into());
    }

    /// Stores a value under its wire name. Returns true if the name is
    /// part of the tracked set.
    pub fn set_raw(&mut self, name: &str, value: impl Into<String>) -> bool {
        self.values.insert(name.to_string(), value.into());
        name.parse::<PropertyName>().is_ok()
    }

    /// URI identifying what the renderer is playing right now: the current
    /// track URI, or the transport URI when the renderer reports no track.
    pub fn current_track_identity(&self) -> &str {
        match self.get(PropertyName::CurrentTrackUri) {
            "" => self.get(PropertyName::AvTransportUri),
            uri => uri,
        }
    }

    pub fn is_muted(&self) -> bool {
        matches!(self.get(PropertyName::Mute), "true" | "1")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
