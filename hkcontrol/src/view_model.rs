use crate::properties::{NOT_IMPLEMENTED, PropertyName, PropertySet};

/// Separator placed in front of a resolved track title.
pub const TRACK_TITLE_SEPARATOR: &str = " | ";

/// Display projection of a [`PropertySet`].
///
/// Always derived from scratch, never patched field by field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewModel {
    pub title: String,
    /// Empty unless the renderer plays a sub-item distinct from the transport URI.
    pub track_title: String,
    pub transport_state: String,
    pub time: String,
    pub volume: String,
}

impl ViewModel {
    pub fn derive(properties: &PropertySet) -> Self {
        let transport_uri = properties.get(PropertyName::AvTransportUri);
        let track_uri = properties.get(PropertyName::CurrentTrackUri);

        let title = resolve_title(
            properties.get(PropertyName::AvTransportUriMetaData),
            transport_uri,
        );

        let track_title = if track_uri == transport_uri {
            String::new()
        } else {
            let resolved =
                resolve_title(properties.get(PropertyName::CurrentTrackMetaData), track_uri);
            if resolved.is_empty() {
                resolved
            } else {
                format!("{TRACK_TITLE_SEPARATOR}{resolved}")
            }
        };

        Self {
            title,
            track_title,
            transport_state: properties.get(PropertyName::TransportState).to_string(),
            time: properties.get(PropertyName::RelativeTimePosition).to_string(),
            volume: properties.get(PropertyName::Volume).to_string(),
        }
    }
}

/// Title parsed from `metadata` when there is usable metadata, the raw URI
/// otherwise.
fn resolve_title(metadata: &str, uri: &str) -> String {
    let parsed = if metadata.is_empty() || metadata == NOT_IMPLEMENTED {
        None
    } else {
        hkdidl::extract_title(metadata)
    };

    match parsed {
        Some(title) if !title.is_empty() => title,
        _ => uri.to_string(),
    }
}
