//! Content directory browsing.
//!
//! A stack of visited containers over one media server. Only the activation
//! of a leaf item matters to the rest of the control point: it yields the
//! [`PlaylistItem`] to queue or play.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::DeviceId;
use crate::errors::ControlError;
use crate::gateway::{DirectoryChild, TransportGateway};
use crate::playlist::{MimeCategory, PlaylistItem};

/// A container visited on the way to the current listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathEntry {
    pub id: String,
    pub title: String,
}

/// A displayable line of the current listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrowserRow {
    /// Back to the parent container.
    Up,
    Container(DirectoryChild),
    Item {
        child: DirectoryChild,
        mime_category: MimeCategory,
    },
}

impl BrowserRow {
    pub fn title(&self) -> &str {
        match self {
            BrowserRow::Up => "..",
            BrowserRow::Container(child) | BrowserRow::Item { child, .. } => &child.title,
        }
    }
}

/// What the activation of a row led to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrowserActivation {
    WentUp,
    EnteredContainer(String),
    LeafActivated(PlaylistItem),
}

pub struct DirectoryBrowser {
    gateway: Arc<dyn TransportGateway>,
    root_id: String,
    device: Option<DeviceId>,
    path_stack: Vec<PathEntry>,
    items: Vec<DirectoryChild>,
}

impl DirectoryBrowser {
    pub fn new(gateway: Arc<dyn TransportGateway>, root_id: impl Into<String>) -> Self {
        Self {
            gateway,
            root_id: root_id.into(),
            device: None,
            path_stack: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn device(&self) -> Option<&DeviceId> {
        self.device.as_ref()
    }

    pub fn path(&self) -> &[PathEntry] {
        &self.path_stack
    }

    pub fn items(&self) -> &[DirectoryChild] {
        &self.items
    }

    /// Switches server. The listing is emptied, and reloaded from the root
    /// when a server is given.
    pub async fn select_device(&mut self, device: Option<DeviceId>) -> Result<(), ControlError> {
        self.device = device;
        self.path_stack.clear();
        self.items.clear();

        if self.device.is_some() {
            let root = PathEntry {
                id: self.root_id.clone(),
                title: String::new(),
            };
            self.enter(root).await?;
        }
        Ok(())
    }

    /// Lists the children of `container` and makes it the current level.
    pub async fn browse(&mut self, container: &DirectoryChild) -> Result<(), ControlError> {
        self.enter(PathEntry {
            id: container.id.clone(),
            title: container.title.clone(),
        })
        .await
    }

    async fn enter(&mut self, entry: PathEntry) -> Result<(), ControlError> {
        let children = self.fetch(&entry.id).await?;
        debug!(
            container = entry.id.as_str(),
            children = children.len(),
            "Entered container"
        );
        self.path_stack.push(entry);
        self.items = children;
        Ok(())
    }

    /// Goes back one level. A listing only one level deep reloads the root.
    pub async fn navigate_up(&mut self) -> Result<(), ControlError> {
        if self.path_stack.len() <= 1 {
            return Ok(());
        }
        let mut stack = self.path_stack.clone();
        stack.pop();
        let parent_id = if stack.len() == 1 {
            self.root_id.clone()
        } else {
            stack
                .last()
                .map(|entry| entry.id.clone())
                .unwrap_or_else(|| self.root_id.clone())
        };

        let children = self.fetch(&parent_id).await?;
        self.path_stack = stack;
        self.items = children;
        Ok(())
    }

    async fn fetch(&self, container_id: &str) -> Result<Vec<DirectoryChild>, ControlError> {
        let device = self.device.as_ref().ok_or(ControlError::NoDevice)?;
        let listing = self
            .gateway
            .browse_directory(device, container_id)
            .await
            .inspect_err(|err| {
                warn!(
                    device = device.as_str(),
                    container = container_id,
                    error = %err,
                    "Browse failed"
                );
            })?;
        Ok(listing.children)
    }

    /// Rows of the current listing, led by an up row below the first level.
    pub fn rows(&self) -> Vec<BrowserRow> {
        let mut rows = Vec::with_capacity(self.items.len() + 1);
        if self.path_stack.len() > 1 {
            rows.push(BrowserRow::Up);
        }
        rows.extend(self.items.iter().map(|child| {
            if child.is_container {
                BrowserRow::Container(child.clone())
            } else {
                BrowserRow::Item {
                    mime_category: MimeCategory::from_mime_type(child.mime_type.as_deref()),
                    child: child.clone(),
                }
            }
        }));
        rows
    }

    /// Double activation of a row.
    pub async fn activate(&mut self, row: &BrowserRow) -> Result<BrowserActivation, ControlError> {
        match row {
            BrowserRow::Up => {
                self.navigate_up().await?;
                Ok(BrowserActivation::WentUp)
            }
            BrowserRow::Container(child) => {
                self.browse(child).await?;
                Ok(BrowserActivation::EnteredContainer(child.id.clone()))
            }
            BrowserRow::Item { child, .. } => playlist_item(child)
                .map(BrowserActivation::LeafActivated)
                .ok_or_else(|| {
                    ControlError::decode(format!("item {} carries no resource URI", child.id))
                }),
        }
    }
}

/// Builds the playlist entry of a leaf item. The title comes from the
/// item's metadata when it has a usable one.
pub fn playlist_item(child: &DirectoryChild) -> Option<PlaylistItem> {
    let uri = child.uri.as_deref().filter(|uri| !uri.is_empty())?;
    let metadata = child.metadata_document.clone().unwrap_or_default();
    let title = Some(metadata.as_str())
        .filter(|m| !m.is_empty())
        .and_then(hkdidl::extract_title)
        .filter(|t| !t.is_empty())
        .or_else(|| Some(child.title.clone()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| uri.to_string());

    Some(
        PlaylistItem::new(uri)
            .with_title(title)
            .with_metadata(metadata)
            .with_mime_category(MimeCategory::from_mime_type(child.mime_type.as_deref())),
    )
}
