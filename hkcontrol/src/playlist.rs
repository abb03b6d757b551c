//! Client-side playlist.
//!
//! An ordered list of playable items where the URI is the identity: the
//! same URI can only be queued once. Which entry is playing is never
//! stored here; it is derived by matching the renderer's current-track URI
//! (see [`Playlist::find_index`]).

use serde::{Deserialize, Serialize};

use crate::errors::ControlError;

/// Coarse media family, derived from the MIME type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MimeCategory {
    Audio,
    Video,
    #[default]
    Other,
}

impl MimeCategory {
    pub fn from_mime_type(mime_type: Option<&str>) -> Self {
        match mime_type {
            Some(m) if m.starts_with("audio/") => MimeCategory::Audio,
            Some(m) if m.starts_with("video/") => MimeCategory::Video,
            _ => MimeCategory::Other,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub uri: String,
    /// DIDL-Lite document sent along with the URI when the item is played.
    pub metadata_document: String,
    pub title: String,
    pub mime_category: MimeCategory,
}

impl PlaylistItem {
    pub fn new(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        Self {
            title: uri.clone(),
            uri,
            metadata_document: String::new(),
            mime_category: MimeCategory::Other,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_metadata(mut self, metadata_document: impl Into<String>) -> Self {
        self.metadata_document = metadata_document.into();
        self
    }

    pub fn with_mime_category(mut self, mime_category: MimeCategory) -> Self {
        self.mime_category = mime_category;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct Playlist {
    items: Vec<PlaylistItem>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[PlaylistItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&PlaylistItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Appends `item`, clearing the playlist first when `replace` is set.
    ///
    /// Returns the index of the new entry, or `None` when an entry with the
    /// same URI is already queued (the playlist is left untouched).
    pub fn add(&mut self, item: PlaylistItem, replace: bool) -> Option<usize> {
        if replace {
            self.clear();
        }
        if self.find_index(&item.uri).is_some() {
            return None;
        }
        self.items.push(item);
        Some(self.items.len() - 1)
    }

    /// Removes the entry at `index` unless it is the `active` one.
    pub fn remove(
        &mut self,
        index: usize,
        active: Option<usize>,
    ) -> Result<PlaylistItem, ControlError> {
        self.check_index(index)?;
        if active == Some(index) {
            return Err(ControlError::ItemActive(index));
        }
        Ok(self.items.remove(index))
    }

    /// Drag-and-drop reorder: moves the entry at `from` to the drop slot
    /// `to`, where slot `to` sits before the entry currently at `to`
    /// (`to == len()` drops at the end).
    ///
    /// The entry is removed first, so when `from < to` it lands at `to - 1`.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), ControlError> {
        self.check_index(from)?;
        if to > self.items.len() {
            return Err(ControlError::IndexOutOfRange {
                index: to,
                len: self.items.len(),
            });
        }
        let target = if from < to { to - 1 } else { to };
        let item = self.items.remove(from);
        self.items.insert(target, item);
        Ok(())
    }

    /// Moves the entry at `from` so that it ends up at index `to`.
    pub fn reposition(&mut self, from: usize, to: usize) -> Result<(), ControlError> {
        self.check_index(from)?;
        self.check_index(to)?;
        let item = self.items.remove(from);
        self.items.insert(to, item);
        Ok(())
    }

    /// Index of the entry whose URI is exactly `uri`.
    pub fn find_index(&self, uri: &str) -> Option<usize> {
        if uri.is_empty() {
            return None;
        }
        self.items.iter().position(|item| item.uri == uri)
    }

    /// Entry following `current`; with no current entry, the first one.
    pub fn next_index(&self, current: Option<usize>) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }
        let target = current.map_or(0, |c| c + 1);
        (target < self.items.len()).then_some(target)
    }

    /// Entry preceding `current`; with no current entry, the last one.
    pub fn previous_index(&self, current: Option<usize>) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }
        match current {
            None => Some(self.items.len() - 1),
            Some(c) => c.checked_sub(1).filter(|&t| t < self.items.len()),
        }
    }

    fn check_index(&self, index: usize) -> Result<(), ControlError> {
        if index < self.items.len() {
            Ok(())
        } else {
            Err(ControlError::IndexOutOfRange {
                index,
                len: self.items.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uris(playlist: &Playlist) -> Vec<&str> {
        playlist.items().iter().map(|i| i.uri.as_str()).collect()
    }

    fn playlist_of(uris: &[&str]) -> Playlist {
        let mut playlist = Playlist::new();
        for uri in uris {
            playlist.add(PlaylistItem::new(*uri), false);
        }
        playlist
    }

    #[test]
    fn test_add_rejects_duplicates_and_reorders() {
        let mut playlist = Playlist::new();
        assert_eq!(playlist.add(PlaylistItem::new("a"), false), Some(0));
        assert_eq!(playlist.add(PlaylistItem::new("a"), false), None);
        assert_eq!(playlist.len(), 1);
        assert_eq!(playlist.add(PlaylistItem::new("b"), false), Some(1));
        assert_eq!(playlist.len(), 2);

        playlist.move_item(1, 0).unwrap();
        assert_eq!(uris(&playlist), vec!["b", "a"]);
    }

    #[test]
    fn test_add_with_replace_starts_over() {
        let mut playlist = playlist_of(&["a", "b"]);
        assert_eq!(playlist.add(PlaylistItem::new("a"), true), Some(0));
        assert_eq!(uris(&playlist), vec!["a"]);
    }

    #[test]
    fn test_move_item_drop_slot_semantics() {
        let mut playlist = playlist_of(&["a", "b", "c", "d"]);
        // dropping "a" before "c" leaves it at index 1
        playlist.move_item(0, 2).unwrap();
        assert_eq!(uris(&playlist), vec!["b", "a", "c", "d"]);

        // dropping at the end slot
        playlist.move_item(0, 4).unwrap();
        assert_eq!(uris(&playlist), vec!["a", "c", "d", "b"]);

        // moving upwards inserts at the slot itself
        playlist.move_item(3, 1).unwrap();
        assert_eq!(uris(&playlist), vec!["a", "b", "c", "d"]);

        // the slot right after the entry is a no-op
        playlist.move_item(1, 2).unwrap();
        assert_eq!(uris(&playlist), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_move_item_bounds() {
        let mut playlist = playlist_of(&["a", "b"]);
        assert!(matches!(
            playlist.move_item(2, 0),
            Err(ControlError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(matches!(
            playlist.move_item(0, 3),
            Err(ControlError::IndexOutOfRange { index: 3, len: 2 })
        ));
        assert_eq!(uris(&playlist), vec!["a", "b"]);
    }

    #[test]
    fn test_move_item_is_undone_by_inverse_drop() {
        let original = ["a", "b", "c", "d", "e"];
        for from in 0..original.len() {
            for to in 0..=original.len() {
                let mut playlist = playlist_of(&original);
                playlist.move_item(from, to).unwrap();
                let landed = if from < to { to - 1 } else { to };
                let back = if landed < from { from + 1 } else { from };
                playlist.move_item(landed, back).unwrap();
                assert_eq!(uris(&playlist), original.to_vec(), "from={from} to={to}");
            }
        }
    }

    #[test]
    fn test_reposition_round_trip() {
        let original = ["a", "b", "c", "d"];
        for from in 0..original.len() {
            for to in 0..original.len() {
                let mut playlist = playlist_of(&original);
                playlist.reposition(from, to).unwrap();
                assert_eq!(playlist.get(to).unwrap().uri, original[from]);
                playlist.reposition(to, from).unwrap();
                assert_eq!(uris(&playlist), original.to_vec());
            }
        }
    }

    #[test]
    fn test_remove_refuses_active_entry() {
        let mut playlist = playlist_of(&["a", "b", "c"]);
        assert_eq!(playlist.remove(1, Some(1)), Err(ControlError::ItemActive(1)));
        assert_eq!(uris(&playlist), vec!["a", "b", "c"]);

        let removed = playlist.remove(0, Some(1)).unwrap();
        assert_eq!(removed.uri, "a");
        assert_eq!(uris(&playlist), vec!["b", "c"]);

        assert!(playlist.remove(5, None).is_err());
    }

    #[test]
    fn test_find_index_exact_match() {
        let playlist = playlist_of(&["http://nas/a.flac", "http://nas/b.flac"]);
        assert_eq!(playlist.find_index("http://nas/b.flac"), Some(1));
        assert_eq!(playlist.find_index("http://nas/b.fla"), None);
        assert_eq!(playlist.find_index(""), None);
    }

    #[test]
    fn test_navigation_targets() {
        let empty = Playlist::new();
        assert_eq!(empty.next_index(None), None);
        assert_eq!(empty.previous_index(None), None);

        let playlist = playlist_of(&["a", "b", "c"]);
        assert_eq!(playlist.next_index(None), Some(0));
        assert_eq!(playlist.next_index(Some(1)), Some(2));
        assert_eq!(playlist.next_index(Some(2)), None);

        assert_eq!(playlist.previous_index(None), Some(2));
        assert_eq!(playlist.previous_index(Some(1)), Some(0));
        assert_eq!(playlist.previous_index(Some(0)), None);
    }

    #[test]
    fn test_mime_category() {
        assert_eq!(MimeCategory::from_mime_type(Some("audio/flac")), MimeCategory::Audio);
        assert_eq!(MimeCategory::from_mime_type(Some("video/mp4")), MimeCategory::Video);
        assert_eq!(MimeCategory::from_mime_type(Some("image/jpeg")), MimeCategory::Other);
        assert_eq!(MimeCategory::from_mime_type(None), MimeCategory::Other);
    }
}
