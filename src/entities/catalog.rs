//! Carousel items, catalogs and the banner feed they are selected from.
//!
//! The feed is the JSON document the host loads once per reload. A catalog is
//! the ordered, displayable subset of the feed for one tag; the engine owns it
//! for a whole session and never edits it in place.

use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use url::Url;

/// One carousel slide. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "TagNo")]
    pub tag_id: String,
    #[serde(rename = "DraftTitle")]
    pub title: String,
    #[serde(rename = "DraftSubTitle")]
    pub subtitle: String,
    #[serde(rename = "DraftPic")]
    pub image_locator: String,
}

impl Item {
    pub fn new(
        tag_id: impl Into<String>,
        title: impl Into<String>,
        subtitle: impl Into<String>,
        image_locator: impl Into<String>,
    ) -> Self {
        Self {
            tag_id: tag_id.into(),
            title: title.into(),
            subtitle: subtitle.into(),
            image_locator: image_locator.into(),
        }
    }

    /// Items whose locator is neither an absolute URL nor a well-formed
    /// relative reference are never shown.
    pub fn is_displayable(&self) -> bool {
        self.cache_key().is_some()
    }

    /// Canonical cache key for this item's image.
    ///
    /// Parsed on demand; items keep the raw string. Absolute URLs are
    /// normalized by the parser, relative references are kept as written and
    /// resolved by the fetcher.
    pub fn cache_key(&self) -> Option<String> {
        let raw = self.image_locator.trim();
        match Url::parse(raw) {
            Ok(url) => Some(url.to_string()),
            Err(url::ParseError::RelativeUrlWithoutBase) if is_relative_reference(raw) => {
                Some(raw.to_string())
            }
            Err(_) => None,
        }
    }
}

/// RFC 3986 relative-path or network-path reference.
///
/// No whitespace or characters outside the URI alphabet, and no `:` before the
/// first `/` (that would read as a scheme).
fn is_relative_reference(raw: &str) -> bool {
    if raw.is_empty() {
        return false;
    }
    let uri_char = |c: char| c.is_ascii_alphanumeric() || "-._~:/?#[]@!$&'()*+,;=%".contains(c);
    if !raw.chars().all(uri_char) {
        return false;
    }
    let first_segment = raw.split(['/', '?', '#']).next().unwrap_or_default();
    !first_segment.contains(':')
}

/// Ordered items for the active tag, replaced wholesale on reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    items: Vec<Item>,
}

impl Catalog {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    /// Presentation sequence with one phantom slot at each end.
    ///
    /// `[last] + items + [first]` for two or more items, the items unchanged
    /// otherwise. Always derived, never stored separately from the catalog.
    pub fn extended(&self) -> Vec<Item> {
        let n = self.items.len();
        if n <= 1 {
            return self.items.clone();
        }
        let mut ext = Vec::with_capacity(n + 2);
        ext.push(self.items[n - 1].clone());
        ext.extend(self.items.iter().cloned());
        ext.push(self.items[0].clone());
        ext
    }
}

impl FromIterator<Item> for Catalog {
    fn from_iter<I: IntoIterator<Item = Item>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Tag used to group feed items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "TagNo")]
    pub id: String,
    #[serde(rename = "TagTitle")]
    pub title: String,
    #[serde(rename = "TagSort")]
    pub sort: i32,
}

/// Banner feed document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    #[serde(rename = "HeadTitle", default)]
    pub head_title: String,
    #[serde(rename = "TagData", default)]
    pub tags: Vec<Tag>,
    #[serde(rename = "DraftData", default)]
    pub items: Vec<Item>,
}

/// Feed loading errors
#[derive(Debug)]
pub enum FeedError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::Io(e) => write!(f, "Feed I/O error: {}", e),
            FeedError::Parse(e) => write!(f, "Feed parse error: {}", e),
        }
    }
}

impl std::error::Error for FeedError {}

impl Feed {
    pub fn from_json(json: &str) -> Result<Self, FeedError> {
        serde_json::from_str(json).map_err(|e| FeedError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, FeedError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| FeedError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Tag with the lowest sort order, if any.
    pub fn primary_tag(&self) -> Option<&Tag> {
        self.tags.iter().min_by_key(|t| t.sort)
    }

    /// Build the catalog for `tag`, or for the primary tag when `None`.
    ///
    /// Keeps feed order. Items with an invalid locator are dropped here so the
    /// engine only ever sees displayable items.
    pub fn select(&self, tag: Option<&str>) -> Catalog {
        let tag_id = match tag {
            Some(t) => t.to_string(),
            None => match self.primary_tag() {
                Some(t) => t.id.clone(),
                None => {
                    debug!("Feed has no tags, catalog is empty");
                    return Catalog::empty();
                }
            },
        };

        let catalog: Catalog = self
            .items
            .iter()
            .filter(|item| item.tag_id == tag_id)
            .filter(|item| {
                let ok = item.is_displayable();
                if !ok {
                    warn!("Skipping '{}': invalid image locator '{}'", item.title, item.image_locator);
                }
                ok
            })
            .cloned()
            .collect();

        debug!("Selected {} items for tag {}", catalog.len(), tag_id);
        catalog
    }
}
