//! Catalog record model.

use serde::{Deserialize, Serialize};

use buildvault_cache::EntityType;
use buildvault_core::BuildId;

/// Cache namespace of builds.
pub const BUILD: EntityType = EntityType::new("build");
/// Cache namespace of author tags.
pub const AUTHOR: EntityType = EntityType::new("author");
/// Cache namespace of theme tags.
pub const THEME: EntityType = EntityType::new("theme");
/// Cache namespace of color tags.
pub const COLOR: EntityType = EntityType::new("color");

/// A named tag attached to builds (author, theme or color).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

impl Tag {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Attached binary payload of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileData {
    Loaded(Vec<u8>),
    /// The build has no payload.
    #[default]
    Missing,
    /// The payload exists but could not be read in the current session.
    Unavailable(String),
}

impl FileData {
    pub fn byte_len(&self) -> Option<usize> {
        match self {
            FileData::Loaded(bytes) => Some(bytes.len()),
            FileData::Missing | FileData::Unavailable(_) => None,
        }
    }
}

/// A catalog build with all of its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub id: BuildId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub creation_notes: Option<String>,
    #[serde(default)]
    pub authors: Vec<Tag>,
    #[serde(default)]
    pub themes: Vec<Tag>,
    #[serde(default)]
    pub colors: Vec<Tag>,
    /// Screenshot references, in submission order.
    #[serde(default)]
    pub screenshots: Vec<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file: FileData,
}

impl Build {
    pub fn new(id: BuildId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            creation_notes: None,
            authors: Vec::new(),
            themes: Vec::new(),
            colors: Vec::new(),
            screenshots: Vec::new(),
            file_name: None,
            file: FileData::Missing,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_authors(mut self, authors: Vec<Tag>) -> Self {
        self.authors = authors;
        self
    }

    pub fn with_themes(mut self, themes: Vec<Tag>) -> Self {
        self.themes = themes;
        self
    }

    pub fn with_colors(mut self, colors: Vec<Tag>) -> Self {
        self.colors = colors;
        self
    }

    pub fn with_screenshots(mut self, screenshots: Vec<String>) -> Self {
        self.screenshots = screenshots;
        self
    }

    pub fn with_file(mut self, file_name: impl Into<String>, file: FileData) -> Self {
        self.file_name = Some(file_name.into());
        self.file = file;
        self
    }

    pub fn to_ref(&self) -> BuildRef {
        BuildRef {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// Lightweight handle returned by identifier lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildRef {
    pub id: BuildId,
    pub name: String,
}
