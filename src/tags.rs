use thiserror::Error;

use crate::local_store::{LocalStore, StoreError};
use crate::models::Tag;

/// Key the registry is saved under in a [`LocalStore`].
pub const TAGS_KEY: &str = "tags";

#[derive(Debug, Error)]
pub enum TagError {
    #[error("Tag name must not be empty")]
    EmptyName,

    #[error("Tag already exists: {0}")]
    Duplicate(String),

    #[error("Tag not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn default_tags() -> Vec<Tag> {
    vec![
        Tag::new("Work", "#3b82f6"),
        Tag::new("Personal", "#10b981"),
        Tag::new("Urgent", "#ef4444"),
    ]
}

/// Label/color pairs offered when tagging tasks and notes. Names are unique,
/// compared case-insensitively.
#[derive(Debug, Clone, PartialEq)]
pub struct TagRegistry {
    tags: Vec<Tag>,
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self {
            tags: default_tags(),
        }
    }
}

impl TagRegistry {
    pub fn from_tags(tags: Vec<Tag>) -> Self {
        let mut registry = Self { tags: Vec::new() };
        for tag in tags {
            // Later duplicates lose.
            let _ = registry.add(&tag.name, &tag.color);
        }
        registry
    }

    /// Loads the saved registry, falling back to the defaults.
    pub fn load(store: &LocalStore) -> Self {
        store
            .get::<Vec<Tag>>(TAGS_KEY)
            .map(Self::from_tags)
            .unwrap_or_default()
    }

    pub fn save(&self, store: &LocalStore) -> Result<(), TagError> {
        store.set(TAGS_KEY, &self.tags)?;
        Ok(())
    }

    pub fn list(&self) -> &[Tag] {
        &self.tags
    }

    fn position(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.tags.iter().position(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.position(name).map(|i| &self.tags[i])
    }

    pub fn add(&mut self, name: &str, color: &str) -> Result<&Tag, TagError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TagError::EmptyName);
        }
        if self.position(name).is_some() {
            return Err(TagError::Duplicate(name.to_string()));
        }
        self.tags.push(Tag::new(name, color.trim()));
        Ok(&self.tags[self.tags.len() - 1])
    }

    /// Renames and/or recolors `name`.
    pub fn update(
        &mut self,
        name: &str,
        new_name: Option<&str>,
        color: Option<&str>,
    ) -> Result<&Tag, TagError> {
        let index = self
            .position(name)
            .ok_or_else(|| TagError::NotFound(name.trim().to_string()))?;

        if let Some(new_name) = new_name {
            let new_name = new_name.trim();
            if new_name.is_empty() {
                return Err(TagError::EmptyName);
            }
            if let Some(other) = self.position(new_name) {
                if other != index {
                    return Err(TagError::Duplicate(new_name.to_string()));
                }
            }
            self.tags[index].name = new_name.to_string();
        }
        if let Some(color) = color {
            self.tags[index].color = color.trim().to_string();
        }

        Ok(&self.tags[index])
    }

    pub fn remove(&mut self, name: &str) -> Result<Tag, TagError> {
        let index = self
            .position(name)
            .ok_or_else(|| TagError::NotFound(name.trim().to_string()))?;
        Ok(self.tags.remove(index))
    }
}
