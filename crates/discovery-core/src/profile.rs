//! Candidate profiles and the day's ordered queue.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Opaque profile identifier, unique within a day's queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProfileId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A candidate shown for one discovery cycle. Display attributes are opaque
/// to the engine and never mutated by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
}

impl Profile {
    /// Minimal profile with only an id and a display name.
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ProfileId::new(id),
            name: name.into(),
            age: None,
            bio: None,
            photos: Vec::new(),
        }
    }
}

/// The day's candidates in presentation order.
///
/// Membership is fixed once constructed: there is no way to insert, remove
/// or reorder profiles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyQueue {
    profiles: Vec<Profile>,
}

impl DailyQueue {
    /// Build a queue, rejecting duplicate identifiers.
    pub fn new(profiles: Vec<Profile>) -> Result<Self, ValidationError> {
        let mut seen = HashSet::with_capacity(profiles.len());
        for p in &profiles {
            if !seen.insert(p.id.clone()) {
                return Err(ValidationError::DuplicateProfile(p.id.to_string()));
            }
        }
        Ok(Self { profiles })
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Profile> {
        self.profiles.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }
}
