//! Roots, documents, profiles and the locations queried inside them.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// A user profile on whose behalf a provider is queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProfileId(pub u32);

impl ProfileId {
    pub const DEFAULT: ProfileId = ProfileId(0);
}

impl Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "profile-{}", self.0)
    }
}

/// A storage root: one independently queryable namespace of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RootRef {
    pub authority: String,
    pub root_id: String,
    #[serde(default)]
    pub title: String,
}

impl RootRef {
    pub fn new(authority: impl Into<String>, root_id: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            root_id: root_id.into(),
            title: String::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn recent_location(&self) -> Location {
        Location::Recent {
            authority: self.authority.clone(),
            root_id: self.root_id.clone(),
        }
    }

    /// The name-match term travels in the query arguments, never in the
    /// location itself.
    pub fn search_location(&self) -> Location {
        Location::Search {
            authority: self.authority.clone(),
            root_id: self.root_id.clone(),
        }
    }
}

/// A folder (or file) known to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub authority: String,
    pub document_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_profile")]
    pub profile: ProfileId,
}

fn default_profile() -> ProfileId {
    ProfileId::DEFAULT
}

impl DocumentInfo {
    pub fn new(authority: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            document_id: document_id.into(),
            display_name: String::new(),
            profile: ProfileId::DEFAULT,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn children_location(&self) -> Location {
        Location::Children {
            authority: self.authority.clone(),
            document_id: self.document_id.clone(),
        }
    }
}

/// What a provider is asked to enumerate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    /// Direct children of one folder.
    Children {
        authority: String,
        document_id: String,
    },
    /// Recently modified documents of a root.
    Recent { authority: String, root_id: String },
    /// Generic search over a root; terms come from the query arguments.
    Search { authority: String, root_id: String },
}

impl Location {
    /// The provider authority, or `None` when it cannot be resolved.
    pub fn authority(&self) -> Option<&str> {
        let authority = match self {
            Self::Children { authority, .. }
            | Self::Recent { authority, .. }
            | Self::Search { authority, .. } => authority.as_str(),
        };
        if authority.is_empty() {
            None
        } else {
            Some(authority)
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Children {
                authority,
                document_id,
            } => write!(f, "content://{}/document/{}/children", authority, document_id),
            Self::Recent { authority, root_id } => {
                write!(f, "content://{}/root/{}/recent", authority, root_id)
            }
            Self::Search { authority, root_id } => {
                write!(f, "content://{}/root/{}/search", authority, root_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locations_display_as_content_uris() {
        let root = RootRef::new("local", "r0");
        assert_eq!(
            root.recent_location().to_string(),
            "content://local/root/r0/recent"
        );
        assert_eq!(
            root.search_location().to_string(),
            "content://local/root/r0/search"
        );
        let dir = DocumentInfo::new("local", "r0:docs");
        assert_eq!(
            dir.children_location().to_string(),
            "content://local/document/r0:docs/children"
        );
    }

    #[test]
    fn empty_authority_is_unresolvable() {
        assert_eq!(RootRef::new("", "r0").search_location().authority(), None);
        assert_eq!(
            RootRef::new("local", "r0").search_location().authority(),
            Some("local")
        );
    }
}
