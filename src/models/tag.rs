//! Tag model

use serde::{Deserialize, Serialize};

/// Post tag, unique by name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    /// URL-friendly slug
    pub slug: String,
}

/// Tag with the number of posts using it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagWithCount {
    #[serde(flatten)]
    pub tag: Tag,
    pub post_count: i64,
}
