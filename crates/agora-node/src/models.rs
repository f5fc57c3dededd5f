//! Post model - the feed content the moderation engine guards.
//!
//! The wider feed (profiles, comments, likes) lives elsewhere; the node
//! stores just enough of a post to serve as the moderation engine's
//! content source and to carry the removal flag the resolution sink
//! writes back.

use serde::{Deserialize, Serialize};

/// A feed post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Content-addressed identifier (blake3 of author, body and timestamp).
    pub id: String,

    /// Author principal (e.g. a wallet address).
    pub author: String,

    /// Post text.
    pub body: String,

    /// Optional reference to an image in content-addressed storage.
    pub image_id: Option<String>,

    /// Creation timestamp, seconds since the Unix epoch.
    pub created_at: u64,

    /// Like counter, maintained by the feed layer.
    #[serde(default)]
    pub likes: u64,

    /// Removal flag written by the moderation resolution sink. A hidden
    /// post stays in storage as audit history but is no longer served in
    /// the feed.
    #[serde(default)]
    pub hidden: bool,
}

impl Post {
    /// Create a new post with its id derived from the content.
    pub fn new(author: String, body: String, created_at: u64) -> Self {
        let id = Self::generate_id(format!("{author}:{created_at}:{body}").as_bytes());
        Self {
            id,
            author,
            body,
            image_id: None,
            created_at,
            likes: 0,
            hidden: false,
        }
    }

    /// Builder: attach an image reference.
    #[must_use]
    pub fn with_image(mut self, image_id: String) -> Self {
        self.image_id = Some(image_id);
        self
    }

    /// Generate an id from content bytes.
    pub fn generate_id(content: &[u8]) -> String {
        let hash = blake3::hash(content);
        hex::encode(hash.as_bytes())
    }
}
