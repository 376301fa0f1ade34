/// Posts, likes and comments
mod comments;
mod posts;

pub use comments::CommentService;
pub use posts::{LikeOutcome, PostService};

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Longest result set returned by post search
pub const SEARCH_LIMIT: i64 = 50;

/// New post body
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewPost {
    #[validate(length(min = 1, max = 50))]
    pub title: String,
    #[validate(length(min = 1, max = 120))]
    pub text: String,
}

/// Partial post update. Absent or blank fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PostPatch {
    #[serde(default)]
    #[validate(length(max = 50))]
    pub title: Option<String>,
    #[serde(default)]
    #[validate(length(max = 120))]
    pub text: Option<String>,
}

impl PostPatch {
    /// Trimmed, non-blank fields only
    pub fn effective(&self) -> PostPatch {
        fn keep(field: &Option<String>) -> Option<String> {
            field
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        }

        PostPatch {
            title: keep(&self.title),
            text: keep(&self.text),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.text.is_none()
    }
}

/// New comment body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    #[serde(default)]
    pub text: String,
}
