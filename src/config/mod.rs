//! The configuration of the `booru-browse` binary.

use std::num::NonZeroU64;

use serde::Deserialize;
pub use validator::Validate;
use validator::ValidationError;

/// The commented default configuration, also used as the template of the editor.
pub const DEFAULT_CONFIG_STR: &str = include_str!("default.toml");

/// What to browse, and how.
#[non_exhaustive]
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct Config {
    /// The base URL of the booru.
    #[validate(url(message = "url must be a valid URL, e.g. https://gelbooru.com"))]
    pub url: String,
    /// The tag filter; may be empty to browse every post.
    #[serde(default)]
    #[validate(custom(function = "validate_tags"))]
    pub tags: Vec<String>,
    /// The global offset of the first post to print.
    #[serde(default)]
    pub offset: u64,
    /// How many posts to print.
    pub num_posts: NonZeroU64,
    /// The number of posts per page; `0` discovers it from the booru.
    #[serde(default)]
    pub post_cap: u64,
    /// The timeout of API requests in seconds; `0` disables it.
    pub timeout: u64,
    /// Whether to download and decode the image of every post.
    #[serde(default)]
    pub load_images: bool,
}

fn validate_tags(tags: &Vec<String>) -> Result<(), ValidationError> {
    if tags
        .iter()
        .any(|tag| tag.is_empty() || tag.contains(char::is_whitespace))
    {
        return Err(ValidationError::new("tag")
            .with_message("every tag must be a single non-empty word".into()));
    }
    Ok(())
}
