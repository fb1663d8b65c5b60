//! Some useful tools for the project.
//!
//! Usually, you don't need to use this module directly.
//! [`crate::browser`] and [`crate::media`] will automatically use these tools.

use std::num::NonZeroUsize;
use std::sync::LazyLock;
use std::thread::available_parallelism;

use reqwest::Url;

use crate::error::{BooruError, Result};

/// The number of CPUs available to the program.
/// You can consider this as cache of [`std::thread::available_parallelism`].
pub static NUM_CPUS: LazyLock<NonZeroUsize> =
    LazyLock::new(|| available_parallelism().unwrap_or(NonZeroUsize::MIN));

/// Make an image URL of a post fetchable.
///
/// Protocol-relative URLs (`//host/path`) get an `https:` scheme.
///
/// # Errors
///
/// [`BooruError::UrlTooShort`] if `url` is shorter than 2 characters,
/// which covers the empty `source` of most posts.
pub fn normalize_url(url: &str) -> Result<String> {
    if url.chars().count() < 2 {
        return Err(BooruError::UrlTooShort(url.to_owned()));
    }
    if url.starts_with("//") {
        Ok(format!("https:{url}"))
    } else {
        Ok(url.to_owned())
    }
}

/// The lowercase file extension of the path of `url`, without the dot.
///
/// Query and fragment are ignored. Returns an empty string if the path has no extension.
///
/// # Errors
///
/// [`BooruError::InvalidUrl`] if `url` can not be parsed.
pub fn url_extension(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|err| BooruError::InvalidUrl {
        url: url.to_owned(),
        reason: err.to_string(),
    })?;

    let file_name = parsed.path().rsplit('/').next().unwrap_or_default();
    let extension = match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => extension,
        _ => "",
    };
    Ok(extension.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("//img.test/a/b.png").unwrap(),
            "https://img.test/a/b.png"
        );
        assert_eq!(
            normalize_url("http://img.test/b.png").unwrap(),
            "http://img.test/b.png"
        );
        assert!(matches!(normalize_url(""), Err(BooruError::UrlTooShort(_))));
        assert!(matches!(normalize_url("/"), Err(BooruError::UrlTooShort(_))));
        // two bytes, one character
        assert!(matches!(normalize_url("é"), Err(BooruError::UrlTooShort(_))));
        assert_eq!(normalize_url("éé").unwrap(), "éé");
    }

    #[test]
    fn test_url_extension() {
        assert_eq!(url_extension("https://img.test/a/b.png").unwrap(), "png");
        assert_eq!(url_extension("https://img.test/b.JPEG?download=1").unwrap(), "jpeg");
        assert_eq!(url_extension("https://img.test/b.tar.gz#frag").unwrap(), "gz");
        assert_eq!(url_extension("https://twitter.com/artist/status/1").unwrap(), "");
        assert_eq!(url_extension("https://img.test/.hidden").unwrap(), "");
        assert_eq!(url_extension("https://img.test/").unwrap(), "");
        assert!(matches!(
            url_extension("img.test/b.png"),
            Err(BooruError::InvalidUrl { .. })
        ));
    }
}
