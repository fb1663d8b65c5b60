//! A core module describing one imageboard site.
//!
//! See [`ImageBooru`] for more information.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use reqwest::Client;
use tracing::info;

use crate::browser::Browser;
use crate::error::{BooruError, Result};
use crate::transport::Transport;

/// The page of an unfiltered listing whose `offset` attribute reports the post cap.
const POST_CAP_PAGE: u64 = 1;

/// Derive the short name of a booru from its URL.
///
/// The scheme is stripped, everything from the first `/` on is dropped,
/// and the rest is lower-cased with `.` removed:
/// `https://Gelbooru.com/index.php` becomes `gelboorucom`.
///
/// Note: names of different sites may collide, e.g. `a.bc.com` and `ab.c.com`.
pub fn derive_name(url: &str) -> String {
    let url = url.to_lowercase();
    let host = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .unwrap_or(url.as_str());
    let host = host.split('/').next().unwrap_or_default();
    host.replace('.', "")
}

/** One imageboard site: its URL, derived name and post cap.

The post cap is the fixed number of posts per page of the site.
It is `0` (unknown) until [`Self::discover_post_cap`] or [`Self::set_post_cap`] is called,
and must be known before posts are looked up by global offset.

# Example
```no_run
use reqwest::Client;
use booru_browse::booru::ImageBooru;

#[tokio::main]
async fn main() -> booru_browse::error::Result<()> {
    let mut booru = ImageBooru::new(Client::new(), "https://gelbooru.com");
    booru.discover_post_cap().await?;

    let mut browser = booru.browser(["cat", "solo"]);
    let post = browser.get_post(0).await?;
    println!("{}", post.file_url);
    Ok(())
}
```
*/
pub struct ImageBooru {
    url: String,
    name: String,
    post_cap: u64,
    transport: Arc<dyn Transport>,
}

impl ImageBooru {
    /// Create a booru reached through `client`.
    ///
    /// `url` is the base URL of the site, e.g. `https://gelbooru.com`.
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self::with_transport(Arc::new(client), url)
    }

    /// Create a booru reached through any [`Transport`].
    pub fn with_transport(transport: Arc<dyn Transport>, url: impl Into<String>) -> Self {
        let url: String = url.into();
        let url = url.trim_end_matches('/').to_owned();
        Self {
            name: derive_name(&url),
            url,
            post_cap: 0,
            transport,
        }
    }

    /// The base URL, without trailing `/`.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The short name derived from the URL, see [`derive_name`].
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The number of posts per page, `0` if unknown.
    pub fn post_cap(&self) -> u64 {
        self.post_cap
    }

    /// Set the post cap by hand, e.g. when it is already known from configuration.
    pub fn set_post_cap(&mut self, post_cap: u64) {
        self.post_cap = post_cap;
    }

    /// The transport used for every request to this booru.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Start a new browsing session filtered by `tags`.
    ///
    /// Every call returns a fresh session with its own page cache.
    pub fn browser<I>(&self, tags: I) -> Browser<'_>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Browser::new(self, tags)
    }

    /// Ask the booru for its post cap, store it, and return it.
    ///
    /// The booru reports its post cap as the `offset` of page `1` of an unfiltered listing.
    /// This is a quirk of the API rather than a pagination rule, but it is what the
    /// target boorus do.
    ///
    /// # Errors
    ///
    /// [`BooruError::DiscoveryFailed`] if the page can not be fetched or parsed.
    pub async fn discover_post_cap(&mut self) -> Result<u64> {
        let post_cap = {
            let mut browser = self.browser(std::iter::empty::<String>());
            let page = browser
                .get_page(POST_CAP_PAGE)
                .await
                .map_err(|err| BooruError::DiscoveryFailed {
                    name: self.name.clone(),
                    source: Box::new(err),
                })?;
            page.offset
        };

        self.post_cap = post_cap;
        info!(booru = %self.name, post_cap, "Booru cap count discovered");
        Ok(post_cap)
    }
}

impl fmt::Debug for ImageBooru {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBooru")
            .field("url", &self.url)
            .field("name", &self.name)
            .field("post_cap", &self.post_cap)
            .finish_non_exhaustive()
    }
}

/// A lookup of boorus by their derived name.
///
/// This is an ordinary value owned by the caller; wrap it in a lock to share it between threads.
#[derive(Debug, Default)]
pub struct BooruDirectory {
    boorus: HashMap<String, ImageBooru>,
}

impl BooruDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `booru` under its derived name.
    ///
    /// Returns the booru previously registered under the same name, if any.
    /// Different sites whose names only differ by `.` collide here.
    pub fn insert(&mut self, booru: ImageBooru) -> Option<ImageBooru> {
        self.boorus.insert(booru.name.clone(), booru)
    }

    /// Look a booru up by derived name.
    pub fn get(&self, name: &str) -> Option<&ImageBooru> {
        self.boorus.get(name)
    }

    /// Look a booru up by derived name, e.g. to discover its post cap.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ImageBooru> {
        self.boorus.get_mut(name)
    }

    /// Remove and return the booru registered under `name`.
    pub fn remove(&mut self, name: &str) -> Option<ImageBooru> {
        self.boorus.remove(name)
    }

    /// The names of all registered boorus, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.boorus.keys().map(String::as_str)
    }

    /// The number of registered boorus.
    pub fn len(&self) -> usize {
        self.boorus.len()
    }

    /// Whether no booru is registered.
    pub fn is_empty(&self) -> bool {
        self.boorus.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::mock::ScriptedTransport;

    const URL: &str = "https://gelbooru.com";
    const CAP_URL: &str = "https://gelbooru.com/index.php?page=dapi&s=post&q=index&pid=1&tags=";

    #[test]
    fn test_derive_name() {
        assert_eq!(derive_name("https://gelbooru.com"), "gelboorucom");
        assert_eq!(derive_name("http://safebooru.org/index.php"), "safebooruorg");
        assert_eq!(derive_name("HTTPS://Rule34.XXX/"), "rule34xxx");
        assert_eq!(derive_name("example.net/a/b"), "examplenet");
        // known limitation
        assert_eq!(derive_name("https://a.bc.com"), derive_name("https://ab.c.com"));
    }

    #[test]
    fn test_new_booru() {
        let booru = ImageBooru::with_transport(ScriptedTransport::new(), "https://gelbooru.com/");
        assert_eq!(booru.url(), URL);
        assert_eq!(booru.name(), "gelboorucom");
        assert_eq!(booru.post_cap(), 0);
    }

    #[tokio::test]
    async fn test_discover_post_cap() {
        let transport = ScriptedTransport::new();
        transport.reply(CAP_URL, r#"<posts count="5000" offset="100"><post id="1"/></posts>"#);

        let mut booru = ImageBooru::with_transport(transport.clone(), URL);
        assert_eq!(booru.discover_post_cap().await.unwrap(), 100);
        assert_eq!(booru.post_cap(), 100);
        assert_eq!(transport.hits(CAP_URL), 1);
    }

    #[tokio::test]
    async fn test_discover_post_cap_failed() {
        let transport = ScriptedTransport::new();
        transport.fail(CAP_URL, "connection refused");

        let mut booru = ImageBooru::with_transport(transport.clone(), URL);
        booru.set_post_cap(42);
        let err = booru.discover_post_cap().await.unwrap_err();
        assert!(matches!(
            &err,
            BooruError::DiscoveryFailed { name, source }
                if name == "gelboorucom" && matches!(**source, BooruError::Network { .. })
        ));
        // a failed discovery leaves the previous value alone
        assert_eq!(booru.post_cap(), 42);
    }

    #[test]
    fn test_browsers_are_independent() {
        let booru = ImageBooru::with_transport(ScriptedTransport::new(), URL);
        let first = booru.browser(["cat"]);
        let second = booru.browser(["cat"]);
        assert_eq!(first.tags(), second.tags());
        assert!(std::ptr::eq(first.booru(), second.booru()));
    }

    #[test]
    fn test_directory() {
        let mut directory = BooruDirectory::new();
        assert!(directory.is_empty());

        let transport = ScriptedTransport::new();
        assert!(directory
            .insert(ImageBooru::with_transport(transport.clone(), URL))
            .is_none());
        assert!(directory
            .insert(ImageBooru::with_transport(transport.clone(), "https://safebooru.org"))
            .is_none());
        assert_eq!(directory.len(), 2);

        directory.get_mut("gelboorucom").unwrap().set_post_cap(100);
        assert_eq!(directory.get("gelboorucom").unwrap().post_cap(), 100);

        // colliding names replace the previous entry
        let replaced = directory
            .insert(ImageBooru::with_transport(transport.clone(), "https://gel.booru.com"))
            .unwrap();
        assert_eq!(replaced.url(), URL);
        assert_eq!(directory.get("gelboorucom").unwrap().post_cap(), 0);

        let mut names: Vec<_> = directory.names().collect();
        names.sort_unstable();
        assert_eq!(names, ["gelboorucom", "safebooruorg"]);

        assert!(directory.remove("safebooruorg").is_some());
        assert!(directory.get("safebooruorg").is_none());
        assert_eq!(directory.len(), 1);
    }
}
