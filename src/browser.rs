//! A core module for browsing the posts of a booru.
//!
//! See [`Browser`] for more information.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument};

use crate::api;
use crate::api::data::field::{Post, Tag};
use crate::api::data::{Page, TagResponse};
use crate::booru::ImageBooru;
use crate::error::{BooruError, Result};
use crate::offset::resolve;
use crate::tool::NUM_CPUS;

/** A browsing session over the posts of one [`ImageBooru`] matching a tag filter.

- Pages are fetched on first access and cached for the lifetime of the session.
    A failed fetch is not cached, so asking again hits the network again.
- Posts can be addressed by page, by ID, or by a global offset across all pages.

A `Browser` is not synchronized: it is meant to be owned by a single caller.
Put it behind a [`Mutex`](tokio::sync::Mutex) if it must be shared.

Usually, you create one with [`ImageBooru::browser`].
*/
#[derive(Debug)]
pub struct Browser<'a> {
    booru: &'a ImageBooru,
    tags: Vec<String>,
    pages: BTreeMap<u64, Page>,
}

impl<'a> Browser<'a> {
    /// Start a new session on `booru` filtered by `tags`, with an empty cache.
    pub fn new<I>(booru: &'a ImageBooru, tags: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            booru,
            tags: tags.into_iter().map(Into::into).collect(),
            pages: BTreeMap::new(),
        }
    }

    /// The booru this session browses.
    pub fn booru(&self) -> &'a ImageBooru {
        self.booru
    }

    /// The current tag filter.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// The indices of the pages currently cached, in ascending order.
    pub fn cached_pages(&self) -> impl Iterator<Item = u64> + '_ {
        self.pages.keys().copied()
    }

    /// Replace the tag filter.
    ///
    /// If every current tag is still in `tags`, the cached pages are kept;
    /// otherwise the whole cache is dropped.
    ///
    /// <div class="warning">
    ///
    /// Adding tags changes which posts land on which page, so pages kept
    /// across a widened filter may not match what the booru would now return.
    /// The rule is kept as is for compatibility.
    ///
    /// </div>
    pub fn set_tags<I>(&mut self, tags: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        let keeps_cache = self.tags.iter().all(|tag| tags.contains(tag));
        if !keeps_cache {
            debug!(old = ?self.tags, new = ?tags, "Tag filter changed, dropping cached pages");
            self.pages.clear();
        }
        self.tags = tags;
    }

    /// Get page `pid` of the listing, fetching it if it is not cached yet.
    ///
    /// # Errors
    ///
    /// If the page can not be fetched or parsed. Nothing is cached in that case.
    pub async fn get_page(&mut self, pid: u64) -> Result<&Page> {
        self.page_mut(pid).await.map(|page| &*page)
    }

    async fn page_mut(&mut self, pid: u64) -> Result<&mut Page> {
        match self.pages.entry(pid) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let page = Self::fetch_page(self.booru, &self.tags, pid).await?;
                Ok(entry.insert(page))
            }
        }
    }

    #[instrument(skip(booru), fields(booru = %booru.name()))]
    async fn fetch_page(booru: &ImageBooru, tags: &[String], pid: u64) -> Result<Page> {
        debug!("Querying page");
        let url = api::url::posts(booru.url(), pid, tags)?;
        let body = booru.transport().fetch(url.as_str(), None).await?;
        Page::from_xml(&body)
    }

    /// Fetch every page of `pids` that is not cached yet, concurrently.
    ///
    /// At most [`NUM_CPUS`] requests are in flight at once.
    /// The fetched pages are inserted into the cache one by one as they arrive.
    ///
    /// # Errors
    ///
    /// The first failure is returned after all requests finished;
    /// the pages that were fetched successfully are cached anyway.
    ///
    /// # Panics
    ///
    /// If a fetch task panics, the panic is resumed here.
    pub async fn prefetch(&mut self, pids: impl IntoIterator<Item = u64>) -> Result<()> {
        let pending: BTreeSet<u64> = pids
            .into_iter()
            .filter(|pid| !self.pages.contains_key(pid))
            .collect();
        debug!(?pending, "Prefetching pages");

        let semaphore = Arc::new(Semaphore::new(NUM_CPUS.get()));
        let mut fetch_join_set = JoinSet::new();
        for pid in pending {
            let url = api::url::posts(self.booru.url(), pid, &self.tags)?;
            let transport = Arc::clone(self.booru.transport());
            let semaphore = Arc::clone(&semaphore);
            fetch_join_set.spawn(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("semaphore was closed too early");
                let body = transport.fetch(url.as_str(), None).await?;
                Page::from_xml(&body).map(|page| (pid, page))
            });
        }

        let mut first_error = None;
        while let Some(task_result) = fetch_join_set.join_next().await {
            let task_result = match task_result {
                Ok(task_result) => task_result,
                Err(join_error) => {
                    if let Ok(reason) = join_error.try_into_panic() {
                        std::panic::resume_unwind(reason)
                    }
                    panic!("Unexpected task cancelled");
                }
            };

            match task_result {
                Ok((pid, page)) => {
                    self.pages.insert(pid, page);
                }
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Get the post at the zero-based `offset` across all pages of the listing.
    ///
    /// The returned post lives in the page cache, so loading its image with
    /// [`Post::load_image`] keeps the image for later lookups.
    ///
    /// # Errors
    ///
    /// - [`BooruError::PreconditionViolation`] if the post cap of the booru is unknown.
    /// - [`BooruError::OutOfRange`] if the page holds fewer posts than expected,
    ///     which usually means `offset` is past the end of the results.
    /// - Any error of [`Self::get_page`].
    pub async fn get_post(&mut self, offset: u64) -> Result<&mut Post> {
        let post_cap = self.booru.post_cap();
        let (pid, local) = resolve(offset, post_cap)?;

        let page = self.page_mut(pid).await?;
        let len = page.posts.len();
        let index = usize::try_from(local).unwrap_or(usize::MAX);
        let post = page
            .posts
            .get_mut(index)
            .ok_or(BooruError::OutOfRange { offset: local, len })?;

        debug!(offset, pid, local, "Returning post {}", post.id);
        Ok(post)
    }

    /// Fetch a single post by its ID, ignoring the tag filter and the cache.
    ///
    /// # Errors
    ///
    /// [`BooruError::EmptyResult`] if the booru knows no such post,
    /// or any fetch or parse error.
    #[instrument(skip(self), fields(booru = %self.booru.name()))]
    pub async fn get_post_by_id(&self, id: u64) -> Result<Post> {
        debug!("Querying post");
        let url = api::url::post(self.booru.url(), id)?;
        let body = self.booru.transport().fetch(url.as_str(), None).await?;

        Page::from_xml(&body)?
            .posts
            .into_iter()
            .next()
            .ok_or_else(|| BooruError::EmptyResult(format!("post id {id}")))
    }

    /// Look a tag up by name.
    ///
    /// Returns `None` if the booru knows no such tag. Some boorus answer such a
    /// query with a bare `<tag>` instead of a `<tags>` envelope; that also reads as `None`.
    ///
    /// # Errors
    ///
    /// Any fetch or parse error.
    #[instrument(skip(self), fields(booru = %self.booru.name()))]
    pub async fn get_tag(&self, name: &str) -> Result<Option<Tag>> {
        debug!("Querying tag");
        let url = api::url::tag(self.booru.url(), name)?;
        let body = self.booru.transport().fetch(url.as_str(), None).await?;

        match TagResponse::from_xml(&body)? {
            TagResponse::Set(set) => Ok(set.tags.into_iter().next()),
            TagResponse::Bare => {
                debug!("Bare <tag> response, treating as no match");
                Ok(None)
            }
        }
    }

    /// Collect up to `num` posts, walking the pages from the first one.
    ///
    /// Stops early at an empty page, or once the booru's total count is reached.
    /// If none of the posts are found, this returns an empty vector.
    ///
    /// # Errors
    ///
    /// Any error of [`Self::get_page`].
    pub async fn collect_posts(&mut self, num: usize) -> Result<Vec<Post>> {
        let mut posts = Vec::with_capacity(num.min(1024));
        let mut pid = 0;

        while posts.len() < num {
            let page = self.get_page(pid).await?;
            if page.posts.is_empty() {
                break;
            }
            let remaining = num - posts.len();
            posts.extend(page.posts.iter().take(remaining).cloned());

            let total = usize::try_from(page.count).unwrap_or(usize::MAX);
            if posts.len() >= total {
                break;
            }
            pid += 1;
        }

        Ok(posts)
    }
}
