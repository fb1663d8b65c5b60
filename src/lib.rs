#![warn(missing_docs)]

//! <div class="warning">
//!
//! Note: API is unstable, and may change in `0.x` versions.
//!
//! </div>
//!
//! # As a library
//!
//! Create a [`booru::ImageBooru`] for a Danbooru/Gelbooru-style site,
//! discover its post cap, then browse it with one [`browser::Browser`] per tag filter.
//! Posts found by a browser can load their image with [`api::data::field::Post::load_image`].
//!
//! See [`booru::ImageBooru#example`] for example.
//!
//! Every request goes through a [`transport::Transport`], which [`reqwest::Client`] implements.
//!
//! # As a binary
//!
//! In addition to the above, you also need [`cli`] (feature `cli`) to build the command line.
//!
//! See `main.rs` to know how to assemble these modules as a binary.

pub mod api;
pub mod booru;
pub mod browser;
#[cfg(feature = "cli")]
pub mod cli;
pub mod offset;

pub mod config;
pub mod error;
pub mod hash;
pub mod media;
pub mod tool;
pub mod transport;
