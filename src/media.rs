//! A core module to load the image of a [`Post`].
//!
//! See [`Post::load_image`] for more information.

use std::fmt;
use std::time::Duration;

use image::{DynamicImage, ImageFormat};
use tracing::{debug, warn};

use crate::api::data::field::Post;
use crate::error::{BooruError, Result};
use crate::hash::{md5_hex, perceptual_hash};
use crate::tool::{normalize_url, url_extension};
use crate::transport::Transport;

/// The timeout of every image download.
pub const IMAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// The image formats we can decode, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// `.png`
    Png,
    /// `.jpg` or `.jpeg`
    Jpeg,
    /// `.gif`, only the first frame is decoded
    Gif,
}

impl ImageKind {
    /// Pick the format from a file extension, without the dot.
    ///
    /// # Errors
    ///
    /// [`BooruError::UnsupportedFormat`] for anything but `png`, `jpg`, `jpeg` and `gif`.
    pub fn from_extension(extension: &str) -> Result<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "gif" => Ok(Self::Gif),
            "" => Err(BooruError::UnsupportedFormat(String::from("<no extension>"))),
            _ => Err(BooruError::UnsupportedFormat(format!(".{extension}"))),
        }
    }

    /// Pick the format from the extension of the path of `url`.
    ///
    /// # Errors
    ///
    /// See [`Self::from_extension`]; also [`BooruError::InvalidUrl`] if `url` can not be parsed.
    pub fn from_url(url: &str) -> Result<Self> {
        Self::from_extension(&url_extension(url)?)
    }

    fn format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Gif => ImageFormat::Gif,
        }
    }
}

/// Which copy of the image is being loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// `file_url`, hosted by the booru.
    Booru,
    /// `source`, where the artist published it.
    Source,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Booru => f.write_str("booru"),
            Self::Source => f.write_str("source"),
        }
    }
}

/// A downloaded and decoded image.
struct Loaded {
    bytes: Vec<u8>,
    image: DynamicImage,
    phash: u64,
}

/// Decode `bytes` and hash the result on the rayon pool.
async fn decode(bytes: Vec<u8>, kind: ImageKind) -> Result<Loaded> {
    tokio_rayon::spawn(move || {
        let image = image::load_from_memory_with_format(&bytes, kind.format())?;
        let phash = perceptual_hash(&image);
        Ok(Loaded {
            bytes,
            image,
            phash,
        })
    })
    .await
}

impl Post {
    /// Download and decode the image of this post.
    ///
    /// The booru-hosted `file_url` is tried first. If that fails for any reason,
    /// the artist's `source` is tried instead. On success [`Self::bytes`],
    /// [`Self::image`] and [`Self::phash`] are filled; on failure they are left untouched.
    ///
    /// Each attempt:
    /// - rejects URLs shorter than 2 characters,
    /// - turns `//host/path` into `https://host/path`,
    /// - picks the decoder from the URL's extension, see [`ImageKind`],
    /// - gives up downloading after [`IMAGE_TIMEOUT`].
    ///
    /// The booru copy is also checked against [`Self::md5`] when the booru reported one.
    ///
    /// # Errors
    ///
    /// [`BooruError::ImageLoad`] holding both failures if neither copy could be loaded.
    pub async fn load_image<T>(&mut self, transport: &T) -> Result<()>
    where
        T: Transport + ?Sized,
    {
        let primary = match self.load_from(Origin::Booru, transport).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        warn!(id = self.id, error = %primary, "Booru download failed, attempting source");

        self.load_from(Origin::Source, transport)
            .await
            .map_err(|fallback| BooruError::ImageLoad {
                primary: Box::new(primary),
                fallback: Box::new(fallback),
            })
    }

    async fn load_from<T>(&mut self, origin: Origin, transport: &T) -> Result<()>
    where
        T: Transport + ?Sized,
    {
        let url = match origin {
            Origin::Booru => &self.file_url,
            Origin::Source => &self.source,
        };
        let url = normalize_url(url)?;
        let kind = ImageKind::from_url(&url)?;

        debug!(id = self.id, %origin, %url, ?kind, "Downloading image");
        let bytes = transport.fetch(&url, Some(IMAGE_TIMEOUT)).await?;

        if origin == Origin::Booru && !self.md5.is_empty() {
            let actual = md5_hex(&bytes);
            if !actual.eq_ignore_ascii_case(&self.md5) {
                return Err(BooruError::ChecksumMismatch {
                    expected: self.md5.clone(),
                    actual,
                });
            }
        }

        debug!(id = self.id, %origin, "Decoding image");
        let Loaded {
            bytes,
            image,
            phash,
        } = decode(bytes, kind).await?;
        self.bytes = Some(bytes);
        self.image = Some(image);
        self.phash = Some(phash);
        Ok(())
    }
}
