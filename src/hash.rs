//! Hashes of downloaded images: a cryptographic digest to verify the booru's copy,
//! and a perceptual hash to compare what the images look like.

use digest::Digest;
use image::imageops::FilterType;
use image::DynamicImage;

/// The side of the grayscale thumbnail the perceptual hash is computed from.
const PHASH_SIDE: u32 = 8;

/// Hash `data` with `D` and return the lowercase hex digest.
pub fn hash_hex<D: Digest>(data: impl AsRef<[u8]>) -> String {
    base16ct::lower::encode_string(&D::digest(data))
}

/// The lowercase hex MD5 of `data`, as the booru reports it in the `md5` attribute.
pub fn md5_hex(data: impl AsRef<[u8]>) -> String {
    hash_hex::<md5::Md5>(data)
}

/// The average hash of `image`.
///
/// The image is shrunk to an 8x8 grayscale thumbnail;
/// bit `i` is set when pixel `i` is brighter than the mean of all 64 pixels.
/// Similar images have hashes with a small [`hamming_distance`].
///
/// This is CPU bound, run it on a blocking pool for large images.
pub fn perceptual_hash(image: &DynamicImage) -> u64 {
    let thumbnail = image
        .resize_exact(PHASH_SIDE, PHASH_SIDE, FilterType::Triangle)
        .into_luma8();
    let pixels: Vec<u64> = thumbnail.pixels().map(|pixel| u64::from(pixel.0[0])).collect();
    // `pixels.len()` is never 0: `resize_exact` always yields 8x8
    let mean = pixels.iter().sum::<u64>() / pixels.len() as u64;

    pixels
        .iter()
        .enumerate()
        .filter(|&(_, &value)| value > mean)
        .fold(0, |hash, (i, _)| hash | (1 << i))
}

/// The number of differing bits between two perceptual hashes.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

#[cfg(test)]
mod tests {
    use super::*;

    use image::{GrayImage, Luma};

    #[test]
    fn test_md5_hex() {
        // see: https://en.wikipedia.org/wiki/MD5#MD5_hashes
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            md5_hex("The quick brown fox jumps over the lazy dog"),
            "9e107d9d372bb6826bd81d3542a419d6"
        );
    }

    fn half_white(width: u32, height: u32) -> DynamicImage {
        // left half black, right half white
        DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Luma([0])
            } else {
                Luma([255])
            }
        }))
    }

    #[test]
    fn test_perceptual_hash() {
        assert_eq!(perceptual_hash(&DynamicImage::ImageLuma8(GrayImage::new(16, 16))), 0);

        // in every row of 8 bits, only the right 4 are set
        let hash = perceptual_hash(&half_white(64, 64));
        assert_eq!(hash, 0xf0f0_f0f0_f0f0_f0f0);
    }

    #[test]
    fn test_perceptual_hash_ignores_scale() {
        let small = perceptual_hash(&half_white(32, 32));
        let large = perceptual_hash(&half_white(256, 128));
        assert!(hamming_distance(small, large) <= 4);
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(0, 0), 0);
        assert_eq!(hamming_distance(0b1011, 0b0001), 2);
        assert_eq!(hamming_distance(0, u64::MAX), 64);
    }
}
