//! Translate a global post offset into a page and an offset within that page.

use crate::error::{BooruError, Result};

/// Resolve the zero-based `global` offset into `(page, local)` for pages of `post_cap` posts.
///
/// The local offset is taken from the one-based position `global + 1`, wrapping
/// a zero remainder to the last slot of the page. Keep the two steps as they are,
/// the lookup relies on exactly this shape.
///
/// ```rust
/// use booru_browse::offset::resolve;
///
/// assert_eq!(resolve(0, 100).unwrap(), (0, 0));
/// assert_eq!(resolve(99, 100).unwrap(), (0, 99));
/// assert_eq!(resolve(100, 100).unwrap(), (1, 0));
/// ```
///
/// # Errors
///
/// [`BooruError::PreconditionViolation`] if `post_cap` is `0`, i.e. the post cap
/// was never discovered or set. This is a usage error, not a runtime condition.
pub fn resolve(global: u64, post_cap: u64) -> Result<(u64, u64)> {
    if post_cap == 0 {
        return Err(BooruError::PreconditionViolation(String::from(
            "post cap not set, discover or set it before looking up posts by offset",
        )));
    }

    let page = global / post_cap;
    // `(global + 1) % post_cap` without overflowing at `u64::MAX`
    let local = match (global % post_cap + 1) % post_cap {
        0 => post_cap - 1,
        rem => rem - 1,
    };
    Ok((page, local))
}
