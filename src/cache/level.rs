//! Mipmap level selection.
//!
//! Level `n` holds an image downsampled by `2^n` in each dimension. The
//! smallest pyramid level is the one whose larger side is still about
//! [`MIN_LEVEL_DIMENSION`] pixels.

/// Largest side, in pixels, below which no further level is generated.
pub const MIN_LEVEL_DIMENSION: f64 = 32.0;

/// Highest mipmap level generated for an image whose larger side is
/// `max_dimension` pixels.
#[must_use]
pub fn max_level(max_dimension: f64) -> u32 {
    if max_dimension.is_nan() || max_dimension <= MIN_LEVEL_DIMENSION {
        return 0;
    }
    (0.5 + max_dimension.log2() - MIN_LEVEL_DIMENSION.log2()).floor() as u32
}

/// Level to fetch when displaying an image at `magnification`.
///
/// Magnifications above 1 use full resolution. Returns `None` for a
/// magnification that is zero, negative or NaN.
///
/// # Example
///
/// ```
/// use mipcache::cache::mipmap_level;
///
/// assert_eq!(mipmap_level(2.0, 4096.0), Some(0));
/// assert_eq!(mipmap_level(0.25, 4096.0), Some(2));
/// // A 64 px tile has only levels 0 and 1
/// assert_eq!(mipmap_level(0.01, 64.0), Some(1));
/// assert_eq!(mipmap_level(0.0, 64.0), None);
/// ```
#[must_use]
pub fn mipmap_level(magnification: f64, max_dimension: f64) -> Option<u32> {
    if magnification.is_nan() || magnification <= 0.0 {
        return None;
    }
    if magnification > 1.0 {
        return Some(0);
    }
    // The epsilon keeps exact powers of two from rounding down a level
    let level = (0.0001 + (1.0 / magnification).log2()).floor() as u32;
    Some(level.min(max_level(max_dimension)))
}

/// Byte footprint of level `level` of an RGBA image of the given size.
#[must_use]
pub fn level_size_bytes(width: u32, height: u32, level: u32) -> u64 {
    let shift = level.min(31);
    let w = u64::from((width >> shift).max(1));
    let h = u64::from((height >> shift).max(1));
    w * h * 4
}
