//! Decoded raster images and the fetch errors that can replace them.
//!
//! A `DecodedImage` is the value stored by the image cache. Pixel data lives
//! behind an `Arc`, so cloning an image for every waiter of a fetch is cheap.

use std::sync::Arc;

/// Bytes per RGBA8 pixel
const RGBA8_BYTES: usize = 4;

/// Decoded RGBA8 raster, shared between cache and consumers
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pixels: Arc<Vec<u8>>,
    width: usize,
    height: usize,
    bytes_per_row: usize,
}

impl PartialEq for DecodedImage {
    /// Two handles are equal when they share the same pixel buffer.
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

impl DecodedImage {
    /// Wrap an already decoded RGBA8 buffer.
    ///
    /// The buffer is padded or truncated to `width * height * 4` bytes so that
    /// `cost()` always reflects the raster actually held.
    pub fn from_rgba8(width: usize, height: usize, mut pixels: Vec<u8>) -> Self {
        let bytes_per_row = width * RGBA8_BYTES;
        pixels.resize(bytes_per_row * height, 0);
        Self {
            pixels: Arc::new(pixels),
            width,
            height,
            bytes_per_row,
        }
    }

    /// Decode an encoded image (PNG, JPEG, GIF, WebP) into RGBA8.
    pub fn decode(bytes: &[u8]) -> Result<Self, FetchError> {
        let img = image::load_from_memory(bytes).map_err(|e| FetchError::Decode(e.to_string()))?;
        let rgba = img.to_rgba8();
        let (w, h) = rgba.dimensions();
        Ok(Self::from_rgba8(w as usize, h as usize, rgba.into_raw()))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Estimated in-memory footprint, used as the cache eviction currency.
    ///
    /// This is the decoded raster size, not the encoded transport size.
    pub fn cost(&self) -> usize {
        self.bytes_per_row * self.height
    }
}

/// Image fetch errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Locator could not be parsed or has no supported scheme
    InvalidLocator(String),
    /// Transport failure (I/O, network)
    Transport(String),
    /// Bytes arrived but are not a decodable image
    Decode(String),
    /// Fetch was abandoned because nobody wanted the result anymore
    Cancelled,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::InvalidLocator(l) => write!(f, "Invalid image locator: {}", l),
            FetchError::Transport(e) => write!(f, "Transport error: {}", e),
            FetchError::Decode(e) => write!(f, "Decode error: {}", e),
            FetchError::Cancelled => write!(f, "Fetch cancelled"),
        }
    }
}

impl std::error::Error for FetchError {}
