//! Geometric primitives shared by marker detection and field embedding.
//!
//! Field coordinates are stored with a top-left origin, measured in PDF points
//! (72 per inch). Native PDF drawing coordinates use a bottom-left origin; the
//! conversion between the two happens only at the drawing boundary, never in
//! storage.

use serde::{Deserialize, Serialize};

/// US Letter page width in points.
pub const US_LETTER_WIDTH: f64 = 612.0;

/// US Letter page height in points.
pub const US_LETTER_HEIGHT: f64 = 792.0;

/// Page dimensions in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    /// Page width
    pub width: f64,
    /// Page height
    pub height: f64,
}

impl PageSize {
    /// Create a new page size.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// US Letter (612×792pt), the fallback when page geometry is unavailable.
    pub fn us_letter() -> Self {
        Self {
            width: US_LETTER_WIDTH,
            height: US_LETTER_HEIGHT,
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::us_letter()
    }
}

/// A field rectangle with a top-left origin, in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldRect {
    /// X coordinate of the top-left corner
    pub x: f64,
    /// Y coordinate of the top-left corner, measured down from the page top
    pub y: f64,
    /// Width in points
    pub width: f64,
    /// Height in points
    pub height: f64,
}

impl FieldRect {
    /// Create a new field rectangle from top-left position and dimensions.
    ///
    /// # Examples
    ///
    /// ```
    /// use esign_engine::geometry::FieldRect;
    ///
    /// let rect = FieldRect::new(50.0, 700.0, 200.0, 50.0);
    /// assert_eq!(rect.width, 200.0);
    /// ```
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Convert the stored top-left y into the bottom-left-origin y used for
    /// PDF drawing: `pdf_y = page_height − y − height`.
    ///
    /// # Examples
    ///
    /// ```
    /// use esign_engine::geometry::FieldRect;
    ///
    /// let rect = FieldRect::new(50.0, 700.0, 200.0, 50.0);
    /// assert_eq!(rect.pdf_y(792.0), 42.0);
    /// ```
    pub fn pdf_y(&self, page_height: f64) -> f64 {
        page_height - self.y - self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_default_is_us_letter() {
        let size = PageSize::default();
        assert_eq!(size.width, 612.0);
        assert_eq!(size.height, 792.0);
    }

    #[test]
    fn test_pdf_y_conversion() {
        // Known property: (page=612×792, x=50, y=700, w=200, h=50) lands its
        // bottom-left corner at (50, 42) in native PDF coordinates.
        let rect = FieldRect::new(50.0, 700.0, 200.0, 50.0);
        assert_eq!(rect.pdf_y(792.0), 42.0);
    }

    #[test]
    fn test_pdf_y_at_page_top() {
        let rect = FieldRect::new(0.0, 0.0, 100.0, 20.0);
        assert_eq!(rect.pdf_y(792.0), 772.0);
    }
}
