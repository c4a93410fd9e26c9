/// Axis-aligned rectangle in pixel coordinates, origin top-left.
///
/// `x`/`y` are signed: detectors regularly report boxes that start a few
/// pixels outside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rectangle {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Real-valued center point.
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// True when the rectangle shares at least one pixel with `extent`.
    pub fn overlaps(&self, extent: ImageExtent) -> bool {
        self.right() > 0
            && self.bottom() > 0
            && (self.x as i64) < extent.width as i64
            && (self.y as i64) < extent.height as i64
    }
}

/// Pixel dimensions of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageExtent {
    pub height: u32,
    pub width: u32,
}

impl ImageExtent {
    pub fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }

    pub fn of(img: &image::DynamicImage) -> Self {
        Self::new(img.height(), img.width())
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }
}

/// Square crop region, always fully inside the extent it was computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropResult {
    pub x: u32,
    pub y: u32,
    pub side: u32,
}

impl CropResult {
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.side as f64 / 2.0,
            self.y as f64 + self.side as f64 / 2.0,
        )
    }

    pub fn fits(&self, extent: ImageExtent) -> bool {
        self.side > 0
            && self.x as u64 + self.side as u64 <= extent.width as u64
            && self.y as u64 + self.side as u64 <= extent.height as u64
    }

    pub fn to_rect(&self) -> Rectangle {
        Rectangle::new(self.x as i32, self.y as i32, self.side, self.side)
    }
}

impl From<CropResult> for Rectangle {
    fn from(crop: CropResult) -> Self {
        crop.to_rect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_is_real_valued() {
        let r = Rectangle::new(10, 20, 5, 7);
        assert_eq!(r.center(), (12.5, 23.5));
    }

    #[test]
    fn test_overlap() {
        let extent = ImageExtent::new(100, 200);
        assert!(Rectangle::new(-5, -5, 10, 10).overlaps(extent));
        assert!(Rectangle::new(199, 99, 10, 10).overlaps(extent));
        assert!(!Rectangle::new(200, 0, 10, 10).overlaps(extent));
        assert!(!Rectangle::new(-10, 0, 10, 10).overlaps(extent));
    }

    #[test]
    fn test_crop_fits() {
        let extent = ImageExtent::new(300, 400);
        assert!(CropResult { x: 100, y: 0, side: 300 }.fits(extent));
        assert!(!CropResult { x: 101, y: 0, side: 300 }.fits(extent));
        assert!(!CropResult { x: 0, y: 0, side: 0 }.fits(extent));
    }
}
