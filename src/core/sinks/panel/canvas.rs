//! In-memory monochrome frame used as the `embedded-graphics` draw target.

use std::convert::Infallible;

use embedded_graphics::{pixelcolor::BinaryColor, prelude::*};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<bool>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![false; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clear(&mut self) {
        self.pixels.fill(false);
    }

    /// Whether the pixel is lit; out-of-range coordinates read as off.
    pub fn pixel(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.pixels[(y * self.width + x) as usize]
    }

    pub fn lit_count(&self) -> usize {
        self.pixels.iter().filter(|on| **on).count()
    }

    /// Rows of pixels, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.pixels.chunks(self.width.max(1) as usize)
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Canvas {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) else {
                continue;
            };
            if x < self.width && y < self.height {
                self.pixels[(y * self.width + x) as usize] = color.is_on();
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.pixels.fill(color.is_on());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use embedded_graphics::primitives::{Line, PrimitiveStyle};

    use super::*;

    #[test]
    fn test_draw_clips_to_bounds() {
        let mut canvas = Canvas::new(8, 4);
        let pixels = [
            Pixel(Point::new(0, 0), BinaryColor::On),
            Pixel(Point::new(7, 3), BinaryColor::On),
            Pixel(Point::new(-1, 2), BinaryColor::On),
            Pixel(Point::new(8, 0), BinaryColor::On),
        ];
        canvas.draw_iter(pixels).unwrap();

        assert_eq!(canvas.lit_count(), 2);
        assert!(canvas.pixel(0, 0));
        assert!(canvas.pixel(7, 3));
        assert!(!canvas.pixel(9, 9));
    }

    #[test]
    fn test_horizontal_line() {
        let mut canvas = Canvas::new(16, 4);
        Line::new(Point::new(0, 2), Point::new(15, 2))
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
            .draw(&mut canvas)
            .unwrap();

        assert_eq!(canvas.lit_count(), 16);
        assert!(canvas.rows().nth(2).unwrap().iter().all(|p| *p));
        canvas.clear();
        assert_eq!(canvas.lit_count(), 0);
    }
}
