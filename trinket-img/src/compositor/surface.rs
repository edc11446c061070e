use crate::shapes::rect::RectF32;
use image::imageops::{FilterType, overlay, resize};
use image::{Rgba, RgbaImage};

/// Anything the compositor can draw onto: the live overlay, or a copy of a
/// video frame for a snapshot.
pub trait Surface {
    fn dimensions(&self) -> (u32, u32);
    fn clear(&mut self);
    /// Draws `img` stretched to `dest`, alpha blended over what is there.
    fn draw_image(&mut self, img: &RgbaImage, dest: RectF32);
}

impl Surface for RgbaImage {
    fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    fn clear(&mut self) {
        for p in self.pixels_mut() {
            *p = Rgba([0, 0, 0, 0]);
        }
    }

    fn draw_image(&mut self, img: &RgbaImage, dest: RectF32) {
        if dest.is_empty() {
            return;
        }

        let w = dest.w.round() as u32;
        let h = dest.h.round() as u32;
        let resized;
        let src = if img.dimensions() == (w, h) {
            img
        } else {
            resized = resize(img, w, h, FilterType::Triangle);
            &resized
        };

        overlay(
            self,
            src,
            dest.left().round() as i64,
            dest.top().round() as i64,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_scaled_and_clipped() {
        let mut surface = RgbaImage::new(20, 20);
        let red = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));

        surface.draw_image(&red, RectF32::from_tl(-2., 15., 5., 5.));
        assert_eq!(surface.get_pixel(0, 15), &Rgba([255, 0, 0, 255]));
        assert_eq!(surface.get_pixel(2, 19), &Rgba([255, 0, 0, 255]));
        assert_eq!(surface.get_pixel(3, 15), &Rgba([0, 0, 0, 0]));
        assert_eq!(surface.get_pixel(0, 14), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn clear_makes_transparent() {
        let mut surface = RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255]));
        surface.clear();
        assert!(surface.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn skips_empty_destination() {
        let mut surface = RgbaImage::new(4, 4);
        let red = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        surface.draw_image(&red, RectF32::from_tl(1., 1., 0.2, 0.2));
        assert!(surface.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }
}
