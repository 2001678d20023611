//! Stroke primitives on top of `imageproc`.
//!
//! Paint replaces the pixels it covers; translucent colors are not blended.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Unpack a 32-bit ARGB color.
pub fn from_argb(argb: u32) -> Rgba<u8> {
    let [a, r, g, b] = argb.to_be_bytes();
    Rgba([r, g, b, a])
}

/// Filled disc of the given radius, at least one pixel.
pub fn fill_disc(img: &mut RgbaImage, x: f32, y: f32, radius: f32, color: Rgba<u8>) {
    if !x.is_finite() || !y.is_finite() {
        return;
    }
    let r = radius.round().max(1.0) as i32;
    draw_filled_circle_mut(img, (x.round() as i32, y.round() as i32), r, color);
}

/// Connected polyline with rounded joins and ends.
pub fn stroke_polyline(img: &mut RgbaImage, points: &[(f32, f32)], width: f32, color: Rgba<u8>) {
    if width < 2.0 {
        for pair in points.windows(2) {
            draw_line_segment_mut(img, pair[0], pair[1], color);
        }
        return;
    }
    let radius = width / 2.0;
    for pair in points.windows(2) {
        fill_segment(img, pair[0], pair[1], radius, color);
    }
    for &(x, y) in points {
        fill_disc(img, x, y, radius, color);
    }
}

/// The rectangle around segment `a`-`b`, `radius` to either side.
fn fill_segment(img: &mut RgbaImage, a: (f32, f32), b: (f32, f32), radius: f32, color: Rgba<u8>) {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len = (dx * dx + dy * dy).sqrt();
    if !len.is_finite() || len < f32::EPSILON {
        return;
    }
    let (nx, ny) = (-dy / len * radius, dx / len * radius);
    let corner = |x: f32, y: f32| Point::new(x.round() as i32, y.round() as i32);
    let mut poly = vec![
        corner(a.0 + nx, a.1 + ny),
        corner(b.0 + nx, b.1 + ny),
        corner(b.0 - nx, b.1 - ny),
        corner(a.0 - nx, a.1 - ny),
    ];
    poly.dedup();
    // Degenerate after rounding; the end discs cover it.
    if poly.len() < 3 || poly.first() == poly.last() {
        return;
    }
    draw_polygon_mut(img, &poly, color);
}

/// Axis-aligned square cell of `size` pixels at (`x`, `y`).
pub fn fill_cell(img: &mut RgbaImage, x: i32, y: i32, size: u32, color: Rgba<u8>) {
    if size == 0 {
        return;
    }
    draw_filled_rect_mut(img, Rect::at(x, y).of_size(size, size), color);
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn blank(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, WHITE)
    }

    #[test]
    fn test_from_argb() {
        assert_eq!(from_argb(0xFF0E_72ED), Rgba([0x0E, 0x72, 0xED, 0xFF]));
        assert_eq!(from_argb(0x8011_2233), Rgba([0x11, 0x22, 0x33, 0x80]));
    }

    #[test]
    fn test_horizontal_line_coverage() {
        let mut img = blank(20, 10);
        stroke_polyline(&mut img, &[(2.0, 5.0), (17.0, 5.0)], 4.0, RED);
        assert_eq!(*img.get_pixel(10, 5), RED);
        assert_eq!(*img.get_pixel(10, 4), RED);
        assert_eq!(*img.get_pixel(10, 0), WHITE);
        assert_eq!(*img.get_pixel(10, 9), WHITE);
    }

    #[test]
    fn test_diagonal_line_and_joint() {
        let mut img = blank(40, 40);
        stroke_polyline(&mut img, &[(5.0, 5.0), (20.0, 20.0), (35.0, 5.0)], 6.0, RED);
        assert_eq!(*img.get_pixel(12, 12), RED);
        assert_eq!(*img.get_pixel(20, 20), RED);
        assert_eq!(*img.get_pixel(28, 12), RED);
        assert_eq!(*img.get_pixel(20, 5), WHITE);
    }

    #[test]
    fn test_thin_line() {
        let mut img = blank(10, 10);
        stroke_polyline(&mut img, &[(0.0, 3.0), (9.0, 3.0)], 1.0, RED);
        assert_eq!(*img.get_pixel(5, 3), RED);
        assert_eq!(*img.get_pixel(5, 5), WHITE);
    }

    #[test]
    fn test_disc() {
        let mut img = blank(20, 20);
        fill_disc(&mut img, 10.0, 10.0, 3.0, RED);
        assert_eq!(*img.get_pixel(10, 10), RED);
        assert_eq!(*img.get_pixel(10, 15), WHITE);
        assert_eq!(*img.get_pixel(0, 0), WHITE);
    }

    #[test]
    fn test_offscreen_and_degenerate_input_is_clipped() {
        let mut img = blank(10, 10);
        stroke_polyline(&mut img, &[(-50.0, -50.0), (-40.0, -40.0)], 3.0, RED);
        stroke_polyline(&mut img, &[(4.0, 4.0), (4.0, 4.0)], 3.0, WHITE);
        fill_disc(&mut img, f32::NAN, 1.0, 3.0, RED);
        fill_cell(&mut img, 100, 100, 5, RED);
        fill_cell(&mut img, 0, 0, 0, RED);
        assert!(img.pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn test_fill_cell() {
        let mut img = blank(10, 10);
        fill_cell(&mut img, 2, 2, 2, RED);
        assert_eq!(*img.get_pixel(2, 2), RED);
        assert_eq!(*img.get_pixel(3, 3), RED);
        assert_eq!(*img.get_pixel(4, 4), WHITE);
    }
}
