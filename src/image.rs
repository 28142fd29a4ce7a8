//! Image manipulation.
//!
//! This module provides:
//!
//! - The [`Image`] type, an owned RGBA image.
//! - [`Resolution`], the size of an image or camera frame.
//! - [`Rect`] and [`RotatedRect`], float-valued rectangles describing parts of an image.
//! - The [`draw`] module, a few freestanding functions to quickly visualize objects.

pub mod draw;
mod jpeg;
mod rect;
mod resolution;

use std::{fmt, ops::Index};

use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};
use image::{Rgba, RgbaImage};

use crate::config::JpegBackend;

pub use rect::*;
pub use resolution::*;

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone)]
pub struct Image {
    // Kept in a layout that can be uploaded to a `Rgba8UnormSrgb` texture as-is.
    pub(crate) buf: RgbaImage,
}

impl Image {
    /// Creates an opaque black image of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: RgbaImage::from_pixel(width, height, Rgba(Color::BLACK.0)),
        }
    }

    /// Creates an image filled with `color`.
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        Self {
            buf: RgbaImage::from_pixel(width, height, Rgba(color.0)),
        }
    }

    /// Decodes a JFIF JPEG or Motion JPEG frame using the selected decoder.
    pub fn decode_jpeg(data: &[u8], backend: JpegBackend) -> anyhow::Result<Self> {
        jpeg::decode(data, backend)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns the color of the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside the image.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf.get_pixel(x, y).0)
    }

    /// Sets the pixel at `(x, y)` to `color`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside the image.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.buf.put_pixel(x, y, Rgba(color.0));
    }

    /// Overwrites every pixel with `color`.
    pub fn clear(&mut self, color: Color) {
        for pixel in self.buf.pixels_mut() {
            pixel.0 = color.0;
        }
    }

    /// Returns the raw RGBA8 pixel data, row by row.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.buf.as_raw()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image({})", self.resolution())
    }
}

/// An 8-bit sRGB color with alpha channel.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const RED: Self = Self([255, 0, 0, 255]);
    pub const GREEN: Self = Self([0, 255, 0, 255]);
    pub const BLUE: Self = Self([0, 0, 255, 255]);
    pub const YELLOW: Self = Self([255, 255, 0, 255]);

    /// Creates an opaque color from its red, green and blue components.
    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.0[3]
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r(),
            self.g(),
            self.b(),
            self.a(),
        )
    }
}

impl Index<usize> for Color {
    type Output = u8;

    #[inline]
    fn index(&self, index: usize) -> &u8 {
        &self.0[index]
    }
}

impl PixelColor for Color {
    type Raw = RawU32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_image_is_black() {
        let image = Image::new(4, 3);
        assert_eq!(image.resolution(), Resolution::new(4, 3));
        assert_eq!(image.get(3, 2), Color::BLACK);
        assert_eq!(image.data().len(), 4 * 3 * 4);
    }

    #[test]
    fn set_and_clear() {
        let mut image = Image::new(2, 2);
        image.set(1, 0, Color::RED);
        assert_eq!(image.get(1, 0), Color::RED);
        assert_eq!(image.get(0, 0), Color::BLACK);
        assert_eq!(&image.data()[4..8], &[255, 0, 0, 255]);

        image.clear(Color::WHITE);
        assert_eq!(image.get(1, 0), Color::WHITE);
    }

    #[test]
    fn color_debug() {
        assert_eq!(format!("{:?}", Color::from_rgb8(1, 2, 255)), "#0102ffff");
    }
}
