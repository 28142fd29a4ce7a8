//! Drawing API for [`Image`]s.
//!
//! All functions return a *guard object* that allows optional customization of the shape and
//! performs the draw operation when dropped. Drawing *overwrites* the target pixels, there is no
//! blending. Shapes are clipped to the image.

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{
        ascii::{FONT_10X20, FONT_6X10},
        MonoFont, MonoTextStyle,
    },
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{self, Text, TextStyleBuilder},
};

use super::{Color, Image};

/// Guard returned by [`marker`]; draws the marker when dropped and allows customization.
pub struct DrawMarker<'a> {
    image: &'a mut Image,
    x: i32,
    y: i32,
    color: Color,
    size: u32,
}

impl DrawMarker<'_> {
    /// Sets the marker's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the width and height of the marker.
    ///
    /// The default size is 5. The size must be *uneven* and *non-zero*. A size of 1 will result in
    /// a single pixel getting drawn.
    pub fn size(&mut self, size: u32) -> &mut Self {
        assert!(size != 0, "marker size must be greater than zero");
        assert!(size % 2 == 1, "marker size must be an uneven number");
        self.size = size;
        self
    }
}

impl Drop for DrawMarker<'_> {
    fn drop(&mut self) {
        // An `X` shape.
        let (x, y, color) = (self.x, self.y, self.color);
        let offset = ((self.size - 1) / 2) as i32;
        let pixels = (-offset..=offset)
            .zip(-offset..=offset)
            .chain((-offset..=offset).rev().zip(-offset..=offset))
            .map(|(xoff, yoff)| Pixel(Point::new(x + xoff, y + yoff), color));
        match Target(&mut *self.image).draw_iter(pixels) {
            Ok(()) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Guard returned by [`line`]; draws the line when dropped and allows customization.
pub struct DrawLine<'a> {
    image: &'a mut Image,
    start: Point,
    end: Point,
    color: Color,
    stroke_width: u32,
}

impl DrawLine<'_> {
    /// Sets the line's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the line's stroke width.
    ///
    /// By default, a stroke width of 1 is used.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawLine<'_> {
    fn drop(&mut self) {
        match Line::new(self.start, self.end)
            .into_styled(PrimitiveStyle::with_stroke(self.color, self.stroke_width))
            .draw(&mut Target(&mut *self.image))
        {
            Ok(()) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Guard returned by [`text`]; draws the text when dropped and allows customization.
pub struct DrawText<'a> {
    image: &'a mut Image,
    position: Point,
    text: &'a str,
    color: Color,
    font: &'static MonoFont<'static>,
    alignment: text::Alignment,
    baseline: text::Baseline,
}

impl DrawText<'_> {
    /// Sets the text color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Uses a small 6x10 font instead of the default 10x20 one.
    pub fn small(&mut self) -> &mut Self {
        self.font = &FONT_6X10;
        self
    }

    /// Aligns the bottom of the text with the `y` coordinate.
    pub fn align_bottom(&mut self) -> &mut Self {
        self.baseline = text::Baseline::Bottom;
        self
    }

    /// Aligns the left side of the text with the `x` coordinate.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = text::Alignment::Left;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        let character_style = MonoTextStyle::new(self.font, self.color);
        let text_style = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(self.baseline)
            .build();
        match Text::with_text_style(self.text, self.position, character_style, text_style)
            .draw(&mut Target(&mut *self.image))
        {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Draws a marker onto an image.
///
/// This can be used to visualize landmarks or points of interest.
pub fn marker(image: &mut Image, x: f32, y: f32) -> DrawMarker<'_> {
    DrawMarker {
        image,
        x: x.round() as i32,
        y: y.round() as i32,
        color: Color::RED,
        size: 5,
    }
}

/// Draws a line from `start` to `end` onto an image.
pub fn line(image: &mut Image, start: (f32, f32), end: (f32, f32)) -> DrawLine<'_> {
    DrawLine {
        image,
        start: to_point(start),
        end: to_point(end),
        color: Color::BLUE,
        stroke_width: 1,
    }
}

/// Draws a text string onto an image.
///
/// By default, the text is drawn in white, centered horizontally and vertically around `x` and
/// `y`.
pub fn text<'a>(image: &'a mut Image, x: f32, y: f32, text: &'a str) -> DrawText<'a> {
    DrawText {
        image,
        position: to_point((x, y)),
        text,
        color: Color::WHITE,
        font: &FONT_10X20,
        alignment: text::Alignment::Center,
        baseline: text::Baseline::Middle,
    }
}

fn to_point((x, y): (f32, f32)) -> Point {
    Point::new(x.round() as i32, y.round() as i32)
}

struct Target<'a>(&'a mut Image);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        Rectangle {
            top_left: Point { x: 0, y: 0 },
            size: Size {
                width: self.0.width(),
                height: self.0.height(),
            },
        }
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(pos, color) in pixels {
            if pos.x >= 0
                && (pos.x as u32) < self.0.width()
                && pos.y >= 0
                && (pos.y as u32) < self.0.height()
            {
                self.0.set(pos.x as u32, pos.y as u32, color);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_line() {
        let mut image = Image::new(8, 3);
        line(&mut image, (1.0, 1.0), (5.0, 1.0)).color(Color::GREEN);
        for x in 1..=5 {
            assert_eq!(image.get(x, 1), Color::GREEN);
        }
        assert_eq!(image.get(0, 1), Color::BLACK);
        assert_eq!(image.get(6, 1), Color::BLACK);
        assert_eq!(image.get(3, 0), Color::BLACK);
    }

    #[test]
    fn marker_is_clipped() {
        let mut image = Image::new(3, 3);
        marker(&mut image, 0.0, 0.0);
        assert_eq!(image.get(0, 0), Color::RED);
        assert_eq!(image.get(1, 1), Color::RED);
        assert_eq!(image.get(2, 2), Color::RED);
        assert_eq!(image.get(1, 0), Color::BLACK);
    }

    #[test]
    fn text_writes_pixels() {
        let mut image = Image::new(100, 30);
        text(&mut image, 50.0, 15.0, "Recognized: ok");
        assert!(image.data().chunks(4).any(|px| px == [255, 255, 255, 255]));
    }
}
