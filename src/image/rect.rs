use nalgebra::{Rotation2, Vector2};

/// An axis-aligned rectangle with float coordinates.
///
/// Coordinates are in pixels, with X pointing right and Y pointing down. A rectangle may have
/// zero width or height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    xc: f32,
    yc: f32,
    w: f32,
    h: f32,
}

impl Rect {
    /// Creates a rectangle centered at `(x_center, y_center)`.
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            xc: x_center,
            yc: y_center,
            w: width,
            h: height,
        }
    }

    /// Creates a rectangle from its top-left corner and size.
    pub fn from_top_left(top_left_x: f32, top_left_y: f32, width: f32, height: f32) -> Self {
        Self::from_center(
            top_left_x + width * 0.5,
            top_left_y + height * 0.5,
            width,
            height,
        )
    }

    /// Computes the smallest axis-aligned rectangle containing all `points`.
    ///
    /// Returns [`None`] if `points` is empty.
    pub fn bounding<I: IntoIterator<Item = (f32, f32)>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let (x, y) = iter.next()?;
        let (mut x_min, mut x_max, mut y_min, mut y_max) = (x, x, y, y);
        for (x, y) in iter {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }

        Some(Self::from_top_left(x_min, y_min, x_max - x_min, y_max - y_min))
    }

    /// Uniformly scales the size of `self` by `scale`, keeping its center.
    #[must_use]
    pub fn scale(&self, scale: f32) -> Self {
        Self {
            w: self.w * scale,
            h: self.h * scale,
            ..*self
        }
    }

    /// Grows the shorter side of `self` to match the longer one, keeping the center.
    #[must_use]
    pub fn square(&self) -> Self {
        let side = self.w.max(self.h);
        Self {
            w: side,
            h: side,
            ..*self
        }
    }

    /// Moves `self` by an offset.
    #[must_use]
    pub fn move_by(&self, x: f32, y: f32) -> Self {
        Self {
            xc: self.xc + x,
            yc: self.yc + y,
            ..*self
        }
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.xc, self.yc)
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.w
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.h
    }

    pub fn top_left(&self) -> (f32, f32) {
        (self.xc - self.w * 0.5, self.yc - self.h * 0.5)
    }

    pub fn bottom_right(&self) -> (f32, f32) {
        (self.xc + self.w * 0.5, self.yc + self.h * 0.5)
    }

    /// Returns the amount of area covered by `self`.
    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    /// Computes the overlapping area of `self` and `other`.
    ///
    /// Returns [`None`] if they don't overlap.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let (l1, t1) = self.top_left();
        let (l2, t2) = other.top_left();
        let (r1, b1) = self.bottom_right();
        let (r2, b2) = other.bottom_right();

        let (left, top) = (l1.max(l2), t1.max(t2));
        let (right, bottom) = (r1.min(r2), b1.min(b2));
        if right < left || bottom < top {
            return None;
        }

        Some(Self::from_top_left(left, top, right - left, bottom - top))
    }

    fn intersection_area(&self, other: &Self) -> f32 {
        self.intersection(other).map_or(0.0, |r| r.area())
    }

    fn union_area(&self, other: &Self) -> f32 {
        self.area() + other.area() - self.intersection_area(other)
    }

    /// Computes the Intersection over Union (IOU) of `self` and `other`.
    ///
    /// Two rectangles without any area have an IOU of 0.
    pub fn iou(&self, other: &Self) -> f32 {
        let union = self.union_area(other);
        if union <= 0.0 {
            return 0.0;
        }
        self.intersection_area(other) / union
    }
}

/// A [`Rect`], rotated around its center.
///
/// Rotation is clockwise on screen (since Y points down), in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    rect: Rect,
    radians: f32,
}

impl RotatedRect {
    pub fn new(rect: Rect, radians: f32) -> Self {
        Self { rect, radians }
    }

    /// Computes the smallest rectangle rotated by `radians` that contains all `points`.
    ///
    /// Returns [`None`] if `points` is empty.
    pub fn bounding<I: IntoIterator<Item = (f32, f32)>>(radians: f32, points: I) -> Option<Self> {
        // Compute the bounding box in a coordinate system that is rotated along with the rect, then
        // rotate its center back.
        let inv = Rotation2::new(-radians);
        let rect = Rect::bounding(points.into_iter().map(|(x, y)| {
            let p = inv * Vector2::new(x, y);
            (p.x, p.y)
        }))?;

        let (xc, yc) = rect.center();
        let center = Rotation2::new(radians) * Vector2::new(xc, yc);
        Some(Self {
            rect: Rect::from_center(center.x, center.y, rect.width(), rect.height()),
            radians,
        })
    }

    #[inline]
    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    #[inline]
    pub fn radians(&self) -> f32 {
        self.radians
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        self.rect.center()
    }

    /// Maps `f` over the unrotated rectangle, keeping the rotation.
    #[must_use]
    pub fn map(&self, f: impl FnOnce(Rect) -> Rect) -> Self {
        Self {
            rect: f(self.rect),
            radians: self.radians,
        }
    }

    /// Transforms a point from the rectangle's local coordinate system (where `(0, 0)` is the
    /// rotated top-left corner) to the outer image coordinates.
    pub fn transform_out(&self, x: f32, y: f32) -> (f32, f32) {
        let (xc, yc) = self.rect.center();
        let local = Vector2::new(x - self.rect.width() * 0.5, y - self.rect.height() * 0.5);
        let p = Rotation2::new(self.radians) * local;
        (p.x + xc, p.y + yc)
    }

    /// Transforms a point from outer image coordinates to the rectangle's local coordinate system.
    ///
    /// This is the inverse of [`RotatedRect::transform_out`].
    pub fn transform_in(&self, x: f32, y: f32) -> (f32, f32) {
        let (xc, yc) = self.rect.center();
        let p = Rotation2::new(-self.radians) * Vector2::new(x - xc, y - yc);
        (
            p.x + self.rect.width() * 0.5,
            p.y + self.rect.height() * 0.5,
        )
    }

    /// Returns the rotated corners, clockwise on screen starting at the local top-left.
    pub fn rotated_corners(&self) -> [(f32, f32); 4] {
        let (w, h) = (self.rect.width(), self.rect.height());
        [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)].map(|(x, y)| self.transform_out(x, y))
    }

    /// Returns the axis-aligned bounding rectangle of the rotated corners.
    pub fn bounding_rect(&self) -> Rect {
        Rect::bounding(self.rotated_corners()).unwrap_or(self.rect)
    }
}

impl From<Rect> for RotatedRect {
    fn from(rect: Rect) -> Self {
        Self::new(rect, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn zero_area() {
        let zero = Rect::from_center(0.0, 0.0, 0.0, 0.0);
        let also_zero = Rect::from_center(1.0, 0.0, 0.0, 0.0);
        assert_eq!(zero.area(), 0.0);
        assert_eq!(zero.intersection(&also_zero), None);
        assert_eq!(zero.iou(&also_zero), 0.0);
    }

    #[test]
    fn intersection() {
        let a = Rect::from_center(1.0, 0.0, 1.0, 1.0);
        let b = Rect::from_center(2.5, 0.0, 1.0, 1.0);
        assert_eq!(a.intersection(&b), None);

        let c = Rect::from_center(1.5, 0.0, 1.0, 1.0);
        let ac = a.intersection(&c).unwrap();
        assert_eq!(ac.center(), (1.25, 0.0));
        assert_eq!(ac.width(), 0.5);
        assert_eq!(ac.height(), 1.0);
    }

    #[test]
    fn iou_of_nested_rects() {
        let smaller = Rect::from_center(9.0, 9.0, 1.0, 1.0);
        let bigger = Rect::from_center(9.0, 9.0, 2.0, 2.0);
        assert_eq!(smaller.iou(&bigger), 1.0 / 4.0);
        assert_eq!(bigger.iou(&smaller), 1.0 / 4.0);
        assert_eq!(bigger.iou(&bigger), 1.0);
    }

    #[test]
    fn bounding() {
        assert_eq!(Rect::bounding(Vec::<(f32, f32)>::new()), None);
        let rect = Rect::bounding([(1.0, 5.0), (3.0, 2.0), (2.0, 4.0)]).unwrap();
        assert_eq!(rect.top_left(), (1.0, 2.0));
        assert_eq!(rect.bottom_right(), (3.0, 5.0));
    }

    #[test]
    fn square_keeps_center() {
        let rect = Rect::from_center(10.0, 20.0, 4.0, 8.0).square();
        assert_eq!(rect.center(), (10.0, 20.0));
        assert_eq!((rect.width(), rect.height()), (8.0, 8.0));
    }

    #[test]
    fn rotated_transform() {
        // A 4x2 rect centered at the origin, rotated by 90 degrees clockwise (on screen).
        let rect = RotatedRect::new(Rect::from_center(0.0, 0.0, 4.0, 2.0), FRAC_PI_2);

        let (x, y) = rect.transform_out(0.0, 0.0);
        assert_abs_diff_eq!(x, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(y, -2.0, epsilon = 1e-5);

        let (x, y) = rect.transform_in(1.0, -2.0);
        assert_abs_diff_eq!(x, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(y, 0.0, epsilon = 1e-5);

        let bounds = rect.bounding_rect();
        assert_abs_diff_eq!(bounds.width(), 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(bounds.height(), 4.0, epsilon = 1e-5);
    }

    #[test]
    fn rotated_bounding() {
        let points = [(0.0, 0.0), (2.0, 2.0), (0.0, 4.0), (-2.0, 2.0)];
        let rect = RotatedRect::bounding(FRAC_PI_2 / 2.0, points).unwrap();
        let (xc, yc) = rect.center();
        assert_abs_diff_eq!(xc, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(yc, 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(rect.rect().width(), 8.0f32.sqrt(), epsilon = 1e-5);
        assert_abs_diff_eq!(rect.rect().height(), 8.0f32.sqrt(), epsilon = 1e-5);
    }
}
