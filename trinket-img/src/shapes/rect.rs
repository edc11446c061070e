use super::point::PointF32;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RectF32 {
    // centerpoint
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl RectF32 {
    pub fn from_tl(x: f32, y: f32, w: f32, h: f32) -> RectF32 {
        RectF32 {
            x: x + w / 2.,
            y: y + h / 2.,
            w,
            h,
        }
    }

    /// Horizontally centered on `anchor`, hanging down from it.
    pub fn hanging_from(anchor: PointF32, w: f32, h: f32) -> RectF32 {
        RectF32::from_tl(anchor.x - w / 2., anchor.y, w, h)
    }

    pub fn left(&self) -> f32 {
        self.x - self.w / 2.
    }
    pub fn right(&self) -> f32 {
        self.x + self.w / 2.
    }
    pub fn top(&self) -> f32 {
        self.y - self.h / 2.
    }
    pub fn bottom(&self) -> f32 {
        self.y + self.h / 2.
    }

    pub fn center(&self) -> PointF32 {
        PointF32 {
            x: self.x,
            y: self.y,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.w.round() < 1. || self.h.round() < 1.
    }
}

#[test]
fn test_hanging_from() {
    let r = RectF32::hanging_from(PointF32::new(250., 224.), 7., 7.);
    assert_eq!(r.left(), 246.5);
    assert_eq!(r.top(), 224.);
    assert_eq!(r.right(), 253.5);
    assert_eq!(r.bottom(), 231.);
    assert_eq!(r.center(), PointF32::new(250., 227.5));
}

#[test]
fn test_is_empty() {
    assert!(RectF32::from_tl(0., 0., 0.4, 10.).is_empty());
    assert!(!RectF32::from_tl(0., 0., 0.5, 10.).is_empty());
    assert!(RectF32::from_tl(5., 5., 3., 0.).is_empty());
}
