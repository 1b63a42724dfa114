/// Axis-aligned box stored as top-left corner plus size.
///
/// Conversions cover the three forms the tracker needs:
/// - TLWH: top-left x, top-left y, width, height (detections)
/// - TLBR: top-left x, top-left y, bottom-right x, bottom-right y (output)
/// - XYAH: center x, center y, aspect ratio (w/h), height (Kalman state)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    #[inline]
    pub fn from_xyah(cx: f32, cy: f32, aspect_ratio: f32, height: f32) -> Self {
        let width = aspect_ratio * height;
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    #[inline]
    pub fn to_tlwh(&self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }

    /// XYAH in `f64`, the Kalman filter's measurement space.
    #[inline]
    pub fn to_xyah(&self) -> [f64; 4] {
        let aspect_ratio = if self.height > 0.0 {
            self.width / self.height
        } else {
            0.0
        };
        [
            (self.x + self.width / 2.0) as f64,
            (self.y + self.height / 2.0) as f64,
            aspect_ratio as f64,
            self.height as f64,
        ]
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn iou(&self, other: &Rect) -> f32 {
        let [ax1, ay1, ax2, ay2] = self.to_tlbr();
        let [bx1, by1, bx2, by2] = other.to_tlbr();

        let inter_w = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
        let inter_h = (ay2.min(by2) - ay1.max(by1)).max(0.0);
        let inter = inter_w * inter_h;
        let union = self.area() + other.area() - inter;

        if union > 0.0 { inter / union } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_conversions() {
        let rect = Rect::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(rect.to_tlwh(), [10.0, 20.0, 30.0, 40.0]);
        assert_eq!(rect.to_tlbr(), [10.0, 20.0, 40.0, 60.0]);

        let xyah = rect.to_xyah();
        assert_eq!(xyah[0], 25.0);
        assert_eq!(xyah[1], 40.0);
        assert!((xyah[2] - 0.75).abs() < 1e-6);
        assert_eq!(xyah[3], 40.0);
    }

    #[test]
    fn test_xyah_inverse() {
        let rect = Rect::from_xyah(25.0, 40.0, 0.75, 40.0);
        assert!((rect.x - 10.0).abs() < 1e-6);
        assert!((rect.y - 20.0).abs() < 1e-6);
        assert!((rect.width - 30.0).abs() < 1e-6);
        assert_eq!(Rect::from_tlbr(10.0, 20.0, 40.0, 60.0), rect);
    }

    #[test]
    fn test_iou() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert!((a.iou(&b) - 25.0 / 175.0).abs() < 1e-6);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.iou(&Rect::new(20.0, 20.0, 10.0, 10.0)), 0.0);
    }

    #[test]
    fn test_degenerate_box() {
        let flat = Rect::new(0.0, 0.0, 10.0, 0.0);
        assert_eq!(flat.to_xyah()[2], 0.0);
        assert_eq!(flat.iou(&flat), 0.0);
    }
}
