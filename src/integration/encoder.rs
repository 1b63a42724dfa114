//! Appearance encoder trait and the binding of embeddings to detections.

use image::RgbImage;
use image::imageops::{self, FilterType};
use ndarray::Array1;

use crate::error::{Error, Result};
use crate::integration::FilteredDetection;
use crate::tracker::Detection;
use crate::video::Frame;

/// Re-identification patch width in pixels.
pub const PATCH_WIDTH: u32 = 64;
/// Re-identification patch height in pixels.
pub const PATCH_HEIGHT: u32 = 128;

/// Maps (frame, boxes) to appearance embeddings, one per box, same order.
pub trait FeatureEncoder {
    fn encode(&mut self, frame: &Frame, boxes: &[FilteredDetection]) -> Result<Vec<Array1<f32>>>;
}

impl<E: FeatureEncoder + ?Sized> FeatureEncoder for Box<E> {
    fn encode(&mut self, frame: &Frame, boxes: &[FilteredDetection]) -> Result<Vec<Array1<f32>>> {
        (**self).encode(frame, boxes)
    }
}

/// Cut the region around `tlwh` out of `frame` and resize it to
/// `patch_width`x`patch_height`.
///
/// The box is first widened (or narrowed) around its centre to the patch
/// aspect ratio, then clipped to the image. Returns `None` when nothing of
/// the box remains inside the frame.
pub fn extract_patch(
    frame: &Frame,
    tlwh: [f32; 4],
    patch_width: u32,
    patch_height: u32,
) -> Option<RgbImage> {
    let [mut x, y, mut w, h] = tlwh;
    let aspect = patch_width as f32 / patch_height as f32;
    let new_width = aspect * h;
    x -= (new_width - w) / 2.0;
    w = new_width;

    let (fw, fh) = frame.dimensions();
    if fw == 0 || fh == 0 {
        return None;
    }
    let sx = (x as i64).max(0);
    let sy = (y as i64).max(0);
    let ex = ((x + w) as i64).min(fw as i64 - 1);
    let ey = ((y + h) as i64).min(fh as i64 - 1);
    if sx >= ex || sy >= ey {
        return None;
    }

    let crop = imageops::crop_imm(
        frame,
        sx as u32,
        sy as u32,
        (ex - sx) as u32,
        (ey - sy) as u32,
    )
    .to_image();
    Some(imageops::resize(
        &crop,
        patch_width,
        patch_height,
        FilterType::Triangle,
    ))
}

/// Pairs filtered detections with their embeddings.
pub struct FeatureBinder;

impl FeatureBinder {
    /// Encode `detections` and zip the embeddings positionally.
    ///
    /// The encoder is not called for an empty detection list. An encoder that
    /// returns a different number of embeddings than it was given boxes is a
    /// fatal [`Error::EmbeddingMismatch`].
    pub fn bind<E: FeatureEncoder + ?Sized>(
        encoder: &mut E,
        frame: &Frame,
        detections: &[FilteredDetection],
    ) -> Result<Vec<Detection>> {
        if detections.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = encoder.encode(frame, detections)?;
        if embeddings.len() != detections.len() {
            return Err(Error::EmbeddingMismatch {
                detections: detections.len(),
                embeddings: embeddings.len(),
            });
        }

        Ok(detections
            .iter()
            .zip(embeddings)
            .map(|(det, feature)| {
                Detection::new(det.tlwh(), det.score, det.class_name.clone(), feature)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    struct CountingEncoder {
        calls: usize,
        extra: usize,
    }

    impl FeatureEncoder for CountingEncoder {
        fn encode(
            &mut self,
            _frame: &Frame,
            boxes: &[FilteredDetection],
        ) -> Result<Vec<Array1<f32>>> {
            self.calls += 1;
            Ok((0..boxes.len() + self.extra)
                .map(|i| Array1::from_elem(4, i as f32))
                .collect())
        }
    }

    fn det(x: u32, class_name: &str) -> FilteredDetection {
        FilteredDetection {
            x,
            y: 5,
            width: 10,
            height: 20,
            score: 0.8,
            class_name: class_name.into(),
        }
    }

    #[test]
    fn test_bind_zips_in_order() {
        let frame = RgbImage::new(100, 100);
        let mut encoder = CountingEncoder { calls: 0, extra: 0 };
        let dets = vec![det(0, "car"), det(40, "person")];
        let bound = FeatureBinder::bind(&mut encoder, &frame, &dets).unwrap();

        assert_eq!(bound.len(), dets.len());
        assert_eq!(bound[1].class_name, "person");
        assert_eq!(bound[1].tlwh.x, 40.0);
        assert_eq!(bound[1].feature[0], 1.0);
    }

    #[test]
    fn test_bind_mismatch_is_fatal() {
        let frame = RgbImage::new(100, 100);
        let mut encoder = CountingEncoder { calls: 0, extra: 1 };
        let err = FeatureBinder::bind(&mut encoder, &frame, &[det(0, "car")]).unwrap_err();
        assert!(matches!(
            err,
            Error::EmbeddingMismatch {
                detections: 1,
                embeddings: 2
            }
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_bind_skips_encoder_without_detections() {
        let frame = RgbImage::new(10, 10);
        let mut encoder = CountingEncoder { calls: 0, extra: 3 };
        assert!(FeatureBinder::bind(&mut encoder, &frame, &[]).unwrap().is_empty());
        assert_eq!(encoder.calls, 0);
    }

    #[test]
    fn test_extract_patch_widens_to_aspect() {
        let mut frame = RgbImage::from_pixel(200, 200, Rgb([0, 0, 0]));
        for y in 50..150 {
            for x in 90..110 {
                frame.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        // 20x100 box widened to 50x100 around its centre.
        let patch = extract_patch(&frame, [90.0, 50.0, 20.0, 100.0], PATCH_WIDTH, PATCH_HEIGHT)
            .unwrap();
        assert_eq!(patch.dimensions(), (PATCH_WIDTH, PATCH_HEIGHT));
        assert_eq!(patch.get_pixel(32, 64)[0], 255);
        assert_eq!(patch.get_pixel(1, 64)[0], 0);
    }

    #[test]
    fn test_extract_patch_outside_frame() {
        let frame = RgbImage::new(50, 50);
        assert!(extract_patch(&frame, [100.0, 100.0, 10.0, 20.0], 64, 128).is_none());
        assert!(extract_patch(&frame, [10.0, 10.0, 0.0, 0.0], 64, 128).is_none());
    }
}
