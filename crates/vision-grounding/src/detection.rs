use image::{DynamicImage, GrayImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::edges::canny;

use crate::models::{
    BoundingBox, Candidate, ElementType, MAX_CONTOUR_BOXES, MIN_CONFIDENCE, MIN_CONTOUR_HEIGHT,
    MIN_CONTOUR_WIDTH,
};

/// Seam for a pretrained interactive-element detector. No bundled model
/// ships with this crate; callers that have one (ONNX, TF-Lite, a remote
/// inference endpoint) implement this trait and pass it to
/// [`crate::som::SetOfMarks::with_detector`]. Without one, marking falls
/// back to [`ContourDetector`].
pub trait ElementDetector: Send + Sync {
    fn detect(&self, image: &DynamicImage) -> Vec<Candidate>;
}

/// Filters a detector's raw output down to the recognized class set at
/// the confidence floor. Detector implementations can call this from
/// their own `detect` to get the filtering spec-mandated for free.
pub fn filter_detections(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.retain(|c| c.confidence >= MIN_CONFIDENCE && c.element_type != ElementType::Unknown);
    candidates
}

/// Edge-detect + external-contour fallback used when no pretrained
/// detector is configured or it returns nothing.
pub struct ContourDetector {
    low_threshold: f32,
    high_threshold: f32,
}

impl Default for ContourDetector {
    fn default() -> Self {
        Self {
            low_threshold: 20.0,
            high_threshold: 60.0,
        }
    }
}

impl ContourDetector {
    pub fn new(low_threshold: f32, high_threshold: f32) -> Self {
        Self {
            low_threshold,
            high_threshold,
        }
    }

    pub fn detect(&self, image: &DynamicImage) -> Vec<Candidate> {
        let gray: GrayImage = image.to_luma8();
        let edges = canny(&gray, self.low_threshold, self.high_threshold);
        let contours = find_contours::<i32>(&edges);

        let mut boxes: Vec<BoundingBox> = contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer)
            .filter_map(|c| bounding_box_of(&c.points))
            .filter(|b| b.width >= MIN_CONTOUR_WIDTH && b.height >= MIN_CONTOUR_HEIGHT)
            .collect();

        // Largest-area-first keeps the most visually significant
        // regions when more than the cap is found.
        boxes.sort_by(|a, b| b.area().cmp(&a.area()));
        boxes.truncate(MAX_CONTOUR_BOXES);

        boxes
            .into_iter()
            .map(|bounds| Candidate {
                element_type: ElementType::Unknown,
                bounds,
                confidence: 1.0,
                text: None,
            })
            .collect()
    }
}

fn bounding_box_of(points: &[imageproc::point::Point<i32>]) -> Option<BoundingBox> {
    if points.is_empty() {
        return None;
    }
    let min_x = points.iter().map(|p| p.x).min()?;
    let max_x = points.iter().map(|p| p.x).max()?;
    let min_y = points.iter().map(|p| p.y).min()?;
    let max_y = points.iter().map(|p| p.y).max()?;
    Some(BoundingBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x,
        height: max_y - min_y,
    })
}

/// Convenience no-op detector standing in for "no pretrained model
/// configured"; always falls through to contour extraction.
pub struct NullDetector;

impl ElementDetector for NullDetector {
    fn detect(&self, _image: &DynamicImage) -> Vec<Candidate> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn blank_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(ImageBuffer::from_pixel(w, h, Rgba([255, 255, 255, 255])))
    }

    #[test]
    fn contour_detector_finds_nothing_on_blank_image() {
        let detector = ContourDetector::default();
        let candidates = detector.detect(&blank_image(64, 64));
        assert!(candidates.is_empty());
    }

    #[test]
    fn filter_detections_drops_low_confidence_and_unknown() {
        let input = vec![
            Candidate {
                element_type: ElementType::Button,
                bounds: BoundingBox { x: 0, y: 0, width: 10, height: 10 },
                confidence: 0.9,
                text: None,
            },
            Candidate {
                element_type: ElementType::Button,
                bounds: BoundingBox { x: 0, y: 0, width: 10, height: 10 },
                confidence: 0.1,
                text: None,
            },
            Candidate {
                element_type: ElementType::Unknown,
                bounds: BoundingBox { x: 0, y: 0, width: 10, height: 10 },
                confidence: 0.99,
                text: None,
            },
        ];
        let filtered = filter_detections(input);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].element_type, ElementType::Button);
    }
}
