//! Set-of-Marks: the main marking pipeline. Decodes a screenshot, runs
//! detection, assigns mark ids, draws the overlay, and keeps the latest
//! marks per session around for `click_by_mark` resolution.
use std::sync::Arc;

use base64::Engine;
use dashmap::DashMap;
use engine_core_types::SessionId;
use image::ImageOutputFormat;

use crate::detection::{filter_detections, ContourDetector, ElementDetector};
use crate::error::VisionError;
use crate::models::{BoundingBox, Candidate, MarkedElement, MarkedImage};
use crate::overlay::draw_marks;

pub struct SetOfMarks {
    detector: Option<Arc<dyn ElementDetector>>,
    contour: ContourDetector,
    marks: DashMap<SessionId, Vec<MarkedElement>>,
    show_boxes: bool,
    show_labels: bool,
}

impl Default for SetOfMarks {
    fn default() -> Self {
        Self {
            detector: None,
            contour: ContourDetector::default(),
            marks: DashMap::new(),
            show_boxes: true,
            show_labels: true,
        }
    }
}

impl SetOfMarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detector(detector: Arc<dyn ElementDetector>) -> Self {
        Self {
            detector: Some(detector),
            ..Self::default()
        }
    }

    /// Runs the full marking pipeline over a raw screenshot (PNG or
    /// JPEG bytes) and replaces the session's recorded marks. Marks
    /// from a prior screenshot are discarded: they are only valid
    /// until the next one.
    pub fn mark(&self, session_id: &SessionId, screenshot_bytes: &[u8]) -> Result<MarkedImage, VisionError> {
        let image = image::load_from_memory(screenshot_bytes)
            .map_err(|e| VisionError::decode(e.to_string()))?;

        let mut candidates = self
            .detector
            .as_ref()
            .map(|d| filter_detections(d.detect(&image)))
            .unwrap_or_default();

        if candidates.is_empty() {
            candidates = self.contour.detect(&image);
        }

        let elements = assign_marks(candidates);

        let mut rgba = image.to_rgba8();
        draw_marks(&mut rgba, &elements, self.show_boxes, self.show_labels);

        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(rgba)
            .write_to(&mut std::io::Cursor::new(&mut buf), ImageOutputFormat::Jpeg(85))
            .map_err(|e| VisionError::encode(e.to_string()))?;
        let annotated_image_base64 = base64::engine::general_purpose::STANDARD.encode(&buf);

        let description = describe(&elements);

        self.marks.insert(session_id.clone(), elements.clone());

        Ok(MarkedImage {
            annotated_image_base64,
            marks: elements,
            description,
        })
    }

    /// Resolves a mark id recorded by the most recent [`Self::mark`]
    /// call for `session_id` to a page coordinate and element type.
    pub fn click_by_mark(&self, session_id: &SessionId, mark_id: u32) -> Result<((i32, i32), String), VisionError> {
        let elements = self.marks.get(session_id).ok_or_else(VisionError::no_marks)?;
        elements
            .iter()
            .find(|e| e.mark_id == mark_id)
            .map(|e| (e.center, e.element_type.clone()))
            .ok_or_else(|| VisionError::not_found(mark_id))
    }

    pub fn marks_count(&self, session_id: &SessionId) -> usize {
        self.marks.get(session_id).map(|e| e.len()).unwrap_or(0)
    }

    pub fn clear(&self, session_id: &SessionId) {
        self.marks.remove(session_id);
    }
}

fn assign_marks(candidates: Vec<Candidate>) -> Vec<MarkedElement> {
    candidates
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let mark_id = (i + 1) as u32;
            let bounds = normalize(c.bounds);
            MarkedElement {
                mark_id,
                element_type: c.element_type.as_str().to_string(),
                bounding_box: bounds,
                center: bounds.center(),
                text: c.text,
                confidence: c.confidence,
            }
        })
        .collect()
}

fn normalize(b: BoundingBox) -> BoundingBox {
    BoundingBox {
        x: b.x.max(0),
        y: b.y.max(0),
        width: b.width.max(1),
        height: b.height.max(1),
    }
}

fn describe(elements: &[MarkedElement]) -> String {
    elements
        .iter()
        .map(|e| match &e.text {
            Some(text) if !text.is_empty() => {
                let truncated: String = text.chars().take(50).collect();
                format!("[{}] {} \"{}\"", e.mark_id, e.element_type, truncated)
            }
            _ => format!("[{}] {}", e.mark_id, e.element_type),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ElementType;
    use image::{ImageBuffer, Rgba};

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let image = DynamicImageHelper::blank(w, h);
        let mut buf = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut buf), ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    struct DynamicImageHelper;
    impl DynamicImageHelper {
        fn blank(w: u32, h: u32) -> image::DynamicImage {
            image::DynamicImage::ImageRgba8(ImageBuffer::from_pixel(w, h, Rgba([255, 255, 255, 255])))
        }
    }

    struct FixedDetector(Vec<Candidate>);
    impl ElementDetector for FixedDetector {
        fn detect(&self, _image: &image::DynamicImage) -> Vec<Candidate> {
            self.0.clone()
        }
    }

    #[test]
    fn mark_on_blank_image_with_no_detector_yields_no_marks() {
        let som = SetOfMarks::new();
        let session_id = SessionId::new();
        let result = som.mark(&session_id, &png_bytes(64, 64)).unwrap();
        assert!(result.marks.is_empty());
        assert!(result.description.is_empty());
    }

    #[test]
    fn mark_ids_are_dense_and_one_indexed() {
        let detector = Arc::new(FixedDetector(vec![
            Candidate {
                element_type: ElementType::Button,
                bounds: BoundingBox { x: 5, y: 5, width: 40, height: 20 },
                confidence: 0.9,
                text: Some("Submit".into()),
            },
            Candidate {
                element_type: ElementType::Link,
                bounds: BoundingBox { x: 60, y: 5, width: 40, height: 20 },
                confidence: 0.8,
                text: None,
            },
        ]));
        let som = SetOfMarks::with_detector(detector);
        let session_id = SessionId::new();
        let result = som.mark(&session_id, &png_bytes(128, 64)).unwrap();
        assert_eq!(result.marks.len(), 2);
        assert_eq!(result.marks[0].mark_id, 1);
        assert_eq!(result.marks[1].mark_id, 2);
        assert!(result.description.contains("[1] button \"Submit\""));
    }

    #[test]
    fn click_by_mark_resolves_center_and_fails_out_of_range() {
        let detector = Arc::new(FixedDetector(vec![Candidate {
            element_type: ElementType::Button,
            bounds: BoundingBox { x: 10, y: 10, width: 20, height: 10 },
            confidence: 0.9,
            text: None,
        }]));
        let som = SetOfMarks::with_detector(detector);
        let session_id = SessionId::new();
        som.mark(&session_id, &png_bytes(64, 64)).unwrap();

        let (center, element_type) = som.click_by_mark(&session_id, 1).unwrap();
        assert_eq!(center, (20, 15));
        assert_eq!(element_type, "button");

        assert!(som.click_by_mark(&session_id, 0).is_err());
        assert!(som.click_by_mark(&session_id, 2).is_err());
    }

    #[test]
    fn click_by_mark_without_prior_screenshot_is_no_marks_error() {
        let som = SetOfMarks::new();
        let session_id = SessionId::new();
        let err = som.click_by_mark(&session_id, 1).unwrap_err();
        assert_eq!(err.kind, crate::error::VisionErrorKind::NoMarks);
    }

    #[test]
    fn marking_again_discards_previous_marks() {
        let detector = Arc::new(FixedDetector(vec![Candidate {
            element_type: ElementType::Button,
            bounds: BoundingBox { x: 0, y: 0, width: 10, height: 10 },
            confidence: 0.9,
            text: None,
        }]));
        let som = SetOfMarks::with_detector(detector);
        let session_id = SessionId::new();
        som.mark(&session_id, &png_bytes(32, 32)).unwrap();
        assert_eq!(som.marks_count(&session_id), 1);

        som.clear(&session_id);
        assert_eq!(som.marks_count(&session_id), 0);
    }
}
