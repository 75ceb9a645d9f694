use serde::{Deserialize, Serialize};

/// The closed set of interactive element classes the detector path
/// recognizes. The fallback contour path always reports `Unknown`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Button,
    Input,
    Link,
    Checkbox,
    Radio,
    Dropdown,
    Slider,
    Tab,
    Menu,
    Navigation,
    Unknown,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Button => "button",
            ElementType::Input => "input",
            ElementType::Link => "link",
            ElementType::Checkbox => "checkbox",
            ElementType::Radio => "radio",
            ElementType::Dropdown => "dropdown",
            ElementType::Slider => "slider",
            ElementType::Tab => "tab",
            ElementType::Menu => "menu",
            ElementType::Navigation => "navigation",
            ElementType::Unknown => "element",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }
}

/// A raw detection before mark assignment — what either the detector
/// path or the contour fallback produces.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub element_type: ElementType,
    pub bounds: BoundingBox,
    pub confidence: f32,
    pub text: Option<String>,
}

/// A candidate after mark assignment, ready to be drawn and reported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkedElement {
    pub mark_id: u32,
    pub element_type: String,
    pub bounding_box: BoundingBox,
    pub center: (i32, i32),
    pub text: Option<String>,
    pub confidence: f32,
}

/// The result of a full marking pass over one screenshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkedImage {
    pub annotated_image_base64: String,
    pub marks: Vec<MarkedElement>,
    pub description: String,
}

pub const MIN_CONFIDENCE: f32 = 0.5;
pub const MIN_CONTOUR_WIDTH: i32 = 30;
pub const MIN_CONTOUR_HEIGHT: i32 = 15;
pub const MAX_CONTOUR_BOXES: usize = 20;
pub const MARK_DIAMETER: u32 = 24;

pub const DETECTOR_CLASSES: &[ElementType] = &[
    ElementType::Button,
    ElementType::Input,
    ElementType::Link,
    ElementType::Checkbox,
    ElementType::Radio,
    ElementType::Dropdown,
    ElementType::Slider,
    ElementType::Tab,
    ElementType::Menu,
    ElementType::Navigation,
];

/// BGR-equivalent palette expressed as RGB, matching the original
/// Set-of-Marks Google-material palette, indexed by `mark_id mod 8`.
pub const PALETTE: [(u8, u8, u8); 8] = [
    (66, 133, 244),
    (234, 67, 53),
    (251, 188, 4),
    (52, 168, 83),
    (255, 109, 0),
    (156, 39, 176),
    (0, 188, 212),
    (255, 87, 34),
];

pub fn palette_color(mark_id: u32) -> (u8, u8, u8) {
    PALETTE[(mark_id as usize) % PALETTE.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_center_rounds_down() {
        let b = BoundingBox { x: 10, y: 10, width: 5, height: 5 };
        assert_eq!(b.center(), (12, 12));
    }

    #[test]
    fn palette_wraps_at_eight() {
        assert_eq!(palette_color(0), palette_color(8));
        assert_ne!(palette_color(0), palette_color(1));
    }
}
