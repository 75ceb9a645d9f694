//! Vision Grounding: overlays numbered marks on a screenshot so a
//! caller (typically an LLM-driven agent loop) can select interactive
//! elements by number instead of by brittle DOM selectors.

pub mod ax;
pub mod detection;
pub mod error;
pub mod models;
pub mod overlay;
pub mod som;

pub use ax::{simplify as ax_candidates, AxCandidate};
pub use detection::{ContourDetector, ElementDetector, NullDetector};
pub use error::{VisionError, VisionErrorKind};
pub use models::{BoundingBox, Candidate, ElementType, MarkedElement, MarkedImage};
pub use som::SetOfMarks;
