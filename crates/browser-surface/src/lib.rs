pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod highlevel;
pub mod readiness;
pub mod types;

pub use discovery::PageRegistry;
pub use dispatcher::CdpActionDispatcher;
pub use error::SurfaceError;
pub use highlevel::HighLevelActions;
pub use types::{MouseButton, ScreenshotFormat, ScreenshotOptions, WaitGate};
