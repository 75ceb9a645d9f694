use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("no live page available")]
    NoActivePage,
    #[error("cdp command failed: {0}")]
    Cdp(#[from] cdp_client::CdpError),
    #[error("action failed: {0}")]
    ActionFailed(String),
}
