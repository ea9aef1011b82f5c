pub mod capture;
pub mod packets;

use actix_web::error::BlockingError;

use crate::utils::error::CaptureError;

/// Error for a blocking engine call whose worker thread went away
fn blocking_failure(err: BlockingError) -> CaptureError {
    CaptureError::SourceFailure(format!("blocking task failed: {}", err))
}
