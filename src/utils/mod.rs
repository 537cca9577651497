pub mod error;
pub mod gcp;

pub use error::{PredictError, UploadRejected, MAX_UPLOAD_BYTES};
