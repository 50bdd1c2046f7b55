use nifti::error::NiftiError;

/// Errors raised while measuring lesions on a volume.
#[derive(Debug, thiserror::Error)]
pub enum LesionError {
    #[error("Invalid transform: {0}")]
    InvalidTransform(String),

    #[error("No structure plane selected. Select axial, sagittal or coronal before moving the rulers")]
    UnselectedPlane,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Voxel axis index must be 0, 1 or 2, got {0}")]
    InvalidAxisIndex(usize),

    #[error("Invalid measurement: {0}")]
    InvalidMeasurement(String),

    #[error("Nifti error: {0}")]
    Nifti(#[from] NiftiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LesionError>;
