use std::path::PathBuf;
use thiserror::Error;

/// Single error taxonomy for every stage of a registration run
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Missing or empty image, malformed control points, degenerate segment
    #[error("invalid registration input: {0}")]
    InputValidation(String),

    /// Registered images do not overlap, or the overlap rectangle is degenerate
    #[error("registration geometry failure: {0}")]
    Geometry(String),

    /// A raster primitive (binarize, dilate, warp, encode, decode) failed
    #[error("image operation '{operation}' failed: {message}")]
    ImageOperation {
        operation: &'static str,
        message: String,
    },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize registration metadata: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("registration has not completed; results are unavailable")]
    NotRegistered,

    #[error("registrator already ran; create a new instance for another image pair")]
    AlreadyRegistered,
}

impl RegistrationError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::InputValidation(message.into())
    }

    pub fn geometry(message: impl Into<String>) -> Self {
        Self::Geometry(message.into())
    }

    pub fn image_op(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::ImageOperation {
            operation,
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_op_keeps_underlying_message() {
        let err = RegistrationError::image_op("dilate", "malformed matrix");
        assert_eq!(
            err.to_string(),
            "image operation 'dilate' failed: malformed matrix"
        );
    }

    #[test]
    fn test_json_errors_convert_to_serialization() {
        let json_err = serde_json::from_str::<u8>("not json").unwrap_err();
        let err: RegistrationError = json_err.into();
        assert!(matches!(err, RegistrationError::Serialization(_)));
        assert!(err.to_string().starts_with("failed to serialize registration metadata"));
    }

    #[test]
    fn test_input_validation_message() {
        let err = RegistrationError::input("moving image is empty");
        assert!(matches!(err, RegistrationError::InputValidation(_)));
        assert!(err.to_string().contains("moving image is empty"));
    }
}
