use std::fmt;

/// Crate-wide error type for the steganography engine and its tooling
#[derive(Debug)]
pub enum SteganographyError {
    /// Cover/stego image cannot be loaded, isn't 8-bit, or is too small for the header
    InvalidImage(String),
    /// Payload bits exceed the reachable bit budget across eligible blocks
    CapacityExceeded { required: usize, available: usize },
    /// Decoded header is inconsistent with the bits actually available
    HeaderCorrupt(String),
    /// Encryption/decryption errors
    CryptoError(String),
    /// Invalid input parameters (bad config, malformed key, ...)
    InvalidInput(String),
    /// Underlying image-crate errors
    ImageError(String),
    /// File I/O errors
    IoError(std::io::Error),
    /// Base64 decoding errors
    Base64Error(String),
    /// UTF-8 conversion errors
    Utf8Error(std::string::FromUtf8Error),
}

impl fmt::Display for SteganographyError {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SteganographyError::InvalidImage(message) => {
                write!(formatter, "Invalid image: {}", message)
            }
            SteganographyError::CapacityExceeded {
                required,
                available,
            } => {
                write!(
                    formatter,
                    "Insufficient capacity: need {} bits, only {} available",
                    required, available
                )
            }
            SteganographyError::HeaderCorrupt(message) => {
                write!(formatter, "Header corrupt: {}", message)
            }
            SteganographyError::CryptoError(message) => {
                write!(formatter, "Cryptography error: {}", message)
            }
            SteganographyError::InvalidInput(message) => {
                write!(formatter, "Invalid input: {}", message)
            }
            SteganographyError::ImageError(message) => {
                write!(formatter, "Image processing error: {}", message)
            }
            SteganographyError::IoError(error) => {
                write!(formatter, "I/O error: {}", error)
            }
            SteganographyError::Base64Error(message) => {
                write!(formatter, "Base64 decoding error: {}", message)
            }
            SteganographyError::Utf8Error(error) => {
                write!(formatter, "UTF-8 conversion error: {}", error)
            }
        }
    }
}

impl std::error::Error for SteganographyError {}

impl From<std::io::Error> for SteganographyError {
    fn from(error: std::io::Error) -> Self {
        SteganographyError::IoError(error)
    }
}

impl From<image::ImageError> for SteganographyError {
    fn from(error: image::ImageError) -> Self {
        SteganographyError::ImageError(error.to_string())
    }
}

impl From<std::string::FromUtf8Error> for SteganographyError {
    fn from(error: std::string::FromUtf8Error) -> Self {
        SteganographyError::Utf8Error(error)
    }
}

impl From<base64::DecodeError> for SteganographyError {
    fn from(error: base64::DecodeError) -> Self {
        SteganographyError::Base64Error(error.to_string())
    }
}

/// Result type alias for steganography operations
pub type Result<T> = std::result::Result<T, SteganographyError>;
