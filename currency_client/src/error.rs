use thiserror::Error;

pub const GENERIC_UPLOAD_ERROR: &str =
    "An error occurred while processing the images. Please try again.";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Please select a valid image file.")]
    InvalidFileType,
    #[error("Please select at least one image file.")]
    EmptySelection,
    #[error("Page size {0} is not one of the configured options")]
    InvalidPageSize(u32),
    #[error("Request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("Server responded {status}: {}", .message.as_deref().unwrap_or("no details"))]
    Server { status: u16, message: Option<String> },
    #[error("Unexpected response body: {0}")]
    Decode(String),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err)
        }
    }
}

impl ClientError {
    /// Text for the error banner: the server's own message when it sent one.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Server {
                message: Some(message),
                ..
            } => message.clone(),
            ClientError::InvalidFileType | ClientError::EmptySelection => self.to_string(),
            _ => GENERIC_UPLOAD_ERROR.to_string(),
        }
    }
}
