use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by object store backends and the client around them.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object not found: {key}")]
    ObjectNotFound { key: String },

    #[error("Bucket not found: {bucket}")]
    BucketNotFound { bucket: String },

    #[error("Authentication failed (HTTP {status}): {message}")]
    AuthenticationFailed { status: u16, message: String },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timed out: {message}")]
    Timeout { message: String },

    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Unexpected response (HTTP {status}): {message}")]
    UnexpectedStatus { status: u16, message: String },

    #[error("Fetching '{key}' exceeded the {}s deadline", deadline.as_secs())]
    OperationTimeout { key: String, deadline: Duration },

    #[error("Giving up on '{key}' after {attempts} attempts: {source}")]
    RetriesExhausted {
        key: String,
        attempts: u32,
        #[source]
        source: Box<StoreError>,
    },

    #[error("Invalid response from object store: {message}")]
    InvalidResponse { message: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build object store client: {0}")]
    ClientBuild(String),
}

impl StoreError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::ConnectionFailed { .. }
                | StoreError::Timeout { .. }
                | StoreError::ServerError { .. }
        )
    }

    /// Failures that must stop the whole run instead of skipping one object.
    pub fn is_fatal(&self) -> bool {
        match self {
            StoreError::AuthenticationFailed { .. }
            | StoreError::BucketNotFound { .. }
            | StoreError::ClientBuild(_) => true,
            StoreError::RetriesExhausted { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    pub(crate) fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            StoreError::Timeout {
                message: error.to_string(),
            }
        } else if error.is_connect() || error.is_request() || error.is_body() {
            StoreError::ConnectionFailed {
                message: error.to_string(),
            }
        } else {
            StoreError::InvalidResponse {
                message: error.to_string(),
            }
        }
    }

    /// Maps a non-success HTTP status to an error.
    pub(crate) fn from_status(status: u16, key: &str, bucket: &str, body: &str) -> Self {
        let message = s3_error_code(body).unwrap_or_else(|| format!("HTTP {}", status));
        match status {
            401 | 403 => StoreError::AuthenticationFailed { status, message },
            404 if message == "NoSuchBucket" => StoreError::BucketNotFound {
                bucket: bucket.to_string(),
            },
            404 => StoreError::ObjectNotFound {
                key: key.to_string(),
            },
            408 => StoreError::Timeout { message },
            429 | 500..=599 => StoreError::ServerError { status, message },
            _ => StoreError::UnexpectedStatus { status, message },
        }
    }
}

/// Reads the `<Code>` element of an S3 error document. Bodies that are not
/// XML, or carry no code, yield `None`.
fn s3_error_code(body: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    let mut in_code = false;
    let mut code = String::new();
    loop {
        match reader.read_event().ok()? {
            Event::Start(e) if e.local_name().as_ref() == b"Code" => in_code = true,
            Event::Text(e) if in_code => code.push_str(&e.decode().ok()?),
            Event::End(e) if e.local_name().as_ref() == b"Code" => {
                let code = code.trim();
                return (!code.is_empty()).then(|| code.to_string());
            }
            Event::Eof => return None,
            _ => {}
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
