use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

pub(crate) fn request_err(url: &str, err: ureq::Error) -> ClientError {
    let message = match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            format!("status {code}: {}", body.trim())
        }
        ureq::Error::Transport(transport) => transport.to_string(),
    };
    ClientError::Request {
        url: url.to_string(),
        message,
    }
}
