use thiserror::Error;

/// Failures from the remote HTTP services (event API, bot API, sheets, LLM).
#[derive(Debug, Error)]
pub enum ApiError {
    /// The endpoint answered with a non-success status.
    #[error("Failed to fetch {resource}: {status} - {body}")]
    Status {
        resource: String,
        status: u16,
        body: String,
    },

    /// The endpoint answered 2xx but the payload was not what we expected.
    #[error("Unexpected {resource} response: {reason}")]
    Payload { resource: String, reason: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Payload { .. } => None,
        }
    }
}

/// Turn a non-success response into `ApiError::Status`, keeping the body text.
pub async fn check_status(
    resource: &str,
    res: reqwest::Response,
) -> Result<reqwest::Response, ApiError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    Err(ApiError::Status {
        resource: resource.to_string(),
        status,
        body,
    })
}
