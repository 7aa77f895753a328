use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueryError>;

/// Failures of the web-API query modules. Rendered to callers as
/// `Error (CODE): message`, same shape as the flake-store errors.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("{0} API temporarily unavailable")]
    ServiceUnavailable(&'static str),

    #[error("{0} API timed out")]
    Timeout(&'static str),
}

impl QueryError {
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::InvalidInput(_) => "ERROR",
            QueryError::NotFound(_) => "NOT_FOUND",
            QueryError::Api(_) => "API_ERROR",
            QueryError::ServiceUnavailable(_) => "SERVICE_ERROR",
            QueryError::Timeout(_) => "TIMEOUT",
        }
    }

    pub fn render(&self) -> String {
        format!("Error ({}): {}", self.code(), self)
    }

    /// Map a transport-level failure against a named upstream service.
    pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            QueryError::Timeout(service)
        } else {
            QueryError::Api(err.to_string())
        }
    }
}
