//! Error types for asset fetching

use std::fmt;

#[derive(Debug)]
pub enum FetchError {
    Http(Box<reqwest::Error>),
    Status { locator: String, status: u16 },
    InvalidLocator(String),
    UnsupportedLocator(String),
    DataUrl(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Http(err) => write!(f, "HTTP error: {}", err),
            FetchError::Status { locator, status } => {
                write!(f, "Origin returned status {} for {}", status, locator)
            }
            FetchError::InvalidLocator(msg) => write!(f, "Invalid locator: {}", msg),
            FetchError::UnsupportedLocator(scheme) => {
                write!(f, "Unsupported locator scheme: {}", scheme)
            }
            FetchError::DataUrl(msg) => write!(f, "Malformed data URL: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Http(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Http(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
