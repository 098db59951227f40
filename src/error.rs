//! archive.today client error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid URL sent to archive.today: {0}")]
    InvalidUrl(String),
    #[error("submitid not found in archive.today page, the page format may have changed")]
    SubmitIdNotFound,
    #[error("unexpected snapshot link: {0}")]
    UnexpectedLink(String),
    #[error("malformed timemap entry: {0}")]
    MalformedTimemap(String),
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("unknown response code: {0}")]
    UnknownResponseCode(u16),
    #[error("response is missing the `{0}` header")]
    MissingHeader(&'static str),
    #[error("archiving still in progress after {attempts} attempts")]
    WipTimeout { attempts: u32 },
    #[error("faulty logic: {0}")]
    Logic(String),
    #[error("HTTP request failed: {0}")]
    Http(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::Logic(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
