use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error("an I/O error occurred: {0}")]
    GenericIo(#[from] std::io::Error),

    #[error("http client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("deserialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("release feed is missing the {0} entry")]
    MissingField(&'static str),

    #[error("release file name does not match the expected pattern: {0}")]
    UnexpectedFilename(String),

    #[error("invalid download url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid version string: {0}")]
    InvalidVersion(String),

    #[error("invalid file name pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("could not determine a download directory")]
    NoDownloadDirectory,

    #[error("failed to launch installer: {0}")]
    Launch(std::io::Error),

    #[error("background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
