use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The configuration file could not be found at the given path.
    #[display("configuration file not found: {}", _0.display())]
    NotFound(#[error(not(source))] std::path::PathBuf),
    /// The file extension does not name a supported format.
    #[display("unsupported configuration format: {_0}")]
    Format(#[error(not(source))] String),
    /// The layered sources could not be merged into a [`Config`](crate::Config).
    #[display("could not extract configuration")]
    Extract,
    /// A value is outside of its accepted range.
    #[display("invalid configuration value for {key}: {reason}")]
    Invalid { key: &'static str, reason: &'static str },
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        false
    }
}
