use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("could not install the log subscriber")]
    Logging,
    #[display("storage setup failed")]
    Storage,
    #[display("classifier setup failed")]
    Classify,
    #[display("index unavailable")]
    Index,
    #[display("run failed")]
    Run,
    #[display("could not report status")]
    Report,
}
