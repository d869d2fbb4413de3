use std::result::Result as StdResult;

use thiserror::Error;

/// Errors a reader can report. Errors are plain values; diagnostics with
/// the offending input are emitted on the log at the point of failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed argument string, or a request the stream state cannot
    /// serve (for example a boundary read with too small a buffer).
    #[error("invalid argument")]
    InvalidArg,

    /// Unknown source name, or a source that cannot be opened in its
    /// current state (the RAM source is a singleton).
    #[error("unsupported")]
    Unsupported,

    /// A fixed-capacity buffer ran out, such as the chunk plan.
    #[error("out of resources")]
    OutOfResources,

    /// The named partition, table or variable does not exist.
    #[error("not found")]
    NotFound,

    /// The platform failed a firmware call or a block-device read.
    #[error("i/o error")]
    Io,
}

pub type Result<T> = StdResult<T, Error>;
