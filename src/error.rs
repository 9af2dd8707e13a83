use crate::codec::CodecError;
use crate::config::ConfigError;
use std::io;

/// Errors that stop a process
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unable to encode message: {0}")]
    Codec(#[from] CodecError),
}

pub type Result<T> = std::result::Result<T, Error>;
