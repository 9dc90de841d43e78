//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// the pixel compressor rejected its input
    #[error("pixel compression failed: {0}")]
    Compression(String),

    /// a compression worker exited without publishing its result
    #[error("compression worker disconnected before all blobs were published")]
    WorkerDisconnected,

    /// node has more children than a record can describe
    #[error("node has {0} children, limit is 65535")]
    TooManyChildren(usize),

    /// string exceeds the 16-bit length prefix
    #[error("string of {0} bytes exceeds the 65535 byte limit")]
    StringTooLong(usize),

    /// file is not a valid nx container
    #[error("file is not a valid nx container")]
    InvalidArchive,

    /// unable to find requested node
    #[error("unable to find requested node")]
    NodeNotFound(#[from] NodeNotFoundError),
}

/// Error type to provide further information when a node has not been found
#[derive(Error, Diagnostic, Debug)]
pub enum NodeNotFoundError {
    /// with id {0}
    #[error("unable to find requested node with id {0}")]
    Id(u32),

    /// by name {0}
    #[error("unable to find requested node by name {0}")]
    Name(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
