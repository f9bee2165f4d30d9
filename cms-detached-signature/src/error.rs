// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Unified error type for signing, time-stamping and verification.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signing key error: {0}")]
    Key(String),

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error("signature of {size} bytes exceeds reserved capacity of {capacity} bytes")]
    CapacityExceeded { size: usize, capacity: usize },

    #[error("time-stamp server error (status {status:?}): {message}")]
    Network {
        status: Option<u16>,
        message: String,
    },

    #[error("time-stamp protocol error: {0}")]
    Protocol(String),

    #[error("parsing error: {0}")]
    Parsing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Discriminant of [SignatureError] without its payload.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    Key,
    Crypto,
    CapacityExceeded,
    Network,
    Protocol,
    Parsing,
    Io,
}

impl SignatureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Key(_) => ErrorKind::Key,
            Self::Crypto(_) => ErrorKind::Crypto,
            Self::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Self::Network { .. } => ErrorKind::Network,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Parsing(_) => ErrorKind::Parsing,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T, E = SignatureError> = std::result::Result<T, E>;
