// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

/// A specialized result for digest operations
pub type Result<T> = std::result::Result<T, Error>;

/// The error type returned by digest operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Some underlying io error caused reading a stream to hash to fail
    #[error("Digest read error")]
    DigestReadError(#[source] std::io::Error),

    /// A digest could not be decoded from a string because it
    /// contained invalid data or was otherwise malformed
    #[error("Could not decode digest: {0}")]
    DigestDecodeError(#[source] data_encoding::DecodeError),

    /// A digest could not be created because the wrong number
    /// of bytes were provided
    #[error("Invalid number of bytes for digest: {0} != {}", super::DIGEST_SIZE)]
    DigestLengthError(usize),

    /// A partial digest could not be parsed from a string because
    /// of some issue with the provided data
    #[error("Invalid partial digest '{given}': {reason}")]
    InvalidPartialDigest {
        /// The reason that the digest string was invalid
        reason: String,
        /// A copy of the invalid string
        given: String,
    },
}
