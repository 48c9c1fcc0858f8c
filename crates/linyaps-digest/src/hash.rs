// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

use std::convert::TryInto;
use std::fmt::Display;
use std::io::{Read, Write};
use std::pin::Pin;
use std::task::Poll;

use data_encoding::HEXLOWER;
use ring::digest::{Context, SHA256, SHA256_OUTPUT_LEN};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{Error, Result};

#[cfg(test)]
#[path = "./hash_test.rs"]
mod hash_test;

/// The number of bytes that make up a digest
pub const DIGEST_SIZE: usize = SHA256_OUTPUT_LEN;

/// The bytes of the digest of zero input bytes, useful as a sentinel default
pub const EMPTY_DIGEST: [u8; DIGEST_SIZE] = [
    227, 176, 196, 66, 152, 252, 28, 20, 154, 251, 244, 200, 153, 111, 185, 36, 39, 174, 65, 228,
    100, 155, 147, 76, 164, 149, 153, 27, 120, 82, 184, 85,
];

/// Calculates a [`Digest`] from the bytes written to it.
///
/// A write-through target can optionally be specified at creation time
/// using [`Hasher::with_target`]. In this form the hasher writes to the
/// given target while also tracking the digest of everything written.
pub struct Hasher<T> {
    ctx: Context,
    target: T,
}

impl<T> Hasher<T> {
    pub fn with_target(writer: T) -> Self {
        Self {
            ctx: Context::new(&SHA256),
            target: writer,
        }
    }

    /// Finalize the hasher and return the digest of everything written
    pub fn digest(self) -> Digest {
        let ring_digest = self.ctx.finish();
        let bytes = match ring_digest.as_ref().try_into() {
            Err(err) => panic!("internal error: {err:?}"),
            Ok(b) => b,
        };
        Digest(bytes)
    }
}

impl Default for Hasher<std::io::Sink> {
    fn default() -> Self {
        Self {
            ctx: Context::new(&SHA256),
            target: std::io::sink(),
        }
    }
}

impl<T> Write for Hasher<T>
where
    T: Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.ctx.update(buf);
        self.target.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.target.flush()
    }
}

impl<T> AsyncWrite for Hasher<T>
where
    T: AsyncWrite + Unpin,
{
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let written = match Pin::new(&mut self.target).poll_write(cx, buf) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Err(err)) => return Poll::Ready(Err(err)),
            Poll::Ready(Ok(count)) => count,
        };
        self.ctx.update(&buf[..written]);
        Poll::Ready(Ok(written))
    }

    fn poll_flush(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.target).poll_flush(cx)
    }

    fn poll_shutdown(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.target).poll_shutdown(cx)
    }
}

/// A possibly-incomplete prefix of a [`Digest`], accepted anywhere a
/// reference component may be abbreviated.
#[derive(Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Clone)]
pub struct PartialDigest(Vec<u8>);

impl PartialDigest {
    /// Parse the given string as a partial digest.
    pub fn parse<S: AsRef<str>>(source: S) -> Result<Self> {
        let source = source.as_ref();
        if source.is_empty() {
            return Err(Error::InvalidPartialDigest {
                reason: "partial digest cannot be empty".to_string(),
                given: String::new(),
            });
        }
        if source.len() % 2 != 0 {
            return Err(Error::InvalidPartialDigest {
                reason: "len must be a multiple of two".to_string(),
                given: source.to_owned(),
            });
        }
        let decoded = HEXLOWER
            .decode(source.to_ascii_lowercase().as_bytes())
            .map_err(|err| Error::InvalidPartialDigest {
                reason: err.to_string(),
                given: source.to_owned(),
            })?;
        Ok(Self(decoded))
    }

    /// True if this partial digest is actually a full digest
    pub fn is_full(&self) -> bool {
        self.0.len() == DIGEST_SIZE
    }

    /// If this partial digest is actually a full digest, convert it
    pub fn to_digest(&self) -> Option<Digest> {
        Digest::from_bytes(&self.0).ok()
    }
}

impl std::str::FromStr for PartialDigest {
    type Err = Error;

    fn from_str(source: &str) -> Result<Self> {
        Self::parse(source)
    }
}

impl Display for PartialDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&HEXLOWER.encode(&self.0))
    }
}

impl From<&[u8]> for PartialDigest {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for PartialDigest {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

/// The SHA-256 digest of some piece of content: a layer's `files/` tree,
/// a downloaded source archive, or a UAB's `linglong.bundle` section.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Ord, PartialOrd)]
pub struct Digest([u8; DIGEST_SIZE]);

impl std::ops::Deref for Digest {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0[..]
    }
}

impl Default for Digest {
    fn default() -> Self {
        Digest(EMPTY_DIGEST)
    }
}

impl std::fmt::Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_string().as_ref())
    }
}

impl std::str::FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_digest(s)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl Digest {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    pub fn into_bytes(self) -> [u8; DIGEST_SIZE] {
        self.0
    }

    /// Create a digest from exactly [`DIGEST_SIZE`] bytes
    pub fn from_bytes(digest_bytes: &[u8]) -> Result<Self> {
        match digest_bytes.try_into() {
            Err(_) => Err(Error::DigestLengthError(digest_bytes.len())),
            Ok(bytes) => Ok(Self(bytes)),
        }
    }

    /// Reads the given async reader to completion, returning the
    /// digest of its contents.
    pub async fn from_async_reader(mut reader: impl AsyncRead + Unpin) -> Result<Self> {
        use tokio::io::AsyncReadExt;
        let mut ctx = Context::new(&SHA256);
        let mut buf = vec![0u8; 8192];
        loop {
            let count = reader
                .read(buf.as_mut_slice())
                .await
                .map_err(Error::DigestReadError)?;
            if count == 0 {
                break;
            }
            ctx.update(&buf[..count]);
        }
        let ring_digest = ctx.finish();
        let bytes = ring_digest
            .as_ref()
            .try_into()
            .expect("sha256 digest has the exact expected length");
        Ok(Digest(bytes))
    }

    /// Reads the given reader to completion, returning the digest of
    /// its contents.
    pub fn from_reader(mut reader: impl Read) -> Result<Self> {
        let mut ctx = Context::new(&SHA256);
        let mut buf = vec![0u8; 8192];
        loop {
            let count = reader.read(buf.as_mut_slice()).map_err(Error::DigestReadError)?;
            if count == 0 {
                break;
            }
            ctx.update(&buf[..count]);
        }
        let ring_digest = ctx.finish();
        let bytes = ring_digest
            .as_ref()
            .try_into()
            .expect("sha256 digest has the exact expected length");
        Ok(Digest(bytes))
    }
}

impl Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct StringVisitor;
        impl serde::de::Visitor<'_> for StringVisitor {
            type Value = Digest;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a hex-encoded sha256 digest")
            }

            fn visit_str<E>(self, value: &str) -> std::result::Result<Digest, E>
            where
                E: serde::de::Error,
            {
                parse_digest(value).map_err(|_| {
                    serde::de::Error::invalid_value(serde::de::Unexpected::Str(value), &self)
                })
            }
        }
        deserializer.deserialize_str(StringVisitor)
    }
}

impl From<[u8; DIGEST_SIZE]> for Digest {
    fn from(bytes: [u8; DIGEST_SIZE]) -> Self {
        Digest(bytes)
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&HEXLOWER.encode(&self.0))
    }
}

/// Parse a hex-encoded digest string
pub fn parse_digest(digest_str: impl AsRef<str>) -> Result<Digest> {
    let lower = digest_str.as_ref().to_ascii_lowercase();
    let digest_bytes = HEXLOWER
        .decode(lower.as_bytes())
        .map_err(Error::DigestDecodeError)?;
    Digest::from_bytes(digest_bytes.as_slice())
}
