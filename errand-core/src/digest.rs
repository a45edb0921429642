// errand-core/src/digest.rs

//! Checksum parsing and verification for downloaded blobs.
//!
//! A checksum is either a bare SHA-1 hex string or a `;`-separated list of
//! `algorithm:hex` entries, e.g. `sha1:0a1b...;sha256:9f8e...`. When several
//! entries are present the strongest one is verified.

use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum DigestError {
    #[error("Expected a checksum but it was empty")]
    Empty,

    #[error("Unknown digest algorithm '{0}'")]
    UnknownAlgorithm(String),

    #[error("Expected stream to have digest '{expected}' but was '{actual}'")]
    Mismatch { expected: String, actual: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Algorithm {
    Sha1,
    Sha256,
}

impl Algorithm {
    fn name(&self) -> &'static str {
        match self {
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha256 => "sha256",
        }
    }
}

/// A single expected digest value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedDigest {
    pub algorithm: Algorithm,
    pub hex: String,
}

impl fmt::Display for ExpectedDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.algorithm {
            // Bare hex is how SHA-1 checksums are usually written.
            Algorithm::Sha1 => write!(f, "{}", self.hex),
            _ => write!(f, "{}:{}", self.algorithm.name(), self.hex),
        }
    }
}

impl FromStr for ExpectedDigest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut strongest: Option<ExpectedDigest> = None;

        for entry in s.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let digest = match entry.split_once(':') {
                Some((algo, hex)) => {
                    let algorithm = match algo.to_ascii_lowercase().as_str() {
                        "sha1" => Algorithm::Sha1,
                        "sha256" => Algorithm::Sha256,
                        other => return Err(DigestError::UnknownAlgorithm(other.to_string())),
                    };
                    ExpectedDigest {
                        algorithm,
                        hex: hex.to_ascii_lowercase(),
                    }
                }
                None => ExpectedDigest {
                    algorithm: Algorithm::Sha1,
                    hex: entry.to_ascii_lowercase(),
                },
            };

            if strongest
                .as_ref()
                .is_none_or(|current| digest.algorithm > current.algorithm)
            {
                strongest = Some(digest);
            }
        }

        strongest.ok_or(DigestError::Empty)
    }
}

/// Incremental hasher for the algorithm of an [`ExpectedDigest`].
pub enum StreamHasher {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl StreamHasher {
    pub fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Sha1 => StreamHasher::Sha1(Sha1::new()),
            Algorithm::Sha256 => StreamHasher::Sha256(Sha256::new()),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            StreamHasher::Sha1(h) => h.update(bytes),
            StreamHasher::Sha256(h) => h.update(bytes),
        }
    }

    pub fn finalize_hex(self) -> String {
        match self {
            StreamHasher::Sha1(h) => hex_encode(&h.finalize()),
            StreamHasher::Sha256(h) => hex_encode(&h.finalize()),
        }
    }
}

impl ExpectedDigest {
    pub fn hasher(&self) -> StreamHasher {
        StreamHasher::new(self.algorithm)
    }

    /// Compares a finished hasher against this digest.
    pub fn verify(&self, hasher: StreamHasher) -> Result<(), DigestError> {
        let actual = ExpectedDigest {
            algorithm: self.algorithm,
            hex: hasher.finalize_hex(),
        };
        if actual.hex != self.hex {
            return Err(DigestError::Mismatch {
                expected: self.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}
