use crate::{Error, Result};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use digest::Digest;
use md5::Md5;

/// Digest algorithm named by the challenge
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Algorithm {
    MD5,
    /// Recognized, but the session variant has no computation here
    MD5Sess,
    Other(String),
}

impl Algorithm {
    /// Hash bytes with the algorithm, hex-encoded.
    ///
    /// # Errors
    /// Anything other than plain MD5 yields [`Error::UnsupportedAlgorithm`].
    pub fn hash(&self, bytes: &[u8]) -> Result<String> {
        match self {
            Algorithm::MD5 => Ok(hex::encode(Md5::digest(bytes))),
            other => Err(Error::UnsupportedAlgorithm(other.to_string())),
        }
    }

    /// Calculate a hash of string's bytes using the selected algorithm
    pub fn hash_str(&self, s: &str) -> Result<String> {
        self.hash(s.as_bytes())
    }
}

impl FromStr for Algorithm {
    type Err = std::convert::Infallible;

    /// Parse from the token used in WWW-Authenticate. Never fails; unknown names are kept.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "MD5" => Algorithm::MD5,
            "MD5-sess" => Algorithm::MD5Sess,
            other => Algorithm::Other(other.to_string()),
        })
    }
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::MD5
    }
}

impl Display for Algorithm {
    /// Format to the form used in HTTP headers
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Algorithm::MD5 => "MD5",
            Algorithm::MD5Sess => "MD5-sess",
            Algorithm::Other(s) => s,
        })
    }
}
