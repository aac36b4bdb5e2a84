// src/accounts/secret.rs

//! Credential records in `etc/shadow` form
//!
//! The secret field is either the bare secret or `$<scheme>$<salt>$<digest>`,
//! where the digest is the lowercase hex hash of `salt || secret`.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::io;

const SALT_SIZE: usize = 16;

/// Hash algorithms accepted in the salted form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Sha256,
    Sha512,
}

impl Scheme {
    pub fn as_str(&self) -> &str {
        match self {
            Scheme::Sha256 => "sha256",
            Scheme::Sha512 => "sha512",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "sha256" => Some(Scheme::Sha256),
            "sha512" => Some(Scheme::Sha512),
            _ => None,
        }
    }

    fn digest(&self, salt: &str, secret: &str) -> String {
        match self {
            Scheme::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(salt.as_bytes());
                hasher.update(secret.as_bytes());
                format!("{:x}", hasher.finalize())
            }
            Scheme::Sha512 => {
                let mut hasher = Sha512::new();
                hasher.update(salt.as_bytes());
                hasher.update(secret.as_bytes());
                format!("{:x}", hasher.finalize())
            }
        }
    }
}

/// A stored secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Secret {
    Plain(String),
    Hashed {
        scheme: Scheme,
        salt: String,
        digest: String,
    },
    /// `$`-prefixed value in a scheme this store cannot verify
    Unsupported(String),
}

impl Secret {
    pub fn parse(field: &str) -> Self {
        if !field.starts_with('$') {
            return Secret::Plain(field.to_string());
        }

        let parts: Vec<&str> = field.split('$').collect();
        match parts.as_slice() {
            ["", scheme, salt, digest] => match Scheme::from_name(scheme) {
                Some(scheme) => Secret::Hashed {
                    scheme,
                    salt: salt.to_string(),
                    digest: digest.to_string(),
                },
                None => Secret::Unsupported(field.to_string()),
            },
            _ => Secret::Unsupported(field.to_string()),
        }
    }

    /// Salted SHA-256 form with a fresh random salt
    pub fn hashed(secret: &str) -> Result<Self> {
        let scheme = Scheme::Sha256;
        let salt = generate_salt()?;
        let digest = scheme.digest(&salt, secret);
        Ok(Secret::Hashed { scheme, salt, digest })
    }

    /// Plain equality, or equality of digests for the salted form
    pub fn verify(&self, candidate: &str) -> bool {
        match self {
            Secret::Plain(secret) => secret == candidate,
            Secret::Hashed { scheme, salt, digest } => scheme.digest(salt, candidate) == *digest,
            Secret::Unsupported(_) => false,
        }
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Secret::Plain(secret) => write!(f, "{}", secret),
            Secret::Hashed { scheme, salt, digest } => {
                write!(f, "${}${}${}", scheme.as_str(), salt, digest)
            }
            Secret::Unsupported(raw) => write!(f, "{}", raw),
        }
    }
}

/// One `etc/shadow` line. Trailing fields are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub secret: Secret,
    pub extra: Vec<String>,
}

impl Credential {
    pub fn new(username: &str, secret: Secret) -> Self {
        Self {
            username: username.to_string(),
            secret,
            extra: Vec::new(),
        }
    }

    /// Returns `None` for lines without a secret field
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split(':');
        let username = fields.next()?;
        let secret = fields.next()?;
        Some(Self {
            username: username.to_string(),
            secret: Secret::parse(secret),
            extra: fields.map(str::to_string).collect(),
        })
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.username, self.secret)?;
        for field in &self.extra {
            write!(f, ":{}", field)?;
        }
        Ok(())
    }
}

/// Secrets share the record file with `:` separators and one line per user
pub fn validate_secret(secret: &str) -> Result<()> {
    if secret.contains([':', '\n', '\r']) || secret.starts_with('$') {
        return Err(Error::InvalidArgument(
            "secret may not contain ':' or line breaks, or start with '$'".to_string(),
        ));
    }
    Ok(())
}

/// Hex-encoded bytes from the operating system's secure random source
fn generate_salt() -> Result<String> {
    let mut buff = [0u8; SALT_SIZE];
    getrandom::getrandom(&mut buff).map_err(|e| io::Error::other(e.to_string()))?;
    Ok(buff.iter().map(|b| format!("{:02x}", b)).collect())
}
