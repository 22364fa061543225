//! Signature algorithm registry
//!
//! Fixed set of algorithm identifiers a crypto policy may refer to. Lookups
//! are case-insensitive and resolve aliases to one canonical name; names
//! outside the registry are never recognized, however well-formed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Recognized signature algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// Edwards-curve signatures over Curve25519
    Ed25519,
    /// ECDSA over NIST P-256
    NistP256,
    /// RSA with 4096-bit modulus
    Rsa4096,
    /// FIPS 204 module-lattice signatures, parameter set 65
    MlDsa65,
    /// FIPS 205 stateless hash-based signatures, 128-bit small
    SlhDsa128s,
}

impl SignatureAlgorithm {
    /// Every registered algorithm
    pub const ALL: [SignatureAlgorithm; 5] = [
        SignatureAlgorithm::Ed25519,
        SignatureAlgorithm::NistP256,
        SignatureAlgorithm::Rsa4096,
        SignatureAlgorithm::MlDsa65,
        SignatureAlgorithm::SlhDsa128s,
    ];

    /// Canonical identifier used in policies
    pub fn canonical_name(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Ed25519 => "ED25519",
            SignatureAlgorithm::NistP256 => "NISTP256",
            SignatureAlgorithm::Rsa4096 => "RSA4096",
            SignatureAlgorithm::MlDsa65 => "ML-DSA-65",
            SignatureAlgorithm::SlhDsa128s => "SLH-DSA-128S",
        }
    }

    /// Alternative spellings accepted on input
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            SignatureAlgorithm::Ed25519 => &[],
            SignatureAlgorithm::NistP256 => &["P-256", "SECP256R1", "ES256"],
            SignatureAlgorithm::Rsa4096 => &["RSA-4096", "RS4096"],
            SignatureAlgorithm::MlDsa65 => &["MLDSA65"],
            SignatureAlgorithm::SlhDsa128s => &["SLHDSA128S"],
        }
    }

    /// Whether the algorithm is believed to resist quantum attacks
    pub fn is_post_quantum(&self) -> bool {
        matches!(
            self,
            SignatureAlgorithm::MlDsa65 | SignatureAlgorithm::SlhDsa128s
        )
    }

    /// Resolve a name or alias, ignoring case and surrounding whitespace
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|alg| {
            alg.canonical_name().eq_ignore_ascii_case(name)
                || alg.aliases().iter().any(|a| a.eq_ignore_ascii_case(name))
        })
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unrecognized signature algorithm: {}", s))
    }
}

/// Case-insensitive registry lookup
pub fn is_recognized_algorithm(name: &str) -> bool {
    SignatureAlgorithm::from_name(name).is_some()
}

/// Normalize an algorithm name for set comparisons.
///
/// Registered names and aliases collapse to the canonical identifier;
/// anything else is upper-cased so comparisons stay case-insensitive.
pub fn canonical_name(name: &str) -> String {
    match SignatureAlgorithm::from_name(name) {
        Some(alg) => alg.canonical_name().to_string(),
        None => name.trim().to_ascii_uppercase(),
    }
}
