//! Recognises known-bad dependency pins in a manifest and rewrites them.
//!
//! Matching is exact substring matching against an ordered signature table.
//! The first signature present in the manifest wins; independent matches are
//! never combined into one detection.

use tracing::warn;

/// A vulnerable pin and the pin that replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub package: String,
    pub vulnerable: String,
    pub fixed: String,
    pub description: String,
}

impl Signature {
    pub fn new(
        package: impl Into<String>,
        vulnerable: impl Into<String>,
        fixed: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            vulnerable: vulnerable.into(),
            fixed: fixed.into(),
            description: description.into(),
        }
    }
}

/// Signatures shipped with this release.
pub fn builtin_signatures() -> Vec<Signature> {
    vec![Signature::new(
        "requests",
        "requests==2.25.0",
        "requests==2.31.0",
        "Vulnerability in 'requests' < 2.31.0 (CVE-2023-32681) fixed.",
    )]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub signature: Signature,
    /// The full manifest with every occurrence of the vulnerable pin replaced.
    pub patched: String,
    pub occurrences: usize,
}

impl Detection {
    pub fn description(&self) -> &str {
        &self.signature.description
    }
}

#[derive(Debug, Clone)]
pub struct Detector {
    signatures: Vec<Signature>,
}

impl Default for Detector {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Detector {
    pub fn builtin() -> Self {
        Self::new(builtin_signatures())
    }

    /// Signatures with an empty match token, or whose replacement still
    /// contains the match token, are dropped: either would rewrite forever.
    pub fn new(signatures: Vec<Signature>) -> Self {
        let signatures = signatures
            .into_iter()
            .filter(|sig| {
                let usable = !sig.vulnerable.is_empty() && !sig.fixed.contains(&sig.vulnerable);
                if !usable {
                    warn!(
                        package = %sig.package,
                        "ignoring signature '{}' -> '{}': replacement would match again",
                        sig.vulnerable,
                        sig.fixed
                    );
                }
                usable
            })
            .collect();
        Self { signatures }
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Returns the first matching signature's rewrite, or `None` if no
    /// signature's exact token occurs in `manifest`.
    pub fn detect(&self, manifest: &str) -> Option<Detection> {
        self.signatures.iter().find_map(|sig| {
            let occurrences = manifest.matches(sig.vulnerable.as_str()).count();
            (occurrences > 0).then(|| Detection {
                signature: sig.clone(),
                patched: manifest.replace(sig.vulnerable.as_str(), &sig.fixed),
                occurrences,
            })
        })
    }
}
