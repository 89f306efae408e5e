use std::collections::BTreeSet;

use waypoint_core::Authorizer;

/// Authorizes privileged operations whose hash the operator passed in.
#[derive(Debug, Clone, Default)]
pub struct HashAllowList {
    hashes: BTreeSet<String>,
}

impl HashAllowList {
    pub fn new<I, S>(hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hashes: hashes
                .into_iter()
                .map(|h| h.as_ref().trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

impl Authorizer for HashAllowList {
    fn is_authorized(&self, operation_hash: &str) -> bool {
        self.hashes.contains(&operation_hash.to_ascii_lowercase())
    }
}
