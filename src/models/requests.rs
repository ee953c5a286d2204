//! Request DTOs for the admin API

use serde::Deserialize;

/// Query string for `GET /keys`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeysQuery {
    /// Only list keys in this namespace
    #[serde(default)]
    pub namespace: Option<String>,
}

impl KeysQuery {
    /// The namespace filter, treating a blank value as absent.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace
            .as_deref()
            .map(str::trim)
            .filter(|namespace| !namespace.is_empty())
    }
}
