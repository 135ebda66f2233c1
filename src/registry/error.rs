use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("package not found: {0}")]
    NotFound(String),

    #[error("no version of {name} matches {specifier}")]
    NoMatchingVersion {
        name: String,
        specifier: String,
        /// Distinguishes an unpublished package (no versions at all) from a
        /// merely unsatisfiable specifier.
        has_any_versions: bool,
    },

    #[error("fetch failed: {message}")]
    Fetch {
        message: String,
        status: Option<u16>,
    },

    #[error("invalid response: {0}")]
    Parse(String),

    /// The registry itself is unreachable; aborts the whole run.
    #[error("registry unreachable: {0}")]
    Fatal(String),
}

impl From<reqwest::Error> for RegistryError {
    fn from(error: reqwest::Error) -> Self {
        RegistryError::Fetch {
            status: error.status().map(|s| s.as_u16()),
            message: error.to_string(),
        }
    }
}
