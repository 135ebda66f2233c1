//! npm registry client: packument fetch and manifest-by-specifier resolution.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use semver::Version;
use tracing::debug;

use crate::registry::error::RegistryError;
use crate::registry::limiter::PoliteClient;
use crate::registry::types::{Manifest, Packument};
use crate::version::parse_version;

/// Version selection passed to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specifier {
    Latest,
    /// Highest stable release on a major line.
    Major(u64),
    /// Highest stable release on a major.minor line; used for 0.x where
    /// minor bumps are breaking.
    MajorMinor(u64, u64),
    Exact(String),
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Specifier::Latest => write!(f, "latest"),
            Specifier::Major(major) => write!(f, "{major}"),
            Specifier::MajorMinor(major, minor) => write!(f, "{major}.{minor}"),
            Specifier::Exact(version) => write!(f, "{version}"),
        }
    }
}

/// Client for an npm-compatible registry.
///
/// Packuments are memoized for the length of the run so the too-new
/// re-resolution and the deprecation check reuse the original fetch.
pub struct NpmClient {
    http: Arc<PoliteClient>,
    base_url: String,
    packuments: Mutex<HashMap<String, Arc<Packument>>>,
}

impl NpmClient {
    pub fn new(http: Arc<PoliteClient>, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            packuments: Mutex::new(HashMap::new()),
        }
    }

    /// Encode package name for URL (handles scoped packages).
    fn encode_package_name(package_name: &str) -> String {
        if package_name.starts_with('@') {
            // Scoped package: @scope/name -> @scope%2Fname
            package_name.replace('/', "%2F")
        } else {
            package_name.to_string()
        }
    }

    async fn packument(&self, package_name: &str) -> Result<Arc<Packument>, RegistryError> {
        if let Some(doc) = self
            .packuments
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(package_name)
        {
            return Ok(doc.clone());
        }

        let url = format!(
            "{}/{}",
            self.base_url,
            Self::encode_package_name(package_name)
        );
        let doc = match self.http.get_json::<Packument>(&url).await {
            Ok(Some(doc)) => Arc::new(doc),
            Ok(None) => return Err(RegistryError::NotFound(package_name.to_string())),
            // A 524 here means the registry itself is timing out; there is no
            // point grinding through the rest of the corpus.
            Err(RegistryError::Fetch {
                message,
                status: Some(524),
            }) => return Err(RegistryError::Fatal(message)),
            Err(e) => return Err(e),
        };

        self.packuments
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(package_name.to_string(), doc.clone());
        Ok(doc)
    }

    /// Resolves the manifest a specifier selects.
    pub async fn resolve(
        &self,
        package_name: &str,
        specifier: &Specifier,
    ) -> Result<Manifest, RegistryError> {
        let doc = self.packument(package_name).await?;

        let manifest = match specifier {
            Specifier::Latest => doc
                .dist_tags
                .get("latest")
                .and_then(|version| doc.versions.get(version))
                .or_else(|| {
                    // No usable latest tag; fall back to the semantic max.
                    Self::highest_in_line(&doc, |_| true)
                }),
            Specifier::Exact(version) => doc.versions.get(version),
            Specifier::Major(major) => {
                Self::highest_in_line(&doc, |v| v.pre.is_empty() && v.major == *major)
            }
            Specifier::MajorMinor(major, minor) => Self::highest_in_line(&doc, |v| {
                v.pre.is_empty() && v.major == *major && v.minor == *minor
            }),
        };

        match manifest {
            Some(manifest) => {
                debug!(
                    "{package_name}@{specifier} resolved to {}",
                    manifest.version
                );
                Ok(manifest.clone())
            }
            None => Err(RegistryError::NoMatchingVersion {
                name: package_name.to_string(),
                specifier: specifier.to_string(),
                has_any_versions: !doc.versions.is_empty(),
            }),
        }
    }

    /// Highest published version, prereleases included, compatible with the
    /// declared major.minor (`^major.minor` semantics, so for 0.x the minor
    /// must match exactly).
    ///
    /// Used when the latest tag resolves behind the declared types version:
    /// the real newest release may be published but not tagged.
    pub async fn highest_matching(
        &self,
        package_name: &str,
        major: u64,
        minor: u64,
    ) -> Result<Option<Manifest>, RegistryError> {
        let doc = self.packument(package_name).await?;
        let found = Self::highest_in_line(&doc, |v| {
            v.major == major
                && if major == 0 {
                    v.minor == minor
                } else {
                    v.minor >= minor
                }
        });
        Ok(found.cloned())
    }

    /// The manifest the latest tag points at, if any. Needed even for pinned
    /// lines: a package can be deprecated at its tip while the audited line
    /// is not.
    pub async fn latest_manifest(
        &self,
        package_name: &str,
    ) -> Result<Option<Manifest>, RegistryError> {
        let doc = self.packument(package_name).await?;
        Ok(doc
            .dist_tags
            .get("latest")
            .and_then(|version| doc.versions.get(version))
            .cloned())
    }

    fn highest_in_line<'a>(
        doc: &'a Packument,
        predicate: impl Fn(&Version) -> bool,
    ) -> Option<&'a Manifest> {
        doc.versions
            .iter()
            .filter_map(|(raw, manifest)| {
                parse_version(raw)
                    .filter(|v| predicate(v))
                    .map(|v| (v, manifest))
            })
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, manifest)| manifest)
    }
}
