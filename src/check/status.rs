//! Classification results and the persisted per-package record.

use serde::{Deserialize, Serialize};

use crate::check::typed::TypedSource;
use crate::dt::descriptor::TypingsDescriptor;
use crate::version::OutOfDate;

/// Bumped whenever the shape of [`Status`] changes. Cached records carrying
/// any other value are recomputed from scratch, never migrated.
pub const CACHE_SCHEMA_VERSION: u32 = 4;

/// The outcome of reconciling one typings package against the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Status {
    /// Real package located and a version resolved.
    #[serde(rename_all = "camelCase")]
    Found {
        current: String,
        out_of_date: OutOfDate,
        has_types: TypedSource,
        package_json_type_matches: bool,
        exports_similar: bool,
        is_deprecated: bool,
    },
    /// Package name has no registry entry.
    NotInRegistry,
    /// Package exists but has zero published versions.
    Unpublished,
    /// Package exists but no version satisfies the requested specifier.
    MissingVersion,
    /// Descriptor declares itself as not tracking an npm package.
    NonNpm,
    /// Descriptor intentionally shadows an unrelated npm package.
    Conflict,
    /// Transient failure; recorded so the next run retries it.
    Error { message: String },
}

impl Status {
    pub fn kind(&self) -> &'static str {
        match self {
            Status::Found { .. } => "found",
            Status::NotInRegistry => "not-in-registry",
            Status::Unpublished => "unpublished",
            Status::MissingVersion => "missing-version",
            Status::NonNpm => "non-npm",
            Status::Conflict => "conflict",
            Status::Error { .. } => "error",
        }
    }
}

/// One persisted JSON document per descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedRecord {
    pub schema_version: u32,
    /// The declared "{major}.{minor}" this record was computed for; a
    /// mismatch fences the record off exactly like a schema bump.
    pub types_version: String,
    pub full_npm_name: String,
    pub unescaped_name: String,
    pub sub_directory_path: String,
    pub status: Status,
}

impl CachedRecord {
    pub fn new(descriptor: &TypingsDescriptor, status: Status) -> Self {
        Self {
            schema_version: CACHE_SCHEMA_VERSION,
            types_version: format!("{}.{}", descriptor.major, descriptor.minor),
            full_npm_name: descriptor.full_npm_name.clone(),
            unescaped_name: descriptor.unescaped_name.clone(),
            sub_directory_path: descriptor.sub_directory_path.clone(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_kinds_serialize_as_kebab_case_tags() {
        let status = Status::NotInRegistry;
        assert_eq!(
            serde_json::to_value(&status).unwrap()["kind"],
            "not-in-registry"
        );

        let status = Status::Error {
            message: "timed out".to_string(),
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["kind"], "error");
        assert_eq!(value["message"], "timed out");
    }

    #[test]
    fn found_fields_serialize_as_camel_case() {
        let status = Status::Found {
            current: "4.17.21".to_string(),
            out_of_date: OutOfDate::None,
            has_types: TypedSource::PackageJson,
            package_json_type_matches: true,
            exports_similar: false,
            is_deprecated: false,
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["kind"], "found");
        assert_eq!(value["current"], "4.17.21");
        assert_eq!(value["outOfDate"], "none");
        assert_eq!(value["hasTypes"], "package.json");
        assert_eq!(value["packageJsonTypeMatches"], true);
        assert_eq!(value["exportsSimilar"], false);
        assert_eq!(value["isDeprecated"], false);
    }

    #[test]
    fn status_round_trips_through_json() {
        let status = Status::Found {
            current: "2.1.0".to_string(),
            out_of_date: OutOfDate::TooNew,
            has_types: TypedSource::Entrypoint,
            package_json_type_matches: false,
            exports_similar: true,
            is_deprecated: true,
        };
        let json = serde_json::to_string(&status).unwrap();
        let back: Status = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }
}
