//! The per-package reconciliation decision procedure.

use serde_json::Value;
use tracing::debug;

use crate::check::status::Status;
use crate::check::typed::{TypedSource, is_typed_via_manifest, typed_source_from_files};
use crate::dt::descriptor::{NonNpm, TypingsDescriptor};
use crate::registry::error::RegistryError;
use crate::registry::files::FileLister;
use crate::registry::npm::{NpmClient, Specifier};
use crate::registry::types::Manifest;
use crate::version::{DeclaredVersion, classify_out_of_date, parse_version};

/// Classifies one typings package against its npm counterpart.
///
/// Every failure except [`RegistryError::Fatal`] is folded into a
/// [`Status`] so one broken package never stops the others; a fatal error
/// propagates and aborts the whole run.
pub async fn reconcile(
    descriptor: &TypingsDescriptor,
    prior: Option<&Status>,
    npm: &NpmClient,
    files: &FileLister,
) -> Result<Status, RegistryError> {
    match compute(descriptor, prior, npm, files).await {
        Ok(status) => Ok(status),
        Err(error @ RegistryError::Fatal(_)) => Err(error),
        Err(error) => {
            let status = fold_error(error);
            debug!(
                "{}: classified {} from registry failure",
                descriptor.sub_directory_path,
                status.kind()
            );
            Ok(status)
        }
    }
}

fn fold_error(error: RegistryError) -> Status {
    match error {
        RegistryError::NotFound(_) => Status::NotInRegistry,
        RegistryError::NoMatchingVersion {
            has_any_versions: false,
            ..
        } => Status::Unpublished,
        RegistryError::NoMatchingVersion { .. } => Status::MissingVersion,
        RegistryError::Fetch { .. } | RegistryError::Parse(_) | RegistryError::Fatal(_) => {
            Status::Error {
                message: error.to_string(),
            }
        }
    }
}

async fn compute(
    descriptor: &TypingsDescriptor,
    prior: Option<&Status>,
    npm: &NpmClient,
    files: &FileLister,
) -> Result<Status, RegistryError> {
    match descriptor.non_npm {
        NonNpm::Conflict => return Ok(Status::Conflict),
        NonNpm::Yes => return Ok(Status::NonNpm),
        NonNpm::No => {}
    }

    let declared = DeclaredVersion {
        major: descriptor.major,
        minor: descriptor.minor,
    };
    let specifier = if descriptor.is_latest {
        Specifier::Latest
    } else if descriptor.major == 0 {
        Specifier::MajorMinor(0, descriptor.minor)
    } else {
        Specifier::Major(descriptor.major)
    };

    let name = descriptor.unescaped_name.as_str();
    let mut manifest = npm.resolve(name, &specifier).await?;

    // The latest tag can trail the true newest release. When it resolves
    // behind the declared line, prefer the highest compatible version so the
    // package is not misreported as too-new.
    if specifier == Specifier::Latest
        && let Some(resolved) = parse_version(&manifest.version)
        && (resolved.major, resolved.minor) < (declared.major, declared.minor)
        && let Some(better) = npm
            .highest_matching(name, declared.major, declared.minor)
            .await?
    {
        debug!(
            "{name}: latest tag at {} trails declared {declared}, using {}",
            manifest.version, better.version
        );
        manifest = better;
    }

    let latest = npm.latest_manifest(name).await?;
    let is_deprecated =
        manifest.is_deprecated() || latest.as_ref().is_some_and(Manifest::is_deprecated);

    // Upstream unchanged since the prior run: reuse the record wholesale,
    // skipping the file-listing fetch entirely.
    if let Some(
        prior @ Status::Found {
            current,
            is_deprecated: prior_deprecated,
            ..
        },
    ) = prior
        && *current == manifest.version
        && *prior_deprecated == is_deprecated
    {
        debug!(
            "{}: upstream still at {current}, reusing prior status",
            descriptor.sub_directory_path
        );
        return Ok(prior.clone());
    }

    let resolved = parse_version(&manifest.version).ok_or_else(|| {
        RegistryError::Parse(format!(
            "{name}: unparseable resolved version {:?}",
            manifest.version
        ))
    })?;
    let out_of_date = classify_out_of_date(declared, &resolved, descriptor.is_latest);

    let has_types = if is_typed_via_manifest(&manifest) {
        TypedSource::PackageJson
    } else {
        let listing = files.list_files(name, &manifest.version).await?;
        typed_source_from_files(&listing, &manifest)
    };

    let package_json_type_matches = declared_module_type(&descriptor.package_json_type)
        == declared_module_type(&manifest.package_json_type);

    Ok(Status::Found {
        current: manifest.version,
        out_of_date,
        has_types,
        package_json_type_matches,
        exports_similar: exports_similar(descriptor.exports.as_ref(), manifest.exports.as_ref()),
        is_deprecated,
    })
}

fn declared_module_type(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("commonjs")
}

/// Structural shape comparison of two export maps: same JS typeof, and for
/// plain objects the same key set. Value types and array contents are
/// deliberately not compared; only top-level key-shape drift matters.
fn exports_similar(declared: Option<&Value>, upstream: Option<&Value>) -> bool {
    match (declared, upstream) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            if js_typeof(a) != js_typeof(b) {
                return false;
            }
            match (a, b) {
                (Value::Object(a), Value::Object(b)) => {
                    a.len() == b.len() && a.keys().all(|key| b.contains_key(key))
                }
                _ => true,
            }
        }
        _ => false,
    }
}

fn js_typeof(value: &Value) -> &'static str {
    match value {
        Value::Null | Value::Array(_) | Value::Object(_) => "object",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
    }
}
