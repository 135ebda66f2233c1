//! Walks a DefinitelyTyped checkout into typings descriptors.
//!
//! Each directory under `types/` is one package; subdirectories named
//! `v{major}` or `v{major}.{minor}` hold older declared lines. The package's
//! own package.json carries the declared version, the `nonNpm` marker, the
//! module type, and the export map.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::dt::descriptor::{NonNpm, TypingsDescriptor, unmangle_name};

static VERSION_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v(\d+)(?:\.(\d+))?$").expect("version dir pattern is valid"));

/// The subset of a DT package.json this audit reads.
#[derive(Debug, Deserialize)]
struct DtPackageJson {
    name: Option<String>,
    version: Option<String>,
    #[serde(rename = "nonNpm")]
    non_npm: Option<Value>,
    #[serde(rename = "type")]
    package_json_type: Option<String>,
    exports: Option<Value>,
}

/// Enumerates every typings descriptor in a DefinitelyTyped checkout.
///
/// Packages with a missing or malformed package.json are logged and skipped
/// rather than failing the whole run.
pub fn enumerate_checkout(checkout: &Path) -> Result<Vec<TypingsDescriptor>> {
    let types_root = checkout.join("types");
    let entries = fs::read_dir(&types_root)
        .with_context(|| format!("cannot read {}", types_root.display()))?;

    let mut descriptors = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let dir_name = entry.file_name().to_string_lossy().into_owned();
        if dir_name.starts_with('.') {
            continue;
        }

        // The unversioned "current" variant.
        if let Some(descriptor) = read_package(&entry.path(), &dir_name, &dir_name, true) {
            descriptors.push(descriptor);
        }

        // Older declared lines live in v{major}[.{minor}] subdirectories.
        for sub in fs::read_dir(entry.path())? {
            let sub = sub?;
            if !sub.file_type()?.is_dir() {
                continue;
            }
            let sub_name = sub.file_name().to_string_lossy().into_owned();
            if !VERSION_DIR.is_match(&sub_name) {
                continue;
            }
            let sub_path = format!("{dir_name}/{sub_name}");
            if let Some(descriptor) = read_package(&sub.path(), &dir_name, &sub_path, false) {
                descriptors.push(descriptor);
            }
        }
    }

    debug!("enumerated {} typings descriptors", descriptors.len());
    Ok(descriptors)
}

fn read_package(
    dir: &Path,
    dir_name: &str,
    sub_directory_path: &str,
    is_latest: bool,
) -> Option<TypingsDescriptor> {
    let manifest_path = dir.join("package.json");
    let raw = match fs::read_to_string(&manifest_path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("skipping {sub_directory_path}: cannot read package.json: {e}");
            return None;
        }
    };
    let parsed: DtPackageJson = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("skipping {sub_directory_path}: malformed package.json: {e}");
            return None;
        }
    };

    let version = parsed.version.unwrap_or_default();
    let Some((major, minor)) = declared_major_minor(&version) else {
        warn!("skipping {sub_directory_path}: unparseable declared version {version:?}");
        return None;
    };

    Some(TypingsDescriptor {
        unescaped_name: unmangle_name(dir_name),
        full_npm_name: parsed
            .name
            .unwrap_or_else(|| format!("@types/{dir_name}")),
        sub_directory_path: sub_directory_path.to_string(),
        major,
        minor,
        is_latest,
        non_npm: non_npm_from_value(parsed.non_npm.as_ref()),
        package_json_type: parsed.package_json_type,
        exports: parsed.exports,
    })
}

fn declared_major_minor(version: &str) -> Option<(u64, u64)> {
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

fn non_npm_from_value(value: Option<&Value>) -> NonNpm {
    match value {
        Some(Value::Bool(true)) => NonNpm::Yes,
        Some(Value::String(s)) if s == "conflict" => NonNpm::Conflict,
        _ => NonNpm::No,
    }
}
