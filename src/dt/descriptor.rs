//! Typings package identity as discovered in a DefinitelyTyped checkout.

use serde_json::Value;

/// Whether a typings package tracks a real npm package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NonNpm {
    /// Tracks a real npm package.
    #[default]
    No,
    /// Intentionally has no npm counterpart.
    Yes,
    /// Name intentionally collides with an unrelated npm package.
    Conflict,
}

/// One DT package+version entry to be reconciled against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingsDescriptor {
    /// Real npm package name, scope un-mangled.
    pub unescaped_name: String,
    /// The `@types/...` package name.
    pub full_npm_name: String,
    /// Relative path identifying this package+version; unique and stable
    /// across runs, used as the cache key.
    pub sub_directory_path: String,
    pub major: u64,
    pub minor: u64,
    /// True for the unversioned "current" variant of the package.
    pub is_latest: bool,
    pub non_npm: NonNpm,
    /// Declared module type, for drift comparison against upstream.
    pub package_json_type: Option<String>,
    /// Declared export map, for shape comparison against upstream.
    pub exports: Option<Value>,
}

/// DT mangles scoped package names into directory names: the directory
/// `foo__bar` holds types for `@foo/bar`.
pub fn unmangle_name(directory_name: &str) -> String {
    match directory_name.split_once("__") {
        Some((scope, rest)) => format!("@{scope}/{rest}"),
        None => directory_name.to_string(),
    }
}
