//! Decides whether an npm package already ships its own type declarations.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::types::Manifest;

/// Where a package's own declarations were found.
///
/// `Entrypoint` means a declaration file sits exactly where the module
/// resolver would look for the package's JS entrypoints; `Other` means
/// declarations exist somewhere in the tree but may not be wired up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypedSource {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "package.json")]
    PackageJson,
    #[serde(rename = "entrypoint")]
    Entrypoint,
    #[serde(rename = "other")]
    Other,
}

/// True if the manifest itself declares types: a `types`/`typings` field, or
/// a `types` condition anywhere in the export map, nested conditions
/// included.
pub fn is_typed_via_manifest(manifest: &Manifest) -> bool {
    if manifest.types.is_some() || manifest.typings.is_some() {
        return true;
    }
    manifest
        .exports
        .as_ref()
        .is_some_and(exports_declare_types)
}

fn exports_declare_types(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(key, v)| (key == "types" && v.is_string()) || exports_declare_types(v)),
        Value::Array(items) => items.iter().any(exports_declare_types),
        _ => false,
    }
}

/// Every string leaf of an export map is an import target, however deeply it
/// sits under subpath and conditional nesting.
fn collect_string_leaves(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(target) => out.push(target.clone()),
        Value::Object(map) => {
            for v in map.values() {
                collect_string_leaves(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_string_leaves(v, out);
            }
        }
        _ => {}
    }
}

/// Classifies the file listing of a package whose manifest gave no typing
/// signal. An entrypoint match always wins over a stray declaration file.
pub fn typed_source_from_files(files: &[String], manifest: &Manifest) -> TypedSource {
    let candidates = entrypoint_declaration_candidates(manifest);
    if files.iter().any(|f| candidates.contains(f.as_str())) {
        return TypedSource::Entrypoint;
    }
    if files.iter().any(|f| is_declaration_file(f)) {
        return TypedSource::Other;
    }
    TypedSource::None
}

pub fn is_declaration_file(path: &str) -> bool {
    path.ends_with(".d.ts") || path.ends_with(".d.mts") || path.ends_with(".d.cts")
}

/// The declaration files that would sit next to this package's actual JS
/// entrypoints, as absolute POSIX paths.
///
/// Entrypoints come from the string leaves of `exports` when present,
/// otherwise from `main` (defaulting to index.js) plus the conventional
/// index.d.ts. Source extensions map to their declaration counterparts
/// (.js -> .d.ts, .mjs -> .d.mts, .cjs -> .d.cts); an extensionless target
/// admits both `X.d.ts` and `X/index.d.ts`.
pub fn entrypoint_declaration_candidates(manifest: &Manifest) -> BTreeSet<String> {
    let mut targets = Vec::new();
    match &manifest.exports {
        Some(exports) => collect_string_leaves(exports, &mut targets),
        None => {
            targets.push(
                manifest
                    .main
                    .clone()
                    .unwrap_or_else(|| "index.js".to_string()),
            );
            targets.push("index.d.ts".to_string());
        }
    }

    let mut candidates = BTreeSet::new();
    for target in targets {
        let rel = target.trim_start_matches("./").trim_start_matches('/');
        if rel.is_empty() {
            continue;
        }
        if is_declaration_file(rel) {
            candidates.insert(format!("/{rel}"));
        } else if let Some(stem) = rel.strip_suffix(".js") {
            candidates.insert(format!("/{stem}.d.ts"));
        } else if let Some(stem) = rel.strip_suffix(".mjs") {
            candidates.insert(format!("/{stem}.d.mts"));
        } else if let Some(stem) = rel.strip_suffix(".cjs") {
            candidates.insert(format!("/{stem}.d.cts"));
        } else {
            candidates.insert(format!("/{rel}.d.ts"));
            candidates.insert(format!("/{rel}/index.d.ts"));
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn manifest(value: serde_json::Value) -> Manifest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn manifest_types_field_is_a_typing_signal() {
        assert!(is_typed_via_manifest(&manifest(
            json!({"version": "1.0.0", "types": "./index.d.ts"})
        )));
        assert!(is_typed_via_manifest(&manifest(
            json!({"version": "1.0.0", "typings": "./index.d.ts"})
        )));
        assert!(!is_typed_via_manifest(&manifest(
            json!({"version": "1.0.0", "main": "./index.js"})
        )));
    }

    #[test]
    fn nested_exports_types_condition_is_detected() {
        let typed = manifest(json!({
            "version": "1.0.0",
            "exports": {
                ".": {
                    "import": {"types": "./index.d.mts", "default": "./index.mjs"},
                    "require": "./index.cjs"
                }
            }
        }));
        assert!(is_typed_via_manifest(&typed));

        let untyped = manifest(json!({
            "version": "1.0.0",
            "exports": {".": {"import": "./index.mjs", "require": "./index.cjs"}}
        }));
        assert!(!is_typed_via_manifest(&untyped));
    }

    #[test]
    fn a_types_key_with_a_non_string_value_is_not_a_signal() {
        let weird = manifest(json!({
            "version": "1.0.0",
            "exports": {"types": {"whatever": 1}}
        }));
        assert!(!is_typed_via_manifest(&weird));
    }

    #[rstest]
    #[case("./index.js", "/index.d.ts")]
    #[case("./index.mjs", "/index.d.mts")]
    #[case("./index.cjs", "/index.d.cts")]
    fn source_extensions_map_to_declaration_extensions(
        #[case] target: &str,
        #[case] expected: &str,
    ) {
        let m = manifest(json!({"version": "1.0.0", "exports": {".": target}}));
        let candidates = entrypoint_declaration_candidates(&m);
        assert!(candidates.contains(expected), "{candidates:?}");
    }

    #[test]
    fn nested_conditional_exports_yield_candidates_for_every_leaf() {
        let m = manifest(json!({
            "version": "1.0.0",
            "exports": {
                ".": {
                    "import": {"default": "./dist/index.mjs"},
                    "require": ["./dist/index.cjs", {"default": "./fallback.js"}]
                },
                "./util": "./dist/util.js"
            }
        }));
        let candidates = entrypoint_declaration_candidates(&m);
        assert!(candidates.contains("/dist/index.d.mts"), "{candidates:?}");
        assert!(candidates.contains("/dist/index.d.cts"), "{candidates:?}");
        assert!(candidates.contains("/fallback.d.ts"), "{candidates:?}");
        assert!(candidates.contains("/dist/util.d.ts"), "{candidates:?}");

        let files = vec!["/dist/index.d.mts".to_string()];
        assert_eq!(typed_source_from_files(&files, &m), TypedSource::Entrypoint);
    }

    #[test]
    fn extensionless_targets_admit_both_candidate_shapes() {
        let m = manifest(json!({"version": "1.0.0", "exports": {"./lib": "./lib"}}));
        let candidates = entrypoint_declaration_candidates(&m);
        assert!(candidates.contains("/lib.d.ts"));
        assert!(candidates.contains("/lib/index.d.ts"));
    }

    #[test]
    fn main_and_default_index_drive_candidates_without_exports() {
        let m = manifest(json!({"version": "1.0.0", "main": "lib/main.js"}));
        let candidates = entrypoint_declaration_candidates(&m);
        assert!(candidates.contains("/lib/main.d.ts"));
        assert!(candidates.contains("/index.d.ts"));

        let bare = manifest(json!({"version": "1.0.0"}));
        let candidates = entrypoint_declaration_candidates(&bare);
        assert!(candidates.contains("/index.d.ts"));
    }

    #[test]
    fn entrypoint_match_wins_over_other_declarations() {
        let m = manifest(json!({"version": "1.0.0", "main": "index.js"}));

        let only_stray = vec!["/lib/other.d.ts".to_string()];
        assert_eq!(typed_source_from_files(&only_stray, &m), TypedSource::Other);

        let with_entrypoint = vec![
            "/lib/other.d.ts".to_string(),
            "/index.d.ts".to_string(),
        ];
        assert_eq!(
            typed_source_from_files(&with_entrypoint, &m),
            TypedSource::Entrypoint
        );

        let untyped = vec!["/index.js".to_string(), "/README.md".to_string()];
        assert_eq!(typed_source_from_files(&untyped, &m), TypedSource::None);
    }

    #[rstest]
    #[case("/index.d.ts", true)]
    #[case("/index.d.mts", true)]
    #[case("/index.d.cts", true)]
    #[case("/index.ts", false)]
    #[case("/index.js", false)]
    fn declaration_file_globs(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(is_declaration_file(path), expected);
    }
}
