//! Renders the cached records into a human-readable markdown report.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, bail};
use tracing::info;

use crate::cache::StatusCache;
use crate::check::status::{CachedRecord, Status};
use crate::check::typed::TypedSource;
use crate::version::OutOfDate;

pub fn generate_report(input_cache: &StatusCache, out_dir: &Path) -> anyhow::Result<()> {
    let mut records = input_cache.load_all().context("while reading the cache")?;
    if records.is_empty() {
        bail!("no cached records found; run `dt-audit check` first");
    }
    records.sort_by(|a, b| a.sub_directory_path.cmp(&b.sub_directory_path));

    let report = render_markdown(&records);
    fs::create_dir_all(out_dir)
        .with_context(|| format!("while creating {}", out_dir.display()))?;
    let path = out_dir.join("report.md");
    fs::write(&path, report).with_context(|| format!("while writing {}", path.display()))?;

    info!("wrote report for {} packages to {}", records.len(), path.display());
    Ok(())
}

fn render_markdown(records: &[CachedRecord]) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(record.status.kind()).or_default() += 1;
    }

    let mut out = String::new();
    out.push_str("# Type definition audit\n\n");
    out.push_str("## Summary\n\n");
    out.push_str(&format!("Packages checked: {}\n\n", records.len()));
    for (kind, count) in &counts {
        out.push_str(&format!("- {kind}: {count}\n"));
    }

    section(&mut out, "Out of date", records, |status| match status {
        Status::Found {
            current,
            out_of_date,
            ..
        } if *out_of_date != OutOfDate::None => {
            Some(format!("npm has {current} ({})", label(*out_of_date)))
        }
        _ => None,
    });

    section(&mut out, "Already typed upstream", records, |status| {
        match status {
            Status::Found { has_types, .. } if *has_types != TypedSource::None => {
                Some(format!("ships its own types via {}", typed_label(*has_types)))
            }
            _ => None,
        }
    });

    section(&mut out, "Deprecated upstream", records, |status| {
        matches!(
            status,
            Status::Found {
                is_deprecated: true,
                ..
            }
        )
        .then(|| "deprecated on npm".to_string())
    });

    section(&mut out, "Anomalies", records, |status| match status {
        Status::NotInRegistry => Some("no such package on npm".to_string()),
        Status::Unpublished => Some("package exists but has no versions".to_string()),
        Status::MissingVersion => Some("no version matches the declared line".to_string()),
        Status::Conflict => Some("name conflicts with an unrelated npm package".to_string()),
        Status::Error { message } => Some(format!("check failed: {message}")),
        Status::Found {
            package_json_type_matches,
            exports_similar,
            ..
        } if !package_json_type_matches || !exports_similar => {
            let mut notes = Vec::new();
            if !package_json_type_matches {
                notes.push("module type differs from upstream");
            }
            if !exports_similar {
                notes.push("export map shape differs from upstream");
            }
            Some(notes.join("; "))
        }
        _ => None,
    });

    out
}

fn section(
    out: &mut String,
    title: &str,
    records: &[CachedRecord],
    describe: impl Fn(&Status) -> Option<String>,
) {
    let lines: Vec<String> = records
        .iter()
        .filter_map(|record| {
            describe(&record.status).map(|note| {
                format!(
                    "- `{}` ({}): {note}\n",
                    record.sub_directory_path, record.full_npm_name
                )
            })
        })
        .collect();
    if lines.is_empty() {
        return;
    }
    out.push_str(&format!("\n## {title}\n\n"));
    for line in lines {
        out.push_str(&line);
    }
}

fn label(out_of_date: OutOfDate) -> &'static str {
    match out_of_date {
        OutOfDate::None => "up to date",
        OutOfDate::Minor => "minor update available",
        OutOfDate::Major => "major update available",
        OutOfDate::TooNew => "declared ahead of everything published",
    }
}

fn typed_label(source: TypedSource) -> &'static str {
    match source {
        TypedSource::None => "nothing",
        TypedSource::PackageJson => "package.json",
        TypedSource::Entrypoint => "declaration files at its entrypoints",
        TypedSource::Other => "declaration files elsewhere in the tree",
    }
}
