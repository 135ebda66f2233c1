//! Loose version parsing and out-of-date classification.

use semver::Version;
use serde::{Deserialize, Serialize};

/// How far a typings package's declared version lags (or leads) the version
/// its npm counterpart resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutOfDate {
    None,
    Minor,
    Major,
    TooNew,
}

/// The "major.minor" a typings package declares for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclaredVersion {
    pub major: u64,
    pub minor: u64,
}

impl std::fmt::Display for DeclaredVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Parse a version string into a semver::Version, normalizing partial versions.
///
/// Upstream packages publish non-canonical versions like "1", "1.2", or
/// "1.2.3.4"; those are padded or truncated to a plain triple rather than
/// rejected. Canonical versions, prereleases included, pass through as-is.
pub fn parse_version(version: &str) -> Option<Version> {
    if let Ok(parsed) = Version::parse(version) {
        return Some(parsed);
    }
    let parts: Vec<&str> = version.split('.').collect();
    if !parts
        .iter()
        .take(3)
        .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    let normalized = match parts.len() {
        1 => format!("{}.0.0", parts[0]),
        2 => format!("{}.{}.0", parts[0], parts[1]),
        _ => parts[..3].join("."),
    };
    Version::parse(&normalized).ok()
}

/// Classify how the declared major/minor relates to the resolved upstream
/// version.
///
/// At most one drift direction is reported, checked in this order: declared
/// ahead of everything published (`TooNew`, only meaningful for the latest
/// variant), then a major lag, then a minor lag. 0.x lines treat minor bumps
/// as breaking, so those come back as `Major`.
pub fn classify_out_of_date(
    declared: DeclaredVersion,
    resolved: &Version,
    is_latest: bool,
) -> OutOfDate {
    if is_latest && (resolved.major, resolved.minor) < (declared.major, declared.minor) {
        return OutOfDate::TooNew;
    }
    if declared.major == 0 {
        if resolved.major > 0 || resolved.minor > declared.minor {
            return OutOfDate::Major;
        }
        return OutOfDate::None;
    }
    if resolved.major > declared.major {
        return OutOfDate::Major;
    }
    if resolved.major == declared.major && resolved.minor > declared.minor {
        return OutOfDate::Minor;
    }
    OutOfDate::None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1", Some((1, 0, 0)))]
    #[case("1.2", Some((1, 2, 0)))]
    #[case("1.2.3", Some((1, 2, 3)))]
    #[case("1.2.3.4", Some((1, 2, 3)))]
    #[case("1.2.3-alpha.1", Some((1, 2, 3)))]
    #[case("not-a-version", None)]
    fn parse_version_normalizes_loose_versions(
        #[case] input: &str,
        #[case] expected: Option<(u64, u64, u64)>,
    ) {
        let parsed = parse_version(input);
        assert_eq!(parsed.map(|v| (v.major, v.minor, v.patch)), expected);
    }

    #[rstest]
    // 0.x lines: a minor bump upstream is breaking
    #[case(0, 3, "0.4.0", true, OutOfDate::Major)]
    #[case(0, 3, "0.3.9", true, OutOfDate::None)]
    #[case(0, 3, "1.0.0", true, OutOfDate::Major)]
    // Regular lines
    #[case(2, 1, "2.5.0", true, OutOfDate::Minor)]
    #[case(2, 1, "3.0.0", true, OutOfDate::Major)]
    #[case(2, 1, "2.1.7", true, OutOfDate::None)]
    // Declared ahead of everything published
    #[case(5, 2, "5.0.0", true, OutOfDate::TooNew)]
    #[case(5, 2, "4.9.0", true, OutOfDate::TooNew)]
    // Non-latest variants never report too-new; they pinned an old line
    #[case(5, 2, "5.0.0", false, OutOfDate::None)]
    fn classify_out_of_date_covers_version_boundaries(
        #[case] major: u64,
        #[case] minor: u64,
        #[case] resolved: &str,
        #[case] is_latest: bool,
        #[case] expected: OutOfDate,
    ) {
        let declared = DeclaredVersion { major, minor };
        let resolved = parse_version(resolved).unwrap();
        assert_eq!(classify_out_of_date(declared, &resolved, is_latest), expected);
    }

    #[test]
    fn out_of_date_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&OutOfDate::TooNew).unwrap(),
            r#""too-new""#
        );
        assert_eq!(serde_json::to_string(&OutOfDate::None).unwrap(), r#""none""#);
    }
}
