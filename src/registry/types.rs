//! Validated wire documents fetched from the registry and metadata CDNs.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

/// One published version's manifest, reduced to the fields the audit reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub version: String,
    pub main: Option<String>,
    pub types: Option<String>,
    pub typings: Option<String>,
    #[serde(rename = "type")]
    pub package_json_type: Option<String>,
    pub exports: Option<Value>,
    pub deprecated: Option<Value>,
}

impl Manifest {
    /// npm stores deprecation as the message string; some tooling writes a
    /// bare bool, and an empty string un-deprecates.
    pub fn is_deprecated(&self) -> bool {
        match &self.deprecated {
            Some(Value::String(message)) => !message.is_empty(),
            Some(Value::Bool(flag)) => *flag,
            _ => false,
        }
    }
}

/// A package's full metadata document listing all published versions.
#[derive(Debug, Default, Deserialize)]
pub struct Packument {
    #[serde(default, rename = "dist-tags")]
    pub dist_tags: HashMap<String, String>,
    #[serde(default)]
    pub versions: HashMap<String, Manifest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

/// Recursive file/directory tree shared by both metadata providers:
/// jsDelivr nests relative `name`s, unpkg carries absolute `path`s.
#[derive(Debug, Deserialize)]
pub struct FileTreeNode {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: Option<String>,
    pub path: Option<String>,
    #[serde(default)]
    pub files: Vec<FileTreeNode>,
}

/// Envelope of the jsDelivr data API listing.
#[derive(Debug, Deserialize)]
pub struct JsDelivrListing {
    #[serde(default)]
    pub files: Vec<FileTreeNode>,
}
