//! Published file-tree metadata, with a primary and a fallback provider.

use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use tracing::{debug, warn};

use crate::config::{JSDELIVR_DATA_URL, UNPKG_URL};
use crate::registry::error::RegistryError;
use crate::registry::limiter::PoliteClient;
use crate::registry::types::{FileTreeNode, JsDelivrListing, NodeKind};

/// One CDN-style package-explorer API returning a recursive file tree.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait FileProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Absolute POSIX paths of every file published at `package@version`,
    /// vendored `node_modules` trees excluded.
    async fn list_files(
        &self,
        package_name: &str,
        version: &str,
    ) -> Result<Vec<String>, RegistryError>;
}

pub struct JsDelivrProvider {
    http: Arc<PoliteClient>,
    base_url: String,
}

impl JsDelivrProvider {
    pub fn new(http: Arc<PoliteClient>, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl FileProvider for JsDelivrProvider {
    fn name(&self) -> &'static str {
        "jsdelivr"
    }

    async fn list_files(
        &self,
        package_name: &str,
        version: &str,
    ) -> Result<Vec<String>, RegistryError> {
        let url = format!(
            "{}/v1/packages/npm/{}@{}",
            self.base_url, package_name, version
        );
        let listing = self
            .http
            .get_json::<JsDelivrListing>(&url)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("{package_name}@{version}")))?;

        let mut files = Vec::new();
        flatten_tree(&listing.files, "", &mut files)?;
        Ok(files)
    }
}

pub struct UnpkgProvider {
    http: Arc<PoliteClient>,
    base_url: String,
}

impl UnpkgProvider {
    pub fn new(http: Arc<PoliteClient>, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl FileProvider for UnpkgProvider {
    fn name(&self) -> &'static str {
        "unpkg"
    }

    async fn list_files(
        &self,
        package_name: &str,
        version: &str,
    ) -> Result<Vec<String>, RegistryError> {
        let url = format!("{}/{}@{}/?meta", self.base_url, package_name, version);
        let root = self
            .http
            .get_json::<FileTreeNode>(&url)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("{package_name}@{version}")))?;

        let mut files = Vec::new();
        flatten_tree(&root.files, "", &mut files)?;
        Ok(files)
    }
}

/// Tries each provider in order; any non-fatal failure falls through to the
/// next one.
pub struct FileLister {
    providers: Vec<Box<dyn FileProvider>>,
}

impl FileLister {
    pub fn new(providers: Vec<Box<dyn FileProvider>>) -> Self {
        Self { providers }
    }

    pub fn with_default_providers(http: Arc<PoliteClient>) -> Self {
        Self::new(vec![
            Box::new(JsDelivrProvider::new(http.clone(), JSDELIVR_DATA_URL)),
            Box::new(UnpkgProvider::new(http, UNPKG_URL)),
        ])
    }

    pub async fn list_files(
        &self,
        package_name: &str,
        version: &str,
    ) -> Result<Vec<String>, RegistryError> {
        let mut last_error = None;
        for provider in &self.providers {
            match provider.list_files(package_name, version).await {
                Ok(files) => {
                    debug!(
                        "{} listed {} files for {}@{}",
                        provider.name(),
                        files.len(),
                        package_name,
                        version
                    );
                    return Ok(files);
                }
                Err(e @ RegistryError::Fatal(_)) => return Err(e),
                Err(e) => {
                    warn!(
                        "{} failed for {}@{}: {}",
                        provider.name(),
                        package_name,
                        version,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| RegistryError::Fetch {
            message: "no file providers configured".to_string(),
            status: None,
        }))
    }
}

/// Flattens a recursive file tree into absolute POSIX paths.
///
/// Entries missing both `name` and `path` fail loudly rather than being
/// silently skipped. Anything under a `node_modules` segment is excluded:
/// vendored files are not this package's own types.
fn flatten_tree(
    nodes: &[FileTreeNode],
    prefix: &str,
    out: &mut Vec<String>,
) -> Result<(), RegistryError> {
    for node in nodes {
        let rel = match (&node.path, &node.name) {
            (Some(path), _) => path.trim_start_matches('/').to_string(),
            (None, Some(name)) if prefix.is_empty() => name.clone(),
            (None, Some(name)) => format!("{prefix}/{name}"),
            (None, None) => {
                return Err(RegistryError::Parse(
                    "file tree entry missing both name and path".to_string(),
                ));
            }
        };
        if rel.split('/').any(|segment| segment == "node_modules") {
            continue;
        }
        match node.kind {
            NodeKind::File => out.push(format!("/{rel}")),
            NodeKind::Directory => flatten_tree(&node.files, &rel, out)?,
        }
    }
    Ok(())
}
