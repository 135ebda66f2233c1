//! Fans the reconciliation out over every discovered package.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;
use futures::future::try_join_all;
use tracing::info;

use crate::cache::StatusCache;
use crate::check::engine::reconcile;
use crate::check::status::CachedRecord;
use crate::dt::descriptor::TypingsDescriptor;
use crate::registry::files::FileLister;
use crate::registry::npm::NpmClient;

/// Reconciles every descriptor concurrently and persists one record each.
///
/// The per-host limiter inside the shared HTTP client bounds the real
/// parallelism, so all futures can be spawned at once. A fatal registry
/// error aborts the whole run; everything else lands in the records.
/// Returns the number of packages checked.
pub async fn check_all(
    mut descriptors: Vec<TypingsDescriptor>,
    npm: &NpmClient,
    files: &FileLister,
    input_cache: &StatusCache,
    output_cache: &StatusCache,
) -> anyhow::Result<usize> {
    descriptors.sort_by(|a, b| a.sub_directory_path.cmp(&b.sub_directory_path));
    let total = descriptors.len();
    let completed = AtomicUsize::new(0);
    let completed = &completed;

    try_join_all(descriptors.iter().map(|descriptor| async move {
        let prior = input_cache.load(descriptor);
        let status = reconcile(descriptor, prior.map(|r| r.status).as_ref(), npm, files)
            .await
            .with_context(|| format!("while checking {}", descriptor.sub_directory_path))?;

        let record = CachedRecord::new(descriptor, status);
        output_cache
            .store(&record)
            .with_context(|| format!("while persisting {}", descriptor.sub_directory_path))?;

        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "checked {done}/{total}: {} is {}",
            descriptor.sub_directory_path,
            record.status.kind()
        );
        anyhow::Ok(())
    }))
    .await?;

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use mockito::Server;
    use tempfile::TempDir;

    use crate::check::status::Status;
    use crate::dt::descriptor::NonNpm;
    use crate::registry::files::JsDelivrProvider;
    use crate::registry::limiter::PoliteClient;

    fn descriptor(name: &str, non_npm: NonNpm) -> TypingsDescriptor {
        TypingsDescriptor {
            unescaped_name: name.to_string(),
            full_npm_name: format!("@types/{name}"),
            sub_directory_path: name.to_string(),
            major: 1,
            minor: 0,
            is_latest: true,
            non_npm,
            package_json_type: None,
            exports: None,
        }
    }

    #[tokio::test]
    async fn every_descriptor_gets_a_persisted_record() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/ghost")
            .with_status(404)
            .create_async()
            .await;

        let http = Arc::new(PoliteClient::new());
        let npm = NpmClient::new(http.clone(), &server.url());
        let files = FileLister::new(vec![Box::new(JsDelivrProvider::new(http, &server.url()))]);

        let dir = TempDir::new().unwrap();
        let cache = StatusCache::new(dir.path());

        let checked = check_all(
            vec![
                descriptor("ghost", NonNpm::No),
                descriptor("node", NonNpm::Yes),
            ],
            &npm,
            &files,
            &cache,
            &cache,
        )
        .await
        .unwrap();

        assert_eq!(checked, 2);
        let ghost = cache.load(&descriptor("ghost", NonNpm::No)).unwrap();
        assert_eq!(ghost.status, Status::NotInRegistry);
        let node = cache.load(&descriptor("node", NonNpm::Yes)).unwrap();
        assert_eq!(node.status, Status::NonNpm);
    }

    #[tokio::test]
    async fn a_fatal_error_aborts_the_run() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/lodash")
            .with_status(524)
            .create_async()
            .await;

        let http = Arc::new(PoliteClient::new());
        let npm = NpmClient::new(http.clone(), &server.url());
        let files = FileLister::new(vec![Box::new(JsDelivrProvider::new(http, &server.url()))]);

        let dir = TempDir::new().unwrap();
        let cache = StatusCache::new(dir.path());

        let result = check_all(
            vec![descriptor("lodash", NonNpm::No)],
            &npm,
            &files,
            &cache,
            &cache,
        )
        .await;

        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("lodash"), "{message}");
    }
}
