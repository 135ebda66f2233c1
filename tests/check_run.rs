//! End-to-end check runs against a fake checkout and a mock registry.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use mockito::{Server, ServerGuard};
use tempfile::TempDir;

use dt_audit::cache::StatusCache;
use dt_audit::check::orchestrator::check_all;
use dt_audit::check::status::{CachedRecord, Status};
use dt_audit::dt::enumerate::enumerate_checkout;
use dt_audit::registry::files::{FileLister, JsDelivrProvider};
use dt_audit::registry::limiter::PoliteClient;
use dt_audit::registry::npm::NpmClient;
use dt_audit::version::OutOfDate;

fn write_package(checkout: &Path, sub_path: &str, body: &str) {
    let dir = checkout.join("types").join(sub_path);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("package.json"), body).unwrap();
}

fn clients(server: &ServerGuard) -> (NpmClient, FileLister) {
    let http = Arc::new(PoliteClient::new());
    (
        NpmClient::new(http.clone(), &server.url()),
        FileLister::new(vec![Box::new(JsDelivrProvider::new(http, &server.url()))]),
    )
}

async fn mock_registry(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("GET", "/lodash")
        .with_status(200)
        .with_body(
            r#"{
                "dist-tags": {"latest": "4.17.21"},
                "versions": {
                    "4.14.0": {"version": "4.14.0", "main": "lodash.js"},
                    "4.17.21": {"version": "4.17.21", "main": "lodash.js"}
                }
            }"#,
        )
        .create_async()
        .await;
    server
        .mock("GET", "/ghost")
        .with_status(404)
        .create_async()
        .await;
    server
        .mock("GET", "/v1/packages/npm/lodash@4.17.21")
        .with_status(200)
        .with_body(r#"{"files": [{"type": "file", "name": "lodash.js"}]}"#)
        .expect(1)
        .create_async()
        .await
}

fn read_records(cache_dir: &Path) -> Vec<(String, String)> {
    let mut records = Vec::new();
    for shard in fs::read_dir(cache_dir).unwrap() {
        for entry in fs::read_dir(shard.unwrap().path()).unwrap() {
            let path = entry.unwrap().path();
            records.push((
                path.file_name().unwrap().to_string_lossy().into_owned(),
                fs::read_to_string(path).unwrap(),
            ));
        }
    }
    records.sort();
    records
}

#[tokio::test]
async fn a_second_run_reuses_the_cache_and_writes_identical_records() {
    let checkout = TempDir::new().unwrap();
    write_package(
        checkout.path(),
        "lodash",
        r#"{"name": "@types/lodash", "version": "4.16.9999"}"#,
    );
    write_package(
        checkout.path(),
        "ghost",
        r#"{"name": "@types/ghost", "version": "1.0.9999"}"#,
    );
    write_package(
        checkout.path(),
        "node",
        r#"{"name": "@types/node", "version": "20.0.9999", "nonNpm": true}"#,
    );

    let mut server = Server::new_async().await;
    let listing = mock_registry(&mut server).await;

    let cache_dir = TempDir::new().unwrap();
    let cache = StatusCache::new(cache_dir.path());

    let descriptors = enumerate_checkout(checkout.path()).unwrap();
    assert_eq!(descriptors.len(), 3);

    let (npm, files) = clients(&server);
    let checked = check_all(descriptors.clone(), &npm, &files, &cache, &cache)
        .await
        .unwrap();
    assert_eq!(checked, 3);

    let first = read_records(cache_dir.path());
    assert_eq!(first.len(), 3);

    // Fresh clients, same cache: the registry is re-queried but the file
    // listing is not, and every record comes out byte-identical.
    let (npm, files) = clients(&server);
    check_all(descriptors, &npm, &files, &cache, &cache)
        .await
        .unwrap();

    listing.assert_async().await;
    assert_eq!(read_records(cache_dir.path()), first);
}

#[tokio::test]
async fn statuses_land_as_expected_after_a_run() {
    let checkout = TempDir::new().unwrap();
    write_package(
        checkout.path(),
        "lodash",
        r#"{"name": "@types/lodash", "version": "4.16.9999"}"#,
    );

    let mut server = Server::new_async().await;
    mock_registry(&mut server).await;

    let cache_dir = TempDir::new().unwrap();
    let cache = StatusCache::new(cache_dir.path());

    let descriptors = enumerate_checkout(checkout.path()).unwrap();
    let (npm, files) = clients(&server);
    check_all(descriptors.clone(), &npm, &files, &cache, &cache)
        .await
        .unwrap();

    let record: CachedRecord = cache.load(&descriptors[0]).unwrap();
    assert_eq!(record.full_npm_name, "@types/lodash");
    match record.status {
        Status::Found {
            ref current,
            out_of_date,
            ..
        } => {
            assert_eq!(current, "4.17.21");
            assert_eq!(out_of_date, OutOfDate::Minor);
        }
        ref other => panic!("expected found, got {other:?}"),
    }
}
