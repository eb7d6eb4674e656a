//! Wire-level upload behavior against a scripted HTTP server.

mod common;

use std::net::TcpListener;
use std::time::Duration;

use anyhow::Result;
use common::ScriptedServer;
use pircam::{upload_with_policy, CloudUploader, RetryPolicy, UploadConfig};

fn uploader_for(base_url: &str) -> Result<CloudUploader> {
    CloudUploader::new(UploadConfig {
        base_url: Some(base_url.to_string()),
        website_id: "garden".to_string(),
        camera_name: "shed-door".to_string(),
        ..UploadConfig::default()
    })
}

fn artifact_with(bytes: &[u8]) -> Result<tempfile::NamedTempFile> {
    let file = tempfile::Builder::new().suffix(".jpg").tempfile()?;
    std::fs::write(file.path(), bytes)?;
    Ok(file)
}

#[test]
fn successful_upload_puts_the_artifact_with_routing_identity() -> Result<()> {
    let server = ScriptedServer::spawn(vec![(200, "ok")]);
    let uploader = uploader_for(&server.base_url())?;
    let artifact = artifact_with(b"\xFF\xD8jpeg payload\xFF\xD9")?;

    let result = uploader.upload(artifact.path(), "20240101-120000");
    assert!(result.success);
    assert_eq!(result.status, Some(200));
    assert!(result.error.is_none());

    let requests = server.stop();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "PUT");
    assert_eq!(request.path(), "/api/camera/photo");
    assert!(request.query().contains("websiteId=garden"));
    assert!(request.query().contains("cameraName=shed-door"));
    assert_eq!(request.header("content-type"), Some("image/jpeg"));
    assert_eq!(request.body, b"\xFF\xD8jpeg payload\xFF\xD9");
    Ok(())
}

#[test]
fn server_error_yields_failure_with_status_and_body() -> Result<()> {
    let server = ScriptedServer::spawn(vec![(500, "internal error")]);
    let uploader = uploader_for(&server.base_url())?;
    let artifact = artifact_with(b"payload")?;

    let result = uploader.upload(artifact.path(), "20240101-120000");
    assert!(!result.success);
    assert_eq!(result.status, Some(500));
    let error = result.error.expect("error description");
    assert!(error.contains("500"));
    assert!(error.contains("internal error"));

    server.stop();
    Ok(())
}

#[test]
fn connection_refused_yields_failure_without_status() -> Result<()> {
    // Bind then drop to get a port with nothing listening on it.
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);

    let uploader = uploader_for(&format!("http://{}", addr))?;
    let artifact = artifact_with(b"payload")?;

    let result = uploader.upload(artifact.path(), "20240101-120000");
    assert!(!result.success);
    assert_eq!(result.status, None);
    assert!(!result.error.expect("error description").is_empty());
    Ok(())
}

#[test]
fn function_key_is_a_query_parameter_not_a_header() -> Result<()> {
    let server = ScriptedServer::spawn(vec![(200, "ok")]);
    let uploader = CloudUploader::new(UploadConfig {
        base_url: Some(server.base_url()),
        function_key: Some("k123".to_string()),
        ..UploadConfig::default()
    })?;
    let artifact = artifact_with(b"payload")?;

    let result = uploader.upload(artifact.path(), "20240101-120000");
    assert!(result.success);

    let requests = server.stop();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].query().contains("code=k123"));
    assert_eq!(requests[0].header("x-functions-key"), None);
    Ok(())
}

#[test]
fn default_policy_makes_exactly_one_attempt() -> Result<()> {
    let server = ScriptedServer::spawn(vec![(500, "nope")]);
    let uploader = uploader_for(&server.base_url())?;
    let artifact = artifact_with(b"payload")?;

    let result = upload_with_policy(
        &uploader,
        artifact.path(),
        "20240101-120000",
        RetryPolicy::default(),
    );
    assert!(!result.success);

    let requests = server.stop();
    assert_eq!(requests.len(), 1);
    Ok(())
}

#[test]
fn opted_in_retries_reattempt_until_the_server_recovers() -> Result<()> {
    let server = ScriptedServer::spawn(vec![(500, "one"), (500, "two"), (200, "ok")]);
    let uploader = uploader_for(&server.base_url())?;
    let artifact = artifact_with(b"payload")?;

    let policy = RetryPolicy {
        retries: 2,
        backoff: Duration::from_millis(5),
    };
    let result = upload_with_policy(&uploader, artifact.path(), "20240101-120000", policy);
    assert!(result.success);
    assert_eq!(result.status, Some(200));

    let requests = server.stop();
    assert_eq!(requests.len(), 3);
    Ok(())
}

#[test]
fn exhausted_retries_return_the_last_failure() -> Result<()> {
    let server = ScriptedServer::spawn(vec![(500, "one"), (500, "two")]);
    let uploader = uploader_for(&server.base_url())?;
    let artifact = artifact_with(b"payload")?;

    let policy = RetryPolicy {
        retries: 1,
        backoff: Duration::from_millis(5),
    };
    let result = upload_with_policy(&uploader, artifact.path(), "20240101-120000", policy);
    assert!(!result.success);
    assert_eq!(result.status, Some(500));
    assert!(result.error.expect("error description").contains("two"));

    let requests = server.stop();
    assert_eq!(requests.len(), 2);
    Ok(())
}

#[test]
fn unconfigured_uploader_never_retries() -> Result<()> {
    let uploader = CloudUploader::new(UploadConfig::default())?;
    let artifact = artifact_with(b"payload")?;

    let policy = RetryPolicy {
        retries: 3,
        backoff: Duration::from_millis(5),
    };
    let result = upload_with_policy(&uploader, artifact.path(), "20240101-120000", policy);
    assert!(!result.success);
    assert_eq!(result.status, None);
    Ok(())
}
