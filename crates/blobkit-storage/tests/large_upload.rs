use std::io::Cursor;

use blobkit_core::ApiVersion;
use blobkit_storage::{
    sha1_hex, Authorizer, ServiceHandle, StorageError, Transport, TransportConfig, UploadStage,
};
use mockito::{Matcher, Server};
use serde_json::json;
use tempfile::tempdir;

const PART_SIZE: usize = 5_242_880;
const TOTAL_SIZE: usize = PART_SIZE + 15;

fn payload() -> Vec<u8> {
    (0..TOTAL_SIZE).map(|i| (i % 251) as u8).collect()
}

async fn remote_handle(server: &mut Server) -> ServiceHandle {
    server
        .mock("GET", "/b2api/v3/b2_authorize_account")
        .with_status(200)
        .with_body(
            json!({
                "accountId": "acct",
                "authorizationToken": "account-token",
                "apiInfo": {
                    "storageApi": {
                        "apiUrl": server.url(),
                        "absoluteMinimumPartSize": PART_SIZE,
                        "recommendedPartSize": PART_SIZE
                    }
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let transport = Transport::new(&TransportConfig::default()).unwrap();
    let (handle, _) = Authorizer::new(transport)
        .with_auth_url(server.url())
        .authorize("key-id", "secret", ApiVersion::V3)
        .await
        .unwrap();
    handle
}

async fn mock_part_target(server: &mut Server, hits: usize) -> mockito::Mock {
    server
        .mock("GET", "/b2api/v3/b2_get_upload_part_url")
        .match_query(Matcher::UrlEncoded("fileId".into(), "4_zlarge".into()))
        .with_status(200)
        .with_body(
            json!({
                "fileId": "4_zlarge",
                "uploadUrl": format!("{}/upload-part/4_zlarge", server.url()),
                "authorizationToken": "part-token"
            })
            .to_string(),
        )
        .expect(hits)
        .create_async()
        .await
}

async fn mock_start(server: &mut Server) -> mockito::Mock {
    server
        .mock("POST", "/b2api/v3/b2_start_large_file")
        .match_body(Matcher::PartialJson(json!({
            "bucketId": "bucket-1",
            "fileName": "large-file.txt"
        })))
        .with_status(200)
        .with_body(r#"{"fileId":"4_zlarge","fileName":"large-file.txt","bucketId":"bucket-1"}"#)
        .expect(1)
        .create_async()
        .await
}

#[tokio::test]
async fn local_large_upload_round_trip() {
    let dir = tempdir().unwrap();
    let handle = ServiceHandle::local(dir.path(), 0).await.unwrap();
    let data = payload();

    let finished = handle
        .upload_large("large-file.txt", "", &mut Cursor::new(data.clone()), PART_SIZE)
        .await
        .unwrap();

    assert_eq!(finished.file_name, "large-file.txt");
    assert_eq!(finished.content_length_bytes, TOTAL_SIZE as u64);
    assert_eq!(std::fs::read(dir.path().join("large-file.txt")).unwrap(), data);

    let head = handle
        .download_file_range(&finished.file_id, 0, 4)
        .await
        .unwrap();
    assert_eq!(&head[..], &data[..5]);
}

#[tokio::test]
async fn remote_large_upload_round_trip() {
    let mut server = Server::new_async().await;
    let handle = remote_handle(&mut server).await;
    let data = payload();
    let (first, rest) = data.split_at(PART_SIZE);

    let start = mock_start(&mut server).await;
    let target = mock_part_target(&mut server, 2).await;
    let part_one = server
        .mock("POST", "/upload-part/4_zlarge")
        .match_header("x-bz-part-number", "1")
        .match_header("x-bz-content-sha1", sha1_hex(first).as_str())
        .match_header("content-length", PART_SIZE.to_string().as_str())
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let part_two = server
        .mock("POST", "/upload-part/4_zlarge")
        .match_header("x-bz-part-number", "2")
        .match_header("x-bz-content-sha1", sha1_hex(rest).as_str())
        .match_header("content-length", "15")
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let finish = server
        .mock("POST", "/b2api/v3/b2_finish_large_file")
        .match_body(Matcher::Json(json!({
            "fileId": "4_zlarge",
            "partSha1Array": [sha1_hex(first), sha1_hex(rest)]
        })))
        .with_status(200)
        .with_body(
            json!({
                "fileId": "4_zlarge",
                "fileName": "large-file.txt",
                "bucketId": "bucket-1",
                "contentLength": TOTAL_SIZE,
                "contentSha1": "none"
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let finished = handle
        .upload_large(
            "large-file.txt",
            "bucket-1",
            &mut Cursor::new(data.clone()),
            PART_SIZE,
        )
        .await
        .unwrap();

    assert_eq!(finished.content_length_bytes, 5_242_895);
    assert_eq!(finished.bucket_id, "bucket-1");
    start.assert_async().await;
    target.assert_async().await;
    part_one.assert_async().await;
    part_two.assert_async().await;
    finish.assert_async().await;
}

#[tokio::test]
async fn remote_part_failure_cancels_once() {
    let mut server = Server::new_async().await;
    let handle = remote_handle(&mut server).await;

    let _mock = mock_start(&mut server).await;
    let target = mock_part_target(&mut server, 3).await;
    let part = server
        .mock("POST", "/upload-part/4_zlarge")
        .with_status(503)
        .with_body(r#"{"status":503,"code":"service_unavailable","message":"c001_v0001000_t0000 is too busy"}"#)
        .expect(3)
        .create_async()
        .await;
    let cancel = server
        .mock("POST", "/b2api/v3/b2_cancel_large_file")
        .match_body(Matcher::Json(json!({ "fileId": "4_zlarge" })))
        .with_status(200)
        .with_body(r#"{"fileId":"4_zlarge","fileName":"large-file.txt"}"#)
        .expect(1)
        .create_async()
        .await;
    let finish = server
        .mock("POST", "/b2api/v3/b2_finish_large_file")
        .expect(0)
        .create_async()
        .await;

    let err = handle
        .upload_large(
            "large-file.txt",
            "bucket-1",
            &mut Cursor::new(payload()),
            PART_SIZE,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StorageError::UploadFailed {
            stage: UploadStage::Part {
                part_number: 1,
                attempts: 3
            },
            ..
        }
    ));
    assert!(err.is_rejection());
    target.assert_async().await;
    part.assert_async().await;
    cancel.assert_async().await;
    finish.assert_async().await;
}

#[tokio::test]
async fn remote_missing_upload_pod_is_retried_then_cancelled() {
    let mut server = Server::new_async().await;
    let handle = remote_handle(&mut server).await;

    let _mock = mock_start(&mut server).await;
    let target = mock_part_target(&mut server, 3).await;
    let part = server
        .mock("POST", "/upload-part/4_zlarge")
        .with_status(404)
        .with_body(r#"{"status":404,"code":"not_found","message":"upload pod gone"}"#)
        .expect(3)
        .create_async()
        .await;
    let cancel = server
        .mock("POST", "/b2api/v3/b2_cancel_large_file")
        .match_body(Matcher::Json(json!({ "fileId": "4_zlarge" })))
        .with_status(200)
        .with_body(r#"{"fileId":"4_zlarge","fileName":"large-file.txt"}"#)
        .expect(1)
        .create_async()
        .await;

    let err = handle
        .upload_large(
            "large-file.txt",
            "bucket-1",
            &mut Cursor::new(payload()),
            PART_SIZE,
        )
        .await
        .unwrap_err();

    match &err {
        StorageError::UploadFailed { stage, source, .. } => {
            assert_eq!(
                *stage,
                UploadStage::Part {
                    part_number: 1,
                    attempts: 3
                }
            );
            assert!(matches!(
                **source,
                StorageError::Rejected { status: 404, .. }
            ));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    target.assert_async().await;
    part.assert_async().await;
    cancel.assert_async().await;
}

#[tokio::test]
async fn remote_cancel_of_started_upload() {
    let mut server = Server::new_async().await;
    let handle = remote_handle(&mut server).await;

    let _mock = mock_start(&mut server).await;
    let cancel = server
        .mock("POST", "/b2api/v3/b2_cancel_large_file")
        .with_status(200)
        .with_body(r#"{"fileId":"4_zlarge"}"#)
        .expect(1)
        .create_async()
        .await;

    let started = handle
        .storage()
        .start_large_file("large-file.txt", "bucket-1")
        .await
        .unwrap();

    assert!(handle.cancel_large(&started.file_id).await);
    assert!(!handle.cancel_large("").await);
    cancel.assert_async().await;
}

#[tokio::test]
async fn local_cancel_removes_partial_file() {
    let dir = tempdir().unwrap();
    let handle = ServiceHandle::local(dir.path(), 0).await.unwrap();

    let started = handle
        .storage()
        .start_large_file("partial.bin", "")
        .await
        .unwrap();
    assert!(dir.path().join("partial.bin").exists());

    assert!(handle.cancel_large(&started.file_id).await);
    assert!(!dir.path().join("partial.bin").exists());
    assert!(!handle.cancel_large(&started.file_id).await);
}

#[tokio::test]
async fn local_quota_failure_aborts_upload() {
    let dir = tempdir().unwrap();
    let handle = ServiceHandle::local(dir.path(), 10).await.unwrap();

    let err = handle
        .upload_large("too-big.bin", "", &mut Cursor::new(vec![1u8; 12]), 4)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StorageError::UploadFailed {
            stage: UploadStage::Part { part_number: 3, .. },
            ..
        }
    ));
    assert!(!dir.path().join("too-big.bin").exists());
}

#[tokio::test]
async fn range_download_is_inclusive_on_both_backends() {
    let dir = tempdir().unwrap();
    let local = ServiceHandle::local(dir.path(), 0).await.unwrap();
    let target = local.get_upload_url("bucket-1").await.unwrap();
    let file = local
        .upload_file(&target, "hello.txt", bytes::Bytes::from_static(b"hello world"))
        .await
        .unwrap();
    let bytes = local.download_file_range(&file.file_id, 0, 4).await.unwrap();
    assert_eq!(bytes.len(), 5);
    let err = local
        .download_file_range(&file.file_id, 6, 11)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidInput(_)));

    let mut server = Server::new_async().await;
    let remote = remote_handle(&mut server).await;
    let _mock = server
        .mock("GET", "/b2api/v3/b2_download_file_by_id")
        .match_query(Matcher::UrlEncoded("fileId".into(), "4_zhello".into()))
        .match_header("range", "bytes=0-4")
        .with_status(206)
        .with_body("hello")
        .create_async()
        .await;
    let bytes = remote.download_file_range("4_zhello", 0, 4).await.unwrap();
    assert_eq!(bytes.len(), 5);
}
