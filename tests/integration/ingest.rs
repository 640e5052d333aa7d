use wiremock::matchers::{body_json, body_partial_json, body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::common::{job_json, Harness, TOKEN};

const INGEST_ID: &str = "7505f000002YgowAAC";

fn ingest_path() -> String {
    format!("/services/data/v53.0/jobs/ingest/{INGEST_ID}")
}

fn write_inputs(h: &Harness) {
    std::fs::create_dir_all(h.path("input/nested")).unwrap();
    std::fs::write(h.path("input/a.csv"), "Name\nA\nB\n").unwrap();
    std::fs::write(h.path("input/nested/b.csv"), "Name\r\nC").unwrap();
    std::fs::write(h.path("input/notes.txt"), "not a csv\n").unwrap();
}

#[tokio::test]
async fn test_load_creates_one_job_per_chunk() {
    let server = MockServer::start().await;
    let h = Harness::new();
    write_inputs(&h);

    Mock::given(method("POST"))
        .and(path("/services/data/v53.0/jobs/ingest"))
        .and(body_partial_json(serde_json::json!({
            "object": "Account",
            "operation": "insert",
            "contentType": "CSV"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json(INGEST_ID, "insert", "Open", 0)))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(format!("{}/batches", ingest_path())))
        .and(header("Content-Type", "text/csv"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path(ingest_path()))
        .and(body_json(serde_json::json!({ "state": "UploadComplete" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json(INGEST_ID, "insert", "UploadComplete", 0)))
        .expect(2)
        .mount(&server)
        .await;

    let uri = server.uri();
    let input = h.path_str("input");
    let batches = h.path_str("batches");
    let output = h
        .run(&[
            "--instance-url",
            &uri,
            "--access-token",
            TOKEN,
            "ingest",
            "load",
            "Account",
            "insert",
            &input,
            "--pattern",
            "*.csv",
            "--batch-size",
            "8",
            "--working-directory",
            &batches,
            "--workers",
            "1",
        ])
        .await
        .unwrap();

    assert!(output.success);
    assert_eq!(output.value["total"], 2);
    assert_eq!(output.value["succeeded"], 2);
    assert_eq!(output.value["outcomes"][0]["job_id"], INGEST_ID);

    assert_eq!(std::fs::read_to_string(h.path("batches/batch_0.csv")).unwrap(), "Name\nA\nB\n");
    assert_eq!(std::fs::read_to_string(h.path("batches/batch_1.csv")).unwrap(), "Name\nC\n");
}

#[tokio::test]
async fn test_upsert_without_external_id_fails_before_any_call() {
    let server = MockServer::start().await;
    let h = Harness::new();

    let uri = server.uri();
    let input = h.path_str("input");
    let err = h
        .run(&[
            "--instance-url",
            &uri,
            "--access-token",
            TOKEN,
            "ingest",
            "load",
            "Contact",
            "upsert",
            &input,
        ])
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("Missing external id"));
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(!h.path("batches").exists());
}

#[tokio::test]
async fn test_load_data_aborts_job_when_upload_fails() {
    let server = MockServer::start().await;
    let h = Harness::new();
    std::fs::write(h.path("accounts.csv"), "Name\nAcme\n").unwrap();

    Mock::given(method("PUT"))
        .and(path(format!("{}/batches", ingest_path())))
        .and(body_string("Name\nAcme\n"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path(ingest_path()))
        .and(body_json(serde_json::json!({ "state": "Aborted" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json(INGEST_ID, "insert", "Aborted", 0)))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let file = h.path_str("accounts.csv");
    let err = h
        .run(&[
            "--instance-url",
            &uri,
            "--access-token",
            TOKEN,
            "ingest",
            "load-data",
            INGEST_ID,
            &file,
        ])
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains(INGEST_ID));
}

#[tokio::test]
async fn test_load_data_closes_job() {
    let server = MockServer::start().await;
    let h = Harness::new();
    std::fs::write(h.path("accounts.csv"), "Name\nAcme\n").unwrap();

    Mock::given(method("PUT"))
        .and(path(format!("{}/batches", ingest_path())))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path(ingest_path()))
        .and(body_json(serde_json::json!({ "state": "UploadComplete" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json(INGEST_ID, "insert", "UploadComplete", 0)))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let file = h.path_str("accounts.csv");
    let output = h
        .run(&[
            "--instance-url",
            &uri,
            "--access-token",
            TOKEN,
            "ingest",
            "load-data",
            INGEST_ID,
            &file,
        ])
        .await
        .unwrap();

    assert!(output.success);
    assert_eq!(output.value["job"]["state"], "UploadComplete");
    assert_eq!(output.value["bytes"], 10);
}

#[tokio::test]
async fn test_combine_works_offline() {
    let h = Harness::new();
    write_inputs(&h);

    let input = h.path_str("input");
    let out = h.path_str("out");
    let output = h
        .run(&[
            "ingest",
            "combine",
            &input,
            "--pattern",
            "*.csv",
            "--working-directory",
            &out,
            "--prefix",
            "accounts",
        ])
        .await
        .unwrap();

    assert!(output.success);
    let files = output.value["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(
        std::fs::read_to_string(h.path("out/accounts_0.csv")).unwrap(),
        "Name\nA\nB\nC\n"
    );
}
