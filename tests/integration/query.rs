use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::common::{job_json, Harness, JOB_ID, TOKEN};

fn job_path() -> String {
    format!("/services/data/v53.0/jobs/query/{JOB_ID}")
}

fn results_path() -> String {
    format!("{}/results", job_path())
}

async fn mount_page(server: &MockServer, locator: &str, body: &str, next: &str) {
    Mock::given(method("GET"))
        .and(path(results_path()))
        .and(query_param("locator", locator))
        .and(query_param("maxRecords", "2"))
        .and(header("Accept", "text/csv"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Sforce-Locator", next)
                .insert_header("Sforce-NumberOfRecords", "2")
                .set_body_string(body),
        )
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_query_run_downloads_every_batch() {
    let server = MockServer::start().await;
    let h = Harness::new();

    Mock::given(method("POST"))
        .and(path("/services/data/v53.0/jobs/query"))
        .and(header("Authorization", format!("Bearer {TOKEN}").as_str()))
        .and(body_partial_json(serde_json::json!({
            "operation": "query",
            "query": "SELECT Id FROM Account",
            "contentType": "CSV"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json(JOB_ID, "query", "UploadComplete", 0)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(job_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json(JOB_ID, "query", "JobComplete", 4)))
        .expect(1)
        .mount(&server)
        .await;

    mount_page(&server, "MA==", "Id\n001A\n001B\n", "Mg==").await;
    mount_page(&server, "Mg==", "Id\n001C\n001D\n", "null").await;

    let uri = server.uri();
    let data = h.path_str("data");
    let output = h
        .run(&[
            "--instance-url",
            &uri,
            "--access-token",
            TOKEN,
            "query",
            "run",
            "SELECT Id FROM Account",
            "--check-interval",
            "0",
            "--workers",
            "2",
            "--download-path",
            &data,
        ])
        .await
        .unwrap();

    assert!(output.success);
    assert_eq!(output.value["total"], 2);
    assert_eq!(output.value["succeeded"], 2);
    assert_eq!(output.value["outcomes"][1]["offset"], 2);
    assert_eq!(output.value["outcomes"][1]["status"], "succeeded");

    let first = h.path(&format!("data/127/{JOB_ID}_000000000000.csv"));
    let second = h.path(&format!("data/127/{JOB_ID}_000000000002.csv"));
    assert_eq!(std::fs::read_to_string(first).unwrap(), "Id\n001A\n001B\n");
    assert_eq!(std::fs::read_to_string(second).unwrap(), "Id\n001C\n001D\n");
}

#[tokio::test]
async fn test_query_run_stops_on_failed_job() {
    let server = MockServer::start().await;
    let h = Harness::new();

    Mock::given(method("POST"))
        .and(path("/services/data/v53.0/jobs/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json(JOB_ID, "query", "UploadComplete", 0)))
        .mount(&server)
        .await;

    let mut failed = job_json(JOB_ID, "query", "Failed", 0);
    failed["errorMessage"] = serde_json::json!("INVALID_FIELD: No such column 'Nope'");
    Mock::given(method("GET"))
        .and(path(job_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(failed))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(results_path()))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let uri = server.uri();
    let output = h
        .run(&[
            "--instance-url",
            &uri,
            "--access-token",
            TOKEN,
            "query",
            "run",
            "SELECT Nope FROM Account",
            "--check-interval",
            "0",
        ])
        .await
        .unwrap();

    assert!(!output.success);
    assert_eq!(output.value["state"], "Failed");
    assert_eq!(output.value["errorMessage"], "INVALID_FIELD: No such column 'Nope'");
}

#[tokio::test]
async fn test_download_dry_run_prints_plan() {
    let server = MockServer::start().await;
    let h = Harness::new();

    Mock::given(method("GET"))
        .and(path(job_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json(JOB_ID, "query", "JobComplete", 1000)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(results_path()))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let uri = server.uri();
    let output = h
        .run(&[
            "--instance-url",
            &uri,
            "--access-token",
            TOKEN,
            "query",
            "download-data",
            JOB_ID,
            "--batch-size",
            "300",
            "--dry-run",
        ])
        .await
        .unwrap();

    assert!(output.success);
    assert_eq!(output.value["records"], 1000);
    let offsets: Vec<u64> = output.value["batches"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["start_offset"].as_u64().unwrap())
        .collect();
    assert_eq!(offsets, vec![0, 300, 600, 900]);
}

#[tokio::test]
async fn test_download_empty_job_writes_nothing() {
    let server = MockServer::start().await;
    let h = Harness::new();

    Mock::given(method("GET"))
        .and(path(job_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json(JOB_ID, "query", "JobComplete", 0)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(results_path()))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let uri = server.uri();
    let data = h.path_str("data");
    let output = h
        .run(&[
            "--instance-url",
            &uri,
            "--access-token",
            TOKEN,
            "query",
            "download-data",
            JOB_ID,
            "--download-path",
            &data,
        ])
        .await
        .unwrap();

    assert!(output.success);
    assert_eq!(output.value["total"], 0);
    assert!(!h.path("data").exists());
}

#[tokio::test]
async fn test_get_job_rejects_malformed_id() {
    let server = MockServer::start().await;
    let h = Harness::new();

    let uri = server.uri();
    let err = h
        .run(&["--instance-url", &uri, "--access-token", TOKEN, "query", "get-job", "../etc"])
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("could not get query job"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_commands_require_a_login() {
    let h = Harness::new();

    let err = h.run(&["query", "get-job", JOB_ID]).await.unwrap_err();

    assert!(format!("{err:#}").contains("ultra login"));
}
