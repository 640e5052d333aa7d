use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::common::{job_json, Harness, JOB_ID, TOKEN};

const KEY_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/crates/ul-auth/testdata/jwt_test_key.pem");

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .and(body_string_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": TOKEN,
            "instance_url": server.uri(),
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_caches_token_for_later_commands() {
    let server = MockServer::start().await;
    let h = Harness::new();
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path(format!("/services/data/v53.0/jobs/query/{JOB_ID}")))
        .and(header("Authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json(JOB_ID, "query", "JobComplete", 42)))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let output = h
        .run(&[
            "login",
            "user@example.com",
            "3MVG9consumer",
            "sandbox",
            "--private-key",
            KEY_PATH,
            "--login-url",
            &uri,
        ])
        .await
        .unwrap();

    assert_eq!(output.value["status"], "saved");
    assert_eq!(output.value["username"], "user@example.com");

    let cached: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(h.path("credentials.json")).unwrap()).unwrap();
    assert_eq!(cached["token"], TOKEN);
    assert_eq!(cached["environment"], "sandbox");
    assert!(cached.get("private_key").is_none());

    let job = h.run(&["query", "get-job", JOB_ID]).await.unwrap();
    assert_eq!(job.value["numberRecordsProcessed"], 42);
}

#[tokio::test]
async fn test_login_from_credential_file_prints_json() {
    let server = MockServer::start().await;
    let h = Harness::new();
    mount_token(&server).await;

    let profile = serde_json::json!({
        "username": "user@example.com",
        "consumer_id": "3MVG9consumer",
        "environment": "production",
        "private_key": std::fs::read_to_string(KEY_PATH).unwrap()
    });
    std::fs::write(h.path("login.json"), profile.to_string()).unwrap();

    let uri = server.uri();
    let file = h.path_str("login.json");
    let output = h
        .run(&["login", "--json-credential-file", &file, "--json-out", "--login-url", &uri])
        .await
        .unwrap();

    assert_eq!(output.value["token"], TOKEN);
    assert_eq!(output.value["instance_url"], uri);
    assert_eq!(output.value["environment"], "production");
    assert!(!h.path("credentials.json").exists());
}

#[tokio::test]
async fn test_login_rejected_by_server() {
    let server = MockServer::start().await;
    let h = Harness::new();

    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "user hasn't approved this consumer"
        })))
        .mount(&server)
        .await;

    let uri = server.uri();
    let err = h
        .run(&[
            "login",
            "user@example.com",
            "3MVG9consumer",
            "production",
            "--private-key",
            KEY_PATH,
            "--login-url",
            &uri,
        ])
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("double-check your credentials"));
    assert!(!h.path("credentials.json").exists());
}

#[tokio::test]
async fn test_login_requires_identity() {
    let h = Harness::new();

    let err = h.run(&["login", "user@example.com"]).await.unwrap_err();

    assert!(err.to_string().contains("required"));
}
