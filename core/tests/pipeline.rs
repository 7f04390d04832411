//! End-to-end tests of `HatClient` over the reqwest transport.
//!
//! # Design
//! Each test starts its own mock server on a random port with a fresh state,
//! points the user domain, the bulletin and the dex at it, and drives the
//! public service methods. The mock state is inspected directly to check
//! side effects such as bulletin tickles and uploads.

use std::io::Write;
use std::time::Duration;

use hat_core::classify::Body;
use hat_core::pipeline::expect_array;
use hat_core::types::{FitbitSleep, LocationData, ProfilePhoto};
use hat_core::{ClientConfig, EndpointKind, HatClient, HatError};
use serde_json::{json, Map};

struct Harness {
    client: HatClient,
    db: mock_server::Db,
    domain: String,
}

async fn start() -> Harness {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let db = mock_server::Db::default();
    tokio::spawn(mock_server::run_with_state(listener, db.clone()));

    let config = ClientConfig {
        scheme: "http".to_string(),
        timeout_secs: 5,
        bulletin_url: format!("http://{addr}/api/bulletin/tickle"),
        dex_url: format!("http://{addr}"),
        ..ClientConfig::default()
    };
    Harness {
        client: HatClient::new(config).unwrap(),
        db,
        domain: addr.to_string(),
    }
}

/// Wait up to one second for `count` bulletin tickles.
async fn tickles(db: &mock_server::Db, count: usize) -> Vec<String> {
    for _ in 0..100 {
        let seen = db.read().await.tickles.clone();
        if seen.len() >= count {
            return seen;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    db.read().await.tickles.clone()
}

#[tokio::test]
async fn record_lifecycle_renews_token_and_tickles_bulletin() {
    let h = start().await;

    let err = h
        .client
        .get_table_values("tok", &h.domain, "rumpel", "notes", Map::new())
        .await
        .unwrap_err();
    assert_eq!(err, HatError::TableDoesNotExist);

    let created = h
        .client
        .create_table_value("tok", &h.domain, "rumpel", "notes", json!([{"v": 1}, {"v": 2}]))
        .await
        .unwrap();
    assert_eq!(created.renewed_token.as_deref(), Some("renewed-tok"));
    let ids: Vec<String> = created
        .value
        .as_array()
        .unwrap()
        .iter()
        .map(|record| record["recordId"].as_str().unwrap().to_string())
        .collect();

    let mut first = created.value[0].clone();
    first["data"] = json!({"v": 10});
    let updated = h
        .client
        .update_records(&h.domain, "tok", json!([first]))
        .await
        .unwrap();
    assert_eq!(updated.value[0]["data"]["v"], 10);
    assert_eq!(tickles(&h.db, 1).await.len(), 1);

    let deleted = h.client.delete_records(&h.domain, "tok", &ids).await.unwrap();
    assert_eq!(deleted.value, "tok");
    assert_eq!(deleted.renewed_token.as_deref(), Some("renewed-tok"));
    assert_eq!(tickles(&h.db, 2).await, [h.domain.clone(), h.domain.clone()]);

    let listed = h
        .client
        .get_table_values("tok", &h.domain, "rumpel", "notes", Map::new())
        .await
        .unwrap();
    assert!(listed.value.is_empty());
}

#[tokio::test]
async fn failed_delete_does_not_tickle() {
    let h = start().await;
    let err = h
        .client
        .delete_records(&h.domain, "tok", &["00000000-0000-0000-0000-000000000000".to_string()])
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.db.read().await.tickles.is_empty());
}

#[tokio::test]
async fn empty_delete_does_no_io() {
    let h = start().await;
    let err = h.client.delete_records(&h.domain, "tok", &[]).await.unwrap_err();
    assert!(matches!(err, HatError::GeneralError { status: None, .. }));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.db.read().await.tickles.is_empty());
}

#[tokio::test]
async fn trigger_update_is_awaited() {
    let h = start().await;
    h.client.trigger_update(&h.domain).await;
    assert_eq!(h.db.read().await.tickles, [h.domain.clone()]);
}

#[tokio::test]
async fn concurrent_calls_keep_their_own_tokens() {
    let h = start().await;
    h.client
        .create_table_value("tok", &h.domain, "rumpel", "notes", json!({"text": "shared"}))
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        h.client.get_table_values("a", &h.domain, "rumpel", "notes", Map::new()),
        h.client.get_table_values("b", &h.domain, "rumpel", "notes", Map::new()),
    );
    let (first, second) = (first.unwrap(), second.unwrap());
    assert_eq!(first.renewed_token.as_deref(), Some("renewed-a"));
    assert_eq!(second.renewed_token.as_deref(), Some("renewed-b"));
    assert_eq!(first.value, second.value);
}

#[tokio::test]
async fn profile_photo_round_trip() {
    let h = start().await;
    let err = h.client.get_profile_photo(&h.domain, "tok").await.unwrap_err();
    assert_eq!(err, HatError::TableDoesNotExist);

    for avatar in ["https://img.example/old.png", "https://img.example/new.png"] {
        let photo = ProfilePhoto {
            avatar: avatar.to_string(),
        };
        let saved = h.client.set_profile_photo(&h.domain, "tok", &photo).await.unwrap();
        assert_eq!(saved.value, photo);
    }
    let latest = h.client.get_profile_photo(&h.domain, "tok").await.unwrap();
    assert_eq!(latest.value.avatar, "https://img.example/new.png");
    assert_eq!(latest.renewed_token.as_deref(), Some("renewed-tok"));
}

#[tokio::test]
async fn malformed_user_domain_is_a_general_error() {
    let h = start().await;
    let err = h
        .client
        .get_table_values("tok", &format!("{}/evil", h.domain), "rumpel", "notes", Map::new())
        .await
        .unwrap_err();
    assert!(matches!(err, HatError::GeneralError { status: None, .. }));
    assert!(h.client.public_key_url("alice hat.net").is_err());
}

#[tokio::test]
async fn unauthorized_is_flagged() {
    let h = start().await;
    let err = h
        .client
        .get_table_values("", &h.domain, "rumpel", "notes", Map::new())
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn password_change() {
    let h = start().await;
    let err = h
        .client
        .change_password(&h.domain, "tok", "wrong", "next")
        .await
        .unwrap_err();
    assert!(matches!(err, HatError::GeneralError { status: Some(403), .. }));
    assert_eq!(h.db.read().await.password, mock_server::INITIAL_PASSWORD);

    let reply = h
        .client
        .change_password(&h.domain, "tok", mock_server::INITIAL_PASSWORD, "next")
        .await
        .unwrap();
    assert_eq!(reply.value, "Password changed");
    assert_eq!(h.db.read().await.password, "next");
}

#[tokio::test]
async fn public_key_text_mode() {
    let h = start().await;
    assert_eq!(
        h.client.public_key_url(&h.domain).unwrap(),
        format!("http://{}/publickey", h.domain)
    );
    let key = h.client.get_public_key(&h.domain).await.unwrap();
    assert_eq!(key.value, mock_server::PUBLIC_KEY);
}

#[tokio::test]
async fn locations_and_combinators() {
    let h = start().await;
    let points: Vec<LocationData> = [5, 15, 25]
        .into_iter()
        .map(|date| LocationData {
            latitude: 51.5,
            longitude: -0.12,
            horizontal_accuracy: 10.0,
            date_created: date,
            date_created_local: String::new(),
        })
        .collect();
    let pushed = h.client.push_locations(&h.domain, "tok", &points).await.unwrap();
    assert_eq!(pushed.value.len(), 3);

    let locations = h.client.get_locations(&h.domain, "tok").await.unwrap();
    assert_eq!(locations.value.len(), 3);
    assert_eq!(locations.value[0].date_created, 25);

    let created = h
        .client
        .create_combinator(&h.domain, "tok", "window", "dateCreated", 10, 20)
        .await
        .unwrap();
    assert!(created.value);
    let window = h.client.get_combinator(&h.domain, "tok", "window").await.unwrap();
    assert_eq!(window.value.len(), 1);
    assert_eq!(window.value[0]["data"]["dateCreated"], 15);
}

#[tokio::test]
async fn location_plug_is_enabled() {
    let h = start().await;
    let reply = h
        .client
        .enable_location_data_plug(&h.domain, "plug-token", "plug-1")
        .await
        .unwrap();
    assert_eq!(reply.value, format!("plug plug-1 enabled for {}", h.domain));
}

#[tokio::test]
async fn fitbit_discovery_and_latest_sleep() {
    let h = start().await;
    let scopes = h.client.get_fitbit_endpoints().await.unwrap();
    assert!(scopes.value.iter().any(|scope| scope == "sleep"));

    let err = h.client.get_fitbit_sleep(&h.domain, "tok").await.unwrap_err();
    assert_eq!(err, HatError::TableDoesNotExist);

    for (date, efficiency) in [("2018-05-09", 80), ("2018-05-10", 93)] {
        h.client
            .create_table_value(
                "tok",
                &h.domain,
                "fitbit",
                "sleep",
                json!({"dateOfSleep": date, "duration": 28800000, "efficiency": efficiency}),
            )
            .await
            .unwrap();
    }
    let sleep: Vec<FitbitSleep> = h.client.get_fitbit_sleep(&h.domain, "tok").await.unwrap().value;
    assert_eq!(sleep.len(), 1);
    assert_eq!(sleep[0].date_of_sleep, "2018-05-10");
    assert_eq!(sleep[0].efficiency, 93);
}

#[tokio::test]
async fn upload_posts_encrypted_file() {
    let h = start().await;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"profile photo").unwrap();

    let url = format!("http://{}/upload/photos/me.jpg", h.domain);
    let reply = h.client.upload_file(file.path(), &url).await.unwrap();
    assert_eq!(reply.value, Body::Empty);
    assert_eq!(h.db.read().await.uploads[0], "profile photo");
}

#[tokio::test]
async fn call_with_fires_exactly_one_continuation() {
    let h = start().await;
    let mut successes = 0;
    let mut errors = Vec::new();
    let request = h
        .client
        .endpoints()
        .build_table_values("tok", &h.domain, "rumpel", "missing", Map::new())
        .unwrap();
    h.client
        .call_with(
            request,
            EndpointKind::DataTable,
            expect_array,
            |_, _| successes += 1,
            |error| errors.push(error),
        )
        .await;
    assert_eq!(successes, 0);
    assert_eq!(errors, [HatError::TableDoesNotExist]);
}

#[tokio::test]
async fn unreachable_host_is_no_internet() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig {
        scheme: "http".to_string(),
        timeout_secs: 2,
        ..ClientConfig::default()
    };
    let client = HatClient::new(config).unwrap();
    let err = client
        .get_table_values("tok", &addr.to_string(), "rumpel", "notes", Map::new())
        .await
        .unwrap_err();
    assert_eq!(err, HatError::NoInternetConnection);
}
