mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::{Duration, Utc};
use serde_json::{Value, json};

use common::{ALICE, BOB, FakeIdentityProvider, TestApp};
use tracker_api::auth::SESSION_COOKIE;
use tracker_api::store::{NewHistory, NewScenario};

fn tracker_body() -> Value {
    json!({
        "name": "BTC price",
        "description": "Hourly price summary",
        "interval": 3600,
        "time": "09:30",
        "parameters": [
            {"id": "symbol", "type": "text", "label": "Symbol", "placeholder": "BTC"},
            {"id": "currency", "type": "dropdown", "label": "Currency", "default": "usd",
             "options": [{"label": "USD", "value": "usd"}, {"label": "EUR", "value": "eur"}]}
        ],
        "actions": [{"type": "email", "to": "alice@example.com"}],
        "isActive": true,
        "scenarioId": null,
        "workflow_id": "wf-42"
    })
}

fn add_history(app: &TestApp, tracker_id: i64, user_id: i64, age_hours: i64, summary: &str) {
    app.store
        .insert_history(&NewHistory {
            tracker_id,
            user_id,
            timestamp: Utc::now() - Duration::hours(age_hours),
            output: Some(format!("output for {summary}")),
            summary: Some(summary.to_string()),
        })
        .expect("insert history");
}

fn count(app: &TestApp, sql: &str) -> i64 {
    app.store
        .connection()
        .query_row(sql, [], |row| row.get(0))
        .expect("count rows")
}

#[tokio::test]
async fn liveness_needs_no_auth() {
    let app = TestApp::new();
    let resp = app.call(Method::GET, "/", None, None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, json!("server is up"));
}

#[tokio::test]
async fn protected_endpoints_reject_missing_or_garbled_tokens() {
    let app = TestApp::new();
    app.provision(ALICE).await;
    let tracker = app.create_tracker(ALICE, tracker_body()).await;
    let id = tracker["id"].as_i64().unwrap();

    let endpoints = [
        (Method::GET, "/user".to_string()),
        (Method::POST, "/user".to_string()),
        (Method::DELETE, "/user".to_string()),
        (Method::GET, "/trackers".to_string()),
        (Method::GET, format!("/trackers/{id}")),
        (Method::PUT, format!("/trackers/{id}")),
        (Method::DELETE, format!("/trackers/{id}")),
        (Method::GET, format!("/trackers/{id}/history")),
        (Method::GET, "/scenarios".to_string()),
    ];

    for (method, uri) in endpoints {
        for token in [None, Some("not-a-real-token")] {
            let body = (method == Method::PUT).then(|| json!({"name": "hijack"}));
            let resp = app.call(method.clone(), &uri, token, body).await;
            assert_eq!(resp.status, StatusCode::UNAUTHORIZED, "{method} {uri} {token:?}");
            assert!(resp.headers.contains_key(header::WWW_AUTHENTICATE));
            let object = resp.body.as_object().expect("json error body");
            assert_eq!(object.len(), 1, "only an error message is returned");
            assert!(object.contains_key("error"));
        }
    }

    let basic = Request::builder()
        .uri("/trackers")
        .header(header::AUTHORIZATION, "Basic YWxpY2U6c2VjcmV0")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(basic).await.status, StatusCode::UNAUTHORIZED);

    let unchanged = app.get(&format!("/trackers/{id}"), ALICE).await;
    assert_eq!(unchanged.body, tracker);
}

#[tokio::test]
async fn session_cookie_authenticates() {
    let app = TestApp::new();
    app.provision(ALICE).await;

    let cookie = format!(
        "{SESSION_COOKIE}={}",
        urlencoding::encode(&format!(r#"j:{{"access_token":"{ALICE}"}}"#))
    );
    let request = Request::builder()
        .uri("/user")
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap();

    let resp = app.send(request).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["user_id"], json!("auth-alice"));
}

#[tokio::test]
async fn unprovisioned_caller_gets_not_found() {
    let app = TestApp::new();

    let user = app.get("/user", ALICE).await;
    assert_eq!(user.status, StatusCode::NOT_FOUND);
    assert_eq!(user.body, json!({"error": "User not found"}));

    let trackers = app.get("/trackers", ALICE).await;
    assert_eq!(trackers.status, StatusCode::NOT_FOUND);

    let create = app
        .call(Method::POST, "/trackers", Some(ALICE), Some(tracker_body()))
        .await;
    assert_eq!(create.status, StatusCode::NOT_FOUND);
    assert_eq!(count(&app, "SELECT COUNT(*) FROM users"), 0);
}

#[tokio::test]
async fn user_provisioning_is_idempotent() {
    let app = TestApp::new();

    let first = app.call(Method::POST, "/user", Some(ALICE), None).await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.body["user_id"], json!("auth-alice"));
    assert_eq!(first.body["email"], json!("alice@example.com"));
    assert!(first.body["created_at"].is_string());

    let second = app.call(Method::POST, "/user", Some(ALICE), None).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body, first.body);

    let fetched = app.get("/user", ALICE).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body, first.body);

    assert_eq!(count(&app, "SELECT COUNT(*) FROM users"), 1);
}

#[tokio::test]
async fn created_tracker_reads_back_equal() {
    let app = TestApp::new();
    app.provision(ALICE).await;

    let input = tracker_body();
    let created = app.create_tracker(ALICE, input.clone()).await;

    let id = created["id"].as_i64().expect("server assigned id");
    assert!(created["createdAt"].is_string(), "server stamped creation time");

    let mut without_server_fields = created.as_object().unwrap().clone();
    without_server_fields.remove("id");
    without_server_fields.remove("createdAt");
    assert_eq!(Value::Object(without_server_fields), input);

    let fetched = app.get(&format!("/trackers/{id}"), ALICE).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body, created);
}

#[tokio::test]
async fn unspecified_tracker_fields_persist_as_null() {
    let app = TestApp::new();
    app.provision(ALICE).await;

    let created = app
        .create_tracker(ALICE, json!({"name": "bare", "is_active": false, "scenario_id": null}))
        .await;

    assert_eq!(created["name"], json!("bare"));
    assert_eq!(created["isActive"], json!(false));
    assert_eq!(created["description"], Value::Null);
    assert_eq!(created["interval"], Value::Null);
    assert_eq!(created["actions"], Value::Null);
    assert_eq!(created["workflow_id"], Value::Null);
    assert_eq!(created["parameters"], json!([]));
}

#[tokio::test]
async fn trackers_list_newest_first_and_only_own() {
    let app = TestApp::new();
    app.provision(ALICE).await;
    app.provision(BOB).await;

    let a1 = app.create_tracker(ALICE, json!({"name": "a1"})).await;
    let b1 = app.create_tracker(BOB, json!({"name": "b1"})).await;
    let a2 = app.create_tracker(ALICE, json!({"name": "a2"})).await;

    let alice = app.get("/trackers", ALICE).await;
    assert_eq!(alice.status, StatusCode::OK);
    assert_eq!(alice.body, json!([a2, a1]));

    let bob = app.get("/trackers", BOB).await;
    assert_eq!(bob.body, json!([b1]));
}

#[tokio::test]
async fn cross_user_access_is_not_found() {
    let app = TestApp::new();
    let alice_id = app.provision(ALICE).await;
    app.provision(BOB).await;

    let tracker = app.create_tracker(ALICE, tracker_body()).await;
    let id = tracker["id"].as_i64().unwrap();
    add_history(&app, id, alice_id, 1, "secret");
    let uri = format!("/trackers/{id}");

    let get = app.get(&uri, BOB).await;
    assert_eq!(get.status, StatusCode::NOT_FOUND);
    assert_eq!(get.body, json!({"error": "Tracker not found"}));

    let put = app
        .call(Method::PUT, &uri, Some(BOB), Some(json!({"name": "mine now"})))
        .await;
    assert_eq!(put.status, StatusCode::NOT_FOUND);

    let history = app.get(&format!("{uri}/history"), BOB).await;
    assert_eq!(history.status, StatusCode::NOT_FOUND);

    let delete = app.call(Method::DELETE, &uri, Some(BOB), None).await;
    assert_eq!(delete.status, StatusCode::NOT_FOUND);

    let still_there = app.get(&uri, ALICE).await;
    assert_eq!(still_there.status, StatusCode::OK);
    assert_eq!(still_there.body, tracker);
    assert_eq!(count(&app, "SELECT COUNT(*) FROM histories"), 1);
}

#[tokio::test]
async fn empty_update_leaves_tracker_unchanged() {
    let app = TestApp::new();
    app.provision(ALICE).await;
    let tracker = app.create_tracker(ALICE, tracker_body()).await;
    let uri = format!("/trackers/{}", tracker["id"]);

    let resp = app.call(Method::PUT, &uri, Some(ALICE), Some(json!({}))).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, tracker);
    assert_eq!(app.get(&uri, ALICE).await.body, tracker);
}

#[tokio::test]
async fn partial_update_changes_only_sent_fields() {
    let app = TestApp::new();
    app.provision(ALICE).await;
    let tracker = app.create_tracker(ALICE, tracker_body()).await;
    let uri = format!("/trackers/{}", tracker["id"]);

    let resp = app
        .call(
            Method::PUT,
            &uri,
            Some(ALICE),
            Some(json!({"name": "ETH price", "isActive": false, "description": null})),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let mut expected = tracker.clone();
    expected["name"] = json!("ETH price");
    expected["isActive"] = json!(false);
    expected["description"] = Value::Null;
    assert_eq!(resp.body, expected);
    assert_eq!(app.get(&uri, ALICE).await.body, expected);
}

#[tokio::test]
async fn update_round_trips_document_fields() {
    let app = TestApp::new();
    app.provision(ALICE).await;
    let tracker = app.create_tracker(ALICE, tracker_body()).await;
    let uri = format!("/trackers/{}", tracker["id"]);

    for actions in [
        json!("notify"),
        json!(["email", {"type": "sms", "to": "+15550100"}]),
        json!({"webhook": {"url": "https://hooks.example.com", "retries": 3}}),
    ] {
        let resp = app
            .call(Method::PUT, &uri, Some(ALICE), Some(json!({"actions": actions})))
            .await;
        assert_eq!(resp.status, StatusCode::OK, "{actions}");
        assert_eq!(resp.body["actions"], actions);

        let fetched = app.get(&uri, ALICE).await;
        assert_eq!(fetched.status, StatusCode::OK);
        assert_eq!(fetched.body["actions"], actions);

        let listed = app.get("/trackers", ALICE).await;
        assert_eq!(listed.status, StatusCode::OK);
        assert_eq!(listed.body[0]["actions"], actions);
    }

    let parameters = json!([
        {"id": "coin", "type": "dropdown", "label": "Coin", "default": "eth",
         "options": [{"label": "ETH", "value": "eth"}, {"label": "SOL", "value": "sol"}]},
        {"id": "limit", "type": "number", "label": "Limit", "default": 10},
        {"id": "alerts", "type": "boolean", "label": "Alerts", "default": true}
    ]);
    let resp = app
        .call(Method::PUT, &uri, Some(ALICE), Some(json!({"parameters": parameters})))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["parameters"], parameters);

    let fetched = app.get(&uri, ALICE).await;
    assert_eq!(fetched.body["parameters"], parameters);
    assert_eq!(app.get("/trackers", ALICE).await.body[0], fetched.body);
}

#[tokio::test]
async fn foreign_parameter_documents_do_not_hide_trackers() {
    let app = TestApp::new();
    let alice_id = app.provision(ALICE).await;
    let valid = app.create_tracker(ALICE, tracker_body()).await;

    app.store
        .connection()
        .execute(
            "INSERT INTO trackers (user_id, name, parameters) VALUES (?1, 'imported', ?2)",
            rusqlite::params![alice_id, r#"{"symbol":"BTC"}"#],
        )
        .unwrap();

    let resp = app.get("/trackers", ALICE).await;
    assert_eq!(resp.status, StatusCode::OK);
    let list = resp.body.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["name"], json!("imported"));
    assert_eq!(list[0]["parameters"], json!([]));
    assert_eq!(list[1], valid);
}

#[tokio::test]
async fn update_of_missing_tracker_is_not_found() {
    let app = TestApp::new();
    app.provision(ALICE).await;

    for uri in ["/trackers/9999", "/trackers/not-a-number"] {
        let resp = app
            .call(Method::PUT, uri, Some(ALICE), Some(json!({"name": "x"})))
            .await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND, "{uri}");

        let resp = app.call(Method::PUT, uri, Some(ALICE), Some(json!({}))).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn tracker_history_newest_first() {
    let app = TestApp::new();
    let alice_id = app.provision(ALICE).await;
    let tracker = app.create_tracker(ALICE, tracker_body()).await;
    let other = app.create_tracker(ALICE, json!({"name": "other"})).await;
    let id = tracker["id"].as_i64().unwrap();

    add_history(&app, id, alice_id, 3, "oldest");
    add_history(&app, id, alice_id, 1, "newest");
    add_history(&app, id, alice_id, 2, "middle");
    add_history(&app, other["id"].as_i64().unwrap(), alice_id, 0, "other tracker");

    let resp = app.get(&format!("/trackers/{id}/history"), ALICE).await;
    assert_eq!(resp.status, StatusCode::OK);

    let entries = resp.body.as_array().unwrap();
    let summaries: Vec<_> = entries.iter().map(|h| h["summary"].as_str().unwrap()).collect();
    assert_eq!(summaries, vec!["newest", "middle", "oldest"]);

    let first = entries[0].as_object().unwrap();
    let mut keys: Vec<_> = first.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["id", "output", "summary", "timestamp"]);
}

#[tokio::test]
async fn deleting_tracker_removes_it_and_its_history() {
    let app = TestApp::new();
    let alice_id = app.provision(ALICE).await;
    let keep = app.create_tracker(ALICE, json!({"name": "keep"})).await;
    let gone = app.create_tracker(ALICE, json!({"name": "gone"})).await;
    let id = gone["id"].as_i64().unwrap();
    add_history(&app, id, alice_id, 1, "run");

    let uri = format!("/trackers/{id}");
    let resp = app.call(Method::DELETE, &uri, Some(ALICE), None).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert_eq!(resp.body, Value::Null);

    assert_eq!(app.get("/trackers", ALICE).await.body, json!([keep]));
    assert_eq!(app.get(&uri, ALICE).await.status, StatusCode::NOT_FOUND);
    assert_eq!(
        app.get(&format!("{uri}/history"), ALICE).await.status,
        StatusCode::NOT_FOUND
    );

    let again = app.call(Method::DELETE, &uri, Some(ALICE), None).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_user_cascades() {
    let app = TestApp::new();
    let alice_id = app.provision(ALICE).await;
    app.provision(BOB).await;

    for name in ["one", "two"] {
        let tracker = app.create_tracker(ALICE, json!({"name": name})).await;
        add_history(&app, tracker["id"].as_i64().unwrap(), alice_id, 1, name);
    }
    let bobs = app.create_tracker(BOB, json!({"name": "bob's"})).await;

    let resp = app.call(Method::DELETE, "/user", Some(ALICE), None).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    assert_eq!(app.get("/user", ALICE).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/trackers", ALICE).await.status, StatusCode::NOT_FOUND);
    assert_eq!(
        count(&app, &format!("SELECT COUNT(*) FROM trackers WHERE user_id = {alice_id}")),
        0
    );
    assert_eq!(
        count(&app, &format!("SELECT COUNT(*) FROM histories WHERE user_id = {alice_id}")),
        0
    );
    assert_eq!(
        app.identity.deleted.lock().unwrap().as_slice(),
        &["auth-alice".to_string()]
    );

    assert_eq!(app.get("/trackers", BOB).await.body, json!([bobs]));

    let again = app.call(Method::DELETE, "/user", Some(ALICE), None).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn identity_cleanup_failure_does_not_fail_user_deletion() {
    let app = TestApp::with_identity(FakeIdentityProvider::new(true));
    app.provision(ALICE).await;
    app.create_tracker(ALICE, json!({"name": "t"})).await;

    let resp = app.call(Method::DELETE, "/user", Some(ALICE), None).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get("/user", ALICE).await.status, StatusCode::NOT_FOUND);
    assert_eq!(count(&app, "SELECT COUNT(*) FROM trackers"), 0);
}

#[tokio::test]
async fn scenarios_are_shared_and_newest_first() {
    let app = TestApp::new();
    for (name, workflow) in [("Price watch", "wf-1"), ("News digest", "wf-2"), ("Weather", "wf-3")] {
        app.store
            .insert_scenario(&NewScenario {
                name: name.to_string(),
                description: Some(format!("{name} template")),
                parameters: serde_json::from_value(json!([
                    {"id": "topic", "type": "text", "label": "Topic"}
                ]))
                .unwrap(),
                outputs: Some(json!({"format": "markdown"})),
                workflow_id: Some(workflow.to_string()),
            })
            .unwrap();
    }

    // Provisioning is not needed for the shared catalog.
    let alice = app.get("/scenarios", ALICE).await;
    assert_eq!(alice.status, StatusCode::OK);

    let ids: Vec<i64> = alice
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_i64().unwrap())
        .collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(ids, sorted);
    assert_eq!(ids.len(), 3);
    assert_eq!(alice.body[0]["name"], json!("Weather"));
    assert_eq!(alice.body[0]["parameters"][0]["type"], json!("text"));
    assert_eq!(alice.body[0]["outputs"], json!({"format": "markdown"}));

    let bob = app.get("/scenarios", BOB).await;
    assert_eq!(bob.body, alice.body);

    let one = app.get(&format!("/scenarios/{}", ids[1]), BOB).await;
    assert_eq!(one.status, StatusCode::OK);
    assert_eq!(one.body, alice.body[1]);

    assert_eq!(app.get("/scenarios/424242", BOB).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/scenarios/abc", BOB).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn storage_failure_is_generic_500() {
    let app = TestApp::new();
    app.provision(ALICE).await;
    app.store
        .connection()
        .execute_batch("DROP TABLE histories; DROP TABLE trackers;")
        .unwrap();

    let resp = app.get("/trackers", ALICE).await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.body, json!({"error": "Server error"}));
}

#[tokio::test]
async fn malformed_tracker_body_is_rejected_before_storage() {
    let app = TestApp::new();
    app.provision(ALICE).await;

    let resp = app
        .call(
            Method::POST,
            "/trackers",
            Some(ALICE),
            Some(json!({"parameters": [{"id": "x", "type": "colour", "label": "X"}]})),
        )
        .await;
    assert!(resp.status.is_client_error());
    assert_eq!(count(&app, "SELECT COUNT(*) FROM trackers"), 0);
}
