#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::time::Duration;

use common::{BASE_URL, Harness, Reply, ScriptedTransport, users_page};
use convokit::{
    ClientError, DELETE_ALL_CONFIRMATION, DeleteMany, ListOptions, LogLevel, Operation,
    ResourceSpec, WIPE_CONFIRMATION,
};
use http::Method;
use serde_json::{Value, json};
use url::Url;

fn deleted_ids(h: &Harness) -> Vec<String> {
    h.transport
        .requests()
        .iter()
        .filter(|r| r.method == Method::DELETE)
        .map(|r| r.url.rsplit('/').next().unwrap().to_owned())
        .collect()
}

#[tokio::test]
async fn delete_many_returns_results_in_id_order() {
    let transport = ScriptedTransport::new(|req| {
        let id = req.url.rsplit('/').next().unwrap();
        let delay = if id == "u1" { Duration::from_millis(20) } else { Duration::ZERO };
        Reply::empty(204).after(delay)
    });
    let h = Harness::new(transport);
    let ids = ["u1", "u2", "u3", "u4", "u5"];

    let request = DeleteMany::new(Operation::default().with_name("users.deleteMany"), ids)
        .base_list_url("/v0.3/users");
    let out = h.executor().delete_many(request).await.unwrap();

    assert_eq!(out, json!([null, null, null, null, null]));
    assert_eq!(deleted_ids(&h), ids);
    assert!(
        h.transport
            .urls()
            .iter()
            .all(|u| u.starts_with(&format!("{BASE_URL}/v0.3/users/")))
    );
    assert_eq!(h.tokens.count(), 1);
    assert!(h.sink.entries().is_empty());
}

#[tokio::test]
async fn delete_many_reports_the_first_failure_once() {
    let transport = ScriptedTransport::new(|req| {
        if req.url.ends_with("/u3") {
            Reply::json(
                403,
                json!({
                    "title": "Forbidden",
                    "code": "user:error:forbidden",
                    "detail": "not yours",
                }),
            )
        } else {
            Reply::empty(204)
        }
    });
    let h = Harness::new(transport);
    let model = h.client.model(ResourceSpec::users());

    let request = DeleteMany::new(Operation::default(), ["u1", "u2", "u3", "u4"])
        .base_list_url("/v0.3/users");
    let err = model.delete_many(request).await.unwrap_err();

    assert_eq!(err.to_string(), "Vonage Error: Forbidden | user:error:forbidden | not yours");
    assert_eq!(err.operation(), "users.deleteMany");
    assert_eq!(h.transport.request_count(), 4);
    assert_eq!(h.sink.messages(), vec!["users.deleteMany: [x] error"]);
}

#[tokio::test]
async fn delete_many_needs_a_base_list_url() {
    let h = Harness::new(ScriptedTransport::routes(vec![]));

    let err = h
        .executor()
        .delete_many(DeleteMany::new(Operation::default(), ["u1"]))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Precondition { .. }));
    assert_eq!(h.tokens.count(), 0);
    assert_eq!(h.transport.request_count(), 0);
}

#[tokio::test]
async fn guarded_delete_with_ids_skips_the_listing() {
    let h = Harness::new(ScriptedTransport::new(|_| Reply::empty(204)));
    let model = h.client.model(ResourceSpec::users());

    model
        .delete_many_guarded(&["u1".to_owned(), "u2".to_owned()], "")
        .await
        .unwrap();

    assert_eq!(deleted_ids(&h), vec!["u1", "u2"]);
    assert!(h.transport.requests().iter().all(|r| r.method == Method::DELETE));
}

#[tokio::test]
async fn guarded_delete_of_everything_needs_confirmation() {
    let h = Harness::new(ScriptedTransport::routes(vec![]));
    let model = h.client.model(ResourceSpec::conversations());

    let err = model.delete_many_guarded(&[], "yes").await.unwrap_err();

    assert!(err.to_string().contains("without the confirmation"));
    assert_eq!(h.transport.request_count(), 0);
    assert_eq!(h.tokens.count(), 0);
}

#[tokio::test]
async fn guarded_delete_lists_then_deletes_everything() {
    let transport = ScriptedTransport::new(|req| {
        if req.method == Method::GET {
            Reply::json(200, users_page(0, 3, None))
        } else {
            Reply::empty(204)
        }
    });
    let h = Harness::new(transport);
    let model = h.client.model(ResourceSpec::users());

    let out = model
        .delete_many_guarded(&[], DELETE_ALL_CONFIRMATION)
        .await
        .unwrap();

    assert_eq!(out, json!([null, null, null]));
    assert_eq!(h.transport.urls()[0], format!("{BASE_URL}/v0.3/users?page_size=100"));
    assert_eq!(deleted_ids(&h), vec!["USR-0", "USR-1", "USR-2"]);
    assert_eq!(h.tokens.count(), 1);
    assert!(
        h.sink
            .entries()
            .iter()
            .any(|e| {
                e.level == LogLevel::Warn && e.message == "users.deleteMany: deleting every users"
            })
    );
}

#[tokio::test]
async fn guarded_delete_refuses_large_collections() {
    let transport = ScriptedTransport::new(|req| {
        let cursor: usize = Url::parse(&req.url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "cursor")
            .map_or(0, |(_, v)| v.parse().unwrap());
        let next = (cursor < 7)
            .then(|| format!("{BASE_URL}/v0.3/users?page_size=100&cursor={}", cursor + 1));
        Reply::json(200, users_page(cursor * 100, 100, next.as_deref()))
    });
    let h = Harness::new(transport);
    let model = h.client.model(ResourceSpec::users());

    let err = model
        .delete_many_guarded(&[], DELETE_ALL_CONFIRMATION)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Precondition { .. }));
    assert!(err.to_string().contains("refusing to delete 800 users"));
    assert!(deleted_ids(&h).is_empty());
}

#[tokio::test]
async fn create_many_shares_one_token_and_keeps_input_order() {
    let transport = ScriptedTransport::new(|req| {
        let name = req.body.as_ref().unwrap()["name"].as_str().unwrap().to_owned();
        let delay = if name == "alice" { Duration::from_millis(20) } else { Duration::ZERO };
        Reply::json(201, json!({"id": format!("USR-{name}"), "name": name})).after(delay)
    });
    let h = Harness::new(transport);
    let model = h.client.model(ResourceSpec::users());

    let created = model
        .create_many(vec![json!({"name": "alice"}), json!({"name": "bob"})], None)
        .await
        .unwrap();

    let ids: Vec<&str> = created.iter().map(|c| c["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["USR-alice", "USR-bob"]);
    assert_eq!(h.tokens.count(), 1);
    assert!(h.transport.requests().iter().all(|r| r.method == Method::POST));
}

#[tokio::test]
async fn update_many_uses_the_resource_update_method() {
    let transport = ScriptedTransport::new(|req| {
        let id = req.url.rsplit('/').next().unwrap();
        Reply::json(200, json!({"id": id, "state": "JOINED"}))
    });
    let h = Harness::new(transport);
    let model = h.client.model(ResourceSpec::members("CON-1"));

    let updated = model
        .update_many(
            vec![
                ("MEM-1".to_owned(), json!({"state": "JOINED"})),
                ("MEM-2".to_owned(), json!({"state": "JOINED"})),
            ],
            None,
        )
        .await
        .unwrap();

    assert_eq!(updated.len(), 2);
    let requests = h.transport.requests();
    assert!(requests.iter().all(|r| r.method == Method::PATCH));
    assert_eq!(requests[0].url, format!("{BASE_URL}/v0.3/conversations/CON-1/members/MEM-1"));
    assert_eq!(h.tokens.count(), 1);
}

#[tokio::test]
async fn list_prefers_ids_over_filters_and_warns() {
    let transport = ScriptedTransport::new(|req| {
        let id = req.url.rsplit('/').next().unwrap();
        Reply::json(200, json!({"id": id}))
    });
    let h = Harness::new(transport);
    let model = h.client.model(ResourceSpec::users());

    let envelope = model
        .list(ListOptions::new().ids(["USR-1"]).filter("order", "asc"))
        .await
        .unwrap();

    assert_eq!(envelope["_embedded"]["users"], json!([{"id": "USR-1"}]));
    assert_eq!(h.transport.urls(), vec![format!("{BASE_URL}/v0.3/users/USR-1")]);
    assert_eq!(h.sink.count(LogLevel::Warn), 1);
}

#[tokio::test]
async fn wipe_deletes_users_then_conversations_then_legs() {
    let transport = ScriptedTransport::new(|req| {
        if req.method != Method::GET {
            return Reply::empty(204);
        }
        let path = Url::parse(&req.url).unwrap().path().to_owned();
        let key = path.rsplit('/').next().unwrap();
        let prefix = key[..3].to_uppercase();
        let item = if key == "legs" {
            json!({"uuid": format!("{prefix}-1"), "type": "app"})
        } else {
            json!({"id": format!("{prefix}-1")})
        };
        let mut page = json!({"page_size": 1, "_embedded": {}, "_links": {}});
        page["_embedded"][key] = json!([item]);
        Reply::json(200, page)
    });
    let h = Harness::new(transport);

    h.client.delete_all_resources(WIPE_CONFIRMATION).await.unwrap();

    let deleted: Vec<String> = h
        .transport
        .requests()
        .iter()
        .filter(|r| r.method == Method::DELETE)
        .map(|r| r.url.trim_start_matches(BASE_URL).to_owned())
        .collect();
    assert_eq!(
        deleted,
        vec!["/v0.3/users/USE-1", "/v0.3/conversations/CON-1", "/v0.3/legs/LEG-1"]
    );
}

fn legs_page(items: Value) -> Value {
    json!({
        "page_size": 1,
        "_embedded": {"legs": items},
        "_links": {"self": {"href": format!("{BASE_URL}/v0.3/legs?page_size=100")}},
    })
}

#[tokio::test]
async fn legs_list_and_delete_by_uuid() {
    let transport = ScriptedTransport::new(|req| {
        if req.method == Method::GET {
            Reply::json(200, legs_page(json!([{"uuid": "LEG-1", "type": "app"}])))
        } else {
            Reply::empty(204)
        }
    });
    let h = Harness::new(transport);
    let legs = h.client.model(ResourceSpec::legs());

    let page = legs.list(ListOptions::new()).await.unwrap();
    assert_eq!(page["_embedded"]["legs"][0]["uuid"], "LEG-1");

    legs.delete_many_guarded(&[], DELETE_ALL_CONFIRMATION).await.unwrap();
    assert_eq!(deleted_ids(&h), vec!["LEG-1"]);
}

#[tokio::test]
async fn guarded_delete_rejects_items_without_an_identifier() {
    let transport = ScriptedTransport::new(|_| {
        Reply::json(200, legs_page(json!([{"uuid": "LEG-1"}, {"type": "app"}])))
    });
    let h = Harness::new(transport);
    let legs = h.client.model(ResourceSpec::legs());

    let err = legs
        .delete_many_guarded(&[], DELETE_ALL_CONFIRMATION)
        .await
        .unwrap_err();

    let violations = err.violations().expect("validation error");
    assert_eq!(violations.for_field("_embedded.legs[1].uuid").count(), 1);
    assert!(deleted_ids(&h).is_empty());
}

#[tokio::test]
async fn wipe_stops_at_the_first_failure() {
    let transport = ScriptedTransport::new(|req| {
        if req.method == Method::GET && req.url.contains("/users") {
            Reply::text(500, "listing broke")
        } else {
            Reply::json(200, Value::Null)
        }
    });
    let h = Harness::new(transport);

    let err = h.client.delete_all_resources(WIPE_CONFIRMATION).await.unwrap_err();

    assert_eq!(err.to_string(), "listing broke");
    assert_eq!(h.transport.request_count(), 1);
}
