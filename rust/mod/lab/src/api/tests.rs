use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use labtrack_core::{Actor, Claims, Role};

use crate::service::{testing, LabService};

fn claims_of(actor: &Actor) -> Claims {
    Claims {
        sub: actor.id.clone(),
        email: actor.email.clone(),
        role: actor.role,
        lab_id: actor.lab_id.clone(),
        iat: 0,
        exp: i64::MAX,
    }
}

fn setup() -> (Arc<LabService>, Router) {
    let svc = Arc::new(testing::service());
    let app = super::router(svc.clone());
    (svc, app)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    actor: Option<&Actor>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder.extension(claims_of(actor));
    }
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn requests_without_claims_are_unauthorized() {
    let (_svc, app) = setup();
    let (status, body) = send(&app, Method::GET, "/assets", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn create_and_fetch_asset() {
    let (svc, app) = setup();
    let root = testing::root();
    let lab = testing::lab(&svc, "CSE-01");

    let (status, created) = send(
        &app,
        Method::POST,
        "/assets",
        Some(&root),
        Some(json!({
            "assetId": "OSC-7",
            "name": "Oscilloscope",
            "allocatedLab": lab.id,
            "quantity": 3,
            "rate": 1500.0
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["totalAmount"], 4500.0);
    assert_eq!(created["approved"], false);

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = send(&app, Method::GET, &format!("/assets/{id}"), Some(&root), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["assetId"], "OSC-7");

    let (status, list) = send(
        &app,
        Method::GET,
        &format!("/assets?lab={}&limit=10", lab.id),
        Some(&root),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);

    let (status, body) = send(&app, Method::GET, "/assets/nope", Some(&root), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn dual_approval_over_http() {
    let (svc, app) = setup();
    let lab = testing::lab(&svc, "EEE-02");
    let asset = testing::asset(&svc, &lab.id, "WS-1");
    let hod = testing::user(&svc, "hod@college.edu", Role::Hod, None);
    let incharge = testing::user(&svc, "inc@college.edu", Role::LabIncharge, Some(&lab.id));

    let uri = format!("/assets/{}/@approve", asset.id);
    let (status, body) = send(&app, Method::POST, &uri, Some(&hod), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["approved"], false);

    let (status, body) = send(&app, Method::POST, &uri, Some(&hod), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, body) = send(&app, Method::POST, &uri, Some(&incharge), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["approved"], true);
}

#[tokio::test]
async fn admin_approval_slot_from_body() {
    let (svc, app) = setup();
    let root = testing::root();
    let lab = testing::lab(&svc, "MECH-1");
    let asset = testing::asset(&svc, &lab.id, "LATHE-1");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/assets/{}/@approve", asset.id),
        Some(&root),
        Some(json!({"as": "lab_incharge"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["approvedByLabIncharge"], "root");
    assert!(body["approvedBy"].is_null());
}

#[tokio::test]
async fn receive_transfer_once() {
    let (svc, app) = setup();
    let root = testing::root();
    let from = testing::lab(&svc, "A-1");
    let to = testing::lab(&svc, "B-1");
    let asset = testing::asset(&svc, &from.id, "PC-9");
    let receiver = testing::user(&svc, "b@college.edu", Role::LabIncharge, Some(&to.id));

    let (status, transfer) = send(
        &app,
        Method::POST,
        "/transfers",
        Some(&root),
        Some(json!({"assetId": asset.id, "toLab": to.id, "reason": "rebalancing"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(transfer["status"], "pending");

    let uri = format!("/transfers/{}/@receive", transfer["id"].as_str().unwrap());
    let (status, received) = send(&app, Method::POST, &uri, Some(&receiver), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(received["status"], "received");
    assert_eq!(received["receivedBy"], receiver.id.as_str());

    let (status, _) = send(&app, Method::POST, &uri, Some(&receiver), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, moved) = send(&app, Method::GET, &format!("/assets/{}", asset.id), Some(&root), None).await;
    assert_eq!(moved["allocatedLab"], to.id.as_str());
}

#[tokio::test]
async fn activity_is_read_only() {
    let (svc, app) = setup();
    let root = testing::root();
    testing::lab(&svc, "LOG-1");

    let (status, list) = send(&app, Method::GET, "/activity", Some(&root), None).await;
    assert_eq!(status, StatusCode::OK);
    let id = list["items"][0]["id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, Method::DELETE, &format!("/activity/{id}"), Some(&root), None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/activity/{id}"),
        Some(&root),
        Some(json!({"success": false})),
    )
    .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn notification_read_flow() {
    let (svc, app) = setup();
    let lab = testing::lab(&svc, "NOT-1");
    let incharge = testing::user(&svc, "n@college.edu", Role::LabIncharge, Some(&lab.id));
    testing::asset(&svc, &lab.id, "SCOPE-1");

    let (status, count) = send(&app, Method::GET, "/notifications/@count", Some(&incharge), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count["unread"], 1);

    let (_, list) = send(&app, Method::GET, "/notifications?unread=true", Some(&incharge), None).await;
    let id = list["items"][0]["id"].as_str().unwrap().to_string();

    let (status, n) = send(
        &app,
        Method::POST,
        &format!("/notifications/{id}/@read"),
        Some(&incharge),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(n["read"], true);

    let (status, n) = send(
        &app,
        Method::POST,
        &format!("/notifications/{id}/@read"),
        Some(&incharge),
        Some(json!({"read": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(n["read"], false);

    let (_, all) = send(&app, Method::POST, "/notifications/@read-all", Some(&incharge), None).await;
    assert_eq!(all["updated"], 1);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/notifications/{id}"),
        Some(&testing::root()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn rpc_procedures() {
    let (svc, app) = setup();
    let lab = testing::lab(&svc, "RPC-1");
    let assistant = testing::user(&svc, "a@college.edu", Role::LabAssistant, Some(&lab.id));
    let hod = testing::user(&svc, "h@college.edu", Role::Hod, None);

    let (status, body) = send(
        &app,
        Method::POST,
        "/rpc/check_lab_permission",
        Some(&assistant),
        Some(json!({"labId": lab.id, "action": "delete"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], false);

    let (status, _) = send(
        &app,
        Method::POST,
        "/rpc/check_lab_permission",
        Some(&assistant),
        Some(json!({"userId": hod.id, "labId": lab.id, "action": "delete"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::POST,
        "/rpc/check_lab_permission",
        Some(&hod),
        Some(json!({"userId": assistant.id, "labId": lab.id, "action": "create"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], true);

    let (status, logged) = send(
        &app,
        Method::POST,
        "/rpc/log_activity",
        Some(&assistant),
        Some(json!({
            "userId": "someone-else",
            "actionType": "read",
            "entityType": "labs",
            "entityId": lab.id
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logged["userId"], assistant.id.as_str());

    let (status, stats) = send(
        &app,
        Method::POST,
        "/rpc/get_activity_stats",
        Some(&hod),
        Some(json!({"days": 7})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["days"], 7);

    let (status, _) = send(&app, Method::POST, "/rpc/drop_tables", Some(&hod), Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn changes_long_poll_wakes_on_write() {
    let (svc, app) = setup();
    let root = testing::root();
    let since = svc.feed().latest();

    let poll = {
        let app = app.clone();
        let root = root.clone();
        tokio::spawn(async move {
            send(
                &app,
                Method::GET,
                &format!("/changes?since={since}&timeout=5"),
                Some(&root),
                None,
            )
            .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let lab = testing::lab(&svc, "FEED-1");

    let (status, batch) = poll.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let events = batch["events"].as_array().unwrap();
    assert!(events
        .iter()
        .any(|e| e["table"] == "labs" && e["id"] == lab.id.as_str() && e["op"] == "insert"));
    assert!(batch["latest"].as_u64().unwrap() > since);
}

#[tokio::test]
async fn changes_times_out_empty() {
    let (svc, app) = setup();
    let since = svc.feed().latest();
    let (status, batch) = send(
        &app,
        Method::GET,
        &format!("/changes?since={since}&timeout=0"),
        Some(&testing::root()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(batch["events"].as_array().unwrap().len(), 0);
    assert_eq!(batch["resync"], false);
}
