mod common;

use axum::http::StatusCode;
use futures_util::future::join_all;
use serde_json::json;

use crate::common::{spawn_app, Caller};

#[tokio::test]
async fn test_comment_with_mentions_adds_participants() {
    let app = spawn_app().await;
    let staff = Caller::staff();
    let id = app.create_ticket(json!({ "ticket_type": "rma" })).await;
    let uri = format!("/tickets/{}/activities", id);

    let (status, comment) = app
        .post(
            &uri,
            &staff,
            json!({
                "content": "Please check the logs @[Li Wei](12) @[Ops](7) @[Li Wei](12)",
                "visibility": "internal"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", comment);
    assert_eq!(comment["activity_type"], "comment");
    assert_eq!(comment["visibility"], "internal");
    assert_eq!(comment["actor"]["name"], "Mia Support");

    let (_, log) = app.get(&format!("{}?activity_type=mention", uri), &staff).await;
    assert_eq!(log["pagination"]["total"], 1);
    let mention = &log["activities"][0];
    assert_eq!(mention["visibility"], "internal");
    assert_eq!(mention["metadata"]["activity_id"], comment["id"]);
    assert_eq!(mention["metadata"]["mentions"].as_array().unwrap().len(), 2);

    let (_, detail) = app.get(&format!("/tickets/{}", id), &staff).await;
    let participants = detail["participants"].as_array().unwrap();
    assert_eq!(participants.len(), 2);
    assert_eq!(participants[0]["user_id"], 12);
    assert_eq!(participants[0]["role"], "mentioned");
    assert_eq!(participants[0]["added_by"], 1);

    // Mentioning an existing participant again does not duplicate them
    app.post(&uri, &staff, json!({ "content": "@[Ops](7) any news?" }))
        .await;
    let (_, detail) = app.get(&format!("/tickets/{}", id), &staff).await;
    assert_eq!(detail["participants"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_dealers_never_see_internal_notes() {
    let app = spawn_app().await;
    let staff = Caller::staff();
    let dealer = Caller::dealer(40, 3);
    let id = app
        .create_ticket(json!({ "ticket_type": "svc", "dealer_id": 3 }))
        .await;
    let uri = format!("/tickets/{}/activities", id);

    app.post(
        &uri,
        &staff,
        json!({ "content": "Customer is difficult", "visibility": "internal" }),
    )
    .await;
    app.post(&uri, &staff, json!({ "content": "Parts shipped" }))
        .await;

    // A dealer asking for internal entries still only gets shared ones
    let (status, seen) = app.get(&format!("{}?visibility=internal", uri), &dealer).await;
    assert_eq!(status, StatusCode::OK);
    let contents: Vec<&str> = seen["activities"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|a| a["content"].as_str())
        .collect();
    assert!(contents.contains(&"Parts shipped"));
    assert!(!contents.contains(&"Customer is difficult"));

    // Dealer comments are always shared
    let (status, posted) = app
        .post(
            &uri,
            &dealer,
            json!({ "content": "Unit received", "visibility": "internal" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(posted["visibility"], "all");
    assert_eq!(posted["actor"]["role"], "DL");

    let (_, internal) = app.get(&format!("{}?visibility=internal", uri), &staff).await;
    assert_eq!(internal["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_first_staff_comment_stamps_first_response() {
    let app = spawn_app().await;
    let staff = Caller::staff();
    let dealer = Caller::dealer(41, 5);
    let id = app
        .create_ticket(json!({ "ticket_type": "inquiry", "dealer_id": 5 }))
        .await;
    let uri = format!("/tickets/{}", id);

    app.post(
        &format!("{}/activities", uri),
        &dealer,
        json!({ "content": "Any update?" }),
    )
    .await;
    let (_, detail) = app.get(&uri, &staff).await;
    assert!(detail["first_response_at"].is_null());

    let (_, reply) = app
        .post(
            &format!("{}/activities", uri),
            &staff,
            json!({ "content": "Looking into it" }),
        )
        .await;
    let (_, detail) = app.get(&uri, &staff).await;
    assert_eq!(detail["first_response_at"], reply["created_at"]);

    app.post(
        &format!("{}/activities", uri),
        &staff,
        json!({ "content": "Still looking" }),
    )
    .await;
    let (_, again) = app.get(&uri, &staff).await;
    assert_eq!(again["first_response_at"], reply["created_at"]);
}

#[tokio::test]
async fn test_timeline_is_newest_first_and_filterable() {
    let app = spawn_app().await;
    let staff = Caller::staff();
    let id = app.create_ticket(json!({ "ticket_type": "inquiry" })).await;
    let uri = format!("/tickets/{}", id);

    app.patch(&uri, &staff, json!({ "current_node": "in_progress" }))
        .await;
    app.post(
        &format!("{}/activities", uri),
        &staff,
        json!({ "content": "Called the customer" }),
    )
    .await;

    let (_, log) = app.get(&format!("{}/activities", uri), &staff).await;
    assert_eq!(log["pagination"]["total"], 3);
    assert_eq!(log["activities"][0]["activity_type"], "comment");
    assert_eq!(log["activities"][2]["activity_type"], "status_change");
    assert!(log["activities"][2]["metadata"]["from_node"].is_null());

    let (_, page) = app
        .get(&format!("{}/activities?page_size=1&page=2", uri), &staff)
        .await;
    assert_eq!(page["activities"][0]["activity_type"], "status_change");
    assert_eq!(page["activities"][0]["metadata"]["to_node"], "in_progress");
    assert_eq!(page["pagination"]["total_pages"], 3);

    let (status, err) = app
        .get(&format!("{}/activities?activity_type=gossip", uri), &staff)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_comment_requires_content() {
    let app = spawn_app().await;
    let staff = Caller::staff();
    let id = app.create_ticket(json!({ "ticket_type": "inquiry" })).await;
    let uri = format!("/tickets/{}/activities", id);

    for body in [json!({}), json!({ "content": "   " })] {
        let (status, err) = app.post(&uri, &staff, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "VALIDATION_ERROR");
    }

    let (status, _) = app
        .post("/tickets/777/activities", &staff, json!({ "content": "hello" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, log) = app.get(&uri, &staff).await;
    assert_eq!(log["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_concurrent_mentions_all_join_participants() {
    let app = spawn_app().await;
    let staff = Caller::staff();
    let id = app.create_ticket(json!({ "ticket_type": "svc" })).await;
    let uri = format!("/tickets/{}/activities", id);

    let requests = (20..28).map(|user_id| {
        let (app, staff, uri) = (&app, &staff, &uri);
        async move {
            app.post(
                uri,
                staff,
                json!({ "content": format!("@[User {}]({}) please check", user_id, user_id) }),
            )
            .await
        }
    });
    for (status, body) in join_all(requests).await {
        assert_eq!(status, StatusCode::OK, "{}", body);
    }

    let (_, detail) = app.get(&format!("/tickets/{}", id), &staff).await;
    let mut joined: Vec<i64> = detail["participants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["user_id"].as_i64().unwrap())
        .collect();
    joined.sort_unstable();
    assert_eq!(joined, (20..28).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_concurrent_moves_to_one_node_log_a_single_change() {
    let app = spawn_app().await;
    let staff = Caller::staff();
    let id = app.create_ticket(json!({ "ticket_type": "inquiry" })).await;
    let uri = format!("/tickets/{}", id);

    let requests = (0..5).map(|_| {
        let (app, staff, uri) = (&app, &staff, &uri);
        async move {
            app.patch(uri, staff, json!({ "current_node": "in_progress" }))
                .await
        }
    });
    for (status, body) in join_all(requests).await {
        assert_eq!(status, StatusCode::OK, "{}", body);
    }

    let (_, log) = app
        .get(&format!("{}/activities?activity_type=status_change", uri), &staff)
        .await;
    // Creation plus exactly one move
    assert_eq!(log["pagination"]["total"], 2);
    assert_eq!(log["activities"][0]["metadata"]["to_node"], "in_progress");
}
