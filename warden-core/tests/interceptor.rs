//! Reactive 401 handling of the request interceptor.

mod support;

use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::TimeDelta;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use support::{
    Harness, REFRESH_PATH, ScriptedTransport, count_events, json_response, mint,
    pair, path_of, status_response, test_config,
};
use warden_core::{
    ApiRequest, ClientError, MultipartField, RefreshError, SessionEventKind, Token,
    TokenKind, TokenStore,
};

const ITEMS_PATH: &str = "/items/";

#[derive(Debug, Deserialize, PartialEq)]
struct Item {
    id: u32,
}

/// Items endpoint that only accepts `fresh`; refresh always hands `fresh` out.
fn accepts_only(fresh: Token) -> ScriptedTransport {
    ScriptedTransport::new(move |request| match path_of(request).as_str() {
        REFRESH_PATH => Ok(json_response(200, json!({ "access": fresh.as_str() }))),
        ITEMS_PATH if request.bearer() == Some(fresh.as_str()) => {
            Ok(json_response(200, json!([{ "id": 1 }])))
        }
        ITEMS_PATH => Ok(status_response(401)),
        _ => Ok(status_response(404)),
    })
}

#[tokio::test]
async fn attaches_bearer_and_passes_through_non_401() {
    let harness = Harness::new(
        test_config(),
        ScriptedTransport::new(|_| Ok(status_response(500))),
    );
    let seeded = pair(TimeDelta::minutes(30));
    harness.seed(&seeded);

    let url = harness.session.client().url(ITEMS_PATH).unwrap();
    let response = harness
        .session
        .client()
        .request(ApiRequest::get(url))
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let sent = harness.transport.requests_to(ITEMS_PATH);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].bearer.as_deref(), Some(seeded.access.as_str()));
    assert_eq!(harness.transport.calls_to(REFRESH_PATH), 0);
}

#[tokio::test]
async fn unauthorized_triggers_one_refresh_and_one_retry() {
    let fresh = mint("user-1", TimeDelta::minutes(30));
    let harness = Harness::new(test_config(), accepts_only(fresh.clone()));
    let stale = pair(TimeDelta::minutes(10));
    harness.seed(&stale);
    let (_sub, refreshed) =
        count_events(harness.session.events(), SessionEventKind::Refreshed);

    let items: Vec<Item> = harness.session.client().get_json(ITEMS_PATH).await.unwrap();

    assert_eq!(items, vec![Item { id: 1 }]);
    assert_eq!(harness.transport.calls_to(REFRESH_PATH), 1);
    let bearers: Vec<_> = harness
        .transport
        .requests_to(ITEMS_PATH)
        .into_iter()
        .map(|call| call.bearer)
        .collect();
    assert_eq!(
        bearers,
        vec![
            Some(stale.access.as_str().to_string()),
            Some(fresh.as_str().to_string())
        ]
    );
    assert_eq!(refreshed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn second_unauthorized_is_returned_as_is() {
    let fresh = mint("user-1", TimeDelta::minutes(30));
    let harness = Harness::new(
        test_config(),
        ScriptedTransport::new(move |request| match path_of(request).as_str() {
            REFRESH_PATH => Ok(json_response(200, json!({ "access": fresh.as_str() }))),
            _ => Ok(status_response(401)),
        }),
    );
    harness.seed(&pair(TimeDelta::minutes(10)));

    let url = harness.session.client().url(ITEMS_PATH).unwrap();
    let response = harness
        .session
        .client()
        .request(ApiRequest::get(url))
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(harness.transport.calls_to(ITEMS_PATH), 2);
    assert_eq!(harness.transport.calls_to(REFRESH_PATH), 1);
}

#[tokio::test]
async fn anonymous_unauthorized_never_refreshes() {
    let harness = Harness::new(
        test_config(),
        ScriptedTransport::new(|_| Ok(status_response(401))),
    );

    let url = harness.session.client().url(ITEMS_PATH).unwrap();
    let response = harness
        .session
        .client()
        .request(ApiRequest::get(url))
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(harness.transport.calls_to(REFRESH_PATH), 0);
    assert_eq!(harness.transport.requests_to(ITEMS_PATH)[0].bearer, None);
    assert!(!harness.session.coordinator().is_refreshing());
}

#[tokio::test]
async fn failed_refresh_surfaces_instead_of_401() {
    let harness = Harness::new(
        test_config(),
        ScriptedTransport::new(|request| match path_of(request).as_str() {
            REFRESH_PATH => Ok(status_response(400)),
            _ => Ok(status_response(401)),
        }),
    );
    harness.seed(&pair(TimeDelta::minutes(10)));
    let (_sub, expired) =
        count_events(harness.session.events(), SessionEventKind::Expired);

    let err = harness
        .session
        .client()
        .get_json::<Vec<Item>>(ITEMS_PATH)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::Refresh(RefreshError::Rejected {
            status: StatusCode::BAD_REQUEST
        })
    ));
    assert_eq!(harness.transport.calls_to(ITEMS_PATH), 1);
    assert_eq!(harness.store.get(TokenKind::Access), None);
    assert_eq!(expired.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_unauthorized_requests_share_one_refresh() {
    let fresh = mint("user-1", TimeDelta::minutes(30));
    let transport = accepts_only(fresh).with_delay(REFRESH_PATH, Duration::from_millis(100));
    let harness = Harness::new(test_config(), transport);
    harness.seed(&pair(TimeDelta::minutes(10)));

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let client = harness.session.client().clone();
            tokio::spawn(async move { client.get_json::<Vec<Item>>(ITEMS_PATH).await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), vec![Item { id: 1 }]);
    }
    assert_eq!(harness.transport.calls_to(REFRESH_PATH), 1);
    assert_eq!(harness.transport.calls_to(ITEMS_PATH), 10);
}

#[tokio::test]
async fn json_bodies_are_negotiated() {
    let harness = Harness::new(
        test_config(),
        ScriptedTransport::new(|_| Ok(json_response(201, json!({ "id": 7 })))),
    );
    harness.seed(&pair(TimeDelta::minutes(30)));

    let created: Item = harness
        .session
        .client()
        .post_json(ITEMS_PATH, &json!({ "name": "thing" }))
        .await
        .unwrap();

    assert_eq!(created, Item { id: 7 });
    let sent = &harness.transport.requests_to(ITEMS_PATH)[0];
    assert_eq!(sent.content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn multipart_skips_negotiation_but_still_refreshes() {
    let fresh = mint("user-1", TimeDelta::minutes(30));
    let upload_token = fresh.clone();
    let harness = Harness::new(
        test_config(),
        ScriptedTransport::new(move |request| match path_of(request).as_str() {
            REFRESH_PATH => {
                Ok(json_response(200, json!({ "access": upload_token.as_str() })))
            }
            "/upload/" if request.bearer() == Some(upload_token.as_str()) => {
                Ok(json_response(200, json!({ "id": 3 })))
            }
            _ => Ok(status_response(401)),
        }),
    );
    harness.seed(&pair(TimeDelta::minutes(10)));

    let uploaded: Item = harness
        .session
        .client()
        .post_multipart(
            "/upload/",
            vec![
                MultipartField::text("title", "poster"),
                MultipartField::file("file", "poster.png", Some("image/png"), vec![0; 16]),
            ],
        )
        .await
        .unwrap();

    assert_eq!(uploaded, Item { id: 3 });
    let sent = harness.transport.requests_to("/upload/");
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|call| call.content_type.is_none()));
    assert_eq!(sent[1].bearer.as_deref(), Some(fresh.as_str()));
}

#[tokio::test]
async fn non_success_status_becomes_status_error() {
    let harness = Harness::new(
        test_config(),
        ScriptedTransport::new(|_| {
            Ok(json_response(404, json!({ "detail": "Not found." })))
        }),
    );
    harness.seed(&pair(TimeDelta::minutes(30)));

    let err = harness
        .session
        .client()
        .get_json::<Item>("/items/9/")
        .await
        .unwrap_err();

    match err {
        ClientError::Status { status, body } => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert!(body.contains("Not found."));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn delete_accepts_empty_success() {
    let harness = Harness::new(
        test_config(),
        ScriptedTransport::new(|_| Ok(status_response(204))),
    );
    harness.seed(&pair(TimeDelta::minutes(30)));

    harness.session.client().delete("/items/1/").await.unwrap();
    let sent = harness.transport.requests_to("/items/1/");
    assert_eq!(sent[0].method, reqwest::Method::DELETE);
}

#[tokio::test(start_paused = true)]
async fn slow_request_times_out() {
    let mut config = test_config();
    config.api.request_timeout = Duration::from_secs(2);
    let transport = ScriptedTransport::new(|_| Ok(status_response(200)))
        .with_delay(ITEMS_PATH, Duration::from_secs(60));
    let harness = Harness::new(config, transport);

    let err = harness
        .session
        .client()
        .delete(ITEMS_PATH)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::Transport(warden_core::TransportError::Timeout(_))
    ));
}
