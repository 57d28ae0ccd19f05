#![cfg(feature = "reqwest")]

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use session_broker::{
	_preludet::*,
	auth::TokenSecret,
	dispatch::{ApiCall, RateLimitQuota, RetryPolicy, SessionExpiryHandler},
	error::RateLimitOrigin,
};

const STALE_ACCESS: &str = "stale-access-token";
const FRESH_ACCESS: &str = "fresh-access-token";

#[derive(Default)]
struct CountingHandler(AtomicUsize);
impl SessionExpiryHandler for CountingHandler {
	fn on_session_expired(&self) {
		self.0.fetch_add(1, Ordering::SeqCst);
	}
}

fn grant_json(token: &str, refresh: &str) -> serde_json::Value {
	json!({
		"user": { "id": 1, "email": "dev@example.com", "username": "dev" },
		"token": token,
		"refreshToken": refresh,
	})
}

fn signed_in_dispatcher(server: &MockServer) -> session_broker::dispatch::ReqwestDispatcher {
	let dispatcher = build_test_dispatcher(&server.base_url());

	dispatcher.session.establish(TokenSecret::new(STALE_ACCESS), TokenSecret::new("refresh-1"));

	dispatcher
}

#[tokio::test]
async fn expired_access_token_is_refreshed_and_the_call_replayed() {
	let server = MockServer::start_async().await;
	let rejected = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/items")
				.header("authorization", format!("Bearer {STALE_ACCESS}"));
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"error":"token expired"}"#);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/auth/refresh")
				.json_body(json!({ "refreshToken": "refresh-1" }));
			then.status(200)
				.header("content-type", "application/json")
				.json_body(grant_json(FRESH_ACCESS, "refresh-2"));
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/items")
				.header("authorization", format!("Bearer {FRESH_ACCESS}"));
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"items":[]}"#);
		})
		.await;
	let dispatcher = signed_in_dispatcher(&server);
	let reply = dispatcher
		.execute(ApiCall::get("/api/items"))
		.await
		.expect("Call should succeed after a transparent refresh.");

	assert_eq!(reply.status, 200);

	rejected.assert_async().await;
	refresh.assert_async().await;
	accepted.assert_async().await;

	let session = dispatcher.session.snapshot().expect("Session should survive the rotation.");

	assert_eq!(session.access_token.expose(), FRESH_ACCESS);
	assert_eq!(session.refresh_token.expose(), "refresh-2");
}

#[tokio::test]
async fn concurrent_unauthorized_calls_share_one_refresh() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/items")
				.header("authorization", format!("Bearer {STALE_ACCESS}"));
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"error":"token expired"}"#);
		})
		.await;

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/auth/refresh")
				.json_body(json!({ "refreshToken": "refresh-1" }));
			then.status(200)
				.header("content-type", "application/json")
				.json_body(grant_json(FRESH_ACCESS, "refresh-2"));
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/items")
				.header("authorization", format!("Bearer {FRESH_ACCESS}"));
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"items":[]}"#);
		})
		.await;

	let dispatcher = std::sync::Arc::new(signed_in_dispatcher(&server));
	let tasks = (0..6)
		.map(|_| {
			let dispatcher = dispatcher.clone();

			tokio::spawn(async move { dispatcher.execute(ApiCall::get("/api/items")).await })
		})
		.collect::<Vec<_>>();

	for task in tasks {
		let reply = task
			.await
			.expect("Task should not panic.")
			.expect("Every concurrent call should succeed after the shared refresh.");

		assert_eq!(reply.status, 200);
	}

	// The rotation endpoint was hit exactly once for all six callers.
	refresh.assert_calls_async(1).await;
}

#[tokio::test]
async fn failed_refresh_expires_the_session_and_fires_the_handler_once() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/items");
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"error":"token expired"}"#);
		})
		.await;

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"error":"refresh token revoked"}"#);
		})
		.await;
	let handler = std::sync::Arc::new(CountingHandler::default());
	let dispatcher = std::sync::Arc::new(
		signed_in_dispatcher(&server).with_expiry_handler(handler.clone()),
	);
	let tasks = (0..4)
		.map(|_| {
			let dispatcher = dispatcher.clone();

			tokio::spawn(async move { dispatcher.execute(ApiCall::get("/api/items")).await })
		})
		.collect::<Vec<_>>();

	for task in tasks {
		let err = task
			.await
			.expect("Task should not panic.")
			.expect_err("Every caller must observe the teardown.");

		assert!(matches!(err, Error::SessionExpired));
	}

	assert!(!dispatcher.session.is_active());
	// Only the task that performed the failed rotation fired the side effect.
	assert_eq!(handler.0.load(Ordering::SeqCst), 1);
	refresh.assert_calls_async(1).await;
}

#[tokio::test]
async fn server_errors_consume_the_retry_budget_then_surface() {
	let server = MockServer::start_async().await;
	let failing = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/items");
			then.status(503)
				.header("content-type", "application/json")
				.body(r#"{"error":"maintenance window"}"#);
		})
		.await;
	let dispatcher = build_test_dispatcher(&server.base_url())
		.with_retry_policy(RetryPolicy::new(Duration::milliseconds(5), 2));
	let err = dispatcher
		.execute(ApiCall::get("/api/items"))
		.await
		.expect_err("Persistent 5xx must exhaust the retry budget.");

	match err {
		Error::Server { status, message } => {
			assert_eq!(status, 503);
			assert_eq!(message, "maintenance window");
		},
		err => panic!("Expected a server error, got {err:?}."),
	}

	// Initial attempt plus two retries.
	failing.assert_calls_async(3).await;
}

#[tokio::test]
async fn server_rate_limit_surfaces_retry_after_without_retrying() {
	let server = MockServer::start_async().await;
	let limited = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/items");
			then.status(429).header("retry-after", "30").body("");
		})
		.await;
	let dispatcher = build_test_dispatcher(&server.base_url());
	let err = dispatcher
		.execute(ApiCall::post("/api/items", json!({ "name": "hammer" })))
		.await
		.expect_err("429 must surface immediately.");

	assert!(matches!(err, Error::RateLimited { origin: RateLimitOrigin::Server, .. }));
	assert_eq!(err.retry_after(), Some(Duration::seconds(30)));
	limited.assert_calls_async(1).await;
}

#[tokio::test]
async fn local_rate_limit_never_reaches_the_network() {
	let server = MockServer::start_async().await;
	let endpoint = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/items");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;
	let dispatcher = build_test_dispatcher(&server.base_url())
		.with_rate_limit_quota(RateLimitQuota::new(2, Duration::seconds(60)));

	for _ in 0..2 {
		dispatcher
			.execute(ApiCall::get("/api/items"))
			.await
			.expect("Calls within the quota should pass.");
	}

	let err = dispatcher
		.execute(ApiCall::get("/api/items"))
		.await
		.expect_err("Third call must be denied locally.");

	assert!(matches!(err, Error::RateLimited { origin: RateLimitOrigin::Client, .. }));
	assert!(err.retry_after().unwrap_or(Duration::ZERO) > Duration::ZERO);
	endpoint.assert_calls_async(2).await;
}

#[tokio::test]
async fn bodyless_success_yields_the_empty_reply_sentinel() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(DELETE).path("/api/items/7");
			then.status(204);
		})
		.await;

	let dispatcher = build_test_dispatcher(&server.base_url());
	let reply = dispatcher
		.execute(ApiCall::delete("/api/items/7"))
		.await
		.expect("DELETE should succeed.");

	assert_eq!(reply.status, 204);
	assert!(reply.is_empty());
}

#[tokio::test]
async fn rejection_on_the_refresh_endpoint_itself_is_terminal() {
	let server = MockServer::start_async().await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid refresh token"}"#);
		})
		.await;
	let dispatcher = build_test_dispatcher(&server.base_url());
	let err = dispatcher
		.execute(ApiCall::post("/api/auth/refresh", json!({ "refreshToken": "stale" })))
		.await
		.expect_err("401 on the refresh endpoint must not trigger another refresh.");

	assert!(matches!(err, Error::InvalidRefreshToken));
	// No refresh-and-replay loop: one call total.
	refresh.assert_calls_async(1).await;
}
