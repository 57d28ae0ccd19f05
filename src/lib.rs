//! Session-token lifecycle broker—rotating refresh-token stores, singleflight session refresh,
//! and a self-throttling retrying API dispatcher in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

#[cfg(test)]
use session_broker as _;

pub mod auth;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod issuer;
pub mod obs;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		dispatch::{Dispatcher, ReqwestDispatcher},
		endpoint::{AuthEndpoint, MemoryUserDirectory, RegisterRequest, UserDirectory, wire::SessionGrant},
		http::ReqwestTransport,
		issuer::{IssuerConfig, TokenIssuer},
		store::{MemoryTokenStore, RefreshTokenStore},
	};

	/// Signing secret shared by every issuer built for tests.
	pub const TEST_SIGNING_SECRET: &str = "test-signing-secret";

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.cookie_store(true)
			.danger_accept_invalid_certs(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Constructs a [`Dispatcher`] wired to the given origin with the insecure test transport.
	pub fn build_test_dispatcher(origin: &str) -> ReqwestDispatcher {
		Dispatcher::with_transport(origin, test_reqwest_transport())
			.expect("Test origin should parse.")
	}

	/// Constructs an [`AuthEndpoint`] backed by in-memory collaborators, returning the backing
	/// store and directory so tests can inspect them directly.
	pub fn build_test_endpoint() -> (AuthEndpoint, Arc<MemoryTokenStore>, Arc<MemoryUserDirectory>)
	{
		let store_backend = Arc::new(MemoryTokenStore::default());
		let store: Arc<dyn RefreshTokenStore> = store_backend.clone();
		let directory_backend = Arc::new(MemoryUserDirectory::default());
		let directory: Arc<dyn UserDirectory> = directory_backend.clone();
		let issuer = TokenIssuer::new(IssuerConfig::new(TEST_SIGNING_SECRET));

		(AuthEndpoint::new(issuer, store, directory), store_backend, directory_backend)
	}

	/// Registers a throwaway user and returns its initial session grant.
	pub async fn register_test_user(
		endpoint: &AuthEndpoint,
		email: &str,
		password: &str,
	) -> SessionGrant {
		let username = email.split('@').next().unwrap_or(email).to_owned();

		endpoint
			.register(RegisterRequest {
				email: email.to_owned(),
				username,
				password: password.to_owned(),
			})
			.await
			.expect("Test registration should succeed.")
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
