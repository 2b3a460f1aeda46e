//! Session-token lifecycle for Collabri clients: one live access token, singleflight refresh on
//! `401`, FIFO replay of queued requests, and navigation guards over a pluggable transport.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod http;
pub mod obs;
pub mod refresh;
pub mod session;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		client::SessionClient,
		config::ClientConfig,
		http::ReqwestTransport,
		store::{MemoryPersistence, SessionPersistence},
	};

	/// Session client type alias used by reqwest-backed integration tests.
	pub type ReqwestTestClient = SessionClient<ReqwestTransport>;

	/// Builds a client config pointing at a mock server base URL.
	pub fn test_config(base_url: &str) -> ClientConfig {
		ClientConfig::builder(
			Url::parse(base_url).expect("Mock server base URL should parse successfully."),
		)
		.refresh_timeout(std::time::Duration::from_secs(2))
		.build()
		.expect("Test client config should build successfully.")
	}

	/// Constructs a [`SessionClient`] backed by in-memory persistence and the reqwest
	/// transport used across client tests.
	pub fn build_reqwest_test_client(base_url: &str) -> (ReqwestTestClient, Arc<MemoryPersistence>) {
		let config = test_config(base_url);
		let persistence_backend = Arc::new(MemoryPersistence::default());
		let persistence: Arc<dyn SessionPersistence> = persistence_backend.clone();
		let transport = ReqwestTransport::new(&config)
			.expect("Failed to build reqwest transport for tests.");
		let client = SessionClient::init(config, transport, persistence);

		(client, persistence_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
