//! Bearer-token middleware for HTTP clients: attach access tokens to outgoing requests, renew
//! them single-flight when they are missing, and park concurrent requests until the renewal lands.
//!
//! The crate is organized around three pieces:
//!
//! - [`refresh::Coordinator`] owns the single-flight state machine, the follower queue, and the
//!   retry policy for the renewal call.
//! - [`interceptor::RefreshInterceptor`] decides per request whether to bypass, attach the current
//!   credential, lead a renewal, or wait for one.
//! - [`store::CredentialStore`] and [`transport::RenewalTransport`] are the pluggable seams for
//!   credential persistence and the renewal HTTP call.
//!
//! With the `middleware` feature, [`middleware::RefreshMiddleware`] plugs the interceptor into a
//! `reqwest_middleware` client stack.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod config;
pub mod error;
pub mod interceptor;
#[cfg(feature = "middleware")] pub mod middleware;
pub mod obs;
pub mod refresh;
pub mod request;
pub mod secret;
pub mod store;
pub mod transport;

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::{
		error::{Error, Result},
		secret::TokenSecret,
	};
}

pub use http;
#[cfg(feature = "reqwest")] pub use reqwest;
#[cfg(feature = "middleware")] pub use reqwest_middleware;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
