//! Attach audience-scoped identity tokens to outbound HTTP requests bound for one trusted API
//! server, while every other request leaves the process untouched.
//!
//! The pieces compose from the leaves up:
//!
//! - [`provider`] mints identity tokens for an audience (`google` ships by default).
//! - [`target`] resolves the trusted server URL once and decides which requests it covers.
//! - [`inject`] merges `Authorization: Bearer <token>` into a copy of the request headers.
//! - [`interceptor`] and [`client`] wire the above in front of a real transport.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod inject;
pub mod interceptor;
pub mod obs;
pub mod provider;
pub mod target;

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::{Mutex as AsyncMutex, OnceCell as AsyncOnceCell};
	pub use parking_lot::Mutex;
	pub use reqwest::{
		Client as ReqwestClient, Error as ReqwestError, Method, Request, Response,
		header::HeaderMap,
	};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::Result;
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, http as _, httpmock as _, tempfile as _};
