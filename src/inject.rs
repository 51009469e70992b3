//! Pure `Authorization` header merging.

// crates.io
use reqwest::header::AUTHORIZATION;
// self
use crate::{_prelude::*, auth::IdentityToken};

/// Returns a copy of `headers` carrying `Authorization: Bearer <token>`.
///
/// Any existing `Authorization` values are replaced; every other header is carried over as-is.
/// When `token` is `None`, empty, or not representable as a header value, the copy is
/// identical to the input. The caller's map is never touched.
pub fn inject_auth(headers: &HeaderMap, token: Option<&IdentityToken>) -> HeaderMap {
	let mut merged = headers.clone();

	if let Some(value) = token.and_then(|token| token.secret.to_header_value()) {
		merged.insert(AUTHORIZATION, value);
	}

	merged
}
