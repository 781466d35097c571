//! Request cookie parsing and `Set-Cookie` emission.

use chrono::{DateTime, Utc};
use hyper::HeaderMap;
use hyper::header::COOKIE;
use std::collections::HashMap;

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
	Lax,
	Strict,
	None,
}

impl SameSite {
	fn as_str(&self) -> &'static str {
		match self {
			Self::Lax => "lax",
			Self::Strict => "strict",
			Self::None => "none",
		}
	}
}

/// A cookie to be set on a response.
///
/// Rendered as `key=value; Path=…; Max-Age=…; Expires=…; Domain=…; Secure;
/// HttpOnly; SameSite=…` with omitted attributes simply not emitted.
///
/// # Examples
///
/// ```
/// use beryl_http::{ResponseCookie, SameSite};
///
/// let cookie = ResponseCookie::new("session", "abc123")
///     .with_path("/")
///     .with_max_age(3600)
///     .with_http_only(true)
///     .with_same_site(SameSite::Lax);
///
/// assert_eq!(
///     cookie.to_header_value(),
///     "session=abc123; Path=/; Max-Age=3600; HttpOnly; SameSite=lax"
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseCookie {
	pub key: String,
	pub value: String,
	pub path: Option<String>,
	pub max_age: Option<i64>,
	pub expires: Option<DateTime<Utc>>,
	pub domain: Option<String>,
	pub secure: bool,
	pub http_only: bool,
	pub same_site: Option<SameSite>,
}

impl ResponseCookie {
	pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			value: value.into(),
			path: None,
			max_age: None,
			expires: None,
			domain: None,
			secure: false,
			http_only: false,
			same_site: None,
		}
	}

	/// Cookie that instructs the client to drop the named cookie.
	pub fn delete(key: impl Into<String>) -> Self {
		Self::new(key, "").with_max_age(0)
	}

	pub fn with_path(mut self, path: impl Into<String>) -> Self {
		self.path = Some(path.into());
		self
	}

	pub fn with_max_age(mut self, seconds: i64) -> Self {
		self.max_age = Some(seconds);
		self
	}

	pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
		self.expires = Some(expires);
		self
	}

	pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
		self.domain = Some(domain.into());
		self
	}

	pub fn with_secure(mut self, secure: bool) -> Self {
		self.secure = secure;
		self
	}

	pub fn with_http_only(mut self, http_only: bool) -> Self {
		self.http_only = http_only;
		self
	}

	pub fn with_same_site(mut self, same_site: SameSite) -> Self {
		self.same_site = Some(same_site);
		self
	}

	/// Render the `Set-Cookie` header value.
	pub fn to_header_value(&self) -> String {
		let mut out = format!("{}={}", self.key, self.value);
		if let Some(path) = &self.path {
			out.push_str("; Path=");
			out.push_str(path);
		}
		if let Some(max_age) = self.max_age {
			out.push_str("; Max-Age=");
			out.push_str(&max_age.to_string());
		}
		if let Some(expires) = &self.expires {
			// HTTP-date per RFC 7231, e.g. "Sun, 06 Nov 1994 08:49:37 GMT".
			out.push_str("; Expires=");
			out.push_str(&expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
		}
		if let Some(domain) = &self.domain {
			out.push_str("; Domain=");
			out.push_str(domain);
		}
		if self.secure {
			out.push_str("; Secure");
		}
		if self.http_only {
			out.push_str("; HttpOnly");
		}
		if let Some(same_site) = self.same_site {
			out.push_str("; SameSite=");
			out.push_str(same_site.as_str());
		}
		out
	}
}

/// Parse the `Cookie` request header into a name → value map.
///
/// Malformed pairs (missing `=`, empty name, separators or control characters
/// in the name) are skipped rather than failing the request.
pub fn parse_request_cookies(headers: &HeaderMap) -> HashMap<String, String> {
	let mut cookies = HashMap::new();
	for header in headers.get_all(COOKIE) {
		let Ok(raw) = header.to_str() else { continue };
		for pair in raw.split(';') {
			let pair = pair.trim();
			if pair.is_empty() {
				continue;
			}
			let mut parts = pair.splitn(2, '=');
			let name = parts.next().unwrap_or("").trim();
			let value = match parts.next() {
				Some(v) => v.trim(),
				None => continue,
			};
			if name.is_empty() || !is_valid_cookie_name(name) {
				continue;
			}
			cookies.insert(name.to_string(), value.to_string());
		}
	}
	cookies
}

/// Cookie-name validation per RFC 6265: visible ASCII excluding separators.
fn is_valid_cookie_name(name: &str) -> bool {
	name.chars().all(|c| {
		let code = c as u32;
		(0x21..=0x7E).contains(&code)
			&& !matches!(
				c,
				'(' | ')'
					| '<' | '>' | '@' | ','
					| ';' | ':' | '\\' | '"'
					| '/' | '[' | ']' | '?'
					| '=' | '{' | '}' | ' '
					| '\t'
			)
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use rstest::rstest;

	#[rstest]
	fn test_minimal_cookie_emits_only_pair() {
		let cookie = ResponseCookie::new("k", "v");
		assert_eq!(cookie.to_header_value(), "k=v");
	}

	#[rstest]
	fn test_full_attribute_set() {
		let expires = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
		let cookie = ResponseCookie::new("id", "42")
			.with_path("/api")
			.with_max_age(60)
			.with_expires(expires)
			.with_domain("example.com")
			.with_secure(true)
			.with_http_only(true)
			.with_same_site(SameSite::Strict);

		assert_eq!(
			cookie.to_header_value(),
			"id=42; Path=/api; Max-Age=60; Expires=Sun, 06 Nov 1994 08:49:37 GMT; \
			 Domain=example.com; Secure; HttpOnly; SameSite=strict"
		);
	}

	#[rstest]
	fn test_delete_cookie_max_age_zero() {
		let cookie = ResponseCookie::delete("session");
		assert_eq!(cookie.to_header_value(), "session=; Max-Age=0");
	}

	#[rstest]
	#[case(SameSite::Lax, "lax")]
	#[case(SameSite::Strict, "strict")]
	#[case(SameSite::None, "none")]
	fn test_same_site_casing(#[case] same_site: SameSite, #[case] expected: &str) {
		let cookie = ResponseCookie::new("a", "b").with_same_site(same_site);
		assert!(
			cookie
				.to_header_value()
				.ends_with(&format!("SameSite={expected}"))
		);
	}

	#[rstest]
	fn test_parse_request_cookies_skips_malformed() {
		let mut headers = HeaderMap::new();
		headers.insert(
			COOKIE,
			"session=abc; bad name=1; =empty; plain; theme=dark".parse().unwrap(),
		);

		let cookies = parse_request_cookies(&headers);

		assert_eq!(cookies.get("session").map(String::as_str), Some("abc"));
		assert_eq!(cookies.get("theme").map(String::as_str), Some("dark"));
		assert_eq!(cookies.len(), 2);
	}
}
