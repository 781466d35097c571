//! Media type vocabulary used by descriptors and response containers.

use std::fmt;

/// The media types the dispatch core reasons about.
///
/// Anything else travels as an opaque content-type string on the response
/// headers; only these participate in body parsing and form compatibility
/// decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
	Json,
	Text,
	Html,
	OctetStream,
	UrlEncoded,
	MultipartFormData,
}

impl MediaType {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Json => "application/json",
			Self::Text => "text/plain; charset=utf-8",
			Self::Html => "text/html; charset=utf-8",
			Self::OctetStream => "application/octet-stream",
			Self::UrlEncoded => "application/x-www-form-urlencoded",
			Self::MultipartFormData => "multipart/form-data",
		}
	}

	/// Parse a `Content-Type` header value, ignoring parameters.
	pub fn from_content_type(value: &str) -> Option<Self> {
		let essence = value.split(';').next().unwrap_or("").trim();
		match essence {
			"application/json" => Some(Self::Json),
			"text/plain" => Some(Self::Text),
			"text/html" => Some(Self::Html),
			"application/octet-stream" => Some(Self::OctetStream),
			"application/x-www-form-urlencoded" => Some(Self::UrlEncoded),
			"multipart/form-data" => Some(Self::MultipartFormData),
			_ => None,
		}
	}

	/// Whether this media type denotes a form-encoded request body.
	pub fn is_form(&self) -> bool {
		matches!(self, Self::UrlEncoded | Self::MultipartFormData)
	}
}

impl fmt::Display for MediaType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
