//! Semantic response containers.
//!
//! Handlers declare one of these as their return annotation instead of
//! hand-building a wire [`Response`]. The response adapter renders them with
//! the handler's defaults merged in; the containers themselves only know how
//! to turn their own payload into a concrete response.

use crate::background::Background;
use crate::cookies::ResponseCookie;
use crate::media::MediaType;
use crate::response::{Response, StreamBody};
use crate::{Error, Result};
use bytes::Bytes;
use hyper::StatusCode;
use hyper::header::{CONTENT_DISPOSITION, CONTENT_TYPE, ETAG, LOCATION};
use hyper::{HeaderMap, header::HeaderValue};
use serde_json::Value;
use std::sync::Arc;

/// Rendering hook for [`TemplateResponse`].
///
/// The templating algorithm itself lives outside the dispatch core; this
/// trait is the seam it plugs into.
pub trait TemplateEngine: Send + Sync {
	fn render(&self, template_name: &str, context: &Value) -> Result<String>;
}

/// Defaults supplied by the handler descriptor when a container is rendered.
#[derive(Clone)]
pub struct RenderDefaults {
	pub status: StatusCode,
	pub media_type: MediaType,
	pub template_engine: Option<Arc<dyn TemplateEngine>>,
}

impl RenderDefaults {
	pub fn new(status: StatusCode, media_type: MediaType) -> Self {
		Self {
			status,
			media_type,
			template_engine: None,
		}
	}

	pub fn with_template_engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
		self.template_engine = Some(engine);
		self
	}
}

fn content_type_value(media_type: MediaType) -> HeaderValue {
	HeaderValue::from_str(media_type.as_str())
		.unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

/// JSON payload wrapper.
///
/// # Examples
///
/// ```
/// use beryl_http::JsonResponse;
/// use hyper::StatusCode;
/// use serde_json::json;
///
/// let wrapper = JsonResponse::new(json!({"user": "ada"}))
///     .with_status(StatusCode::CREATED);
/// assert_eq!(wrapper.status_code, Some(StatusCode::CREATED));
/// ```
#[derive(Debug, Clone)]
pub struct JsonResponse {
	pub content: Value,
	pub status_code: Option<StatusCode>,
	pub headers: HeaderMap,
	pub cookies: Vec<ResponseCookie>,
	pub background: Option<Background>,
}

impl JsonResponse {
	pub fn new(content: Value) -> Self {
		Self {
			content,
			status_code: None,
			headers: HeaderMap::new(),
			cookies: Vec::new(),
			background: None,
		}
	}

	pub fn with_status(mut self, status: StatusCode) -> Self {
		self.status_code = Some(status);
		self
	}

	pub fn with_header(mut self, name: &str, value: &str) -> Self {
		if let (Ok(name), Ok(value)) = (
			hyper::header::HeaderName::from_bytes(name.as_bytes()),
			HeaderValue::from_str(value),
		) {
			self.headers.insert(name, value);
		}
		self
	}

	pub fn with_cookie(mut self, cookie: ResponseCookie) -> Self {
		self.cookies.push(cookie);
		self
	}

	pub fn with_background(mut self, background: Background) -> Self {
		self.background = Some(background);
		self
	}

	pub fn into_response(self, defaults: &RenderDefaults) -> Result<Response> {
		let body =
			serde_json::to_vec(&self.content).map_err(|e| Error::Serialization(e.to_string()))?;
		let mut response = Response::new(self.status_code.unwrap_or(defaults.status))
			.with_body(Bytes::from(body))
			.with_typed_header(CONTENT_TYPE, content_type_value(MediaType::Json));
		for (name, value) in self.headers.iter() {
			response.headers.insert(name.clone(), value.clone());
		}
		response.cookies.extend(self.cookies);
		Ok(response)
	}
}

/// Streaming payload wrapper.
pub struct StreamResponse {
	pub stream: StreamBody,
	pub media_type: Option<MediaType>,
	pub status_code: Option<StatusCode>,
	pub headers: HeaderMap,
	pub cookies: Vec<ResponseCookie>,
	pub background: Option<Background>,
}

impl StreamResponse {
	pub fn new(stream: StreamBody) -> Self {
		Self {
			stream,
			media_type: None,
			status_code: None,
			headers: HeaderMap::new(),
			cookies: Vec::new(),
			background: None,
		}
	}

	pub fn with_media_type(mut self, media_type: MediaType) -> Self {
		self.media_type = Some(media_type);
		self
	}

	pub fn with_status(mut self, status: StatusCode) -> Self {
		self.status_code = Some(status);
		self
	}

	pub fn into_response(self, defaults: &RenderDefaults) -> Result<Response> {
		let media_type = self.media_type.unwrap_or(MediaType::OctetStream);
		let mut response = Response::new(self.status_code.unwrap_or(defaults.status))
			.with_stream(self.stream)
			.with_typed_header(CONTENT_TYPE, content_type_value(media_type));
		for (name, value) in self.headers.iter() {
			response.headers.insert(name.clone(), value.clone());
		}
		response.cookies.extend(self.cookies);
		Ok(response)
	}
}

impl std::fmt::Debug for StreamResponse {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StreamResponse")
			.field("status_code", &self.status_code)
			.finish()
	}
}

/// File download wrapper.
///
/// The content arrives as bytes; the core does not probe the filesystem.
#[derive(Debug, Clone)]
pub struct FileResponse {
	pub content: Bytes,
	pub filename: String,
	pub media_type: Option<MediaType>,
	pub etag: Option<String>,
	pub status_code: Option<StatusCode>,
	pub headers: HeaderMap,
	pub cookies: Vec<ResponseCookie>,
	pub background: Option<Background>,
}

impl FileResponse {
	pub fn new(content: impl Into<Bytes>, filename: impl Into<String>) -> Self {
		Self {
			content: content.into(),
			filename: filename.into(),
			media_type: None,
			etag: None,
			status_code: None,
			headers: HeaderMap::new(),
			cookies: Vec::new(),
			background: None,
		}
	}

	pub fn with_media_type(mut self, media_type: MediaType) -> Self {
		self.media_type = Some(media_type);
		self
	}

	pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
		self.etag = Some(etag.into());
		self
	}

	pub fn into_response(self, defaults: &RenderDefaults) -> Result<Response> {
		let media_type = self.media_type.unwrap_or(MediaType::OctetStream);
		let disposition = format!("attachment; filename=\"{}\"", self.filename);
		let mut response = Response::new(self.status_code.unwrap_or(defaults.status))
			.with_body(self.content)
			.with_typed_header(CONTENT_TYPE, content_type_value(media_type));
		if let Ok(value) = HeaderValue::from_str(&disposition) {
			response.headers.insert(CONTENT_DISPOSITION, value);
		}
		if let Some(etag) = &self.etag {
			if let Ok(value) = HeaderValue::from_str(&format!("\"{etag}\"")) {
				response.headers.insert(ETAG, value);
			}
		}
		for (name, value) in self.headers.iter() {
			response.headers.insert(name.clone(), value.clone());
		}
		response.cookies.extend(self.cookies);
		Ok(response)
	}
}

/// Redirect wrapper. Defaults to 307 so the method is preserved.
#[derive(Debug, Clone)]
pub struct RedirectResponse {
	pub url: String,
	pub status_code: Option<StatusCode>,
	pub headers: HeaderMap,
	pub cookies: Vec<ResponseCookie>,
	pub background: Option<Background>,
}

impl RedirectResponse {
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			status_code: None,
			headers: HeaderMap::new(),
			cookies: Vec::new(),
			background: None,
		}
	}

	pub fn permanent(url: impl Into<String>) -> Self {
		Self::new(url).with_status(StatusCode::MOVED_PERMANENTLY)
	}

	pub fn with_status(mut self, status: StatusCode) -> Self {
		self.status_code = Some(status);
		self
	}

	pub fn into_response(self, _defaults: &RenderDefaults) -> Result<Response> {
		let status = self.status_code.unwrap_or(StatusCode::TEMPORARY_REDIRECT);
		let mut response = Response::new(status);
		if let Ok(value) = HeaderValue::from_str(&self.url) {
			response.headers.insert(LOCATION, value);
		}
		for (name, value) in self.headers.iter() {
			response.headers.insert(name.clone(), value.clone());
		}
		response.cookies.extend(self.cookies);
		Ok(response)
	}
}

/// Template rendering wrapper.
///
/// Requires a [`TemplateEngine`] on the render defaults; rendering without
/// one is a configuration-level failure surfaced as [`Error::Rendering`].
#[derive(Debug, Clone)]
pub struct TemplateResponse {
	pub template_name: String,
	pub context: Value,
	pub status_code: Option<StatusCode>,
	pub headers: HeaderMap,
	pub cookies: Vec<ResponseCookie>,
	pub background: Option<Background>,
}

impl TemplateResponse {
	pub fn new(template_name: impl Into<String>, context: Value) -> Self {
		Self {
			template_name: template_name.into(),
			context,
			status_code: None,
			headers: HeaderMap::new(),
			cookies: Vec::new(),
			background: None,
		}
	}

	pub fn with_status(mut self, status: StatusCode) -> Self {
		self.status_code = Some(status);
		self
	}

	pub fn into_response(self, defaults: &RenderDefaults) -> Result<Response> {
		let engine = defaults.template_engine.as_ref().ok_or_else(|| {
			Error::Rendering("no template engine configured for template response".into())
		})?;
		let html = engine.render(&self.template_name, &self.context)?;
		let mut response = Response::new(self.status_code.unwrap_or(defaults.status))
			.with_body(html)
			.with_typed_header(CONTENT_TYPE, content_type_value(MediaType::Html));
		for (name, value) in self.headers.iter() {
			response.headers.insert(name.clone(), value.clone());
		}
		response.cookies.extend(self.cookies);
		Ok(response)
	}
}
