//! Form body descriptors and parsing.

use beryl_exception::{ErrorDetail, Exception, Result, ValidationException};
use beryl_http::{MediaType, Request};
use serde_json::{Map, Value};

/// Records that a handler (or one of its dependencies) takes its body as
/// form data: which field receives it and under which media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormDescriptor {
	pub media_type: MediaType,
	pub field_name: String,
}

impl FormDescriptor {
	pub fn new(media_type: MediaType, field_name: impl Into<String>) -> Self {
		Self {
			media_type,
			field_name: field_name.into(),
		}
	}
}

fn invalid_form(message: impl Into<String>) -> Exception {
	Exception::from(
		ValidationException::client("invalid form body")
			.with_errors(vec![ErrorDetail::new("body", message)]),
	)
}

/// Read and parse the request body according to the form media type.
///
/// Duplicate field names accumulate into arrays, mirroring the multi-value
/// query convention.
pub async fn read_form(request: &Request, media_type: MediaType) -> Result<Value> {
	match media_type {
		MediaType::UrlEncoded => {
			let pairs = request.form().await.map_err(Exception::from)?;
			Ok(pairs_to_object(pairs))
		}
		MediaType::MultipartFormData => {
			let boundary = request
				.content_type()
				.and_then(extract_boundary)
				.ok_or_else(|| invalid_form("missing multipart boundary"))?;
			let body = request.body().await.map_err(Exception::from)?;
			let text = std::str::from_utf8(&body)
				.map_err(|_| invalid_form("multipart body is not valid UTF-8"))?;
			parse_multipart(text, &boundary)
		}
		other => Err(Exception::improperly_configured(format!(
			"'{other}' is not a form media type"
		))),
	}
}

fn pairs_to_object(pairs: Vec<(String, String)>) -> Value {
	let mut object = Map::new();
	for (key, value) in pairs {
		match object.get_mut(&key) {
			None => {
				object.insert(key, Value::String(value));
			}
			Some(Value::Array(items)) => items.push(Value::String(value)),
			Some(existing) => {
				let previous = existing.take();
				*existing = Value::Array(vec![previous, Value::String(value)]);
			}
		}
	}
	Value::Object(object)
}

fn extract_boundary(content_type: &str) -> Option<String> {
	content_type.split(';').skip(1).find_map(|param| {
		let mut parts = param.trim().splitn(2, '=');
		match (parts.next(), parts.next()) {
			(Some("boundary"), Some(value)) => Some(value.trim_matches('"').to_string()),
			_ => None,
		}
	})
}

/// Minimal multipart/form-data parser covering text fields and uploads.
///
/// File parts become objects `{"filename": ..., "content_type": ...,
/// "content": ...}`; plain fields become strings.
fn parse_multipart(body: &str, boundary: &str) -> Result<Value> {
	let delimiter = format!("--{boundary}");
	let mut object = Map::new();

	for part in body.split(delimiter.as_str()) {
		let part = part.trim_start_matches("\r\n");
		if part.is_empty() || part.starts_with("--") {
			continue;
		}
		let Some((raw_headers, content)) = part.split_once("\r\n\r\n") else {
			continue;
		};
		let content = content.trim_end_matches("\r\n");

		let mut name = None;
		let mut filename = None;
		let mut content_type = None;
		for header in raw_headers.split("\r\n") {
			let lower = header.to_ascii_lowercase();
			if lower.starts_with("content-disposition:") {
				name = disposition_param(header, "name");
				filename = disposition_param(header, "filename");
			} else if let Some(value) = lower.strip_prefix("content-type:") {
				content_type = Some(value.trim().to_string());
			}
		}

		let Some(name) = name else {
			return Err(invalid_form("multipart part without a field name"));
		};

		let value = match filename {
			Some(filename) => {
				let mut file = Map::new();
				file.insert("filename".into(), Value::String(filename));
				file.insert(
					"content_type".into(),
					Value::String(
						content_type.unwrap_or_else(|| "application/octet-stream".into()),
					),
				);
				file.insert("content".into(), Value::String(content.to_string()));
				Value::Object(file)
			}
			None => Value::String(content.to_string()),
		};
		object.insert(name, value);
	}

	if object.is_empty() {
		return Err(invalid_form("empty multipart body"));
	}
	Ok(Value::Object(object))
}

fn disposition_param(header: &str, param: &str) -> Option<String> {
	header.split(';').find_map(|piece| {
		let mut parts = piece.trim().splitn(2, '=');
		match (parts.next(), parts.next()) {
			(Some(key), Some(value)) if key.eq_ignore_ascii_case(param) => {
				Some(value.trim_matches('"').to_string())
			}
			_ => None,
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use beryl_http::Scope;
	use bytes::Bytes;
	use hyper::Method;
	use rstest::rstest;
	use serde_json::json;

	#[tokio::test]
	async fn test_urlencoded_form() {
		let scope = Scope::http(Method::POST, "/submit")
			.header("content-type", "application/x-www-form-urlencoded")
			.build();
		let request = Request::with_body(scope, Bytes::from_static(b"a=1&b=two&a=3"));

		let value = read_form(&request, MediaType::UrlEncoded).await.unwrap();

		assert_eq!(value, json!({"a": ["1", "3"], "b": "two"}));
	}

	#[tokio::test]
	async fn test_multipart_form_with_file() {
		let body = "--xyz\r\n\
			Content-Disposition: form-data; name=\"title\"\r\n\r\n\
			hello\r\n\
			--xyz\r\n\
			Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
			Content-Type: text/plain\r\n\r\n\
			file-content\r\n\
			--xyz--\r\n";
		let scope = Scope::http(Method::POST, "/upload")
			.header("content-type", "multipart/form-data; boundary=xyz")
			.build();
		let request = Request::with_body(scope, Bytes::from(body));

		let value = read_form(&request, MediaType::MultipartFormData)
			.await
			.unwrap();

		assert_eq!(value["title"], "hello");
		assert_eq!(value["upload"]["filename"], "a.txt");
		assert_eq!(value["upload"]["content"], "file-content");
	}

	#[tokio::test]
	async fn test_multipart_without_boundary_is_client_error() {
		let scope = Scope::http(Method::POST, "/upload")
			.header("content-type", "multipart/form-data")
			.build();
		let request = Request::with_body(scope, Bytes::from_static(b"irrelevant"));

		let err = read_form(&request, MediaType::MultipartFormData)
			.await
			.unwrap_err();

		assert_eq!(err.status_code(), hyper::StatusCode::BAD_REQUEST);
	}

	#[rstest]
	#[case("multipart/form-data; boundary=xyz", Some("xyz".to_string()))]
	#[case("multipart/form-data; boundary=\"quoted\"", Some("quoted".to_string()))]
	#[case("multipart/form-data", None)]
	fn test_extract_boundary(#[case] header: &str, #[case] expected: Option<String>) {
		assert_eq!(extract_boundary(header), expected);
	}
}
