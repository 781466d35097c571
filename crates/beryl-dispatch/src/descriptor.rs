//! Handler descriptors and registration-time validation.

use crate::adapter::{DefaultResponseFactory, ResponseFactory, ReturnAnnotation};
use crate::endpoint::Endpoint;
use crate::interceptor::Interceptor;
use crate::permission::Permission;
use beryl_di::{ProviderMap, merge_chain};
use beryl_exception::{Exception, Result};
use beryl_http::{
	Background, HandlerContext, MediaType, RenderDefaults, ResponseCookie, ScopeKind,
	TemplateEngine,
};
use beryl_signature::{ReservedKwarg, Signature};
use beryl_transform::TransformerModel;
use hyper::{HeaderMap, Method, StatusCode};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Permissions, interceptors and dependencies contributed by one level of
/// the ownership chain (application, include group, route group).
#[derive(Clone, Default)]
pub struct OwnershipLayer {
	pub dependencies: ProviderMap,
	pub permissions: Vec<Arc<dyn Permission>>,
	pub interceptors: Vec<Arc<dyn Interceptor>>,
}

impl OwnershipLayer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_dependencies(mut self, dependencies: ProviderMap) -> Self {
		self.dependencies = dependencies;
		self
	}

	pub fn with_permission(mut self, permission: Arc<dyn Permission>) -> Self {
		self.permissions.push(permission);
		self
	}

	pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
		self.interceptors.push(interceptor);
		self
	}
}

/// Immutable record produced when a handler is registered.
///
/// Everything the pipeline needs per request is resolved here once: the
/// merged ownership chain, the transformer model, the return-annotation
/// class and the response defaults.
pub struct HandlerDescriptor {
	name: String,
	path_template: String,
	path_param_names: HashSet<String>,
	kind: ScopeKind,
	methods: HashSet<Method>,
	status_code_default: StatusCode,
	media_type_default: MediaType,
	validation_error_status: StatusCode,
	response_headers: HeaderMap,
	response_cookies: Vec<ResponseCookie>,
	background: Option<Background>,
	permissions: Vec<Arc<dyn Permission>>,
	interceptors: Vec<Arc<dyn Interceptor>>,
	dependencies: ProviderMap,
	signature: Arc<Signature>,
	endpoint: Arc<dyn Endpoint>,
	return_annotation: ReturnAnnotation,
	response_class: Arc<dyn ResponseFactory>,
	template_engine: Option<Arc<dyn TemplateEngine>>,
	transformer: Arc<TransformerModel>,
}

impl HandlerDescriptor {
	pub fn builder(
		path_template: impl Into<String>,
		endpoint: Arc<dyn Endpoint>,
	) -> HandlerBuilder {
		HandlerBuilder::new(path_template, endpoint)
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn path_template(&self) -> &str {
		&self.path_template
	}

	pub fn path_param_names(&self) -> &HashSet<String> {
		&self.path_param_names
	}

	pub fn kind(&self) -> ScopeKind {
		self.kind
	}

	/// The declared verb set, with the implicit `HEAD` hidden; this is what
	/// schema generation sees.
	pub fn declared_methods(&self) -> Vec<Method> {
		let mut methods: Vec<Method> = self.methods.iter().cloned().collect();
		methods.sort_unstable_by(|a, b| a.as_str().cmp(b.as_str()));
		methods
	}

	/// The verbs dispatch accepts, including `HEAD` whenever `GET` is
	/// declared.
	pub fn allowed_methods(&self) -> Vec<Method> {
		let mut methods = self.methods.clone();
		if methods.contains(&Method::GET) {
			methods.insert(Method::HEAD);
		}
		let mut methods: Vec<Method> = methods.into_iter().collect();
		methods.sort_unstable_by(|a, b| a.as_str().cmp(b.as_str()));
		methods
	}

	pub fn accepts(&self, method: &Method) -> bool {
		self.methods.contains(method)
			|| (*method == Method::HEAD && self.methods.contains(&Method::GET))
	}

	pub fn status_code_default(&self) -> StatusCode {
		self.status_code_default
	}

	pub fn media_type_default(&self) -> MediaType {
		self.media_type_default
	}

	pub fn validation_error_status(&self) -> StatusCode {
		self.validation_error_status
	}

	pub fn response_headers(&self) -> &HeaderMap {
		&self.response_headers
	}

	pub fn response_cookies(&self) -> &[ResponseCookie] {
		&self.response_cookies
	}

	pub fn background(&self) -> Option<&Background> {
		self.background.as_ref()
	}

	pub fn permissions(&self) -> &[Arc<dyn Permission>] {
		&self.permissions
	}

	pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
		&self.interceptors
	}

	pub fn dependencies(&self) -> &ProviderMap {
		&self.dependencies
	}

	pub fn signature(&self) -> &Arc<Signature> {
		&self.signature
	}

	pub fn endpoint(&self) -> &Arc<dyn Endpoint> {
		&self.endpoint
	}

	pub fn return_annotation(&self) -> ReturnAnnotation {
		self.return_annotation
	}

	pub fn response_class(&self) -> &Arc<dyn ResponseFactory> {
		&self.response_class
	}

	pub fn transformer(&self) -> &Arc<TransformerModel> {
		&self.transformer
	}

	pub fn render_defaults(&self) -> RenderDefaults {
		let mut defaults =
			RenderDefaults::new(self.status_code_default, self.media_type_default);
		if let Some(engine) = &self.template_engine {
			defaults = defaults.with_template_engine(Arc::clone(engine));
		}
		defaults
	}

	/// Fresh per-request context record.
	pub fn context(&self) -> HandlerContext {
		HandlerContext::new(
			self.name.clone(),
			self.path_template.clone(),
			self.declared_methods(),
			self.kind,
		)
	}
}

impl std::fmt::Debug for HandlerDescriptor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HandlerDescriptor")
			.field("name", &self.name)
			.field("path", &self.path_template)
			.field("methods", &self.declared_methods())
			.finish()
	}
}

/// Builder performing the registration-time validation.
pub struct HandlerBuilder {
	name: Option<String>,
	path_template: String,
	kind: ScopeKind,
	methods: HashSet<Method>,
	status_code_default: Option<StatusCode>,
	media_type_default: MediaType,
	validation_error_status: StatusCode,
	response_headers: HeaderMap,
	response_cookies: Vec<ResponseCookie>,
	background: Option<Background>,
	layers: Vec<OwnershipLayer>,
	handler_layer: OwnershipLayer,
	signature: Option<Arc<Signature>>,
	endpoint: Arc<dyn Endpoint>,
	return_annotation: ReturnAnnotation,
	response_class: Arc<dyn ResponseFactory>,
	template_engine: Option<Arc<dyn TemplateEngine>>,
}

impl HandlerBuilder {
	fn new(path_template: impl Into<String>, endpoint: Arc<dyn Endpoint>) -> Self {
		Self {
			name: None,
			path_template: path_template.into(),
			kind: ScopeKind::Http,
			methods: HashSet::new(),
			status_code_default: None,
			media_type_default: MediaType::Json,
			validation_error_status: StatusCode::BAD_REQUEST,
			response_headers: HeaderMap::new(),
			response_cookies: Vec::new(),
			background: None,
			layers: Vec::new(),
			handler_layer: OwnershipLayer::new(),
			signature: None,
			endpoint,
			return_annotation: ReturnAnnotation::Raw,
			response_class: Arc::new(DefaultResponseFactory),
			template_engine: None,
		}
	}

	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	pub fn method(mut self, method: Method) -> Self {
		self.methods.insert(method);
		self
	}

	pub fn methods<I: IntoIterator<Item = Method>>(mut self, methods: I) -> Self {
		self.methods.extend(methods);
		self
	}

	/// Register as a WebSocket handler (empty verb set).
	pub fn websocket(mut self) -> Self {
		self.kind = ScopeKind::WebSocket;
		self
	}

	pub fn status_code(mut self, status: StatusCode) -> Self {
		self.status_code_default = Some(status);
		self
	}

	pub fn media_type(mut self, media_type: MediaType) -> Self {
		self.media_type_default = media_type;
		self
	}

	/// Report client validation failures as 422 instead of 400.
	pub fn unprocessable_entity_on_validation(mut self) -> Self {
		self.validation_error_status = StatusCode::UNPROCESSABLE_ENTITY;
		self
	}

	pub fn response_header(mut self, name: &str, value: &str) -> Self {
		if let (Ok(name), Ok(value)) = (
			hyper::header::HeaderName::from_bytes(name.as_bytes()),
			hyper::header::HeaderValue::from_str(value),
		) {
			self.response_headers.insert(name, value);
		}
		self
	}

	pub fn response_cookie(mut self, cookie: ResponseCookie) -> Self {
		self.response_cookies.push(cookie);
		self
	}

	pub fn background(mut self, background: Background) -> Self {
		self.background = Some(background);
		self
	}

	/// Outer ownership levels, root first (application, include, group).
	pub fn layer(mut self, layer: OwnershipLayer) -> Self {
		self.layers.push(layer);
		self
	}

	pub fn dependencies(mut self, dependencies: ProviderMap) -> Self {
		self.handler_layer.dependencies = dependencies;
		self
	}

	pub fn permission(mut self, permission: Arc<dyn Permission>) -> Self {
		self.handler_layer.permissions.push(permission);
		self
	}

	pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
		self.handler_layer.interceptors.push(interceptor);
		self
	}

	pub fn signature(mut self, signature: Arc<Signature>) -> Self {
		self.signature = Some(signature);
		self
	}

	pub fn returns(mut self, annotation: ReturnAnnotation) -> Self {
		self.return_annotation = annotation;
		self
	}

	pub fn response_class(mut self, factory: Arc<dyn ResponseFactory>) -> Self {
		self.response_class = factory;
		self
	}

	pub fn template_engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
		self.template_engine = Some(engine);
		self
	}

	pub fn build(self) -> Result<Arc<HandlerDescriptor>> {
		let signature = self.signature.ok_or_else(|| {
			Exception::improperly_configured(format!(
				"handler for '{}' registered without a signature",
				self.path_template
			))
		})?;

		let path_param_names = parse_path_template(&self.path_template)?;

		match self.kind {
			ScopeKind::Http => {
				if self.methods.is_empty() {
					return Err(Exception::improperly_configured(format!(
						"handler for '{}' declares no HTTP methods",
						self.path_template
					)));
				}
			}
			ScopeKind::WebSocket => {
				if !self.methods.is_empty() {
					return Err(Exception::improperly_configured(
						"websocket handlers must not declare HTTP methods",
					));
				}
				validate_websocket_signature(&signature, self.return_annotation)?;
			}
		}

		// Merge the ownership chain root to leaf; the handler layer is the
		// innermost level.
		let mut level_maps: Vec<&ProviderMap> =
			self.layers.iter().map(|l| &l.dependencies).collect();
		level_maps.push(&self.handler_layer.dependencies);
		let dependencies = merge_chain(&level_maps)?;

		let mut permissions = Vec::new();
		let mut interceptors = Vec::new();
		for layer in self.layers.iter().chain(std::iter::once(&self.handler_layer)) {
			permissions.extend(layer.permissions.iter().cloned());
			interceptors.extend(layer.interceptors.iter().cloned());
		}

		let transformer = Arc::new(TransformerModel::create(
			Arc::clone(&signature),
			&path_param_names,
			&dependencies,
		)?);

		let status_code_default = self.status_code_default.unwrap_or_else(|| {
			if self.methods.contains(&Method::POST) {
				StatusCode::CREATED
			} else {
				StatusCode::OK
			}
		});

		Ok(Arc::new(HandlerDescriptor {
			name: self
				.name
				.unwrap_or_else(|| signature.name().to_string()),
			path_template: self.path_template,
			path_param_names,
			kind: self.kind,
			methods: self.methods,
			status_code_default,
			media_type_default: self.media_type_default,
			validation_error_status: self.validation_error_status,
			response_headers: self.response_headers,
			response_cookies: self.response_cookies,
			background: self.background,
			permissions,
			interceptors,
			dependencies,
			signature,
			endpoint: self.endpoint,
			return_annotation: self.return_annotation,
			response_class: self.response_class,
			template_engine: self.template_engine,
			transformer,
		}))
	}
}

/// Extract `{name}` captures from a path template.
fn parse_path_template(template: &str) -> Result<HashSet<String>> {
	let mut names = HashSet::new();
	let mut rest = template;
	while let Some(start) = rest.find('{') {
		let Some(len) = rest[start..].find('}') else {
			return Err(Exception::improperly_configured(format!(
				"unbalanced braces in path template '{template}'"
			)));
		};
		let name = &rest[start + 1..start + len];
		if name.is_empty() {
			return Err(Exception::improperly_configured(format!(
				"empty path parameter in template '{template}'"
			)));
		}
		if !names.insert(name.to_string()) {
			return Err(Exception::improperly_configured(format!(
				"duplicate path parameter '{name}' in template '{template}'"
			)));
		}
		rest = &rest[start + len + 1..];
	}
	if rest.contains('}') {
		return Err(Exception::improperly_configured(format!(
			"unbalanced braces in path template '{template}'"
		)));
	}
	Ok(names)
}

fn validate_websocket_signature(
	signature: &Signature,
	return_annotation: ReturnAnnotation,
) -> Result<()> {
	if signature.field(ReservedKwarg::Socket.name()).is_none() {
		return Err(Exception::improperly_configured(format!(
			"websocket handler '{}' must declare a 'socket' parameter",
			signature.name()
		)));
	}
	for forbidden in ["data", "payload", "request"] {
		if signature.field(forbidden).is_some() {
			return Err(Exception::improperly_configured(format!(
				"websocket handler '{}' must not declare '{forbidden}'",
				signature.name()
			)));
		}
	}
	if return_annotation != ReturnAnnotation::None {
		return Err(Exception::improperly_configured(format!(
			"websocket handler '{}' must declare no return value",
			signature.name()
		)));
	}
	Ok(())
}

/// Registration table enforcing one handler per `(path_template, method)`.
///
/// This is bookkeeping on the consumption side of the route tree: matching
/// itself happens outside the core, but uniqueness and the `Allow` set for
/// 405 responses are owned here.
#[derive(Default)]
pub struct Routes {
	entries: HashMap<String, HashMap<Method, Arc<HandlerDescriptor>>>,
	websockets: HashMap<String, Arc<HandlerDescriptor>>,
}

impl Routes {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, descriptor: Arc<HandlerDescriptor>) -> Result<()> {
		let template = descriptor.path_template().to_string();
		match descriptor.kind() {
			ScopeKind::WebSocket => {
				if self.websockets.contains_key(&template) {
					return Err(Exception::improperly_configured(format!(
						"a websocket handler is already bound to '{template}'"
					)));
				}
				self.websockets.insert(template, descriptor);
			}
			ScopeKind::Http => {
				let methods = self.entries.entry(template.clone()).or_default();
				for method in descriptor.declared_methods() {
					if methods.contains_key(&method) {
						return Err(Exception::improperly_configured(format!(
							"a handler is already bound to {method} '{template}'"
						)));
					}
				}
				for method in descriptor.declared_methods() {
					methods.insert(method, Arc::clone(&descriptor));
				}
			}
		}
		Ok(())
	}

	/// Look up the handler for a template and verb, honoring implicit HEAD.
	pub fn find(&self, template: &str, method: &Method) -> Option<Arc<HandlerDescriptor>> {
		let methods = self.entries.get(template)?;
		if let Some(descriptor) = methods.get(method) {
			return Some(Arc::clone(descriptor));
		}
		if *method == Method::HEAD {
			return methods.get(&Method::GET).map(Arc::clone);
		}
		None
	}

	pub fn find_websocket(&self, template: &str) -> Option<Arc<HandlerDescriptor>> {
		self.websockets.get(template).map(Arc::clone)
	}

	/// The `Allow` set for a template, for 405 rendering.
	pub fn allow(&self, template: &str) -> Vec<Method> {
		let mut allow: HashSet<Method> = HashSet::new();
		if let Some(methods) = self.entries.get(template) {
			for method in methods.keys() {
				allow.insert(method.clone());
			}
			if allow.contains(&Method::GET) {
				allow.insert(Method::HEAD);
			}
		}
		let mut allow: Vec<Method> = allow.into_iter().collect();
		allow.sort_unstable_by(|a, b| a.as_str().cmp(b.as_str()));
		allow
	}

	pub fn method_not_allowed(&self, template: &str) -> Exception {
		Exception::MethodNotAllowed {
			allowed: self.allow(template),
		}
	}
}
