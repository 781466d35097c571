//! The per-handler transformer model.

use crate::form::{FormDescriptor, read_form};
use beryl_di::{DependencyGraph, ProviderMap};
use beryl_exception::{ErrorDetail, Exception, Result, ValidationException};
use beryl_http::{Connection, HandlerContext};
use beryl_signature::{
	FieldDefault, Kwarg, Kwargs, ParamKind, ParamSetting, ReservedKwarg, Signature, SourceHint,
	settings_for,
};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Composite of signature, parameter classification and dependency graph for
/// one handler, built once at registration (or first use) and reused for
/// every request.
///
/// [`TransformerModel::to_kwargs`] is the per-request entry point of argument
/// assembly: it pulls every declared alias out of the connection, applies
/// defaults, reads the body exactly once for `data`/`payload`, and populates
/// the reserved kwargs.
pub struct TransformerModel {
	signature: Arc<Signature>,
	path_params: Vec<ParamSetting>,
	query_params: Vec<ParamSetting>,
	header_params: Vec<ParamSetting>,
	cookie_params: Vec<ParamSetting>,
	reserved_kwargs: HashSet<ReservedKwarg>,
	form_data: Option<FormDescriptor>,
	graph: Arc<DependencyGraph>,
	is_optional: bool,
}

impl TransformerModel {
	/// Build and validate the model.
	///
	/// Fails with a configuration error on: reserved kwargs used as path
	/// parameters, both `data` and `payload` declared, name collisions
	/// between path parameters, dependency names and parameter aliases,
	/// incompatible form media types between the handler and its
	/// dependencies, unresolvable or cyclic dependencies.
	pub fn create(
		signature: Arc<Signature>,
		path_param_names: &HashSet<String>,
		providers: &ProviderMap,
	) -> Result<Self> {
		let mut reserved_kwargs = signature.reserved_kwargs();

		for name in path_param_names {
			if ReservedKwarg::is_reserved(name) {
				return Err(Exception::improperly_configured(format!(
					"'{name}' is a reserved kwarg and cannot be a path parameter"
				)));
			}
		}

		if reserved_kwargs.contains(&ReservedKwarg::Data)
			&& reserved_kwargs.contains(&ReservedKwarg::Payload)
		{
			return Err(Exception::improperly_configured(
				"'data' and 'payload' cannot both be declared in one signature",
			));
		}

		let mut model = Self {
			path_params: Vec::new(),
			query_params: Vec::new(),
			header_params: Vec::new(),
			cookie_params: Vec::new(),
			reserved_kwargs: HashSet::new(),
			form_data: form_descriptor(&signature)?,
			graph: Arc::new(DependencyGraph::build(
				signature.dependency_names(),
				providers,
			)?),
			is_optional: body_is_optional(&signature),
			signature: Arc::clone(&signature),
		};

		for setting in settings_for(&signature, path_param_names) {
			model.merge_setting(setting);
		}

		// Fold every reachable dependency's own requirements into the model:
		// its parameter settings, reserved kwargs and form expectations.
		let graph = Arc::clone(&model.graph);
		for (_, dependency) in graph.dependencies() {
			let dep_signature = dependency.signature();
			for setting in settings_for(dep_signature, path_param_names) {
				model.merge_setting(setting);
			}
			for reserved in dep_signature.reserved_kwargs() {
				reserved_kwargs.insert(reserved);
			}
			let dep_form = form_descriptor(dep_signature)?;
			match (&model.form_data, dep_form) {
				(_, None) => {}
				(None, Some(form)) => model.form_data = Some(form),
				(Some(existing), Some(form)) => {
					if existing.media_type != form.media_type {
						return Err(Exception::improperly_configured(format!(
							"form media type mismatch between '{}' and '{}': {} vs {}",
							model.signature.name(),
							dep_signature.name(),
							existing.media_type,
							form.media_type
						)));
					}
				}
			}
		}
		model.reserved_kwargs = reserved_kwargs;

		model.check_disjoint(path_param_names)?;
		Ok(model)
	}

	/// Union a setting into its partition; on an alias collision the
	/// required variant wins over the optional one.
	fn merge_setting(&mut self, setting: ParamSetting) {
		let partition = match setting.kind {
			ParamKind::Path => &mut self.path_params,
			ParamKind::Query => &mut self.query_params,
			ParamKind::Header => &mut self.header_params,
			ParamKind::Cookie => &mut self.cookie_params,
		};
		match partition
			.iter_mut()
			.find(|existing| existing.field_alias == setting.field_alias)
		{
			Some(existing) => {
				if setting.is_required && !existing.is_required {
					*existing = setting;
				}
			}
			None => partition.push(setting),
		}
	}

	fn check_disjoint(&self, path_param_names: &HashSet<String>) -> Result<()> {
		let dependency_names: HashSet<&str> = self
			.graph
			.dependencies()
			.map(|(name, _)| name)
			.collect();
		let aliases: HashSet<&str> = self
			.query_params
			.iter()
			.chain(&self.header_params)
			.chain(&self.cookie_params)
			.map(|s| s.field_alias.as_str())
			.collect();

		let mut offenders: Vec<String> = Vec::new();
		for name in path_param_names {
			if dependency_names.contains(name.as_str()) || aliases.contains(name.as_str()) {
				offenders.push(name.clone());
			}
		}
		for name in &dependency_names {
			if aliases.contains(name) {
				offenders.push((*name).to_string());
			}
		}

		if offenders.is_empty() {
			Ok(())
		} else {
			offenders.sort_unstable();
			offenders.dedup();
			Err(Exception::improperly_configured(format!(
				"ambiguous parameter names shared between path parameters, dependencies and \
				 aliases: {}",
				offenders.join(", ")
			)))
		}
	}

	pub fn signature(&self) -> &Arc<Signature> {
		&self.signature
	}

	pub fn graph(&self) -> &Arc<DependencyGraph> {
		&self.graph
	}

	pub fn reserved_kwargs(&self) -> &HashSet<ReservedKwarg> {
		&self.reserved_kwargs
	}

	pub fn form_data(&self) -> Option<&FormDescriptor> {
		self.form_data.as_ref()
	}

	/// Whether the body reserved kwarg may be absent.
	pub fn is_optional(&self) -> bool {
		self.is_optional
	}

	/// Whether this handler consumes anything at all from the request.
	pub fn has_kwargs(&self) -> bool {
		!(self.path_params.is_empty()
			&& self.query_params.is_empty()
			&& self.header_params.is_empty()
			&& self.cookie_params.is_empty()
			&& self.reserved_kwargs.is_empty()
			&& self.form_data.is_none())
	}

	/// Assemble the raw kwargs for one request.
	///
	/// Missing required aliases are collected across all four parameter sets
	/// and reported in a single client error. The body is read at most once,
	/// here, and handlers receive the resolved value.
	pub async fn to_kwargs(
		&self,
		connection: &Connection,
		context: &HandlerContext,
	) -> Result<Kwargs> {
		let mut kwargs = Kwargs::new();
		let mut missing: Vec<String> = Vec::new();

		self.extract_path(connection, &mut kwargs, &mut missing);
		self.extract_query(connection, &mut kwargs, &mut missing);
		self.extract_headers(connection, &mut kwargs, &mut missing);
		self.extract_cookies(connection, &mut kwargs, &mut missing);

		if !missing.is_empty() {
			let errors = missing
				.into_iter()
				.map(|alias| ErrorDetail::new(alias, "missing required parameter"))
				.collect();
			return Err(Exception::from(
				ValidationException::client("missing required parameters").with_errors(errors),
			));
		}

		for reserved in &self.reserved_kwargs {
			let value = self.materialize_reserved(*reserved, connection, context).await?;
			kwargs.insert(reserved.name(), value);
		}

		Ok(kwargs)
	}

	fn extract_path(&self, connection: &Connection, kwargs: &mut Kwargs, missing: &mut Vec<String>) {
		for setting in &self.path_params {
			match connection.path_params().get(&setting.field_alias) {
				Some(value) => {
					kwargs.insert(setting.field_name.clone(), Kwarg::Json(Value::String(value.clone())));
				}
				None => apply_default(setting, kwargs, missing),
			}
		}
	}

	fn extract_query(&self, connection: &Connection, kwargs: &mut Kwargs, missing: &mut Vec<String>) {
		for setting in &self.query_params {
			if setting.is_security || setting.is_requires {
				continue;
			}
			match connection.query_params().get(&setting.field_alias) {
				Some(values) if !values.is_empty() => {
					let value = if setting.annotation.is_container() {
						Value::Array(
							values.iter().cloned().map(Value::String).collect(),
						)
					} else {
						Value::String(values[0].clone())
					};
					kwargs.insert(setting.field_name.clone(), Kwarg::Json(value));
				}
				_ => apply_default(setting, kwargs, missing),
			}
		}
	}

	fn extract_headers(
		&self,
		connection: &Connection,
		kwargs: &mut Kwargs,
		missing: &mut Vec<String>,
	) {
		for setting in &self.header_params {
			let value = connection
				.headers()
				.get(&setting.field_alias)
				.and_then(|v| v.to_str().ok());
			match value {
				Some(value) => {
					kwargs.insert(
						setting.field_name.clone(),
						Kwarg::Json(Value::String(value.to_string())),
					);
				}
				None => apply_default(setting, kwargs, missing),
			}
		}
	}

	fn extract_cookies(
		&self,
		connection: &Connection,
		kwargs: &mut Kwargs,
		missing: &mut Vec<String>,
	) {
		for setting in &self.cookie_params {
			match connection.cookies().get(&setting.field_alias) {
				Some(value) => {
					kwargs.insert(
						setting.field_name.clone(),
						Kwarg::Json(Value::String(value.clone())),
					);
				}
				None => apply_default(setting, kwargs, missing),
			}
		}
	}

	async fn materialize_reserved(
		&self,
		reserved: ReservedKwarg,
		connection: &Connection,
		context: &HandlerContext,
	) -> Result<Kwarg> {
		match reserved {
			ReservedKwarg::Data | ReservedKwarg::Payload => self.read_body(connection).await,
			ReservedKwarg::Request => match connection.as_request() {
				Some(request) => Ok(Kwarg::Request(request.clone())),
				None => Err(Exception::internal(
					"'request' reserved kwarg on a websocket connection",
				)),
			},
			ReservedKwarg::Socket => match connection.as_socket() {
				Some(socket) => Ok(Kwarg::Socket(socket.clone())),
				None => Err(Exception::internal(
					"'socket' reserved kwarg on an HTTP connection",
				)),
			},
			ReservedKwarg::Headers => Ok(Kwarg::Headers(connection.headers().clone())),
			ReservedKwarg::Cookies => Ok(Kwarg::Cookies(connection.cookies().clone())),
			ReservedKwarg::Query => {
				let container_aliases: HashSet<&str> = self
					.query_params
					.iter()
					.filter(|s| s.annotation.is_container())
					.map(|s| s.field_alias.as_str())
					.collect();
				let mut collapsed = Map::new();
				for (key, values) in connection.query_params() {
					if container_aliases.contains(key.as_str()) {
						continue;
					}
					if let Some(first) = values.first() {
						collapsed.insert(key.clone(), Value::String(first.clone()));
					}
				}
				Ok(Kwarg::Json(Value::Object(collapsed)))
			}
			ReservedKwarg::State => Ok(Kwarg::State(connection.state().shallow_copy())),
			ReservedKwarg::Context => Ok(Kwarg::Context(context.clone())),
		}
	}

	/// Read the one-shot body, already parsed: form data when a form
	/// descriptor is present, JSON otherwise. The handler receives the
	/// resolved value, never an unawaited reader.
	async fn read_body(&self, connection: &Connection) -> Result<Kwarg> {
		let request = connection.as_request().ok_or_else(|| {
			Exception::internal("body extraction on a websocket connection")
		})?;

		if let Some(form) = &self.form_data {
			let value = read_form(request, form.media_type).await?;
			return Ok(Kwarg::Json(value));
		}

		let body = request.body().await.map_err(Exception::from)?;
		if body.is_empty() {
			if self.is_optional {
				return Ok(Kwarg::Json(Value::Null));
			}
			return Err(Exception::from(
				ValidationException::client("request body required")
					.with_errors(vec![ErrorDetail::new("body", "field required")]),
			));
		}
		let value = request.json().await.map_err(Exception::from)?;
		Ok(Kwarg::Json(value))
	}
}

impl std::fmt::Debug for TransformerModel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TransformerModel")
			.field("signature", &self.signature.name())
			.field("path", &self.path_params.len())
			.field("query", &self.query_params.len())
			.field("headers", &self.header_params.len())
			.field("cookies", &self.cookie_params.len())
			.field("reserved", &self.reserved_kwargs.len())
			.field("dependencies", &self.graph.len())
			.finish()
	}
}

fn apply_default(setting: &ParamSetting, kwargs: &mut Kwargs, missing: &mut Vec<String>) {
	if let Some(default) = &setting.default_value {
		kwargs.insert(setting.field_name.clone(), Kwarg::Json(default.clone()));
	} else if setting.is_required {
		missing.push(setting.field_alias.clone());
	}
}

/// Locate a form-typed body field in a signature.
fn form_descriptor(signature: &Signature) -> Result<Option<FormDescriptor>> {
	let mut found: Option<FormDescriptor> = None;
	for field in signature.model_fields() {
		let FieldDefault::Param(marker) = &field.default else {
			continue;
		};
		if !matches!(marker.source, SourceHint::Body) {
			continue;
		}
		let Some(media_type) = marker.media_type else {
			continue;
		};
		if !media_type.is_form() {
			continue;
		}
		if let Some(existing) = &found {
			if existing.media_type != media_type {
				return Err(Exception::improperly_configured(format!(
					"conflicting form media types on '{}' and '{}'",
					existing.field_name, field.name
				)));
			}
		}
		found = Some(FormDescriptor::new(media_type, field.name.clone()));
	}
	Ok(found)
}

fn body_is_optional(signature: &Signature) -> bool {
	for reserved in [ReservedKwarg::Data, ReservedKwarg::Payload] {
		if let Some(field) = signature.field(reserved.name()) {
			if field.annotation.allows_null() && !matches!(field.annotation, beryl_encoders::Annotation::Any) {
				return true;
			}
			if let FieldDefault::Param(marker) = &field.default {
				if marker.allow_none || marker.default.is_some() {
					return true;
				}
			}
		}
	}
	false
}
