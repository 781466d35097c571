//! The per-request HTTP dispatch pipeline.

use crate::adapter::{adapt, render_exception};
use crate::descriptor::HandlerDescriptor;
use crate::interceptor::Control;
use beryl_di::Resolver;
use beryl_exception::{Exception, ValidationOrigin};
use beryl_http::{Connection, ReceiveEvent, Request, Scope, Transport};
use hyper::{Method, StatusCode};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Pipeline progress, for tracing and failure context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Matched,
	InterceptorsRan,
	KwargsExtracted,
	DependenciesResolved,
	Validated,
	PermissionsPassed,
	HandlerReturned,
	ResponseAdapted,
	Sent,
}

/// Serve one matched HTTP connection.
///
/// The scope arrives from the external route matcher with path parameters
/// already captured. Order per request: interceptors → request construction
/// → kwargs extraction → dependency resolution → validation → permissions →
/// handler → response adaptation → send → background tasks.
pub async fn dispatch_http(
	handler: Arc<HandlerDescriptor>,
	scope: Scope,
	receive: mpsc::Receiver<ReceiveEvent>,
	transport: Transport,
) {
	let discard_body = scope.method == Method::HEAD;

	match run(Arc::clone(&handler), scope, receive, &transport).await {
		Ok((response, background)) => {
			phase(&handler, Phase::ResponseAdapted);
			if let Err(error) = response.send(&transport, discard_body).await {
				tracing::debug!(handler = handler.name(), %error, "response send failed");
				return;
			}
			phase(&handler, Phase::Sent);
			if !background.is_empty() {
				// Enqueued after send; request cancellation no longer
				// reaches these.
				tokio::spawn(background.run());
			}
		}
		Err(Flow::Halted) => {
			phase(&handler, Phase::Sent);
			// The interceptor wrote the response; the handler-level
			// background defaults still run.
			if let Some(background) = handler.background() {
				tokio::spawn(background.clone().run());
			}
		}
		Err(Flow::Failed(exception)) => {
			if exception.status_code().is_server_error() {
				tracing::error!(
					handler = handler.name(),
					%exception,
					"request failed with server error"
				);
			} else {
				tracing::debug!(handler = handler.name(), %exception, "request rejected");
			}
			let response = render_for(&handler, &exception);
			if let Err(error) = response.send(&transport, discard_body).await {
				tracing::debug!(handler = handler.name(), %error, "error send failed");
			}
		}
	}
}

enum Flow {
	/// An interceptor wrote its own response.
	Halted,
	Failed(Exception),
}

impl From<Exception> for Flow {
	fn from(exception: Exception) -> Self {
		Self::Failed(exception)
	}
}

async fn run(
	handler: Arc<HandlerDescriptor>,
	mut scope: Scope,
	receive: mpsc::Receiver<ReceiveEvent>,
	transport: &Transport,
) -> std::result::Result<(beryl_http::Response, beryl_http::Background), Flow> {
	phase(&handler, Phase::Matched);
	if !handler.accepts(&scope.method) {
		return Err(Exception::MethodNotAllowed {
			allowed: handler.allowed_methods(),
		}
		.into());
	}

	// Interceptors run first, in declaration order, each completing fully
	// before the next begins.
	for interceptor in handler.interceptors() {
		match interceptor.intercept(&mut scope, transport).await? {
			Control::Continue => {}
			Control::Halt => return Err(Flow::Halted),
		}
	}
	phase(&handler, Phase::InterceptorsRan);

	let request = Request::new(scope, receive);
	let connection = Connection::Http(request);
	let context = handler.context();

	let kwargs = handler
		.transformer()
		.to_kwargs(&connection, &context)
		.await?;
	phase(&handler, Phase::KwargsExtracted);

	let resolver = Resolver::new(handler.transformer().graph(), &connection, &kwargs);
	let resolved = resolver.resolve_all().await?;
	phase(&handler, Phase::DependenciesResolved);

	let mut scopes = resolver.collected_scopes();
	let mut merged = kwargs;
	merged.merge(resolved);
	let typed = handler
		.signature()
		.parse_values_with_scopes(&connection, merged, &mut scopes)
		.await?;
	phase(&handler, Phase::Validated);

	for permission in handler.permissions() {
		if !permission.has_permission(&connection, &context).await? {
			return Err(Exception::PermissionDenied.into());
		}
	}
	phase(&handler, Phase::PermissionsPassed);

	let value = handler.endpoint().call(typed).await?;
	phase(&handler, Phase::HandlerReturned);

	Ok(adapt(&handler, value)?)
}

/// Render an exception under the handler's error policy: client validation
/// failures use the configured status (400 by default, optionally 422).
fn render_for(handler: &HandlerDescriptor, exception: &Exception) -> beryl_http::Response {
	let mut response = render_exception(exception);
	if let Exception::Validation(validation) = exception {
		if validation.origin == ValidationOrigin::Client
			&& handler.validation_error_status() != StatusCode::BAD_REQUEST
		{
			response.status = handler.validation_error_status();
		}
	}
	response
}

fn phase(handler: &HandlerDescriptor, phase: Phase) {
	tracing::debug!(handler = handler.name(), ?phase, "pipeline");
}
