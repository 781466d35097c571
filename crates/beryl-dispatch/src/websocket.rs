//! The WebSocket dispatch pipeline.

use crate::descriptor::HandlerDescriptor;
use crate::endpoint::HandlerValue;
use beryl_di::Resolver;
use beryl_exception::Exception;
use beryl_http::{Connection, ReceiveEvent, Scope, SendEvent, Transport, WebSocket};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Serve one matched WebSocket connection.
///
/// Permissions run against the handshake; a denial closes with 1008 before
/// the connection is ever accepted. An exception escaping the handler closes
/// with its mapped close code.
pub async fn dispatch_websocket(
	handler: Arc<HandlerDescriptor>,
	scope: Scope,
	receive: mpsc::Receiver<ReceiveEvent>,
	transport: Transport,
) {
	let socket = WebSocket::new(scope, receive, transport.sender());
	let connection = Connection::WebSocket(socket.clone());
	let context = handler.context();

	// Handshake-stage permission checks.
	for permission in handler.permissions() {
		let verdict = permission.has_permission(&connection, &context).await;
		let denied = match verdict {
			Ok(allowed) => !allowed,
			Err(ref exception) => {
				tracing::debug!(handler = handler.name(), %exception, "handshake rejected");
				true
			}
		};
		if denied {
			let code = match verdict {
				Err(exception) => exception.websocket_close_code(),
				Ok(_) => Exception::PermissionDenied.websocket_close_code(),
			};
			let _ = transport.send(SendEvent::WsClose {
				code,
				reason: "policy violation".into(),
			});
			return;
		}
	}

	let outcome = run(&handler, &connection).await;

	if let Err(exception) = outcome {
		tracing::debug!(handler = handler.name(), %exception, "websocket handler failed");
		let _ = socket
			.close(exception.websocket_close_code(), exception.to_string())
			.await;
	}
}

async fn run(
	handler: &Arc<HandlerDescriptor>,
	connection: &Connection,
) -> beryl_exception::Result<()> {
	let context = handler.context();

	// No body extraction on websockets; registration already rejected
	// body-typed parameters.
	let kwargs = handler.transformer().to_kwargs(connection, &context).await?;

	let resolver = Resolver::new(handler.transformer().graph(), connection, &kwargs);
	let resolved = resolver.resolve_all().await?;

	let mut scopes = resolver.collected_scopes();
	let mut merged = kwargs;
	merged.merge(resolved);
	let typed = handler
		.signature()
		.parse_values_with_scopes(connection, merged, &mut scopes)
		.await?;

	match handler.endpoint().call(typed).await? {
		HandlerValue::None => Ok(()),
		other => Err(Exception::internal(format!(
			"websocket handler '{}' returned a {} value",
			handler.name(),
			other.kind()
		))),
	}
}
