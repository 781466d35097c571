//! # Beryl
//!
//! A request-handler dispatch core for typed HTTP and WebSocket
//! applications: per matched connection it reconstructs a typed argument
//! list from heterogeneous request inputs, resolves a dependency graph,
//! enforces an access-control chain and adapts the handler's return value
//! into transport events.
//!
//! This facade re-exports the workspace members:
//!
//! - [`exception`] — the closed error taxonomy and status mapping
//! - [`http`] — connection model, transport events, response containers
//! - [`encoders`] — the pluggable type-to-wire encoder registry
//! - [`signature`] — signature models, parameter classification, kwargs
//! - [`di`] — named dependency providers, DAG resolution, caching
//! - [`transform`] — per-handler transformer models
//! - [`dispatch`] — handler descriptors and the request pipeline

pub use beryl_di as di;
pub use beryl_dispatch as dispatch;
pub use beryl_encoders as encoders;
pub use beryl_exception as exception;
pub use beryl_http as http;
pub use beryl_signature as signature;
pub use beryl_transform as transform;

pub use beryl_dispatch::{
	Control, Endpoint, HandlerDescriptor, HandlerValue, Interceptor, OwnershipLayer, Permission,
	ReturnAnnotation, Routes, blocking_endpoint_fn, dispatch_http, dispatch_websocket,
	endpoint_fn, interceptor_fn, permission_fn,
};
pub use beryl_encoders::{Annotation, EncoderRegistry};
pub use beryl_exception::{Exception, Result};
pub use beryl_http::{
	Connection, Request, Response, Scope, Transport, WebSocket,
};
pub use beryl_signature::{Kwarg, Kwargs, ParamMarker, Signature};
