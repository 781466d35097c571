//! # Beryl Dispatch
//!
//! The per-request orchestrator of the beryl core.
//!
//! A [`HandlerDescriptor`] is created when a handler is registered; its
//! builder performs every registration-time validation (path template
//! parsing, reserved-kwarg rules, ownership-chain merging, dependency graph
//! construction, websocket signature rules) so that serving a request is
//! pure execution:
//!
//! ```text
//! Matched → InterceptorsRan → KwargsExtracted → DependenciesResolved
//!        → Validated → PermissionsPassed → HandlerReturned
//!        → ResponseAdapted → Sent
//! ```
//!
//! [`dispatch_http`] and [`dispatch_websocket`] drive the two connection
//! flavors; [`Routes`] enforces one handler per `(path, method)` and owns
//! the `Allow` set for 405 responses. The route *matcher* itself lives
//! outside this crate and hands over `(handler, path_params)`.

mod adapter;
mod descriptor;
mod endpoint;
mod interceptor;
mod permission;
mod pipeline;
mod websocket;

pub use adapter::{
	DefaultResponseFactory, ResponseFactory, ReturnAnnotation, adapt, render_exception,
};
pub use descriptor::{HandlerBuilder, HandlerDescriptor, OwnershipLayer, Routes};
pub use endpoint::{Endpoint, HandlerValue, blocking_endpoint_fn, endpoint_fn};
pub use interceptor::{Control, Interceptor, interceptor_fn};
pub use permission::{Permission, permission_fn};
pub use pipeline::{Phase, dispatch_http};
pub use websocket::dispatch_websocket;
