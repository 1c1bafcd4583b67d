//! Session-per-request lifecycle: exactly one session scope per inbound
//! HTTP request, opened at request begin and disposed at request end.
//!
//! The two hooks, [`open_request_scope`] and [`close_request_scope`], act on
//! the request's extension bag and can run without a live server. The
//! [`scope_middleware`] composes them around the handler so every exit path
//! (success, error response) disposes the scope. Per-request state machine:
//! {uninitialized} -> begin -> {scope-open} -> end -> {scope-closed};
//! ending without a begin is safely absorbed.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{Extensions, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rowboat_common::{Error, Result, ScopeStrategy};
use rowboat_db::registry::Registry;
use rowboat_db::scope::{ScopeStack, SessionScope};

use crate::server::AppContext;

/// The per-request unit-of-work handle stored in the request extensions.
///
/// Handlers extract it with `Extension<RequestScope>` and pass
/// [`scope`](Self::scope) to repository operations. Nested scopes can be
/// opened through [`stack`](Self::stack).
#[derive(Clone)]
pub struct RequestScope {
    stack: Arc<ScopeStack>,
    scope: Arc<SessionScope>,
}

impl RequestScope {
    /// The scope opened for this request.
    pub fn scope(&self) -> &Arc<SessionScope> {
        &self.scope
    }

    /// The request's scope stack, for explicitly nested scopes.
    pub fn stack(&self) -> &Arc<ScopeStack> {
        &self.stack
    }

    fn dispose(&self) -> Result<()> {
        self.stack.close(self.scope.clone())
    }
}

fn ensure_request_aware(registry: &Registry) -> Result<()> {
    if registry.strategy() != ScopeStrategy::PerRequest {
        return Err(Error::misconfigured(
            "the session-per-request module requires ScopeStrategy::PerRequest; \
             set the strategy on the ConfigSource or remove the module",
        ));
    }
    Ok(())
}

/// Request-begin hook: open a scope and store it in the extension bag.
///
/// A missing registry means the persistence layer is unused in this
/// deployment and the hook is a no-op. A registry whose scope strategy is
/// not request-aware is a fatal configuration error, surfaced eagerly.
pub fn open_request_scope(
    registry: Option<&Arc<Registry>>,
    extensions: &mut Extensions,
) -> Result<()> {
    let Some(registry) = registry else {
        return Ok(());
    };
    ensure_request_aware(registry)?;

    let stack = Arc::new(ScopeStack::new(registry.clone()));
    let scope = stack.open()?;
    tracing::trace!(scope = scope.id(), "opened request scope");
    extensions.insert(RequestScope { stack, scope });
    Ok(())
}

/// Request-end hook: retrieve the scope from the extension bag and dispose
/// it, flushing per the configured policy and releasing the connections.
///
/// An absent scope is tolerated as a no-op; the request may have
/// short-circuited before the begin hook ran. The same initialization and
/// strategy checks as the begin hook apply.
pub fn close_request_scope(
    registry: Option<&Arc<Registry>>,
    extensions: &mut Extensions,
) -> Result<()> {
    let Some(registry) = registry else {
        return Ok(());
    };
    ensure_request_aware(registry)?;

    match extensions.remove::<RequestScope>() {
        Some(handle) => {
            tracing::trace!(scope = handle.scope.id(), "closing request scope");
            handle.dispose()
        }
        None => Ok(()),
    }
}

/// Axum middleware composing the begin/end hooks around the handler.
pub async fn scope_middleware(
    State(ctx): State<AppContext>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Err(err) = open_request_scope(ctx.registry.as_ref(), request.extensions_mut()) {
        tracing::error!(error = %err, "failed to open request scope");
        return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
    }

    // The handle held here is the end hook's retrieval: the request (and
    // its extension bag) is consumed by the handler chain.
    let handle = request.extensions().get::<RequestScope>().cloned();
    let response = next.run(request).await;

    if let Some(handle) = handle {
        if let Err(err) = handle.dispose() {
            tracing::error!(error = %err, "failed to close request scope");
            return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
        }
    }
    response
}
