//! Request context for GraphQL handlers
//!
//! Provides helpers for:
//! - Extracting the acting user and preferred language from HTTP headers
//! - Injecting them into the GraphQL request
//! - Reading them back inside resolvers and loaders

use async_graphql::{Context, Request, Response, Schema};
use axum::{extract::Extension, http::HeaderMap, Json};
use uuid::Uuid;

use crate::types::Locale;

/// Acting user and language of the current request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: Option<Uuid>,
    /// `None` when the client did not send `Accept-Language`
    pub locale: Option<Locale>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            locale: None,
        }
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = Some(locale);
        self
    }

    pub fn locale_or(&self, fallback: Locale) -> Locale {
        self.locale.unwrap_or(fallback)
    }
}

/// Extract user_id from x-user-id header
pub fn extract_user_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// Extract the preferred language from the Accept-Language header
pub fn extract_locale(headers: &HeaderMap) -> Option<Locale> {
    headers
        .get("accept-language")
        .and_then(|v| v.to_str().ok())
        .map(Locale::from_accept_language)
}

pub fn extract_request_context(headers: &HeaderMap) -> RequestContext {
    RequestContext {
        user_id: extract_user_id(headers),
        locale: extract_locale(headers),
    }
}

/// Standard GraphQL handler with request context injection
///
/// # Example
///
/// ```rust,ignore
/// use axum::{Router, routing::post};
/// use tracker_graphql_helpers::auth::graphql_handler;
///
/// let app: Router = Router::new()
///     .route("/graphql", post(graphql_handler::<
///         async_graphql::EmptyMutation,
///         async_graphql::EmptyMutation,
///         async_graphql::EmptySubscription,
///     >));
/// ```
pub async fn graphql_handler<Query, Mutation, Subscription>(
    Extension(schema): Extension<Schema<Query, Mutation, Subscription>>,
    headers: HeaderMap,
    req: Json<Request>,
) -> Json<Response>
where
    Query: async_graphql::ObjectType + 'static,
    Mutation: async_graphql::ObjectType + 'static,
    Subscription: async_graphql::SubscriptionType + 'static,
{
    let context = extract_request_context(&headers);
    let request = req.0.data(context);

    Json(schema.execute(request).await)
}

/// Get the request context inside a resolver
///
/// Requests that did not go through [`graphql_handler`] are treated as anonymous.
pub fn request_context(ctx: &Context<'_>) -> RequestContext {
    ctx.data_opt::<RequestContext>().copied().unwrap_or_default()
}
