//! Operations exposed by the interface
//!
//! An operation is identified by [`RouteId`] (path, method set and optional
//! function name). Instructions address operations through a
//! [`RouteSelector`], which may leave the function name open.

use crate::error::StructureError;
use crate::payload::Payload;
use crate::types::ShapeId;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::Future;
use std::sync::Arc;

fn normalize_methods<I, S>(methods: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    methods
        .into_iter()
        .map(|m| m.as_ref().trim().to_ascii_uppercase())
        .filter(|m| !m.is_empty())
        .collect()
}

fn fmt_route(
    f: &mut Formatter<'_>,
    path: &str,
    methods: &BTreeSet<String>,
    func_name: Option<&str>,
) -> fmt::Result {
    let methods: Vec<&str> = methods.iter().map(String::as_str).collect();
    write!(f, "{} {}", methods.join(","), path)?;
    if let Some(name) = func_name {
        write!(f, " ({name})")?;
    }
    Ok(())
}

/// Identity of an operation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RouteId {
    path: String,
    methods: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    func_name: Option<String>,
}

impl RouteId {
    /// Create a route identity
    ///
    /// Methods are upper-cased and deduplicated.
    ///
    /// # Errors
    /// Returns [`StructureError::InvalidRoute`] if the path does not start
    /// with `/` or no method is given
    pub fn new<I, S>(
        path: impl Into<String>,
        methods: I,
        func_name: Option<String>,
    ) -> Result<Self, StructureError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path = path.into();
        let methods = normalize_methods(methods);
        if !path.starts_with('/') {
            return Err(StructureError::InvalidRoute {
                route: path,
                reason: "path must start with '/'".to_string(),
            });
        }
        if methods.is_empty() {
            return Err(StructureError::InvalidRoute {
                route: path,
                reason: "at least one method is required".to_string(),
            });
        }
        Ok(Self {
            path,
            methods,
            func_name,
        })
    }

    /// Route path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Upper-case method set
    #[inline]
    #[must_use]
    pub fn methods(&self) -> &BTreeSet<String> {
        &self.methods
    }

    /// Function name, if any
    #[inline]
    #[must_use]
    pub fn func_name(&self) -> Option<&str> {
        self.func_name.as_deref()
    }

    /// Selector matching exactly this route
    #[must_use]
    pub fn selector(&self) -> RouteSelector {
        RouteSelector {
            path: self.path.clone(),
            methods: self.methods.clone(),
            func_name: self.func_name.clone(),
        }
    }
}

impl Display for RouteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fmt_route(f, &self.path, &self.methods, self.func_name.as_deref())
    }
}

/// Operation address used by instructions
///
/// Matches routes with an equal path and an equal method set, narrowed by
/// `func_name` when given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RouteSelector {
    path: String,
    methods: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    func_name: Option<String>,
}

impl RouteSelector {
    /// Select by path and methods
    #[must_use]
    pub fn new<I, S>(path: impl Into<String>, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            path: path.into(),
            methods: normalize_methods(methods),
            func_name: None,
        }
    }

    /// Narrow to one function name
    #[inline]
    #[must_use]
    pub fn with_func_name(mut self, name: impl Into<String>) -> Self {
        self.func_name = Some(name.into());
        self
    }

    /// Selected path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Selected methods
    #[inline]
    #[must_use]
    pub fn methods(&self) -> &BTreeSet<String> {
        &self.methods
    }

    /// Function name filter
    #[inline]
    #[must_use]
    pub fn func_name(&self) -> Option<&str> {
        self.func_name.as_deref()
    }

    /// Whether `route` is selected
    #[must_use]
    pub fn matches(&self, route: &RouteId) -> bool {
        self.path == route.path
            && self.methods == route.methods
            && self
                .func_name
                .as_deref()
                .map_or(true, |name| route.func_name() == Some(name))
    }
}

impl Display for RouteSelector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fmt_route(f, &self.path, &self.methods, self.func_name.as_deref())
    }
}

const fn default_true() -> bool {
    true
}

/// Documentation-level attributes of an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationAttributes {
    /// Short summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Long description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Description of the successful response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_description: Option<String>,
    /// Grouping tags
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Marked deprecated
    pub deprecated: bool,
    /// Success status code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Explicit operation id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Whether the operation appears in generated documents
    #[serde(default = "default_true")]
    pub include_in_schema: bool,
    /// Free-form attributes
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, Value>,
}

impl Default for OperationAttributes {
    fn default() -> Self {
        Self {
            summary: None,
            description: None,
            response_description: None,
            tags: Vec::new(),
            deprecated: false,
            status_code: None,
            operation_id: None,
            include_in_schema: true,
            extra: IndexMap::new(),
        }
    }
}

/// Partial update of operation attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct AttributeChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_in_schema: Option<bool>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, Value>,
}

impl AttributeChanges {
    /// Overlay set values onto `attributes`
    pub fn apply_to(&self, attributes: &mut OperationAttributes) {
        macro_rules! overlay_opt {
            ($($attr:ident),*) => {
                $(if self.$attr.is_some() {
                    attributes.$attr.clone_from(&self.$attr);
                })*
            };
        }
        overlay_opt!(summary, description, response_description, status_code, operation_id);
        if let Some(tags) = &self.tags {
            attributes.tags.clone_from(tags);
        }
        if let Some(deprecated) = self.deprecated {
            attributes.deprecated = deprecated;
        }
        if let Some(include) = self.include_in_schema {
            attributes.include_in_schema = include;
        }
        for (key, value) in &self.extra {
            attributes.extra.insert(key.clone(), value.clone());
        }
    }
}

/// Errors returned by operation handlers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// Request rejected with a status and message
    #[error("rejected with status {status}: {message}")]
    Rejected {
        /// Status code to report
        status: u16,
        /// Reason
        message: String,
    },

    /// No implementation bound to this operation
    #[error("operation '{0}' is not implemented")]
    NotImplemented(String),

    /// Handler failure
    #[error("handler failed: {0}")]
    Failed(String),
}

/// Business logic behind an operation
///
/// Handlers always see latest-version payloads.
#[async_trait]
pub trait OperationHandler: Send + Sync + Debug {
    /// Name used for identity and diagnostics
    fn name(&self) -> &str;

    /// Handle a latest-version request payload
    ///
    /// # Errors
    /// Returns [`HandlerError`] when the request cannot be served
    async fn handle(&self, request: Payload) -> Result<Payload, HandlerError>;
}

/// Handlers compare by name
impl PartialEq for dyn OperationHandler {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

/// Handler backed by an async closure
pub struct FnHandler<F> {
    name: String,
    func: F,
}

impl<F> Debug for FnHandler<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> OperationHandler for FnHandler<F>
where
    F: Fn(Payload) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Payload, HandlerError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, request: Payload) -> Result<Payload, HandlerError> {
        (self.func)(request).await
    }
}

/// Wrap an async closure as a shared handler
pub fn handler_fn<F, Fut>(name: impl Into<String>, func: F) -> Arc<dyn OperationHandler>
where
    F: Fn(Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Payload, HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler {
        name: name.into(),
        func,
    })
}

/// Placeholder for operations declared without code
#[derive(Debug, Clone)]
pub struct UnimplementedHandler {
    name: String,
}

impl UnimplementedHandler {
    /// Placeholder named `name`
    #[must_use]
    pub fn shared(name: impl Into<String>) -> Arc<dyn OperationHandler> {
        Arc::new(Self { name: name.into() })
    }
}

#[async_trait]
impl OperationHandler for UnimplementedHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, _request: Payload) -> Result<Payload, HandlerError> {
        Err(HandlerError::NotImplemented(self.name.clone()))
    }
}

fn handler_name<S>(handler: &Arc<dyn OperationHandler>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(handler.name())
}

/// One operation as seen by one version
#[derive(Debug, Clone, Serialize)]
pub struct OperationDefinition {
    route: RouteId,
    exists: bool,
    attributes: OperationAttributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_shape: Option<ShapeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_shape: Option<ShapeId>,
    #[serde(serialize_with = "handler_name")]
    handler: Arc<dyn OperationHandler>,
}

impl OperationDefinition {
    /// Present operation with default attributes
    #[must_use]
    pub fn new(route: RouteId, handler: Arc<dyn OperationHandler>) -> Self {
        Self {
            route,
            exists: true,
            attributes: OperationAttributes::default(),
            request_shape: None,
            response_shape: None,
            handler,
        }
    }

    /// Mark as absent from the latest version
    ///
    /// Such operations only appear in older versions through
    /// an `OperationExisted` instruction.
    #[inline]
    #[must_use]
    pub fn absent(mut self) -> Self {
        self.exists = false;
        self
    }

    /// Set attributes
    #[inline]
    #[must_use]
    pub fn with_attributes(mut self, attributes: OperationAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set the request body shape
    #[inline]
    #[must_use]
    pub fn with_request(mut self, shape: impl Into<ShapeId>) -> Self {
        self.request_shape = Some(shape.into());
        self
    }

    /// Set the response body shape
    #[inline]
    #[must_use]
    pub fn with_response(mut self, shape: impl Into<ShapeId>) -> Self {
        self.response_shape = Some(shape.into());
        self
    }

    /// Route identity
    #[inline]
    #[must_use]
    pub fn route(&self) -> &RouteId {
        &self.route
    }

    /// Whether the operation is exposed
    #[inline]
    #[must_use]
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Attributes
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &OperationAttributes {
        &self.attributes
    }

    /// Request body shape
    #[inline]
    #[must_use]
    pub fn request_shape(&self) -> Option<&ShapeId> {
        self.request_shape.as_ref()
    }

    /// Response body shape
    #[inline]
    #[must_use]
    pub fn response_shape(&self) -> Option<&ShapeId> {
        self.response_shape.as_ref()
    }

    /// Handler
    #[inline]
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn OperationHandler> {
        &self.handler
    }

    /// Toggle exposure
    #[inline]
    pub fn set_exists(&mut self, exists: bool) {
        self.exists = exists;
    }

    /// Mutable attributes
    #[inline]
    pub fn attributes_mut(&mut self) -> &mut OperationAttributes {
        &mut self.attributes
    }

    /// Swap the handler; route identity is untouched
    #[inline]
    pub fn replace_handler(&mut self, handler: Arc<dyn OperationHandler>) {
        self.handler = handler;
    }
}

impl PartialEq for OperationDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.route == other.route
            && self.exists == other.exists
            && self.attributes == other.attributes
            && self.request_shape == other.request_shape
            && self.response_shape == other.response_shape
            && *self.handler == *other.handler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn route(func: &str) -> RouteId {
        RouteId::new("/users", ["get"], Some(func.to_string())).unwrap()
    }

    #[test]
    fn methods_are_normalized() {
        let id = RouteId::new("/users", ["post", "GET", "get"], None).unwrap();
        let methods: Vec<_> = id.methods().iter().cloned().collect();
        assert_eq!(methods, vec!["GET", "POST"]);
        assert_eq!(id.to_string(), "GET,POST /users");
    }

    #[test]
    fn invalid_routes_rejected() {
        assert!(RouteId::new("users", ["GET"], None).is_err());
        assert!(RouteId::new("/users", Vec::<String>::new(), None).is_err());
    }

    #[test]
    fn selector_matches_path_and_method_set() {
        let selector = RouteSelector::new("/users", ["GET"]);
        assert!(selector.matches(&route("list_users")));
        assert!(!RouteSelector::new("/users", ["GET", "POST"]).matches(&route("list_users")));
        assert!(!RouteSelector::new("/companies", ["GET"]).matches(&route("list_users")));
    }

    #[test]
    fn selector_func_name_narrows() {
        let selector = RouteSelector::new("/users", ["GET"]).with_func_name("list_users_v1");
        assert!(!selector.matches(&route("list_users")));
        assert!(selector.matches(&route("list_users_v1")));
    }

    #[test]
    fn attribute_changes_overlay() {
        let mut attrs = OperationAttributes {
            summary: Some("List".to_string()),
            ..OperationAttributes::default()
        };
        let changes = AttributeChanges {
            deprecated: Some(true),
            tags: Some(vec!["users".to_string()]),
            ..AttributeChanges::default()
        };
        changes.apply_to(&mut attrs);
        assert!(attrs.deprecated);
        assert_eq!(attrs.summary.as_deref(), Some("List"));
        assert_eq!(attrs.tags, vec!["users"]);
        assert!(attrs.include_in_schema);
    }

    #[test]
    fn attributes_default_includes_in_schema() {
        let attrs: OperationAttributes = serde_json::from_value(json!({})).unwrap();
        assert!(attrs.include_in_schema);
    }

    #[tokio::test]
    async fn fn_handler_runs_closure() {
        let handler = handler_fn("echo", |payload: Payload| async move { Ok(payload) });
        let mut request = Payload::new();
        request.insert("x".to_string(), json!(1));
        let response = handler.handle(request.clone()).await.unwrap();
        assert_eq!(response, request);
        assert_eq!(handler.name(), "echo");
    }

    #[tokio::test]
    async fn unimplemented_handler_reports() {
        let handler = UnimplementedHandler::shared("create_user");
        let err = handler.handle(Payload::new()).await.unwrap_err();
        assert_eq!(err, HandlerError::NotImplemented("create_user".to_string()));
    }

    #[test]
    fn definitions_compare_by_handler_name() {
        let a = OperationDefinition::new(route("list"), UnimplementedHandler::shared("list"));
        let b = OperationDefinition::new(route("list"), handler_fn("list", |p| async move { Ok(p) }));
        assert_eq!(a, b);
        let value = serde_json::to_value(&a).unwrap();
        assert_eq!(value["handler"], json!("list"));
        assert_eq!(value["exists"], json!(true));
    }
}
