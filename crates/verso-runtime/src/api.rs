//! Versioned dispatch facade
//!
//! [`VersionedApi`] ties the published tables to request handling: it picks
//! the operation a version exposes, migrates the request up to the latest
//! version, runs the handler and migrates the response back down.

use crate::config::RuntimeConfig;
use crate::context::RequestContext;
use crate::error::{DispatchError, HeaderError, MigrationError};
use crate::header::VersionHeader;
use crate::migration::Migrator;
use crate::side_effects::SideEffectRegistry;
use crate::validation::{PayloadValidator, ShapeValidator};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use verso_structure::{ApiVersion, OperationDefinition, Payload, RouteSelector, ShapeId};
use verso_synthesis::{SynthesisError, TablePublisher, VersionTables, VersionedSchema};

/// Published tables plus the request-time pipeline around them
pub struct VersionedApi {
    publisher: Arc<TablePublisher>,
    validator: Arc<dyn PayloadValidator>,
    config: RuntimeConfig,
}

impl VersionedApi {
    /// Facade over an existing publisher
    #[must_use]
    pub fn new(publisher: Arc<TablePublisher>) -> Self {
        Self {
            publisher,
            validator: Arc::new(ShapeValidator::new()),
            config: RuntimeConfig::default(),
        }
    }

    /// Synthesize `schema` and wrap it
    ///
    /// # Errors
    /// Returns the synthesis error if the schema is inconsistent
    pub fn from_schema(schema: VersionedSchema) -> Result<Self, SynthesisError> {
        let publisher = TablePublisher::new(Arc::new(schema))?;
        Ok(Self::new(Arc::new(publisher)))
    }

    /// Replace the validator
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn PayloadValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Table publisher; regenerating through it affects later calls only
    #[inline]
    #[must_use]
    pub fn publisher(&self) -> &Arc<TablePublisher> {
        &self.publisher
    }

    /// Currently published tables
    #[inline]
    #[must_use]
    pub fn tables(&self) -> Arc<VersionTables> {
        self.publisher.current()
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Migrator over the currently published tables
    #[must_use]
    pub fn migrator(&self) -> Migrator {
        Migrator::new(self.tables())
            .with_validator(Arc::clone(&self.validator))
            .with_config(self.config.clone())
    }

    /// Side-effect registry over the currently published tables
    #[must_use]
    pub fn side_effects(&self) -> SideEffectRegistry {
        SideEffectRegistry::new(self.tables())
    }

    /// Version header reader built from the configuration
    #[must_use]
    pub fn version_header(&self) -> VersionHeader {
        VersionHeader::from_config(&self.config)
    }

    /// Requested version from header pairs
    ///
    /// # Errors
    /// See [`VersionHeader::resolve`]
    pub fn version_from_headers<'a, I>(&self, headers: I) -> Result<ApiVersion, HeaderError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.version_header().resolve(headers)
    }

    /// Convert a latest-version payload of `shape` into `version`, converters only
    ///
    /// # Errors
    /// See [`Migrator::data_to_version`]
    pub fn data_to_version(
        &self,
        shape: &ShapeId,
        payload: &Payload,
        version: ApiVersion,
    ) -> Result<Payload, MigrationError> {
        self.migrator().data_to_version(shape, payload, version)
    }

    /// Serve `request` for `route` as seen by `version` (`None` = latest)
    ///
    /// The whole call runs inside a [`RequestContext`] scope for the
    /// requested version, so handlers can consult side effects.
    ///
    /// # Errors
    /// - [`DispatchError::OperationNotFound`] if the version has no such operation
    /// - [`DispatchError::AmbiguousRoute`] if several operations match
    /// - [`DispatchError::Migration`] if the request or response cannot be migrated
    /// - [`DispatchError::Handler`] if the handler fails
    pub async fn dispatch(
        &self,
        route: &RouteSelector,
        version: Option<ApiVersion>,
        request: Payload,
    ) -> Result<Payload, DispatchError> {
        let migrator = self.migrator();
        let requested = version.map(|v| migrator.resolve(v)).transpose()?;
        let at = requested.unwrap_or_else(|| migrator.tables().latest());

        let tables = Arc::clone(migrator.tables());
        let snapshot = tables
            .snapshot(at)
            .ok_or(MigrationError::UnknownVersion(at))?;
        let operation = match snapshot
            .operations()
            .matching(route)
            .as_slice()
        {
            [operation] => *operation,
            [] => {
                return Err(DispatchError::OperationNotFound {
                    route: route.clone(),
                    version: at,
                })
            }
            candidates => {
                return Err(DispatchError::AmbiguousRoute {
                    route: route.clone(),
                    version: at,
                    count: candidates.len(),
                })
            }
        };

        tracing::debug!(
            route = %operation.route(),
            version = %at,
            handler = operation.handler().name(),
            "dispatching versioned call"
        );

        RequestContext::scope(requested, call(&migrator, operation, request, requested, at)).await
    }
}

async fn call(
    migrator: &Migrator,
    operation: &OperationDefinition,
    request: Payload,
    requested: Option<ApiVersion>,
    at: ApiVersion,
) -> Result<Payload, DispatchError> {
    let request = match operation.request_shape() {
        Some(shape) => migrator.migrate_request(&request, shape, requested)?,
        None => request,
    };
    let response = operation.handler().handle(request).await?;
    match operation.response_shape() {
        Some(shape) => Ok(migrator.migrate_response(&response, shape, Some(at))?),
        None => Ok(response),
    }
}

impl Debug for VersionedApi {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedApi")
            .field("latest", &self.tables().latest())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use verso_structure::{HandlerError, RouteSelector};
    use verso_test_utils::{payload, users_definition, users_versions, v, V2000, V2001};

    fn users() -> VersionedApi {
        VersionedApi::from_schema(VersionedSchema::new(users_definition(), users_versions(true)).unwrap())
            .unwrap()
    }

    fn create_user() -> RouteSelector {
        RouteSelector::new("/users", ["POST"])
    }

    #[tokio::test]
    async fn dispatch_at_old_version() {
        let api = users();
        let response = api
            .dispatch(&create_user(), Some(v(V2000)), payload(json!({"id": 1, "address": "Baker St"})))
            .await
            .unwrap();
        assert_eq!(response, payload(json!({"id": 83, "address": "Baker St"})));
    }

    #[tokio::test]
    async fn dispatch_at_latest() {
        let api = users();
        let body = payload(json!({"id": 1, "addresses": ["A", "B"]}));
        let explicit = api.dispatch(&create_user(), Some(v(V2001)), body.clone()).await.unwrap();
        let implicit = api.dispatch(&create_user(), None, body).await.unwrap();
        assert_eq!(explicit, payload(json!({"id": 83, "addresses": ["A", "B"]})));
        assert_eq!(explicit, implicit);
    }

    #[tokio::test]
    async fn unknown_route() {
        let api = users();
        let err = api
            .dispatch(&RouteSelector::new("/users", ["GET"]), None, Payload::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::OperationNotFound { .. }));
    }

    #[tokio::test]
    async fn unknown_version_and_handler_errors() {
        let api = users();
        let err = api
            .dispatch(&create_user(), Some(v("1990-01-01")), Payload::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Migration(MigrationError::UnknownVersion(_))));

        let rejected = DispatchError::from(HandlerError::Failed("boom".into()));
        assert_eq!(rejected.to_string(), "handler failed: boom");
    }

    #[test]
    fn header_follows_config() {
        let api = users().with_config(RuntimeConfig::new().with_default_version(v(V2000)));
        assert_eq!(api.version_from_headers(std::iter::empty()).unwrap(), v(V2000));
        assert_eq!(
            api.version_from_headers([("X-API-Version", "2001-01-01")]).unwrap(),
            v(V2001)
        );
    }
}
