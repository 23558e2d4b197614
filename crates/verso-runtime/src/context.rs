//! Per-request version context
//!
//! The version a request was made at lives in a task-local slot. Code that
//! runs inside [`RequestContext::scope`] sees that version through
//! [`RequestContext::current`]; outside any scope the answer is `None`,
//! meaning the latest version. Concurrent tasks never observe each other's
//! slot.

use std::future::Future;
use verso_structure::ApiVersion;

tokio::task_local! {
    static CURRENT_VERSION: Option<ApiVersion>;
}

/// Version a request is served at
///
/// Also usable as an explicit value where task-locals are not wanted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RequestContext {
    version: Option<ApiVersion>,
}

impl RequestContext {
    /// Context for `version` (`None` = latest)
    #[inline]
    #[must_use]
    pub const fn new(version: Option<ApiVersion>) -> Self {
        Self { version }
    }

    /// Context for the latest version
    #[inline]
    #[must_use]
    pub const fn latest() -> Self {
        Self { version: None }
    }

    /// Context pinned to `version`
    #[inline]
    #[must_use]
    pub const fn at(version: ApiVersion) -> Self {
        Self {
            version: Some(version),
        }
    }

    /// Requested version (`None` = latest)
    #[inline]
    #[must_use]
    pub const fn version(&self) -> Option<ApiVersion> {
        self.version
    }

    /// Whether the latest version is requested
    #[inline]
    #[must_use]
    pub const fn is_latest(&self) -> bool {
        self.version.is_none()
    }

    /// Run `future` with `version` as the current version
    pub async fn scope<F>(version: Option<ApiVersion>, future: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_VERSION.scope(version, future).await
    }

    /// Run `future` inside this context
    pub async fn run<F>(self, future: F) -> F::Output
    where
        F: Future,
    {
        Self::scope(self.version, future).await
    }

    /// Run a closure synchronously with `version` as the current version
    pub fn sync_scope<R>(version: Option<ApiVersion>, f: impl FnOnce() -> R) -> R {
        CURRENT_VERSION.sync_scope(version, f)
    }

    /// Version of the enclosing scope, `None` outside any scope
    #[must_use]
    pub fn current() -> Option<ApiVersion> {
        CURRENT_VERSION.try_with(|version| *version).ok().flatten()
    }

    /// Context of the enclosing scope
    #[inline]
    #[must_use]
    pub fn capture() -> Self {
        Self::new(Self::current())
    }
}

impl From<ApiVersion> for RequestContext {
    fn from(version: ApiVersion) -> Self {
        Self::at(version)
    }
}

impl From<Option<ApiVersion>> for RequestContext {
    fn from(version: Option<ApiVersion>) -> Self {
        Self::new(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> ApiVersion {
        s.parse().unwrap()
    }

    #[test]
    fn outside_scope_is_latest() {
        assert_eq!(RequestContext::current(), None);
        assert!(RequestContext::capture().is_latest());
    }

    #[tokio::test]
    async fn scope_sets_and_restores() {
        let seen = RequestContext::scope(Some(v("2000-01-01")), async {
            let outer = RequestContext::current();
            let inner = RequestContext::scope(None, async { RequestContext::current() }).await;
            (outer, inner, RequestContext::current())
        })
        .await;
        assert_eq!(seen, (Some(v("2000-01-01")), None, Some(v("2000-01-01"))));
        assert_eq!(RequestContext::current(), None);
    }

    #[tokio::test]
    async fn explicit_context_runs_future() {
        let context = RequestContext::at(v("2001-01-01"));
        let seen = context.run(async { RequestContext::capture() }).await;
        assert_eq!(seen, context);
    }

    #[test]
    fn sync_scope() {
        let seen = RequestContext::sync_scope(Some(v("2001-01-01")), RequestContext::current);
        assert_eq!(seen, Some(v("2001-01-01")));
    }
}
