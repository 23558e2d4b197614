//! Versioned dispatch over the companies interface

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use verso_runtime::{DispatchError, RequestContext, RuntimeConfig, RuntimeError, VersionedApi};
use verso_structure::{
    handler_fn, ApiDefinition, OperationDefinition, Payload, RouteSelector, Version, VersionChange,
};
use verso_synthesis::VersionedSchema;
use verso_test_utils::{
    companies_definition, companies_versions, payload, route, v, V2000, V2001, V2002,
};

fn companies() -> VersionedApi {
    let schema = VersionedSchema::new(companies_definition(), companies_versions()).unwrap();
    VersionedApi::from_schema(schema).unwrap()
}

fn create_company() -> RouteSelector {
    RouteSelector::new("/companies", ["POST"])
}

fn get_company() -> RouteSelector {
    RouteSelector::new("/companies/{company_id}", ["GET"])
}

fn get_vat_ids() -> RouteSelector {
    RouteSelector::new("/companies/{company_id}/vat_ids", ["GET"])
}

#[tokio::test]
async fn oldest_version_speaks_single_vat_id() {
    let api = companies();

    let created = api
        .dispatch(
            &create_company(),
            Some(v(V2000)),
            payload(json!({"name": "Company 1", "vat_id": "123"})),
        )
        .await
        .unwrap();
    assert_eq!(created, payload(json!({"name": "Company 1", "vat_id": "123"})));

    let fetched = api
        .dispatch(&get_company(), Some(v(V2000)), payload(json!({"company_id": 1})))
        .await
        .unwrap();
    assert_eq!(fetched, payload(json!({"name": "Company 1", "vat_id": "First VAT ID"})));
}

#[tokio::test]
async fn middle_version_speaks_vat_id_list() {
    let api = companies();
    let created = api
        .dispatch(
            &create_company(),
            Some(v(V2001)),
            payload(json!({"name": "Company 1", "vat_ids": ["123"]})),
        )
        .await
        .unwrap();
    assert_eq!(
        created,
        payload(json!({
            "name": "Company 1",
            "vat_ids": ["123", "First VAT ID", "Second VAT ID"]
        }))
    );
}

#[tokio::test]
async fn latest_version_uses_subresource() {
    let api = companies();
    let created = api
        .dispatch(
            &create_company(),
            Some(v(V2002)),
            payload(json!({"name": "Company 1", "default_vat_id": "123"})),
        )
        .await
        .unwrap();
    assert_eq!(created, payload(json!({"name": "Company 1"})));

    let vat_ids = api
        .dispatch(&get_vat_ids(), None, payload(json!({"company_id": 1})))
        .await
        .unwrap();
    assert_eq!(
        vat_ids,
        payload(json!({
            "data": [
                {"id": 83, "value": "First VAT ID"},
                {"id": 91, "value": "Second VAT ID"}
            ]
        }))
    );
}

#[tokio::test]
async fn subresource_absent_before_it_was_introduced() {
    let api = companies();
    let err = api
        .dispatch(&get_vat_ids(), Some(v(V2001)), payload(json!({"company_id": 1})))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::OperationNotFound { version, .. } if version == v(V2001)
    ));
    assert!(RuntimeError::from(err).is_client_error());
}

#[tokio::test]
async fn invalid_old_request_is_a_client_error() {
    let api = companies();
    let err = api
        .dispatch(&create_company(), Some(v(V2000)), payload(json!({"name": "Company 1"})))
        .await
        .unwrap_err();
    let err = RuntimeError::from(err);
    assert!(err.is_client_error(), "{err}");
}

#[tokio::test]
async fn request_validation_switch_is_respected() {
    let api = companies().with_config(RuntimeConfig::new().with_validate_requests(false));
    let err = api
        .dispatch(&create_company(), Some(v(V2000)), payload(json!({"name": "Company 1"})))
        .await
        .unwrap_err();
    // without validation the converter itself trips over the missing field
    assert!(matches!(err, DispatchError::Migration(verso_runtime::MigrationError::Converter { .. })));
}

#[tokio::test]
async fn header_to_response() {
    let api = companies();
    let version = api
        .version_from_headers([("X-API-VERSION", V2000)])
        .unwrap();
    let fetched = api
        .dispatch(&get_company(), Some(version), payload(json!({"company_id": 5})))
        .await
        .unwrap();
    assert_eq!(fetched["vat_id"], json!("First VAT ID"));
}

#[tokio::test]
async fn handlers_run_inside_the_request_context() {
    let definition = ApiDefinition::builder()
        .operation(OperationDefinition::new(
            route("/whoami", "GET", "whoami"),
            handler_fn("whoami", |_request: Payload| async move {
                let version = RequestContext::current().map(|v| v.to_string());
                Ok(payload(json!({"version": version})))
            }),
        ))
        .build()
        .unwrap();
    let change: Arc<VersionChange> = VersionChange::builder("nothing visible changed")
        .side_effects()
        .build()
        .unwrap();
    let versions = [Version::new(v(V2001)).with_change(change), Version::new(v(V2000))];
    let api = VersionedApi::from_schema(VersionedSchema::new(definition, versions).unwrap()).unwrap();
    let whoami = RouteSelector::new("/whoami", ["GET"]);

    let old = api.dispatch(&whoami, Some(v("2000-07-01")), Payload::new()).await.unwrap();
    assert_eq!(old["version"], json!(V2000));

    let latest = api.dispatch(&whoami, None, Payload::new()).await.unwrap();
    assert_eq!(latest["version"], json!(null));
}

#[tokio::test]
async fn regenerated_tables_serve_later_calls() {
    let api = companies();
    let before = api.tables();
    api.publisher().regenerate().unwrap();
    assert!(!Arc::ptr_eq(&before, &api.tables()));

    let fetched = api
        .dispatch(&get_company(), Some(v(V2001)), payload(json!({"company_id": 1})))
        .await
        .unwrap();
    assert_eq!(
        fetched,
        payload(json!({"name": "Company 1", "vat_ids": ["First VAT ID", "Second VAT ID"]}))
    );
}
