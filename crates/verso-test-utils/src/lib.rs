//! Testing utilities for the Verso workspace
//!
//! Shared fixtures: a users interface (one change turning `address` into
//! `addresses`) and a companies interface (three versions, VAT ids moving
//! from a single value to a list to a sub-resource).

#![allow(missing_docs)]

use serde_json::{json, Value};
use std::sync::Arc;
use verso_structure::instruction::{operation, shape};
use verso_structure::{
    handler_fn, ApiDefinition, ApiVersion, ConverterError, FieldDefinition, OperationDefinition,
    Payload, PayloadExt, RouteId, ShapeDefinition, TypeDescriptor, Version, VersionChange,
};

pub const V2000: &str = "2000-01-01";
pub const V2001: &str = "2001-01-01";
pub const V2002: &str = "2002-01-01";

/// Parse a `YYYY-MM-DD` version; panics on bad input
pub fn v(s: &str) -> ApiVersion {
    s.parse().unwrap()
}

/// Build a payload from a JSON object literal
pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn route(path: &str, method: &str, func_name: &str) -> RouteId {
    RouteId::new(path, [method], Some(func_name.to_string())).unwrap()
}

fn first_item(payload: &mut Payload, from: &str, to: &str) -> Result<(), ConverterError> {
    let items = payload.take_field(from)?;
    let first = items
        .as_array()
        .and_then(|items| items.first())
        .cloned()
        .ok_or_else(|| ConverterError::InvalidValue {
            field: from.to_string(),
            message: "expected a non-empty list".to_string(),
        })?;
    payload.insert(to.to_string(), first);
    Ok(())
}

fn wrap_item(payload: &mut Payload, from: &str, to: &str) -> Result<(), ConverterError> {
    let item = payload.take_field(from)?;
    payload.insert(to.to_string(), json!([item]));
    Ok(())
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Latest `User`: `id` plus `addresses: list[string]` (at least one item)
pub fn users_definition() -> ApiDefinition {
    ApiDefinition::builder()
        .shape(
            ShapeDefinition::new("User")
                .with_field("id", FieldDefinition::new(TypeDescriptor::Integer))
                .with_field(
                    "addresses",
                    FieldDefinition::new(TypeDescriptor::list(TypeDescriptor::String)).with_min_items(1),
                ),
        )
        .operation(
            OperationDefinition::new(
                route("/users", "POST", "create_user"),
                handler_fn("create_user", |request: Payload| async move {
                    let mut response = request;
                    response.insert("id".to_string(), json!(83));
                    Ok(response)
                }),
            )
            .with_request("User")
            .with_response("User"),
        )
        .build()
        .unwrap()
}

/// Change attached to 2001: before it, users had a single `address`
pub fn address_to_addresses(with_converters: bool) -> Arc<VersionChange> {
    let mut builder = VersionChange::builder("User address became a list of addresses")
        .instruction(
            shape("User")
                .field("address")
                .existed(FieldDefinition::new(TypeDescriptor::String)),
        )
        .instruction(shape("User").field("addresses").did_not_exist());
    if with_converters {
        builder = builder
            .convert_response(["User"], |payload, _| first_item(payload, "addresses", "address"))
            .convert_request("User", |mut payload| {
                wrap_item(&mut payload, "address", "addresses")?;
                Ok(payload)
            });
    }
    builder.build().unwrap()
}

/// 2001 (with the address change) and 2000
pub fn users_versions(with_converters: bool) -> Vec<Version> {
    vec![
        Version::new(v(V2001)).with_change(address_to_addresses(with_converters)),
        Version::new(v(V2000)),
    ]
}

// ---------------------------------------------------------------------------
// Companies
// ---------------------------------------------------------------------------

fn prefetched_vat_ids(first: Option<Value>) -> Value {
    let mut ids = Vec::new();
    if let Some(value) = first {
        ids.push(json!({"id": 100, "value": value}));
    }
    ids.push(json!({"id": 83, "value": "First VAT ID"}));
    ids.push(json!({"id": 91, "value": "Second VAT ID"}));
    Value::Array(ids)
}

/// Latest companies interface
///
/// `GET /companies/{company_id}/vat_ids` exists only in the latest version.
pub fn companies_definition() -> ApiDefinition {
    ApiDefinition::builder()
        .shape(
            ShapeDefinition::new("CompanyCreateRequest")
                .with_field("name", FieldDefinition::new(TypeDescriptor::String))
                .with_field("default_vat_id", FieldDefinition::new(TypeDescriptor::String)),
        )
        .shape(
            ShapeDefinition::new("CompanyResource")
                .with_field("name", FieldDefinition::new(TypeDescriptor::String)),
        )
        .shape(
            ShapeDefinition::new("CompanyVatIdResource")
                .with_field("id", FieldDefinition::new(TypeDescriptor::Integer))
                .with_field("value", FieldDefinition::new(TypeDescriptor::String)),
        )
        .shape(ShapeDefinition::new("CompanyVatIdResourceList").with_field(
            "data",
            FieldDefinition::new(TypeDescriptor::list(TypeDescriptor::shape("CompanyVatIdResource"))),
        ))
        .operation(
            OperationDefinition::new(
                route("/companies", "POST", "create_company"),
                handler_fn("create_company", |request: Payload| async move {
                    Ok(payload(json!({
                        "id": 83,
                        "name": "Company 1",
                        "_prefetched_vat_ids": prefetched_vat_ids(request.get("default_vat_id").cloned()),
                    })))
                }),
            )
            .with_request("CompanyCreateRequest")
            .with_response("CompanyResource"),
        )
        .operation(
            OperationDefinition::new(
                route("/companies/{company_id}", "GET", "get_company"),
                handler_fn("get_company", |request: Payload| async move {
                    Ok(payload(json!({
                        "id": request.get("company_id").cloned().unwrap_or(json!(1)),
                        "name": "Company 1",
                        "_prefetched_vat_ids": prefetched_vat_ids(None),
                    })))
                }),
            )
            .with_response("CompanyResource"),
        )
        .operation(
            OperationDefinition::new(
                route("/companies/{company_id}/vat_ids", "GET", "get_company_vat_ids"),
                handler_fn("get_company_vat_ids", |_request: Payload| async move {
                    Ok(payload(json!({
                        "data": [
                            {"id": 83, "value": "First VAT ID"},
                            {"id": 91, "value": "Second VAT ID"}
                        ]
                    })))
                }),
            )
            .with_response("CompanyVatIdResourceList"),
        )
        .build()
        .unwrap()
}

/// Change attached to 2002: VAT ids moved to a sub-resource
pub fn vat_ids_to_subresource() -> Arc<VersionChange> {
    let vat_ids = || FieldDefinition::new(TypeDescriptor::list(TypeDescriptor::String));
    VersionChange::builder("Change vat ids to subresource")
        .instruction(shape("CompanyResource").field("vat_ids").existed(vat_ids()))
        .instruction(shape("CompanyCreateRequest").field("vat_ids").existed(vat_ids()))
        .instruction(shape("CompanyCreateRequest").field("default_vat_id").did_not_exist())
        .instruction(operation("/companies/{company_id}/vat_ids", ["GET"]).did_not_exist())
        .convert_response(["CompanyResource"], |payload, _| {
            let prefetched = payload.take_field("_prefetched_vat_ids")?;
            let values: Vec<Value> = prefetched
                .as_array()
                .map(|items| items.iter().filter_map(|item| item.get("value").cloned()).collect())
                .unwrap_or_default();
            payload.insert("vat_ids".to_string(), Value::Array(values));
            Ok(())
        })
        .convert_request("CompanyCreateRequest", |mut payload| {
            first_item(&mut payload, "vat_ids", "default_vat_id")?;
            Ok(payload)
        })
        .build()
        .unwrap()
}

/// Change attached to 2001: a single VAT id became a list
pub fn vat_id_to_list() -> Arc<VersionChange> {
    let mut builder = VersionChange::builder("Change vat id to list");
    for shape_name in ["CompanyResource", "CompanyCreateRequest"] {
        builder = builder
            .instruction(shape(shape_name).field("vat_ids").did_not_exist())
            .instruction(
                shape(shape_name)
                    .field("vat_id")
                    .existed(FieldDefinition::new(TypeDescriptor::String)),
            );
    }
    builder
        .convert_response(["CompanyResource"], |payload, _| first_item(payload, "vat_ids", "vat_id"))
        .convert_request("CompanyCreateRequest", |mut payload| {
            wrap_item(&mut payload, "vat_id", "vat_ids")?;
            Ok(payload)
        })
        .build()
        .unwrap()
}

/// 2002, 2001 and 2000 with the two VAT id changes
pub fn companies_versions() -> Vec<Version> {
    vec![
        Version::new(v(V2002)).with_change(vat_ids_to_subresource()),
        Version::new(v(V2001)).with_change(vat_id_to_list()),
        Version::new(v(V2000)),
    ]
}
