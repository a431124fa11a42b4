//! # Request Payloads
//!
//! Translate definitions into the JSON bodies the CMS REST API expects.

use serde_json::{json, Map, Value};

use super::{Action, CollectionDef, FieldDef, PermissionDef, RelationDef};

/// Auto-increment integer primary key added to every created collection
pub fn primary_key_field() -> Value {
    json!({
        "field": "id",
        "type": "integer",
        "meta": { "hidden": true, "interface": "input", "readonly": true },
        "schema": { "is_primary_key": true, "has_auto_increment": true }
    })
}

/// `POST /collections` body
pub fn collection(def: &CollectionDef) -> Value {
    let mut meta = Map::new();
    meta.insert("icon".to_string(), json!(def.icon.as_deref().unwrap_or("box")));
    if let Some(template) = &def.display_template {
        meta.insert("display_template".to_string(), json!(template));
    }
    if let Some(sort_field) = &def.sort_field {
        meta.insert("sort_field".to_string(), json!(sort_field));
    }
    if let Some(note) = &def.note {
        meta.insert("note".to_string(), json!(note));
    }
    meta.insert("hidden".to_string(), json!(def.hidden));
    meta.insert("singleton".to_string(), json!(false));

    json!({
        "collection": def.name,
        "meta": meta,
        "schema": {},
        "fields": [primary_key_field()]
    })
}

/// `POST /collections` body for a hidden junction collection
pub fn junction_collection(name: &str) -> Value {
    json!({
        "collection": name,
        "meta": { "icon": "import_export", "hidden": true, "singleton": false },
        "schema": {},
        "fields": [primary_key_field()]
    })
}

/// `POST /fields/:collection` body
pub fn field(def: &FieldDef) -> Value {
    let mut meta = Map::new();
    meta.insert(
        "interface".to_string(),
        json!(def
            .interface
            .as_deref()
            .unwrap_or_else(|| def.field_type.default_interface())),
    );
    meta.insert("required".to_string(), json!(def.required));
    meta.insert("hidden".to_string(), json!(def.hidden));
    meta.insert(
        "width".to_string(),
        json!(def.width.as_deref().unwrap_or("full")),
    );
    if let Some(note) = &def.note {
        meta.insert("note".to_string(), json!(note));
    }

    let mut options = match &def.options {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    if let Some(min) = def.min {
        options.insert("min".to_string(), json!(min));
    }
    if let Some(max) = def.max {
        options.insert("max".to_string(), json!(max));
    }
    if !options.is_empty() {
        meta.insert("options".to_string(), Value::Object(options));
    }

    let mut schema = Map::new();
    schema.insert("is_nullable".to_string(), json!(def.nullable && !def.required));
    schema.insert("is_unique".to_string(), json!(def.unique));
    if let Some(default) = &def.default {
        schema.insert("default_value".to_string(), default.clone());
    }
    if let Some(max_length) = def.max_length {
        schema.insert("max_length".to_string(), json!(max_length));
    }

    json!({
        "field": def.name,
        "type": def.field_type.as_str(),
        "meta": meta,
        "schema": schema
    })
}

/// Foreign key field inside a junction collection
pub fn junction_key_field(name: &str) -> Value {
    json!({
        "field": name,
        "type": "integer",
        "meta": { "hidden": true, "interface": "input" },
        "schema": { "is_nullable": true }
    })
}

/// Alias field listing related rows (`special` is "o2m" or "m2m")
pub fn alias_field(name: &str, special: &str) -> Value {
    let interface = if special == "m2m" { "list-m2m" } else { "list-o2m" };
    json!({
        "field": name,
        "type": "alias",
        "meta": {
            "interface": interface,
            "special": [special],
            "width": "full"
        }
    })
}

/// `POST /relations` body for a one-to-many relation
pub fn one_to_many(def: &RelationDef) -> Value {
    json!({
        "collection": def.collection,
        "field": def.field,
        "related_collection": def.related_collection,
        "meta": {
            "one_field": def.alias,
            "sort_field": null
        },
        "schema": {
            "on_delete": def.on_delete.as_deref().unwrap_or("SET NULL")
        }
    })
}

/// The two `POST /relations` bodies of a many-to-many relation:
/// junction -> owning collection, junction -> related collection
pub fn many_to_many(def: &RelationDef) -> [Value; 2] {
    let junction = def.junction_name();
    let (left, right) = def.junction_fields();
    [
        json!({
            "collection": junction,
            "field": left,
            "related_collection": def.collection,
            "meta": {
                "one_field": def.field,
                "junction_field": right,
                "sort_field": null
            },
            "schema": { "on_delete": "CASCADE" }
        }),
        json!({
            "collection": junction,
            "field": right,
            "related_collection": def.related_collection,
            "meta": {
                "one_field": def.alias,
                "junction_field": left,
                "sort_field": null
            },
            "schema": { "on_delete": "CASCADE" }
        }),
    ]
}

/// `POST /roles` body
pub fn role(def: &PermissionDef) -> Value {
    json!({
        "name": def.role,
        "icon": def.icon.as_deref().unwrap_or("public"),
        "admin_access": def.admin_access,
        "app_access": def.app_access
    })
}

/// `POST /permissions` body granting every field
pub fn permission(role_id: &Value, collection: &str, action: Action) -> Value {
    json!({
        "role": role_id,
        "collection": collection,
        "action": action.as_str(),
        "fields": ["*"],
        "permissions": {},
        "validation": {}
    })
}

/// `PATCH /permissions/:id` body resetting fields to the wildcard
pub fn permission_reset() -> Value {
    json!({ "fields": ["*"] })
}
