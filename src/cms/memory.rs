//! # In-Memory CMS
//!
//! A Directus look-alike that keeps collections, fields, relations, roles,
//! permissions and items in memory. Backs `--dry-run` and the test suite.
//!
//! Status codes follow what Directus returns: unknown collections answer 403,
//! unknown fields and relations 404, duplicates 400.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use serde_json::{json, Value};

use super::errors::{error_payload, CmsError, CmsResult};
use super::transport::{CmsRequest, CmsTransport, Method};

/// One request as seen by the in-memory CMS
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub status: u16,
}

impl CallRecord {
    pub fn succeeded(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Default)]
struct CmsState {
    admins: BTreeMap<String, String>,
    tokens: BTreeSet<String>,
    accept_any_token: bool,
    collections: BTreeMap<String, Value>,
    fields: BTreeMap<(String, String), Value>,
    relations: BTreeMap<(String, String), Value>,
    roles: Vec<Value>,
    permissions: Vec<Value>,
    items: BTreeMap<String, Vec<Value>>,
    next_id: u64,
    failures: Vec<(Method, String, u16)>,
    unreachable: Vec<(Method, String)>,
    calls: Vec<CallRecord>,
}

type Reply = Result<Value, (u16, Value)>;

/// In-memory CMS transport
///
/// Cloning shares the underlying state, so a test can keep a handle while
/// the provisioner owns another.
#[derive(Debug, Clone)]
pub struct InMemoryCms {
    state: Arc<RwLock<CmsState>>,
}

impl Default for InMemoryCms {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCms {
    /// Empty CMS that accepts any non-empty bearer token
    pub fn new() -> Self {
        let state = CmsState {
            accept_any_token: true,
            next_id: 1,
            ..CmsState::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Register an admin account for `POST /auth/login`
    pub fn with_admin(self, email: &str, password: &str) -> Self {
        self.state()
            .admins
            .insert(email.to_string(), password.to_string());
        self
    }

    /// Restrict accepted bearer tokens to the registered ones
    pub fn with_token(self, token: &str) -> Self {
        {
            let mut state = self.state();
            state.accept_any_token = false;
            state.tokens.insert(token.to_string());
        }
        self
    }

    /// Answer every `method path` with `status` from now on
    pub fn fail_on(&self, method: Method, path: &str, status: u16) {
        self.state().failures.push((method, path.to_string(), status));
    }

    /// Fail every `method path` before it reaches the CMS, as a dropped
    /// connection would. Such requests are not in the call log.
    pub fn fail_transport_on(&self, method: Method, path: &str) {
        self.state().unreachable.push((method, path.to_string()));
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.state().calls.clone()
    }

    /// Number of successful writes (POST/PATCH) so far
    pub fn write_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.method != Method::Get && c.path != "/auth/login" && c.succeeded())
            .count()
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.state().collections.keys().cloned().collect()
    }

    pub fn has_field(&self, collection: &str, field: &str) -> bool {
        self.state()
            .fields
            .contains_key(&(collection.to_string(), field.to_string()))
    }

    pub fn relation(&self, collection: &str, field: &str) -> Option<Value> {
        self.state()
            .relations
            .get(&(collection.to_string(), field.to_string()))
            .cloned()
    }

    pub fn items(&self, collection: &str) -> Vec<Value> {
        self.state().items.get(collection).cloned().unwrap_or_default()
    }

    pub fn roles(&self) -> Vec<Value> {
        self.state().roles.clone()
    }

    pub fn permissions(&self) -> Vec<Value> {
        self.state().permissions.clone()
    }

    fn state(&self) -> RwLockWriteGuard<'_, CmsState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, request: &CmsRequest) -> Reply {
        let mut state = self.state();

        if let Some((_, _, status)) = state
            .failures
            .iter()
            .find(|(m, p, _)| *m == request.method && *p == request.path)
        {
            let status = *status;
            return Err((status, error_payload("INJECTED", "injected failure")));
        }

        let segments: Vec<&str> = request.path.trim_matches('/').split('/').collect();
        if segments.as_slice() == ["auth", "login"] && request.method == Method::Post {
            return state.login(request.body.as_ref());
        }

        match &request.token {
            Some(token) if state.accept_any_token && !token.is_empty() => {}
            Some(token) if state.tokens.contains(token) => {}
            _ => return Err((401, error_payload("INVALID_CREDENTIALS", "Invalid user credentials."))),
        }

        let body = request.body.clone().unwrap_or(Value::Null);
        match (request.method, segments.as_slice()) {
            (Method::Get, ["collections"]) => {
                Ok(Value::Array(state.collections.values().cloned().collect()))
            }
            (Method::Get, ["collections", name]) => state.get_collection(name),
            (Method::Post, ["collections"]) => state.create_collection(body),
            (Method::Get, ["fields", collection, field]) => state.get_field(collection, field),
            (Method::Post, ["fields", collection]) => state.create_field(collection, body),
            (Method::Get, ["relations", collection, field]) => state.get_relation(collection, field),
            (Method::Post, ["relations"]) => state.create_relation(body),
            (Method::Get, ["roles"]) => Ok(filter_rows(&state.roles, &request.query)),
            (Method::Post, ["roles"]) => state.create_role(body),
            (Method::Get, ["permissions"]) => Ok(filter_rows(&state.permissions, &request.query)),
            (Method::Post, ["permissions"]) => state.create_permission(body),
            (Method::Patch, ["permissions", id]) => state.update_permission(id, body),
            (Method::Get, ["items", collection]) => state.list_items(collection, &request.query),
            (Method::Post, ["items", collection]) => state.create_item(collection, body),
            _ => Err((404, error_payload("ROUTE_NOT_FOUND", "Route doesn't exist."))),
        }
    }
}

impl CmsTransport for InMemoryCms {
    async fn execute(&self, request: CmsRequest) -> CmsResult<Value> {
        let unreachable = self
            .state()
            .unreachable
            .iter()
            .any(|(m, p)| *m == request.method && *p == request.path);
        if unreachable {
            return Err(CmsError::Transport(format!(
                "connection reset while sending {} {}",
                request.method, request.path
            )));
        }

        let reply = self.handle(&request);
        let status = match &reply {
            Ok(_) => 200,
            Err((status, _)) => *status,
        };
        self.state().calls.push(CallRecord {
            method: request.method,
            path: request.path.clone(),
            body: request.body.clone(),
            status,
        });

        match reply {
            Ok(data) => Ok(json!({ "data": data })),
            Err((status, payload)) => Err(CmsError::http(status, payload)),
        }
    }
}

fn forbidden() -> (u16, Value) {
    (403, error_payload("FORBIDDEN", "You don't have permission to access this."))
}

fn not_found(what: &str) -> (u16, Value) {
    (404, error_payload("NOT_FOUND", &format!("{} not found.", what)))
}

fn invalid(message: &str) -> (u16, Value) {
    (400, error_payload("INVALID_PAYLOAD", message))
}

fn str_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Loose equality used by `filter[...][_eq]`: strings and numbers compare by
/// their text form.
fn value_matches(value: Option<&Value>, expected: &str) -> bool {
    match value {
        Some(Value::String(s)) => s == expected,
        Some(Value::Number(n)) => n.to_string() == expected,
        Some(Value::Bool(b)) => b.to_string() == expected,
        Some(Value::Null) | None => expected == "null",
        Some(_) => false,
    }
}

fn filter_rows(rows: &[Value], query: &[(String, String)]) -> Value {
    let mut filters = Vec::new();
    let mut limit = None;
    for (key, value) in query {
        if key == "limit" {
            limit = value.parse::<usize>().ok();
        } else if let Some(field) = key
            .strip_prefix("filter[")
            .and_then(|rest| rest.strip_suffix("][_eq]"))
        {
            filters.push((field.to_string(), value.clone()));
        }
    }

    let matched = rows
        .iter()
        .filter(|row| filters.iter().all(|(f, v)| value_matches(row.get(f), v)))
        .take(limit.unwrap_or(usize::MAX))
        .cloned()
        .collect();
    Value::Array(matched)
}

impl CmsState {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn login(&mut self, body: Option<&Value>) -> Reply {
        let body = body.cloned().unwrap_or(Value::Null);
        let email = str_field(&body, "email").unwrap_or_default();
        let password = str_field(&body, "password").unwrap_or_default();

        match self.admins.get(email) {
            Some(expected) if expected == password => {
                let token = format!("access-{}", self.allocate_id());
                self.tokens.insert(token.clone());
                Ok(json!({
                    "access_token": token,
                    "refresh_token": format!("refresh-{}", self.next_id),
                    "expires": 900000
                }))
            }
            _ => Err((401, error_payload("INVALID_CREDENTIALS", "Invalid user credentials."))),
        }
    }

    fn get_collection(&self, name: &str) -> Reply {
        self.collections
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(&format!("Collection \"{}\"", name)))
    }

    fn create_collection(&mut self, body: Value) -> Reply {
        let name = str_field(&body, "collection")
            .ok_or_else(|| invalid("\"collection\" is required"))?
            .to_string();
        if self.collections.contains_key(&name) {
            return Err(invalid(&format!("Collection \"{}\" already exists", name)));
        }

        if let Some(fields) = body.get("fields").and_then(Value::as_array) {
            for field in fields {
                if let Some(field_name) = str_field(field, "field") {
                    self.fields
                        .insert((name.clone(), field_name.to_string()), field.clone());
                }
            }
        }
        self.items.entry(name.clone()).or_default();
        self.collections.insert(name, body.clone());
        Ok(body)
    }

    fn get_field(&self, collection: &str, field: &str) -> Reply {
        if !self.collections.contains_key(collection) {
            return Err(forbidden());
        }
        self.fields
            .get(&(collection.to_string(), field.to_string()))
            .cloned()
            .ok_or_else(|| not_found(&format!("Field \"{}\"", field)))
    }

    fn create_field(&mut self, collection: &str, body: Value) -> Reply {
        if !self.collections.contains_key(collection) {
            return Err(forbidden());
        }
        let field = str_field(&body, "field")
            .ok_or_else(|| invalid("\"field\" is required"))?
            .to_string();
        let key = (collection.to_string(), field.clone());
        if self.fields.contains_key(&key) {
            return Err(invalid(&format!(
                "Field \"{}\" already exists in collection \"{}\"",
                field, collection
            )));
        }
        let mut stored = body.clone();
        if let Value::Object(map) = &mut stored {
            map.insert("collection".to_string(), json!(collection));
        }
        self.fields.insert(key, stored.clone());
        Ok(stored)
    }

    fn get_relation(&self, collection: &str, field: &str) -> Reply {
        self.relations
            .get(&(collection.to_string(), field.to_string()))
            .cloned()
            .ok_or_else(|| not_found(&format!("Relation \"{}.{}\"", collection, field)))
    }

    fn create_relation(&mut self, body: Value) -> Reply {
        let collection = str_field(&body, "collection")
            .ok_or_else(|| invalid("\"collection\" is required"))?
            .to_string();
        let field = str_field(&body, "field")
            .ok_or_else(|| invalid("\"field\" is required"))?
            .to_string();

        if !self.collections.contains_key(&collection) {
            return Err(forbidden());
        }
        if !self.fields.contains_key(&(collection.clone(), field.clone())) {
            return Err(invalid(&format!(
                "Field \"{}\" does not exist in collection \"{}\"",
                field, collection
            )));
        }
        if let Some(related) = str_field(&body, "related_collection") {
            if !self.collections.contains_key(related) {
                return Err(invalid(&format!("Collection \"{}\" does not exist", related)));
            }
        }
        let key = (collection.clone(), field.clone());
        if self.relations.contains_key(&key) {
            return Err(invalid(&format!(
                "Field \"{}\" in collection \"{}\" already has an associated relationship",
                field, collection
            )));
        }
        self.relations.insert(key, body.clone());
        Ok(body)
    }

    fn create_role(&mut self, body: Value) -> Reply {
        if str_field(&body, "name").is_none() {
            return Err(invalid("\"name\" is required"));
        }
        let mut role = body;
        let id = format!("role-{}", self.allocate_id());
        if let Value::Object(map) = &mut role {
            map.insert("id".to_string(), json!(id));
        }
        self.roles.push(role.clone());
        Ok(role)
    }

    fn create_permission(&mut self, body: Value) -> Reply {
        let collection = str_field(&body, "collection")
            .ok_or_else(|| invalid("\"collection\" is required"))?;
        if !self.collections.contains_key(collection) {
            return Err(forbidden());
        }
        if str_field(&body, "action").is_none() {
            return Err(invalid("\"action\" is required"));
        }
        let mut permission = body;
        let id = self.allocate_id();
        if let Value::Object(map) = &mut permission {
            map.insert("id".to_string(), json!(id));
        }
        self.permissions.push(permission.clone());
        Ok(permission)
    }

    fn update_permission(&mut self, id: &str, body: Value) -> Reply {
        let permission = self
            .permissions
            .iter_mut()
            .find(|p| value_matches(p.get("id"), id))
            .ok_or_else(forbidden)?;
        if let (Value::Object(target), Value::Object(patch)) = (permission, body) {
            for (key, value) in patch {
                target.insert(key, value);
            }
            return Ok(Value::Object(target.clone()));
        }
        Err(invalid("Permission update must be an object"))
    }

    fn list_items(&self, collection: &str, query: &[(String, String)]) -> Reply {
        let rows = self.items.get(collection).ok_or_else(forbidden)?;
        Ok(filter_rows(rows, query))
    }

    fn unique_fields(&self, collection: &str) -> Vec<String> {
        self.fields
            .iter()
            .filter(|((c, _), def)| {
                c == collection
                    && def
                        .pointer("/schema/is_unique")
                        .and_then(Value::as_bool)
                        .unwrap_or(false)
            })
            .map(|((_, f), _)| f.clone())
            .collect()
    }

    fn create_item(&mut self, collection: &str, body: Value) -> Reply {
        if !self.collections.contains_key(collection) {
            return Err(forbidden());
        }
        let Value::Object(mut item) = body else {
            return Err(invalid("Item payload must be an object"));
        };

        let rows = self.items.get(collection).cloned().unwrap_or_default();
        for field in self.unique_fields(collection) {
            if let Some(value) = item.get(&field) {
                if rows.iter().any(|row| row.get(&field) == Some(value)) {
                    return Err((
                        400,
                        error_payload(
                            "RECORD_NOT_UNIQUE",
                            &format!("Value for field \"{}\" in collection \"{}\" has to be unique.", field, collection),
                        ),
                    ));
                }
            }
        }

        if !item.contains_key("id") {
            let id = self.allocate_id();
            item.insert("id".to_string(), json!(id));
        }
        let item = Value::Object(item);
        self.items
            .entry(collection.to_string())
            .or_default()
            .push(item.clone());
        Ok(item)
    }
}
