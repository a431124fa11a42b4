//! # Existence-Check Gate
//!
//! Every create in the provisioning workflow is preceded by a lookup keyed on
//! a natural identifier. Path-addressed resources answer 404 when missing;
//! filter-addressed resources answer an empty list.
//!
//! Any other lookup failure is logged and reported as "missing". This can
//! turn an outage into a duplicate-create attempt, which the CMS then rejects.

use std::fmt;

use serde_json::Value;
use tracing::warn;

use super::client::CmsClient;
use super::transport::CmsTransport;

/// Natural key of a path-addressed resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKey {
    Collection(String),
    /// (collection, field)
    Field(String, String),
    /// (collection, field) of the many side
    Relation(String, String),
}

impl ResourceKey {
    pub fn collection(name: &str) -> Self {
        Self::Collection(name.to_string())
    }

    pub fn field(collection: &str, field: &str) -> Self {
        Self::Field(collection.to_string(), field.to_string())
    }

    pub fn relation(collection: &str, field: &str) -> Self {
        Self::Relation(collection.to_string(), field.to_string())
    }

    /// REST path of the resource
    pub fn path(&self) -> String {
        match self {
            Self::Collection(name) => format!("/collections/{}", urlencoding::encode(name)),
            Self::Field(c, f) => format!("/fields/{}/{}", urlencoding::encode(c), urlencoding::encode(f)),
            Self::Relation(c, f) => {
                format!("/relations/{}/{}", urlencoding::encode(c), urlencoding::encode(f))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Collection(_) => "collection",
            Self::Field(..) => "field",
            Self::Relation(..) => "relation",
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collection(name) => write!(f, "{}", name),
            Self::Field(c, field) | Self::Relation(c, field) => write!(f, "{}/{}", c, field),
        }
    }
}

/// Lookup of a filter-addressed resource: `GET <path>?filter[k][_eq]=v&limit=1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub path: String,
    pub filters: Vec<(String, String)>,
}

impl Lookup {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            filters: Vec::new(),
        }
    }

    /// Item in `collection` whose `field` equals `value`
    pub fn item(collection: &str, field: &str, value: &str) -> Self {
        Self::new(format!("/items/{}", urlencoding::encode(collection))).eq(field, value)
    }

    pub fn role(name: &str) -> Self {
        Self::new("/roles").eq("name", name)
    }

    pub fn permission(role: &str, collection: &str, action: &str) -> Self {
        Self::new("/permissions")
            .eq("role", role)
            .eq("collection", collection)
            .eq("action", action)
    }

    pub fn eq(mut self, field: &str, value: &str) -> Self {
        self.filters.push((field.to_string(), value.to_string()));
        self
    }

    fn query(&self) -> Vec<(String, String)> {
        let mut query: Vec<(String, String)> = self
            .filters
            .iter()
            .map(|(field, value)| (format!("filter[{}][_eq]", field), value.clone()))
            .collect();
        query.push(("limit".to_string(), "1".to_string()));
        query
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filters = self
            .filters
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}[{}]", self.path, filters)
    }
}

/// Existence checks against the CMS
pub struct Gate<'a, T> {
    client: &'a CmsClient<T>,
}

impl<'a, T: CmsTransport> Gate<'a, T> {
    pub fn new(client: &'a CmsClient<T>) -> Self {
        Self { client }
    }

    /// Does the path-addressed resource exist?
    pub async fn exists(&self, key: &ResourceKey) -> bool {
        match self.client.get(&key.path(), Vec::new()).await {
            Ok(_) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                warn!(kind = key.kind(), %key, error = %e, "Existence check failed, treating as missing");
                false
            }
        }
    }

    /// First row matching the lookup, if any
    pub async fn find_one(&self, lookup: &Lookup) -> Option<Value> {
        match self.client.get(&lookup.path, lookup.query()).await {
            Ok(Value::Array(mut rows)) if !rows.is_empty() => Some(rows.swap_remove(0)),
            Ok(_) => None,
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                warn!(%lookup, error = %e, "Lookup failed, treating as missing");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::client::Credentials;
    use crate::cms::memory::InMemoryCms;
    use crate::cms::transport::Method;
    use serde_json::json;

    async fn client(cms: &InMemoryCms) -> CmsClient<InMemoryCms> {
        let mut client = CmsClient::new(cms.clone());
        client
            .authenticate(&Credentials::Token { token: "t".to_string() })
            .await
            .unwrap();
        client
    }

    #[test]
    fn test_resource_paths() {
        assert_eq!(ResourceKey::collection("hotels").path(), "/collections/hotels");
        assert_eq!(ResourceKey::field("hotels", "name").path(), "/fields/hotels/name");
        assert_eq!(
            ResourceKey::relation("hotels", "destination").to_string(),
            "hotels/destination"
        );
    }

    #[tokio::test]
    async fn test_exists_follows_404() {
        let cms = InMemoryCms::new();
        let client = client(&cms).await;
        let gate = Gate::new(&client);

        assert!(!gate.exists(&ResourceKey::collection("hotels")).await);
        client.post("/collections", json!({"collection": "hotels"})).await.unwrap();
        assert!(gate.exists(&ResourceKey::collection("hotels")).await);
    }

    #[tokio::test]
    async fn test_other_errors_read_as_missing() {
        let cms = InMemoryCms::new();
        cms.fail_on(Method::Get, "/collections/hotels", 500);
        let client = client(&cms).await;

        assert!(!Gate::new(&client).exists(&ResourceKey::collection("hotels")).await);
    }

    #[tokio::test]
    async fn test_find_one_by_filter() {
        let cms = InMemoryCms::new();
        let client = client(&cms).await;
        client.post("/roles", json!({"name": "Public"})).await.unwrap();
        let gate = Gate::new(&client);

        let role = gate.find_one(&Lookup::role("Public")).await.unwrap();
        assert_eq!(role["name"], "Public");
        assert!(gate.find_one(&Lookup::role("Editors")).await.is_none());
    }
}
