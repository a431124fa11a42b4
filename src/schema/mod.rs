//! # Schema Definitions
//!
//! Declarative description of what the CMS should contain: collections and
//! their fields, relations, the public role's permissions and seed content.
//! Definitions are pure data, loaded from YAML or JSON and validated before
//! any request is made. The hotel collection's own schema ships bundled.
//!
//! ```yaml
//! collections:
//!   - name: destinations
//!     icon: place
//!     display_template: "{{name}}"
//!     fields:
//!       - { name: name, type: string, required: true }
//!       - { name: slug, type: string, unique: true, required: true }
//! relations:
//!   - { kind: one_to_many, collection: hotels, field: destination, related_collection: destinations }
//! seed:
//!   - collection: destinations
//!     items:
//!       - values: { name: Paris, slug: paris }
//! ```

pub mod checksum;
pub mod errors;
pub mod payload;

pub use errors::{SchemaError, SchemaResult};

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Bundled hotel schema
pub const HOTEL_SCHEMA: &str = include_str!("../../schemas/hotel.yaml");

/// Name the bundled schema reports as its source
pub const HOTEL_SCHEMA_SOURCE: &str = "bundled:hotel.yaml";

/// Primitive storage types understood by the CMS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Text,
    Integer,
    Float,
    Decimal,
    Boolean,
    Uuid,
    Json,
    Csv,
    Date,
    Timestamp,
    Alias,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Decimal => "decimal",
            FieldType::Boolean => "boolean",
            FieldType::Uuid => "uuid",
            FieldType::Json => "json",
            FieldType::Csv => "csv",
            FieldType::Date => "date",
            FieldType::Timestamp => "timestamp",
            FieldType::Alias => "alias",
        }
    }

    /// Input widget used when the definition names none
    pub fn default_interface(&self) -> &'static str {
        match self {
            FieldType::String | FieldType::Uuid => "input",
            FieldType::Text => "input-multiline",
            FieldType::Integer | FieldType::Float | FieldType::Decimal => "input",
            FieldType::Boolean => "boolean",
            FieldType::Json => "input-code",
            FieldType::Csv => "tags",
            FieldType::Date | FieldType::Timestamp => "datetime",
            FieldType::Alias => "presentation-divider",
        }
    }

    /// Types that can hold a foreign key
    pub fn is_key_type(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Uuid | FieldType::String)
    }
}

/// A field within a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default)]
    pub options: Option<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub width: Option<String>,
}

fn default_true() -> bool {
    true
}

/// A collection (table) and its fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDef {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub display_template: Option<String>,
    #[serde(default)]
    pub sort_field: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl CollectionDef {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// `collection.field` holds the key of a `related_collection` row
    OneToMany,
    /// Rows linked through a junction collection
    ManyToMany,
}

/// A relation between two collections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    pub kind: RelationKind,
    /// Many side (one-to-many) or owning side (many-to-many)
    pub collection: String,
    /// Foreign key field (one-to-many) or alias field (many-to-many)
    pub field: String,
    pub related_collection: String,
    /// Alias field on the related collection listing the many side
    #[serde(default)]
    pub alias: Option<String>,
    /// Junction collection name, many-to-many only
    #[serde(default)]
    pub junction: Option<String>,
    #[serde(default)]
    pub on_delete: Option<String>,
}

impl RelationDef {
    /// Junction collection for a many-to-many relation
    pub fn junction_name(&self) -> String {
        self.junction
            .clone()
            .unwrap_or_else(|| format!("{}_{}", self.collection, self.related_collection))
    }

    /// Foreign key fields in the junction: (to `collection`, to `related_collection`)
    pub fn junction_fields(&self) -> (String, String) {
        let left = format!("{}_id", self.collection);
        let right = if self.collection == self.related_collection {
            format!("related_{}_id", self.related_collection)
        } else {
            format!("{}_id", self.related_collection)
        };
        (left, right)
    }

    pub fn key(&self) -> String {
        format!("{}.{}", self.collection, self.field)
    }
}

/// Permission actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// Role and the wildcard permissions it receives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionDef {
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub icon: Option<String>,
    /// Full admin access for the role. Almost certainly wrong for "Public".
    #[serde(default)]
    pub admin_access: bool,
    #[serde(default)]
    pub app_access: bool,
    /// Collections to grant on; empty means every declared collection
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default = "default_actions")]
    pub actions: Vec<Action>,
}

fn default_role() -> String {
    "Public".to_string()
}

fn default_actions() -> Vec<Action> {
    Action::ALL.to_vec()
}

/// Derive a reference by matching a value against another seed group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedLink {
    /// Foreign key field to fill on this group's items
    pub field: String,
    /// Value on this group's items to match, e.g. `location`
    pub source: String,
    /// Seed group (collection) to search
    pub target: String,
    /// Value on the target's items to compare with, e.g. `name`
    pub match_on: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedItem {
    pub values: Map<String, Value>,
    /// Foreign key field -> `collection/key` of an earlier seed item
    #[serde(default)]
    pub refs: BTreeMap<String, String>,
}

/// Seed rows for one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedGroup {
    pub collection: String,
    /// Natural key used for existence checks
    #[serde(default = "default_key_field")]
    pub key_field: String,
    #[serde(default)]
    pub links: Vec<SeedLink>,
    #[serde(default)]
    pub items: Vec<SeedItem>,
}

fn default_key_field() -> String {
    "slug".to_string()
}

impl SeedGroup {
    /// Natural key of an item, if it carries one
    pub fn key_of(&self, item: &SeedItem) -> Option<String> {
        match item.values.get(&self.key_field)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// A complete schema definition
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub collections: Vec<CollectionDef>,
    #[serde(default)]
    pub relations: Vec<RelationDef>,
    #[serde(default)]
    pub permissions: Option<PermissionDef>,
    #[serde(default)]
    pub seed: Vec<SeedGroup>,
}

/// A validated definition plus where it came from
#[derive(Debug, Clone)]
pub struct LoadedSchema {
    pub definition: SchemaDefinition,
    pub source: String,
    pub fingerprint: String,
}

impl LoadedSchema {
    /// The bundled hotel schema
    pub fn bundled() -> SchemaResult<Self> {
        let definition = SchemaDefinition::from_yaml_str(HOTEL_SCHEMA, Path::new(HOTEL_SCHEMA_SOURCE))?;
        Ok(Self {
            definition,
            source: HOTEL_SCHEMA_SOURCE.to_string(),
            fingerprint: checksum::fingerprint(HOTEL_SCHEMA),
        })
    }

    /// Load and validate a definition file (.yaml, .yml or .json)
    pub fn from_file(path: &Path) -> SchemaResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| SchemaError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let definition = match extension.as_deref() {
            Some("yaml") | Some("yml") => SchemaDefinition::from_yaml_str(&content, path)?,
            Some("json") => SchemaDefinition::from_json_str(&content, path)?,
            _ => {
                return Err(SchemaError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        };

        Ok(Self {
            definition,
            source: path.display().to_string(),
            fingerprint: checksum::fingerprint(&content),
        })
    }

    /// Load `path` when given, the bundled schema otherwise
    pub fn load(path: Option<&PathBuf>) -> SchemaResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::bundled(),
        }
    }
}

impl SchemaDefinition {
    pub fn from_yaml_str(content: &str, path: &Path) -> SchemaResult<Self> {
        let definition: SchemaDefinition =
            serde_yaml::from_str(content).map_err(|e| SchemaError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn from_json_str(content: &str, path: &Path) -> SchemaResult<Self> {
        let definition: SchemaDefinition =
            serde_json::from_str(content).map_err(|e| SchemaError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionDef> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn many_to_many(&self) -> impl Iterator<Item = &RelationDef> {
        self.relations
            .iter()
            .filter(|r| r.kind == RelationKind::ManyToMany)
    }

    /// Collections the permission stage grants on. Without an explicit list
    /// this is every declared collection plus every junction.
    pub fn permission_collections(&self) -> Vec<String> {
        match &self.permissions {
            Some(p) if !p.collections.is_empty() => p.collections.clone(),
            Some(_) => self
                .collections
                .iter()
                .map(|c| c.name.clone())
                .chain(self.many_to_many().map(RelationDef::junction_name))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Foreign key references of a seed item: explicit `refs` first, then
    /// the group's `links` for fields not already referenced
    pub fn seed_refs(&self, group: &SeedGroup, item: &SeedItem) -> BTreeMap<String, String> {
        let mut refs = item.refs.clone();
        for link in &group.links {
            if refs.contains_key(&link.field) {
                continue;
            }
            let Some(wanted) = item.values.get(&link.source).and_then(Value::as_str) else {
                continue;
            };
            let Some(target) = self.seed.iter().find(|g| g.collection == link.target) else {
                continue;
            };
            let matched = target.items.iter().find(|candidate| {
                candidate
                    .values
                    .get(&link.match_on)
                    .and_then(Value::as_str)
                    .map(|v| v.eq_ignore_ascii_case(wanted))
                    .unwrap_or(false)
            });
            if let Some(key) = matched.and_then(|m| target.key_of(m)) {
                refs.insert(link.field.clone(), format!("{}/{}", target.collection, key));
            }
        }
        refs
    }

    /// Check internal consistency
    pub fn validate(&self) -> SchemaResult<()> {
        if self.collections.is_empty() {
            return Err(SchemaError::invalid("at least one collection is required"));
        }

        let mut names = BTreeSet::new();
        for collection in &self.collections {
            validate_identifier("collection", &collection.name)?;
            if !names.insert(collection.name.as_str()) {
                return Err(SchemaError::invalid(format!(
                    "collection '{}' is declared twice",
                    collection.name
                )));
            }

            let mut fields = BTreeSet::new();
            for field in &collection.fields {
                validate_identifier("field", &field.name)?;
                if field.name == "id" {
                    return Err(SchemaError::invalid(format!(
                        "{}.id is created automatically as the primary key",
                        collection.name
                    )));
                }
                if !fields.insert(field.name.as_str()) {
                    return Err(SchemaError::invalid(format!(
                        "field '{}.{}' is declared twice",
                        collection.name, field.name
                    )));
                }
                if let (Some(min), Some(max)) = (field.min, field.max) {
                    if min > max {
                        return Err(SchemaError::invalid(format!(
                            "{}.{}: min {} is greater than max {}",
                            collection.name, field.name, min, max
                        )));
                    }
                }
            }
        }

        self.validate_relations(&names)?;
        self.validate_permissions(&names)?;
        self.validate_seed(&names)?;
        Ok(())
    }

    fn validate_relations(&self, names: &BTreeSet<&str>) -> SchemaResult<()> {
        let mut keys = BTreeSet::new();
        for relation in &self.relations {
            for name in [&relation.collection, &relation.related_collection] {
                if !names.contains(name.as_str()) {
                    return Err(SchemaError::invalid(format!(
                        "relation {} references unknown collection '{}'",
                        relation.key(),
                        name
                    )));
                }
            }
            if !keys.insert(relation.key()) {
                return Err(SchemaError::invalid(format!(
                    "relation {} is declared twice",
                    relation.key()
                )));
            }

            let owner = self.collection(&relation.collection);
            let declared = owner.and_then(|c| c.field(&relation.field));
            match relation.kind {
                RelationKind::OneToMany => match declared {
                    Some(field) if field.field_type.is_key_type() => {}
                    Some(field) => {
                        return Err(SchemaError::invalid(format!(
                            "relation {}: field type '{}' cannot hold a foreign key",
                            relation.key(),
                            field.field_type.as_str()
                        )))
                    }
                    None => {
                        return Err(SchemaError::invalid(format!(
                            "relation {}: foreign key field must be declared on '{}'",
                            relation.key(),
                            relation.collection
                        )))
                    }
                },
                RelationKind::ManyToMany => {
                    if declared.is_some() {
                        return Err(SchemaError::invalid(format!(
                            "relation {}: many-to-many alias field is created by the relation, do not declare it",
                            relation.key()
                        )));
                    }
                    let junction = relation.junction_name();
                    validate_identifier("junction", &junction)?;
                    if names.contains(junction.as_str()) {
                        return Err(SchemaError::invalid(format!(
                            "relation {}: junction '{}' collides with a declared collection",
                            relation.key(),
                            junction
                        )));
                    }
                }
            }

            if let Some(alias) = &relation.alias {
                let related = self.collection(&relation.related_collection);
                if related.and_then(|c| c.field(alias)).is_some() {
                    return Err(SchemaError::invalid(format!(
                        "relation {}: alias '{}.{}' is created by the relation, do not declare it",
                        relation.key(),
                        relation.related_collection,
                        alias
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_permissions(&self, names: &BTreeSet<&str>) -> SchemaResult<()> {
        let Some(permissions) = &self.permissions else {
            return Ok(());
        };
        if permissions.role.trim().is_empty() {
            return Err(SchemaError::invalid("permission role name cannot be empty"));
        }
        if permissions.actions.is_empty() {
            return Err(SchemaError::invalid("permission actions cannot be empty"));
        }
        for collection in &permissions.collections {
            let is_junction = self.many_to_many().any(|r| r.junction_name() == *collection);
            if !names.contains(collection.as_str()) && !is_junction {
                return Err(SchemaError::invalid(format!(
                    "permissions reference unknown collection '{}'",
                    collection
                )));
            }
        }
        Ok(())
    }

    fn validate_seed(&self, names: &BTreeSet<&str>) -> SchemaResult<()> {
        // Keys and collections seeded by groups earlier in the list
        let mut seeded: BTreeSet<String> = BTreeSet::new();
        let mut seeded_collections: BTreeSet<&str> = BTreeSet::new();

        for group in &self.seed {
            if !names.contains(group.collection.as_str()) {
                return Err(SchemaError::invalid(format!(
                    "seed group references unknown collection '{}'",
                    group.collection
                )));
            }
            for link in &group.links {
                if !self.seed.iter().any(|g| g.collection == link.target) {
                    return Err(SchemaError::invalid(format!(
                        "seed link {}.{} targets '{}' which has no seed group",
                        group.collection, link.field, link.target
                    )));
                }
                if !seeded_collections.contains(link.target.as_str()) {
                    return Err(SchemaError::invalid(format!(
                        "seed link {}.{} targets '{}', which is not seeded earlier",
                        group.collection, link.field, link.target
                    )));
                }
            }

            let mut keys = BTreeSet::new();
            for item in &group.items {
                let key = group.key_of(item).ok_or_else(|| {
                    SchemaError::invalid(format!(
                        "seed item in '{}' has no '{}' value",
                        group.collection, group.key_field
                    ))
                })?;
                if !keys.insert(key.clone()) {
                    return Err(SchemaError::invalid(format!(
                        "seed key '{}/{}' is declared twice",
                        group.collection, key
                    )));
                }
                for (field, target) in &item.refs {
                    if !seeded.contains(target) {
                        return Err(SchemaError::invalid(format!(
                            "seed {}/{} field '{}' references '{}', which is not seeded earlier",
                            group.collection, key, field, target
                        )));
                    }
                }
            }
            for key in keys {
                seeded.insert(format!("{}/{}", group.collection, key));
            }
            seeded_collections.insert(group.collection.as_str());
        }
        Ok(())
    }
}

fn validate_identifier(kind: &str, name: &str) -> SchemaResult<()> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .next()
            .map(|c| c.is_ascii_lowercase())
            .unwrap_or(false)
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SchemaError::invalid(format!(
            "{} name '{}' must be 1-64 lowercase letters, digits or underscores, starting with a letter",
            kind, name
        )))
    }
}
