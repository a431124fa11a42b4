//! # Collection, Field and Junction Stages

use std::time::Instant;

use crate::cms::{CmsTransport, Gate, ResourceKey};
use crate::schema::payload;

use super::{RunContext, Stage};

/// Create every declared collection that does not exist yet
pub async fn create_collections<T: CmsTransport>(ctx: &mut RunContext<'_, T>) {
    let gate = Gate::new(ctx.client);

    for def in &ctx.schema.collections {
        let started = Instant::now();
        let key = ResourceKey::collection(&def.name);

        if gate.exists(&key).await {
            ctx.journal.skipped(Stage::Collections, &def.name, started);
            ctx.available.insert(def.name.clone());
            continue;
        }

        match ctx.client.post("/collections", payload::collection(def)).await {
            Ok(_) => {
                ctx.journal.created(Stage::Collections, &def.name, started);
                ctx.available.insert(def.name.clone());
            }
            Err(e) => ctx.journal.failed(Stage::Collections, &def.name, started, &e),
        }
    }
}

/// Create declared fields. Fields of a collection that is not available are
/// abandoned without a request.
pub async fn create_fields<T: CmsTransport>(ctx: &mut RunContext<'_, T>) {
    let gate = Gate::new(ctx.client);

    for def in &ctx.schema.collections {
        for field in &def.fields {
            let label = format!("{}/{}", def.name, field.name);
            if !ctx.is_available(&def.name) {
                ctx.journal
                    .abandoned(Stage::Fields, &label, "collection is not available");
                continue;
            }

            let started = Instant::now();
            if gate.exists(&ResourceKey::field(&def.name, &field.name)).await {
                ctx.journal.skipped(Stage::Fields, &label, started);
                continue;
            }

            let path = format!("/fields/{}", urlencoding::encode(&def.name));
            match ctx.client.post(&path, payload::field(field)).await {
                Ok(_) => ctx.journal.created(Stage::Fields, &label, started),
                Err(e) => ctx.journal.failed(Stage::Fields, &label, started, &e),
            }
        }
    }
}

/// Create junction collections of many-to-many relations with their two
/// foreign key fields
pub async fn create_junctions<T: CmsTransport>(ctx: &mut RunContext<'_, T>) {
    let gate = Gate::new(ctx.client);

    for relation in ctx.schema.many_to_many() {
        let junction = relation.junction_name();
        let started = Instant::now();

        if gate.exists(&ResourceKey::collection(&junction)).await {
            ctx.journal.skipped(Stage::Junctions, &junction, started);
            ctx.available.insert(junction.clone());
        } else {
            match ctx
                .client
                .post("/collections", payload::junction_collection(&junction))
                .await
            {
                Ok(_) => {
                    ctx.journal.created(Stage::Junctions, &junction, started);
                    ctx.available.insert(junction.clone());
                }
                Err(e) => ctx.journal.failed(Stage::Junctions, &junction, started, &e),
            }
        }

        let (left, right) = relation.junction_fields();
        for field in [left, right] {
            let label = format!("{}/{}", junction, field);
            if !ctx.is_available(&junction) {
                ctx.journal
                    .abandoned(Stage::Junctions, &label, "junction collection is not available");
                continue;
            }

            let started = Instant::now();
            if gate.exists(&ResourceKey::field(&junction, &field)).await {
                ctx.journal.skipped(Stage::Junctions, &label, started);
                continue;
            }

            let path = format!("/fields/{}", urlencoding::encode(&junction));
            match ctx.client.post(&path, payload::junction_key_field(&field)).await {
                Ok(_) => ctx.journal.created(Stage::Junctions, &label, started),
                Err(e) => ctx.journal.failed(Stage::Junctions, &label, started, &e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::{CmsClient, Credentials, InMemoryCms, Method};
    use crate::provision::ItemOutcome;
    use crate::schema::SchemaDefinition;
    use std::path::Path;

    const SCHEMA: &str = r#"
collections:
  - name: hotels
    fields:
      - { name: name, type: string }
      - { name: slug, type: string }
  - name: rooms
    fields:
      - { name: name, type: string }
  - name: categories
relations:
  - { kind: many_to_many, collection: hotels, field: categories, related_collection: categories }
"#;

    async fn setup(cms: &InMemoryCms) -> (CmsClient<InMemoryCms>, SchemaDefinition) {
        let mut client = CmsClient::new(cms.clone());
        client
            .authenticate(&Credentials::Token { token: "t".to_string() })
            .await
            .unwrap();
        let schema = SchemaDefinition::from_yaml_str(SCHEMA, Path::new("t.yaml")).unwrap();
        (client, schema)
    }

    #[tokio::test]
    async fn test_collections_then_fields() {
        let cms = InMemoryCms::new();
        let (client, schema) = setup(&cms).await;
        let mut ctx = RunContext::new(&client, &schema);

        create_collections(&mut ctx).await;
        create_fields(&mut ctx).await;

        assert_eq!(ctx.journal.summary(Stage::Collections).created, 3);
        assert_eq!(ctx.journal.summary(Stage::Fields).created, 3);
        assert!(cms.has_field("hotels", "slug"));
        assert!(cms.has_field("hotels", "id"));
    }

    #[tokio::test]
    async fn test_fields_of_failed_collection_are_not_sent() {
        let cms = InMemoryCms::new();
        let (client, schema) = setup(&cms).await;
        cms.fail_on(Method::Post, "/collections", 500);
        let mut ctx = RunContext::new(&client, &schema);

        create_collections(&mut ctx).await;
        create_fields(&mut ctx).await;

        assert_eq!(ctx.journal.summary(Stage::Collections).failed, 3);
        assert_eq!(ctx.journal.summary(Stage::Fields).failed, 3);
        assert!(!cms
            .calls()
            .iter()
            .any(|c| c.method == Method::Post && c.path.starts_with("/fields/")));
    }

    #[tokio::test]
    async fn test_transport_failure_is_recorded_per_item() {
        let cms = InMemoryCms::new();
        let (client, schema) = setup(&cms).await;
        let mut ctx = RunContext::new(&client, &schema);

        create_collections(&mut ctx).await;
        cms.fail_transport_on(Method::Post, "/fields/hotels");
        create_fields(&mut ctx).await;

        let failed: Vec<_> = ctx
            .journal
            .records()
            .iter()
            .filter(|r| r.outcome == ItemOutcome::Failed)
            .collect();
        assert_eq!(failed.len(), 2);
        for record in &failed {
            assert!(record.key.starts_with("hotels/"));
            assert_eq!(record.status, None);
            assert!(record.error.as_deref().unwrap_or_default().contains("Transport"));
        }
        // rooms comes after hotels and still gets its field
        assert!(cms.has_field("rooms", "name"));
        assert_eq!(ctx.journal.summary(Stage::Fields).created, 1);
    }

    #[tokio::test]
    async fn test_junction_created_with_key_fields() {
        let cms = InMemoryCms::new();
        let (client, schema) = setup(&cms).await;
        let mut ctx = RunContext::new(&client, &schema);

        create_collections(&mut ctx).await;
        create_junctions(&mut ctx).await;

        assert!(cms.collection_names().contains(&"hotels_categories".to_string()));
        assert!(cms.has_field("hotels_categories", "hotels_id"));
        assert!(cms.has_field("hotels_categories", "categories_id"));
        assert_eq!(ctx.journal.summary(Stage::Junctions).created, 3);

        // Second pass only skips
        let mut again = RunContext::new(&client, &schema);
        create_junctions(&mut again).await;
        assert_eq!(again.journal.count(Stage::Junctions, ItemOutcome::Skipped), 3);
    }
}
