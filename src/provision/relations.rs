//! # Relation Stage
//!
//! Alias fields first, then relation records. A one-to-many relation needs
//! both collections available; a many-to-many relation needs its junction
//! and both junction key fields to be confirmed by the gate.

use std::time::Instant;

use serde_json::Value;

use crate::cms::{CmsTransport, Gate, ResourceKey};
use crate::schema::{payload, RelationDef, RelationKind};

use super::{RunContext, Stage};

pub async fn create_relations<T: CmsTransport>(ctx: &mut RunContext<'_, T>) {
    let schema = ctx.schema;
    for relation in &schema.relations {
        match relation.kind {
            RelationKind::OneToMany => one_to_many(ctx, relation).await,
            RelationKind::ManyToMany => many_to_many(ctx, relation).await,
        }
    }
}

async fn one_to_many<T: CmsTransport>(ctx: &mut RunContext<'_, T>, relation: &RelationDef) {
    let label = relation.key();
    for collection in [&relation.collection, &relation.related_collection] {
        if !ctx.is_available(collection) {
            ctx.journal.abandoned(
                Stage::Relations,
                &label,
                &format!("collection {} is not available", collection),
            );
            return;
        }
    }

    if let Some(alias) = &relation.alias {
        ensure_alias(ctx, &relation.related_collection, alias, "o2m").await;
    }

    let key = ResourceKey::relation(&relation.collection, &relation.field);
    ensure_relation(ctx, &key, payload::one_to_many(relation)).await;
}

async fn many_to_many<T: CmsTransport>(ctx: &mut RunContext<'_, T>, relation: &RelationDef) {
    let junction = relation.junction_name();
    let (left, right) = relation.junction_fields();

    {
        let gate = Gate::new(ctx.client);
        let prerequisites = [
            ResourceKey::collection(&junction),
            ResourceKey::field(&junction, &left),
            ResourceKey::field(&junction, &right),
        ];
        for key in &prerequisites {
            if !gate.exists(key).await {
                ctx.journal.abandoned(
                    Stage::Relations,
                    &relation.key(),
                    &format!("junction {} {} is missing", key.kind(), key),
                );
                return;
            }
        }
    }

    let mut aliases = vec![(&relation.collection, &relation.field)];
    if let Some(alias) = &relation.alias {
        aliases.push((&relation.related_collection, alias));
    }
    for (collection, alias) in aliases {
        if ctx.is_available(collection) {
            ensure_alias(ctx, collection, alias, "m2m").await;
        } else {
            ctx.journal.abandoned(
                Stage::Relations,
                &format!("{}/{}", collection, alias),
                &format!("collection {} is not available", collection),
            );
        }
    }

    let [to_owner, to_related] = payload::many_to_many(relation);
    ensure_relation(ctx, &ResourceKey::relation(&junction, &left), to_owner).await;
    ensure_relation(ctx, &ResourceKey::relation(&junction, &right), to_related).await;
}

async fn ensure_alias<T: CmsTransport>(
    ctx: &mut RunContext<'_, T>,
    collection: &str,
    alias: &str,
    special: &str,
) {
    let started = Instant::now();
    let label = format!("{}/{}", collection, alias);

    if Gate::new(ctx.client)
        .exists(&ResourceKey::field(collection, alias))
        .await
    {
        ctx.journal.skipped(Stage::Relations, &label, started);
        return;
    }

    let path = format!("/fields/{}", urlencoding::encode(collection));
    match ctx.client.post(&path, payload::alias_field(alias, special)).await {
        Ok(_) => ctx.journal.created(Stage::Relations, &label, started),
        Err(e) => ctx.journal.failed(Stage::Relations, &label, started, &e),
    }
}

async fn ensure_relation<T: CmsTransport>(
    ctx: &mut RunContext<'_, T>,
    key: &ResourceKey,
    body: Value,
) {
    let started = Instant::now();
    let label = format!("relation:{}", key);

    if Gate::new(ctx.client).exists(key).await {
        ctx.journal.skipped(Stage::Relations, &label, started);
        return;
    }

    match ctx.client.post("/relations", body).await {
        Ok(_) => ctx.journal.created(Stage::Relations, &label, started),
        Err(e) => ctx.journal.failed(Stage::Relations, &label, started, &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::{CmsClient, Credentials, InMemoryCms};
    use crate::provision::collections::{create_collections, create_fields, create_junctions};
    use crate::provision::ItemOutcome;
    use crate::schema::SchemaDefinition;
    use std::path::Path;

    const SCHEMA: &str = r#"
collections:
  - name: destinations
    fields:
      - { name: name, type: string }
  - name: hotels
    fields:
      - { name: name, type: string }
      - { name: destination, type: integer }
  - name: categories
relations:
  - { kind: one_to_many, collection: hotels, field: destination, related_collection: destinations, alias: hotels }
  - { kind: many_to_many, collection: hotels, field: categories, related_collection: categories, alias: hotels }
"#;

    async fn client(cms: &InMemoryCms) -> CmsClient<InMemoryCms> {
        let mut client = CmsClient::new(cms.clone());
        client
            .authenticate(&Credentials::Token { token: "t".to_string() })
            .await
            .unwrap();
        client
    }

    fn schema() -> SchemaDefinition {
        SchemaDefinition::from_yaml_str(SCHEMA, Path::new("t.yaml")).unwrap()
    }

    #[tokio::test]
    async fn test_relations_after_structure() {
        let cms = InMemoryCms::new();
        let client = client(&cms).await;
        let schema = schema();
        let mut ctx = RunContext::new(&client, &schema);

        create_collections(&mut ctx).await;
        create_fields(&mut ctx).await;
        create_junctions(&mut ctx).await;
        create_relations(&mut ctx).await;

        assert_eq!(ctx.journal.summary(Stage::Relations).failed, 0);
        let o2m = cms.relation("hotels", "destination").unwrap();
        assert_eq!(o2m["related_collection"], "destinations");
        assert!(cms.has_field("destinations", "hotels"));
        assert!(cms.has_field("hotels", "categories"));
        assert!(cms.has_field("categories", "hotels"));
        assert!(cms.relation("hotels_categories", "hotels_id").is_some());
        assert!(cms.relation("hotels_categories", "categories_id").is_some());
    }

    #[tokio::test]
    async fn test_many_to_many_without_junction_sends_nothing() {
        let cms = InMemoryCms::new();
        let client = client(&cms).await;
        let schema = schema();
        let mut ctx = RunContext::new(&client, &schema);

        create_collections(&mut ctx).await;
        create_fields(&mut ctx).await;
        create_relations(&mut ctx).await;

        let failed: Vec<_> = ctx
            .journal
            .records()
            .iter()
            .filter(|r| r.outcome == ItemOutcome::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].key, "hotels.categories");
        assert!(cms.relation("hotels_categories", "hotels_id").is_none());
        assert!(!cms.has_field("hotels", "categories"));
    }

    #[tokio::test]
    async fn test_alias_on_unavailable_collection_is_recorded() {
        let cms = InMemoryCms::new();
        let client = client(&cms).await;
        let schema = schema();
        let mut ctx = RunContext::new(&client, &schema);
        create_collections(&mut ctx).await;
        create_fields(&mut ctx).await;
        create_junctions(&mut ctx).await;

        let mut ctx = RunContext::new(&client, &schema);
        ctx.available.insert("hotels".to_string());
        ctx.available.insert("destinations".to_string());
        create_relations(&mut ctx).await;

        let failed: Vec<_> = ctx
            .journal
            .records()
            .iter()
            .filter(|r| r.outcome == ItemOutcome::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].key, "categories/hotels");
        assert!(!cms.has_field("categories", "hotels"));
        // the relation records themselves do not depend on the alias
        assert!(cms.relation("hotels_categories", "categories_id").is_some());
    }

    #[tokio::test]
    async fn test_rerun_skips_everything() {
        let cms = InMemoryCms::new();
        let client = client(&cms).await;
        let schema = schema();

        for _ in 0..2 {
            let mut ctx = RunContext::new(&client, &schema);
            create_collections(&mut ctx).await;
            create_fields(&mut ctx).await;
            create_junctions(&mut ctx).await;
            create_relations(&mut ctx).await;
        }
        let writes = cms.write_count();

        let mut ctx = RunContext::new(&client, &schema);
        create_collections(&mut ctx).await;
        create_relations(&mut ctx).await;
        assert_eq!(cms.write_count(), writes);
        assert_eq!(ctx.journal.summary(Stage::Relations).created, 0);
    }
}
