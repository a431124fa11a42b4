//! # Seed Stage
//!
//! Inserts content rows group by group. Each row is looked up by its natural
//! key first; the ID of a created or already present row is remembered so
//! later groups can reference it.

use std::time::Instant;

use serde_json::{Map, Value};
use tracing::warn;

use crate::cms::{CmsTransport, Gate, Lookup};
use crate::schema::{SeedGroup, SeedItem};

use super::{RunContext, Stage};

pub async fn seed_content<T: CmsTransport>(ctx: &mut RunContext<'_, T>) {
    let schema = ctx.schema;
    for group in &schema.seed {
        for item in &group.items {
            seed_item(ctx, group, item).await;
        }
    }
}

async fn seed_item<T: CmsTransport>(ctx: &mut RunContext<'_, T>, group: &SeedGroup, item: &SeedItem) {
    let Some(key) = group.key_of(item) else {
        ctx.journal.abandoned(
            Stage::Seed,
            &group.collection,
            &format!("item has no {} value", group.key_field),
        );
        return;
    };
    let label = format!("{}/{}", group.collection, key);

    if !ctx.is_available(&group.collection) {
        ctx.journal
            .abandoned(Stage::Seed, &label, "collection is not available");
        return;
    }

    let started = Instant::now();
    let lookup = Lookup::item(&group.collection, &group.key_field, &key);
    if let Some(existing) = Gate::new(ctx.client).find_one(&lookup).await {
        remember_id(ctx, &label, &existing);
        ctx.journal.skipped(Stage::Seed, &label, started);
        return;
    }

    let body = resolve_values(ctx, &label, group, item);
    let path = format!("/items/{}", urlencoding::encode(&group.collection));
    match ctx.client.post(&path, Value::Object(body)).await {
        Ok(created) => {
            remember_id(ctx, &label, &created);
            ctx.journal.created(Stage::Seed, &label, started);
        }
        Err(e) => ctx.journal.failed(Stage::Seed, &label, started, &e),
    }
}

/// Item values with references replaced by captured IDs. Unresolved
/// references are left out.
fn resolve_values<T>(
    ctx: &RunContext<'_, T>,
    label: &str,
    group: &SeedGroup,
    item: &SeedItem,
) -> Map<String, Value> {
    let mut values = item.values.clone();
    for (field, target) in ctx.schema.seed_refs(group, item) {
        match ctx.ids.get(&target) {
            Some(id) => {
                values.insert(field, id.clone());
            }
            None => warn!(item = %label, %field, %target, "Reference not resolved, leaving field empty"),
        }
    }
    values
}

fn remember_id<T>(ctx: &mut RunContext<'_, T>, label: &str, row: &Value) {
    match row.get("id") {
        Some(id) if !id.is_null() => {
            ctx.ids.insert(label.to_string(), id.clone());
        }
        _ => warn!(item = %label, "CMS returned no id, later references to it stay empty"),
    }
}
