//! # Permission Stage
//!
//! Ensures the configured role exists, then one permission row per
//! (collection, action) with the wildcard field list. Existing rows are
//! patched back to `["*"]` rather than duplicated.

use std::time::Instant;

use serde_json::Value;
use tracing::warn;

use crate::cms::{CmsTransport, Gate, Lookup};
use crate::schema::{payload, PermissionDef};

use super::{RunContext, Stage};

pub async fn grant_permissions<T: CmsTransport>(ctx: &mut RunContext<'_, T>) {
    let schema = ctx.schema;
    let Some(def) = schema.permissions.as_ref() else {
        return;
    };
    let collections = schema.permission_collections();

    let Some(role_id) = ensure_role(ctx, def).await else {
        for collection in &collections {
            for action in &def.actions {
                ctx.journal.abandoned(
                    Stage::Permissions,
                    &format!("{}:{}", action.as_str(), collection),
                    &format!("role {} is not available", def.role),
                );
            }
        }
        return;
    };
    let role_filter = id_text(&role_id);

    for collection in &collections {
        for action in &def.actions {
            let label = format!("{}:{}", action.as_str(), collection);
            let started = Instant::now();
            let lookup = Lookup::permission(&role_filter, collection, action.as_str());
            let existing = Gate::new(ctx.client).find_one(&lookup).await;

            match existing.as_ref().and_then(|row| row.get("id")) {
                Some(id) => {
                    let path = format!("/permissions/{}", urlencoding::encode(&id_text(id)));
                    match ctx.client.patch(&path, payload::permission_reset()).await {
                        Ok(_) => ctx.journal.updated(Stage::Permissions, &label, started),
                        Err(e) => ctx.journal.failed(Stage::Permissions, &label, started, &e),
                    }
                }
                None => {
                    let body = payload::permission(&role_id, collection, *action);
                    match ctx.client.post("/permissions", body).await {
                        Ok(_) => ctx.journal.created(Stage::Permissions, &label, started),
                        Err(e) => ctx.journal.failed(Stage::Permissions, &label, started, &e),
                    }
                }
            }
        }
    }
}

/// Find or create the role, returning its ID
async fn ensure_role<T: CmsTransport>(ctx: &mut RunContext<'_, T>, def: &PermissionDef) -> Option<Value> {
    let label = format!("role:{}", def.role);
    let started = Instant::now();

    if def.admin_access {
        warn!(role = %def.role, "Role is configured with admin access");
    }

    if let Some(role) = Gate::new(ctx.client).find_one(&Lookup::role(&def.role)).await {
        ctx.journal.skipped(Stage::Permissions, &label, started);
        return role.get("id").cloned();
    }

    match ctx.client.post("/roles", payload::role(def)).await {
        Ok(created) => {
            ctx.journal.created(Stage::Permissions, &label, started);
            created.get("id").cloned()
        }
        Err(e) => {
            ctx.journal.failed(Stage::Permissions, &label, started, &e);
            None
        }
    }
}

/// Text form of an ID for filters and paths
fn id_text(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::{CmsClient, Credentials, InMemoryCms, Method};
    use crate::provision::collections::create_collections;
    use crate::provision::ItemOutcome;
    use crate::schema::SchemaDefinition;
    use serde_json::json;
    use std::path::Path;

    const SCHEMA: &str = r#"
collections:
  - name: hotels
  - name: pages
permissions:
  role: Public
"#;

    async fn client(cms: &InMemoryCms) -> CmsClient<InMemoryCms> {
        let mut client = CmsClient::new(cms.clone());
        client
            .authenticate(&Credentials::Token { token: "t".to_string() })
            .await
            .unwrap();
        client
    }

    #[test]
    fn test_id_text() {
        assert_eq!(id_text(&json!("role-1")), "role-1");
        assert_eq!(id_text(&json!(42)), "42");
    }

    #[tokio::test]
    async fn test_grants_every_action_once() {
        let cms = InMemoryCms::new();
        let client = client(&cms).await;
        let schema = SchemaDefinition::from_yaml_str(SCHEMA, Path::new("t.yaml")).unwrap();

        let mut ctx = RunContext::new(&client, &schema);
        create_collections(&mut ctx).await;
        grant_permissions(&mut ctx).await;
        assert_eq!(ctx.journal.count(Stage::Permissions, ItemOutcome::Created), 9);

        let mut again = RunContext::new(&client, &schema);
        grant_permissions(&mut again).await;
        assert_eq!(again.journal.count(Stage::Permissions, ItemOutcome::Updated), 8);
        assert_eq!(again.journal.count(Stage::Permissions, ItemOutcome::Skipped), 1);

        let permissions = cms.permissions();
        assert_eq!(permissions.len(), 8);
        assert!(permissions.iter().all(|p| p["fields"] == json!(["*"])));
        assert_eq!(cms.roles().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_role_abandons_permissions() {
        let cms = InMemoryCms::new();
        cms.fail_on(Method::Post, "/roles", 403);
        let client = client(&cms).await;
        let schema = SchemaDefinition::from_yaml_str(SCHEMA, Path::new("t.yaml")).unwrap();

        let mut ctx = RunContext::new(&client, &schema);
        create_collections(&mut ctx).await;
        grant_permissions(&mut ctx).await;

        assert_eq!(ctx.journal.summary(Stage::Permissions).failed, 9);
        assert!(cms.permissions().is_empty());
    }
}
