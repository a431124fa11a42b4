//! End-to-end provisioning of the bundled hotel schema against the in-memory CMS.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use hotel_cms::cms::{CmsClient, Credentials, InMemoryCms, Method};
use hotel_cms::provision::{ProvisionError, ProvisionPhase, Provisioner, RunReport, Stage};
use hotel_cms::schema::LoadedSchema;

const EMAIL: &str = "admin@example.com";
const PASSWORD: &str = "secret";

fn admin() -> Credentials {
    Credentials::Password {
        email: EMAIL.to_string(),
        password: PASSWORD.to_string(),
    }
}

async fn provision(cms: &InMemoryCms) -> RunReport {
    let mut provisioner = Provisioner::new(cms.clone(), admin(), LoadedSchema::bundled().unwrap());
    provisioner.run().await.unwrap()
}

fn find<'a>(rows: &'a [Value], field: &str, value: &str) -> &'a Value {
    rows.iter()
        .find(|row| row[field] == value)
        .unwrap_or_else(|| panic!("no row with {} = {}", field, value))
}

#[tokio::test]
async fn test_empty_cms_scenario() {
    let cms = InMemoryCms::new().with_admin(EMAIL, PASSWORD);
    let report = provision(&cms).await;

    assert_eq!(report.phase, ProvisionPhase::Complete);
    assert!(!report.has_failures(), "{}", report.render_summary());

    let names = cms.collection_names();
    for expected in ["hotels", "destinations", "categories", "rooms", "pages"] {
        assert!(names.contains(&expected.to_string()), "missing {}", expected);
    }

    let luxury = find(&cms.items("categories"), "slug", "luxury").clone();
    assert_eq!(luxury["name"], "Luxury");

    let paris = find(&cms.items("destinations"), "slug", "paris").clone();
    assert_eq!(paris["name"], "Paris");
    assert_eq!(paris["status"], "published");
}

#[tokio::test]
async fn test_second_run_creates_nothing() {
    let cms = InMemoryCms::new().with_admin(EMAIL, PASSWORD);
    provision(&cms).await;
    let writes_after_first = cms.write_count();
    let calls_after_first = cms.calls().len();

    let second = provision(&cms).await;

    assert_eq!(second.total_created(), 0);
    assert!(!second.has_failures());

    // The only writes a re-run makes are permission resets
    let new_writes: Vec<_> = cms.calls()[calls_after_first..]
        .iter()
        .filter(|c| c.method != Method::Get && c.path != "/auth/login")
        .cloned()
        .collect();
    assert!(new_writes.iter().all(|c| c.method == Method::Patch));
    assert_eq!(
        new_writes.len(),
        second.stage(Stage::Permissions).unwrap().updated
    );
    assert_eq!(cms.write_count(), writes_after_first + new_writes.len());
    assert_eq!(cms.items("hotels").len(), 4);
}

#[tokio::test]
async fn test_no_field_before_its_collection() {
    let cms = InMemoryCms::new().with_admin(EMAIL, PASSWORD);
    provision(&cms).await;

    let calls = cms.calls();
    for (i, call) in calls.iter().enumerate() {
        if call.method != Method::Post {
            continue;
        }
        let Some(collection) = call.path.strip_prefix("/fields/") else {
            continue;
        };
        let created_before = calls[..i].iter().any(|c| {
            c.method == Method::Post
                && c.path == "/collections"
                && c.succeeded()
                && c.body.as_ref().map(|b| b["collection"] == collection).unwrap_or(false)
        });
        assert!(created_before, "field created on {} before the collection", collection);
    }
}

#[tokio::test]
async fn test_foreign_keys_use_captured_ids() {
    let cms = InMemoryCms::new().with_admin(EMAIL, PASSWORD);
    provision(&cms).await;

    let destinations = cms.items("destinations");
    let hotels = cms.items("hotels");
    let rooms = cms.items("rooms");

    let paris = find(&destinations, "slug", "paris");
    let palais = find(&hotels, "slug", "le-grand-palais");
    assert_eq!(palais["destination"], paris["id"]);

    let maldives = find(&destinations, "slug", "maldives");
    assert_eq!(find(&hotels, "slug", "azure-lagoon")["destination"], maldives["id"]);

    // New York matches no seeded destination
    assert!(find(&hotels, "slug", "hudson-house").get("destination").is_none());

    let suite = find(&rooms, "slug", "le-grand-palais-deluxe-suite");
    assert_eq!(suite["hotel"], palais["id"]);
}

#[tokio::test]
async fn test_one_wildcard_permission_per_action() {
    let cms = InMemoryCms::new().with_admin(EMAIL, PASSWORD);

    // Partially provisioned CMS: role, one collection and a narrowed permission
    let mut client = CmsClient::new(cms.clone());
    client
        .authenticate(&Credentials::Token { token: "setup".to_string() })
        .await
        .unwrap();
    let role = client.post("/roles", json!({"name": "Public"})).await.unwrap();
    client
        .post("/collections", json!({"collection": "hotels", "fields": [{"field": "id"}]}))
        .await
        .unwrap();
    client
        .post(
            "/permissions",
            json!({"role": role["id"], "collection": "hotels", "action": "read", "fields": ["name"]}),
        )
        .await
        .unwrap();

    let first = provision(&cms).await;
    assert!(!first.has_failures(), "{}", first.render_summary());
    assert_eq!(first.stage(Stage::Collections).unwrap().skipped, 1);
    provision(&cms).await;

    let mut rows: BTreeMap<(String, String, String), usize> = BTreeMap::new();
    for permission in cms.permissions() {
        assert_eq!(permission["fields"], json!(["*"]));
        let key = (
            permission["role"].as_str().unwrap_or_default().to_string(),
            permission["collection"].as_str().unwrap_or_default().to_string(),
            permission["action"].as_str().unwrap_or_default().to_string(),
        );
        *rows.entry(key).or_default() += 1;
    }

    assert_eq!(rows.len(), 6 * 4);
    assert!(rows.values().all(|count| *count == 1));
    assert_eq!(cms.roles().len(), 1);
}

#[tokio::test]
async fn test_rejected_login_is_fatal() {
    let cms = InMemoryCms::new().with_admin(EMAIL, "other");
    let mut provisioner = Provisioner::new(cms.clone(), admin(), LoadedSchema::bundled().unwrap());

    let err = provisioner.run().await.unwrap_err();

    assert!(matches!(err, ProvisionError::Auth(_)));
    assert_eq!(err.error_code(), "AUTH_FAILED");
    assert_eq!(cms.write_count(), 0);
    assert!(cms.collection_names().is_empty());
}
