//! End-to-end reconciliation tests against the in-memory CRM.
//!
//! # Running Tests
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//! - `happy_*` - Normal operation: create, update, idempotence, search
//! - `edge_*` - Input edge cases: missing emails, duplicates, case folding

use std::sync::Arc;

use serde_json::json;

use contact_sync::remote::CrmStore;
use contact_sync::{
    Contact, ContactField, CrmSyncConfig, CustomValue, EngagementLevel, InMemoryCrm, Reconciler, RunPhase,
    SearchParams, SyncError,
};

// =============================================================================
// Helpers
// =============================================================================

fn config() -> CrmSyncConfig {
    let mut config = CrmSyncConfig {
        batch_delay_ms: 0,
        requests_per_minute: 60_000,
        page_size: 10,
        ..Default::default()
    };
    for (field, id) in [
        (ContactField::Email, "cf-email"),
        (ContactField::Phone, "cf-phone"),
        (ContactField::EngagementCategory, "cf-category"),
        (ContactField::StoriesRead, "cf-stories"),
        (ContactField::Tags, "cf-tags"),
        (ContactField::LetterSubmitted, "cf-letter"),
        (ContactField::VolunteerSignup, "cf-volunteer"),
    ] {
        config.fields.set(field, id);
    }
    config
}

fn setup() -> (Arc<InMemoryCrm>, Reconciler) {
    let crm = Arc::new(InMemoryCrm::new());
    let reconciler = Reconciler::new(config(), crm.clone()).unwrap();
    (crm, reconciler)
}

fn contacts(n: usize) -> Vec<Contact> {
    (0..n)
        .map(|i| Contact::new(format!("First{i}"), format!("Last{i}"), format!("person{i}@example.com")))
        .collect()
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn happy_first_run_creates_second_run_updates() {
    let (crm, reconciler) = setup();
    let input = contacts(12);

    let first = reconciler.sync(&input).await.unwrap();
    assert_eq!(first.created, 12);
    assert_eq!(first.updated, 0);
    assert_eq!(first.errors, 0);
    assert!(first.is_success());
    assert_eq!(crm.len(), 12);

    let second = reconciler.sync(&input).await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 12);
    assert_eq!(second.errors, 0);
    assert_eq!(crm.len(), 12);
    assert_eq!(crm.create_calls(), 12);
    assert_eq!(crm.update_calls(), 12);
}

#[tokio::test]
async fn happy_engagement_level_written_as_category_id() {
    let (crm, reconciler) = setup();
    let mut contact = Contact::new("A", "", "a@x.com");
    contact.engagement_level = Some(EngagementLevel::High);

    let report = reconciler.sync(&[contact]).await.unwrap();
    assert_eq!(report.created, 1);

    let stored = crm.records();
    assert_eq!(stored.len(), 1);
    let record = &stored[0];
    assert!(!record.custom_fields.is_empty());
    assert_eq!(
        record.field("cf-category"),
        Some(&CustomValue::SingleSelect("engagement-high".into()))
    );
    let wire = serde_json::to_value(record.payload()).unwrap();
    assert!(wire["custom_fields"]
        .as_array()
        .unwrap()
        .contains(&json!({"id": "cf-category", "value": ["engagement-high"]})));
}

#[tokio::test]
async fn happy_update_keeps_remote_state() {
    let (crm, reconciler) = setup();
    let mut original = Contact::new("Jo", "Doe", "jo@x.com");
    original.stories_read = vec!["story-1".into()];
    original.letter_submitted = true;
    original.tags.insert("donor".into());
    reconciler.sync(&[original]).await.unwrap();

    let mut later = Contact::new("Jo", "Doe", "jo@x.com");
    later.stories_read = vec!["story-2".into()];
    later.volunteer_signup = true;
    let report = reconciler.sync(&[later]).await.unwrap();
    assert_eq!(report.updated, 1);

    let id = crm.records()[0].id.clone();
    let merged = reconciler.get(&id).await.unwrap().unwrap();
    assert!(merged.letter_submitted);
    assert!(merged.volunteer_signup);
    assert!(merged.tags.contains("donor"));
    assert!(merged.stories_read.contains(&"story-1".to_string()));
    assert!(merged.stories_read.contains(&"story-2".to_string()));
}

#[tokio::test]
async fn happy_search_finds_by_name() {
    let (_crm, reconciler) = setup();
    reconciler
        .sync(&[
            Contact::new("John", "Smith", "john@x.com"),
            Contact::new("Jane", "Doe", "jane@x.com"),
            Contact::new("Mary", "Major", "mary@x.com"),
        ])
        .await
        .unwrap();

    let result = reconciler.search(&SearchParams::query("john")).await.unwrap();
    assert_eq!(result.total, 1);
    assert_eq!(result.contacts.len(), 1);
    assert_eq!(result.contacts[0].email, "john@x.com");
}

#[tokio::test]
async fn happy_search_sees_writes_from_sync() {
    let (crm, reconciler) = setup();
    assert_eq!(reconciler.search(&SearchParams::default()).await.unwrap().total, 0);

    reconciler.sync(&contacts(3)).await.unwrap();
    let lists_before = crm.list_calls();
    let result = reconciler.search(&SearchParams::default()).await.unwrap();
    assert_eq!(result.total, 3);
    assert!(crm.list_calls() > lists_before);
}

#[tokio::test]
async fn happy_phase_returns_to_idle() {
    let (_crm, reconciler) = setup();
    let mut phases = reconciler.phase_receiver();
    assert_eq!(*phases.borrow_and_update(), RunPhase::Idle);

    reconciler.sync(&contacts(2)).await.unwrap();
    assert!(phases.has_changed().unwrap());
    assert_eq!(*phases.borrow_and_update(), RunPhase::Idle);
    assert_eq!(reconciler.phase(), RunPhase::Idle);
}

#[tokio::test]
async fn happy_analytics_after_sync() {
    let (_crm, reconciler) = setup();
    let mut high = Contact::new("H", "", "h@x.com");
    high.engagement_level = Some(EngagementLevel::High);
    let mut low = Contact::new("L", "", "l@x.com");
    low.engagement_level = Some(EngagementLevel::Low);
    reconciler.sync(&[high, low, Contact::new("U", "", "u@x.com")]).await.unwrap();

    let stats = reconciler.analytics().await.unwrap();
    assert_eq!(stats.total_contacts, 3);
    assert_eq!(stats.by_category.get("High Engagement"), Some(&1));
    assert_eq!(stats.by_category.get("Low Engagement"), Some(&1));
    assert_eq!(stats.recently_added, 3);
}

// =============================================================================
// Edge cases
// =============================================================================

#[tokio::test]
async fn edge_email_match_is_case_insensitive() {
    let (crm, reconciler) = setup();
    reconciler.sync(&[Contact::new("B", "", "b@x.com")]).await.unwrap();

    let report = reconciler.sync(&[Contact::new("B", "", "B@X.com")]).await.unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 1);
    assert_eq!(crm.len(), 1);
}

#[tokio::test]
async fn edge_missing_email_counts_invalid() {
    let (crm, reconciler) = setup();
    let mut input = contacts(3);
    input.push(Contact::new("No", "Email", ""));
    input.push(Contact::new("Blank", "Email", "   "));

    let report = reconciler.sync(&input).await.unwrap();
    assert_eq!(report.created, 3);
    assert_eq!(report.invalid, 2);
    assert_eq!(report.errors, 0);
    assert_eq!(crm.len(), 3);
}

#[tokio::test]
async fn edge_duplicate_input_emails_never_duplicate_remote() {
    let (crm, reconciler) = setup();
    let input = vec![
        Contact::new("A", "One", "dup@x.com"),
        Contact::new("A", "Two", "DUP@x.com"),
        Contact::new("A", "Three", " dup@x.com "),
    ];

    let report = reconciler.sync(&input).await.unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.skipped, 2);
    assert_eq!(crm.len(), 1);
}

#[tokio::test]
async fn edge_duplicate_remote_records_update_first_only() {
    let (crm, reconciler) = setup();
    let translator = reconciler.translator();
    let first = crm.insert(translator.to_remote(&Contact::new("Old", "One", "twin@x.com")));
    let second = crm.insert(translator.to_remote(&Contact::new("Old", "Two", "twin@x.com")));

    let report = reconciler.sync(&[Contact::new("New", "Name", "twin@x.com")]).await.unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(crm.len(), 2);

    let updated = crm.get(&first).await.unwrap().unwrap();
    let untouched = crm.get(&second).await.unwrap().unwrap();
    assert_eq!(updated.name, "New Name");
    assert_eq!(untouched.name, "Old Two");
}

#[tokio::test]
async fn edge_empty_input_is_a_clean_run() {
    let (crm, reconciler) = setup();
    let report = reconciler.sync(&[]).await.unwrap();
    assert_eq!(report.processed(), 0);
    assert!(report.is_success());
    assert_eq!(crm.create_calls(), 0);
}

#[tokio::test]
async fn edge_snapshot_spans_many_pages() {
    let (crm, reconciler) = setup();
    let translator = reconciler.translator();
    for contact in contacts(35) {
        crm.insert(translator.to_remote(&contact));
    }

    let report = reconciler.sync(&contacts(40)).await.unwrap();
    assert_eq!(report.updated, 35);
    assert_eq!(report.created, 5);
    assert_eq!(crm.len(), 40);
}

#[tokio::test]
async fn edge_remote_larger_than_record_limit_aborts_without_writes() {
    let crm = Arc::new(InMemoryCrm::new());
    let reconciler = Reconciler::new(
        CrmSyncConfig {
            max_remote_records: 3,
            page_size: 2,
            ..config()
        },
        crm.clone(),
    )
    .unwrap();
    let translator = reconciler.translator();
    for contact in contacts(7) {
        crm.insert(translator.to_remote(&contact));
    }

    let err = reconciler.sync(&contacts(7)).await.unwrap_err();
    assert!(matches!(err, SyncError::Configuration(_)));
    assert_eq!(crm.create_calls(), 0);
    assert_eq!(crm.update_calls(), 0);
    assert_eq!(crm.len(), 7);
    assert_eq!(reconciler.phase(), RunPhase::Idle);
}

#[tokio::test]
async fn edge_skip_unchanged_counts_unchanged() {
    let crm = Arc::new(InMemoryCrm::new());
    let reconciler = Reconciler::new(
        CrmSyncConfig {
            skip_unchanged: true,
            ..config()
        },
        crm.clone(),
    )
    .unwrap();
    let input = contacts(4);
    reconciler.sync(&input).await.unwrap();

    let again = reconciler.sync(&input).await.unwrap();
    assert_eq!(again.unchanged, 4);
    assert_eq!(again.updated, 0);
    assert_eq!(crm.update_calls(), 0);
}
