//! Property-based tests (fuzzing) for the field translator and wire decoding.
//!
//! Uses proptest to generate random contacts and malformed remote payloads,
//! and verifies translation never panics and preserves what it promises to.
//!
//! Run with: `cargo test --test proptest_fuzz`

use std::collections::BTreeSet;

use proptest::prelude::*;
use serde_json::{json, Value};

use contact_sync::{
    normalize_email, CategoryTable, Contact, ContactField, EngagementLevel, FieldIds, FieldTranslator, RemoteRecord,
};

// =============================================================================
// Strategies for generating test data
// =============================================================================

fn translator() -> FieldTranslator {
    let mut ids = FieldIds::default();
    for (n, field) in ContactField::ALL.into_iter().enumerate() {
        ids.set(field, format!("cf-{n}"));
    }
    FieldTranslator::new(ids, CategoryTable::default())
}

/// List tokens may hold bare commas (URLs with query strings) but never the
/// `", "` delimiter, and are already trimmed.
fn token_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9/_?=,-]{1,12}"
}

fn level_strategy() -> impl Strategy<Value = Option<EngagementLevel>> {
    prop_oneof![
        Just(None),
        Just(Some(EngagementLevel::High)),
        Just(Some(EngagementLevel::Medium)),
        Just(Some(EngagementLevel::Low)),
    ]
}

fn contact_strategy() -> impl Strategy<Value = Contact> {
    (
        "[A-Za-z]{1,10}",
        "[A-Za-z]{0,10}",
        "[a-z0-9.]{1,10}@[a-z]{1,8}\\.[a-z]{2,3}",
        level_strategy(),
        prop::collection::vec(token_strategy(), 0..6),
        prop::collection::btree_set(token_strategy(), 0..6),
        any::<(bool, bool, bool)>(),
        0u64..1_000_000,
    )
        .prop_map(|(first, last, email, level, stories, tags, flags, time)| {
            let mut contact = Contact::new(first, last, email);
            contact.engagement_level = level;
            contact.stories_read = stories;
            contact.tags = tags;
            contact.letter_submitted = flags.0;
            contact.volunteer_signup = flags.1;
            contact.willing_to_testify = flags.2;
            contact.time_on_site = time;
            contact
        })
}

/// Generate arbitrary JSON values (including invalid structures)
fn arbitrary_json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        any::<f64>().prop_filter_map("finite", |f| serde_json::Number::from_f64(f).map(Value::Number)),
        ".*".prop_map(Value::String),
    ];

    leaf.prop_recursive(
        4,  // depth
        64, // max nodes
        10, // items per collection
        |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..10).prop_map(Value::Array),
                prop::collection::hash_map(".*", inner, 0..10).prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        },
    )
}

// =============================================================================
// Round-trip properties
// =============================================================================

proptest! {
    #[test]
    fn prop_round_trip_keeps_identity_and_flags(contact in contact_strategy()) {
        let tr = translator();
        let back = tr.from_remote(&tr.to_remote(&contact));

        prop_assert_eq!(normalize_email(&back.email), contact.normalized_email());
        prop_assert_eq!(&back.first_name, &contact.first_name);
        prop_assert_eq!(&back.last_name, &contact.last_name);
        prop_assert_eq!(back.engagement_level, contact.engagement_level);
        prop_assert_eq!(back.letter_submitted, contact.letter_submitted);
        prop_assert_eq!(back.volunteer_signup, contact.volunteer_signup);
        prop_assert_eq!(back.willing_to_testify, contact.willing_to_testify);
        prop_assert_eq!(back.time_on_site, contact.time_on_site);
    }

    #[test]
    fn prop_round_trip_keeps_list_sets(contact in contact_strategy()) {
        let tr = translator();
        let back = tr.from_remote(&tr.to_remote(&contact));

        let sent: BTreeSet<_> = contact.stories_read.iter().cloned().collect();
        let got: BTreeSet<_> = back.stories_read.iter().cloned().collect();
        prop_assert_eq!(got, sent);
        prop_assert_eq!(back.tags, contact.tags);
    }

    #[test]
    fn prop_absorb_never_regresses(local in contact_strategy(), stored in contact_strategy()) {
        let mut merged = local.clone();
        merged.absorb(&stored);

        prop_assert!(merged.letter_submitted >= stored.letter_submitted);
        prop_assert!(merged.volunteer_signup >= stored.volunteer_signup);
        prop_assert!(merged.willing_to_testify >= stored.willing_to_testify);
        prop_assert!(merged.time_on_site >= stored.time_on_site.max(local.time_on_site));
        for story in stored.stories_read.iter().chain(local.stories_read.iter()) {
            prop_assert!(merged.stories_read.contains(story));
        }
        prop_assert!(merged.tags.is_superset(&stored.tags));
        prop_assert_eq!(merged.email, local.email);
    }

    #[test]
    fn prop_email_normalization_is_idempotent(email in "[ \\tA-Za-z0-9@._+-]{0,40}") {
        let once = normalize_email(&email);
        prop_assert_eq!(normalize_email(&once), once.clone());
        prop_assert_eq!(once.trim(), once.as_str());
    }
}

// =============================================================================
// Malformed remote input never panics
// =============================================================================

proptest! {
    #[test]
    fn prop_from_remote_never_panics(values in prop::collection::vec(arbitrary_json_strategy(), 0..15)) {
        let tr = translator();
        let fields: Vec<Value> = values
            .into_iter()
            .enumerate()
            .map(|(n, value)| json!({"id": format!("cf-{n}"), "value": value}))
            .collect();
        let raw = json!({"id": "x", "name": "Any Body", "custom_fields": fields});

        if let Ok(record) = serde_json::from_value::<RemoteRecord>(raw) {
            let contact = tr.from_remote(&record);
            prop_assert_eq!(contact.id.as_deref(), Some("x"));
        }
    }

    #[test]
    fn prop_record_decoding_never_panics(raw in arbitrary_json_strategy()) {
        // Either a clean error or a record; never a panic.
        let _ = serde_json::from_value::<RemoteRecord>(raw);
    }
}
