// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Contact sync example.
//!
//! Demonstrates:
//! 1. Loading contacts from a JSON file (or a built-in sample)
//! 2. Syncing them twice: the first run creates, the second updates
//! 3. Searching and computing analytics over the remote snapshot
//! 4. Displaying captured metrics
//!
//! Without credentials it runs against the in-memory CRM. With
//! `CRM_API_TOKEN` and `CRM_LIST_ID` set it talks to the real service,
//! resolving field ids from the list's field definitions when
//! `CRM_FIELD_MAP` is not given.
//!
//! # Run
//!
//! ```bash
//! cargo run --example sync_from_json
//! cargo run --example sync_from_json -- contacts.json
//! ```

use std::sync::Arc;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

use contact_sync::config::ENV_API_TOKEN;
use contact_sync::{
    CategoryTable, Contact, ContactField, CrmStore, CrmSyncConfig, EngagementLevel, FieldIds, HttpCrmClient,
    InMemoryCrm, Reconciler, SearchParams,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    if recorder.install().is_err() {
        eprintln!("metrics recorder already installed; metrics dump will be empty");
    }

    tracing_subscriber::fmt().with_target(false).compact().init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           contact-sync: Sync From JSON Example                ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Load contacts
    // ─────────────────────────────────────────────────────────────────────────
    let contacts = match std::env::args().nth(1) {
        Some(path) => {
            println!("📂 Loading contacts from {path}...");
            serde_json::from_str::<Vec<Contact>>(&std::fs::read_to_string(&path)?)?
        }
        None => {
            println!("📂 Using built-in sample contacts...");
            sample_contacts()
        }
    };
    println!("   └─ {} contacts", contacts.len());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Pick the remote
    // ─────────────────────────────────────────────────────────────────────────
    let (config, store): (CrmSyncConfig, Arc<dyn CrmStore>) = if std::env::var(ENV_API_TOKEN).is_ok() {
        println!("\n🌐 Using the remote CRM from environment...");
        let mut config = CrmSyncConfig::from_env()?;
        let client = HttpCrmClient::new(&config)?;
        if config.fields.get(ContactField::Email).is_none() {
            let definitions = client.list_fields().await?;
            config.fields = FieldIds::resolve(&definitions)?;
            if let Some(category_field) = definitions
                .iter()
                .find(|d| d.name.eq_ignore_ascii_case(ContactField::EngagementCategory.remote_name()))
            {
                config.categories = config.categories.resolve(category_field)?;
            }
            println!("   └─ Resolved {} field ids", ContactField::ALL.len() - config.fields.unmapped().len());
        }
        config.validate()?;
        let store: Arc<dyn CrmStore> = Arc::new(client);
        (config, store)
    } else {
        println!("\n🧪 No {ENV_API_TOKEN} set, using the in-memory CRM...");
        let store: Arc<dyn CrmStore> = Arc::new(InMemoryCrm::new());
        (demo_config(), store)
    };

    let reconciler = Reconciler::new(config, store)?;

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Sync twice
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🚀 First sync...");
    let first = reconciler.sync(&contacts).await?;
    println!("   └─ {first}");

    println!("\n🔁 Second sync (should only update)...");
    let second = reconciler.sync(&contacts).await?;
    println!("   └─ {second}");
    for failure in &second.failures {
        println!("      ⚠️  {}: {}", failure.email, failure.reason);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Search and analytics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔍 Searching for volunteers...");
    let volunteers = reconciler
        .search(&SearchParams {
            volunteer_signup: Some(true),
            ..Default::default()
        })
        .await?;
    println!("   └─ {} of {} match", volunteers.contacts.len(), volunteers.total);
    for contact in &volunteers.contacts {
        println!("      └─ {} <{}>", contact.display_name(), contact.email);
    }

    println!("\n📊 Analytics:");
    let stats = reconciler.analytics().await?;
    println!("   ┌─ Total: {}", stats.total_contacts);
    for (category, count) in &stats.by_category {
        println!("   ├─ {category}: {count}");
    }
    println!("   ├─ Added in the last 7 days: {}", stats.recently_added);
    println!("   └─ Updated in the last 24 hours: {}", stats.recently_updated);

    let cache = reconciler.cache().stats();
    println!("\n🗄️  Snapshot cache: hits={} misses={} invalidations={}", cache.hits, cache.misses, cache.invalidations);

    println!("\n📈 Raw Metrics:");
    dump_metrics(&snapshotter);

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                    Example complete!                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");
    Ok(())
}

fn demo_config() -> CrmSyncConfig {
    let mut config = CrmSyncConfig {
        batch_delay_ms: 200,
        ..Default::default()
    };
    for field in ContactField::ALL {
        config.fields.set(field, format!("cf-{}", field.key()));
    }
    config.categories = CategoryTable::default();
    config
}

fn sample_contacts() -> Vec<Contact> {
    let mut alice = Contact::new("Alice", "Archer", "alice@example.com");
    alice.engagement_level = Some(EngagementLevel::High);
    alice.volunteer_signup = true;
    alice.stories_read = vec!["river-cleanup".into(), "school-garden".into()];
    alice.tags.insert("organizer".into());

    let mut bob = Contact::new("Bob", "Baker", "Bob@Example.com");
    bob.engagement_level = Some(EngagementLevel::Medium);
    bob.letter_submitted = true;
    bob.time_on_site = 340;

    let mut carol = Contact::new("Carol", "Chen", "carol@example.com");
    carol.engagement_level = Some(EngagementLevel::Low);
    carol.pages_visited = vec!["/".into(), "/stories".into()];

    // Duplicate (case-insensitive) and missing email: skipped and invalid.
    let bob_again = Contact::new("Robert", "Baker", "bob@example.com");
    let anonymous = Contact::new("No", "Email", "");

    vec![alice, bob, carol, bob_again, anonymous]
}

/// Print captured metrics grouped by kind.
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines = Vec::new();
    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };
        let rendered = match value {
            DebugValue::Counter(v) => format!("{v}"),
            DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
            DebugValue::Histogram(samples) => {
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                format!("count={} sum={:.4}", samples.len(), sum)
            }
        };
        lines.push(format!("{}{} = {}", key.name(), label_str, rendered));
    }
    lines.sort();

    if lines.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
    for line in lines {
        println!("   └─ {line}");
    }
}
