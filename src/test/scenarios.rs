use pretty_assertions::assert_eq;
use serde_json::json;

use super::{init_tracing, map, step_clock::StepClock};
use crate::clock::SystemClock;
use crate::change::{ChangeAction, ChangeSet, Modification};
use crate::config_type::ConfigType;
use crate::edit::{BetaEdit, FlagEdit};
use crate::history::HistoryService;
use crate::identity::Principal;
use crate::store::{ConfigStore, Generic};

fn service(store: Generic) -> HistoryService<Generic, StepClock> {
    HistoryService::new(store, StepClock::starting_at(1_700_000_000_000))
        .with_principal(Some(&Principal::new("ops@example.com")))
}

#[tokio::test]
async fn add_first_flag() {
    init_tracing();

    let history = service(Generic::with_documents(Some(map(json!({}))), None));

    let snapshot = history
        .apply_edit(&FlagEdit::Add {
            name: "dark_mode".into(),
            enabled: false,
        })
        .await
        .unwrap();

    assert_eq!(
        history.current_state(ConfigType::FeatureFlags).await.unwrap(),
        Some(map(json!({ "dark_mode": false })))
    );
    assert_eq!(snapshot.action, ChangeAction::Create);
    assert_eq!(
        snapshot.changes,
        ChangeSet {
            added: vec!["dark_mode".into()],
            ..Default::default()
        }
    );
    assert_eq!(snapshot.previous_state, Some(map(json!({}))));
    assert_eq!(snapshot.author.as_str(), "ops@example.com");
    assert_eq!(snapshot.id.as_str(), "feature_flags_1700000000000");
    assert_eq!(snapshot.description, "Added new flag: dark_mode (disabled)");

    let log = history.history().await.unwrap();
    assert_eq!(log.get(&snapshot.id), Some(&snapshot));
}

#[tokio::test]
async fn first_write_ever_has_no_previous_state() {
    init_tracing();

    let history = service(Generic::default());

    let snapshot = history
        .apply_edit(&FlagEdit::Add {
            name: "dark_mode".into(),
            enabled: true,
        })
        .await
        .unwrap();

    assert_eq!(snapshot.previous_state, None);
    assert_eq!(snapshot.changes.added, vec!["dark_mode".to_string()]);
}

#[tokio::test]
async fn toggle_flag() {
    init_tracing();

    let history = service(Generic::with_documents(
        Some(map(json!({ "dark_mode": false }))),
        None,
    ));

    let snapshot = history
        .apply_edit(&FlagEdit::Toggle {
            name: "dark_mode".into(),
        })
        .await
        .unwrap();

    assert_eq!(
        history.current_state(ConfigType::FeatureFlags).await.unwrap(),
        Some(map(json!({ "dark_mode": true })))
    );
    assert_eq!(
        snapshot.changes,
        ChangeSet {
            modified: [(
                "dark_mode".to_string(),
                Modification {
                    old: json!(false),
                    new: json!(true),
                }
            )]
            .into(),
            ..Default::default()
        }
    );
}

#[tokio::test]
async fn remove_beta_user() {
    init_tracing();

    let history = service(Generic::with_documents(
        None,
        Some(map(json!({ "weather_v2": "a@x.com,b@x.com" }))),
    ));

    let snapshot = history
        .apply_edit(&BetaEdit::RemoveUser {
            feature: "weather_v2".into(),
            email: "b@x.com".into(),
        })
        .await
        .unwrap();

    assert_eq!(
        history.current_state(ConfigType::BetaFeatures).await.unwrap(),
        Some(map(json!({ "weather_v2": "a@x.com" })))
    );
    assert_eq!(snapshot.config_type, ConfigType::BetaFeatures);
    assert_eq!(
        snapshot.changes.modified["weather_v2"],
        Modification {
            old: json!("a@x.com,b@x.com"),
            new: json!("a@x.com"),
        }
    );
    assert!(snapshot.changes.added.is_empty());
    assert!(snapshot.changes.removed.is_empty());
}

#[tokio::test]
async fn delete_only_flag() {
    init_tracing();

    let history = service(Generic::with_documents(Some(map(json!({ "x": true }))), None));

    let snapshot = history
        .apply_edit(&FlagEdit::Delete { name: "x".into() })
        .await
        .unwrap();

    assert_eq!(
        history.current_state(ConfigType::FeatureFlags).await.unwrap(),
        Some(map(json!({})))
    );
    assert_eq!(snapshot.action, ChangeAction::Delete);
    assert_eq!(snapshot.changes.removed, vec!["x".to_string()]);
    assert!(snapshot.changes.added.is_empty());
    assert!(snapshot.changes.modified.is_empty());
}

#[tokio::test]
async fn rejected_edit_writes_nothing() {
    init_tracing();

    let history = service(Generic::with_documents(
        Some(map(json!({ "dark_mode": false }))),
        None,
    ));

    let err = history
        .apply_edit(&FlagEdit::Add {
            name: "dark_mode".into(),
            enabled: true,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, crate::HistoryError::Validation(_)));
    assert!(history.history().await.unwrap().is_empty());
    assert_eq!(
        history.store().read(ConfigType::FeatureFlags).await.unwrap(),
        Some(map(json!({ "dark_mode": false })))
    );
}

#[tokio::test]
async fn metadata_is_kept_but_never_diffed() {
    init_tracing();

    let history = service(Generic::with_documents(
        Some(map(json!({ "metadata": { "owner": "mobile" }, "a": false }))),
        None,
    ));

    let snapshot = history
        .apply_edit(&FlagEdit::Toggle { name: "a".into() })
        .await
        .unwrap();

    assert_eq!(
        snapshot.current_state,
        map(json!({ "metadata": { "owner": "mobile" }, "a": true }))
    );
    assert_eq!(snapshot.changes.modified.len(), 1);
    assert!(snapshot.diff_entries().iter().all(|e| e.key != "metadata"));
}

#[tokio::test]
async fn unsigned_author_is_unknown() {
    init_tracing();

    let history = HistoryService::new(Generic::default(), StepClock::starting_at(1));

    let snapshot = history
        .apply_edit(&BetaEdit::AddFeature {
            name: "weather_v2".into(),
        })
        .await
        .unwrap();

    assert_eq!(snapshot.author.as_str(), "Unknown");
}

#[tokio::test]
async fn history_lists_newest_first_across_types() {
    init_tracing();

    let history = service(Generic::default());

    history
        .apply_edit(&FlagEdit::Add {
            name: "a".into(),
            enabled: true,
        })
        .await
        .unwrap();
    history
        .apply_edit(&BetaEdit::AddFeature { name: "b".into() })
        .await
        .unwrap();
    history
        .apply_edit(&FlagEdit::Toggle { name: "a".into() })
        .await
        .unwrap();

    let log = history.history().await.unwrap();
    let descriptions: Vec<&str> = log
        .newest_first()
        .iter()
        .map(|s| s.description.as_str())
        .collect();

    assert_eq!(
        descriptions,
        vec!["Disabled a", "Added new beta feature: b", "Added new flag: a (enabled)"]
    );
}

#[tokio::test]
async fn stale_previous_state_is_recorded_as_seen() {
    init_tracing();

    let store = std::sync::Arc::new(Generic::with_documents(
        Some(map(json!({ "a": false }))),
        None,
    ));
    let clock = StepClock::starting_at(100);
    let first = HistoryService::new(store.clone(), clock.clone());
    let second = HistoryService::new(store.clone(), clock);

    let seen_by_second = second
        .current_state(ConfigType::FeatureFlags)
        .await
        .unwrap();

    first
        .apply_edit(&FlagEdit::Add {
            name: "b".into(),
            enabled: true,
        })
        .await
        .unwrap();

    let snapshot = second
        .record_change(crate::Change {
            config_type: ConfigType::FeatureFlags,
            action: ChangeAction::Update,
            description: "Enabled a".into(),
            author: second.author().clone(),
            previous_state: seen_by_second,
            new_state: map(json!({ "a": true })),
        })
        .await
        .unwrap();

    // Last writer wins, and the diff is relative to what the second writer saw.
    assert_eq!(
        store.read(ConfigType::FeatureFlags).await.unwrap(),
        Some(map(json!({ "a": true })))
    );
    assert!(snapshot.changes.removed.is_empty());
    assert_eq!(snapshot.changes.modified.len(), 1);
}

#[tokio::test]
async fn back_to_back_edits_on_the_system_clock_are_all_recorded() {
    init_tracing();

    let history = HistoryService::new(Generic::default(), SystemClock);

    for i in 0..200 {
        history
            .apply_edit(&FlagEdit::Add {
                name: format!("flag_{i}"),
                enabled: true,
            })
            .await
            .unwrap();
    }

    let log = history.history().await.unwrap();
    assert_eq!(log.len(), 200);
    assert_eq!(
        history
            .current_state(ConfigType::FeatureFlags)
            .await
            .unwrap()
            .map(|flags| flags.len()),
        Some(200)
    );

    let newest = log.newest_first();
    assert!(newest.windows(2).all(|pair| pair[0].timestamp > pair[1].timestamp));
}
