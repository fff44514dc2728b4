mod support;

use std::collections::BTreeMap;

use time::OffsetDateTime;
use time::macros::datetime;

use quire::application::migrations::{SpamMigration, SpamMigrationReport};
use quire::domain::comments::{Comment, CommentReport, SpamStatus};

use support::MemoryStore;

fn report(date: OffsetDateTime) -> CommentReport {
    CommentReport {
        category: "spam".to_string(),
        text: "spammer spam".to_string(),
        date,
        retracted: false,
    }
}

fn comment(id: &str, status: Option<SpamStatus>, reports: &[(&str, OffsetDateTime)]) -> Comment {
    Comment {
        id: id.to_string(),
        spam_status: status,
        reports: reports
            .iter()
            .map(|(user, date)| (user.to_string(), report(*date)))
            .collect::<BTreeMap<_, _>>(),
        latest_report: None,
    }
}

async fn seeded_store() -> std::sync::Arc<MemoryStore> {
    let store = MemoryStore::new();
    store
        .insert_comment(comment(
            "reported",
            None,
            &[
                ("u1", datetime!(2016-03-01 10:00 UTC)),
                ("u2", datetime!(2016-05-09 08:30 UTC)),
            ],
        ))
        .await;
    store.insert_comment(comment("quiet", None, &[])).await;
    store
        .insert_comment(comment(
            "spam",
            Some(SpamStatus::Spam),
            &[("u3", datetime!(2017-01-02 00:00 UTC))],
        ))
        .await;
    store
        .insert_comment(comment("flagged-empty", Some(SpamStatus::Flagged), &[]))
        .await;
    store
}

async fn stored(store: &MemoryStore, id: &str) -> Comment {
    store
        .comments
        .lock()
        .await
        .get(id)
        .cloned()
        .expect("comment exists")
}

#[tokio::test]
async fn backfills_status_then_latest_report() {
    let store = seeded_store().await;
    let migration = SpamMigration::new(store.clone());

    let report = migration.run(false).await.expect("migration runs");
    assert_eq!(
        report,
        SpamMigrationReport {
            status_targets: 2,
            status_migrated: 2,
            latest_targets: 3,
            latest_migrated: 2,
        }
    );

    let reported = stored(&store, "reported").await;
    assert_eq!(reported.spam_status, Some(SpamStatus::Flagged));
    assert_eq!(reported.latest_report, Some(datetime!(2016-05-09 08:30 UTC)));

    let quiet = stored(&store, "quiet").await;
    assert_eq!(quiet.spam_status, Some(SpamStatus::Unknown));
    assert_eq!(quiet.latest_report, None);

    let spam = stored(&store, "spam").await;
    assert_eq!(spam.spam_status, Some(SpamStatus::Spam));
    assert_eq!(spam.latest_report, Some(datetime!(2017-01-02 00:00 UTC)));

    let flagged = stored(&store, "flagged-empty").await;
    assert_eq!(flagged.latest_report, None);
}

#[tokio::test]
async fn dry_run_counts_without_writing() {
    let store = seeded_store().await;
    let before: Vec<Comment> = store.comments.lock().await.values().cloned().collect();

    let report = SpamMigration::new(store.clone())
        .run(true)
        .await
        .expect("dry run");
    assert_eq!(report.status_targets, 2);
    assert_eq!(report.latest_targets, 2);
    assert_eq!(report.status_migrated, 0);
    assert_eq!(report.latest_migrated, 0);

    let after: Vec<Comment> = store.comments.lock().await.values().cloned().collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn second_run_finds_nothing_left() {
    let store = seeded_store().await;
    let migration = SpamMigration::new(store.clone());
    migration.run(false).await.expect("first run");

    let report = migration.run(false).await.expect("second run");
    assert_eq!(report.status_targets, 0);
    assert_eq!(report.latest_targets, 1);
    assert_eq!(report.latest_migrated, 0);
}
