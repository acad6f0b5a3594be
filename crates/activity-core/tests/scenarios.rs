//! End-to-end scenarios from spec §8, driven against an in-memory store.

use activity_core::memory::InMemoryStore;
use activity_core::{Author, ChannelMessages, IngestConfig, Ingestor, Message};
use chrono::{DateTime, TimeZone, Utc};

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn human(id: &str, content: &str, secs: i64) -> Message {
    Message {
        id: id.to_string(),
        content: content.to_string(),
        timestamp: ts(secs),
        author: Author {
            id: "42".to_string(),
            name: "tester".to_string(),
            is_bot: false,
        },
    }
}

fn bot(id: &str, content: &str, secs: i64) -> Message {
    Message {
        id: id.to_string(),
        content: content.to_string(),
        timestamp: ts(secs),
        author: Author {
            id: "bot-1".to_string(),
            name: "robot".to_string(),
            is_bot: true,
        },
    }
}

async fn run(messages: Vec<Message>) -> (InMemoryStore, activity_core::IngestSummary) {
    let store = InMemoryStore::new();
    let ingestor = Ingestor::new(IngestConfig::default());
    let txn = store.begin_guild().await.unwrap();
    let summary = ingestor
        .ingest_guild(
            txn,
            "1",
            "Test Guild",
            vec![ChannelMessages {
                channel_id: 1,
                messages,
            }],
        )
        .await
        .unwrap();
    (store, summary)
}

#[tokio::test]
async fn scenario_1_single_message() {
    let (store, summary) = run(vec![human("m1", "hello world", 0)]).await;
    assert_eq!(summary.rows_written, 1);
    let rows = store.rows();
    assert_eq!(rows[0].xp_gained, 5);
    assert_eq!(rows[0].message_length, 11);
    let levels = store.user_levels(rows[0].user_id, rows[0].guild_id);
    assert_eq!(levels.total_xp, 5);
    assert_eq!(levels.user_message_count, 1);
    assert_eq!(levels.user_average_message_length, 11.0);
}

#[tokio::test]
async fn scenario_2_duplicate_within_window_scores_zero() {
    let (store, _summary) = run(vec![
        human("m1", "hello", 0),
        human("m2", "hello", 30),
    ])
    .await;
    let rows = store.rows();
    assert_eq!(rows[0].xp_gained, 5);
    assert_eq!(rows[1].xp_gained, 0);
    let levels = store.user_levels(rows[0].user_id, rows[0].guild_id);
    assert_eq!(levels.total_xp, 5);
    assert_eq!(levels.user_message_count, 2);
}

#[tokio::test]
async fn scenario_3_near_identical_long_messages_score_zero() {
    let long_a = "A".repeat(100);
    let (store, _summary) = run(vec![
        human("m1", &long_a, 0),
        human("m2", &long_a, 1),
    ])
    .await;
    let rows = store.rows();
    assert!(rows[0].xp_gained > 0);
    assert_eq!(rows[1].xp_gained, 0);
}

#[tokio::test]
async fn scenario_4_implausible_typing_speed_scores_zero() {
    let a = "A".repeat(100);
    let b = "B".repeat(100);
    let store = InMemoryStore::new();
    let ingestor = Ingestor::new(IngestConfig::default());
    let txn = store.begin_guild().await.unwrap();
    let mut m2 = human("m2", &b, 0);
    m2.timestamp = ts(0) + chrono::Duration::milliseconds(200);
    let summary = ingestor
        .ingest_guild(
            txn,
            "1",
            "Test Guild",
            vec![ChannelMessages {
                channel_id: 1,
                messages: vec![human("m1", &a, 0), m2],
            }],
        )
        .await
        .unwrap();
    assert_eq!(summary.rows_written, 2);
    let rows = store.rows();
    assert_eq!(rows[1].xp_gained, 0);
}

#[tokio::test]
async fn scenario_5_bots_do_not_affect_guild_counter() {
    let (store, summary) = run(vec![
        human("m1", "hi", 0),
        bot("m2", "beep", 1),
        human("m3", "hi again", 2),
        bot("m4", "boop", 3),
        human("m5", "hi thrice", 4),
    ])
    .await;
    assert_eq!(summary.rows_written, 3);
    let rows = store.rows();
    let counts: Vec<i64> = rows.iter().map(|r| r.guild_message_count).collect();
    assert_eq!(counts, vec![1, 2, 3]);
}

#[tokio::test]
async fn scenario_6_similar_text_outside_window_still_scores_full() {
    let (store, _summary) = run(vec![
        human("m1", "cafe", 0),
        human("m2", "café", 3600),
    ])
    .await;
    let rows = store.rows();
    assert_eq!(rows[0].message_simhash, rows[1].message_simhash);
    assert!(rows[1].xp_gained > 0);
}

#[tokio::test]
async fn property_8_bot_isolation() {
    let (store, summary) = run(vec![bot("m1", "beep boop", 0)]).await;
    assert_eq!(summary.rows_written, 0);
    assert!(store.rows().is_empty());
}
