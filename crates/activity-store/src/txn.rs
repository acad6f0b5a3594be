use crate::error::pg_err;
use activity_core::model::{ActivityRow, InternalId, UserLevels};
use activity_core::rolling::GuildStats;
use activity_core::scorer::PrevUser;
use activity_core::store::{ActivitySink, GuildTxn};
use activity_core::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use bytes::Bytes;
use deadpool_postgres::Object;
use std::collections::HashMap;
use std::pin::Pin;
use tokio_postgres::binary_copy::BinaryCopyInWriter;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::CopyInSink;

const ACTIVITY_COPY_TYPES: &[Type] = &[
    Type::INT8,        // channel_id
    Type::INT8,        // guild_id
    Type::INT8,        // user_id
    Type::TIMESTAMPTZ, // insert_date
    Type::TEXT,        // message_hash
    Type::INT4,        // message_length
    Type::INT8,        // message_simhash
    Type::INT4,        // normalized_length
    Type::INT4,        // xp_gained
    Type::FLOAT8,      // guild_average_message_length
    Type::INT8,        // guild_message_count
];

const COPY_STATEMENT: &str = "COPY user_activity (\
    channel_id, guild_id, user_id, insert_date, message_hash, message_length, \
    message_simhash, normalized_length, xp_gained, guild_average_message_length, \
    guild_message_count) FROM STDIN BINARY";

const UPSERT_USER_LEVELS: &str = "\
    INSERT INTO user_levels \
        (user_id, guild_id, total_xp, level, user_message_count, \
         user_average_message_length, user_average_message_length_ema) \
    VALUES ($1, $2, $3, $4, $5, $6, $7) \
    ON CONFLICT (user_id, guild_id) DO UPDATE SET \
        total_xp = EXCLUDED.total_xp, \
        level = EXCLUDED.level, \
        user_message_count = EXCLUDED.user_message_count, \
        user_average_message_length = EXCLUDED.user_average_message_length, \
        user_average_message_length_ema = EXCLUDED.user_average_message_length_ema";

/// One guild's ingest transaction: owns a pooled connection from `BEGIN`
/// through `COMMIT` (or an implicit `ROLLBACK` on drop, spec §4.G).
pub struct PgGuildTxn {
    client: Option<Object>,
    committed: bool,
}

impl PgGuildTxn {
    pub(crate) fn new(client: Object) -> Self {
        PgGuildTxn {
            client: Some(client),
            committed: false,
        }
    }

    fn client(&self) -> &Object {
        self.client.as_ref().expect("PgGuildTxn used after commit")
    }
}

impl Drop for PgGuildTxn {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Some(client) = self.client.take() {
            tracing::warn!("guild transaction dropped without commit; rolling back");
            tokio::spawn(async move {
                let _ = client.batch_execute("ROLLBACK").await;
            });
        }
    }
}

#[async_trait]
impl GuildTxn for PgGuildTxn {
    async fn ensure_guild(
        &mut self,
        guild_id_ext: &str,
        guild_name: &str,
    ) -> Result<InternalId, StoreError> {
        let row = self
            .client()
            .query_one(
                "INSERT INTO guilds (discord_id, name) VALUES ($1, $2) \
                 ON CONFLICT (discord_id) DO UPDATE SET discord_id = EXCLUDED.discord_id \
                 RETURNING id",
                &[&guild_id_ext, &guild_name],
            )
            .await
            .map_err(pg_err)?;
        Ok(row.get(0))
    }

    async fn ensure_user(
        &mut self,
        user_id_ext: &str,
        username: &str,
    ) -> Result<InternalId, StoreError> {
        let row = self
            .client()
            .query_one(
                "INSERT INTO users (discord_id, username, last_username_check) \
                 VALUES ($1, $2, now()) \
                 ON CONFLICT (discord_id) DO UPDATE SET \
                     username = EXCLUDED.username, last_username_check = now() \
                 RETURNING id",
                &[&user_id_ext, &username],
            )
            .await
            .map_err(pg_err)?;
        Ok(row.get(0))
    }

    async fn cached_user_levels(
        &mut self,
        user_id: InternalId,
        guild_id: InternalId,
    ) -> Result<UserLevels, StoreError> {
        let row = self
            .client()
            .query_opt(
                "SELECT total_xp, level, user_message_count, \
                        user_average_message_length, user_average_message_length_ema \
                 FROM user_levels WHERE user_id = $1 AND guild_id = $2",
                &[&user_id, &guild_id],
            )
            .await
            .map_err(pg_err)?;
        Ok(match row {
            Some(row) => UserLevels {
                total_xp: row.get(0),
                level: row.get(1),
                user_message_count: row.get(2),
                user_average_message_length: row.get(3),
                user_average_message_length_ema: row.get(4),
            },
            None => UserLevels::default(),
        })
    }

    async fn seed_guild_stats(
        &mut self,
        guild_id: InternalId,
        first_ts: DateTime<Utc>,
    ) -> Result<Option<GuildStats>, StoreError> {
        let row = self
            .client()
            .query_opt(
                "SELECT guild_average_message_length, guild_message_count \
                 FROM user_activity \
                 WHERE guild_id = $1 AND insert_date < $2 \
                 ORDER BY insert_date DESC LIMIT 1",
                &[&guild_id, &first_ts],
            )
            .await
            .map_err(pg_err)?;
        Ok(row.map(|row| GuildStats {
            avg_len: row.get(0),
            count: row.get(1),
        }))
    }

    async fn seed_prev_users(
        &mut self,
        guild_id: InternalId,
        first_ts: DateTime<Utc>,
    ) -> Result<HashMap<InternalId, PrevUser>, StoreError> {
        let rows = self
            .client()
            .query(
                "SELECT DISTINCT ON (user_id) user_id, insert_date, message_hash \
                 FROM user_activity \
                 WHERE guild_id = $1 AND insert_date < $2 \
                 ORDER BY user_id, insert_date DESC",
                &[&guild_id, &first_ts],
            )
            .await
            .map_err(pg_err)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let user_id: InternalId = row.get(0);
                let prev = PrevUser {
                    timestamp: row.get(1),
                    content_hash: row.get(2),
                };
                (user_id, prev)
            })
            .collect())
    }

    async fn seed_recent_simhashes(
        &mut self,
        guild_id: InternalId,
        window_start: DateTime<Utc>,
        first_ts: DateTime<Utc>,
        cap_per_user: usize,
    ) -> Result<HashMap<InternalId, Vec<(u64, i32, DateTime<Utc>)>>, StoreError> {
        let cap = cap_per_user as i64;
        let rows = self
            .client()
            .query(
                "SELECT user_id, message_simhash, normalized_length, insert_date \
                 FROM ( \
                     SELECT user_id, message_simhash, normalized_length, insert_date, \
                            row_number() OVER ( \
                                PARTITION BY user_id ORDER BY insert_date DESC \
                            ) AS rn \
                     FROM user_activity \
                     WHERE guild_id = $1 AND insert_date >= $2 AND insert_date < $3 \
                 ) ranked \
                 WHERE rn <= $4 \
                 ORDER BY user_id, insert_date DESC",
                &[&guild_id, &window_start, &first_ts, &cap],
            )
            .await
            .map_err(pg_err)?;

        let mut out: HashMap<InternalId, Vec<(u64, i32, DateTime<Utc>)>> = HashMap::new();
        for row in rows {
            let user_id: InternalId = row.get(0);
            let simhash: i64 = row.get(1);
            let normalized_length: i32 = row.get(2);
            let insert_date: DateTime<Utc> = row.get(3);
            out.entry(user_id)
                .or_default()
                .push((simhash as u64, normalized_length, insert_date));
        }
        Ok(out)
    }

    async fn open_activity_sink(&mut self) -> Result<Box<dyn ActivitySink>, StoreError> {
        let sink = self
            .client()
            .copy_in(COPY_STATEMENT)
            .await
            .map_err(pg_err)?;
        let writer = BinaryCopyInWriter::new(sink, ACTIVITY_COPY_TYPES);
        Ok(Box::new(PgActivitySink {
            writer: Box::pin(writer),
        }))
    }

    async fn flush_user_levels(
        &mut self,
        guild_id: InternalId,
        updates: Vec<(InternalId, UserLevels)>,
    ) -> Result<(), StoreError> {
        let client = self.client();
        let stmt = client.prepare(UPSERT_USER_LEVELS).await.map_err(pg_err)?;
        for (user_id, levels) in updates {
            client
                .execute(
                    &stmt,
                    &[
                        &user_id,
                        &guild_id,
                        &levels.total_xp,
                        &levels.level,
                        &levels.user_message_count,
                        &levels.user_average_message_length,
                        &levels.user_average_message_length_ema,
                    ],
                )
                .await
                .map_err(pg_err)?;
        }
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        let client = self
            .client
            .take()
            .expect("PgGuildTxn used after commit");
        client.batch_execute("COMMIT").await.map_err(pg_err)?;
        self.committed = true;
        Ok(())
    }
}

struct PgActivitySink {
    writer: Pin<Box<BinaryCopyInWriter<CopyInSink<Bytes>>>>,
}

#[async_trait]
impl ActivitySink for PgActivitySink {
    async fn write_row(&mut self, row: &ActivityRow) -> Result<(), StoreError> {
        let channel_id = row.channel_id as i64;
        let values: &[&(dyn ToSql + Sync)] = &[
            &channel_id,
            &row.guild_id,
            &row.user_id,
            &row.insert_date,
            &row.message_hash,
            &row.message_length,
            &row.message_simhash,
            &row.normalized_length,
            &row.xp_gained,
            &row.guild_average_message_length,
            &row.guild_message_count,
        ];
        self.writer.as_mut().write(values).await.map_err(pg_err)
    }

    async fn finish(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = self;
        this.writer.as_mut().finish().await.map_err(pg_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_type_list_matches_column_count() {
        let columns = COPY_STATEMENT.matches(',').count() + 1;
        assert_eq!(ACTIVITY_COPY_TYPES.len(), 11);
        // 11 columns named in the COPY statement's column list only (not the
        // trailing "FROM STDIN BINARY" clause); a loose sanity check that
        // nobody added a column to one list without the other.
        assert!(columns >= ACTIVITY_COPY_TYPES.len());
    }

    #[test]
    fn upsert_targets_the_composite_key() {
        assert!(UPSERT_USER_LEVELS.contains("ON CONFLICT (user_id, guild_id)"));
        assert!(UPSERT_USER_LEVELS.contains("total_xp = EXCLUDED.total_xp"));
    }
}
