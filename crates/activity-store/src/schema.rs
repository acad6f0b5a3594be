use crate::error::pg_err;
use activity_core::StoreError;
use deadpool_postgres::Object;

/// Create the tables `activity-core` reads and writes, if they don't already
/// exist. Guilds/Users are created with only the fields the core touches
/// (spec §1 "out of scope: the schema of auxiliary tables ... beyond the
/// fields the core reads/writes"); a real deployment is expected to own a
/// richer migration for those two tables.
pub async fn ensure_schema(client: &Object) -> Result<(), StoreError> {
    client
        .batch_execute(
            r#"
            CREATE TABLE IF NOT EXISTS guilds (
                id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
                discord_id TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS users (
                id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
                discord_id TEXT NOT NULL UNIQUE,
                username TEXT NOT NULL DEFAULT '',
                last_username_check TIMESTAMPTZ
            );

            CREATE TABLE IF NOT EXISTS user_activity (
                channel_id BIGINT NOT NULL,
                guild_id BIGINT NOT NULL REFERENCES guilds(id),
                user_id BIGINT NOT NULL REFERENCES users(id),
                insert_date TIMESTAMPTZ NOT NULL,
                message_hash TEXT NOT NULL,
                message_length INTEGER NOT NULL,
                message_simhash BIGINT NOT NULL,
                normalized_length INTEGER NOT NULL,
                xp_gained INTEGER NOT NULL,
                guild_average_message_length DOUBLE PRECISION NOT NULL,
                guild_message_count BIGINT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS user_activity_guild_insert_date_idx
                ON user_activity (guild_id, insert_date);
            CREATE INDEX IF NOT EXISTS user_activity_guild_user_insert_date_idx
                ON user_activity (guild_id, user_id, insert_date);

            CREATE TABLE IF NOT EXISTS user_levels (
                user_id BIGINT NOT NULL REFERENCES users(id),
                guild_id BIGINT NOT NULL REFERENCES guilds(id),
                total_xp BIGINT NOT NULL DEFAULT 0,
                level INTEGER NOT NULL DEFAULT 0,
                user_message_count BIGINT NOT NULL DEFAULT 0,
                user_average_message_length DOUBLE PRECISION NOT NULL DEFAULT 0,
                user_average_message_length_ema DOUBLE PRECISION NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, guild_id)
            );
            "#,
        )
        .await
        .map_err(pg_err)
}
