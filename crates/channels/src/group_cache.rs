//! App name → messaging group, so a new subscription can reuse the group
//! created for an earlier one.

use {courier_common::db::retry_busy, sqlx::SqlitePool};

use crate::{Result, SignalGroup};

/// Cached groups, keyed independently of subscriptions: deleting every
/// subscription of an app leaves its cached group in place.
pub struct GroupCache {
    pool: SqlitePool,
}

impl GroupCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, app_name: &str) -> Result<Option<SignalGroup>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT group_id, account FROM signal_groups WHERE app_name = ?")
                .bind(app_name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(group_id, account)| SignalGroup { group_id, account }))
    }

    /// Cached group for `app_name`, only when it is owned by `account`.
    pub async fn get_for_account(
        &self,
        app_name: &str,
        account: &str,
    ) -> Result<Option<SignalGroup>> {
        Ok(self
            .get(app_name)
            .await?
            .filter(|group| group.account == account))
    }

    pub async fn put(&self, app_name: &str, group: &SignalGroup) -> Result<()> {
        retry_busy("cache signal group", || {
            sqlx::query(
                "INSERT INTO signal_groups (app_name, group_id, account) VALUES (?, ?, ?)
                 ON CONFLICT(app_name) DO UPDATE SET
                    group_id = excluded.group_id,
                    account = excluded.account",
            )
            .bind(app_name)
            .bind(&group.group_id)
            .bind(&group.account)
            .execute(&self.pool)
        })
        .await?;
        Ok(())
    }

    pub async fn remove(&self, app_name: &str) -> Result<bool> {
        let result = retry_busy("evict signal group", || {
            sqlx::query("DELETE FROM signal_groups WHERE app_name = ?")
                .bind(app_name)
                .execute(&self.pool)
        })
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
