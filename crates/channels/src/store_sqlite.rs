use {
    async_trait::async_trait,
    courier_common::db::retry_busy,
    sqlx::SqlitePool,
    tracing::{debug, info},
};

use crate::{
    App, Channel, Error, NewSubscription, Result, SignalGroup, Subscription, SubscriptionStore,
    SubscriptionTarget, TelegramChat, WebPushKeys, WebPushTarget,
    subscription::validate_app_name,
};

const SELECT_COLUMNS: &str = "SELECT id, app_name, channel, signal_group_id, signal_account, \
     telegram_chat_id, push_endpoint, p256dh, auth, vapid_private_key FROM subscriptions";

/// SQLite-backed subscription store.
pub struct SqliteSubscriptionStore {
    pool: SqlitePool,
}

impl SqliteSubscriptionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn subscriptions_for(&self, app_name: &str) -> Result<Vec<Subscription>> {
        let rows: Vec<SubscriptionRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE app_name = ? ORDER BY rowid"))
                .bind(app_name)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Subscription::try_from).collect()
    }
}

/// Flattened payload columns, one set per channel.
#[derive(Default)]
struct PayloadColumns<'a> {
    signal_group_id: Option<&'a str>,
    signal_account: Option<&'a str>,
    telegram_chat_id: Option<i64>,
    push_endpoint: Option<&'a str>,
    p256dh: Option<&'a str>,
    auth: Option<&'a str>,
    vapid_private_key: Option<&'a str>,
}

impl<'a> From<&'a SubscriptionTarget> for PayloadColumns<'a> {
    fn from(target: &'a SubscriptionTarget) -> Self {
        match target {
            SubscriptionTarget::Signal(group) => Self {
                signal_group_id: Some(&group.group_id),
                signal_account: Some(&group.account),
                ..Self::default()
            },
            SubscriptionTarget::Telegram(chat) => Self {
                telegram_chat_id: Some(chat.chat_id),
                ..Self::default()
            },
            SubscriptionTarget::WebPush(push) => {
                let keys = push.keys.as_ref();
                Self {
                    push_endpoint: Some(&push.endpoint),
                    p256dh: keys.map(|k| k.p256dh.as_str()),
                    auth: keys.map(|k| k.auth.as_str()),
                    vapid_private_key: keys.map(|k| k.vapid_private_key.as_str()),
                    ..Self::default()
                }
            },
        }
    }
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: String,
    app_name: String,
    channel: String,
    signal_group_id: Option<String>,
    signal_account: Option<String>,
    telegram_chat_id: Option<i64>,
    push_endpoint: Option<String>,
    p256dh: Option<String>,
    auth: Option<String>,
    vapid_private_key: Option<String>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = Error;

    fn try_from(r: SubscriptionRow) -> Result<Self> {
        let channel: Channel = r
            .channel
            .parse()
            .map_err(|e| Error::invalid_row(&r.id, e))?;

        let target = match channel {
            Channel::Signal => match (r.signal_group_id, r.signal_account) {
                (Some(group_id), Some(account)) => {
                    SubscriptionTarget::Signal(SignalGroup { group_id, account })
                },
                _ => return Err(Error::invalid_row(&r.id, "missing signal group payload")),
            },
            Channel::Telegram => match r.telegram_chat_id {
                Some(chat_id) => SubscriptionTarget::Telegram(TelegramChat { chat_id }),
                None => return Err(Error::invalid_row(&r.id, "missing telegram chat id")),
            },
            Channel::WebPush => {
                let Some(endpoint) = r.push_endpoint else {
                    return Err(Error::invalid_row(&r.id, "missing web push endpoint"));
                };
                let keys = match (r.p256dh, r.auth, r.vapid_private_key) {
                    (None, None, None) => None,
                    (Some(p256dh), Some(auth), Some(vapid_private_key)) => Some(WebPushKeys {
                        p256dh,
                        auth,
                        vapid_private_key,
                    }),
                    _ => {
                        return Err(Error::invalid_row(
                            &r.id,
                            "partial web push encryption keys",
                        ));
                    },
                };
                SubscriptionTarget::WebPush(WebPushTarget { endpoint, keys })
            },
        };

        Ok(Self {
            id: r.id,
            app_name: r.app_name,
            target,
        })
    }
}

#[async_trait]
impl SubscriptionStore for SqliteSubscriptionStore {
    async fn register_app(&self, name: &str) -> Result<()> {
        validate_app_name(name)?;
        retry_busy("register app", || {
            sqlx::query("INSERT INTO apps (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
                .bind(name)
                .execute(&self.pool)
        })
        .await?;
        Ok(())
    }

    async fn add_subscription(&self, subscription: NewSubscription) -> Result<String> {
        subscription.target.validate()?;
        self.register_app(&subscription.app_name).await?;

        let channel = subscription.target.channel();
        let cols = PayloadColumns::from(&subscription.target);
        let id = retry_busy("add subscription", || {
            sqlx::query_scalar::<_, String>(
                "INSERT INTO subscriptions
                    (app_name, channel, signal_group_id, signal_account, telegram_chat_id,
                     push_endpoint, p256dh, auth, vapid_private_key)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 RETURNING id",
            )
            .bind(&subscription.app_name)
            .bind(channel.as_str())
            .bind(cols.signal_group_id)
            .bind(cols.signal_account)
            .bind(cols.telegram_chat_id)
            .bind(cols.push_endpoint)
            .bind(cols.p256dh)
            .bind(cols.auth)
            .bind(cols.vapid_private_key)
            .fetch_one(&self.pool)
        })
        .await?;

        info!(app = %subscription.app_name, %channel, subscription_id = %id, "subscription added");
        Ok(id)
    }

    async fn get_app(&self, name: &str) -> Result<Option<App>> {
        let exists: Option<String> = sqlx::query_scalar("SELECT name FROM apps WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        let Some(name) = exists else {
            return Ok(None);
        };
        let subscriptions = self.subscriptions_for(&name).await?;
        Ok(Some(App {
            name,
            subscriptions,
        }))
    }

    async fn get_all_apps(&self) -> Result<Vec<App>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM apps ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        let mut apps = Vec::with_capacity(names.len());
        for name in names {
            let subscriptions = self.subscriptions_for(&name).await?;
            apps.push(App {
                name,
                subscriptions,
            });
        }
        Ok(apps)
    }

    async fn get_subscription(&self, id: &str) -> Result<Option<Subscription>> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Subscription::try_from).transpose()
    }

    async fn delete_subscription(&self, id: &str) -> Result<bool> {
        let result = retry_busy("delete subscription", || {
            sqlx::query("DELETE FROM subscriptions WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
        })
        .await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(subscription_id = %id, "subscription deleted");
        }
        Ok(deleted)
    }

    async fn delete_subscriptions_by_channel(&self, channel: Channel) -> Result<u64> {
        let result = retry_busy("delete channel subscriptions", || {
            sqlx::query("DELETE FROM subscriptions WHERE channel = ?")
                .bind(channel.as_str())
                .execute(&self.pool)
        })
        .await?;
        let count = result.rows_affected();
        info!(%channel, count, "channel subscriptions deleted");
        Ok(count)
    }

    async fn remove_app(&self, name: &str) -> Result<bool> {
        let result = retry_busy("remove app", || {
            sqlx::query("DELETE FROM apps WHERE name = ?")
                .bind(name)
                .execute(&self.pool)
        })
        .await?;
        let removed = result.rows_affected() > 0;
        if removed {
            info!(app = %name, "app removed");
        } else {
            debug!(app = %name, "remove requested for unknown app");
        }
        Ok(removed)
    }
}
