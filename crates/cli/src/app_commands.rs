use {
    anyhow::Result,
    clap::Subcommand,
    courier_channels::{SqliteSubscriptionStore, SubscriptionStore, SubscriptionTarget},
    courier_config::CourierConfig,
};

use crate::runtime::open_storage;

#[derive(Subcommand)]
pub enum AppAction {
    /// List every app and its subscriptions.
    List,
    /// Delete an app and all of its subscriptions.
    Remove {
        /// App name.
        name: String,
    },
}

pub async fn handle_apps(config: &CourierConfig, action: AppAction) -> Result<()> {
    let store = SqliteSubscriptionStore::new(open_storage(config).await?);
    match action {
        AppAction::List => list(&store).await,
        AppAction::Remove { name } => {
            if store.remove_app(&name).await? {
                println!("Removed app '{name}'.");
            } else {
                println!("No app named '{name}'.");
            }
            Ok(())
        },
    }
}

async fn list(store: &dyn SubscriptionStore) -> Result<()> {
    let apps = store.get_all_apps().await?;
    if apps.is_empty() {
        println!("No apps registered.");
        return Ok(());
    }
    for app in &apps {
        println!("{}", app.name);
        if app.subscriptions.is_empty() {
            println!("  (no subscriptions)");
        }
        for sub in &app.subscriptions {
            println!("  {:<9} {}  {}", sub.channel(), sub.id, describe(&sub.target));
        }
    }
    Ok(())
}

/// One-line summary of a target. Key material is never printed.
fn describe(target: &SubscriptionTarget) -> String {
    match target {
        SubscriptionTarget::Signal(group) => {
            format!("group {} ({})", group.group_id, group.account)
        },
        SubscriptionTarget::Telegram(chat) => format!("chat {}", chat.chat_id),
        SubscriptionTarget::WebPush(push) if push.is_encrypted() => {
            format!("{} (encrypted)", push.endpoint)
        },
        SubscriptionTarget::WebPush(push) => push.endpoint.clone(),
    }
}
