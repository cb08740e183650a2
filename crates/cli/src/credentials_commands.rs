use {anyhow::Result, clap::Subcommand, courier_config::CourierConfig, courier_vault::CredentialStore};

use crate::runtime::open_storage;

#[derive(Subcommand)]
pub enum CredentialsAction {
    /// Show which integrations have stored credentials.
    List,
    /// Delete every stored credential. Linked integrations must link again.
    Clear,
}

pub async fn handle_credentials(config: &CourierConfig, action: CredentialsAction) -> Result<()> {
    let pool = open_storage(config).await?;
    let store = CredentialStore::new(pool, config.api_key()).await?;
    match action {
        CredentialsAction::List => {
            let records = store.list().await?;
            if records.is_empty() {
                println!("No credentials stored.");
            }
            for record in records {
                let state = if record.enabled {
                    "enabled"
                } else {
                    "disabled"
                };
                println!(
                    "  {:<9} {state:<8} updated {}",
                    record.integration, record.updated_at
                );
            }
        },
        CredentialsAction::Clear => {
            let removed = store.clear_all().await?;
            println!("Removed {removed} credential record(s).");
        },
    }
    Ok(())
}
