pub mod api;
pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::store::Store;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Serve,
    Summary {
        email: String,
        currency: Option<String>,
    },
    UserAdd {
        name: String,
        email: String,
        provider: Option<String>,
        provider_account_id: Option<String>,
    },
    UserList,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("folio starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Serve => {
            let state = Arc::new(api::AppState::from_config(config)?);
            api::serve(state).await
        }
        AppCommand::Summary { email, currency } => {
            let state = api::AppState::from_config(config)?;
            cli::summary::run(&state, &email, currency.as_deref()).await
        }
        AppCommand::UserAdd {
            name,
            email,
            provider,
            provider_account_id,
        } => {
            let store = Store::open(&config.default_data_path()?)?;
            let provider = provider
                .as_deref()
                .map(|p| (p, provider_account_id.as_deref().unwrap_or(email.as_str())));
            cli::users::run_add(&store, &name, &email, provider)
        }
        AppCommand::UserList => {
            let store = Store::open(&config.default_data_path()?)?;
            cli::users::run_list(&store, &config)
        }
    }
}
