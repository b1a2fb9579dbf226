use super::ui;
use crate::core::config::AppConfig;
use crate::core::models::{Account, Session, User};
use crate::store::Store;
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};
use tracing::info;

/// Creates a user and a session token for it, optionally linking a sign-in
/// provider account.
pub fn add(
    store: &Store,
    name: &str,
    email: &str,
    provider: Option<(&str, &str)>,
) -> Result<(User, Session)> {
    let user = store.create_user(name, email)?;
    if let Some((provider, provider_account_id)) = provider {
        store.link_account(&Account {
            user_id: user.id,
            provider: provider.to_string(),
            provider_account_id: provider_account_id.to_string(),
        })?;
    }
    let session = store.create_session(user.id)?;
    info!(user_id = %user.id, "Created user {}", user.email);
    Ok((user, session))
}

pub fn users_table(store: &Store, config: &AppConfig, users: &[User]) -> Result<String> {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Name"),
        ui::header_cell("Email"),
        ui::header_cell("Admin"),
        ui::header_cell("Assets"),
        ui::header_cell("Providers"),
        ui::header_cell("Last access"),
    ]);

    for user in users {
        let asset_count = store.assets_for(user.id)?.len();
        let providers: Vec<String> = store
            .accounts_for(user.id)?
            .into_iter()
            .map(|account| account.provider)
            .collect();
        table.add_row(vec![
            Cell::new(&user.name),
            Cell::new(&user.email),
            Cell::new(if config.is_admin(&user.email) { "yes" } else { "" }),
            Cell::new(asset_count).set_alignment(CellAlignment::Right),
            Cell::new(providers.join(", ")),
            ui::format_optional_cell(user.last_access_at, |t| {
                t.format("%Y-%m-%d %H:%M").to_string()
            }),
        ]);
    }
    Ok(table.to_string())
}

pub fn run_add(
    store: &Store,
    name: &str,
    email: &str,
    provider: Option<(&str, &str)>,
) -> Result<()> {
    let (user, session) = add(store, name, email, provider)?;
    store.persist()?;
    println!(
        "Created {} {}",
        ui::style_text(&user.name, ui::StyleType::TotalLabel),
        ui::style_text(&format!("<{}>", user.email), ui::StyleType::Subtle)
    );
    println!("Session token: {}", ui::style_text(&session.token, ui::StyleType::TotalValue));
    Ok(())
}

pub fn run_list(store: &Store, config: &AppConfig) -> Result<()> {
    let mut users = store.list_users()?;
    users.sort_by_key(|user| user.created_at);
    if users.is_empty() {
        println!("{}", ui::style_text("No users yet", ui::StyleType::Subtle));
        return Ok(());
    }
    println!("{}", users_table(store, config, &users)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_add_user_with_provider() -> Result<()> {
        let dir = tempdir()?;
        let store = Store::open(dir.path())?;

        let (user, session) = add(&store, "Ada", "ada@example.com", Some(("github", "1234")))?;
        assert_eq!(store.resolve_session(&session.token)?.map(|u| u.id), Some(user.id));
        assert_eq!(store.accounts_for(user.id)?[0].provider, "github");

        let config = AppConfig {
            admin_emails: vec!["ada@example.com".to_string()],
            ..Default::default()
        };
        let table = users_table(&store, &config, &[user])?;
        assert!(table.contains("ada@example.com"));
        assert!(table.contains("github"));
        assert!(table.contains("yes"));
        Ok(())
    }

    #[test]
    fn test_duplicate_email_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let store = Store::open(dir.path())?;
        add(&store, "Ada", "ada@example.com", None)?;
        assert!(add(&store, "Ada Again", "ADA@example.com", None).is_err());
        Ok(())
    }
}
