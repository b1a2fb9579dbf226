pub mod disk;
pub mod documents;
pub mod memory;

use crate::core::models::{Account, Asset, Investment, LogEntry, Session, User};
use anyhow::{Context, Result, bail};
use chrono::Utc;
use disk::DiskCache;
use documents::DocumentCollection;
use fjall::{Keyspace, PartitionCreateOptions, PersistMode};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// Embedded document store holding every persisted entity.
///
/// Assets and investments are keyed `<user id>/<document id>`, so listing a
/// user's documents is a prefix scan and another user's id never resolves.
pub struct Store {
    keyspace: Keyspace,
    users: DocumentCollection<User>,
    user_emails: DocumentCollection<Uuid>,
    sessions: DocumentCollection<Session>,
    accounts: DocumentCollection<Account>,
    assets: DocumentCollection<Asset>,
    investments: DocumentCollection<Investment>,
    logs: DocumentCollection<LogEntry>,
}

fn owned_key(user_id: Uuid, id: Uuid) -> String {
    format!("{user_id}/{id}")
}

fn user_prefix(user_id: Uuid) -> String {
    format!("{user_id}/")
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create data directory: {}", path.display()))?;
        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        info!("Opened store at {}", path.display());

        let collection = |name: &str| -> Result<_> {
            let partition = keyspace.open_partition(name, PartitionCreateOptions::default())?;
            Ok(partition)
        };

        Ok(Self {
            users: DocumentCollection::new(collection("users")?),
            user_emails: DocumentCollection::new(collection("user_emails")?),
            sessions: DocumentCollection::new(collection("sessions")?),
            accounts: DocumentCollection::new(collection("accounts")?),
            assets: DocumentCollection::new(collection("assets")?),
            investments: DocumentCollection::new(collection("investments")?),
            logs: DocumentCollection::new(collection("logs")?),
            keyspace,
        })
    }

    /// Opens a cache living in its own partition of this store.
    pub fn cache<K, V>(&self, name: &str) -> Result<DiskCache<K, V>> {
        let partition = self
            .keyspace
            .open_partition(name, PartitionCreateOptions::default())?;
        Ok(DiskCache::new(partition))
    }

    /// Flushes the journal to disk.
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    pub fn create_user(&self, name: &str, email: &str) -> Result<User> {
        let email = email.trim().to_lowercase();
        if self.user_emails.get(&email)?.is_some() {
            bail!("A user with email {} already exists", email);
        }
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.clone(),
            email_verified: None,
            has_access: false,
            customer_id: None,
            created_at: Utc::now(),
            last_access_at: None,
        };
        self.users.put(&user.id.to_string(), &user)?;
        self.user_emails.put(&email, &user.id)?;
        debug!(user_id = %user.id, "Created user");
        Ok(user)
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.users.get(&id.to_string())
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.user_emails.get(&email.trim().to_lowercase())? {
            Some(id) => self.get_user(id),
            None => Ok(None),
        }
    }

    pub fn save_user(&self, user: &User) -> Result<()> {
        self.users.put(&user.id.to_string(), user)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.users.all()
    }

    pub fn create_session(&self, user_id: Uuid) -> Result<Session> {
        let session = Session {
            token: format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
            user_id,
            created_at: Utc::now(),
        };
        self.sessions.put(&session.token, &session)?;
        Ok(session)
    }

    /// Resolves a session token to its user.
    pub fn resolve_session(&self, token: &str) -> Result<Option<User>> {
        match self.sessions.get(token)? {
            Some(session) => self.get_user(session.user_id),
            None => Ok(None),
        }
    }

    pub fn link_account(&self, account: &Account) -> Result<()> {
        let key = format!("{}/{}", account.user_id, account.provider);
        self.accounts.put(&key, account)
    }

    pub fn accounts_for(&self, user_id: Uuid) -> Result<Vec<Account>> {
        self.accounts.scan_prefix(&user_prefix(user_id))
    }

    pub fn save_asset(&self, asset: &Asset) -> Result<()> {
        self.assets.put(&owned_key(asset.user_id, asset.id), asset)
    }

    pub fn get_asset(&self, user_id: Uuid, id: Uuid) -> Result<Option<Asset>> {
        Ok(self
            .assets
            .get(&owned_key(user_id, id))?
            .filter(|asset| asset.user_id == user_id))
    }

    pub fn delete_asset(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        self.assets.remove(&owned_key(user_id, id))
    }

    pub fn assets_for(&self, user_id: Uuid) -> Result<Vec<Asset>> {
        Ok(self
            .assets
            .scan_prefix(&user_prefix(user_id))?
            .into_iter()
            .filter(|asset| asset.user_id == user_id)
            .collect())
    }

    pub fn save_investment(&self, investment: &Investment) -> Result<()> {
        self.investments
            .put(&owned_key(investment.user_id, investment.id), investment)
    }

    pub fn get_investment(&self, user_id: Uuid, id: Uuid) -> Result<Option<Investment>> {
        Ok(self
            .investments
            .get(&owned_key(user_id, id))?
            .filter(|investment| investment.user_id == user_id))
    }

    /// Deletes an investment together with its embedded transactions.
    pub fn delete_investment(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        self.investments.remove(&owned_key(user_id, id))
    }

    pub fn investments_for(&self, user_id: Uuid) -> Result<Vec<Investment>> {
        Ok(self
            .investments
            .scan_prefix(&user_prefix(user_id))?
            .into_iter()
            .filter(|investment| investment.user_id == user_id)
            .collect())
    }

    pub fn append_log(&self, entry: &LogEntry) -> Result<()> {
        let key = format!("{:020}-{}", entry.created_at.timestamp_millis(), entry.id);
        self.logs.put(&key, entry)
    }

    /// Every log entry, oldest first.
    pub fn list_logs(&self) -> Result<Vec<LogEntry>> {
        self.logs.all()
    }
}
