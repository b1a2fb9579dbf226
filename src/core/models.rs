//! Documents persisted by the store and served over the API.

use crate::core::allocation::AssetCategory;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Display;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_CURRENCY: &str = "USD";

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub amount: f64,
}

impl Default for Valuation {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            amount: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category: AssetCategory,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares: Option<f64>,
    #[serde(default)]
    pub current_valuation: Valuation,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    pub fn new(user_id: Uuid, category: AssetCategory, description: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            category,
            description: description.to_string(),
            symbol: None,
            shares: None,
            current_valuation: Valuation::default(),
            date: now,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Buy,
    Sell,
    Dividend,
    Interest,
    Deposit,
    Withdrawal,
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Buy => "buy",
            Operation::Sell => "sell",
            Operation::Dividend => "dividend",
            Operation::Interest => "interest",
            Operation::Deposit => "deposit",
            Operation::Withdrawal => "withdrawal",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Operation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Operation::Buy),
            "sell" => Ok(Operation::Sell),
            "dividend" => Ok(Operation::Dividend),
            "interest" => Ok(Operation::Interest),
            "deposit" => Ok(Operation::Deposit),
            "withdrawal" => Ok(Operation::Withdrawal),
            _ => Err(anyhow::anyhow!("Invalid operation: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub operation: Operation,
    #[serde(default)]
    pub shares: f64,
    #[serde(default)]
    pub price_per_unit: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Transactions of one investment, indexed by id and kept in insertion order.
///
/// Serialized as a plain list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    entries: IndexMap<Uuid, Transaction>,
}

impl Ledger {
    /// Adds `transaction`, assigning a fresh id if its id is already taken.
    pub fn insert(&mut self, mut transaction: Transaction) -> Uuid {
        while self.entries.contains_key(&transaction.id) {
            transaction.id = Uuid::new_v4();
        }
        let id = transaction.id;
        self.entries.insert(id, transaction);
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<&Transaction> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut Transaction> {
        self.entries.get_mut(id)
    }

    /// Removes a transaction, keeping the order of the remaining ones.
    pub fn remove(&mut self, id: &Uuid) -> Option<Transaction> {
        self.entries.shift_remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Ledger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.values())
    }
}

impl<'de> Deserialize<'de> for Ledger {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let transactions = Vec::<Transaction>::deserialize(deserializer)?;
        let mut ledger = Ledger::default();
        for transaction in transactions {
            ledger.insert(transaction);
        }
        Ok(ledger)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category: AssetCategory,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_interest_rate: Option<f64>,
    #[serde(default)]
    pub transactions: Ledger,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Investment {
    pub fn new(user_id: Uuid, category: AssetCategory, description: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            category,
            description: description.to_string(),
            symbol: None,
            annual_interest_rate: None,
            transactions: Ledger::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_access: bool,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_access_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A sign-in provider account linked to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub user_id: Uuid,
    pub provider: String,
    pub provider_account_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LogEntry {
    /// Identity used to detect repeats of the same error.
    pub fn fingerprint(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.user_id.map(|id| id.to_string()).unwrap_or_default(),
            self.action,
            self.error_type.as_deref().unwrap_or_default(),
            self.error_message.as_deref().unwrap_or_default(),
            self.url.as_deref().unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction(operation: Operation, shares: f64) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            date: Utc::now(),
            operation,
            shares,
            price_per_unit: 10.0,
            currency: "USD".to_string(),
            note: None,
        }
    }

    #[test]
    fn test_ledger_remove_keeps_order() {
        let mut ledger = Ledger::default();
        let first = ledger.insert(transaction(Operation::Buy, 1.0));
        let middle = ledger.insert(transaction(Operation::Buy, 2.0));
        let last = ledger.insert(transaction(Operation::Sell, 3.0));

        let removed = ledger.remove(&middle).unwrap();
        assert_eq!(removed.shares, 2.0);
        let ids: Vec<_> = ledger.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![first, last]);
        assert!(ledger.remove(&middle).is_none());
    }

    #[test]
    fn test_ledger_reassigns_colliding_ids() {
        let mut ledger = Ledger::default();
        let tx = transaction(Operation::Buy, 1.0);
        let first = ledger.insert(tx.clone());
        let second = ledger.insert(tx);
        assert_ne!(first, second);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_investment_serializes_transactions_as_list() {
        let mut investment = Investment::new(Uuid::new_v4(), AssetCategory::Stocks, "Index fund");
        investment
            .transactions
            .insert(transaction(Operation::Buy, 5.0));

        let json = serde_json::to_value(&investment).unwrap();
        assert!(json["transactions"].is_array());
        assert_eq!(json["transactions"][0]["operation"], "buy");
        assert_eq!(json["transactions"][0]["pricePerUnit"], 10.0);

        let back: Investment = serde_json::from_value(json).unwrap();
        assert_eq!(back, investment);
    }

    #[test]
    fn test_valuation_currency_defaults_to_usd() {
        let valuation: Valuation = serde_json::from_str(r#"{"amount": 12.5}"#).unwrap();
        assert_eq!(valuation.currency, "USD");
        assert_eq!(valuation.amount, 12.5);
    }

    #[test]
    fn test_operation_from_str() {
        assert_eq!("Dividend".parse::<Operation>().unwrap(), Operation::Dividend);
        assert!("transfer".parse::<Operation>().is_err());
    }
}
