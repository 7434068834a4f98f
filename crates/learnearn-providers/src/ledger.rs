//! In-memory wallet ledger.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use learnearn_core::model::TopicId;
use learnearn_core::traits::RewardSink;

/// A credited quiz reward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub topic_id: TopicId,
    pub description: String,
    pub amount: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct LedgerState {
    balance: u64,
    /// Newest first.
    transactions: Vec<Transaction>,
}

/// Token balance plus the history of rewards that built it.
#[derive(Debug)]
pub struct Ledger {
    token_symbol: String,
    state: Mutex<LedgerState>,
}

impl Ledger {
    pub fn new(token_symbol: impl Into<String>) -> Self {
        Self::with_balance(token_symbol, 0)
    }

    pub fn with_balance(token_symbol: impl Into<String>, balance: u64) -> Self {
        Self {
            token_symbol: token_symbol.into(),
            state: Mutex::new(LedgerState {
                balance,
                transactions: Vec::new(),
            }),
        }
    }

    pub fn token_symbol(&self) -> &str {
        &self.token_symbol
    }

    pub fn balance(&self) -> u64 {
        self.lock().balance
    }

    /// Credited rewards, newest first.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.lock().transactions.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        // The state is never left half-updated, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RewardSink for Ledger {
    async fn credit(&self, topic_id: TopicId, amount: u64) -> anyhow::Result<u64> {
        let mut state = self.lock();
        let balance = state.balance.checked_add(amount).ok_or_else(|| {
            anyhow::anyhow!("crediting {amount} {} would overflow the balance", self.token_symbol)
        })?;

        state.balance = balance;
        state.transactions.insert(
            0,
            Transaction {
                id: Uuid::new_v4(),
                topic_id,
                description: format!(
                    "Earned {amount} {} from quiz #{topic_id}",
                    self.token_symbol
                ),
                amount,
                timestamp: Utc::now(),
            },
        );
        tracing::debug!(topic_id, amount, balance, "ledger credited");
        Ok(balance)
    }
}
