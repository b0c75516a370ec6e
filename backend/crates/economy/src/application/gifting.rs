//! Gift / Red-Packet Dispatcher
//!
//! Spends the sender's coins and grants affinity with the target character
//! in one unit of work.

use std::sync::Arc;

use chrono::Utc;
use kernel::id::{CharacterId, SpendRecordId, UserId};
use serde::{Deserialize, Serialize};

use crate::application::affinity::{AffinityOutcome, add_affinity_in, ensure_character};
use crate::application::config::EconomyConfig;
use crate::application::idempotency::{remember, replay};
use crate::application::finish;
use crate::application::ledger::debit_wallet;
use crate::domain::entity::{
    spend::{GiftItem, SpendRecord},
    wallet::Balance,
};
use crate::domain::repository::{EconomyStore, EconomyTx};
use crate::domain::value_object::{
    amount::Amount, change_type::AffinityChangeType, currency::Currency,
    idempotency_key::IdempotencyKey, spend_channel::SpendChannel,
};
use crate::error::{EconomyError, EconomyResult};

const SEND_GIFT: &str = "send_gift";
const SEND_RED_PACKET: &str = "send_red_packet";

#[derive(Debug, Clone)]
pub struct GiftInput {
    pub user_id: UserId,
    pub character_id: CharacterId,
    pub gift_id: i64,
    pub quantity: i64,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RedPacketInput {
    pub user_id: UserId,
    pub character_id: CharacterId,
    /// Coins
    pub amount: i64,
    pub message: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendOutcome {
    pub record: SpendRecord,
    pub affinity: AffinityOutcome,
    pub balance: Balance,
}

/// Settlement parameters shared by both channels.
struct Spend {
    user_id: UserId,
    character_id: CharacterId,
    channel: SpendChannel,
    gift_id: Option<i64>,
    quantity: i64,
    coins: Amount,
    affinity_gain: i32,
    reason: String,
    message: Option<String>,
    key: Option<IdempotencyKey>,
    /// What a replay under `key` must match
    fingerprint: String,
}

pub struct GiftDispatcher<S>
where
    S: EconomyStore,
{
    store: Arc<S>,
    config: Arc<EconomyConfig>,
}

impl<S> GiftDispatcher<S>
where
    S: EconomyStore,
{
    pub fn new(store: Arc<S>, config: Arc<EconomyConfig>) -> Self {
        Self { store, config }
    }

    pub fn catalog(&self) -> &[GiftItem] {
        &self.config.gift_catalog
    }

    pub async fn send_gift(&self, input: GiftInput) -> EconomyResult<SpendOutcome> {
        let gift = self
            .config
            .gift(input.gift_id)
            .ok_or(EconomyError::NotFound("gift"))?;
        if input.quantity < 1 {
            return Err(EconomyError::InvalidAmount);
        }
        let coins = Amount::new(gift.price)?.checked_mul(input.quantity)?;
        let key = input.idempotency_key.map(IdempotencyKey::new).transpose()?;

        let spend = Spend {
            user_id: input.user_id,
            character_id: input.character_id,
            channel: SpendChannel::Gift,
            gift_id: Some(gift.id),
            quantity: input.quantity,
            coins,
            affinity_gain: self.config.affinity.gift_gain(coins.get()),
            reason: format!("{} x{}", gift.name, input.quantity),
            message: None,
            key,
            fingerprint: format!("{}:{}x{}", input.character_id, gift.id, input.quantity),
        };
        self.dispatch(spend, SEND_GIFT).await
    }

    pub async fn send_red_packet(&self, input: RedPacketInput) -> EconomyResult<SpendOutcome> {
        if input.amount < self.config.min_red_packet {
            return Err(EconomyError::InvalidAmount);
        }
        let coins = Amount::new(input.amount)?;
        let key = input.idempotency_key.map(IdempotencyKey::new).transpose()?;
        let message = input
            .message
            .map(|m| m.trim().to_owned())
            .filter(|m| !m.is_empty());

        let spend = Spend {
            user_id: input.user_id,
            character_id: input.character_id,
            channel: SpendChannel::RedPacket,
            gift_id: None,
            quantity: 1,
            coins,
            affinity_gain: self.config.affinity.red_packet_gain(coins.get()),
            reason: format!("red packet {coins}"),
            message,
            key,
            fingerprint: format!("{}:{}", input.character_id, coins),
        };
        self.dispatch(spend, SEND_RED_PACKET).await
    }

    /// Latest spend records of the user, optionally one channel only.
    pub async fn records(
        &self,
        user_id: &UserId,
        channel: Option<SpendChannel>,
    ) -> EconomyResult<Vec<SpendRecord>> {
        self.store
            .spend_records(user_id, channel, self.config.history_limit)
            .await
    }

    async fn dispatch(&self, spend: Spend, operation: &'static str) -> EconomyResult<SpendOutcome> {
        let mut tx = self.store.begin().await?;
        let result = self.dispatch_in(&mut tx, &spend, operation).await;
        let outcome = finish(tx, result).await?;

        tracing::info!(
            user_id = %spend.user_id,
            character_id = %spend.character_id,
            channel = %spend.channel,
            coins = spend.coins.get(),
            affinity = outcome.affinity.change.after,
            "Coins spent on character"
        );
        Ok(outcome)
    }

    async fn dispatch_in(
        &self,
        tx: &mut S::Tx,
        spend: &Spend,
        operation: &'static str,
    ) -> EconomyResult<SpendOutcome> {
        let now = Utc::now();
        let mut wallet = tx.lock_wallet(&spend.user_id, self.config.lazy_seed).await?;
        if let Some(outcome) = replay(
            tx,
            &spend.user_id,
            spend.key.as_ref(),
            operation,
            &spend.fingerprint,
        )
        .await? {
            return Ok(outcome);
        }
        ensure_character(tx, &spend.character_id).await?;

        debit_wallet(tx, &mut wallet, Currency::Coins, spend.coins, now).await?;
        let change_type = match spend.channel {
            SpendChannel::Gift => AffinityChangeType::Gift,
            SpendChannel::RedPacket => AffinityChangeType::RedPacket,
        };
        let affinity = add_affinity_in(
            tx,
            &spend.user_id,
            &spend.character_id,
            spend.affinity_gain,
            change_type,
            Some(spend.reason.clone()),
            now,
        )
        .await?;

        let record = SpendRecord {
            id: SpendRecordId::new(),
            user_id: spend.user_id,
            character_id: spend.character_id,
            channel: spend.channel,
            gift_id: spend.gift_id,
            quantity: spend.quantity,
            coins_spent: spend.coins.get(),
            affinity_gained: affinity.change.applied(),
            message: spend.message.clone(),
            created_at: now,
        };
        tx.insert_spend_record(&record).await?;

        let outcome = SpendOutcome {
            record,
            affinity,
            balance: wallet.balances(),
        };
        remember(
            tx,
            &spend.user_id,
            spend.key.as_ref(),
            operation,
            &spend.fingerprint,
            &outcome,
            now,
        )
        .await?;
        Ok(outcome)
    }
}
