//! Affinity Tracker
//!
//! [`add_affinity_in`] is the only mutator of affinity records; the
//! tracker and the gift dispatcher both go through it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kernel::id::{CharacterId, UserId};
use serde::{Deserialize, Serialize};

use crate::application::config::EconomyConfig;
use crate::application::finish;
use crate::domain::entity::affinity::{AffinityChange, AffinityLogEntry, AffinityRecord};
use crate::domain::repository::{EconomyStore, EconomyTx};
use crate::domain::value_object::change_type::AffinityChangeType;
use crate::error::{EconomyError, EconomyResult};

/// Record after the mutation, plus what changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffinityOutcome {
    pub record: AffinityRecord,
    pub change: AffinityChange,
}

pub struct AffinityTracker<S>
where
    S: EconomyStore,
{
    store: Arc<S>,
    config: Arc<EconomyConfig>,
}

impl<S> AffinityTracker<S>
where
    S: EconomyStore,
{
    pub fn new(store: Arc<S>, config: Arc<EconomyConfig>) -> Self {
        Self { store, config }
    }

    pub async fn add_affinity(
        &self,
        user_id: &UserId,
        character_id: &CharacterId,
        delta: i32,
        change_type: AffinityChangeType,
        reason: Option<String>,
    ) -> EconomyResult<AffinityOutcome> {
        self.add_affinity_at(user_id, character_id, delta, change_type, reason, Utc::now())
            .await
    }

    pub async fn add_affinity_at(
        &self,
        user_id: &UserId,
        character_id: &CharacterId,
        delta: i32,
        change_type: AffinityChangeType,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> EconomyResult<AffinityOutcome> {
        let mut tx = self.store.begin().await?;
        let result: EconomyResult<_> = async {
            ensure_character(&mut tx, character_id).await?;
            add_affinity_in(&mut tx, user_id, character_id, delta, change_type, reason, now).await
        }
        .await;
        finish(tx, result).await
    }

    /// One chat turn with the character.
    pub async fn record_chat_turn(
        &self,
        user_id: &UserId,
        character_id: &CharacterId,
    ) -> EconomyResult<AffinityOutcome> {
        self.add_affinity(
            user_id,
            character_id,
            self.config.affinity.chat_turn_gain,
            AffinityChangeType::Chat,
            None,
        )
        .await
    }

    /// Current record; a pair that never interacted reads as zero.
    pub async fn get_affinity(
        &self,
        user_id: &UserId,
        character_id: &CharacterId,
    ) -> EconomyResult<AffinityRecord> {
        Ok(self
            .store
            .find_affinity(user_id, character_id)
            .await?
            .unwrap_or_else(|| AffinityRecord::new(*user_id, *character_id, Utc::now())))
    }

    /// Latest log entries, newest first.
    pub async fn history(
        &self,
        user_id: &UserId,
        character_id: &CharacterId,
    ) -> EconomyResult<Vec<AffinityLogEntry>> {
        self.store
            .affinity_log(user_id, character_id, self.config.history_limit)
            .await
    }
}

pub(crate) async fn ensure_character<X>(tx: &mut X, character_id: &CharacterId) -> EconomyResult<()>
where
    X: EconomyTx,
{
    match tx.find_character(character_id).await? {
        Some(_) => Ok(()),
        None => Err(EconomyError::NotFound("character")),
    }
}

/// Apply `delta` to the pair inside the caller's unit of work and append
/// the audit entry.
pub(crate) async fn add_affinity_in<X>(
    tx: &mut X,
    user_id: &UserId,
    character_id: &CharacterId,
    delta: i32,
    change_type: AffinityChangeType,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> EconomyResult<AffinityOutcome>
where
    X: EconomyTx,
{
    let mut record = tx.lock_affinity(user_id, character_id, now).await?;
    let change = record.apply(delta, now);
    tx.save_affinity(&record).await?;

    let entry = AffinityLogEntry::record(&record, change_type, delta, &change, reason, now);
    tx.append_affinity_log(&entry).await?;

    if change.leveled_up() {
        tracing::info!(
            user_id = %user_id,
            character_id = %character_id,
            level = %change.level_after,
            "Affinity level reached"
        );
    } else {
        tracing::debug!(
            user_id = %user_id,
            character_id = %character_id,
            %change_type,
            before = change.before,
            after = change.after,
            "Affinity changed"
        );
    }

    Ok(AffinityOutcome { record, change })
}
