//! Wallet Ledger
//!
//! The only writer of wallet balances. Other services move coins through
//! the `*_in` helpers, which run inside the caller's unit of work.
//!
//! Besides plain credits and debits the ledger owns the reward and sink
//! flows that touch nothing but wallets: check-ins, point exchange,
//! recharge, VIP memberships and invite rewards.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kernel::id::{CheckInId, InviteRecordId, UserId};
use serde::{Deserialize, Serialize};

use crate::application::config::EconomyConfig;
use crate::application::finish;
use crate::application::idempotency::{remember, replay};
use crate::domain::entity::{
    check_in::CheckInRecord,
    invite::{InviteCode, InviteRecord},
    vip::VipPurchase,
    wallet::{Balance, Wallet, WalletSeed},
};
use crate::domain::repository::{EconomyStore, EconomyTx};
use crate::domain::services::ExchangeQuote;
use crate::domain::value_object::{
    amount::Amount, currency::Currency, idempotency_key::IdempotencyKey, vip::VipPlan,
};
use crate::error::{EconomyError, EconomyResult};

/// Balances of both sides after a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub from: Balance,
    pub to: Balance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInOutcome {
    pub record: CheckInRecord,
    pub balance: Balance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeOutcome {
    pub quote: ExchangeQuote,
    pub balance: Balance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RechargeOutcome {
    pub coins_added: i64,
    pub balance: Balance,
}

const PURCHASE_VIP: &str = "purchase_vip";

#[derive(Debug, Clone)]
pub struct VipPurchaseInput {
    pub user_id: UserId,
    /// 1-3
    pub level: i16,
    /// `monthly`, `quarterly` or `yearly`
    pub duration: String,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VipOutcome {
    pub purchase: VipPurchase,
    pub balance: Balance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteOutcome {
    pub record: InviteRecord,
    /// Invitee balances after the reward
    pub balance: Balance,
}

pub struct WalletLedger<S>
where
    S: EconomyStore,
{
    store: Arc<S>,
    config: Arc<EconomyConfig>,
}

impl<S> WalletLedger<S>
where
    S: EconomyStore,
{
    pub fn new(store: Arc<S>, config: Arc<EconomyConfig>) -> Self {
        Self { store, config }
    }

    /// Current balances. A user without a wallet sees the lazy seed.
    pub async fn get_balance(&self, user_id: &UserId) -> EconomyResult<Balance> {
        let seed = self.config.lazy_seed;
        Ok(self
            .store
            .find_wallet(user_id)
            .await?
            .map(|wallet| wallet.balances())
            .unwrap_or(Balance {
                points: seed.points,
                coins: seed.coins,
            }))
    }

    pub async fn get_wallet(&self, user_id: &UserId) -> EconomyResult<Option<Wallet>> {
        self.store.find_wallet(user_id).await
    }

    /// Open the wallet with the sign-up seed. An existing wallet is returned
    /// unchanged.
    pub async fn open_wallet(&self, user_id: &UserId) -> EconomyResult<Wallet> {
        let mut tx = self.store.begin().await?;
        let result = tx.lock_wallet(user_id, self.config.signup_seed).await;
        let wallet = finish(tx, result).await?;

        tracing::info!(
            user_id = %user_id,
            points = wallet.points,
            coins = wallet.coins,
            "Wallet opened"
        );
        Ok(wallet)
    }

    pub async fn credit(
        &self,
        user_id: &UserId,
        currency: Currency,
        amount: i64,
    ) -> EconomyResult<Balance> {
        let amount = Amount::new(amount)?;
        let mut tx = self.store.begin().await?;
        let seed = self.config.lazy_seed;
        let result = credit_in(&mut tx, user_id, currency, amount, seed, Utc::now()).await;
        let wallet = finish(tx, result).await?;

        tracing::info!(user_id = %user_id, %currency, amount = amount.get(), "Wallet credited");
        Ok(wallet.balances())
    }

    pub async fn debit(
        &self,
        user_id: &UserId,
        currency: Currency,
        amount: i64,
    ) -> EconomyResult<Balance> {
        let amount = Amount::new(amount)?;
        let mut tx = self.store.begin().await?;
        let seed = self.config.lazy_seed;
        let result = debit_in(&mut tx, user_id, currency, amount, seed, Utc::now()).await;
        let wallet = finish(tx, result).await?;

        tracing::info!(user_id = %user_id, %currency, amount = amount.get(), "Wallet debited");
        Ok(wallet.balances())
    }

    /// Move coins between two users. Both balances change or neither does.
    pub async fn transfer(
        &self,
        from: &UserId,
        to: &UserId,
        amount: i64,
    ) -> EconomyResult<TransferOutcome> {
        let amount = Amount::new(amount)?;
        if from == to {
            return Err(EconomyError::SelfTransfer);
        }

        let mut tx = self.store.begin().await?;
        let result: EconomyResult<_> = async {
            let now = Utc::now();
            let (mut payer, mut payee) = lock_pair(&mut tx, from, to, self.config.lazy_seed).await?;
            settle_in(&mut tx, &mut payer, &mut payee, amount, amount.get(), now).await?;
            Ok(TransferOutcome {
                from: payer.balances(),
                to: payee.balances(),
            })
        }
        .await;
        let outcome = finish(tx, result).await?;

        tracing::info!(from = %from, to = %to, amount = amount.get(), "Coins transferred");
        Ok(outcome)
    }

    pub async fn check_in(&self, user_id: &UserId) -> EconomyResult<CheckInOutcome> {
        self.check_in_at(user_id, Utc::now()).await
    }

    /// Daily check-in as of `now` (UTC day boundaries).
    pub async fn check_in_at(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> EconomyResult<CheckInOutcome> {
        let mut tx = self.store.begin().await?;
        let result: EconomyResult<_> = async {
            // the wallet lock serializes check-ins of one user
            let mut wallet = tx.lock_wallet(user_id, self.config.lazy_seed).await?;
            let previous = tx.last_check_in(user_id).await?;
            let today = now.date_naive();
            let consecutive_days = CheckInRecord::next_streak(previous.as_ref(), today)
                .ok_or(EconomyError::AlreadyCheckedIn)?;
            let points = self.config.check_in.reward_for(consecutive_days);

            let reward = Amount::new(points)?;
            credit_wallet(&mut tx, &mut wallet, Currency::Points, reward, now).await?;
            let record = CheckInRecord {
                id: CheckInId::new(),
                user_id: *user_id,
                check_in_date: today,
                consecutive_days,
                points_earned: points,
                created_at: now,
            };
            tx.insert_check_in(&record).await?;

            Ok(CheckInOutcome {
                record,
                balance: wallet.balances(),
            })
        }
        .await;
        let outcome = finish(tx, result).await?;

        tracing::info!(
            user_id = %user_id,
            consecutive_days = outcome.record.consecutive_days,
            points = outcome.record.points_earned,
            "Checked in"
        );
        Ok(outcome)
    }

    /// Convert points into coins at the configured ratio.
    pub async fn exchange_points(
        &self,
        user_id: &UserId,
        points: i64,
    ) -> EconomyResult<ExchangeOutcome> {
        let quote = self.config.exchange.quote(points)?;

        let mut tx = self.store.begin().await?;
        let result: EconomyResult<_> = async {
            let now = Utc::now();
            let mut wallet = tx.lock_wallet(user_id, self.config.lazy_seed).await?;
            wallet.debit(Currency::Points, quote.points_spent, now)?;
            wallet.credit(Currency::Coins, quote.coins_earned, now)?;
            tx.save_wallet(&wallet).await?;
            Ok(ExchangeOutcome {
                quote,
                balance: wallet.balances(),
            })
        }
        .await;
        let outcome = finish(tx, result).await?;

        tracing::info!(
            user_id = %user_id,
            points = quote.points_spent.get(),
            coins = quote.coins_earned.get(),
            "Points exchanged"
        );
        Ok(outcome)
    }

    /// Credit coins for `units` of paid currency. Payment capture happens
    /// before this call.
    pub async fn recharge(&self, user_id: &UserId, units: i64) -> EconomyResult<RechargeOutcome> {
        let coins = Amount::new(units)?.checked_mul(self.config.recharge_coins_per_unit)?;

        let mut tx = self.store.begin().await?;
        let seed = self.config.lazy_seed;
        let result = credit_in(&mut tx, user_id, Currency::Coins, coins, seed, Utc::now()).await;
        let wallet = finish(tx, result).await?;

        tracing::info!(user_id = %user_id, units, coins = coins.get(), "Wallet recharged");
        Ok(RechargeOutcome {
            coins_added: coins.get(),
            balance: wallet.balances(),
        })
    }

    /// Buy a VIP membership with coins. The membership starts now.
    pub async fn purchase_vip(&self, input: VipPurchaseInput) -> EconomyResult<VipOutcome> {
        let plan = VipPlan::parse(input.level, &input.duration)?;
        let price = self.config.vip_pricing.price(plan)?;
        let key = input.idempotency_key.map(IdempotencyKey::new).transpose()?;
        let user_id = input.user_id;
        let fingerprint = plan.to_string();

        let mut tx = self.store.begin().await?;
        let result: EconomyResult<VipOutcome> = async {
            let now = Utc::now();
            let mut wallet = tx.lock_wallet(&user_id, self.config.lazy_seed).await?;
            if let Some(outcome) =
                replay(&mut tx, &user_id, key.as_ref(), PURCHASE_VIP, &fingerprint).await?
            {
                return Ok(outcome);
            }

            debit_wallet(&mut tx, &mut wallet, Currency::Coins, price, now).await?;
            let purchase = VipPurchase::new(user_id, plan, price.get(), now)?;
            tx.insert_vip_purchase(&purchase).await?;

            let outcome = VipOutcome {
                purchase,
                balance: wallet.balances(),
            };
            remember(&mut tx, &user_id, key.as_ref(), PURCHASE_VIP, &fingerprint, &outcome, now)
                .await?;
            Ok(outcome)
        }
        .await;
        let outcome = finish(tx, result).await?;

        tracing::info!(
            user_id = %user_id,
            plan = %plan,
            price = price.get(),
            expires_at = %outcome.purchase.expires_at,
            "VIP purchased"
        );
        Ok(outcome)
    }

    pub async fn vip_status(&self, user_id: &UserId) -> EconomyResult<Option<VipPurchase>> {
        self.vip_status_at(user_id, Utc::now()).await
    }

    /// The latest membership, if it has not expired at `now`.
    pub async fn vip_status_at(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> EconomyResult<Option<VipPurchase>> {
        let latest = self.store.vip_purchases(user_id, 1).await?.into_iter().next();
        Ok(latest.filter(|purchase| purchase.is_active(now)))
    }

    pub async fn vip_purchases(&self, user_id: &UserId) -> EconomyResult<Vec<VipPurchase>> {
        self.store
            .vip_purchases(user_id, self.config.history_limit)
            .await
    }

    /// The user's invite code, issued on first request.
    pub async fn invite_code(&self, user_id: &UserId) -> EconomyResult<InviteCode> {
        let mut tx = self.store.begin().await?;
        let result: EconomyResult<(InviteCode, bool)> = async {
            tx.lock_wallet(user_id, self.config.lazy_seed).await?;
            if let Some(code) = tx.find_invite_code(user_id).await? {
                return Ok((code, false));
            }
            let code = InviteCode::generate(*user_id, Utc::now());
            tx.insert_invite_code(&code).await?;
            Ok((code, true))
        }
        .await;
        let (code, issued) = finish(tx, result).await?;

        if issued {
            tracing::info!(user_id = %user_id, code = %code.code, "Invite code issued");
        }
        Ok(code)
    }

    /// Redeem someone's invite code: both sides earn points. A user can be
    /// invited once.
    pub async fn redeem_invite(
        &self,
        invitee_id: &UserId,
        code: &str,
    ) -> EconomyResult<InviteOutcome> {
        let code = InviteCode::normalize(code);
        // a code never changes owner, so an unlocked read picks the wallets
        // to lock
        let inviter_id = self
            .store
            .find_invite_code_by_code(&code)
            .await?
            .filter(|c| c.active)
            .ok_or(EconomyError::NotFound("invite code"))?
            .user_id;
        if &inviter_id == invitee_id {
            return Err(EconomyError::SelfInvite);
        }
        let rewards = self.config.invite_rewards;

        let mut tx = self.store.begin().await?;
        let result: EconomyResult<_> = async {
            let now = Utc::now();
            let (mut inviter, mut invitee) =
                lock_pair(&mut tx, &inviter_id, invitee_id, self.config.lazy_seed).await?;
            if tx.find_invite_by_invitee(invitee_id).await?.is_some() {
                return Err(EconomyError::AlreadyInvited);
            }
            let mut invite_code = tx
                .find_invite_code(&inviter_id)
                .await?
                .filter(|c| c.active)
                .ok_or(EconomyError::NotFound("invite code"))?;

            reward_points(&mut tx, &mut inviter, rewards.inviter_points, now).await?;
            reward_points(&mut tx, &mut invitee, rewards.invitee_points, now).await?;
            invite_code.record_invite(rewards.inviter_points);
            tx.save_invite_code(&invite_code).await?;

            let record = InviteRecord {
                id: InviteRecordId::new(),
                inviter_id,
                invitee_id: *invitee_id,
                code: invite_code.code,
                inviter_points: rewards.inviter_points,
                invitee_points: rewards.invitee_points,
                created_at: now,
            };
            tx.insert_invite_record(&record).await?;

            Ok(InviteOutcome {
                record,
                balance: invitee.balances(),
            })
        }
        .await;
        let outcome = finish(tx, result).await?;

        tracing::info!(
            inviter_id = %inviter_id,
            invitee_id = %invitee_id,
            inviter_points = rewards.inviter_points,
            invitee_points = rewards.invitee_points,
            "Invite redeemed"
        );
        Ok(outcome)
    }

    /// Users invited by `inviter_id`, newest first.
    pub async fn invites(&self, inviter_id: &UserId) -> EconomyResult<Vec<InviteRecord>> {
        self.store
            .invites_by_inviter(inviter_id, self.config.history_limit)
            .await
    }
}

// ============================================================================
// Unit-of-work helpers
// ============================================================================

pub(crate) async fn credit_in<X>(
    tx: &mut X,
    user_id: &UserId,
    currency: Currency,
    amount: Amount,
    seed: WalletSeed,
    now: DateTime<Utc>,
) -> EconomyResult<Wallet>
where
    X: EconomyTx,
{
    let mut wallet = tx.lock_wallet(user_id, seed).await?;
    credit_wallet(tx, &mut wallet, currency, amount, now).await?;
    Ok(wallet)
}

pub(crate) async fn debit_in<X>(
    tx: &mut X,
    user_id: &UserId,
    currency: Currency,
    amount: Amount,
    seed: WalletSeed,
    now: DateTime<Utc>,
) -> EconomyResult<Wallet>
where
    X: EconomyTx,
{
    let mut wallet = tx.lock_wallet(user_id, seed).await?;
    debit_wallet(tx, &mut wallet, currency, amount, now).await?;
    Ok(wallet)
}

/// Credit a wallet already locked by this unit of work.
pub(crate) async fn credit_wallet<X>(
    tx: &mut X,
    wallet: &mut Wallet,
    currency: Currency,
    amount: Amount,
    now: DateTime<Utc>,
) -> EconomyResult<()>
where
    X: EconomyTx,
{
    wallet.credit(currency, amount, now)?;
    tx.save_wallet(wallet).await
}

/// Debit a wallet already locked by this unit of work. Nothing is written
/// when funds are insufficient.
pub(crate) async fn debit_wallet<X>(
    tx: &mut X,
    wallet: &mut Wallet,
    currency: Currency,
    amount: Amount,
    now: DateTime<Utc>,
) -> EconomyResult<()>
where
    X: EconomyTx,
{
    wallet.debit(currency, amount, now)?;
    tx.save_wallet(wallet).await
}

/// Lock two distinct wallets in ascending user-id order. Returned in
/// argument order.
pub(crate) async fn lock_pair<X>(
    tx: &mut X,
    a: &UserId,
    b: &UserId,
    seed: WalletSeed,
) -> EconomyResult<(Wallet, Wallet)>
where
    X: EconomyTx,
{
    if a < b {
        let first = tx.lock_wallet(a, seed).await?;
        let second = tx.lock_wallet(b, seed).await?;
        Ok((first, second))
    } else {
        let second = tx.lock_wallet(b, seed).await?;
        let first = tx.lock_wallet(a, seed).await?;
        Ok((first, second))
    }
}

/// Debit `gross` coins from `payer` and credit `net` to `payee`. The
/// difference stays with the platform.
pub(crate) async fn settle_in<X>(
    tx: &mut X,
    payer: &mut Wallet,
    payee: &mut Wallet,
    gross: Amount,
    net: i64,
    now: DateTime<Utc>,
) -> EconomyResult<()>
where
    X: EconomyTx,
{
    debit_wallet(tx, payer, Currency::Coins, gross, now).await?;
    if net > 0 {
        credit_wallet(tx, payee, Currency::Coins, Amount::new(net)?, now).await?;
    }
    Ok(())
}

/// Credit reward points; a zero reward writes nothing.
async fn reward_points<X>(
    tx: &mut X,
    wallet: &mut Wallet,
    points: i64,
    now: DateTime<Utc>,
) -> EconomyResult<()>
where
    X: EconomyTx,
{
    if points <= 0 {
        return Ok(());
    }
    credit_wallet(tx, wallet, Currency::Points, Amount::new(points)?, now).await
}
