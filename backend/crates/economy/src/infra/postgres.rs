//! PostgreSQL Store Implementation
//!
//! Each [`PgEconomyTx`] is one database transaction. Rows that are created
//! lazily (wallets, affinity pairs) are inserted with `ON CONFLICT DO
//! NOTHING` and then read back `FOR UPDATE`, so the row lock is always
//! taken on an existing row.

use chrono::{DateTime, NaiveDate, Utc};
use kernel::id::{
    AffinityLogId, CharacterId, CheckInId, InviteRecordId, ListingId, PurchaseId, ReviewId,
    SpendRecordId, UserId, VipPurchaseId,
};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::entity::{
    affinity::{AffinityLogEntry, AffinityRecord},
    character::Character,
    check_in::CheckInRecord,
    invite::{InviteCode, InviteRecord},
    listing::{Listing, ReviewTotals},
    purchase::Purchase,
    receipt::Receipt,
    review::Review,
    spend::SpendRecord,
    vip::VipPurchase,
    wallet::{Wallet, WalletSeed},
};
use crate::domain::repository::{
    EarningsSummary, EconomyStore, EconomyTx, ListingPage, ListingQuery, ListingSort, ListingView,
};
use crate::domain::value_object::{
    affinity_level::AffinityLevel, change_type::AffinityChangeType,
    idempotency_key::IdempotencyKey, listing_status::ListingStatus, rating::Rating,
    spend_channel::SpendChannel,
    vip::{VipDuration, VipLevel},
};
use crate::error::{EconomyError, EconomyResult};

const WALLET_COLUMNS: &str = "user_id, points, coins, total_points_earned, total_coins_earned, \
     total_coins_spent, created_at, updated_at";

const CHARACTER_COLUMNS: &str = "character_id, owner_id, name, avatar, description, personality, \
     category, source_character_id, created_at";

const LISTING_COLUMNS: &str = "l.listing_id, l.character_id, l.seller_id, l.price, l.description, \
     l.status, l.sales_count, l.total_revenue, l.rating, l.review_count, l.created_at, l.updated_at";

const PURCHASE_COLUMNS: &str = "purchase_id, listing_id, character_id, buyer_id, seller_id, price, \
     platform_fee, seller_earnings, cloned_character_id, created_at";

const AFFINITY_COLUMNS: &str = "user_id, character_id, affinity_value, affinity_level, \
     total_interactions, daily_interactions, streak_days, last_interaction_on, created_at, updated_at";

const SPEND_COLUMNS: &str = "record_id, user_id, character_id, channel, gift_id, quantity, \
     coins_spent, affinity_gained, message, created_at";

const VIP_COLUMNS: &str = "purchase_id, user_id, level, duration, price, expires_at, created_at";

const INVITE_CODE_COLUMNS: &str =
    "user_id, code, invite_count, total_reward_points, active, created_at";

const INVITE_RECORD_COLUMNS: &str = "record_id, inviter_id, invitee_id, code, inviter_points, \
     invitee_points, created_at";

/// PostgreSQL-backed economy store
#[derive(Clone)]
pub struct PgEconomyStore {
    pool: PgPool,
}

impl PgEconomyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgEconomyTx {
    tx: Transaction<'static, Postgres>,
}

// ============================================================================
// Unit of work
// ============================================================================

impl EconomyTx for PgEconomyTx {
    async fn lock_wallet(&mut self, user_id: &UserId, seed: WalletSeed) -> EconomyResult<Wallet> {
        sqlx::query(
            r#"
            INSERT INTO wallets (user_id, points, coins, created_at, updated_at)
            VALUES ($1, $2, $3, now(), now())
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(seed.points.max(0))
        .bind(seed.coins.max(0))
        .execute(&mut *self.tx)
        .await?;

        let sql = format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, WalletRow>(&sql)
            .bind(user_id.as_uuid())
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(row.into_wallet())
    }

    async fn save_wallet(&mut self, wallet: &Wallet) -> EconomyResult<()> {
        sqlx::query(
            r#"
            UPDATE wallets SET
                points = $2,
                coins = $3,
                total_points_earned = $4,
                total_coins_earned = $5,
                total_coins_spent = $6,
                updated_at = $7
            WHERE user_id = $1
            "#,
        )
        .bind(wallet.user_id.as_uuid())
        .bind(wallet.points)
        .bind(wallet.coins)
        .bind(wallet.total_points_earned)
        .bind(wallet.total_coins_earned)
        .bind(wallet.total_coins_spent)
        .bind(wallet.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn lock_listing(&mut self, listing_id: &ListingId) -> EconomyResult<Option<Listing>> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM character_listings l WHERE l.listing_id = $1 FOR UPDATE"
        );
        let row = sqlx::query_as::<_, ListingRow>(&sql)
            .bind(listing_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(|r| r.into_listing()).transpose()
    }

    async fn find_active_listing(
        &mut self,
        character_id: &CharacterId,
        seller_id: &UserId,
    ) -> EconomyResult<Option<Listing>> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM character_listings l \
             WHERE l.character_id = $1 AND l.seller_id = $2 AND l.status = $3"
        );
        let row = sqlx::query_as::<_, ListingRow>(&sql)
            .bind(character_id.as_uuid())
            .bind(seller_id.as_uuid())
            .bind(ListingStatus::Active.id())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(|r| r.into_listing()).transpose()
    }

    async fn insert_listing(&mut self, listing: &Listing) -> EconomyResult<()> {
        sqlx::query(
            r#"
            INSERT INTO character_listings (
                listing_id,
                character_id,
                seller_id,
                price,
                description,
                status,
                sales_count,
                total_revenue,
                rating,
                review_count,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(listing.id.as_uuid())
        .bind(listing.character_id.as_uuid())
        .bind(listing.seller_id.as_uuid())
        .bind(listing.price)
        .bind(&listing.description)
        .bind(listing.status.id())
        .bind(listing.sales_count)
        .bind(listing.total_revenue)
        .bind(listing.rating)
        .bind(listing.review_count)
        .bind(listing.created_at)
        .bind(listing.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn save_listing(&mut self, listing: &Listing) -> EconomyResult<()> {
        sqlx::query(
            r#"
            UPDATE character_listings SET
                price = $2,
                description = $3,
                status = $4,
                sales_count = $5,
                total_revenue = $6,
                rating = $7,
                review_count = $8,
                updated_at = $9
            WHERE listing_id = $1
            "#,
        )
        .bind(listing.id.as_uuid())
        .bind(listing.price)
        .bind(&listing.description)
        .bind(listing.status.id())
        .bind(listing.sales_count)
        .bind(listing.total_revenue)
        .bind(listing.rating)
        .bind(listing.review_count)
        .bind(listing.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_purchase(&mut self, purchase: &Purchase) -> EconomyResult<()> {
        sqlx::query(
            r#"
            INSERT INTO listing_purchases (
                purchase_id,
                listing_id,
                character_id,
                buyer_id,
                seller_id,
                price,
                platform_fee,
                seller_earnings,
                cloned_character_id,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(purchase.id.as_uuid())
        .bind(purchase.listing_id.as_uuid())
        .bind(purchase.character_id.as_uuid())
        .bind(purchase.buyer_id.as_uuid())
        .bind(purchase.seller_id.as_uuid())
        .bind(purchase.price)
        .bind(purchase.platform_fee)
        .bind(purchase.seller_earnings)
        .bind(purchase.cloned_character_id.as_uuid())
        .bind(purchase.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn has_purchase(&mut self, listing_id: &ListingId, buyer_id: &UserId) -> EconomyResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM listing_purchases WHERE listing_id = $1 AND buyer_id = $2)",
        )
        .bind(listing_id.as_uuid())
        .bind(buyer_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn has_review(&mut self, listing_id: &ListingId, reviewer_id: &UserId) -> EconomyResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM listing_reviews WHERE listing_id = $1 AND reviewer_id = $2)",
        )
        .bind(listing_id.as_uuid())
        .bind(reviewer_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn insert_review(&mut self, review: &Review) -> EconomyResult<()> {
        sqlx::query(
            r#"
            INSERT INTO listing_reviews (review_id, listing_id, reviewer_id, rating, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(review.id.as_uuid())
        .bind(review.listing_id.as_uuid())
        .bind(review.reviewer_id.as_uuid())
        .bind(review.rating.get())
        .bind(&review.comment)
        .bind(review.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn review_totals(&mut self, listing_id: &ListingId) -> EconomyResult<ReviewTotals> {
        let (count, sum): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*)::BIGINT, COALESCE(SUM(rating), 0)::BIGINT
            FROM listing_reviews
            WHERE listing_id = $1
            "#,
        )
        .bind(listing_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(ReviewTotals { count, sum })
    }

    async fn lock_character(&mut self, character_id: &CharacterId) -> EconomyResult<Option<Character>> {
        let sql =
            format!("SELECT {CHARACTER_COLUMNS} FROM characters WHERE character_id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, CharacterRow>(&sql)
            .bind(character_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(CharacterRow::into_character))
    }

    async fn find_character(&mut self, character_id: &CharacterId) -> EconomyResult<Option<Character>> {
        let sql = format!("SELECT {CHARACTER_COLUMNS} FROM characters WHERE character_id = $1");
        let row = sqlx::query_as::<_, CharacterRow>(&sql)
            .bind(character_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(CharacterRow::into_character))
    }

    async fn insert_character(&mut self, character: &Character) -> EconomyResult<()> {
        sqlx::query(
            r#"
            INSERT INTO characters (
                character_id,
                owner_id,
                name,
                avatar,
                description,
                personality,
                category,
                source_character_id,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(character.id.as_uuid())
        .bind(character.owner_id.as_uuid())
        .bind(&character.name)
        .bind(&character.avatar)
        .bind(&character.description)
        .bind(&character.personality)
        .bind(&character.category)
        .bind(character.source_character_id.map(CharacterId::into_uuid))
        .bind(character.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn lock_affinity(
        &mut self,
        user_id: &UserId,
        character_id: &CharacterId,
        now: DateTime<Utc>,
    ) -> EconomyResult<AffinityRecord> {
        sqlx::query(
            r#"
            INSERT INTO user_affinity (user_id, character_id, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (user_id, character_id) DO NOTHING
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(character_id.as_uuid())
        .bind(now)
        .execute(&mut *self.tx)
        .await?;

        let sql = format!(
            "SELECT {AFFINITY_COLUMNS} FROM user_affinity \
             WHERE user_id = $1 AND character_id = $2 FOR UPDATE"
        );
        let row = sqlx::query_as::<_, AffinityRow>(&sql)
            .bind(user_id.as_uuid())
            .bind(character_id.as_uuid())
            .fetch_one(&mut *self.tx)
            .await?;

        row.into_record()
    }

    async fn save_affinity(&mut self, record: &AffinityRecord) -> EconomyResult<()> {
        sqlx::query(
            r#"
            UPDATE user_affinity SET
                affinity_value = $3,
                affinity_level = $4,
                total_interactions = $5,
                daily_interactions = $6,
                streak_days = $7,
                last_interaction_on = $8,
                updated_at = $9
            WHERE user_id = $1 AND character_id = $2
            "#,
        )
        .bind(record.user_id.as_uuid())
        .bind(record.character_id.as_uuid())
        .bind(record.value)
        .bind(record.level.id())
        .bind(record.total_interactions)
        .bind(record.daily_interactions)
        .bind(record.streak_days)
        .bind(record.last_interaction_on)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn append_affinity_log(&mut self, entry: &AffinityLogEntry) -> EconomyResult<()> {
        sqlx::query(
            r#"
            INSERT INTO affinity_logs (
                log_id,
                user_id,
                character_id,
                change_type,
                change_value,
                before_value,
                after_value,
                reason,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.user_id.as_uuid())
        .bind(entry.character_id.as_uuid())
        .bind(entry.change_type.id())
        .bind(entry.change_value)
        .bind(entry.before_value)
        .bind(entry.after_value)
        .bind(&entry.reason)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_spend_record(&mut self, record: &SpendRecord) -> EconomyResult<()> {
        sqlx::query(
            r#"
            INSERT INTO spend_records (
                record_id,
                user_id,
                character_id,
                channel,
                gift_id,
                quantity,
                coins_spent,
                affinity_gained,
                message,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.user_id.as_uuid())
        .bind(record.character_id.as_uuid())
        .bind(record.channel.id())
        .bind(record.gift_id)
        .bind(record.quantity)
        .bind(record.coins_spent)
        .bind(record.affinity_gained)
        .bind(&record.message)
        .bind(record.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn last_check_in(&mut self, user_id: &UserId) -> EconomyResult<Option<CheckInRecord>> {
        let row = sqlx::query_as::<_, CheckInRow>(
            r#"
            SELECT check_in_id, user_id, check_in_date, consecutive_days, points_earned, created_at
            FROM check_ins
            WHERE user_id = $1
            ORDER BY check_in_date DESC
            LIMIT 1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(CheckInRow::into_record))
    }

    async fn insert_check_in(&mut self, record: &CheckInRecord) -> EconomyResult<()> {
        sqlx::query(
            r#"
            INSERT INTO check_ins (
                check_in_id,
                user_id,
                check_in_date,
                consecutive_days,
                points_earned,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.user_id.as_uuid())
        .bind(record.check_in_date)
        .bind(record.consecutive_days)
        .bind(record.points_earned)
        .bind(record.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_vip_purchase(&mut self, purchase: &VipPurchase) -> EconomyResult<()> {
        sqlx::query(
            r#"
            INSERT INTO vip_purchases (
                purchase_id,
                user_id,
                level,
                duration,
                price,
                expires_at,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(purchase.id.as_uuid())
        .bind(purchase.user_id.as_uuid())
        .bind(purchase.level.id())
        .bind(purchase.duration.id())
        .bind(purchase.price)
        .bind(purchase.expires_at)
        .bind(purchase.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_invite_code(&mut self, user_id: &UserId) -> EconomyResult<Option<InviteCode>> {
        let sql = format!("SELECT {INVITE_CODE_COLUMNS} FROM invite_codes WHERE user_id = $1");
        let row = sqlx::query_as::<_, InviteCodeRow>(&sql)
            .bind(user_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(InviteCodeRow::into_code))
    }

    async fn insert_invite_code(&mut self, code: &InviteCode) -> EconomyResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invite_codes (
                user_id,
                code,
                invite_count,
                total_reward_points,
                active,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(code.user_id.as_uuid())
        .bind(&code.code)
        .bind(code.invite_count)
        .bind(code.total_reward_points)
        .bind(code.active)
        .bind(code.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn save_invite_code(&mut self, code: &InviteCode) -> EconomyResult<()> {
        sqlx::query(
            r#"
            UPDATE invite_codes
            SET invite_count = $2, total_reward_points = $3, active = $4
            WHERE user_id = $1
            "#,
        )
        .bind(code.user_id.as_uuid())
        .bind(code.invite_count)
        .bind(code.total_reward_points)
        .bind(code.active)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_invite_by_invitee(
        &mut self,
        invitee_id: &UserId,
    ) -> EconomyResult<Option<InviteRecord>> {
        let sql = format!("SELECT {INVITE_RECORD_COLUMNS} FROM invite_records WHERE invitee_id = $1");
        let row = sqlx::query_as::<_, InviteRecordRow>(&sql)
            .bind(invitee_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(InviteRecordRow::into_record))
    }

    async fn insert_invite_record(&mut self, record: &InviteRecord) -> EconomyResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invite_records (
                record_id,
                inviter_id,
                invitee_id,
                code,
                inviter_points,
                invitee_points,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.inviter_id.as_uuid())
        .bind(record.invitee_id.as_uuid())
        .bind(&record.code)
        .bind(record.inviter_points)
        .bind(record.invitee_points)
        .bind(record.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_receipt(
        &mut self,
        user_id: &UserId,
        key: &IdempotencyKey,
    ) -> EconomyResult<Option<Receipt>> {
        let row = sqlx::query_as::<_, ReceiptRow>(
            r#"
            SELECT user_id, idempotency_key, operation, fingerprint, outcome, created_at
            FROM idempotency_receipts
            WHERE user_id = $1 AND idempotency_key = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(key.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|r| r.into_receipt()).transpose()
    }

    async fn insert_receipt(&mut self, receipt: &Receipt) -> EconomyResult<()> {
        sqlx::query(
            r#"
            INSERT INTO idempotency_receipts
                (user_id, idempotency_key, operation, fingerprint, outcome, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(receipt.user_id.as_uuid())
        .bind(receipt.key.as_str())
        .bind(&receipt.operation)
        .bind(&receipt.fingerprint)
        .bind(&receipt.outcome)
        .bind(receipt.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self) -> EconomyResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> EconomyResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// ============================================================================
// Read queries
// ============================================================================

/// Escape LIKE wildcards in user input.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn order_by(sort: ListingSort) -> &'static str {
    match sort {
        ListingSort::Hot => "l.sales_count DESC, l.created_at DESC",
        ListingSort::Rating => "l.rating DESC, l.created_at DESC",
        ListingSort::PriceAsc => "l.price ASC, l.created_at DESC",
        ListingSort::PriceDesc => "l.price DESC, l.created_at DESC",
        ListingSort::Newest => "l.created_at DESC",
    }
}

impl EconomyStore for PgEconomyStore {
    type Tx = PgEconomyTx;

    async fn begin(&self) -> EconomyResult<PgEconomyTx> {
        let tx = self.pool.begin().await?;
        Ok(PgEconomyTx { tx })
    }

    async fn find_wallet(&self, user_id: &UserId) -> EconomyResult<Option<Wallet>> {
        let sql = format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1");
        let row = sqlx::query_as::<_, WalletRow>(&sql)
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(WalletRow::into_wallet))
    }

    async fn find_character(&self, character_id: &CharacterId) -> EconomyResult<Option<Character>> {
        let sql = format!("SELECT {CHARACTER_COLUMNS} FROM characters WHERE character_id = $1");
        let row = sqlx::query_as::<_, CharacterRow>(&sql)
            .bind(character_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(CharacterRow::into_character))
    }

    async fn find_listing(&self, listing_id: &ListingId) -> EconomyResult<Option<Listing>> {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM character_listings l WHERE l.listing_id = $1");
        let row = sqlx::query_as::<_, ListingRow>(&sql)
            .bind(listing_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_listing()).transpose()
    }

    async fn browse_listings(&self, query: &ListingQuery) -> EconomyResult<ListingPage> {
        let pattern = query.search_term().map(|term| like_pattern(&term));

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)::BIGINT
            FROM character_listings l
            JOIN characters c ON c.character_id = l.character_id
            WHERE l.status = $1 AND ($2::TEXT IS NULL OR c.name ILIKE $2)
            "#,
        )
        .bind(ListingStatus::Active.id())
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {LISTING_COLUMNS}, c.name AS character_name, c.avatar AS character_avatar \
             FROM character_listings l \
             JOIN characters c ON c.character_id = l.character_id \
             WHERE l.status = $1 AND ($2::TEXT IS NULL OR c.name ILIKE $2) \
             ORDER BY {} \
             LIMIT $3 OFFSET $4",
            order_by(query.sort)
        );
        let rows = sqlx::query_as::<_, ListingViewRow>(&sql)
            .bind(ListingStatus::Active.id())
            .bind(&pattern)
            .bind(i64::from(query.page_size))
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .into_iter()
            .map(ListingViewRow::into_view)
            .collect::<EconomyResult<Vec<_>>>()?;

        Ok(ListingPage {
            items,
            total,
            page: query.page,
            page_size: query.page_size,
        })
    }

    async fn listings_by_seller(&self, seller_id: &UserId) -> EconomyResult<Vec<ListingView>> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS}, c.name AS character_name, c.avatar AS character_avatar \
             FROM character_listings l \
             JOIN characters c ON c.character_id = l.character_id \
             WHERE l.seller_id = $1 \
             ORDER BY l.created_at DESC"
        );
        let rows = sqlx::query_as::<_, ListingViewRow>(&sql)
            .bind(seller_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ListingViewRow::into_view).collect()
    }

    async fn purchases_by_buyer(&self, buyer_id: &UserId) -> EconomyResult<Vec<Purchase>> {
        let sql = format!(
            "SELECT {PURCHASE_COLUMNS} FROM listing_purchases \
             WHERE buyer_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, PurchaseRow>(&sql)
            .bind(buyer_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(PurchaseRow::into_purchase).collect())
    }

    async fn seller_earnings(&self, seller_id: &UserId) -> EconomyResult<EarningsSummary> {
        let (total_sales, total_earnings, unique_characters): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*)::BIGINT,
                COALESCE(SUM(seller_earnings), 0)::BIGINT,
                COUNT(DISTINCT character_id)::BIGINT
            FROM listing_purchases
            WHERE seller_id = $1
            "#,
        )
        .bind(seller_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(EarningsSummary {
            total_sales,
            total_earnings,
            unique_characters,
        })
    }

    async fn reviews_for_listing(&self, listing_id: &ListingId) -> EconomyResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT review_id, listing_id, reviewer_id, rating, comment, created_at
            FROM listing_reviews
            WHERE listing_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(listing_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ReviewRow::into_review).collect()
    }

    async fn find_affinity(
        &self,
        user_id: &UserId,
        character_id: &CharacterId,
    ) -> EconomyResult<Option<AffinityRecord>> {
        let sql = format!(
            "SELECT {AFFINITY_COLUMNS} FROM user_affinity WHERE user_id = $1 AND character_id = $2"
        );
        let row = sqlx::query_as::<_, AffinityRow>(&sql)
            .bind(user_id.as_uuid())
            .bind(character_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(AffinityRow::into_record).transpose()
    }

    async fn affinity_log(
        &self,
        user_id: &UserId,
        character_id: &CharacterId,
        limit: i64,
    ) -> EconomyResult<Vec<AffinityLogEntry>> {
        let rows = sqlx::query_as::<_, AffinityLogRow>(
            r#"
            SELECT log_id, user_id, character_id, change_type, change_value,
                   before_value, after_value, reason, created_at
            FROM affinity_logs
            WHERE user_id = $1 AND character_id = $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(character_id.as_uuid())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AffinityLogRow::into_entry).collect()
    }

    async fn spend_records(
        &self,
        user_id: &UserId,
        channel: Option<SpendChannel>,
        limit: i64,
    ) -> EconomyResult<Vec<SpendRecord>> {
        let sql = format!(
            "SELECT {SPEND_COLUMNS} FROM spend_records \
             WHERE user_id = $1 AND ($2::SMALLINT IS NULL OR channel = $2) \
             ORDER BY created_at DESC \
             LIMIT $3"
        );
        let rows = sqlx::query_as::<_, SpendRow>(&sql)
            .bind(user_id.as_uuid())
            .bind(channel.map(|c| c.id()))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(SpendRow::into_record).collect()
    }

    async fn vip_purchases(&self, user_id: &UserId, limit: i64) -> EconomyResult<Vec<VipPurchase>> {
        let sql = format!(
            "SELECT {VIP_COLUMNS} FROM vip_purchases \
             WHERE user_id = $1 \
             ORDER BY created_at DESC \
             LIMIT $2"
        );
        let rows = sqlx::query_as::<_, VipPurchaseRow>(&sql)
            .bind(user_id.as_uuid())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(VipPurchaseRow::into_purchase).collect()
    }

    async fn find_invite_code_by_code(&self, code: &str) -> EconomyResult<Option<InviteCode>> {
        let sql = format!("SELECT {INVITE_CODE_COLUMNS} FROM invite_codes WHERE code = $1");
        let row = sqlx::query_as::<_, InviteCodeRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(InviteCodeRow::into_code))
    }

    async fn invites_by_inviter(
        &self,
        inviter_id: &UserId,
        limit: i64,
    ) -> EconomyResult<Vec<InviteRecord>> {
        let sql = format!(
            "SELECT {INVITE_RECORD_COLUMNS} FROM invite_records \
             WHERE inviter_id = $1 \
             ORDER BY created_at DESC \
             LIMIT $2"
        );
        let rows = sqlx::query_as::<_, InviteRecordRow>(&sql)
            .bind(inviter_id.as_uuid())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(InviteRecordRow::into_record).collect())
    }
}

// ============================================================================
// Row types
// ============================================================================

fn corrupt(what: &str, value: impl std::fmt::Display) -> EconomyError {
    EconomyError::Internal(format!("Invalid {what} in store: {value}"))
}

#[derive(sqlx::FromRow)]
struct WalletRow {
    user_id: Uuid,
    points: i64,
    coins: i64,
    total_points_earned: i64,
    total_coins_earned: i64,
    total_coins_spent: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WalletRow {
    fn into_wallet(self) -> Wallet {
        Wallet {
            user_id: UserId::from_uuid(self.user_id),
            points: self.points,
            coins: self.coins,
            total_points_earned: self.total_points_earned,
            total_coins_earned: self.total_coins_earned,
            total_coins_spent: self.total_coins_spent,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CharacterRow {
    character_id: Uuid,
    owner_id: Uuid,
    name: String,
    avatar: Option<String>,
    description: String,
    personality: String,
    category: String,
    source_character_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl CharacterRow {
    fn into_character(self) -> Character {
        Character {
            id: CharacterId::from_uuid(self.character_id),
            owner_id: UserId::from_uuid(self.owner_id),
            name: self.name,
            avatar: self.avatar,
            description: self.description,
            personality: self.personality,
            category: self.category,
            source_character_id: self.source_character_id.map(CharacterId::from_uuid),
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ListingRow {
    listing_id: Uuid,
    character_id: Uuid,
    seller_id: Uuid,
    price: i64,
    description: String,
    status: i16,
    sales_count: i64,
    total_revenue: i64,
    rating: f64,
    review_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ListingRow {
    fn into_listing(self) -> EconomyResult<Listing> {
        let status =
            ListingStatus::from_id(self.status).ok_or_else(|| corrupt("listing status", self.status))?;

        Ok(Listing {
            id: ListingId::from_uuid(self.listing_id),
            character_id: CharacterId::from_uuid(self.character_id),
            seller_id: UserId::from_uuid(self.seller_id),
            price: self.price,
            description: self.description,
            status,
            sales_count: self.sales_count,
            total_revenue: self.total_revenue,
            rating: self.rating,
            review_count: self.review_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ListingViewRow {
    #[sqlx(flatten)]
    listing: ListingRow,
    character_name: String,
    character_avatar: Option<String>,
}

impl ListingViewRow {
    fn into_view(self) -> EconomyResult<ListingView> {
        Ok(ListingView {
            listing: self.listing.into_listing()?,
            character_name: self.character_name,
            character_avatar: self.character_avatar,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PurchaseRow {
    purchase_id: Uuid,
    listing_id: Uuid,
    character_id: Uuid,
    buyer_id: Uuid,
    seller_id: Uuid,
    price: i64,
    platform_fee: i64,
    seller_earnings: i64,
    cloned_character_id: Uuid,
    created_at: DateTime<Utc>,
}

impl PurchaseRow {
    fn into_purchase(self) -> Purchase {
        Purchase {
            id: PurchaseId::from_uuid(self.purchase_id),
            listing_id: ListingId::from_uuid(self.listing_id),
            character_id: CharacterId::from_uuid(self.character_id),
            buyer_id: UserId::from_uuid(self.buyer_id),
            seller_id: UserId::from_uuid(self.seller_id),
            price: self.price,
            platform_fee: self.platform_fee,
            seller_earnings: self.seller_earnings,
            cloned_character_id: CharacterId::from_uuid(self.cloned_character_id),
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    review_id: Uuid,
    listing_id: Uuid,
    reviewer_id: Uuid,
    rating: i16,
    comment: String,
    created_at: DateTime<Utc>,
}

impl ReviewRow {
    fn into_review(self) -> EconomyResult<Review> {
        let rating = Rating::new(self.rating).map_err(|_| corrupt("rating", self.rating))?;
        Ok(Review {
            id: ReviewId::from_uuid(self.review_id),
            listing_id: ListingId::from_uuid(self.listing_id),
            reviewer_id: UserId::from_uuid(self.reviewer_id),
            rating,
            comment: self.comment,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AffinityRow {
    user_id: Uuid,
    character_id: Uuid,
    affinity_value: i32,
    affinity_level: i16,
    total_interactions: i64,
    daily_interactions: i32,
    streak_days: i32,
    last_interaction_on: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AffinityRow {
    fn into_record(self) -> EconomyResult<AffinityRecord> {
        let level = AffinityLevel::from_id(self.affinity_level)
            .ok_or_else(|| corrupt("affinity level", self.affinity_level))?;

        Ok(AffinityRecord {
            user_id: UserId::from_uuid(self.user_id),
            character_id: CharacterId::from_uuid(self.character_id),
            value: self.affinity_value,
            level,
            total_interactions: self.total_interactions,
            daily_interactions: self.daily_interactions,
            streak_days: self.streak_days,
            last_interaction_on: self.last_interaction_on,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AffinityLogRow {
    log_id: Uuid,
    user_id: Uuid,
    character_id: Uuid,
    change_type: i16,
    change_value: i32,
    before_value: i32,
    after_value: i32,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl AffinityLogRow {
    fn into_entry(self) -> EconomyResult<AffinityLogEntry> {
        let change_type = AffinityChangeType::from_id(self.change_type)
            .ok_or_else(|| corrupt("affinity change type", self.change_type))?;

        Ok(AffinityLogEntry {
            id: AffinityLogId::from_uuid(self.log_id),
            user_id: UserId::from_uuid(self.user_id),
            character_id: CharacterId::from_uuid(self.character_id),
            change_type,
            change_value: self.change_value,
            before_value: self.before_value,
            after_value: self.after_value,
            reason: self.reason,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SpendRow {
    record_id: Uuid,
    user_id: Uuid,
    character_id: Uuid,
    channel: i16,
    gift_id: Option<i64>,
    quantity: i64,
    coins_spent: i64,
    affinity_gained: i32,
    message: Option<String>,
    created_at: DateTime<Utc>,
}

impl SpendRow {
    fn into_record(self) -> EconomyResult<SpendRecord> {
        let channel =
            SpendChannel::from_id(self.channel).ok_or_else(|| corrupt("spend channel", self.channel))?;

        Ok(SpendRecord {
            id: SpendRecordId::from_uuid(self.record_id),
            user_id: UserId::from_uuid(self.user_id),
            character_id: CharacterId::from_uuid(self.character_id),
            channel,
            gift_id: self.gift_id,
            quantity: self.quantity,
            coins_spent: self.coins_spent,
            affinity_gained: self.affinity_gained,
            message: self.message,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CheckInRow {
    check_in_id: Uuid,
    user_id: Uuid,
    check_in_date: NaiveDate,
    consecutive_days: i32,
    points_earned: i64,
    created_at: DateTime<Utc>,
}

impl CheckInRow {
    fn into_record(self) -> CheckInRecord {
        CheckInRecord {
            id: CheckInId::from_uuid(self.check_in_id),
            user_id: UserId::from_uuid(self.user_id),
            check_in_date: self.check_in_date,
            consecutive_days: self.consecutive_days,
            points_earned: self.points_earned,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReceiptRow {
    user_id: Uuid,
    idempotency_key: String,
    operation: String,
    fingerprint: String,
    outcome: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl ReceiptRow {
    fn into_receipt(self) -> EconomyResult<Receipt> {
        let key = IdempotencyKey::new(self.idempotency_key)
            .map_err(|_| corrupt("idempotency key", &self.operation))?;

        Ok(Receipt {
            user_id: UserId::from_uuid(self.user_id),
            key,
            operation: self.operation,
            fingerprint: self.fingerprint,
            outcome: self.outcome,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct VipPurchaseRow {
    purchase_id: Uuid,
    user_id: Uuid,
    level: i16,
    duration: i16,
    price: i64,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl VipPurchaseRow {
    fn into_purchase(self) -> EconomyResult<VipPurchase> {
        let level = VipLevel::from_id(self.level).ok_or_else(|| corrupt("vip level", self.level))?;
        let duration =
            VipDuration::from_id(self.duration).ok_or_else(|| corrupt("vip duration", self.duration))?;

        Ok(VipPurchase {
            id: VipPurchaseId::from_uuid(self.purchase_id),
            user_id: UserId::from_uuid(self.user_id),
            level,
            duration,
            price: self.price,
            expires_at: self.expires_at,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InviteCodeRow {
    user_id: Uuid,
    code: String,
    invite_count: i32,
    total_reward_points: i64,
    active: bool,
    created_at: DateTime<Utc>,
}

impl InviteCodeRow {
    fn into_code(self) -> InviteCode {
        InviteCode {
            user_id: UserId::from_uuid(self.user_id),
            code: self.code,
            invite_count: self.invite_count,
            total_reward_points: self.total_reward_points,
            active: self.active,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct InviteRecordRow {
    record_id: Uuid,
    inviter_id: Uuid,
    invitee_id: Uuid,
    code: String,
    inviter_points: i64,
    invitee_points: i64,
    created_at: DateTime<Utc>,
}

impl InviteRecordRow {
    fn into_record(self) -> InviteRecord {
        InviteRecord {
            id: InviteRecordId::from_uuid(self.record_id),
            inviter_id: UserId::from_uuid(self.inviter_id),
            invitee_id: UserId::from_uuid(self.invitee_id),
            code: self.code,
            inviter_points: self.inviter_points,
            invitee_points: self.invitee_points,
            created_at: self.created_at,
        }
    }
}
