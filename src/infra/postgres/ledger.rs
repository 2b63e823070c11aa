//! PostgreSQL-backed ledger store
//!
//! Payment records, wallet balances, wallet ledger entries, subscriptions,
//! and profile lookups. Concurrency control is entirely conditional writes:
//! the terminal-status transition refuses rows that are already completed,
//! and the wallet ledger insert is guarded by a unique index on the provider
//! reference.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::domain::{
    PaymentRecord, PaymentStatus, SubscriptionRecord, Tier, TxRef, UserId, WalletTransaction,
    WalletTxType,
};
use crate::infra::{LedgerStore, Result, SettlementError};

/// Database row for payment records
#[derive(sqlx::FromRow)]
struct PaymentRow {
    tx_ref: String,
    user_id: Uuid,
    amount: i64,
    currency: String,
    method: String,
    tier: String,
    status: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Database row for wallet ledger entries
#[derive(sqlx::FromRow)]
struct WalletTxRow {
    id: Uuid,
    user_id: Uuid,
    tx_type: String,
    gross_amount: i64,
    fee: i64,
    net_amount: i64,
    currency: String,
    status: String,
    provider_ref: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

/// Database row for subscriptions
#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: Uuid,
    tier: String,
    active: bool,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

/// PostgreSQL-backed implementation of [`LedgerStore`]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_payment(row: PaymentRow) -> Result<PaymentRecord> {
        Ok(PaymentRecord {
            tx_ref: TxRef(row.tx_ref),
            user_id: UserId::from_uuid(row.user_id),
            amount: row.amount,
            currency: row.currency,
            method: row.method,
            tier: row
                .tier
                .parse::<Tier>()
                .map_err(SettlementError::Internal)?,
            status: row
                .status
                .parse::<PaymentStatus>()
                .map_err(SettlementError::Internal)?,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn row_to_wallet_tx(row: WalletTxRow) -> Result<WalletTransaction> {
        Ok(WalletTransaction {
            id: row.id,
            user_id: UserId::from_uuid(row.user_id),
            tx_type: row
                .tx_type
                .parse::<WalletTxType>()
                .map_err(SettlementError::Internal)?,
            gross_amount: row.gross_amount,
            fee: row.fee,
            net_amount: row.net_amount,
            currency: row.currency,
            status: row.status,
            provider_ref: row.provider_ref.map(TxRef),
            metadata: row.metadata,
            created_at: row.created_at,
        })
    }

    fn row_to_subscription(row: SubscriptionRow) -> Result<SubscriptionRecord> {
        Ok(SubscriptionRecord {
            id: row.id,
            user_id: UserId::from_uuid(row.user_id),
            tier: row
                .tier
                .parse::<Tier>()
                .map_err(SettlementError::Internal)?,
            active: row.active,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
        })
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn insert_payment(&self, record: &PaymentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                tx_ref, user_id, amount, currency, method, tier, status,
                metadata, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.tx_ref.as_str())
        .bind(record.user_id.0)
        .bind(record.amount)
        .bind(&record.currency)
        .bind(&record.method)
        .bind(record.tier.as_str())
        .bind(record.status.as_str())
        .bind(&record.metadata)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_payment(&self, tx_ref: &TxRef) -> Result<Option<PaymentRecord>> {
        let row: Option<PaymentRow> = sqlx::query_as(
            r#"
            SELECT * FROM payments WHERE tx_ref = $1
            "#,
        )
        .bind(tx_ref.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn list_payments(&self, user_id: &UserId, limit: u32) -> Result<Vec<PaymentRecord>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            r#"
            SELECT * FROM payments
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }

    async fn complete_payment(
        &self,
        tx_ref: &TxRef,
        metadata: serde_json::Value,
    ) -> Result<bool> {
        // The sole serialization point: only one caller can move a row out of
        // pending into completed.
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'completed', metadata = metadata || $2, updated_at = NOW()
            WHERE tx_ref = $1 AND status <> 'completed'
            "#,
        )
        .bind(tx_ref.as_str())
        .bind(metadata)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn fail_payment(&self, tx_ref: &TxRef, reason: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'failed',
                metadata = metadata || jsonb_build_object('failure_reason', $2::text, 'failed_at', NOW()),
                updated_at = NOW()
            WHERE tx_ref = $1 AND status <> 'completed'
            "#,
        )
        .bind(tx_ref.as_str())
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn wallet_transaction_exists(&self, tx_ref: &TxRef) -> Result<bool> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM wallet_transactions WHERE provider_ref = $1
            "#,
        )
        .bind(tx_ref.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn credit_wallet(&self, entry: &WalletTransaction) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // The unique index on (tx_type, provider_ref) is the exactly-once
        // authority; a duplicate insert affects zero rows and the balance is
        // left untouched.
        let inserted = sqlx::query(
            r#"
            INSERT INTO wallet_transactions (
                id, user_id, tx_type, gross_amount, fee, net_amount,
                currency, status, provider_ref, metadata, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (tx_type, provider_ref) WHERE provider_ref IS NOT NULL
            DO NOTHING
            "#,
        )
        .bind(entry.id)
        .bind(entry.user_id.0)
        .bind(entry.tx_type.as_str())
        .bind(entry.gross_amount)
        .bind(entry.fee)
        .bind(entry.net_amount)
        .bind(&entry.currency)
        .bind(&entry.status)
        .bind(entry.provider_ref.as_ref().map(|r| r.as_str().to_string()))
        .bind(&entry.metadata)
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, wallet_balance, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET wallet_balance = profiles.wallet_balance + EXCLUDED.wallet_balance,
                          updated_at = NOW()
            "#,
        )
        .bind(entry.user_id.0)
        .bind(entry.net_amount)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn wallet_balance(&self, user_id: &UserId) -> Result<i64> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT wallet_balance FROM profiles WHERE user_id = $1
            "#,
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(b,)| b).unwrap_or(0))
    }

    async fn list_wallet_transactions(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<WalletTransaction>> {
        let rows: Vec<WalletTxRow> = sqlx::query_as(
            r#"
            SELECT * FROM wallet_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_wallet_tx).collect()
    }

    async fn activate_subscription(&self, sub: &SubscriptionRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Update-in-place supersedes the active row; inserting a second
        // active row per user is rejected by the partial unique index.
        let updated = sqlx::query(
            r#"
            UPDATE subscriptions
            SET tier = $2, starts_at = $3, ends_at = $4
            WHERE user_id = $1 AND active
            "#,
        )
        .bind(sub.user_id.0)
        .bind(sub.tier.as_str())
        .bind(sub.starts_at)
        .bind(sub.ends_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            sqlx::query(
                r#"
                INSERT INTO subscriptions (id, user_id, tier, active, starts_at, ends_at)
                VALUES ($1, $2, $3, TRUE, $4, $5)
                "#,
            )
            .bind(sub.id)
            .bind(sub.user_id.0)
            .bind(sub.tier.as_str())
            .bind(sub.starts_at)
            .bind(sub.ends_at)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, wallet_balance, tier, updated_at)
            VALUES ($1, 0, $2, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET tier = EXCLUDED.tier, updated_at = NOW()
            "#,
        )
        .bind(sub.user_id.0)
        .bind(sub.tier.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_subscription(&self, user_id: &UserId) -> Result<Option<SubscriptionRecord>> {
        let row: Option<SubscriptionRow> = sqlx::query_as(
            r#"
            SELECT * FROM subscriptions WHERE user_id = $1 AND active
            "#,
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_subscription).transpose()
    }

    async fn has_role(&self, user_id: &UserId, role: &str) -> Result<bool> {
        let row: Option<(Option<String>,)> = sqlx::query_as(
            r#"
            SELECT role FROM profiles WHERE user_id = $1
            "#,
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .and_then(|(r,)| r)
            .map(|r| r == role)
            .unwrap_or(false))
    }
}
