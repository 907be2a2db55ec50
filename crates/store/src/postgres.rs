//! PostgreSQL-backed store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BreakId, OrderId, ProductItemId, UserId};
use domain::{BreakStatus, LineItemKey, Order, ProductItem};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::store::MarketplaceStore;

/// PostgreSQL implementation of [`MarketplaceStore`].
///
/// Conditional mutations are single statements whose affected-row count
/// carries the race outcome; the per-spot reservation runs in a short
/// transaction so the quantity decrement and the ledger insert land
/// both-or-neither.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_item(row: PgRow) -> Result<ProductItem> {
        let status: String = row.try_get("status")?;
        let break_status: BreakStatus = status.parse()?;

        Ok(ProductItem {
            id: ProductItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            break_id: BreakId::from_uuid(row.try_get::<Uuid, _>("break_id")?),
            title: row.try_get("title")?,
            quantity: row.try_get("quantity")?,
            order_id: row
                .try_get::<Option<Uuid>, _>("order_id")?
                .map(OrderId::from_uuid),
            break_status,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }
}

#[async_trait]
impl MarketplaceStore for PostgresStore {
    async fn find_spots(&self, keys: &[LineItemKey]) -> Result<Vec<ProductItem>> {
        let product_ids: Vec<i64> = keys.iter().map(|k| k.product_id).collect();
        let variant_ids: Vec<i64> = keys.iter().map(|k| k.variant_id).collect();

        let rows = sqlx::query(
            r#"
            SELECT i.id, i.break_id, i.title, i.quantity, i.order_id, i.updated_at, b.status
            FROM break_product_items i
            JOIN breaks b ON b.id = i.break_id
            WHERE (i.bc_product_id, i.bc_variant_id) IN (
                SELECT product_id, variant_id
                FROM UNNEST($1::bigint[], $2::bigint[]) AS t (product_id, variant_id)
            )
            "#,
        )
        .bind(&product_ids)
        .bind(&variant_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn reserve_spots(
        &self,
        order_id: OrderId,
        user_id: &UserId,
        spot_ids: &[ProductItemId],
    ) -> Result<()> {
        for &spot_id in spot_ids {
            let mut tx = self.pool.begin().await?;

            let decremented = sqlx::query(
                r#"
                UPDATE break_product_items
                SET quantity = 0, updated_at = now()
                WHERE id = $1 AND quantity = 1 AND order_id IS NULL
                "#,
            )
            .bind(spot_id.as_uuid())
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if decremented == 0 {
                tx.rollback().await?;
                continue;
            }

            let inserted = sqlx::query(
                r#"
                INSERT INTO spot_reservations (product_item_id, order_id, user_id)
                VALUES ($1, $2, $3)
                ON CONFLICT (product_item_id) DO NOTHING
                "#,
            )
            .bind(spot_id.as_uuid())
            .bind(order_id.as_uuid())
            .bind(user_id.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if inserted == 0 {
                // Another saga already holds the ledger row; undo the
                // decrement by rolling back. The spot is lost, not stolen.
                tx.rollback().await?;
                continue;
            }

            tx.commit().await?;
        }
        Ok(())
    }

    async fn reserved_spots(&self, order_id: OrderId) -> Result<Vec<ProductItemId>> {
        let rows: Vec<Uuid> =
            sqlx::query_scalar("SELECT product_item_id FROM spot_reservations WHERE order_id = $1")
                .bind(order_id.as_uuid())
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(ProductItemId::from_uuid).collect())
    }

    async fn release_spots(&self, order_id: OrderId, spot_ids: &[ProductItemId]) -> Result<u64> {
        let ids: Vec<Uuid> = spot_ids.iter().map(|id| id.as_uuid()).collect();

        let mut tx = self.pool.begin().await?;

        let restored = sqlx::query(
            r#"
            UPDATE break_product_items
            SET quantity = 1, updated_at = now()
            WHERE id = ANY($1) AND quantity = 0 AND order_id IS NULL
              AND id IN (
                  SELECT product_item_id FROM spot_reservations WHERE order_id = $2
              )
            "#,
        )
        .bind(&ids)
        .bind(order_id.as_uuid())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM spot_reservations WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(restored)
    }

    async fn commit_order(&self, order: &Order, spot_ids: &[ProductItemId]) -> Result<()> {
        let ids: Vec<Uuid> = spot_ids.iter().map(|id| id.as_uuid()).collect();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, platform_order_id, payment_id,
                subtotal, tax_total, shipping_total, discount_total, grand_total,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_str())
        .bind(order.platform_order_id.as_i64())
        .bind(order.payment_id.as_ref().map(|id| id.as_str().to_string()))
        .bind(order.subtotal.cents())
        .bind(order.tax_total.cents())
        .bind(order.shipping_total.cents())
        .bind(order.discount_total.cents())
        .bind(order.grand_total.cents())
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        let finalized = sqlx::query(
            r#"
            UPDATE break_product_items
            SET order_id = $1, quantity = 0, updated_at = now()
            WHERE id = ANY($2) AND order_id IS NULL
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(&ids)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let expected = spot_ids.len() as u64;
        if finalized != expected {
            tx.rollback().await?;
            return Err(StoreError::RowCountMismatch {
                expected,
                affected: finalized,
            });
        }

        tx.commit().await?;
        Ok(())
    }

    async fn clear_reservations(&self, order_id: OrderId) -> Result<u64> {
        let removed = sqlx::query("DELETE FROM spot_reservations WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(removed)
    }

    async fn release_expired_reservations(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let reclaimed: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE break_product_items
            SET quantity = 1, updated_at = now()
            WHERE quantity = 0 AND order_id IS NULL AND updated_at < $1
            RETURNING id
            "#,
        )
        .bind(cutoff)
        .fetch_all(&mut *tx)
        .await?;

        // Stale ledger rows must go with the reclaimed quantity, or the
        // spot could never be reserved again.
        sqlx::query("DELETE FROM spot_reservations WHERE product_item_id = ANY($1)")
            .bind(&reclaimed)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(reclaimed.len() as u64)
    }

    async fn record_follows(&self, user_id: &UserId, break_ids: &[BreakId]) -> Result<()> {
        for &break_id in break_ids {
            sqlx::query(
                r#"
                INSERT INTO break_follows (user_id, break_id)
                VALUES ($1, $2)
                ON CONFLICT (user_id, break_id) DO NOTHING
                "#,
            )
            .bind(user_id.as_str())
            .bind(break_id.as_uuid())
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}
