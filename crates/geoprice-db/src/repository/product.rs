//! # Product Repository
//!
//! Catalog rows and their per-product price meta.
//!
//! ## Key Operations
//! - Paging the sellable catalog for the batch job
//! - Loading everything the pricing core needs for one product
//! - Executing a backfill plan atomically
//!
//! ## Write Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  WriteMode::Overwrite (admin value)                                     │
//! │    INSERT ... ON CONFLICT (product_id, meta_key) DO UPDATE              │
//! │                                                                         │
//! │  WriteMode::IfAbsent (auto-converted value)                             │
//! │    SELECT the stored value; upsert only if it is missing, blank or      │
//! │    not a number (the same rule the loader uses to ignore it)            │
//! │                                                                         │
//! │  Check and write share the transaction. A run that loses a race to      │
//! │  another writer gets SQLITE_BUSY_SNAPSHOT and retries the product.      │
//! │                                                                         │
//! │  One transaction per product: a crash mid-plan leaves the product       │
//! │  untouched and without prices_ready, so the next run redoes it.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqlitePool};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use geoprice_core::{BackfillPlan, NativePrices, ProductPrices, WriteMode, PRICES_READY_KEY};

/// Statuses the batch job and storefront treat as live.
pub const SELLABLE_STATUSES: [&str; 2] = ["publish", "private"];

/// Stored value of the ready flag.
const READY_VALUE: &str = "yes";

const UPSERT_META_SQL: &str = r#"
    INSERT INTO product_meta (product_id, meta_key, meta_value, updated_at)
    VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT (product_id, meta_key)
    DO UPDATE SET meta_value = excluded.meta_value, updated_at = excluded.updated_at
"#;

// =============================================================================
// Rows
// =============================================================================

/// One catalog row.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ProductRow {
    pub id: String,
    pub sku: Option<String>,
    pub name: String,
    pub status: String,
    pub regular_price: Option<String>,
    pub sale_price: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRow {
    /// Parses the native price columns.
    ///
    /// Blank or malformed amounts count as "no price", the same way the
    /// catalog treats an emptied price field.
    pub fn native_prices(&self) -> NativePrices {
        NativePrices::new(
            parse_amount(self.regular_price.as_deref()),
            parse_amount(self.sale_price.as_deref()),
        )
    }
}

/// Fields for inserting a catalog product.
#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub sku: Option<String>,
    pub name: String,
    pub status: String,
    pub regular_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
}

impl NewProduct {
    /// A published product with a regular price.
    pub fn published(name: impl Into<String>, regular_price: Decimal) -> Self {
        NewProduct {
            name: name.into(),
            status: "publish".to_string(),
            regular_price: Some(regular_price),
            ..NewProduct::default()
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn with_sale(mut self, sale_price: Decimal) -> Self {
        self.sale_price = Some(sale_price);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }
}

#[derive(Debug, FromRow)]
struct MetaRow {
    product_id: String,
    meta_key: String,
    meta_value: String,
}

fn parse_amount(raw: Option<&str>) -> Option<Decimal> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<Decimal>().ok())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog and price-meta operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let page = repo.load_page(0, 50).await?;
/// for product in &page {
///     let plan = converter.plan(product, &currencies, None);
///     repo.apply_plan(&plan).await?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Inserts a catalog product and returns it.
    pub async fn insert(&self, product: &NewProduct) -> DbResult<ProductRow> {
        let now = Utc::now();
        let row = ProductRow {
            id: Uuid::new_v4().to_string(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            status: product.status.clone(),
            regular_price: product.regular_price.map(|p| p.to_string()),
            sale_price: product.sale_price.map(|p| p.to_string()),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, status, regular_price, sale_price, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&row.id)
        .bind(&row.sku)
        .bind(&row.name)
        .bind(&row.status)
        .bind(&row.regular_price)
        .bind(&row.sale_price)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(product_id = %row.id, sku = ?row.sku, "Product inserted");
        Ok(row)
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ProductRow>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, sku, name, status, regular_price, sale_price, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Updates the native base prices.
    pub async fn update_base_prices(
        &self,
        id: &str,
        regular_price: Option<Decimal>,
        sale_price: Option<Decimal>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET regular_price = ?2, sale_price = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(regular_price.map(|p| p.to_string()))
        .bind(sale_price.map(|p| p.to_string()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Lists one page of sellable products in a stable order.
    pub async fn list_page(&self, offset: u32, limit: u32) -> DbResult<Vec<ProductRow>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, sku, name, status, regular_price, sale_price, created_at, updated_at
            FROM products
            WHERE status IN (?1, ?2)
            ORDER BY created_at, id
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(SELLABLE_STATUSES[0])
        .bind(SELLABLE_STATUSES[1])
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?;

        debug!(offset, limit, count = rows.len(), "Listed product page");
        Ok(rows)
    }

    /// Counts sellable products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE status IN (?1, ?2)")
                .bind(SELLABLE_STATUSES[0])
                .bind(SELLABLE_STATUSES[1])
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Counts sellable products the batch job has processed.
    pub async fn count_ready(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM products p
            INNER JOIN product_meta m ON m.product_id = p.id
            WHERE p.status IN (?1, ?2)
            AND m.meta_key = ?3
            AND m.meta_value = ?4
            "#,
        )
        .bind(SELLABLE_STATUSES[0])
        .bind(SELLABLE_STATUSES[1])
        .bind(PRICES_READY_KEY)
        .bind(READY_VALUE)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // =========================================================================
    // Price Loading
    // =========================================================================

    /// Loads everything the pricing core needs for one product.
    pub async fn load_prices(&self, id: &str) -> DbResult<Option<ProductPrices>> {
        let Some(row) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let meta = sqlx::query_as::<_, MetaRow>(
            "SELECT product_id, meta_key, meta_value FROM product_meta WHERE product_id = ?1",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut product = ProductPrices::new(row.id.clone(), row.native_prices());
        absorb_meta(&mut product, meta);
        Ok(Some(product))
    }

    /// Loads one page of sellable products with their meta.
    ///
    /// Two queries per page regardless of page size.
    pub async fn load_page(&self, offset: u32, limit: u32) -> DbResult<Vec<ProductPrices>> {
        let rows = self.list_page(offset, limit).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let meta = sqlx::query_as::<_, MetaRow>(
            r#"
            SELECT m.product_id, m.meta_key, m.meta_value
            FROM product_meta m
            INNER JOIN (
                SELECT id FROM products
                WHERE status IN (?1, ?2)
                ORDER BY created_at, id
                LIMIT ?3 OFFSET ?4
            ) page ON page.id = m.product_id
            "#,
        )
        .bind(SELLABLE_STATUSES[0])
        .bind(SELLABLE_STATUSES[1])
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?;

        let mut by_product: BTreeMap<String, Vec<MetaRow>> = BTreeMap::new();
        for m in meta {
            by_product.entry(m.product_id.clone()).or_default().push(m);
        }

        let products = rows
            .into_iter()
            .map(|row| {
                let mut product = ProductPrices::new(row.id.clone(), row.native_prices());
                if let Some(meta) = by_product.remove(&row.id) {
                    absorb_meta(&mut product, meta);
                }
                product
            })
            .collect();

        Ok(products)
    }

    // =========================================================================
    // Meta Writes
    // =========================================================================

    /// Reads one meta value.
    pub async fn get_meta(&self, product_id: &str, key: &str) -> DbResult<Option<String>> {
        let value: Option<String> = sqlx::query_scalar(
            "SELECT meta_value FROM product_meta WHERE product_id = ?1 AND meta_key = ?2",
        )
        .bind(product_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    /// Writes one meta value, replacing any existing value.
    pub async fn set_meta(&self, product_id: &str, key: &str, value: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO product_meta (product_id, meta_key, meta_value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (product_id, meta_key)
            DO UPDATE SET meta_value = excluded.meta_value, updated_at = excluded.updated_at
            "#,
        )
        .bind(product_id)
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Executes a backfill plan in one transaction.
    ///
    /// ## Returns
    /// Number of price fields actually written. `IfAbsent` writes that hit
    /// a usable stored amount do not count; blank or malformed stored
    /// values are replaced.
    pub async fn apply_plan(&self, plan: &BackfillPlan) -> DbResult<u64> {
        if plan.is_noop() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;

        for write in &plan.writes {
            if write.mode == WriteMode::IfAbsent {
                let stored: Option<String> = sqlx::query_scalar(
                    "SELECT meta_value FROM product_meta WHERE product_id = ?1 AND meta_key = ?2",
                )
                .bind(&plan.product_id)
                .bind(&write.key)
                .fetch_optional(&mut *tx)
                .await?;

                if parse_amount(stored.as_deref()).is_some() {
                    continue;
                }
            }

            let result = sqlx::query(UPSERT_META_SQL)
                .bind(&plan.product_id)
                .bind(&write.key)
                .bind(write.amount.to_string())
                .bind(now)
                .execute(&mut *tx)
                .await?;
            written += result.rows_affected();
        }

        if plan.mark_ready {
            sqlx::query(UPSERT_META_SQL)
                .bind(&plan.product_id)
                .bind(PRICES_READY_KEY)
                .bind(READY_VALUE)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!(
            product_id = %plan.product_id,
            planned = plan.writes.len(),
            written,
            ready = plan.mark_ready,
            "Backfill plan applied"
        );
        Ok(written)
    }
}

/// Folds meta rows into the core's product view.
fn absorb_meta(product: &mut ProductPrices, meta: Vec<MetaRow>) {
    for m in meta {
        if m.meta_key == PRICES_READY_KEY {
            product.prices_ready = m.meta_value == READY_VALUE;
            continue;
        }
        if !(m.meta_key.starts_with("regular_price_") || m.meta_key.starts_with("sale_price_")) {
            continue;
        }
        // Stored blank means "no value", same as a missing row
        match parse_amount(Some(&m.meta_value)) {
            Some(amount) => {
                product.meta.insert(m.meta_key, amount);
            }
            None if m.meta_value.trim().is_empty() => {}
            None => {
                warn!(
                    product_id = %m.product_id,
                    key = %m.meta_key,
                    value = %m.meta_value,
                    "Ignoring malformed price meta"
                );
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use geoprice_core::{CurrencyCode, FieldWrite, PriceKind};

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn plan(product_id: &str, writes: Vec<(&str, &str, WriteMode)>, ready: bool) -> BackfillPlan {
        BackfillPlan {
            product_id: product_id.to_string(),
            writes: writes
                .into_iter()
                .map(|(key, amount, mode)| FieldWrite {
                    key: key.to_string(),
                    amount: d(amount),
                    mode,
                })
                .collect(),
            mark_ready: ready,
            unrated: vec![],
        }
    }

    #[tokio::test]
    async fn test_insert_and_load_prices() {
        let db = db().await;
        let row = db
            .products()
            .insert(&NewProduct::published("Mug", d("12.50")).with_sale(d("10.00")))
            .await
            .unwrap();

        let product = db.products().load_prices(&row.id).await.unwrap().unwrap();
        assert_eq!(product.native.regular, Some(d("12.50")));
        assert_eq!(product.native.sale, Some(d("10.00")));
        assert_eq!(product.native.active, Some(d("10.00")));
        assert!(!product.prices_ready);

        assert!(db.products().load_prices("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_paging_skips_unsellable() {
        let db = db().await;
        let repo = db.products();
        for i in 0..5 {
            repo.insert(&NewProduct::published(format!("P{}", i), d("1"))).await.unwrap();
        }
        repo.insert(&NewProduct::published("Draft", d("1")).with_status("draft"))
            .await
            .unwrap();
        repo.insert(&NewProduct::published("Hidden", d("1")).with_status("private"))
            .await
            .unwrap();

        assert_eq!(repo.count().await.unwrap(), 6);
        assert_eq!(repo.load_page(0, 4).await.unwrap().len(), 4);
        assert_eq!(repo.load_page(4, 4).await.unwrap().len(), 2);
        assert!(repo.load_page(8, 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_if_absent_never_overwrites() {
        let db = db().await;
        let repo = db.products();
        let row = repo.insert(&NewProduct::published("Mug", d("10"))).await.unwrap();

        repo.set_meta(&row.id, "regular_price_EUR", "7.77").await.unwrap();

        let written = repo
            .apply_plan(&plan(
                &row.id,
                vec![
                    ("regular_price_EUR", "9.10", WriteMode::IfAbsent),
                    ("sale_price_EUR", "9.10", WriteMode::IfAbsent),
                ],
                true,
            ))
            .await
            .unwrap();
        assert_eq!(written, 1);

        let product = repo.load_prices(&row.id).await.unwrap().unwrap();
        let eur = CurrencyCode::new("EUR");
        assert_eq!(product.currency_price(PriceKind::Regular, &eur), Some(d("7.77")));
        assert_eq!(product.currency_price(PriceKind::Sale, &eur), Some(d("9.10")));
        assert!(product.prices_ready);
    }

    #[tokio::test]
    async fn test_overwrite_replaces() {
        let db = db().await;
        let repo = db.products();
        let row = repo.insert(&NewProduct::published("Mug", d("10"))).await.unwrap();
        repo.set_meta(&row.id, "regular_price_EUR", "9.10").await.unwrap();

        repo.apply_plan(&plan(
            &row.id,
            vec![("regular_price_EUR", "5.00", WriteMode::Overwrite)],
            false,
        ))
        .await
        .unwrap();

        assert_eq!(
            repo.get_meta(&row.id, "regular_price_EUR").await.unwrap().as_deref(),
            Some("5.00")
        );
        assert!(repo.get_meta(&row.id, PRICES_READY_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_count_ready() {
        let db = db().await;
        let repo = db.products();
        let a = repo.insert(&NewProduct::published("A", d("1"))).await.unwrap();
        repo.insert(&NewProduct::published("B", d("1"))).await.unwrap();

        repo.apply_plan(&plan(&a.id, vec![], true)).await.unwrap();
        assert_eq!(repo.count_ready().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_meta_for_missing_product_rejected() {
        let db = db().await;
        let err = db
            .products()
            .set_meta("ghost", "regular_price_EUR", "1")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_malformed_meta_ignored() {
        let db = db().await;
        let repo = db.products();
        let row = repo.insert(&NewProduct::published("Mug", d("10"))).await.unwrap();
        repo.set_meta(&row.id, "regular_price_EUR", "abc").await.unwrap();
        repo.set_meta(&row.id, "sale_price_EUR", "").await.unwrap();

        let product = repo.load_prices(&row.id).await.unwrap().unwrap();
        assert!(product.meta.is_empty());
    }

    #[tokio::test]
    async fn test_if_absent_replaces_blank_and_malformed() {
        let db = db().await;
        let repo = db.products();
        let row = repo.insert(&NewProduct::published("Mug", d("10"))).await.unwrap();
        repo.set_meta(&row.id, "regular_price_EUR", "  ").await.unwrap();
        repo.set_meta(&row.id, "sale_price_EUR", "abc").await.unwrap();
        repo.set_meta(&row.id, "regular_price_JPY", "1480").await.unwrap();

        let written = repo
            .apply_plan(&plan(
                &row.id,
                vec![
                    ("regular_price_EUR", "9.10", WriteMode::IfAbsent),
                    ("sale_price_EUR", "9.10", WriteMode::IfAbsent),
                    ("regular_price_JPY", "1500", WriteMode::IfAbsent),
                ],
                true,
            ))
            .await
            .unwrap();
        assert_eq!(written, 2);

        let product = repo.load_prices(&row.id).await.unwrap().unwrap();
        let eur = CurrencyCode::new("EUR");
        assert_eq!(product.currency_price(PriceKind::Regular, &eur), Some(d("9.10")));
        assert_eq!(product.currency_price(PriceKind::Sale, &eur), Some(d("9.10")));
        assert_eq!(
            product.currency_price(PriceKind::Regular, &CurrencyCode::new("JPY")),
            Some(d("1480"))
        );
    }

    #[tokio::test]
    async fn test_update_base_prices() {
        let db = db().await;
        let repo = db.products();
        let row = repo.insert(&NewProduct::published("Mug", d("10"))).await.unwrap();

        repo.update_base_prices(&row.id, Some(d("20")), None).await.unwrap();
        let product = repo.load_prices(&row.id).await.unwrap().unwrap();
        assert_eq!(product.native.regular, Some(d("20")));

        let err = repo.update_base_prices("ghost", None, None).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
