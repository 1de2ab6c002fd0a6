//! PostgreSQL store backends
//!
//! Tables are created by [`crate::db::Database::ensure_schema`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::{
    Append, CartStore, ListingStore, Reservation, SaleLedger, SettlementKey, StoreError,
    UserStatsStore,
};
use crate::db::SafeRow;
use crate::market::{
    CartEntry, CartEntryId, Category, Identity, ItemSnapshot, Listing, ListingId, SaleId,
    SaleRecord, School, StatsDelta, UserId, UserStats,
};
use crate::money::{Price, coerce_decimal};

// ============================================================================
// Row mapping
// ============================================================================

fn item_from_row(row: &PgRow) -> Result<ItemSnapshot, StoreError> {
    let category: String = row.try_get("category")?;
    let category = category
        .parse::<Category>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let price: Decimal = row.try_get("price")?;
    let price = Price::new(price).map_err(|e| StoreError::Corrupt(e.to_string()))?;

    Ok(ItemSnapshot {
        name: row.try_get("name")?,
        category,
        price,
        description: row
            .try_get_log::<Option<String>>("description")
            .flatten()
            .unwrap_or_default(),
        picture: row.try_get_log::<Option<String>>("picture").flatten(),
    })
}

fn identity_from_row(row: &PgRow, prefix: &str) -> Result<Identity, StoreError> {
    let id: String = row.try_get(format!("{}_id", prefix).as_str())?;
    // SAFE_DEFAULT: legacy rows may lack display fields
    let name = row
        .try_get_log::<Option<String>>(format!("{}_name", prefix).as_str())
        .flatten()
        .unwrap_or_default();
    let email = row
        .try_get_log::<Option<String>>(format!("{}_email", prefix).as_str())
        .flatten()
        .unwrap_or_default();
    Ok(Identity::new(id, name, email))
}

fn school_from_row(row: &PgRow) -> School {
    row.try_get_log::<Option<String>>("school")
        .flatten()
        .map(School::new)
        .unwrap_or_default()
}

fn listing_from_row(row: &PgRow) -> Result<Listing, StoreError> {
    Ok(Listing {
        id: ListingId::new(row.try_get::<String, _>("listing_id")?),
        item: item_from_row(row)?,
        school: school_from_row(row),
        seller: identity_from_row(row, "seller")?,
        created_at: row.try_get("created_at")?,
    })
}

fn cart_entry_from_row(row: &PgRow) -> Result<CartEntry, StoreError> {
    Ok(CartEntry {
        id: CartEntryId::new(row.try_get::<String, _>("cart_id")?),
        listing_id: ListingId::new(row.try_get::<String, _>("listing_id")?),
        item: item_from_row(row)?,
        school: school_from_row(row),
        seller: identity_from_row(row, "seller")?,
        buyer_id: UserId::new(row.try_get::<String, _>("buyer_id")?),
        added_at: row.try_get("added_at")?,
    })
}

fn sale_from_row(row: &PgRow) -> Result<SaleRecord, StoreError> {
    Ok(SaleRecord {
        id: SaleId::new(row.try_get::<String, _>("sale_id")?),
        listing_id: ListingId::new(row.try_get::<String, _>("listing_id")?),
        item: item_from_row(row)?,
        seller: identity_from_row(row, "seller")?,
        buyer: identity_from_row(row, "buyer")?,
        school: school_from_row(row),
        sold_at: row.try_get("sold_at")?,
    })
}

/// Counters may be NULL on legacy rows; they read as zero
fn stats_from_row(row: &PgRow) -> Result<UserStats, StoreError> {
    Ok(UserStats {
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        items_sold: row.try_get::<Option<i64>, _>("items_sold")?.unwrap_or(0),
        items_bought: row.try_get::<Option<i64>, _>("items_bought")?.unwrap_or(0),
        total_money_made: coerce_decimal(
            row.try_get::<Option<String>, _>("total_money_made")?.as_deref(),
        ),
        total_money_spent: coerce_decimal(
            row.try_get::<Option<String>, _>("total_money_spent")?.as_deref(),
        ),
        member_since: row.try_get("member_since")?,
    })
}

const LISTING_COLUMNS: &str = "listing_id, name, category, price, description, picture, school, \
     seller_id, seller_name, seller_email, created_at";

const CART_COLUMNS: &str = "cart_id, listing_id, name, category, price, description, picture, \
     school, seller_id, seller_name, seller_email, buyer_id, added_at";

const SALE_COLUMNS: &str = "sale_id, listing_id, name, category, price, description, picture, \
     school, seller_id, seller_name, seller_email, buyer_id, buyer_name, buyer_email, sold_at";

/// Totals are read as text and coerced: a pre-existing table may keep them
/// as free text, and rows inserted outside `apply` may leave them NULL.
const STATS_COLUMNS: &str = "user_id, name, email, items_sold, items_bought, \
     total_money_made::TEXT AS total_money_made, \
     total_money_spent::TEXT AS total_money_spent, member_since";

// ============================================================================
// Listings
// ============================================================================

pub struct PgListingStore {
    pool: PgPool,
}

impl PgListingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, sql: &str, binds: &[&str]) -> Result<Vec<Listing>, StoreError> {
        let mut query = sqlx::query(sql);
        for b in binds {
            query = query.bind(*b);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(listing_from_row).collect()
    }
}

#[async_trait]
impl ListingStore for PgListingStore {
    async fn insert(&self, listing: &Listing) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO listings_tb
                (listing_id, name, category, price, description, picture, school,
                 seller_id, seller_name, seller_email, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(listing.id.as_str())
        .bind(&listing.item.name)
        .bind(listing.item.category.as_str())
        .bind(listing.item.price.inner())
        .bind(&listing.item.description)
        .bind(&listing.item.picture)
        .bind(listing.school.as_str())
        .bind(listing.seller.id.as_str())
        .bind(&listing.seller.name)
        .bind(&listing.seller.email)
        .bind(listing.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &ListingId) -> Result<Option<Listing>, StoreError> {
        let sql = format!(
            "SELECT {} FROM listings_tb WHERE listing_id = $1",
            LISTING_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(listing_from_row).transpose()
    }

    async fn delete_by_id(&self, id: &ListingId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM listings_tb WHERE listing_id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn query_by_category(
        &self,
        category: Category,
        schools: &[School],
    ) -> Result<Vec<Listing>, StoreError> {
        if schools.is_empty() {
            let sql = format!(
                "SELECT {} FROM listings_tb WHERE category = $1 ORDER BY created_at DESC",
                LISTING_COLUMNS
            );
            return self.fetch(&sql, &[category.as_str()]).await;
        }

        let sql = format!(
            "SELECT {} FROM listings_tb WHERE category = $1 AND school = ANY($2) \
             ORDER BY created_at DESC",
            LISTING_COLUMNS
        );
        let names: Vec<String> = schools.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query(&sql)
            .bind(category.as_str())
            .bind(&names)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(listing_from_row).collect()
    }

    async fn query_all(&self) -> Result<Vec<Listing>, StoreError> {
        let sql = format!(
            "SELECT {} FROM listings_tb ORDER BY created_at DESC",
            LISTING_COLUMNS
        );
        self.fetch(&sql, &[]).await
    }

    async fn query_by_seller(&self, seller_id: &UserId) -> Result<Vec<Listing>, StoreError> {
        let sql = format!(
            "SELECT {} FROM listings_tb WHERE seller_id = $1 ORDER BY created_at DESC",
            LISTING_COLUMNS
        );
        self.fetch(&sql, &[seller_id.as_str()]).await
    }
}

// ============================================================================
// Carts
// ============================================================================

pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn insert(&self, entry: &CartEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO cart_items_tb
                (cart_id, listing_id, name, category, price, description, picture, school,
                 seller_id, seller_name, seller_email, buyer_id, added_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(entry.id.as_str())
        .bind(entry.listing_id.as_str())
        .bind(&entry.item.name)
        .bind(entry.item.category.as_str())
        .bind(entry.item.price.inner())
        .bind(&entry.item.description)
        .bind(&entry.item.picture)
        .bind(entry.school.as_str())
        .bind(entry.seller.id.as_str())
        .bind(&entry.seller.name)
        .bind(&entry.seller.email)
        .bind(entry.buyer_id.as_str())
        .bind(entry.added_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &CartEntryId) -> Result<Option<CartEntry>, StoreError> {
        let sql = format!("SELECT {} FROM cart_items_tb WHERE cart_id = $1", CART_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(cart_entry_from_row).transpose()
    }

    async fn delete_by_id(&self, id: &CartEntryId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM cart_items_tb WHERE cart_id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_listing_id(&self, listing_id: &ListingId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM cart_items_tb WHERE listing_id = $1")
            .bind(listing_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn query_by_buyer(&self, buyer_id: &UserId) -> Result<Vec<CartEntry>, StoreError> {
        let sql = format!(
            "SELECT {} FROM cart_items_tb WHERE buyer_id = $1 ORDER BY added_at ASC",
            CART_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(buyer_id.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(cart_entry_from_row).collect()
    }
}

// ============================================================================
// Sale ledger
// ============================================================================

pub struct PgSaleLedger {
    pool: PgPool,
}

impl PgSaleLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SaleLedger for PgSaleLedger {
    async fn reserve(&self, key: &SettlementKey) -> Result<Reservation, StoreError> {
        let candidate = SaleId::generate();

        // The primary key on listing_id makes the first writer win
        let inserted = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO settlements_tb (listing_id, buyer_id, sale_id, reserved_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (listing_id) DO NOTHING
            RETURNING sale_id
            "#,
        )
        .bind(key.listing_id.as_str())
        .bind(key.buyer_id.as_str())
        .bind(candidate.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_some() {
            return Ok(Reservation::Granted(candidate));
        }

        let row = sqlx::query("SELECT buyer_id, sale_id FROM settlements_tb WHERE listing_id = $1")
            .bind(key.listing_id.as_str())
            .fetch_one(&self.pool)
            .await?;
        let holder = UserId::new(row.try_get::<String, _>("buyer_id")?);
        let sale_id = SaleId::new(row.try_get::<String, _>("sale_id")?);

        if holder == key.buyer_id {
            Ok(Reservation::Duplicate(sale_id))
        } else {
            Ok(Reservation::SoldToOther(holder))
        }
    }

    async fn insert(&self, record: &SaleRecord) -> Result<Append, StoreError> {
        let inserted = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO sales_tb
                (sale_id, listing_id, name, category, price, description, picture, school,
                 seller_id, seller_name, seller_email, buyer_id, buyer_name, buyer_email, sold_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (listing_id) DO NOTHING
            RETURNING sale_id
            "#,
        )
        .bind(record.id.as_str())
        .bind(record.listing_id.as_str())
        .bind(&record.item.name)
        .bind(record.item.category.as_str())
        .bind(record.item.price.inner())
        .bind(&record.item.description)
        .bind(&record.item.picture)
        .bind(record.school.as_str())
        .bind(record.seller.id.as_str())
        .bind(&record.seller.name)
        .bind(&record.seller.email)
        .bind(record.buyer.id.as_str())
        .bind(&record.buyer.name)
        .bind(&record.buyer.email)
        .bind(record.sold_at)
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_some() {
            return Ok(Append::Inserted);
        }

        let existing =
            sqlx::query_scalar::<_, String>("SELECT sale_id FROM sales_tb WHERE listing_id = $1")
                .bind(record.listing_id.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(Append::AlreadyRecorded(SaleId::new(existing)))
    }

    async fn query_by_buyer(&self, buyer_id: &UserId) -> Result<Vec<SaleRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM sales_tb WHERE buyer_id = $1 ORDER BY sold_at DESC",
            SALE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(buyer_id.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(sale_from_row).collect()
    }

    async fn query_by_seller(&self, seller_id: &UserId) -> Result<Vec<SaleRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM sales_tb WHERE seller_id = $1 ORDER BY sold_at DESC",
            SALE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(seller_id.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(sale_from_row).collect()
    }
}

// ============================================================================
// User stats
// ============================================================================

pub struct PgUserStatsStore {
    pool: PgPool,
}

impl PgUserStatsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStatsStore for PgUserStatsStore {
    async fn select_by_user_id(&self, user_id: &UserId) -> Result<Option<UserStats>, StoreError> {
        let sql = format!("SELECT {} FROM user_stats_tb WHERE user_id = $1", STATS_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(stats_from_row).transpose()
    }

    async fn insert(&self, row: &UserStats) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_stats_tb
                (user_id, name, email, items_sold, items_bought,
                 total_money_made, total_money_spent, member_since)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(row.user_id.as_str())
        .bind(&row.name)
        .bind(&row.email)
        .bind(row.items_sold)
        .bind(row.items_bought)
        .bind(row.total_money_made)
        .bind(row.total_money_spent)
        .bind(row.member_since)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn apply(&self, identity: &Identity, delta: StatsDelta) -> Result<UserStats, StoreError> {
        // Single-statement increment: concurrent settlements for the same
        // user serialize on the row lock
        let sql = format!(
            r#"
            INSERT INTO user_stats_tb
                (user_id, name, email, items_sold, items_bought,
                 total_money_made, total_money_spent, member_since)
            VALUES ($1, $2, $3, $4, $5, $6, $7, CURRENT_DATE)
            ON CONFLICT (user_id) DO UPDATE SET
                items_sold        = COALESCE(user_stats_tb.items_sold, 0) + EXCLUDED.items_sold,
                items_bought      = COALESCE(user_stats_tb.items_bought, 0) + EXCLUDED.items_bought,
                total_money_made  = COALESCE(user_stats_tb.total_money_made, 0) + EXCLUDED.total_money_made,
                total_money_spent = COALESCE(user_stats_tb.total_money_spent, 0) + EXCLUDED.total_money_spent
            RETURNING {}
            "#,
            STATS_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(identity.id.as_str())
            .bind(&identity.name)
            .bind(&identity.email)
            .bind(delta.items_sold)
            .bind(delta.items_bought)
            .bind(delta.money_made)
            .bind(delta.money_spent)
            .fetch_one(&self.pool)
            .await?;
        stats_from_row(&row)
    }
}
