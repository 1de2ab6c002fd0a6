//! Marketplace table definitions
//!
//! Listings, cart lines and sale records carry a denormalized item
//! snapshot so a row stays readable after its listing is gone.

pub const TABLES: [&str; 5] = [
    "listings_tb",
    "cart_items_tb",
    "settlements_tb",
    "sales_tb",
    "user_stats_tb",
];

pub const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS listings_tb (
        listing_id    TEXT PRIMARY KEY,
        name          TEXT NOT NULL,
        category      TEXT NOT NULL,
        price         NUMERIC(12, 2) NOT NULL CHECK (price >= 0),
        description   TEXT NOT NULL DEFAULT '',
        picture       TEXT,
        school        TEXT NOT NULL DEFAULT 'n/a',
        seller_id     TEXT NOT NULL,
        seller_name   TEXT NOT NULL DEFAULT '',
        seller_email  TEXT NOT NULL DEFAULT '',
        created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_listings_category ON listings_tb (category, school)",
    "CREATE INDEX IF NOT EXISTS idx_listings_seller ON listings_tb (seller_id)",
    r#"
    CREATE TABLE IF NOT EXISTS cart_items_tb (
        cart_id       TEXT PRIMARY KEY,
        listing_id    TEXT NOT NULL,
        name          TEXT NOT NULL,
        category      TEXT NOT NULL,
        price         NUMERIC(12, 2) NOT NULL,
        description   TEXT NOT NULL DEFAULT '',
        picture       TEXT,
        school        TEXT NOT NULL DEFAULT 'n/a',
        seller_id     TEXT NOT NULL,
        seller_name   TEXT NOT NULL DEFAULT '',
        seller_email  TEXT NOT NULL DEFAULT '',
        buyer_id      TEXT NOT NULL,
        added_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_cart_listing ON cart_items_tb (listing_id)",
    "CREATE INDEX IF NOT EXISTS idx_cart_buyer ON cart_items_tb (buyer_id)",
    // One row per listing: the first buyer to reserve owns the settlement
    r#"
    CREATE TABLE IF NOT EXISTS settlements_tb (
        listing_id    TEXT PRIMARY KEY,
        buyer_id      TEXT NOT NULL,
        sale_id       TEXT NOT NULL UNIQUE,
        reserved_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sales_tb (
        sale_id       TEXT PRIMARY KEY,
        listing_id    TEXT NOT NULL UNIQUE,
        name          TEXT NOT NULL,
        category      TEXT NOT NULL,
        price         NUMERIC(12, 2) NOT NULL,
        description   TEXT NOT NULL DEFAULT '',
        picture       TEXT,
        school        TEXT NOT NULL DEFAULT 'n/a',
        seller_id     TEXT NOT NULL,
        seller_name   TEXT NOT NULL DEFAULT '',
        seller_email  TEXT NOT NULL DEFAULT '',
        buyer_id      TEXT NOT NULL,
        buyer_name    TEXT NOT NULL DEFAULT '',
        buyer_email   TEXT NOT NULL DEFAULT '',
        sold_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_sales_buyer ON sales_tb (buyer_id)",
    "CREATE INDEX IF NOT EXISTS idx_sales_seller ON sales_tb (seller_id)",
    r#"
    CREATE TABLE IF NOT EXISTS user_stats_tb (
        user_id            TEXT PRIMARY KEY,
        name               TEXT NOT NULL DEFAULT '',
        email              TEXT NOT NULL DEFAULT '',
        items_sold         BIGINT,
        items_bought       BIGINT,
        total_money_made   NUMERIC(14, 2),
        total_money_spent  NUMERIC(14, 2),
        member_since       DATE NOT NULL DEFAULT CURRENT_DATE
    )
    "#,
];
