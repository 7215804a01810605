//! Database connection and schema bootstrap.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn connect(config: &AppConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Create enum types and tables if they do not exist yet.
    ///
    /// Runs at startup; every statement is individually idempotent so a
    /// restart against an initialized database is a no-op.
    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        tracing::info!("Initializing database schema");

        for statement in SCHEMA_STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        tracing::info!("Database schema initialized");
        Ok(())
    }
}

const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    DO $$ BEGIN
        CREATE TYPE hold_status AS ENUM ('pending', 'completed', 'expired');
    EXCEPTION WHEN duplicate_object THEN NULL;
    END $$
    "#,
    r#"
    DO $$ BEGIN
        CREATE TYPE order_status AS ENUM ('pending', 'paid', 'failed');
    EXCEPTION WHEN duplicate_object THEN NULL;
    END $$
    "#,
    r#"
    DO $$ BEGIN
        CREATE TYPE payment_status AS ENUM ('paid', 'failed');
    EXCEPTION WHEN duplicate_object THEN NULL;
    END $$
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id UUID PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        total_stock INTEGER NOT NULL CHECK (total_stock >= 0),
        price NUMERIC(10, 2) NOT NULL CHECK (price >= 0),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS holds (
        id UUID PRIMARY KEY,
        product_id UUID NOT NULL REFERENCES products(id),
        qty INTEGER NOT NULL CHECK (qty > 0),
        status hold_status NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_holds_pending_expiry
        ON holds (expires_at) WHERE status = 'pending'
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id UUID PRIMARY KEY,
        hold_id UUID NOT NULL UNIQUE REFERENCES holds(id),
        status order_status NOT NULL,
        total_amount NUMERIC(10, 2) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS webhook_logs (
        idempotency_key VARCHAR(255) PRIMARY KEY,
        response_body JSONB NOT NULL,
        response_status_code INTEGER NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pending_webhooks (
        id UUID PRIMARY KEY,
        hold_id UUID NOT NULL UNIQUE REFERENCES holds(id),
        status payment_status NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];
