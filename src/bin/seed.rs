use chrono::{Duration, Utc};
use uuid::Uuid;

use axum_retail_api::{config::AppConfig, db::create_pool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin").await?;
    let user_id = ensure_user(&pool, "user@example.com", "user").await?;
    seed_catalog(&pool).await?;
    seed_coupons(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(pool: &sqlx::PgPool, email: &str, role: &str) -> anyhow::Result<Uuid> {
    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, role)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(row.0)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = vec![
        ("Axum Hoodie", "Warm hoodie for Rustaceans", 550000, "HOODIE-M"),
        ("Ferris Mug", "Coffee tastes better with Ferris", 120000, "MUG-STD"),
        ("Rust Sticker Pack", "Decorate your laptop", 50000, "STICKERS-10"),
        ("E-book: Async Rust", "Learn async Rust patterns", 250000, "EBOOK-ASYNC"),
    ];

    for (name, desc, base_price, sku) in products {
        let product_id: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO products (id, name, description, base_price)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO UPDATE SET base_price = EXCLUDED.base_price
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(base_price as i64)
        .fetch_one(pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO product_variants (id, product_id, sku)
            VALUES ($1, $2, $3)
            ON CONFLICT (sku) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product_id.0)
        .bind(sku)
        .execute(pool)
        .await?;
    }

    println!("Seeded catalog");
    Ok(())
}

async fn seed_coupons(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let coupons = vec![
        ("WELCOME10", "percent", 10i64, None),
        ("LAUNCH5000", "fixed", 5000i64, Some(Utc::now() + Duration::days(30))),
    ];

    for (code, kind, amount, expires_at) in coupons {
        sqlx::query(
            r#"
            INSERT INTO coupons (id, code, kind, amount, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(code)
        .bind(kind)
        .bind(amount)
        .bind(expires_at)
        .execute(pool)
        .await?;
    }

    println!("Seeded coupons");
    Ok(())
}
