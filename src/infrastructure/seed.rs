use crate::entities::{prelude::*, users};
use crate::utils::auth::{Role, hash_password};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::env;
use tracing::info;
use uuid::Uuid;

/// Creates the admin account from ADMIN_EMAIL / ADMIN_PASSWORD when both are set
pub async fn seed_initial_data(db: &DatabaseConnection) -> anyhow::Result<()> {
    match (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) {
        (Ok(email), Ok(password)) => {
            ensure_admin(db, &email, &password).await?;
        }
        _ => info!("🌱 No ADMIN_EMAIL/ADMIN_PASSWORD set, skipping admin bootstrap"),
    }
    Ok(())
}

/// Makes sure an admin with this email exists. An existing account is
/// promoted, its password left untouched.
pub async fn ensure_admin(
    db: &DatabaseConnection,
    email: &str,
    password: &str,
) -> anyhow::Result<users::Model> {
    let email = email.trim().to_lowercase();

    let existing = Users::find()
        .filter(users::Column::Email.eq(&email))
        .one(db)
        .await?;

    if let Some(user) = existing {
        if user.role == Role::Admin.as_str() {
            return Ok(user);
        }
        info!("🌱 Promoting {} to admin", email);
        let mut active: users::ActiveModel = user.into();
        active.role = Set(Role::Admin.as_str().to_string());
        active.updated_at = Set(Utc::now());
        return Ok(active.update(db).await?);
    }

    info!("🌱 Creating admin account {}", email);
    let now = Utc::now();
    let admin = users::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        email: Set(email),
        name: Set("Administrator".to_string()),
        phone: Set(None),
        password_hash: Set(hash_password(password)?),
        role: Set(Role::Admin.as_str().to_string()),
        total_amount: Set(0),
        order_count: Set(0),
        last_order_date: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    Ok(admin.insert(db).await?)
}
