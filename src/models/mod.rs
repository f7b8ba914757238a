use crate::entities::users;
use crate::utils::auth::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Public view of a user / customer record. Never carries the password hash.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub total_amount: i64,
    pub order_count: i32,
    pub last_order_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for UserResponse {
    fn from(user: users::Model) -> Self {
        Self {
            // Rows are only ever written with a known role
            role: user.role.parse().unwrap_or(Role::Customer),
            id: user.id,
            email: user.email,
            name: user.name,
            phone: user.phone,
            total_amount: user.total_amount,
            order_count: user.order_count,
            last_order_date: user.last_order_date,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total_users: u64,
    pub total_pages: u64,
    pub current_page: u64,
    pub page_size: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CustomerListResponse {
    pub customers: Vec<UserResponse>,
    pub pagination: Pagination,
}
