use crate::api::error::AppError;
use crate::entities::{prelude::*, users};
use crate::models::{CustomerListResponse, Pagination, UserResponse};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ModelTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 10;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CustomerListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Substring of name or email
    pub search: Option<String>,
    /// createdAt | totalAmount | orderCount | lastOrderDate | name
    pub sort_field: Option<String>,
    /// asc | desc
    pub sort_order: Option<String>,
    pub registration_date_from: Option<DateTime<Utc>>,
    pub registration_date_to: Option<DateTime<Utc>>,
    pub last_order_date_from: Option<DateTime<Utc>>,
    pub last_order_date_to: Option<DateTime<Utc>>,
    pub total_amount_from: Option<i64>,
    pub total_amount_to: Option<i64>,
    pub order_count_from: Option<i32>,
    pub order_count_to: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 2, max = 30, message = "name must be between 2 and 30 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "invalid email format"))]
    pub email: Option<String>,
    #[validate(length(min = 5, max = 20, message = "phone must be between 5 and 20 characters"))]
    pub phone: Option<String>,
}

fn sort_column(field: Option<&str>) -> Result<users::Column, AppError> {
    match field.unwrap_or("createdAt") {
        "createdAt" => Ok(users::Column::CreatedAt),
        "totalAmount" => Ok(users::Column::TotalAmount),
        "orderCount" => Ok(users::Column::OrderCount),
        "lastOrderDate" => Ok(users::Column::LastOrderDate),
        "name" => Ok(users::Column::Name),
        other => Err(AppError::BadRequest(format!("invalid sort field '{}'", other))),
    }
}

fn sort_order(order: Option<&str>) -> Result<Order, AppError> {
    match order.unwrap_or("desc") {
        "asc" => Ok(Order::Asc),
        "desc" => Ok(Order::Desc),
        other => Err(AppError::BadRequest(format!("invalid sort order '{}'", other))),
    }
}

fn filter_condition(query: &CustomerListQuery) -> Condition {
    let mut condition = Condition::all();

    if let Some(search) = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        condition = condition.add(
            Condition::any()
                .add(users::Column::Name.contains(search))
                .add(users::Column::Email.contains(search)),
        );
    }

    if let Some(from) = query.registration_date_from {
        condition = condition.add(users::Column::CreatedAt.gte(from));
    }
    if let Some(to) = query.registration_date_to {
        condition = condition.add(users::Column::CreatedAt.lte(to));
    }
    if let Some(from) = query.last_order_date_from {
        condition = condition.add(users::Column::LastOrderDate.gte(from));
    }
    if let Some(to) = query.last_order_date_to {
        condition = condition.add(users::Column::LastOrderDate.lte(to));
    }
    if let Some(from) = query.total_amount_from {
        condition = condition.add(users::Column::TotalAmount.gte(from));
    }
    if let Some(to) = query.total_amount_to {
        condition = condition.add(users::Column::TotalAmount.lte(to));
    }
    if let Some(from) = query.order_count_from {
        condition = condition.add(users::Column::OrderCount.gte(from));
    }
    if let Some(to) = query.order_count_to {
        condition = condition.add(users::Column::OrderCount.lte(to));
    }

    condition
}

async fn find_customer(
    db: &sea_orm::DatabaseConnection,
    id: String,
) -> Result<users::Model, AppError> {
    Users::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("customer not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/customers",
    params(CustomerListQuery),
    responses(
        (status = 200, description = "Page of customers", body = CustomerListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "customers"
)]
pub async fn list_customers(
    State(state): State<crate::AppState>,
    Query(query): Query<CustomerListQuery>,
) -> Result<Json<CustomerListResponse>, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let column = sort_column(query.sort_field.as_deref())?;
    let order = sort_order(query.sort_order.as_deref())?;

    let paginator = Users::find()
        .filter(filter_condition(&query))
        .order_by(column, order)
        .order_by(users::Column::Id, Order::Asc)
        .paginate(&state.db, limit);

    let totals = paginator.num_items_and_pages().await?;
    // Never fetch past the end: the page * limit offset can overflow
    let customers = if page <= totals.number_of_pages {
        paginator.fetch_page(page - 1).await?
    } else {
        Vec::new()
    };

    Ok(Json(CustomerListResponse {
        customers: customers.into_iter().map(UserResponse::from).collect(),
        pagination: Pagination {
            total_users: totals.number_of_items,
            total_pages: totals.number_of_pages,
            current_page: page,
            page_size: limit,
        },
    }))
}

#[utoipa::path(
    get,
    path = "/customers/{id}",
    params(
        ("id" = String, Path, description = "Customer id")
    ),
    responses(
        (status = 200, description = "Customer", body = UserResponse),
        (status = 404, description = "Customer not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "customers"
)]
pub async fn get_customer(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let customer = find_customer(&state.db, id).await?;
    Ok(Json(customer.into()))
}

#[utoipa::path(
    patch,
    path = "/customers/{id}",
    params(
        ("id" = String, Path, description = "Customer id")
    ),
    request_body = UpdateCustomerRequest,
    responses(
        (status = 200, description = "Updated customer", body = UserResponse),
        (status = 400, description = "Invalid update"),
        (status = 404, description = "Customer not found"),
        (status = 409, description = "Email already in use")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "customers"
)]
pub async fn update_customer(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateCustomerRequest>,
) -> Result<Json<UserResponse>, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let customer = find_customer(&state.db, id).await?;
    let customer_id = customer.id.clone();
    let mut active: users::ActiveModel = customer.into();

    if let Some(email) = payload.email {
        let email = email.trim().to_lowercase();
        let taken = Users::find()
            .filter(users::Column::Email.eq(&email))
            .filter(users::Column::Id.ne(&customer_id))
            .one(&state.db)
            .await?
            .is_some();
        if taken {
            return Err(AppError::Conflict(
                "user with this email already exists".to_string(),
            ));
        }
        active.email = Set(email);
    }
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(Some(phone));
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(&state.db).await?;
    tracing::info!("✏️  Customer {} updated", updated.id);

    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/customers/{id}",
    params(
        ("id" = String, Path, description = "Customer id")
    ),
    responses(
        (status = 200, description = "Deleted customer", body = UserResponse),
        (status = 404, description = "Customer not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "customers"
)]
pub async fn delete_customer(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let customer = find_customer(&state.db, id).await?;
    customer.clone().delete(&state.db).await?;

    tracing::info!("🗑️  Customer {} deleted", customer.id);

    Ok(Json(customer.into()))
}
