pub mod auth;
pub mod customers;
pub mod health;
pub mod upload;
