// Bitcoin address watch API: allow-listed magic-link sign-in and a
// dashboard of balance, balance history and transactions for one address.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
