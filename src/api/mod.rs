//! API Module
//!
//! HTTP inspection surface over one cache context.
//!
//! # Endpoints
//! - `PUT /set` - Store a JSON value
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Delete a key from both tiers
//! - `POST /clear` - Clear both tiers
//! - `POST /cleanup` - Run one cleanup pass
//! - `GET /stats` - Get cache statistics
//! - `PUT /network` - Override observed connectivity
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
