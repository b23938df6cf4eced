mod auth;
mod catalog;
mod orders;
mod products;
mod server;

pub use auth::AnonymousUser;
pub use server::{AppState, HttpServer, HttpServerConfig};
