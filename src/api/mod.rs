pub mod handler;
pub mod middleware;
pub mod render;
pub mod server;
