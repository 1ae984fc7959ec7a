pub mod backends;
pub mod cache;
pub mod config;
pub mod http;
pub mod middleware;
pub mod rate_limit;
pub mod storage;
