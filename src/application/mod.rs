pub mod backoff;
pub mod bootstrap;
pub mod commands;
pub mod dispatcher;
pub mod item_pool;
pub mod playlist_resolver;
pub mod rate_limiter;
pub mod scheduler;
