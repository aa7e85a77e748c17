pub mod config;
pub mod logging;
pub mod oauth_flow;
pub mod session;
pub mod storage;
pub mod sync;
pub mod token_provider;
