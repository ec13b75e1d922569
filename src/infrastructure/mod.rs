pub mod candle_store;
pub mod http_client_factory;
pub mod mock;
pub mod mt5;
pub mod persistence;
pub mod repositories;
