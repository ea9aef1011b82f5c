pub mod config;
pub mod export;
pub mod interface;
pub mod packet;
pub mod session;
pub mod stats;
