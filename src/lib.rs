pub mod bootstrap;
pub mod bridge;
pub mod configure;
pub mod gateway;
pub mod logger;
pub mod models;
