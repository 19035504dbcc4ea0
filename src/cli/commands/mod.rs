pub mod database;
pub mod populate;
pub mod user;
