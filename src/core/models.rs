pub mod application;
pub mod club;
pub mod common;
pub mod user;
