pub mod club;
pub mod workflow;
