use serde::Deserialize;

use crate::core::models::club::Query as ClubQuery;
use crate::core::models::common::{default_size, first_page, Pagination};

#[derive(Debug, Clone, Deserialize)]
pub struct ClubFilter {
    #[serde(default = "first_page")]
    pub page: i64,
    #[serde(default = "default_size")]
    pub size: i64,
    pub category_id: Option<i32>,
}

impl ClubFilter {
    pub fn split(self) -> (ClubQuery, Pagination) {
        let query = ClubQuery {
            category_id: self.category_id,
            ..default::default()
        };
        (query, Pagination::page(self.page, self.size))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rejection {
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogoUpdate {
    pub logo_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryCreate {
    pub name: String,
}
