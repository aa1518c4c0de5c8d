use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Club {
    pub id: i32,
    pub name: String,
    pub leader_id: i32,
    pub category_id: i32,
    pub description: String,
    pub logo_url: Option<String>,
    pub tags: Vec<String>,
    pub member_count: i32,
    pub requirements: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Desired field values of a club that does not exist yet. This is what a
/// create-club application carries in its proposal payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClubProposal {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category_id: i32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub logo_url: Option<String>,
}

/// Partial update of a club. Absent fields keep their current value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClubPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

impl ClubPatch {
    pub fn apply(self, club: &mut Club) {
        if let Some(name) = self.name {
            club.name = name;
        }
        if let Some(description) = self.description {
            club.description = description;
        }
        if let Some(category_id) = self.category_id {
            club.category_id = category_id;
        }
        if let Some(tags) = self.tags {
            club.tags = tags;
        }
        if let Some(requirements) = self.requirements {
            club.requirements = requirements;
        }
        if let Some(logo_url) = self.logo_url {
            club.logo_url = Some(logo_url);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Insert {
    pub name: String,
    pub leader_id: i32,
    pub category_id: i32,
    pub description: String,
    pub logo_url: Option<String>,
    pub tags: Vec<String>,
    pub requirements: String,
}

impl Insert {
    pub fn from_proposal(proposal: ClubProposal, leader_id: i32) -> Self {
        Self {
            name: proposal.name,
            leader_id,
            category_id: proposal.category_id,
            description: proposal.description,
            logo_url: proposal.logo_url,
            tags: proposal.tags,
            requirements: proposal.requirements,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Query {
    pub category_id: Option<i32>,
    pub member_id: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(type_name = "club_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ClubRole {
    Member,
    Leader,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ClubMember {
    pub id: i32,
    pub user_id: i32,
    pub club_id: i32,
    pub role: ClubRole,
    pub joined_at: DateTime<Utc>,
    pub last_active: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct MemberInsert {
    pub user_id: i32,
    pub club_id: i32,
    pub role: ClubRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Category {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Favorite {
    pub id: i32,
    pub user_id: i32,
    pub club_id: i32,
    pub created_at: DateTime<Utc>,
}
