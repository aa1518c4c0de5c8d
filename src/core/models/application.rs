use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::fmt::{self, Display};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationKind {
    CreateClub,
    JoinClub,
    UpdateClubInfo,
}

impl ApplicationKind {
    pub fn table(&self) -> &'static str {
        match self {
            ApplicationKind::CreateClub => "create_club_applications",
            ApplicationKind::JoinClub => "join_club_applications",
            ApplicationKind::UpdateClubInfo => "update_club_info_applications",
        }
    }

    /// Statuses that still occupy the uniqueness slot of an applicant or club.
    /// An approved join request keeps its slot so the applicant cannot apply
    /// again for a club they were already admitted to.
    pub fn live_statuses(&self) -> &'static [ApplicationStatus] {
        match self {
            ApplicationKind::JoinClub => &[ApplicationStatus::Pending, ApplicationStatus::Approved],
            _ => &[ApplicationStatus::Pending],
        }
    }

    pub fn requires_club(&self) -> bool {
        !matches!(self, ApplicationKind::CreateClub)
    }

    /// Which rows compete with `insert` for the same live slot.
    pub fn conflict_scope(&self, insert: &Insert) -> Result<ConflictScope, Error> {
        let club_id = || insert.club_id.ok_or_else(|| Error::InvalidArgument(format!("{} application requires a club id", self)));
        Ok(match self {
            ApplicationKind::CreateClub => ConflictScope::Applicant(insert.applicant_id),
            ApplicationKind::JoinClub => ConflictScope::ApplicantInClub(insert.applicant_id, club_id()?),
            ApplicationKind::UpdateClubInfo => ConflictScope::Club(club_id()?),
        })
    }
}

impl Display for ApplicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApplicationKind::CreateClub => "create_club",
            ApplicationKind::JoinClub => "join_club",
            ApplicationKind::UpdateClubInfo => "update_club_info",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(type_name = "application_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApplicationStatus::Pending)
    }
}

impl Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Opaque proposal payload. Only a `ProposalCodec` looks inside.
#[derive(Debug, Clone, PartialEq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Proposal(pub serde_json::Value);

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Application {
    pub id: i32,
    pub applicant_id: i32,
    pub club_id: Option<i32>,
    pub proposal: Proposal,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejected_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Insert {
    pub applicant_id: i32,
    pub club_id: Option<i32>,
    pub proposal: Proposal,
}

#[derive(Debug, Default, Clone)]
pub struct Query {
    pub applicant_id: Option<i32>,
    pub club_id: Option<i32>,
    pub statuses: Option<Vec<ApplicationStatus>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictScope {
    Applicant(i32),
    ApplicantInClub(i32, i32),
    Club(i32),
}

impl ConflictScope {
    pub fn matches(&self, app: &Application) -> bool {
        match *self {
            ConflictScope::Applicant(uid) => app.applicant_id == uid,
            ConflictScope::ApplicantInClub(uid, cid) => app.applicant_id == uid && app.club_id == Some(cid),
            ConflictScope::Club(cid) => app.club_id == Some(cid),
        }
    }

    /// Stable text key, used to serialize concurrent submissions for a slot
    /// that may not have any row yet.
    pub fn lock_key(&self, kind: ApplicationKind) -> String {
        match *self {
            ConflictScope::Applicant(uid) => format!("{}:applicant:{}", kind, uid),
            ConflictScope::ApplicantInClub(uid, cid) => format!("{}:applicant:{}:club:{}", kind, uid, cid),
            ConflictScope::Club(cid) => format!("{}:club:{}", kind, cid),
        }
    }
}

/// Payload of a join-club application.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JoinProposal {
    #[serde(default)]
    pub reason: String,
}

#[cfg(test)]
mod test {
    use super::*;

    fn insert(club_id: Option<i32>) -> Insert {
        Insert {
            applicant_id: 5,
            club_id,
            proposal: Proposal(serde_json::Value::Null),
        }
    }

    #[test]
    fn test_conflict_scope_per_kind() {
        assert_eq!(ApplicationKind::CreateClub.conflict_scope(&insert(None)).unwrap(), ConflictScope::Applicant(5));
        assert_eq!(ApplicationKind::JoinClub.conflict_scope(&insert(Some(9))).unwrap(), ConflictScope::ApplicantInClub(5, 9));
        assert_eq!(ApplicationKind::UpdateClubInfo.conflict_scope(&insert(Some(9))).unwrap(), ConflictScope::Club(9));
    }

    #[test]
    fn test_club_scoped_kinds_need_a_club() {
        assert!(matches!(ApplicationKind::JoinClub.conflict_scope(&insert(None)), Err(Error::InvalidArgument(_))));
        assert!(matches!(ApplicationKind::UpdateClubInfo.conflict_scope(&insert(None)), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_join_keeps_approved_live() {
        assert!(ApplicationKind::JoinClub.live_statuses().contains(&ApplicationStatus::Approved));
        assert!(!ApplicationKind::CreateClub.live_statuses().contains(&ApplicationStatus::Approved));
        assert!(!ApplicationKind::UpdateClubInfo.live_statuses().contains(&ApplicationStatus::Approved));
    }

    #[test]
    fn test_lock_keys_do_not_collide_across_kinds() {
        let a = ConflictScope::Club(3).lock_key(ApplicationKind::UpdateClubInfo);
        let b = ConflictScope::Applicant(3).lock_key(ApplicationKind::CreateClub);
        assert_ne!(a, b);
    }
}
