use crate::context::UserInfo;
use crate::core::models::{
    application::ApplicationKind,
    club::Club,
    user::{Role, User},
};
use crate::core::ports::repository::{ClubCommon, Manager, UserCommon};
use crate::core::{codec::ProposalCodec, services::workflow::Workflow};
use crate::error::Error;

pub async fn current_user<M: Manager>(manager: &M, user_info: &UserInfo) -> Result<User, Error> {
    let mut db = manager.db().await?;
    db.get_user(user_info.id).await?.ok_or_else(|| Error::Forbidden(format!("unknown user {}", user_info.id)))
}

pub async fn require_admin<M: Manager>(manager: &M, user_info: &UserInfo) -> Result<User, Error> {
    let user = current_user(manager, user_info).await?;
    if user.role != Role::Admin {
        return Err(Error::Forbidden(format!("user {} is not an admin", user.id)));
    }
    Ok(user)
}

pub async fn require_leader<M: Manager>(manager: &M, user_info: &UserInfo, club_id: i32) -> Result<Club, Error> {
    let mut db = manager.db().await?;
    let club = db.get_club(club_id).await?.ok_or_else(|| Error::not_found("club", club_id))?;
    if club.leader_id != user_info.id {
        return Err(Error::Forbidden(format!("user {} does not lead club {}", user_info.id, club_id)));
    }
    Ok(club)
}

pub async fn require_leader_or_admin<M: Manager>(manager: &M, user_info: &UserInfo, club_id: i32) -> Result<(), Error> {
    match require_leader(manager, user_info, club_id).await {
        Err(Error::Forbidden(_)) => require_admin(manager, user_info).await.map(|_| ()),
        res => res.map(|_| ()),
    }
}

/// Create and update applications are reviewed by admins; join applications
/// by the club's leader or an admin.
pub async fn authorize_review<M, C>(workflow: &Workflow<M, C>, user_info: &UserInfo, kind: ApplicationKind, id: i32) -> Result<(), Error>
where
    M: Manager,
    C: ProposalCodec,
{
    match kind {
        ApplicationKind::JoinClub => {
            let app = workflow.application(kind, id).await?;
            let club_id = app.club_id.ok_or_else(|| Error::InvalidArgument(format!("application {} has no club", id)))?;
            require_leader_or_admin(workflow.manager(), user_info, club_id).await
        }
        ApplicationKind::CreateClub | ApplicationKind::UpdateClubInfo => require_admin(workflow.manager(), user_info).await.map(|_| ()),
    }
}
