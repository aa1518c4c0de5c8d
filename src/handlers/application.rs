use actix_web::{
    web::{Json, Path, Query},
    HttpResponse,
};

use crate::{
    context::UserInfo,
    core::{
        models::{
            application::{Application, ApplicationKind},
            club::{ClubPatch, ClubProposal},
            common::PageQuery,
        },
        ports::repository::Manager,
    },
    error::Error,
    handlers::{
        authorizer::{authorize_review, require_admin, require_leader, require_leader_or_admin},
        Service,
    },
    request::{JoinRequest, Rejection},
    response::CreateResponse,
};

pub async fn submit_create_club<M: Manager + 'static>(user_info: UserInfo, Json(proposal): Json<ClubProposal>, workflow: Service<M>) -> Result<HttpResponse, Error> {
    if proposal.name.trim().is_empty() {
        return Err(Error::InvalidArgument("club name is empty".into()));
    }
    let id = workflow.submit_create_club_application(user_info.id, &proposal).await?;
    Ok(HttpResponse::Created().json(CreateResponse { id }))
}

pub async fn submit_join<M: Manager + 'static>(user_info: UserInfo, club_id: Path<(i32,)>, Json(JoinRequest { reason }): Json<JoinRequest>, workflow: Service<M>) -> Result<HttpResponse, Error> {
    let club_id = club_id.into_inner().0;
    let id = workflow.submit_join_club_application(user_info.id, club_id, &reason).await?;
    Ok(HttpResponse::Created().json(CreateResponse { id }))
}

pub async fn submit_update<M: Manager + 'static>(user_info: UserInfo, club_id: Path<(i32,)>, Json(patch): Json<ClubPatch>, workflow: Service<M>) -> Result<HttpResponse, Error> {
    let club_id = club_id.into_inner().0;
    require_leader(workflow.manager(), &user_info, club_id).await?;
    let id = workflow.submit_update_club_info_application(club_id, user_info.id, &patch).await?;
    Ok(HttpResponse::Created().json(CreateResponse { id }))
}

pub async fn approve<M: Manager + 'static>(user_info: UserInfo, path: Path<(ApplicationKind, i32)>, workflow: Service<M>) -> Result<HttpResponse, Error> {
    let (kind, id) = path.into_inner();
    authorize_review(workflow.get_ref(), &user_info, kind, id).await?;
    match kind {
        ApplicationKind::CreateClub => {
            let club_id = workflow.approve_create_club_application(id).await?;
            Ok(HttpResponse::Ok().json(CreateResponse { id: club_id }))
        }
        ApplicationKind::JoinClub => {
            workflow.approve_join_club_application(id).await?;
            Ok(HttpResponse::NoContent().finish())
        }
        ApplicationKind::UpdateClubInfo => {
            workflow.approve_update_club_info_application(id).await?;
            Ok(HttpResponse::NoContent().finish())
        }
    }
}

pub async fn reject<M: Manager + 'static>(user_info: UserInfo, path: Path<(ApplicationKind, i32)>, Json(Rejection { reason }): Json<Rejection>, workflow: Service<M>) -> Result<HttpResponse, Error> {
    let (kind, id) = path.into_inner();
    authorize_review(workflow.get_ref(), &user_info, kind, id).await?;
    match kind {
        ApplicationKind::CreateClub => workflow.reject_create_club_application(id, &reason).await?,
        ApplicationKind::JoinClub => workflow.reject_join_club_application(id, &reason).await?,
        ApplicationKind::UpdateClubInfo => workflow.reject_update_club_info_application(id, &reason).await?,
    }
    Ok(HttpResponse::NoContent().finish())
}

pub async fn my_applications<M: Manager + 'static>(user_info: UserInfo, kind: Path<(ApplicationKind,)>, workflow: Service<M>) -> Result<Json<Vec<Application>>, Error> {
    let kind = kind.into_inner().0;
    Ok(Json(workflow.applications_of_applicant(kind, user_info.id).await?))
}

pub async fn pending<M: Manager + 'static>(user_info: UserInfo, kind: Path<(ApplicationKind,)>, Query(page): Query<PageQuery>, workflow: Service<M>) -> Result<Json<Vec<Application>>, Error> {
    require_admin(workflow.manager(), &user_info).await?;
    let kind = kind.into_inner().0;
    Ok(Json(workflow.pending_applications(kind, page.into()).await?))
}

pub async fn club_join_queue<M: Manager + 'static>(user_info: UserInfo, club_id: Path<(i32,)>, workflow: Service<M>) -> Result<Json<Vec<Application>>, Error> {
    let club_id = club_id.into_inner().0;
    require_leader_or_admin(workflow.manager(), &user_info, club_id).await?;
    Ok(Json(workflow.live_applications_for_club(ApplicationKind::JoinClub, club_id).await?))
}
