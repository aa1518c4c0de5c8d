use actix_web::{
    web::{Json, Path, Query},
    HttpResponse,
};

use crate::{
    context::UserInfo,
    core::{
        models::club::{Category, Club, ClubMember},
        ports::repository::Manager,
        services::club,
    },
    error::Error,
    handlers::{authorizer::require_admin, Service},
    request::{CategoryCreate, ClubFilter, LogoUpdate},
    response::{CountResponse, CreateResponse, List},
};

pub async fn list<M: Manager + 'static>(Query(filter): Query<ClubFilter>, workflow: Service<M>) -> Result<Json<List<Club>>, Error> {
    let (query, pagination) = filter.split();
    let mut db = workflow.manager().db().await?;
    let (clubs, total) = club::list_clubs(&mut db, &query, pagination).await?;
    Ok(Json(List::new(clubs, total)))
}

pub async fn latest<M: Manager + 'static>(workflow: Service<M>) -> Result<Json<Vec<Club>>, Error> {
    let mut db = workflow.manager().db().await?;
    Ok(Json(club::latest_clubs(&mut db).await?))
}

pub async fn count<M: Manager + 'static>(workflow: Service<M>) -> Result<Json<CountResponse>, Error> {
    let mut db = workflow.manager().db().await?;
    Ok(Json(CountResponse {
        count: club::club_count(&mut db).await?,
    }))
}

pub async fn detail<M: Manager + 'static>(club_id: Path<(i32,)>, workflow: Service<M>) -> Result<Json<Club>, Error> {
    let mut db = workflow.manager().db().await?;
    Ok(Json(club::club_detail(&mut db, club_id.into_inner().0).await?))
}

pub async fn by_category<M: Manager + 'static>(category_id: Path<(i32,)>, workflow: Service<M>) -> Result<Json<Vec<Club>>, Error> {
    let mut db = workflow.manager().db().await?;
    Ok(Json(club::clubs_by_category(&mut db, category_id.into_inner().0).await?))
}

pub async fn categories<M: Manager + 'static>(workflow: Service<M>) -> Result<Json<Vec<Category>>, Error> {
    let mut db = workflow.manager().db().await?;
    Ok(Json(club::categories(&mut db).await?))
}

pub async fn create_category<M: Manager + 'static>(user_info: UserInfo, Json(CategoryCreate { name }): Json<CategoryCreate>, workflow: Service<M>) -> Result<HttpResponse, Error> {
    require_admin(workflow.manager(), &user_info).await?;
    let mut db = workflow.manager().db().await?;
    let id = club::create_category(&mut db, &name).await?;
    Ok(HttpResponse::Created().json(CreateResponse { id }))
}

pub async fn members<M: Manager + 'static>(club_id: Path<(i32,)>, workflow: Service<M>) -> Result<Json<Vec<ClubMember>>, Error> {
    Ok(Json(workflow.members_of_club(club_id.into_inner().0).await?))
}

pub async fn quit<M: Manager + 'static>(user_info: UserInfo, club_id: Path<(i32,)>, workflow: Service<M>) -> Result<HttpResponse, Error> {
    let tx = workflow.manager().tx().await?;
    club::quit_club(tx, user_info.id, club_id.into_inner().0).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn my_clubs<M: Manager + 'static>(user_info: UserInfo, workflow: Service<M>) -> Result<Json<Vec<Club>>, Error> {
    Ok(Json(workflow.clubs_of_user(user_info.id).await?))
}

pub async fn favorite<M: Manager + 'static>(user_info: UserInfo, club_id: Path<(i32,)>, workflow: Service<M>) -> Result<HttpResponse, Error> {
    let mut db = workflow.manager().db().await?;
    club::favorite_club(&mut db, user_info.id, club_id.into_inner().0).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn unfavorite<M: Manager + 'static>(user_info: UserInfo, club_id: Path<(i32,)>, workflow: Service<M>) -> Result<HttpResponse, Error> {
    let mut db = workflow.manager().db().await?;
    club::unfavorite_club(&mut db, user_info.id, club_id.into_inner().0).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn my_favorites<M: Manager + 'static>(user_info: UserInfo, workflow: Service<M>) -> Result<Json<Vec<Club>>, Error> {
    let mut db = workflow.manager().db().await?;
    Ok(Json(club::favorite_clubs(&mut db, user_info.id).await?))
}

pub async fn update_logo<M: Manager + 'static>(user_info: UserInfo, club_id: Path<(i32,)>, Json(LogoUpdate { logo_url }): Json<LogoUpdate>, workflow: Service<M>) -> Result<HttpResponse, Error> {
    let mut db = workflow.manager().db().await?;
    club::update_club_logo(&mut db, user_info.id, club_id.into_inner().0, logo_url).await?;
    Ok(HttpResponse::NoContent().finish())
}
