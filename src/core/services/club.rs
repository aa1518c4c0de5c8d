use crate::core::models::{
    club::{Category, Club, ClubPatch, ClubRole, Query as ClubQuery},
    common::Pagination,
};
use crate::core::ports::repository::{ClubCommon, ClubMemberCommon, Store, TxStore};
use crate::error::Error;

const CATEGORY_PAGE: i64 = 20;
const LATEST_COUNT: i64 = 5;

pub async fn club_detail<D>(db: &mut D, id: i32) -> Result<Club, Error>
where
    D: Store,
{
    db.get_club(id).await?.ok_or_else(|| Error::not_found("club", id))
}

pub async fn list_clubs<D>(db: &mut D, query: &ClubQuery, pagination: Pagination) -> Result<(Vec<Club>, i64), Error>
where
    D: Store,
{
    let total = db.count_clubs(query).await?;
    let clubs = db.query_clubs(query, Some(pagination)).await?;
    Ok((clubs, total))
}

pub async fn clubs_by_category<D>(db: &mut D, category_id: i32) -> Result<Vec<Club>, Error>
where
    D: Store,
{
    let query = ClubQuery {
        category_id: Some(category_id),
        ..default::default()
    };
    db.query_clubs(&query, Some(Pagination::new(CATEGORY_PAGE, None))).await
}

pub async fn latest_clubs<D>(db: &mut D) -> Result<Vec<Club>, Error>
where
    D: Store,
{
    db.query_clubs(&ClubQuery::default(), Some(Pagination::new(LATEST_COUNT, None))).await
}

pub async fn club_count<D>(db: &mut D) -> Result<i64, Error>
where
    D: Store,
{
    db.count_clubs(&ClubQuery::default()).await
}

pub async fn categories<D>(db: &mut D) -> Result<Vec<Category>, Error>
where
    D: Store,
{
    db.categories().await
}

pub async fn create_category<D>(db: &mut D, name: &str) -> Result<i32, Error>
where
    D: Store,
{
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidArgument("category name is empty".into()));
    }
    db.insert_category(name).await
}

pub async fn favorite_club<D>(db: &mut D, user_id: i32, club_id: i32) -> Result<(), Error>
where
    D: Store,
{
    club_detail(db, club_id).await?;
    db.insert_favorite(user_id, club_id).await
}

/// Removing a favorite that does not exist is not an error.
pub async fn unfavorite_club<D>(db: &mut D, user_id: i32, club_id: i32) -> Result<(), Error>
where
    D: Store,
{
    db.delete_favorite(user_id, club_id).await?;
    Ok(())
}

pub async fn favorite_clubs<D>(db: &mut D, user_id: i32) -> Result<Vec<Club>, Error>
where
    D: Store,
{
    let mut clubs = Vec::new();
    for id in db.favorite_club_ids(user_id).await? {
        if let Some(club) = db.get_club(id).await? {
            clubs.push(club);
        }
    }
    Ok(clubs)
}

/// Only the club's leader may change its logo.
pub async fn update_club_logo<D>(db: &mut D, user_id: i32, club_id: i32, logo_url: String) -> Result<(), Error>
where
    D: Store,
{
    let club = club_detail(db, club_id).await?;
    if club.leader_id != user_id {
        return Err(Error::Forbidden(format!("user {} does not lead club {}", user_id, club_id)));
    }
    db.update_club(
        club_id,
        ClubPatch {
            logo_url: Some(logo_url),
            ..default::default()
        },
    )
    .await
}

pub async fn quit_club<T>(mut tx: T, user_id: i32, club_id: i32) -> Result<(), Error>
where
    T: TxStore,
{
    tx.get_club_for_update(club_id).await?.ok_or_else(|| Error::not_found("club", club_id))?;
    let member = tx
        .get_member(user_id, club_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("user {} is not a member of club {}", user_id, club_id)))?;
    // a club cannot be left without its leader
    if member.role == ClubRole::Leader {
        return Err(Error::InvalidArgument("the leader cannot quit the club".into()));
    }
    tx.delete_member(user_id, club_id).await?;
    tx.adjust_member_count(club_id, -1).await?;
    tx.commit().await?;
    Ok(())
}
