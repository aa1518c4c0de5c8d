use crate::core::models::{
    application::{Application, ApplicationKind, Insert as ApplicationInsert, Query as ApplicationQuery},
    club::{Category, Club, ClubMember, ClubPatch, Insert as ClubInsert, MemberInsert, Query as ClubQuery},
    common::Pagination,
    user::{Insert as UserInsert, Role, User},
};
use crate::error::Error;

pub trait UserCommon {
    async fn insert_user(&mut self, user: UserInsert) -> Result<i32, Error>;
    async fn get_user(&mut self, id: i32) -> Result<Option<User>, Error>;
    async fn get_user_by_username(&mut self, username: &str) -> Result<Option<User>, Error>;
    /// Sets `to` only when the current role is `from`. Returns whether a row changed.
    async fn replace_role(&mut self, id: i32, from: Role, to: Role) -> Result<bool, Error>;
}

pub trait ClubCommon {
    async fn insert_club(&mut self, club: ClubInsert) -> Result<i32, Error>;
    async fn get_club(&mut self, id: i32) -> Result<Option<Club>, Error>;
    async fn get_club_for_update(&mut self, id: i32) -> Result<Option<Club>, Error>;
    async fn update_club(&mut self, id: i32, patch: ClubPatch) -> Result<(), Error>;
    async fn adjust_member_count(&mut self, id: i32, delta: i32) -> Result<(), Error>;
    /// Newest first.
    async fn query_clubs(&mut self, query: &ClubQuery, pagination: Option<Pagination>) -> Result<Vec<Club>, Error>;
    async fn count_clubs(&mut self, query: &ClubQuery) -> Result<i64, Error>;
}

pub trait ClubMemberCommon {
    /// Fails with `Error::AlreadyMember` if the (user, club) pair exists.
    async fn insert_member(&mut self, member: MemberInsert) -> Result<i32, Error>;
    async fn get_member(&mut self, user_id: i32, club_id: i32) -> Result<Option<ClubMember>, Error>;
    async fn members_of_club(&mut self, club_id: i32) -> Result<Vec<ClubMember>, Error>;
    async fn memberships_of_user(&mut self, user_id: i32) -> Result<Vec<ClubMember>, Error>;
    async fn delete_member(&mut self, user_id: i32, club_id: i32) -> Result<bool, Error>;
}

pub trait CategoryCommon {
    async fn insert_category(&mut self, name: &str) -> Result<i32, Error>;
    async fn categories(&mut self) -> Result<Vec<Category>, Error>;
}

pub trait FavoriteCommon {
    /// Idempotent.
    async fn insert_favorite(&mut self, user_id: i32, club_id: i32) -> Result<(), Error>;
    async fn delete_favorite(&mut self, user_id: i32, club_id: i32) -> Result<bool, Error>;
    async fn favorite_club_ids(&mut self, user_id: i32) -> Result<Vec<i32>, Error>;
}

pub trait ApplicationCommon {
    /// Checks the live-slot invariant of `kind` under a lock and inserts only
    /// if the slot is free. Must run inside a transaction to be race free.
    async fn insert_application_unique(&mut self, kind: ApplicationKind, application: ApplicationInsert) -> Result<i32, Error>;
    async fn get_application(&mut self, kind: ApplicationKind, id: i32) -> Result<Option<Application>, Error>;
    /// Row-locked read; the lock is held until the surrounding transaction ends.
    async fn get_application_for_update(&mut self, kind: ApplicationKind, id: i32) -> Result<Option<Application>, Error>;
    async fn mark_application_approved(&mut self, kind: ApplicationKind, id: i32) -> Result<(), Error>;
    /// Single guarded statement: only a pending row is rejected. Returns whether a row changed.
    async fn reject_application(&mut self, kind: ApplicationKind, id: i32, reason: &str) -> Result<bool, Error>;
    /// Oldest first.
    async fn query_applications(&mut self, kind: ApplicationKind, query: &ApplicationQuery, pagination: Option<Pagination>) -> Result<Vec<Application>, Error>;
}

pub trait Common: UserCommon + ClubCommon + ClubMemberCommon + CategoryCommon + FavoriteCommon + ApplicationCommon {}

pub trait Store: Common {}

pub trait TxStore: Store {
    async fn commit(self) -> Result<(), Error>;
    async fn rollback(self) -> Result<(), Error>;
}

/// Hands out plain and transactional store handles over one backend.
pub trait Manager {
    type Store: Store;
    type TxStore: TxStore;
    async fn db(&self) -> Result<Self::Store, Error>;
    async fn tx(&self) -> Result<Self::TxStore, Error>;
}
