use chrono::Utc;
use itertools::Itertools;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::core::models::{
    application::{Application, ApplicationKind, ApplicationStatus, Insert as ApplicationInsert, Query as ApplicationQuery},
    club::{Category, Club, ClubMember, ClubPatch, Favorite, Insert as ClubInsert, MemberInsert, Query as ClubQuery},
    common::Pagination,
    user::{Insert as UserInsert, Role, User},
};
use crate::core::ports::repository::{ApplicationCommon, CategoryCommon, ClubCommon, ClubMemberCommon, Common, FavoriteCommon, Manager, Store, TxStore, UserCommon};
use crate::error::Error;

/// Store calls that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    InsertClub,
    InsertMember,
    MarkApproved,
}

#[derive(Debug, Clone, Default)]
pub struct Tables {
    seq: i32,
    users: BTreeMap<i32, User>,
    clubs: BTreeMap<i32, Club>,
    members: BTreeMap<i32, ClubMember>,
    categories: BTreeMap<i32, Category>,
    favorites: BTreeMap<i32, Favorite>,
    applications: HashMap<ApplicationKind, BTreeMap<i32, Application>>,
    fail_at: Option<FailPoint>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.seq += 1;
        self.seq
    }

    fn check(&self, point: FailPoint) -> Result<(), Error> {
        if self.fail_at == Some(point) {
            return Err(Error::Storage(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }

    fn applications_mut(&mut self, kind: ApplicationKind) -> &mut BTreeMap<i32, Application> {
        self.applications.entry(kind).or_default()
    }

    fn application(&self, kind: ApplicationKind, id: i32) -> Option<Application> {
        self.applications.get(&kind).and_then(|m| m.get(&id)).cloned()
    }
}

fn paginate<T>(rows: impl Iterator<Item = T>, pagination: Option<Pagination>) -> Vec<T> {
    match pagination {
        Some(p) => rows.skip(p.offset() as usize).take(p.limit() as usize).collect(),
        None => rows.collect(),
    }
}

/// Access path to the tables: either through the shared lock per call or
/// through a private working copy owned by a transaction.
pub trait Handle {
    async fn with<R, F>(&mut self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut Tables) -> Result<R, Error>;
}

pub struct Shared {
    tables: Arc<Mutex<Tables>>,
}

impl Handle for Shared {
    async fn with<R, F>(&mut self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut Tables) -> Result<R, Error>,
    {
        let mut tables = self.tables.lock().await;
        f(&mut tables)
    }
}

/// Holds the table lock for its whole life, so transactions are serializable.
/// Writes go to `work` and only reach the shared tables on commit.
pub struct Exclusive {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
}

impl Handle for Exclusive {
    async fn with<R, F>(&mut self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut Tables) -> Result<R, Error>,
    {
        f(&mut self.work)
    }
}

pub struct Memory<H> {
    handle: H,
}

impl<H: Handle> UserCommon for Memory<H> {
    async fn insert_user(&mut self, user: UserInsert) -> Result<i32, Error> {
        self.handle
            .with(|t| {
                if t.users.values().any(|u| u.username == user.username) {
                    return Err(Error::Storage(format!("duplicate username {}", user.username)));
                }
                let id = t.next_id();
                let now = Utc::now();
                t.users.insert(
                    id,
                    User {
                        id,
                        username: user.username,
                        email: user.email,
                        password_hash: user.password_hash,
                        avatar_url: user.avatar_url,
                        role: user.role,
                        created_at: now,
                        updated_at: now,
                        last_active: None,
                    },
                );
                Ok(id)
            })
            .await
    }

    async fn get_user(&mut self, id: i32) -> Result<Option<User>, Error> {
        self.handle.with(|t| Ok(t.users.get(&id).cloned())).await
    }

    async fn get_user_by_username(&mut self, username: &str) -> Result<Option<User>, Error> {
        self.handle.with(|t| Ok(t.users.values().find(|u| u.username == username).cloned())).await
    }

    async fn replace_role(&mut self, id: i32, from: Role, to: Role) -> Result<bool, Error> {
        self.handle
            .with(|t| match t.users.get_mut(&id) {
                Some(user) if user.role == from => {
                    user.role = to;
                    user.updated_at = Utc::now();
                    Ok(true)
                }
                _ => Ok(false),
            })
            .await
    }
}

impl<H: Handle> ClubCommon for Memory<H> {
    async fn insert_club(&mut self, club: ClubInsert) -> Result<i32, Error> {
        self.handle
            .with(|t| {
                t.check(FailPoint::InsertClub)?;
                let id = t.next_id();
                let now = Utc::now();
                t.clubs.insert(
                    id,
                    Club {
                        id,
                        name: club.name,
                        leader_id: club.leader_id,
                        category_id: club.category_id,
                        description: club.description,
                        logo_url: club.logo_url,
                        tags: club.tags,
                        member_count: 0,
                        requirements: club.requirements,
                        created_at: now,
                        updated_at: now,
                    },
                );
                Ok(id)
            })
            .await
    }

    async fn get_club(&mut self, id: i32) -> Result<Option<Club>, Error> {
        self.handle.with(|t| Ok(t.clubs.get(&id).cloned())).await
    }

    async fn get_club_for_update(&mut self, id: i32) -> Result<Option<Club>, Error> {
        self.get_club(id).await
    }

    async fn update_club(&mut self, id: i32, patch: ClubPatch) -> Result<(), Error> {
        self.handle
            .with(|t| {
                let club = t.clubs.get_mut(&id).ok_or_else(|| Error::not_found("club", id))?;
                patch.apply(club);
                club.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    async fn adjust_member_count(&mut self, id: i32, delta: i32) -> Result<(), Error> {
        self.handle
            .with(|t| {
                let club = t.clubs.get_mut(&id).ok_or_else(|| Error::not_found("club", id))?;
                club.member_count += delta;
                Ok(())
            })
            .await
    }

    async fn query_clubs(&mut self, query: &ClubQuery, pagination: Option<Pagination>) -> Result<Vec<Club>, Error> {
        self.handle
            .with(|t| {
                let t = &*t;
                let rows = t
                    .clubs
                    .values()
                    .filter(|c| club_matches(t, c, query))
                    .sorted_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)))
                    .cloned();
                Ok(paginate(rows, pagination))
            })
            .await
    }

    async fn count_clubs(&mut self, query: &ClubQuery) -> Result<i64, Error> {
        self.handle
            .with(|t| {
                let t = &*t;
                Ok(t.clubs.values().filter(|c| club_matches(t, c, query)).count() as i64)
            })
            .await
    }
}

fn club_matches(t: &Tables, club: &Club, query: &ClubQuery) -> bool {
    if let Some(category_id) = query.category_id {
        if club.category_id != category_id {
            return false;
        }
    }
    if let Some(member_id) = query.member_id {
        if !t.members.values().any(|m| m.club_id == club.id && m.user_id == member_id) {
            return false;
        }
    }
    true
}

impl<H: Handle> ClubMemberCommon for Memory<H> {
    async fn insert_member(&mut self, member: MemberInsert) -> Result<i32, Error> {
        self.handle
            .with(|t| {
                t.check(FailPoint::InsertMember)?;
                if t.members.values().any(|m| m.user_id == member.user_id && m.club_id == member.club_id) {
                    return Err(Error::AlreadyMember {
                        user_id: member.user_id,
                        club_id: member.club_id,
                    });
                }
                let id = t.next_id();
                t.members.insert(
                    id,
                    ClubMember {
                        id,
                        user_id: member.user_id,
                        club_id: member.club_id,
                        role: member.role,
                        joined_at: Utc::now(),
                        last_active: None,
                    },
                );
                Ok(id)
            })
            .await
    }

    async fn get_member(&mut self, user_id: i32, club_id: i32) -> Result<Option<ClubMember>, Error> {
        self.handle
            .with(|t| Ok(t.members.values().find(|m| m.user_id == user_id && m.club_id == club_id).cloned()))
            .await
    }

    async fn members_of_club(&mut self, club_id: i32) -> Result<Vec<ClubMember>, Error> {
        self.handle.with(|t| Ok(t.members.values().filter(|m| m.club_id == club_id).cloned().collect())).await
    }

    async fn memberships_of_user(&mut self, user_id: i32) -> Result<Vec<ClubMember>, Error> {
        self.handle.with(|t| Ok(t.members.values().filter(|m| m.user_id == user_id).cloned().collect())).await
    }

    async fn delete_member(&mut self, user_id: i32, club_id: i32) -> Result<bool, Error> {
        self.handle
            .with(|t| {
                let before = t.members.len();
                t.members.retain(|_, m| !(m.user_id == user_id && m.club_id == club_id));
                Ok(t.members.len() != before)
            })
            .await
    }
}

impl<H: Handle> CategoryCommon for Memory<H> {
    async fn insert_category(&mut self, name: &str) -> Result<i32, Error> {
        self.handle
            .with(|t| {
                if t.categories.values().any(|c| c.name == name) {
                    return Err(Error::Storage(format!("duplicate category {}", name)));
                }
                let id = t.next_id();
                t.categories.insert(id, Category { id, name: name.to_owned() });
                Ok(id)
            })
            .await
    }

    async fn categories(&mut self) -> Result<Vec<Category>, Error> {
        self.handle.with(|t| Ok(t.categories.values().cloned().collect())).await
    }
}

impl<H: Handle> FavoriteCommon for Memory<H> {
    async fn insert_favorite(&mut self, user_id: i32, club_id: i32) -> Result<(), Error> {
        self.handle
            .with(|t| {
                if t.favorites.values().any(|f| f.user_id == user_id && f.club_id == club_id) {
                    return Ok(());
                }
                let id = t.next_id();
                t.favorites.insert(
                    id,
                    Favorite {
                        id,
                        user_id,
                        club_id,
                        created_at: Utc::now(),
                    },
                );
                Ok(())
            })
            .await
    }

    async fn delete_favorite(&mut self, user_id: i32, club_id: i32) -> Result<bool, Error> {
        self.handle
            .with(|t| {
                let before = t.favorites.len();
                t.favorites.retain(|_, f| !(f.user_id == user_id && f.club_id == club_id));
                Ok(t.favorites.len() != before)
            })
            .await
    }

    async fn favorite_club_ids(&mut self, user_id: i32) -> Result<Vec<i32>, Error> {
        self.handle
            .with(|t| {
                Ok(t.favorites
                    .values()
                    .filter(|f| f.user_id == user_id)
                    .sorted_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)))
                    .map(|f| f.club_id)
                    .collect())
            })
            .await
    }
}

impl<H: Handle> ApplicationCommon for Memory<H> {
    async fn insert_application_unique(&mut self, kind: ApplicationKind, application: ApplicationInsert) -> Result<i32, Error> {
        self.handle
            .with(|t| {
                let scope = kind.conflict_scope(&application)?;
                let live = kind.live_statuses();
                let existing = t.applications_mut(kind).values().find(|a| live.contains(&a.status) && scope.matches(a)).map(|a| a.id);
                if let Some(id) = existing {
                    return Err(Error::Conflict { kind, existing: Some(id) });
                }
                let id = t.next_id();
                t.applications_mut(kind).insert(
                    id,
                    Application {
                        id,
                        applicant_id: application.applicant_id,
                        club_id: application.club_id,
                        proposal: application.proposal,
                        status: ApplicationStatus::Pending,
                        applied_at: Utc::now(),
                        reviewed_at: None,
                        rejected_reason: None,
                    },
                );
                Ok(id)
            })
            .await
    }

    async fn get_application(&mut self, kind: ApplicationKind, id: i32) -> Result<Option<Application>, Error> {
        self.handle.with(|t| Ok(t.application(kind, id))).await
    }

    async fn get_application_for_update(&mut self, kind: ApplicationKind, id: i32) -> Result<Option<Application>, Error> {
        self.get_application(kind, id).await
    }

    async fn mark_application_approved(&mut self, kind: ApplicationKind, id: i32) -> Result<(), Error> {
        self.handle
            .with(|t| {
                t.check(FailPoint::MarkApproved)?;
                let app = t.applications_mut(kind).get_mut(&id).ok_or_else(|| Error::not_found("application", id))?;
                app.status = ApplicationStatus::Approved;
                app.reviewed_at = Some(Utc::now());
                Ok(())
            })
            .await
    }

    async fn reject_application(&mut self, kind: ApplicationKind, id: i32, reason: &str) -> Result<bool, Error> {
        self.handle
            .with(|t| match t.applications_mut(kind).get_mut(&id) {
                Some(app) if app.status == ApplicationStatus::Pending => {
                    app.status = ApplicationStatus::Rejected;
                    app.rejected_reason = Some(reason.to_owned());
                    app.reviewed_at = Some(Utc::now());
                    Ok(true)
                }
                _ => Ok(false),
            })
            .await
    }

    async fn query_applications(&mut self, kind: ApplicationKind, query: &ApplicationQuery, pagination: Option<Pagination>) -> Result<Vec<Application>, Error> {
        self.handle
            .with(|t| {
                let rows = t
                    .applications_mut(kind)
                    .values()
                    .filter(|a| query.applicant_id.map_or(true, |uid| a.applicant_id == uid))
                    .filter(|a| query.club_id.map_or(true, |cid| a.club_id == Some(cid)))
                    .filter(|a| query.statuses.as_ref().map_or(true, |s| s.contains(&a.status)))
                    .sorted_by(|a, b| a.applied_at.cmp(&b.applied_at).then(a.id.cmp(&b.id)))
                    .cloned();
                Ok(paginate(rows, pagination))
            })
            .await
    }
}

impl<H: Handle> Common for Memory<H> {}
impl Store for Memory<Shared> {}
impl Store for Memory<Exclusive> {}

impl TxStore for Memory<Exclusive> {
    async fn commit(self) -> Result<(), Error> {
        let Exclusive { mut guard, work } = self.handle;
        *guard = work;
        Ok(())
    }

    async fn rollback(self) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryManager {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Manager for MemoryManager {
    type Store = Memory<Shared>;
    type TxStore = Memory<Exclusive>;

    async fn db(&self) -> Result<Memory<Shared>, Error> {
        Ok(Memory {
            handle: Shared { tables: self.tables.clone() },
        })
    }

    async fn tx(&self) -> Result<Memory<Exclusive>, Error> {
        let guard = self.tables.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Memory {
            handle: Exclusive { guard, work },
        })
    }
}

#[cfg(test)]
impl MemoryManager {
    pub async fn inject_failure(&self, point: FailPoint) {
        self.tables.lock().await.fail_at = Some(point);
    }

    pub async fn clear_failure(&self) {
        self.tables.lock().await.fail_at = None;
    }

    pub async fn seed_user(&self, username: &str, role: Role) -> i32 {
        let mut db = self.db().await.unwrap();
        db.insert_user(UserInsert {
            username: username.into(),
            email: format!("{}@example.edu", username),
            password_hash: "x".into(),
            avatar_url: None,
            role,
        })
        .await
        .unwrap()
    }

    /// A club with `leader_id` already recorded as its leader member.
    pub async fn seed_club(&self, leader_id: i32, name: &str, category_id: i32) -> i32 {
        use crate::core::models::club::ClubRole;
        let mut db = self.db().await.unwrap();
        let club_id = db
            .insert_club(ClubInsert {
                name: name.into(),
                leader_id,
                category_id,
                description: String::new(),
                logo_url: None,
                tags: vec![],
                requirements: String::new(),
            })
            .await
            .unwrap();
        db.insert_member(MemberInsert {
            user_id: leader_id,
            club_id,
            role: ClubRole::Leader,
        })
        .await
        .unwrap();
        db.adjust_member_count(club_id, 1).await.unwrap();
        club_id
    }
}
