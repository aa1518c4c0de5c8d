use crate::core::models::{
    application::{Application, ApplicationKind, ApplicationStatus, ConflictScope, Insert as ApplicationInsert, Query as ApplicationQuery},
    club::{Category, Club, ClubMember, ClubPatch, Insert as ClubInsert, MemberInsert, Query as ClubQuery},
    common::Pagination,
    user::{Insert as UserInsert, Role, User},
};
use crate::core::ports::repository::{ApplicationCommon, CategoryCommon, ClubCommon, ClubMemberCommon, Common, FavoriteCommon, Manager, Store, TxStore, UserCommon};
use crate::error::Error;
use sqlx::pool::PoolConnection;
use sqlx::{query, query_as, query_scalar, Executor, PgPool, Postgres, QueryBuilder, Transaction};

const UNIQUE_VIOLATION: &str = "23505";

fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

pub struct PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e>,
{
    executor: E,
}

impl<E> PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }
}

impl<E> UserCommon for PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e, Database = Postgres>,
{
    async fn insert_user(&mut self, user: UserInsert) -> Result<i32, Error> {
        let id = query_scalar("INSERT INTO users (username, email, password_hash, avatar_url, role) VALUES ($1, $2, $3, $4, $5) RETURNING id")
            .bind(user.username)
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.avatar_url)
            .bind(user.role)
            .fetch_one(&mut self.executor)
            .await?;
        Ok(id)
    }

    async fn get_user(&mut self, id: i32) -> Result<Option<User>, Error> {
        let user = query_as("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(&mut self.executor).await?;
        Ok(user)
    }

    async fn get_user_by_username(&mut self, username: &str) -> Result<Option<User>, Error> {
        let user = query_as("SELECT * FROM users WHERE username = $1").bind(username).fetch_optional(&mut self.executor).await?;
        Ok(user)
    }

    async fn replace_role(&mut self, id: i32, from: Role, to: Role) -> Result<bool, Error> {
        let res = query("UPDATE users SET role = $1, updated_at = NOW() WHERE id = $2 AND role = $3")
            .bind(to)
            .bind(id)
            .bind(from)
            .execute(&mut self.executor)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

impl<E> ClubCommon for PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e, Database = Postgres>,
{
    async fn insert_club(&mut self, club: ClubInsert) -> Result<i32, Error> {
        let id = query_scalar(
            "INSERT INTO clubs (name, leader_id, category_id, description, logo_url, tags, requirements)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id",
        )
        .bind(club.name)
        .bind(club.leader_id)
        .bind(club.category_id)
        .bind(club.description)
        .bind(club.logo_url)
        .bind(club.tags)
        .bind(club.requirements)
        .fetch_one(&mut self.executor)
        .await?;
        Ok(id)
    }

    async fn get_club(&mut self, id: i32) -> Result<Option<Club>, Error> {
        let club = query_as("SELECT * FROM clubs WHERE id = $1").bind(id).fetch_optional(&mut self.executor).await?;
        Ok(club)
    }

    async fn get_club_for_update(&mut self, id: i32) -> Result<Option<Club>, Error> {
        let club = query_as("SELECT * FROM clubs WHERE id = $1 FOR UPDATE").bind(id).fetch_optional(&mut self.executor).await?;
        Ok(club)
    }

    async fn update_club(&mut self, id: i32, patch: ClubPatch) -> Result<(), Error> {
        let res = query(
            "
        UPDATE clubs SET
            name = COALESCE($1, name),
            description = COALESCE($2, description),
            category_id = COALESCE($3, category_id),
            tags = COALESCE($4, tags),
            requirements = COALESCE($5, requirements),
            logo_url = COALESCE($6, logo_url),
            updated_at = NOW()
        WHERE id = $7",
        )
        .bind(patch.name)
        .bind(patch.description)
        .bind(patch.category_id)
        .bind(patch.tags)
        .bind(patch.requirements)
        .bind(patch.logo_url)
        .bind(id)
        .execute(&mut self.executor)
        .await?;
        if res.rows_affected() == 0 {
            return Err(Error::not_found("club", id));
        }
        Ok(())
    }

    async fn adjust_member_count(&mut self, id: i32, delta: i32) -> Result<(), Error> {
        let res = query("UPDATE clubs SET member_count = member_count + $1 WHERE id = $2")
            .bind(delta)
            .bind(id)
            .execute(&mut self.executor)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::not_found("club", id));
        }
        Ok(())
    }

    async fn query_clubs(&mut self, query: &ClubQuery, pagination: Option<Pagination>) -> Result<Vec<Club>, Error> {
        let mut stmt = QueryBuilder::new("SELECT * FROM clubs WHERE 1 = 1");
        push_club_filters(&mut stmt, query);
        stmt.push(" ORDER BY created_at DESC, id DESC");
        if let Some(p) = pagination {
            stmt.push(" LIMIT ").push_bind(p.limit());
            stmt.push(" OFFSET ").push_bind(p.offset());
        }
        let clubs = stmt.build_query_as().fetch_all(&mut self.executor).await?;
        Ok(clubs)
    }

    async fn count_clubs(&mut self, query: &ClubQuery) -> Result<i64, Error> {
        let mut stmt = QueryBuilder::new("SELECT COUNT(*) FROM clubs WHERE 1 = 1");
        push_club_filters(&mut stmt, query);
        let (n,) = stmt.build_query_as().fetch_one(&mut self.executor).await?;
        Ok(n)
    }
}

fn push_club_filters(stmt: &mut QueryBuilder<Postgres>, query: &ClubQuery) {
    if let Some(category_id) = query.category_id {
        stmt.push(" AND category_id = ").push_bind(category_id);
    }
    if let Some(member_id) = query.member_id {
        stmt.push(" AND id IN (SELECT club_id FROM club_members WHERE user_id = ").push_bind(member_id).push(")");
    }
}

impl<E> ClubMemberCommon for PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e, Database = Postgres>,
{
    async fn insert_member(&mut self, member: MemberInsert) -> Result<i32, Error> {
        let id: Option<i32> = query_scalar(
            "INSERT INTO club_members (user_id, club_id, role) VALUES ($1, $2, $3)
            ON CONFLICT (user_id, club_id) DO NOTHING
            RETURNING id",
        )
        .bind(member.user_id)
        .bind(member.club_id)
        .bind(member.role)
        .fetch_optional(&mut self.executor)
        .await?;
        id.ok_or(Error::AlreadyMember {
            user_id: member.user_id,
            club_id: member.club_id,
        })
    }

    async fn get_member(&mut self, user_id: i32, club_id: i32) -> Result<Option<ClubMember>, Error> {
        let member = query_as("SELECT * FROM club_members WHERE user_id = $1 AND club_id = $2")
            .bind(user_id)
            .bind(club_id)
            .fetch_optional(&mut self.executor)
            .await?;
        Ok(member)
    }

    async fn members_of_club(&mut self, club_id: i32) -> Result<Vec<ClubMember>, Error> {
        let members = query_as("SELECT * FROM club_members WHERE club_id = $1 ORDER BY id")
            .bind(club_id)
            .fetch_all(&mut self.executor)
            .await?;
        Ok(members)
    }

    async fn memberships_of_user(&mut self, user_id: i32) -> Result<Vec<ClubMember>, Error> {
        let members = query_as("SELECT * FROM club_members WHERE user_id = $1 ORDER BY id")
            .bind(user_id)
            .fetch_all(&mut self.executor)
            .await?;
        Ok(members)
    }

    async fn delete_member(&mut self, user_id: i32, club_id: i32) -> Result<bool, Error> {
        let res = query("DELETE FROM club_members WHERE user_id = $1 AND club_id = $2")
            .bind(user_id)
            .bind(club_id)
            .execute(&mut self.executor)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

impl<E> CategoryCommon for PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e, Database = Postgres>,
{
    async fn insert_category(&mut self, name: &str) -> Result<i32, Error> {
        let id = query_scalar("INSERT INTO categories (name) VALUES ($1) RETURNING id").bind(name).fetch_one(&mut self.executor).await?;
        Ok(id)
    }

    async fn categories(&mut self) -> Result<Vec<Category>, Error> {
        let categories = query_as("SELECT * FROM categories ORDER BY id").fetch_all(&mut self.executor).await?;
        Ok(categories)
    }
}

impl<E> FavoriteCommon for PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e, Database = Postgres>,
{
    async fn insert_favorite(&mut self, user_id: i32, club_id: i32) -> Result<(), Error> {
        query("INSERT INTO club_favorites (user_id, club_id) VALUES ($1, $2) ON CONFLICT (user_id, club_id) DO NOTHING")
            .bind(user_id)
            .bind(club_id)
            .execute(&mut self.executor)
            .await?;
        Ok(())
    }

    async fn delete_favorite(&mut self, user_id: i32, club_id: i32) -> Result<bool, Error> {
        let res = query("DELETE FROM club_favorites WHERE user_id = $1 AND club_id = $2")
            .bind(user_id)
            .bind(club_id)
            .execute(&mut self.executor)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn favorite_club_ids(&mut self, user_id: i32) -> Result<Vec<i32>, Error> {
        let ids = query_scalar("SELECT club_id FROM club_favorites WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&mut self.executor)
            .await?;
        Ok(ids)
    }
}

fn push_scope(stmt: &mut QueryBuilder<Postgres>, scope: ConflictScope) {
    match scope {
        ConflictScope::Applicant(uid) => {
            stmt.push(" AND applicant_id = ").push_bind(uid);
        }
        ConflictScope::ApplicantInClub(uid, cid) => {
            stmt.push(" AND applicant_id = ").push_bind(uid);
            stmt.push(" AND club_id = ").push_bind(cid);
        }
        ConflictScope::Club(cid) => {
            stmt.push(" AND club_id = ").push_bind(cid);
        }
    }
}

fn push_statuses(stmt: &mut QueryBuilder<Postgres>, statuses: &[ApplicationStatus]) {
    stmt.push(" AND status IN (");
    {
        let mut list = stmt.separated(", ");
        for status in statuses {
            list.push_bind(*status);
        }
    }
    stmt.push(")");
}

impl<E> ApplicationCommon for PgSqlx<E>
where
    for<'e> &'e mut E: Executor<'e, Database = Postgres>,
{
    async fn insert_application_unique(&mut self, kind: ApplicationKind, application: ApplicationInsert) -> Result<i32, Error> {
        let scope = kind.conflict_scope(&application)?;
        // FOR UPDATE cannot lock a row that does not exist yet, so concurrent
        // submitters for the same slot queue on an advisory lock instead.
        query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(scope.lock_key(kind))
            .execute(&mut self.executor)
            .await?;
        let mut stmt = QueryBuilder::new(format!("SELECT id FROM {} WHERE 1 = 1", kind.table()));
        push_scope(&mut stmt, scope);
        push_statuses(&mut stmt, kind.live_statuses());
        stmt.push(" LIMIT 1 FOR UPDATE");
        let existing: Option<(i32,)> = stmt.build_query_as().fetch_optional(&mut self.executor).await?;
        if let Some((id,)) = existing {
            return Err(Error::Conflict { kind, existing: Some(id) });
        }
        let inserted: Result<i32, sqlx::Error> = query_scalar(&format!("INSERT INTO {} (applicant_id, club_id, proposal) VALUES ($1, $2, $3) RETURNING id", kind.table()))
            .bind(application.applicant_id)
            .bind(application.club_id)
            .bind(application.proposal)
            .fetch_one(&mut self.executor)
            .await;
        match inserted {
            Ok(id) => Ok(id),
            // the partial unique index caught a writer that skipped the lock
            Err(e) if is_unique_violation(&e) => Err(Error::Conflict { kind, existing: None }),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_application(&mut self, kind: ApplicationKind, id: i32) -> Result<Option<Application>, Error> {
        let app = query_as(&format!("SELECT * FROM {} WHERE id = $1", kind.table()))
            .bind(id)
            .fetch_optional(&mut self.executor)
            .await?;
        Ok(app)
    }

    async fn get_application_for_update(&mut self, kind: ApplicationKind, id: i32) -> Result<Option<Application>, Error> {
        let app = query_as(&format!("SELECT * FROM {} WHERE id = $1 FOR UPDATE", kind.table()))
            .bind(id)
            .fetch_optional(&mut self.executor)
            .await?;
        Ok(app)
    }

    async fn mark_application_approved(&mut self, kind: ApplicationKind, id: i32) -> Result<(), Error> {
        let res = query(&format!("UPDATE {} SET status = $1, reviewed_at = NOW() WHERE id = $2", kind.table()))
            .bind(ApplicationStatus::Approved)
            .bind(id)
            .execute(&mut self.executor)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::not_found("application", id));
        }
        Ok(())
    }

    async fn reject_application(&mut self, kind: ApplicationKind, id: i32, reason: &str) -> Result<bool, Error> {
        let res = query(&format!(
            "UPDATE {} SET status = $1, rejected_reason = $2, reviewed_at = NOW() WHERE id = $3 AND status = $4",
            kind.table()
        ))
        .bind(ApplicationStatus::Rejected)
        .bind(reason)
        .bind(id)
        .bind(ApplicationStatus::Pending)
        .execute(&mut self.executor)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn query_applications(&mut self, kind: ApplicationKind, query: &ApplicationQuery, pagination: Option<Pagination>) -> Result<Vec<Application>, Error> {
        let mut stmt = QueryBuilder::new(format!("SELECT * FROM {} WHERE 1 = 1", kind.table()));
        if let Some(uid) = query.applicant_id {
            stmt.push(" AND applicant_id = ").push_bind(uid);
        }
        if let Some(cid) = query.club_id {
            stmt.push(" AND club_id = ").push_bind(cid);
        }
        if let Some(statuses) = &query.statuses {
            if statuses.is_empty() {
                return Ok(vec![]);
            }
            push_statuses(&mut stmt, statuses);
        }
        stmt.push(" ORDER BY applied_at, id");
        if let Some(p) = pagination {
            stmt.push(" LIMIT ").push_bind(p.limit());
            stmt.push(" OFFSET ").push_bind(p.offset());
        }
        let apps = stmt.build_query_as().fetch_all(&mut self.executor).await?;
        Ok(apps)
    }
}

impl Common for PgSqlx<PoolConnection<Postgres>> {}
impl Common for PgSqlx<Transaction<'static, Postgres>> {}
impl Store for PgSqlx<PoolConnection<Postgres>> {}
impl Store for PgSqlx<Transaction<'static, Postgres>> {}

impl TxStore for PgSqlx<Transaction<'static, Postgres>> {
    async fn commit(self) -> Result<(), Error> {
        self.executor.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), Error> {
        self.executor.rollback().await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PgSqlxManager {
    pool: PgPool,
}

impl PgSqlxManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl Manager for PgSqlxManager {
    type Store = PgSqlx<PoolConnection<Postgres>>;
    type TxStore = PgSqlx<Transaction<'static, Postgres>>;

    async fn db(&self) -> Result<Self::Store, Error> {
        let conn = self.pool.acquire().await?;
        Ok(PgSqlx::new(conn))
    }

    async fn tx(&self) -> Result<Self::TxStore, Error> {
        // READ COMMITTED is enough: every decision is taken under a row or advisory lock
        let tx = self.pool.begin().await?;
        Ok(PgSqlx::new(tx))
    }
}
