use log::{debug, info, warn};
use std::time::Duration;

use crate::core::codec::ProposalCodec;
use crate::core::models::{
    application::{Application, ApplicationKind, ApplicationStatus, Insert as ApplicationInsert, JoinProposal, Query as ApplicationQuery},
    club::{Club, ClubMember, ClubPatch, ClubProposal, ClubRole, Insert as ClubInsert, MemberInsert, Query as ClubQuery},
    common::Pagination,
    user::Role,
};
use crate::core::ports::repository::{ApplicationCommon, ClubCommon, ClubMemberCommon, Manager, TxStore, UserCommon};
use crate::core::transaction::{run_in_transaction, within};
use crate::error::Error;

/// Submission and review of create-club, join-club and update-club-info
/// applications.
///
/// Every approval locks the application row first and re-checks that it is
/// still pending, so a repeated or concurrent approval fails with
/// `Error::InvalidState` instead of applying its side effects twice. The
/// service keeps no state between calls.
#[derive(Debug, Clone)]
pub struct Workflow<M, C> {
    manager: M,
    codec: C,
    deadline: Duration,
}

impl<M, C> Workflow<M, C>
where
    M: Manager,
    C: ProposalCodec,
{
    pub fn new(manager: M, codec: C, deadline: Duration) -> Self {
        Self { manager, codec, deadline }
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    async fn submit(&self, kind: ApplicationKind, insert: ApplicationInsert) -> Result<i32, Error> {
        let (applicant_id, club_id) = (insert.applicant_id, insert.club_id);
        let res = run_in_transaction(&self.manager, self.deadline, move |tx| {
            Box::pin(async move {
                if let Some(club_id) = insert.club_id {
                    tx.get_club(club_id).await?.ok_or_else(|| Error::not_found("club", club_id))?;
                }
                tx.insert_application_unique(kind, insert).await
            })
        })
        .await;
        match &res {
            Ok(id) => info!("{} application {} submitted (applicant: {}, club: {:?})", kind, id, applicant_id, club_id),
            Err(Error::Conflict { existing, .. }) => warn!("{} application rejected as duplicate (applicant: {}, club: {:?}, existing: {:?})", kind, applicant_id, club_id, existing),
            Err(e) => warn!("failed to submit {} application (applicant: {}, club: {:?}): {}", kind, applicant_id, club_id, e),
        }
        res
    }

    pub async fn submit_create_club_application(&self, applicant_id: i32, proposal: &ClubProposal) -> Result<i32, Error> {
        let proposal = self.codec.encode(proposal)?;
        self.submit(
            ApplicationKind::CreateClub,
            ApplicationInsert {
                applicant_id,
                club_id: None,
                proposal,
            },
        )
        .await
    }

    pub async fn submit_join_club_application(&self, applicant_id: i32, club_id: i32, reason: &str) -> Result<i32, Error> {
        let proposal = self.codec.encode(&JoinProposal { reason: reason.to_owned() })?;
        self.submit(
            ApplicationKind::JoinClub,
            ApplicationInsert {
                applicant_id,
                club_id: Some(club_id),
                proposal,
            },
        )
        .await
    }

    pub async fn submit_update_club_info_application(&self, club_id: i32, applicant_id: i32, patch: &ClubPatch) -> Result<i32, Error> {
        let proposal = self.codec.encode(patch)?;
        self.submit(
            ApplicationKind::UpdateClubInfo,
            ApplicationInsert {
                applicant_id,
                club_id: Some(club_id),
                proposal,
            },
        )
        .await
    }

    /// Approves a create-club application and returns the new club's id.
    pub async fn approve_create_club_application(&self, id: i32) -> Result<i32, Error> {
        let kind = ApplicationKind::CreateClub;
        let codec = self.codec.clone();
        let res = run_in_transaction(&self.manager, self.deadline, move |tx| {
            Box::pin(async move {
                let app = lock_pending(tx, kind, id).await?;
                tx.mark_application_approved(kind, id).await?;
                let proposal: ClubProposal = codec.decode(&app.proposal)?;
                let club_id = tx.insert_club(ClubInsert::from_proposal(proposal, app.applicant_id)).await?;
                promote_to_club_leader(tx, app.applicant_id).await?;
                tx.insert_member(MemberInsert {
                    user_id: app.applicant_id,
                    club_id,
                    role: ClubRole::Leader,
                })
                .await?;
                tx.adjust_member_count(club_id, 1).await?;
                Ok(club_id)
            })
        })
        .await;
        log_review(kind, id, "approve", &res);
        res
    }

    pub async fn approve_join_club_application(&self, id: i32) -> Result<(), Error> {
        let kind = ApplicationKind::JoinClub;
        let res = run_in_transaction(&self.manager, self.deadline, move |tx| {
            Box::pin(async move {
                let app = lock_pending(tx, kind, id).await?;
                let club_id = club_of(&app)?;
                tx.get_club_for_update(club_id).await?.ok_or_else(|| Error::not_found("club", club_id))?;
                tx.insert_member(MemberInsert {
                    user_id: app.applicant_id,
                    club_id,
                    role: ClubRole::Member,
                })
                .await?;
                tx.adjust_member_count(club_id, 1).await?;
                tx.mark_application_approved(kind, id).await
            })
        })
        .await;
        log_review(kind, id, "approve", &res);
        res
    }

    pub async fn approve_update_club_info_application(&self, id: i32) -> Result<(), Error> {
        let kind = ApplicationKind::UpdateClubInfo;
        let codec = self.codec.clone();
        let res = run_in_transaction(&self.manager, self.deadline, move |tx| {
            Box::pin(async move {
                let app = lock_pending(tx, kind, id).await?;
                let club_id = club_of(&app)?;
                tx.get_club_for_update(club_id).await?.ok_or_else(|| Error::not_found("club", club_id))?;
                let patch: ClubPatch = codec.decode(&app.proposal)?;
                tx.update_club(club_id, patch).await?;
                tx.mark_application_approved(kind, id).await
            })
        })
        .await;
        log_review(kind, id, "approve", &res);
        res
    }

    pub async fn reject_create_club_application(&self, id: i32, reason: &str) -> Result<(), Error> {
        self.reject(ApplicationKind::CreateClub, id, reason).await
    }

    pub async fn reject_join_club_application(&self, id: i32, reason: &str) -> Result<(), Error> {
        self.reject(ApplicationKind::JoinClub, id, reason).await
    }

    pub async fn reject_update_club_info_application(&self, id: i32, reason: &str) -> Result<(), Error> {
        self.reject(ApplicationKind::UpdateClubInfo, id, reason).await
    }

    /// One guarded update; the follow-up read only classifies a miss.
    async fn reject(&self, kind: ApplicationKind, id: i32, reason: &str) -> Result<(), Error> {
        let res = within(self.deadline, async {
            let mut db = self.manager.db().await?;
            if db.reject_application(kind, id, reason).await? {
                return Ok(());
            }
            match db.get_application(kind, id).await? {
                None => Err(Error::not_found("application", id)),
                Some(app) => Err(Error::InvalidState { id, status: app.status }),
            }
        })
        .await;
        log_review(kind, id, "reject", &res);
        res
    }

    pub async fn application(&self, kind: ApplicationKind, id: i32) -> Result<Application, Error> {
        within(self.deadline, async {
            let mut db = self.manager.db().await?;
            db.get_application(kind, id).await?.ok_or_else(|| Error::not_found("application", id))
        })
        .await
    }

    pub async fn applications_of_applicant(&self, kind: ApplicationKind, applicant_id: i32) -> Result<Vec<Application>, Error> {
        let query = ApplicationQuery {
            applicant_id: Some(applicant_id),
            ..default::default()
        };
        self.query_applications(kind, query, None).await
    }

    /// Review queue of a club: applications still holding a live slot.
    pub async fn live_applications_for_club(&self, kind: ApplicationKind, club_id: i32) -> Result<Vec<Application>, Error> {
        if !kind.requires_club() {
            return Err(Error::InvalidArgument(format!("{} applications are not tied to a club", kind)));
        }
        let query = ApplicationQuery {
            club_id: Some(club_id),
            statuses: Some(kind.live_statuses().to_vec()),
            ..default::default()
        };
        self.query_applications(kind, query, None).await
    }

    pub async fn pending_applications(&self, kind: ApplicationKind, pagination: Pagination) -> Result<Vec<Application>, Error> {
        let query = ApplicationQuery {
            statuses: Some(vec![ApplicationStatus::Pending]),
            ..default::default()
        };
        self.query_applications(kind, query, Some(pagination)).await
    }

    async fn query_applications(&self, kind: ApplicationKind, query: ApplicationQuery, pagination: Option<Pagination>) -> Result<Vec<Application>, Error> {
        within(self.deadline, async {
            let mut db = self.manager.db().await?;
            db.query_applications(kind, &query, pagination).await
        })
        .await
    }

    pub async fn memberships_of_user(&self, user_id: i32) -> Result<Vec<ClubMember>, Error> {
        within(self.deadline, async {
            let mut db = self.manager.db().await?;
            db.memberships_of_user(user_id).await
        })
        .await
    }

    pub async fn clubs_of_user(&self, user_id: i32) -> Result<Vec<Club>, Error> {
        within(self.deadline, async {
            let mut db = self.manager.db().await?;
            let query = ClubQuery {
                member_id: Some(user_id),
                ..default::default()
            };
            db.query_clubs(&query, None).await
        })
        .await
    }

    pub async fn members_of_club(&self, club_id: i32) -> Result<Vec<ClubMember>, Error> {
        within(self.deadline, async {
            let mut db = self.manager.db().await?;
            db.get_club(club_id).await?.ok_or_else(|| Error::not_found("club", club_id))?;
            db.members_of_club(club_id).await
        })
        .await
    }
}

async fn lock_pending<T: TxStore>(tx: &mut T, kind: ApplicationKind, id: i32) -> Result<Application, Error> {
    let app = tx.get_application_for_update(kind, id).await?.ok_or_else(|| Error::not_found("application", id))?;
    if app.status.is_terminal() {
        return Err(Error::InvalidState { id, status: app.status });
    }
    Ok(app)
}

fn club_of(app: &Application) -> Result<i32, Error> {
    app.club_id.ok_or_else(|| Error::InvalidArgument(format!("application {} has no club", app.id)))
}

/// Role promotion step of create-club approval. Only a plain `user` becomes a
/// `club_leader`; any other role is kept as it is.
async fn promote_to_club_leader<T: TxStore>(tx: &mut T, user_id: i32) -> Result<(), Error> {
    if tx.replace_role(user_id, Role::User, Role::ClubLeader).await? {
        info!("user {} promoted to {}", user_id, Role::ClubLeader);
        return Ok(());
    }
    let user = tx.get_user(user_id).await?.ok_or_else(|| Error::not_found("user", user_id))?;
    debug!("user {} keeps role {}", user_id, user.role);
    Ok(())
}

fn log_review<T>(kind: ApplicationKind, id: i32, action: &str, res: &Result<T, Error>) {
    match res {
        Ok(_) => info!("{} application {}: {} done", kind, id, action),
        Err(e) if e.is_client_error() => warn!("{} application {}: {} refused: {}", kind, id, action, e),
        Err(e) => log::error!("{} application {}: {} failed: {}", kind, id, action, e),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::ports::repository::Manager;
    use crate::database::memory::{FailPoint, MemoryManager};
    use crate::impls::codec::json::JsonCodec;

    type TestWorkflow = Workflow<MemoryManager, JsonCodec>;

    fn workflow() -> (TestWorkflow, MemoryManager) {
        let manager = MemoryManager::new();
        (Workflow::new(manager.clone(), JsonCodec, Duration::from_secs(5)), manager)
    }

    fn chess() -> ClubProposal {
        ClubProposal {
            name: "Chess Club".into(),
            category_id: 3,
            ..Default::default()
        }
    }

    async fn role_of(manager: &MemoryManager, uid: i32) -> Role {
        let mut db = manager.db().await.unwrap();
        db.get_user(uid).await.unwrap().unwrap().role
    }

    async fn club_count(manager: &MemoryManager) -> i64 {
        let mut db = manager.db().await.unwrap();
        db.count_clubs(&ClubQuery::default()).await.unwrap()
    }

    async fn status_of(wf: &TestWorkflow, kind: ApplicationKind, id: i32) -> ApplicationStatus {
        wf.application(kind, id).await.unwrap().status
    }

    #[tokio::test]
    async fn test_chess_club_scenario() {
        let (wf, manager) = workflow();
        let u1 = manager.seed_user("u1", Role::User).await;
        let app_id = wf.submit_create_club_application(u1, &chess()).await.unwrap();
        let club_id = wf.approve_create_club_application(app_id).await.unwrap();

        let app = wf.application(ApplicationKind::CreateClub, app_id).await.unwrap();
        assert_eq!(app.status, ApplicationStatus::Approved);
        assert!(app.reviewed_at.is_some());

        let mut db = manager.db().await.unwrap();
        let club = db.get_club(club_id).await.unwrap().unwrap();
        assert_eq!(club.name, "Chess Club");
        assert_eq!(club.category_id, 3);
        assert_eq!(club.leader_id, u1);
        assert_eq!(club.member_count, 1);
        assert_eq!(role_of(&manager, u1).await, Role::ClubLeader);

        let member = db.get_member(u1, club_id).await.unwrap().unwrap();
        assert_eq!(member.role, ClubRole::Leader);
    }

    #[tokio::test]
    async fn test_approved_club_matches_proposal() {
        let (wf, manager) = workflow();
        let uid = manager.seed_user("ada", Role::User).await;
        let proposal = ClubProposal {
            name: "Robotics".into(),
            description: "we build robots".into(),
            category_id: 7,
            tags: vec!["engineering".into(), "hardware".into()],
            requirements: "bring a soldering iron".into(),
            logo_url: Some("logos/robotics.png".into()),
        };
        let app_id = wf.submit_create_club_application(uid, &proposal).await.unwrap();
        let club_id = wf.approve_create_club_application(app_id).await.unwrap();
        let mut db = manager.db().await.unwrap();
        let club = db.get_club(club_id).await.unwrap().unwrap();
        assert_eq!(club.name, proposal.name);
        assert_eq!(club.description, proposal.description);
        assert_eq!(club.category_id, proposal.category_id);
        assert_eq!(club.tags, proposal.tags);
        assert_eq!(club.requirements, proposal.requirements);
        assert_eq!(club.logo_url, proposal.logo_url);
    }

    #[tokio::test]
    async fn test_concurrent_approvals_apply_once() {
        let (wf, manager) = workflow();
        let uid = manager.seed_user("bo", Role::User).await;
        let app_id = wf.submit_create_club_application(uid, &chess()).await.unwrap();

        let (a, b) = tokio::join!(wf.approve_create_club_application(app_id), wf.approve_create_club_application(app_id));
        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(
                    r,
                    Err(Error::InvalidState {
                        status: ApplicationStatus::Approved,
                        ..
                    })
                ))
                .count(),
            1
        );
        assert_eq!(club_count(&manager).await, 1);
        assert_eq!(wf.memberships_of_user(uid).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retried_approval_is_refused() {
        let (wf, manager) = workflow();
        let uid = manager.seed_user("cy", Role::User).await;
        let app_id = wf.submit_create_club_application(uid, &chess()).await.unwrap();
        wf.approve_create_club_application(app_id).await.unwrap();
        let again = wf.approve_create_club_application(app_id).await;
        assert!(matches!(again, Err(Error::InvalidState { .. })));
        assert_eq!(club_count(&manager).await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_create_submissions_conflict() {
        let (wf, manager) = workflow();
        let uid = manager.seed_user("di", Role::User).await;
        let other = ClubProposal {
            name: "Go Club".into(),
            category_id: 3,
            ..Default::default()
        };
        let first = chess();
        let (a, b) = tokio::join!(wf.submit_create_club_application(uid, &first), wf.submit_create_club_application(uid, &other));
        let winner = match (&a, &b) {
            (Ok(id), Err(Error::Conflict { existing, .. })) | (Err(Error::Conflict { existing, .. }), Ok(id)) => {
                assert_eq!(*existing, Some(*id));
                *id
            }
            other => panic!("expected one success and one conflict, got {:?}", other),
        };
        assert_eq!(wf.applications_of_applicant(ApplicationKind::CreateClub, uid).await.unwrap().len(), 1);
        assert_eq!(status_of(&wf, ApplicationKind::CreateClub, winner).await, ApplicationStatus::Pending);
    }

    #[tokio::test]
    async fn test_new_create_application_after_decision() {
        let (wf, manager) = workflow();
        let uid = manager.seed_user("ed", Role::User).await;
        let first = wf.submit_create_club_application(uid, &chess()).await.unwrap();
        wf.reject_create_club_application(first, "name taken").await.unwrap();
        let second = wf.submit_create_club_application(uid, &chess()).await.unwrap();
        wf.approve_create_club_application(second).await.unwrap();
        wf.submit_create_club_application(uid, &chess()).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_side_effect_rolls_back_everything() {
        let (wf, manager) = workflow();
        let uid = manager.seed_user("fay", Role::User).await;
        let app_id = wf.submit_create_club_application(uid, &chess()).await.unwrap();

        manager.inject_failure(FailPoint::InsertMember).await;
        let res = wf.approve_create_club_application(app_id).await;
        assert!(matches!(res, Err(Error::Storage(_))));
        assert_eq!(status_of(&wf, ApplicationKind::CreateClub, app_id).await, ApplicationStatus::Pending);
        assert_eq!(club_count(&manager).await, 0);
        assert_eq!(role_of(&manager, uid).await, Role::User);
        assert!(wf.memberships_of_user(uid).await.unwrap().is_empty());

        // the application is still reviewable once the fault is gone
        manager.clear_failure().await;
        wf.approve_create_club_application(app_id).await.unwrap();
        assert_eq!(club_count(&manager).await, 1);
    }

    #[tokio::test]
    async fn test_failed_join_approval_keeps_application_pending() {
        let (wf, manager) = workflow();
        let leader = manager.seed_user("gil", Role::ClubLeader).await;
        let joiner = manager.seed_user("hal", Role::User).await;
        let club_id = manager.seed_club(leader, "Film", 1).await;
        let app_id = wf.submit_join_club_application(joiner, club_id, "love films").await.unwrap();

        manager.inject_failure(FailPoint::MarkApproved).await;
        assert!(wf.approve_join_club_application(app_id).await.is_err());
        assert_eq!(status_of(&wf, ApplicationKind::JoinClub, app_id).await, ApplicationStatus::Pending);
        assert_eq!(wf.members_of_club(club_id).await.unwrap().len(), 1);
        let mut db = manager.db().await.unwrap();
        assert_eq!(db.get_club(club_id).await.unwrap().unwrap().member_count, 1);
    }

    #[tokio::test]
    async fn test_rejection_has_no_side_effects() {
        let (wf, manager) = workflow();
        let uid = manager.seed_user("ivy", Role::User).await;
        let app_id = wf.submit_create_club_application(uid, &chess()).await.unwrap();
        wf.reject_create_club_application(app_id, "duplicate of an existing club").await.unwrap();

        let app = wf.application(ApplicationKind::CreateClub, app_id).await.unwrap();
        assert_eq!(app.status, ApplicationStatus::Rejected);
        assert_eq!(app.rejected_reason.as_deref(), Some("duplicate of an existing club"));
        assert_eq!(club_count(&manager).await, 0);
        assert_eq!(role_of(&manager, uid).await, Role::User);
        assert!(wf.memberships_of_user(uid).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decided_applications_are_terminal() {
        let (wf, manager) = workflow();
        let uid = manager.seed_user("jo", Role::User).await;
        let rejected = wf.submit_create_club_application(uid, &chess()).await.unwrap();
        wf.reject_create_club_application(rejected, "no").await.unwrap();
        assert!(matches!(
            wf.approve_create_club_application(rejected).await,
            Err(Error::InvalidState {
                status: ApplicationStatus::Rejected,
                ..
            })
        ));
        assert!(matches!(wf.reject_create_club_application(rejected, "again").await, Err(Error::InvalidState { .. })));

        let approved = wf.submit_create_club_application(uid, &chess()).await.unwrap();
        wf.approve_create_club_application(approved).await.unwrap();
        assert!(matches!(
            wf.reject_create_club_application(approved, "changed my mind").await,
            Err(Error::InvalidState {
                status: ApplicationStatus::Approved,
                ..
            })
        ));
        assert_eq!(status_of(&wf, ApplicationKind::CreateClub, approved).await, ApplicationStatus::Approved);
    }

    #[tokio::test]
    async fn test_missing_application_is_not_found() {
        let (wf, _) = workflow();
        assert!(matches!(wf.approve_create_club_application(404).await, Err(Error::NotFound(_))));
        assert!(matches!(wf.approve_join_club_application(404).await, Err(Error::NotFound(_))));
        assert!(matches!(wf.approve_update_club_info_application(404).await, Err(Error::NotFound(_))));
        assert!(matches!(wf.reject_create_club_application(404, "x").await, Err(Error::NotFound(_))));
        assert!(matches!(wf.reject_join_club_application(404, "x").await, Err(Error::NotFound(_))));
        assert!(matches!(wf.reject_update_club_info_application(404, "x").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_elevated_role_is_not_demoted() {
        let (wf, manager) = workflow();
        let admin = manager.seed_user("root", Role::Admin).await;
        let app_id = wf.submit_create_club_application(admin, &chess()).await.unwrap();
        let club_id = wf.approve_create_club_application(app_id).await.unwrap();
        assert_eq!(role_of(&manager, admin).await, Role::Admin);
        let mut db = manager.db().await.unwrap();
        assert_eq!(db.get_member(admin, club_id).await.unwrap().unwrap().role, ClubRole::Leader);
    }

    #[tokio::test]
    async fn test_duplicate_join_application_conflicts() {
        let (wf, manager) = workflow();
        let leader = manager.seed_user("kim", Role::ClubLeader).await;
        let u2 = manager.seed_user("u2", Role::User).await;
        let club_id = manager.seed_club(leader, "Chess Club", 3).await;
        let first = wf.submit_join_club_application(u2, club_id, "I like chess").await.unwrap();
        match wf.submit_join_club_application(u2, club_id, "really").await {
            Err(Error::Conflict { kind, existing }) => {
                assert_eq!(kind, ApplicationKind::JoinClub);
                assert_eq!(existing, Some(first));
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_join_approval_adds_member() {
        let (wf, manager) = workflow();
        let leader = manager.seed_user("lee", Role::ClubLeader).await;
        let joiner = manager.seed_user("max", Role::User).await;
        let club_id = manager.seed_club(leader, "Chess Club", 3).await;
        let app_id = wf.submit_join_club_application(joiner, club_id, "I like chess").await.unwrap();

        let proposal: JoinProposal = wf.codec().decode(&wf.application(ApplicationKind::JoinClub, app_id).await.unwrap().proposal).unwrap();
        assert_eq!(proposal.reason, "I like chess");

        wf.approve_join_club_application(app_id).await.unwrap();
        let members = wf.members_of_club(club_id).await.unwrap();
        assert_eq!(members.len(), 2);
        let m = members.iter().find(|m| m.user_id == joiner).unwrap();
        assert_eq!(m.role, ClubRole::Member);
        let mut db = manager.db().await.unwrap();
        assert_eq!(db.get_club(club_id).await.unwrap().unwrap().member_count, 2);
        assert_eq!(role_of(&manager, joiner).await, Role::User);
        assert_eq!(wf.clubs_of_user(joiner).await.unwrap()[0].id, club_id);

        // an approved request still holds the slot
        assert!(matches!(wf.submit_join_club_application(joiner, club_id, "again").await, Err(Error::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_join_after_rejection_is_allowed() {
        let (wf, manager) = workflow();
        let leader = manager.seed_user("ned", Role::ClubLeader).await;
        let joiner = manager.seed_user("oz", Role::User).await;
        let club_id = manager.seed_club(leader, "Film", 1).await;
        let first = wf.submit_join_club_application(joiner, club_id, "pls").await.unwrap();
        wf.reject_join_club_application(first, "club is full").await.unwrap();
        let second = wf.submit_join_club_application(joiner, club_id, "pls again").await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_join_for_existing_member_is_refused() {
        let (wf, manager) = workflow();
        let leader = manager.seed_user("pat", Role::ClubLeader).await;
        let club_id = manager.seed_club(leader, "Film", 1).await;
        let app_id = wf.submit_join_club_application(leader, club_id, "me too").await.unwrap();
        assert!(matches!(wf.approve_join_club_application(app_id).await, Err(Error::AlreadyMember { .. })));
        assert_eq!(status_of(&wf, ApplicationKind::JoinClub, app_id).await, ApplicationStatus::Pending);
    }

    #[tokio::test]
    async fn test_application_for_missing_club_is_not_found() {
        let (wf, manager) = workflow();
        let uid = manager.seed_user("quinn", Role::User).await;
        assert!(matches!(wf.submit_join_club_application(uid, 999, "hi").await, Err(Error::NotFound(_))));
        assert!(matches!(wf.submit_update_club_info_application(999, uid, &ClubPatch::default()).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_approval_applies_partial_patch() {
        let (wf, manager) = workflow();
        let leader = manager.seed_user("rae", Role::ClubLeader).await;
        let club_id = manager.seed_club(leader, "Chess Club", 3).await;
        let patch = ClubPatch {
            description: Some("Tuesdays at the library".into()),
            tags: Some(vec!["strategy".into()]),
            ..Default::default()
        };
        let app_id = wf.submit_update_club_info_application(club_id, leader, &patch).await.unwrap();
        wf.approve_update_club_info_application(app_id).await.unwrap();

        let mut db = manager.db().await.unwrap();
        let club = db.get_club(club_id).await.unwrap().unwrap();
        assert_eq!(club.name, "Chess Club");
        assert_eq!(club.category_id, 3);
        assert_eq!(club.description, "Tuesdays at the library");
        assert_eq!(club.tags, vec!["strategy".to_owned()]);
        assert_eq!(status_of(&wf, ApplicationKind::UpdateClubInfo, app_id).await, ApplicationStatus::Approved);
    }

    #[tokio::test]
    async fn test_one_pending_update_per_club() {
        let (wf, manager) = workflow();
        let leader = manager.seed_user("sam", Role::ClubLeader).await;
        let officer = manager.seed_user("tia", Role::User).await;
        let club_id = manager.seed_club(leader, "Chess Club", 3).await;
        let patch = ClubPatch {
            name: Some("Chess & Go Club".into()),
            ..Default::default()
        };
        let first = wf.submit_update_club_info_application(club_id, leader, &patch).await.unwrap();
        // the slot belongs to the club, not the applicant
        assert!(matches!(wf.submit_update_club_info_application(club_id, officer, &patch).await, Err(Error::Conflict { .. })));
        wf.reject_update_club_info_application(first, "keep the name").await.unwrap();
        wf.submit_update_club_info_application(club_id, officer, &patch).await.unwrap();
    }

    #[tokio::test]
    async fn test_review_queues() {
        let (wf, manager) = workflow();
        let leader = manager.seed_user("uma", Role::ClubLeader).await;
        let club_id = manager.seed_club(leader, "Chess Club", 3).await;
        let mut ids = vec![];
        for name in ["v1", "v2", "v3"] {
            let uid = manager.seed_user(name, Role::User).await;
            ids.push(wf.submit_join_club_application(uid, club_id, "hi").await.unwrap());
        }
        wf.reject_join_club_application(ids[0], "no").await.unwrap();
        wf.approve_join_club_application(ids[1]).await.unwrap();

        let live = wf.live_applications_for_club(ApplicationKind::JoinClub, club_id).await.unwrap();
        assert_eq!(live.iter().map(|a| a.id).collect::<Vec<_>>(), vec![ids[1], ids[2]]);
        let pending = wf.pending_applications(ApplicationKind::JoinClub, Pagination::page(1, 10)).await.unwrap();
        assert_eq!(pending.iter().map(|a| a.id).collect::<Vec<_>>(), vec![ids[2]]);
        assert!(matches!(wf.live_applications_for_club(ApplicationKind::CreateClub, club_id).await, Err(Error::InvalidArgument(_))));
    }
}
