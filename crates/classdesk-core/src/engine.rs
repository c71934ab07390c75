//! The complaint lifecycle engine.
//!
//! Every operation checks the authorization predicate before mutating, and
//! every mutation that touches the ledger goes through a single store
//! transaction, so an authorization denial or persistence failure never
//! leaves a partial write behind.

use chrono::Utc;
use tracing::{debug, info};

use classdesk_shared::authz::{can_perform, Op, Target};
use classdesk_shared::constants::MAX_ATTACHMENTS;
use classdesk_shared::{
    AttachedFile, Category, Complaint, ComplaintId, ComplaintKind, ComplaintStatus,
    LifecycleError, Role, StatusHistoryEntry, UserId, UserProfile,
};
use classdesk_store::{Database, StoreError};

/// Input for [`LifecycleEngine::create`].
///
/// Attachment sizes are validated by the upload collaborator before the blobs
/// are stored; the engine only re-checks the count.
#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub title: String,
    pub body: String,
    pub category: Option<Category>,
    pub kind: ComplaintKind,
    pub attachments: Vec<AttachedFile>,
}

/// Which slice of complaints a caller wants to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// Complaints authored by the caller.  Ordered by creation, newest first.
    Own,
    /// Every complaint.  Admin only.  Ordered by creation, newest first.
    All,
    /// Complaints assigned to the caller.  Teacher only.  Ordered by last
    /// update, most recent first.
    Assigned,
}

/// Owns the store and performs every lifecycle operation on behalf of a
/// resolved [`UserProfile`].
pub struct LifecycleEngine {
    db: Database,
}

impl LifecycleEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Direct store access for the auth module (account rows, credentials).
    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    // ------------------------------------------------------------------
    // Complaint writes
    // ------------------------------------------------------------------

    /// Create a complaint.  Writes the record, its attachments and the
    /// initial ledger entry (status `New`, actor = author) atomically.
    pub fn create(
        &mut self,
        author: &UserProfile,
        new: NewComplaint,
    ) -> Result<ComplaintId, LifecycleError> {
        if !can_perform(author, Op::CreateComplaint(new.kind), Target::None) {
            if author.blocked {
                return Err(LifecycleError::Forbidden("account is blocked".into()));
            }
            // The only other way rule 2 denies: a teacher submitting a
            // complaint rather than a suggestion.
            return Err(LifecycleError::Validation(
                "teachers may only submit suggestions".into(),
            ));
        }

        if new.title.trim().is_empty() {
            return Err(LifecycleError::Validation("title must not be empty".into()));
        }
        if new.body.trim().is_empty() {
            return Err(LifecycleError::Validation("body must not be empty".into()));
        }
        if new.attachments.len() > MAX_ATTACHMENTS {
            return Err(LifecycleError::Validation(format!(
                "at most {MAX_ATTACHMENTS} attachments allowed, got {}",
                new.attachments.len()
            )));
        }

        let now = Utc::now();
        let complaint = Complaint {
            id: ComplaintId::new(),
            author_id: author.id,
            author_email: author.email.clone(),
            author_role: author.role,
            title: new.title,
            body: new.body,
            category: new.category,
            kind: new.kind,
            status: ComplaintStatus::New,
            created_at: now,
            updated_at: now,
            assignee_id: None,
            assignee_email: None,
            response_text: None,
            response_at: None,
            responder_id: None,
            attachments: new.attachments,
            history: vec![StatusHistoryEntry {
                status: ComplaintStatus::New,
                actor_id: author.id,
                at: now,
                comment: None,
            }],
            clarification_requested: false,
        };

        self.db.insert_complaint(&complaint).map_err(store_err)?;

        info!(
            id = %complaint.id,
            author = %author.id,
            kind = %complaint.kind,
            "complaint created"
        );
        Ok(complaint.id)
    }

    /// Move a complaint to `new_status`, appending one ledger entry.
    ///
    /// No transition-ordering is enforced: any status is reachable from any
    /// status, matching the product's permissive workflow.
    pub fn transition(
        &mut self,
        actor: &UserProfile,
        id: ComplaintId,
        new_status: ComplaintStatus,
        comment: Option<String>,
    ) -> Result<(), LifecycleError> {
        let complaint = self.fetch(id)?;
        if !can_perform(actor, Op::Transition(new_status), Target::Complaint(&complaint)) {
            return Err(LifecycleError::Forbidden(format!(
                "{} may not change the status of complaint {id}",
                actor.id
            )));
        }

        let entry = StatusHistoryEntry {
            status: new_status,
            actor_id: actor.id,
            at: Utc::now(),
            comment,
        };
        let clarification = new_status == ComplaintStatus::NeedsClarification;

        self.db
            .record_transition(id, &entry, clarification)
            .map_err(store_err)?;

        info!(id = %id, status = %new_status, actor = %actor.id, "status changed");
        Ok(())
    }

    /// Assign a complaint to a teacher.  Forces status `Assigned` and records
    /// the assignee's email in the ledger comment.
    ///
    /// Notification delivery to the assignee is out of scope.
    /// TODO: queue an email to the assignee once a delivery channel exists.
    pub fn assign(
        &mut self,
        actor: &UserProfile,
        id: ComplaintId,
        teacher_id: UserId,
    ) -> Result<(), LifecycleError> {
        let complaint = self.fetch(id)?;
        if !can_perform(actor, Op::Assign, Target::Complaint(&complaint)) {
            return Err(LifecycleError::Forbidden(format!(
                "{} may not assign complaint {id}",
                actor.id
            )));
        }

        let teacher = match self.db.get_user(teacher_id) {
            Ok(account) => account,
            Err(StoreError::NotFound) => {
                return Err(LifecycleError::NotFound(format!(
                    "no such user: {teacher_id}"
                )))
            }
            Err(e) => return Err(store_err(e)),
        };
        if teacher.role != Role::Teacher {
            return Err(LifecycleError::Validation(format!(
                "assignee {} is not a teacher",
                teacher.email
            )));
        }

        let entry = StatusHistoryEntry {
            status: ComplaintStatus::Assigned,
            actor_id: actor.id,
            at: Utc::now(),
            comment: Some(format!("Assigned to teacher: {}", teacher.email)),
        };

        self.db
            .record_assignment(id, teacher_id, &teacher.email, &entry)
            .map_err(store_err)?;

        info!(id = %id, teacher = %teacher_id, actor = %actor.id, "complaint assigned");
        Ok(())
    }

    /// Record a response, forcing status `Answered`.
    pub fn respond(
        &mut self,
        actor: &UserProfile,
        id: ComplaintId,
        response_text: &str,
    ) -> Result<(), LifecycleError> {
        let complaint = self.fetch(id)?;
        if !can_perform(actor, Op::Respond, Target::Complaint(&complaint)) {
            return Err(LifecycleError::Forbidden(format!(
                "{} may not respond to complaint {id}",
                actor.id
            )));
        }
        if response_text.trim().is_empty() {
            return Err(LifecycleError::Validation(
                "response text must not be empty".into(),
            ));
        }

        let entry = StatusHistoryEntry {
            status: ComplaintStatus::Answered,
            actor_id: actor.id,
            at: Utc::now(),
            comment: Some("Response added".into()),
        };

        self.db
            .record_response(id, response_text, actor.id, &entry)
            .map_err(store_err)?;

        info!(id = %id, responder = %actor.id, "response recorded");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Complaint reads
    // ------------------------------------------------------------------

    /// Fetch one complaint, gated by the view rule.
    pub fn get_complaint(
        &self,
        actor: &UserProfile,
        id: ComplaintId,
    ) -> Result<Complaint, LifecycleError> {
        let complaint = self.fetch(id)?;
        if !can_perform(actor, Op::ViewComplaint, Target::Complaint(&complaint)) {
            return Err(LifecycleError::Forbidden(format!(
                "{} may not view complaint {id}",
                actor.id
            )));
        }
        Ok(complaint)
    }

    /// List complaints for the given scope.  Ordering is part of the
    /// contract: `Own`/`All` by creation descending, `Assigned` by last
    /// update descending.
    pub fn list_for(
        &self,
        actor: &UserProfile,
        scope: ListScope,
    ) -> Result<Vec<Complaint>, LifecycleError> {
        let op = match scope {
            ListScope::Own => Op::ListOwn,
            ListScope::All => Op::ListAll,
            ListScope::Assigned => Op::ListAssigned,
        };
        if !can_perform(actor, op, Target::None) {
            return Err(LifecycleError::Forbidden(format!(
                "{} may not list {scope:?} complaints",
                actor.id
            )));
        }

        let complaints = match scope {
            ListScope::Own => self.db.list_complaints_by_author(actor.id),
            ListScope::All => self.db.list_all_complaints(),
            ListScope::Assigned => self.db.list_complaints_by_assignee(actor.id),
        }
        .map_err(store_err)?;

        debug!(actor = %actor.id, ?scope, count = complaints.len(), "listed complaints");
        Ok(complaints)
    }

    // ------------------------------------------------------------------
    // User management
    // ------------------------------------------------------------------

    /// List all profiles, newest registrations first.  Admin only.
    pub fn list_users(&self, actor: &UserProfile) -> Result<Vec<UserProfile>, LifecycleError> {
        // Same admin-only rule as listing every complaint.
        if !can_perform(actor, Op::ListAll, Target::None) {
            return Err(LifecycleError::Forbidden(format!(
                "{} may not list users",
                actor.id
            )));
        }
        let users = self.db.list_users().map_err(store_err)?;
        Ok(users.iter().map(|u| u.profile()).collect())
    }

    /// Change exactly the `role` field of the target user.
    pub fn change_role(
        &mut self,
        actor: &UserProfile,
        target_id: UserId,
        new_role: Role,
    ) -> Result<(), LifecycleError> {
        let target = self.fetch_profile(target_id)?;
        if !can_perform(actor, Op::ChangeRole(new_role), Target::User(&target)) {
            return Err(LifecycleError::Forbidden(format!(
                "{} may not change the role of {target_id}",
                actor.id
            )));
        }

        // The tolerated self-change to admin is a no-op; skip the write.
        if target_id == actor.id && new_role == Role::Admin {
            return Ok(());
        }

        self.db.update_user_role(target_id, new_role).map_err(store_err)?;
        info!(target = %target_id, role = %new_role, actor = %actor.id, "role changed");
        Ok(())
    }

    /// Change exactly the `blocked` field of the target user.
    pub fn set_blocked(
        &mut self,
        actor: &UserProfile,
        target_id: UserId,
        blocked: bool,
    ) -> Result<(), LifecycleError> {
        let target = self.fetch_profile(target_id)?;
        if !can_perform(actor, Op::SetBlocked(blocked), Target::User(&target)) {
            return Err(LifecycleError::Forbidden(format!(
                "{} may not change the blocked state of {target_id}",
                actor.id
            )));
        }

        self.db.set_user_blocked(target_id, blocked).map_err(store_err)?;
        info!(target = %target_id, blocked, actor = %actor.id, "blocked flag changed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn fetch(&self, id: ComplaintId) -> Result<Complaint, LifecycleError> {
        match self.db.get_complaint(id) {
            Ok(c) => Ok(c),
            Err(StoreError::NotFound) => {
                Err(LifecycleError::NotFound(format!("no such complaint: {id}")))
            }
            Err(e) => Err(store_err(e)),
        }
    }

    fn fetch_profile(&self, id: UserId) -> Result<UserProfile, LifecycleError> {
        match self.db.get_user(id) {
            Ok(account) => Ok(account.profile()),
            Err(StoreError::NotFound) => {
                Err(LifecycleError::NotFound(format!("no such user: {id}")))
            }
            Err(e) => Err(store_err(e)),
        }
    }
}

fn store_err(e: StoreError) -> LifecycleError {
    match e {
        StoreError::NotFound => LifecycleError::NotFound("record not found".into()),
        other => LifecycleError::Persistence(other.to_string()),
    }
}
