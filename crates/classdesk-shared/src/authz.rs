//! The authorization predicate.
//!
//! [`can_perform`] is a pure, total function of (actor, operation, target).
//! It performs no I/O and holds no state, so the whole decision table can be
//! unit-tested exhaustively over roles, operations and ownership variants.
//!
//! Rules are evaluated in precedence order; the first matching rule governs:
//!
//! 1. A blocked actor is denied every mutating operation; reads are allowed
//!    only on the actor's own data.
//! 2. Any non-blocked role may create; a teacher may only create suggestions.
//! 3. Viewing requires being the author, an admin, or the assigned teacher.
//! 4. `ListAll` is admin-only, `ListAssigned` teacher-only, `ListOwn` open.
//! 5. Transition/assign/respond: admin always, assigned teacher otherwise.
//! 6. Role and block changes: admin-only and never on oneself (a self
//!    role-change to admin is a tolerated no-op).

use crate::models::{Complaint, UserProfile};
use crate::types::{ComplaintKind, ComplaintStatus, Role, UserId};

/// An operation a caller wants to perform, paired with the argument that
/// affects the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    CreateComplaint(ComplaintKind),
    ViewComplaint,
    ListOwn,
    ListAll,
    ListAssigned,
    Transition(ComplaintStatus),
    Assign,
    Respond,
    ChangeRole(Role),
    SetBlocked(bool),
}

impl Op {
    /// Whether the operation mutates state.  Blocked users are denied all of
    /// these outright.
    pub fn is_mutating(&self) -> bool {
        match self {
            Op::CreateComplaint(_)
            | Op::Transition(_)
            | Op::Assign
            | Op::Respond
            | Op::ChangeRole(_)
            | Op::SetBlocked(_) => true,
            Op::ViewComplaint | Op::ListOwn | Op::ListAll | Op::ListAssigned => false,
        }
    }
}

/// The record an operation is aimed at, when one exists.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Complaint(&'a Complaint),
    User(&'a UserProfile),
    None,
}

impl<'a> Target<'a> {
    fn complaint(&self) -> Option<&'a Complaint> {
        match self {
            Target::Complaint(c) => Some(c),
            _ => None,
        }
    }

    fn user_id(&self) -> Option<UserId> {
        match self {
            Target::User(u) => Some(u.id),
            _ => None,
        }
    }
}

/// Decide whether `actor` may perform `op` against `target`.
///
/// Deterministic and side-effect-free: identical inputs always yield the
/// same answer.
pub fn can_perform(actor: &UserProfile, op: Op, target: Target<'_>) -> bool {
    // Rule 1: blocked actors lose all mutating operations and keep read
    // access to their own data only.
    if actor.blocked {
        if op.is_mutating() {
            return false;
        }
        return match op {
            Op::ListOwn => true,
            Op::ViewComplaint => target
                .complaint()
                .map(|c| c.author_id == actor.id)
                .unwrap_or(false),
            _ => false,
        };
    }

    match op {
        // Rule 2.
        Op::CreateComplaint(kind) => match actor.role {
            Role::Teacher => kind == ComplaintKind::Suggestion,
            Role::Student | Role::Parent | Role::Admin => true,
        },

        // Rule 3.
        Op::ViewComplaint => {
            let Some(c) = target.complaint() else {
                return false;
            };
            c.author_id == actor.id
                || actor.role == Role::Admin
                || (actor.role == Role::Teacher && c.assignee_id == Some(actor.id))
        }

        // Rule 4.
        Op::ListOwn => true,
        Op::ListAll => actor.role == Role::Admin,
        Op::ListAssigned => actor.role == Role::Teacher,

        // Rule 5.
        Op::Transition(_) | Op::Assign | Op::Respond => {
            let Some(c) = target.complaint() else {
                return false;
            };
            match actor.role {
                Role::Admin => true,
                Role::Teacher => c.assignee_id == Some(actor.id),
                Role::Student | Role::Parent => false,
            }
        }

        // Rule 6.
        Op::ChangeRole(new_role) => {
            if actor.role != Role::Admin {
                return false;
            }
            let Some(target_id) = target.user_id() else {
                return false;
            };
            if target_id == actor.id {
                // Self-lockout prevention: only the no-op "stay admin" is
                // tolerated.
                return new_role == Role::Admin;
            }
            true
        }
        Op::SetBlocked(_) => {
            actor.role == Role::Admin
                && target.user_id().map(|id| id != actor.id).unwrap_or(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, ComplaintId};
    use chrono::Utc;

    fn profile(role: Role, blocked: bool) -> UserProfile {
        UserProfile {
            id: UserId::new(),
            email: format!("{}@school.example", role),
            role,
            created_at: Utc::now(),
            blocked,
        }
    }

    fn complaint(author: &UserProfile, assignee: Option<UserId>) -> Complaint {
        let now = Utc::now();
        Complaint {
            id: ComplaintId::new(),
            author_id: author.id,
            author_email: author.email.clone(),
            author_role: author.role,
            title: "Leaking roof".into(),
            body: "Gym ceiling drips when it rains.".into(),
            category: Some(Category::Facilities),
            kind: ComplaintKind::Complaint,
            status: ComplaintStatus::New,
            created_at: now,
            updated_at: now,
            assignee_id: assignee,
            assignee_email: assignee.map(|_| "t@school.example".into()),
            response_text: None,
            response_at: None,
            responder_id: None,
            attachments: vec![],
            history: vec![crate::models::StatusHistoryEntry {
                status: ComplaintStatus::New,
                actor_id: author.id,
                at: now,
                comment: None,
            }],
            clarification_requested: false,
        }
    }

    fn all_ops() -> Vec<Op> {
        let mut ops = vec![
            Op::CreateComplaint(ComplaintKind::Complaint),
            Op::CreateComplaint(ComplaintKind::Suggestion),
            Op::ViewComplaint,
            Op::ListOwn,
            Op::ListAll,
            Op::ListAssigned,
            Op::Assign,
            Op::Respond,
            Op::SetBlocked(true),
            Op::SetBlocked(false),
        ];
        for status in ComplaintStatus::ALL {
            ops.push(Op::Transition(status));
        }
        for role in Role::ALL {
            ops.push(Op::ChangeRole(role));
        }
        ops
    }

    #[test]
    fn predicate_is_total_and_deterministic() {
        // Sweep every role x op x target variant twice; the function must be
        // defined everywhere and must agree with itself.
        for role in Role::ALL {
            for blocked in [false, true] {
                let actor = profile(role, blocked);
                let own = complaint(&actor, None);
                let other_author = profile(Role::Student, false);
                let foreign = complaint(&other_author, None);
                let target_user = profile(Role::Parent, false);
                for op in all_ops() {
                    for target in [
                        Target::None,
                        Target::Complaint(&own),
                        Target::Complaint(&foreign),
                        Target::User(&target_user),
                        Target::User(&actor),
                    ] {
                        let a = can_perform(&actor, op, target);
                        let b = can_perform(&actor, op, target);
                        assert_eq!(a, b, "non-deterministic for {role} {op:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn blocked_user_denied_all_mutations() {
        for role in Role::ALL {
            let actor = profile(role, true);
            let own = complaint(&actor, None);
            let other = profile(Role::Parent, false);
            for op in all_ops() {
                if op.is_mutating() {
                    assert!(
                        !can_perform(&actor, op, Target::Complaint(&own)),
                        "blocked {role} allowed {op:?}"
                    );
                    assert!(!can_perform(&actor, op, Target::User(&other)));
                }
            }
        }
    }

    #[test]
    fn blocked_user_still_reads_own_data() {
        let actor = profile(Role::Student, true);
        let own = complaint(&actor, None);
        let foreign = complaint(&profile(Role::Parent, false), None);

        assert!(can_perform(&actor, Op::ListOwn, Target::None));
        assert!(can_perform(&actor, Op::ViewComplaint, Target::Complaint(&own)));
        assert!(!can_perform(&actor, Op::ViewComplaint, Target::Complaint(&foreign)));
        assert!(!can_perform(&actor, Op::ListAll, Target::None));
    }

    #[test]
    fn teacher_may_only_create_suggestions() {
        let teacher = profile(Role::Teacher, false);
        assert!(!can_perform(
            &teacher,
            Op::CreateComplaint(ComplaintKind::Complaint),
            Target::None
        ));
        assert!(can_perform(
            &teacher,
            Op::CreateComplaint(ComplaintKind::Suggestion),
            Target::None
        ));

        // Everyone else may create either kind.
        for role in [Role::Student, Role::Parent, Role::Admin] {
            let actor = profile(role, false);
            assert!(can_perform(
                &actor,
                Op::CreateComplaint(ComplaintKind::Complaint),
                Target::None
            ));
        }
    }

    #[test]
    fn view_rules() {
        let author = profile(Role::Student, false);
        let admin = profile(Role::Admin, false);
        let teacher = profile(Role::Teacher, false);
        let other_teacher = profile(Role::Teacher, false);
        let stranger = profile(Role::Parent, false);

        let c = complaint(&author, Some(teacher.id));
        assert!(can_perform(&author, Op::ViewComplaint, Target::Complaint(&c)));
        assert!(can_perform(&admin, Op::ViewComplaint, Target::Complaint(&c)));
        assert!(can_perform(&teacher, Op::ViewComplaint, Target::Complaint(&c)));
        assert!(!can_perform(&other_teacher, Op::ViewComplaint, Target::Complaint(&c)));
        assert!(!can_perform(&stranger, Op::ViewComplaint, Target::Complaint(&c)));
    }

    #[test]
    fn list_scopes() {
        let admin = profile(Role::Admin, false);
        let teacher = profile(Role::Teacher, false);
        let student = profile(Role::Student, false);

        assert!(can_perform(&admin, Op::ListAll, Target::None));
        assert!(!can_perform(&teacher, Op::ListAll, Target::None));
        assert!(can_perform(&teacher, Op::ListAssigned, Target::None));
        assert!(!can_perform(&student, Op::ListAssigned, Target::None));
        assert!(can_perform(&student, Op::ListOwn, Target::None));
    }

    #[test]
    fn only_admin_or_assignee_may_mutate_lifecycle() {
        let author = profile(Role::Student, false);
        let admin = profile(Role::Admin, false);
        let assignee = profile(Role::Teacher, false);
        let other_teacher = profile(Role::Teacher, false);

        let c = complaint(&author, Some(assignee.id));
        for op in [Op::Transition(ComplaintStatus::InProgress), Op::Assign, Op::Respond] {
            assert!(can_perform(&admin, op, Target::Complaint(&c)));
            assert!(can_perform(&assignee, op, Target::Complaint(&c)));
            assert!(!can_perform(&other_teacher, op, Target::Complaint(&c)));
            assert!(!can_perform(&author, op, Target::Complaint(&c)));
        }
    }

    #[test]
    fn admin_cannot_lock_themselves_out() {
        let admin = profile(Role::Admin, false);
        let other = profile(Role::Student, false);

        assert!(!can_perform(&admin, Op::SetBlocked(true), Target::User(&admin)));
        assert!(!can_perform(&admin, Op::ChangeRole(Role::Parent), Target::User(&admin)));
        // Keeping one's own admin role is a tolerated no-op.
        assert!(can_perform(&admin, Op::ChangeRole(Role::Admin), Target::User(&admin)));

        assert!(can_perform(&admin, Op::SetBlocked(true), Target::User(&other)));
        assert!(can_perform(&admin, Op::ChangeRole(Role::Teacher), Target::User(&other)));
    }

    #[test]
    fn non_admin_cannot_manage_users() {
        let other = profile(Role::Student, false);
        for role in [Role::Student, Role::Parent, Role::Teacher] {
            let actor = profile(role, false);
            assert!(!can_perform(&actor, Op::ChangeRole(Role::Admin), Target::User(&other)));
            assert!(!can_perform(&actor, Op::SetBlocked(true), Target::User(&other)));
        }
    }
}
