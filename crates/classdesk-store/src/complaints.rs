//! CRUD operations for [`Complaint`] records and their append-only status
//! history.
//!
//! Every mutation that touches both the scalar columns and the ledger runs in
//! a single SQLite transaction, so a failed write never leaves a ledger entry
//! without its matching status/timestamp update (or vice versa).

use chrono::{DateTime, Utc};
use rusqlite::{params, Transaction};

use classdesk_shared::{
    AttachedFile, Category, Complaint, ComplaintId, ComplaintKind, ComplaintStatus, Role,
    StatusHistoryEntry, UserId,
};

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new complaint together with its attachments and the initial
    /// ledger entry, atomically.
    ///
    /// The caller is expected to have already set `history[0]` to the creation
    /// entry (status `New`, actor = author).
    pub fn insert_complaint(&mut self, complaint: &Complaint) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        tx.execute(
            "INSERT INTO complaints (
                 id, author_id, author_email, author_role, title, body,
                 category, kind, status, created_at, updated_at,
                 assignee_id, assignee_email, response_text, response_at,
                 responder_id, clarification_requested
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                       ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                complaint.id.to_string(),
                complaint.author_id.to_string(),
                complaint.author_email,
                complaint.author_role.as_str(),
                complaint.title,
                complaint.body,
                complaint.category.map(|c| c.as_str()),
                complaint.kind.as_str(),
                complaint.status.as_str(),
                complaint.created_at.to_rfc3339(),
                complaint.updated_at.to_rfc3339(),
                complaint.assignee_id.map(|id| id.to_string()),
                complaint.assignee_email,
                complaint.response_text,
                complaint.response_at.map(|t| t.to_rfc3339()),
                complaint.responder_id.map(|id| id.to_string()),
                complaint.clarification_requested as i64,
            ],
        )?;

        for entry in &complaint.history {
            append_history_entry(&tx, complaint.id, entry)?;
        }

        for (position, file) in complaint.attachments.iter().enumerate() {
            tx.execute(
                "INSERT INTO complaint_attachments (complaint_id, position, name, url)
                 VALUES (?1, ?2, ?3, ?4)",
                params![complaint.id.to_string(), position as i64, file.name, file.url],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single complaint with its ledger and attachments.
    pub fn get_complaint(&self, id: ComplaintId) -> Result<Complaint> {
        let mut complaint = self
            .conn()
            .query_row(
                &format!("{BASE_SELECT} WHERE id = ?1"),
                params![id.to_string()],
                row_to_complaint,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })?;

        complaint.history = self.history_for(id)?;
        complaint.attachments = self.attachments_for(id)?;
        Ok(complaint)
    }

    /// List complaints authored by `author_id`, newest first.
    pub fn list_complaints_by_author(&self, author_id: UserId) -> Result<Vec<Complaint>> {
        self.list_where(
            &format!("{BASE_SELECT} WHERE author_id = ?1 ORDER BY created_at DESC"),
            params![author_id.to_string()],
        )
    }

    /// List every complaint, newest first.  Admin scope.
    pub fn list_all_complaints(&self) -> Result<Vec<Complaint>> {
        self.list_where(&format!("{BASE_SELECT} ORDER BY created_at DESC"), params![])
    }

    /// List complaints assigned to `assignee_id`, most recently updated first.
    pub fn list_complaints_by_assignee(&self, assignee_id: UserId) -> Result<Vec<Complaint>> {
        self.list_where(
            &format!("{BASE_SELECT} WHERE assignee_id = ?1 ORDER BY updated_at DESC"),
            params![assignee_id.to_string()],
        )
    }

    // ------------------------------------------------------------------
    // Lifecycle mutations
    // ------------------------------------------------------------------

    /// Apply a status transition: update the scalar columns and append the
    /// ledger entry in one transaction.
    pub fn record_transition(
        &mut self,
        id: ComplaintId,
        entry: &StatusHistoryEntry,
        clarification_requested: bool,
    ) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        let affected = tx.execute(
            "UPDATE complaints
             SET status = ?2, updated_at = ?3, clarification_requested = ?4
             WHERE id = ?1",
            params![
                id.to_string(),
                entry.status.as_str(),
                entry.at.to_rfc3339(),
                clarification_requested as i64,
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        append_history_entry(&tx, id, entry)?;
        tx.commit()?;
        Ok(())
    }

    /// Record an assignment: set the assignee columns, force status
    /// `Assigned`, and append the ledger entry, atomically.
    pub fn record_assignment(
        &mut self,
        id: ComplaintId,
        assignee_id: UserId,
        assignee_email: &str,
        entry: &StatusHistoryEntry,
    ) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        let affected = tx.execute(
            "UPDATE complaints
             SET assignee_id = ?2, assignee_email = ?3, status = ?4,
                 updated_at = ?5, clarification_requested = 0
             WHERE id = ?1",
            params![
                id.to_string(),
                assignee_id.to_string(),
                assignee_email,
                entry.status.as_str(),
                entry.at.to_rfc3339(),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        append_history_entry(&tx, id, entry)?;
        tx.commit()?;
        Ok(())
    }

    /// Record a response: set the response columns, force status `Answered`,
    /// and append the ledger entry, atomically.
    pub fn record_response(
        &mut self,
        id: ComplaintId,
        response_text: &str,
        responder_id: UserId,
        entry: &StatusHistoryEntry,
    ) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        let affected = tx.execute(
            "UPDATE complaints
             SET response_text = ?2, response_at = ?3, responder_id = ?4,
                 status = ?5, updated_at = ?3, clarification_requested = 0
             WHERE id = ?1",
            params![
                id.to_string(),
                response_text,
                entry.at.to_rfc3339(),
                responder_id.to_string(),
                entry.status.as_str(),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        append_history_entry(&tx, id, entry)?;
        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn list_where<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Complaint>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params, row_to_complaint)?;

        let mut complaints = Vec::new();
        for row in rows {
            complaints.push(row?);
        }
        drop(stmt);

        for complaint in &mut complaints {
            complaint.history = self.history_for(complaint.id)?;
            complaint.attachments = self.attachments_for(complaint.id)?;
        }
        Ok(complaints)
    }

    /// Ledger entries for one complaint, in insertion order.
    fn history_for(&self, id: ComplaintId) -> Result<Vec<StatusHistoryEntry>> {
        let mut stmt = self.conn().prepare(
            "SELECT status, actor_id, at, comment
             FROM complaint_history
             WHERE complaint_id = ?1
             ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map(params![id.to_string()], row_to_history_entry)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Attachments for one complaint, in upload order.
    fn attachments_for(&self, id: ComplaintId) -> Result<Vec<AttachedFile>> {
        let mut stmt = self.conn().prepare(
            "SELECT name, url
             FROM complaint_attachments
             WHERE complaint_id = ?1
             ORDER BY position ASC",
        )?;

        let rows = stmt.query_map(params![id.to_string()], |row| {
            Ok(AttachedFile {
                name: row.get(0)?,
                url: row.get(1)?,
            })
        })?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row?);
        }
        Ok(files)
    }
}

const BASE_SELECT: &str = "SELECT id, author_id, author_email, author_role, title, body,
        category, kind, status, created_at, updated_at,
        assignee_id, assignee_email, response_text, response_at,
        responder_id, clarification_requested
 FROM complaints";

/// Append one ledger entry inside an open transaction.  The ledger is insert
/// only; nothing in this crate updates or deletes `complaint_history` rows.
fn append_history_entry(
    tx: &Transaction<'_>,
    id: ComplaintId,
    entry: &StatusHistoryEntry,
) -> Result<()> {
    tx.execute(
        "INSERT INTO complaint_history (complaint_id, status, actor_id, at, comment)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id.to_string(),
            entry.status.as_str(),
            entry.actor_id.to_string(),
            entry.at.to_rfc3339(),
            entry.comment,
        ],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Row mapping helpers
// ---------------------------------------------------------------------------

fn conv_err(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn bad_value(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
}

fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conv_err(idx, e))
}

/// Map a `rusqlite::Row` to a [`Complaint`] with empty history/attachments;
/// callers fill those from the child tables.
fn row_to_complaint(row: &rusqlite::Row<'_>) -> rusqlite::Result<Complaint> {
    let id_str: String = row.get(0)?;
    let author_id_str: String = row.get(1)?;
    let author_email: String = row.get(2)?;
    let author_role_str: String = row.get(3)?;
    let title: String = row.get(4)?;
    let body: String = row.get(5)?;
    let category_str: Option<String> = row.get(6)?;
    let kind_str: String = row.get(7)?;
    let status_str: String = row.get(8)?;
    let created_str: String = row.get(9)?;
    let updated_str: String = row.get(10)?;
    let assignee_id_str: Option<String> = row.get(11)?;
    let assignee_email: Option<String> = row.get(12)?;
    let response_text: Option<String> = row.get(13)?;
    let response_at_str: Option<String> = row.get(14)?;
    let responder_id_str: Option<String> = row.get(15)?;
    let clarification: i64 = row.get(16)?;

    let id = ComplaintId::parse(&id_str).map_err(|e| conv_err(0, e))?;
    let author_id = UserId::parse(&author_id_str).map_err(|e| conv_err(1, e))?;
    let author_role = Role::from_str(&author_role_str)
        .ok_or_else(|| bad_value(3, format!("unknown role: {author_role_str}")))?;
    let category = match category_str {
        Some(s) => Some(
            Category::from_str(&s).ok_or_else(|| bad_value(6, format!("unknown category: {s}")))?,
        ),
        None => None,
    };
    let kind = ComplaintKind::from_str(&kind_str)
        .ok_or_else(|| bad_value(7, format!("unknown kind: {kind_str}")))?;
    let status = ComplaintStatus::from_str(&status_str)
        .ok_or_else(|| bad_value(8, format!("unknown status: {status_str}")))?;
    let created_at = parse_timestamp(9, &created_str)?;
    let updated_at = parse_timestamp(10, &updated_str)?;
    let assignee_id = assignee_id_str
        .map(|s| UserId::parse(&s))
        .transpose()
        .map_err(|e| conv_err(11, e))?;
    let response_at = response_at_str
        .as_deref()
        .map(|s| parse_timestamp(14, s))
        .transpose()?;
    let responder_id = responder_id_str
        .map(|s| UserId::parse(&s))
        .transpose()
        .map_err(|e| conv_err(15, e))?;

    Ok(Complaint {
        id,
        author_id,
        author_email,
        author_role,
        title,
        body,
        category,
        kind,
        status,
        created_at,
        updated_at,
        assignee_id,
        assignee_email,
        response_text,
        response_at,
        responder_id,
        attachments: Vec::new(),
        history: Vec::new(),
        clarification_requested: clarification != 0,
    })
}

fn row_to_history_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<StatusHistoryEntry> {
    let status_str: String = row.get(0)?;
    let actor_id_str: String = row.get(1)?;
    let at_str: String = row.get(2)?;
    let comment: Option<String> = row.get(3)?;

    let status = ComplaintStatus::from_str(&status_str)
        .ok_or_else(|| bad_value(0, format!("unknown status: {status_str}")))?;
    let actor_id = UserId::parse(&actor_id_str).map_err(|e| conv_err(1, e))?;
    let at = parse_timestamp(2, &at_str)?;

    Ok(StatusHistoryEntry {
        status,
        actor_id,
        at,
        comment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserAccount;

    fn seeded_db() -> (Database, UserId) {
        let db = Database::open_in_memory().unwrap();
        let author = UserAccount {
            id: UserId::new(),
            email: "author@school.example".into(),
            role: Role::Student,
            created_at: Utc::now(),
            blocked: false,
            password_hash: "$argon2id$stub".into(),
            email_verified: false,
        };
        db.insert_user(&author).unwrap();
        (db, author.id)
    }

    fn sample_complaint(author_id: UserId) -> Complaint {
        let now = Utc::now();
        Complaint {
            id: ComplaintId::new(),
            author_id,
            author_email: "author@school.example".into(),
            author_role: Role::Student,
            title: "Cold classrooms".into(),
            body: "Room 12 has no heating.".into(),
            category: Some(Category::Facilities),
            kind: ComplaintKind::Complaint,
            status: ComplaintStatus::New,
            created_at: now,
            updated_at: now,
            assignee_id: None,
            assignee_email: None,
            response_text: None,
            response_at: None,
            responder_id: None,
            attachments: vec![AttachedFile {
                name: "photo.jpg".into(),
                url: "/attachments/abc".into(),
            }],
            history: vec![StatusHistoryEntry {
                status: ComplaintStatus::New,
                actor_id: author_id,
                at: now,
                comment: None,
            }],
            clarification_requested: false,
        }
    }

    #[test]
    fn insert_and_fetch_round_trip() {
        let (mut db, author_id) = seeded_db();
        let complaint = sample_complaint(author_id);
        db.insert_complaint(&complaint).unwrap();

        let fetched = db.get_complaint(complaint.id).unwrap();
        assert_eq!(fetched.title, complaint.title);
        assert_eq!(fetched.history.len(), 1);
        assert_eq!(fetched.history[0].status, ComplaintStatus::New);
        assert_eq!(fetched.history[0].actor_id, author_id);
        assert_eq!(fetched.attachments.len(), 1);
        assert_eq!(fetched.attachments[0].name, "photo.jpg");
    }

    #[test]
    fn missing_complaint_is_not_found() {
        let (db, _) = seeded_db();
        assert!(matches!(
            db.get_complaint(ComplaintId::new()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn transition_appends_and_updates() {
        let (mut db, author_id) = seeded_db();
        let complaint = sample_complaint(author_id);
        db.insert_complaint(&complaint).unwrap();

        let actor = UserId::new();
        let entry = StatusHistoryEntry {
            status: ComplaintStatus::NeedsClarification,
            actor_id: actor,
            at: Utc::now(),
            comment: Some("which room exactly?".into()),
        };
        db.record_transition(complaint.id, &entry, true).unwrap();

        let fetched = db.get_complaint(complaint.id).unwrap();
        assert_eq!(fetched.status, ComplaintStatus::NeedsClarification);
        assert!(fetched.clarification_requested);
        assert_eq!(fetched.history.len(), 2);
        assert_eq!(fetched.history[1].actor_id, actor);
        assert_eq!(fetched.history[1].comment.as_deref(), Some("which room exactly?"));
        // The original entry is untouched.
        assert_eq!(fetched.history[0].status, ComplaintStatus::New);
    }

    #[test]
    fn transition_on_missing_complaint_leaves_ledger_empty() {
        let (mut db, _) = seeded_db();
        let entry = StatusHistoryEntry {
            status: ComplaintStatus::InProgress,
            actor_id: UserId::new(),
            at: Utc::now(),
            comment: None,
        };
        assert!(matches!(
            db.record_transition(ComplaintId::new(), &entry, false),
            Err(StoreError::NotFound)
        ));

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM complaint_history", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn assignment_sets_fields_and_ledger() {
        let (mut db, author_id) = seeded_db();
        let complaint = sample_complaint(author_id);
        db.insert_complaint(&complaint).unwrap();

        let admin = UserId::new();
        let teacher = UserId::new();
        let entry = StatusHistoryEntry {
            status: ComplaintStatus::Assigned,
            actor_id: admin,
            at: Utc::now(),
            comment: Some("Assigned to teacher: t@school.example".into()),
        };
        db.record_assignment(complaint.id, teacher, "t@school.example", &entry)
            .unwrap();

        let fetched = db.get_complaint(complaint.id).unwrap();
        assert_eq!(fetched.status, ComplaintStatus::Assigned);
        assert_eq!(fetched.assignee_id, Some(teacher));
        assert_eq!(fetched.assignee_email.as_deref(), Some("t@school.example"));
        assert_eq!(fetched.history.len(), 2);
    }

    #[test]
    fn response_sets_fields_and_ledger() {
        let (mut db, author_id) = seeded_db();
        let complaint = sample_complaint(author_id);
        db.insert_complaint(&complaint).unwrap();

        let responder = UserId::new();
        let entry = StatusHistoryEntry {
            status: ComplaintStatus::Answered,
            actor_id: responder,
            at: Utc::now(),
            comment: Some("Response added".into()),
        };
        db.record_response(complaint.id, "Heating fixed.", responder, &entry)
            .unwrap();

        let fetched = db.get_complaint(complaint.id).unwrap();
        assert_eq!(fetched.status, ComplaintStatus::Answered);
        assert_eq!(fetched.response_text.as_deref(), Some("Heating fixed."));
        assert_eq!(fetched.responder_id, Some(responder));
        assert!(fetched.response_at.is_some());
    }

    #[test]
    fn list_orderings() {
        let (mut db, author_id) = seeded_db();

        let mut first = sample_complaint(author_id);
        first.created_at = Utc::now() - chrono::Duration::hours(2);
        first.updated_at = first.created_at;
        let mut second = sample_complaint(author_id);
        second.id = ComplaintId::new();
        db.insert_complaint(&first).unwrap();
        db.insert_complaint(&second).unwrap();

        // Own/All: newest created first.
        let own = db.list_complaints_by_author(author_id).unwrap();
        assert_eq!(own.len(), 2);
        assert_eq!(own[0].id, second.id);

        let all = db.list_all_complaints().unwrap();
        assert_eq!(all[0].id, second.id);

        // Assigned: most recently updated first.
        let teacher = UserId::new();
        for c in [&first, &second] {
            let entry = StatusHistoryEntry {
                status: ComplaintStatus::Assigned,
                actor_id: UserId::new(),
                at: Utc::now(),
                comment: None,
            };
            db.record_assignment(c.id, teacher, "t@school.example", &entry)
                .unwrap();
        }
        // Touch `first` again so it becomes the most recently updated.
        let entry = StatusHistoryEntry {
            status: ComplaintStatus::InProgress,
            actor_id: teacher,
            at: Utc::now() + chrono::Duration::seconds(1),
            comment: None,
        };
        db.record_transition(first.id, &entry, false).unwrap();

        let assigned = db.list_complaints_by_assignee(teacher).unwrap();
        assert_eq!(assigned.len(), 2);
        assert_eq!(assigned[0].id, first.id);
    }
}
