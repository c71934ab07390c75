//! v001 -- Initial schema creation.
//!
//! Creates the four core tables: `users`, `complaints`, `complaint_history`,
//! and `complaint_attachments`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id             TEXT PRIMARY KEY NOT NULL,   -- UUID v4 (identity-provider key)
    email          TEXT NOT NULL UNIQUE,
    role           TEXT NOT NULL,               -- student / parent / teacher / admin
    created_at     TEXT NOT NULL,               -- ISO-8601 / RFC-3339
    blocked        INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    password_hash  TEXT NOT NULL,               -- Argon2id PHC string
    email_verified INTEGER NOT NULL DEFAULT 0   -- boolean 0/1
);

-- ----------------------------------------------------------------
-- Complaints
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS complaints (
    id                      TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    author_id               TEXT NOT NULL,              -- FK -> users(id)
    author_email            TEXT NOT NULL,
    author_role             TEXT NOT NULL,              -- role snapshot at submission
    title                   TEXT NOT NULL,
    body                    TEXT NOT NULL,
    category                TEXT,                       -- nullable
    kind                    TEXT NOT NULL,              -- complaint / suggestion
    status                  TEXT NOT NULL,
    created_at              TEXT NOT NULL,
    updated_at              TEXT NOT NULL,
    assignee_id             TEXT,                       -- nullable FK -> users(id)
    assignee_email          TEXT,
    response_text           TEXT,
    response_at             TEXT,
    responder_id            TEXT,
    clarification_requested INTEGER NOT NULL DEFAULT 0,

    FOREIGN KEY (author_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_complaints_author_created
    ON complaints(author_id, created_at DESC);

CREATE INDEX IF NOT EXISTS idx_complaints_assignee_updated
    ON complaints(assignee_id, updated_at DESC);

-- ----------------------------------------------------------------
-- Complaint status history (append-only ledger)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS complaint_history (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,     -- insertion order
    complaint_id TEXT NOT NULL,                         -- FK -> complaints(id)
    status       TEXT NOT NULL,
    actor_id     TEXT NOT NULL,
    at           TEXT NOT NULL,
    comment      TEXT,

    FOREIGN KEY (complaint_id) REFERENCES complaints(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_history_complaint_seq
    ON complaint_history(complaint_id, seq);

-- ----------------------------------------------------------------
-- Complaint attachments (ordered, at most five per complaint)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS complaint_attachments (
    complaint_id TEXT NOT NULL,                         -- FK -> complaints(id)
    position     INTEGER NOT NULL,                      -- upload order, 0-based
    name         TEXT NOT NULL,
    url          TEXT NOT NULL,

    PRIMARY KEY (complaint_id, position),
    FOREIGN KEY (complaint_id) REFERENCES complaints(id) ON DELETE CASCADE
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
