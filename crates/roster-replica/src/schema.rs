//! SQL schema of a teacher replica.
//!
//! This layout is shared with the deployed client bundle and must stay
//! stable: table and column names are read by code outside this workspace.

/// Central server the replica points at unless configured otherwise.
pub const DEFAULT_CENTRAL_SERVER_URL: &str = "http://localhost:4001";

/// Replica DDL; idempotent so reprovisioning can run it again.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS User (
    id               TEXT PRIMARY KEY,
    username         TEXT,
    password         TEXT,
    fullName         TEXT,
    centralServerUrl TEXT DEFAULT 'http://localhost:4001'
);

CREATE TABLE IF NOT EXISTS Sections (
    id               TEXT PRIMARY KEY,
    name             TEXT,
    educationalLevel TEXT
);

CREATE TABLE IF NOT EXISTS Students (
    id          INTEGER PRIMARY KEY,
    first_name  TEXT,
    last_name   TEXT,
    section_id  TEXT,
    class_order INTEGER
);

CREATE TABLE IF NOT EXISTS Attendances (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    studentId      INTEGER,
    sectionId      TEXT,
    date           TEXT,
    isPresent      INTEGER,
    createdAt      TEXT,
    updatedAt      TEXT,
    syncedToServer INTEGER DEFAULT 0,
    UNIQUE (studentId, date)
);

-- Append-only.
CREATE TABLE IF NOT EXISTS SyncLog (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    action    TEXT,
    timestamp TEXT,
    details   TEXT
);
";
