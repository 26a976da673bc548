//! SQL schema for the central store.
//!
//! Executed once at connection startup. Column names follow the central
//! application's conventions: camelCase, except the student columns inherited
//! from the spreadsheet importer.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS Users (
    id        TEXT PRIMARY KEY,
    username  TEXT NOT NULL UNIQUE,
    password  TEXT NOT NULL,           -- argon2 PHC string
    fullName  TEXT NOT NULL,
    role      TEXT NOT NULL CHECK (role IN ('admin', 'teacher')),
    createdAt TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS Sections (
    id               TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    educationalLevel TEXT,
    specialization   TEXT
);

CREATE TABLE IF NOT EXISTS Students (
    id          TEXT PRIMARY KEY,
    first_name  TEXT NOT NULL,
    last_name   TEXT NOT NULL,
    section_id  TEXT NOT NULL REFERENCES Sections(id) ON DELETE CASCADE,
    class_order INTEGER
);

CREATE TABLE IF NOT EXISTS TeacherSections (
    teacherId TEXT NOT NULL REFERENCES Users(id)    ON DELETE CASCADE,
    sectionId TEXT NOT NULL REFERENCES Sections(id) ON DELETE CASCADE,
    PRIMARY KEY (teacherId, sectionId)
);

-- One row per (studentId, date); pushes overwrite via ON CONFLICT.
CREATE TABLE IF NOT EXISTS Attendances (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    studentId TEXT    NOT NULL REFERENCES Students(id) ON DELETE CASCADE,
    sectionId TEXT    NOT NULL REFERENCES Sections(id) ON DELETE CASCADE,
    date      TEXT    NOT NULL,        -- YYYY-MM-DD
    isPresent INTEGER NOT NULL,
    createdAt TEXT    NOT NULL,        -- RFC 3339 UTC
    updatedAt TEXT    NOT NULL,
    UNIQUE (studentId, date)
);

CREATE INDEX IF NOT EXISTS students_section_idx    ON Students(section_id);
CREATE INDEX IF NOT EXISTS attendances_section_idx ON Attendances(sectionId);

PRAGMA user_version = 1;
";
