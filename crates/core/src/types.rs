//! Primitive aliases shared by every crate in the workspace.

/// Database primary key (BIGSERIAL in Postgres).
pub type DbId = i64;

/// UTC timestamp, as stored in TIMESTAMPTZ columns.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
