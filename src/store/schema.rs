//! Schema for the persistent store.

pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- Response cache namespaces (one row per shell_vX / dynamic_vX)
CREATE TABLE IF NOT EXISTS cache_namespaces (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Stored response snapshots, keyed by (method, absolute URL) per namespace
CREATE TABLE IF NOT EXISTS cached_responses (
    namespace TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    content_type TEXT,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (namespace, method, url),
    FOREIGN KEY (namespace) REFERENCES cache_namespaces(name) ON DELETE CASCADE
);

-- Pending mutations awaiting acknowledgment by the remote API.
-- id is the insertion order; rejections/dead_at are drain bookkeeping.
CREATE TABLE IF NOT EXISTS pending_mutations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    payload BLOB NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    rejections INTEGER NOT NULL DEFAULT 0,
    dead_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_pending_mutations_kind
    ON pending_mutations(kind, id);
"#;
