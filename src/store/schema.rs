pub const SCHEMA: &str = r#"
-- Users authenticate with a password and act through their API key
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,       -- argon2id hash with embedded salt
    api_key TEXT UNIQUE,               -- NULL until issued
    created_at TEXT DEFAULT (datetime('now'))
);

-- Repositories map 1:1 to buckets. Ownership is by API key value, not a
-- foreign key, so reissuing a key orphans the owner's repositories.
CREATE TABLE IF NOT EXISTS repositories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,         -- bucket name, global across owners
    display_name TEXT NOT NULL,
    link TEXT NOT NULL UNIQUE,         -- public link token
    owner_api_key TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(owner_api_key, display_name)
);

-- File metadata; the object key in the bucket is display_name
CREATE TABLE IF NOT EXISTS files (
    id TEXT PRIMARY KEY,
    repository_id TEXT NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    display_name TEXT NOT NULL,
    name TEXT NOT NULL,                -- slug of display_name
    download_url TEXT,
    size_bytes INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(repository_id, name),
    UNIQUE(repository_id, display_name)
);

-- Buckets whose repository is gone but whose removal from storage failed
CREATE TABLE IF NOT EXISTS orphaned_buckets (
    bucket TEXT PRIMARY KEY,
    reason TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    last_attempt_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_repositories_owner ON repositories(owner_api_key);
CREATE INDEX IF NOT EXISTS idx_files_repository ON files(repository_id);
"#;
