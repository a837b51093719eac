pub const SCHEMA: &str = r#"
-- Accounts, linked to the identity provider by user_id
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT UNIQUE,
    email TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

-- Shared catalog of workflow templates, written out-of-band
CREATE TABLE IF NOT EXISTS scenarios (
    scenario_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    parameters TEXT,              -- JSON array of parameter definitions
    outputs TEXT,                 -- JSON document
    workflow_id TEXT
);

-- Per-user scheduled jobs
CREATE TABLE IF NOT EXISTS trackers (
    tracker_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    name TEXT,
    description TEXT,
    interval INTEGER,
    time TEXT,
    parameters TEXT,              -- JSON array of parameter values
    actions TEXT,                 -- JSON document
    is_active INTEGER,
    created_at TEXT,
    scenario_id INTEGER REFERENCES scenarios(scenario_id),
    workflow_id TEXT
);

-- Run records, written out-of-band
CREATE TABLE IF NOT EXISTS histories (
    history_id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    output TEXT,
    summeries TEXT,
    tracker_id INTEGER REFERENCES trackers(tracker_id),
    user_id INTEGER REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_trackers_user ON trackers(user_id);
CREATE INDEX IF NOT EXISTS idx_histories_tracker ON histories(tracker_id);
CREATE INDEX IF NOT EXISTS idx_histories_user ON histories(user_id);
"#;
