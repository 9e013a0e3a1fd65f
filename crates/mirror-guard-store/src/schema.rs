use rusqlite_migration::{M, Migrations};

pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(
            "CREATE TABLE repositories (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         TEXT NOT NULL,
                owner           TEXT NOT NULL,
                name            TEXT NOT NULL,
                mirror_owner    TEXT NOT NULL,
                clone_url       TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'imported',
                error_message   TEXT,
                updated_at      TEXT NOT NULL,
                UNIQUE (user_id, owner, name)
            );

            CREATE INDEX idx_repositories_status ON repositories(status);",
        ),
        M::up(
            "CREATE TABLE activities (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         TEXT NOT NULL,
                repository_id   TEXT NOT NULL,
                message         TEXT NOT NULL,
                details         TEXT,
                status          TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_activities_repository ON activities(repository_id);",
        ),
    ])
}
