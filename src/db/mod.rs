pub mod models;
pub mod users;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

use crate::auth::password;
use crate::db::models::ADMIN_GROUP_ID;
use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

/// Login of the account created when no administrator exists yet.
pub const BOOTSTRAP_ADMIN_LOGIN: &str = "admin";

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas are per connection, so every pooled connection gets them.
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )
    });
    let pool = Pool::builder().max_size(8).build(manager)?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    // Create migrations tracking table
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Create the `admin` account when nobody can manage users yet.
/// Returns the generated password so the caller can hand it to the operator.
pub fn ensure_admin(pool: &DbPool, bcrypt_cost: u32) -> anyhow::Result<Option<String>> {
    let conn = pool.get()?;

    if users::count_managers(&conn)? > 0 {
        return Ok(None);
    }

    let plain = password::generate_password();
    let hash = password::hash_password(&plain, bcrypt_cost)?;

    if let Some(existing) = users::find_by_login(&conn, BOOTSTRAP_ADMIN_LOGIN)? {
        // An `admin` login exists but lost its privileges: promote it back.
        users::set_group(&conn, existing.id, ADMIN_GROUP_ID)?;
        users::set_password(&conn, existing.id, &hash)?;
    } else {
        users::insert(
            &conn,
            &users::NewUser {
                groupid: ADMIN_GROUP_ID,
                login: BOOTSTRAP_ADMIN_LOGIN,
                password_hash: &hash,
                name: "Administrator",
                email: "",
            },
        )?;
    }

    Ok(Some(plain))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_pool() -> DbPool {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().max_size(1).build(manager).unwrap();
        run_migrations(&pool).unwrap();
        pool
    }

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path).unwrap();
        assert!(db_path.exists());
        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn migrations_create_expected_tables() {
        let pool = test_pool();
        let conn = pool.get().unwrap();

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };
        for table in ["groups", "users", "sessions", "news", "projects"] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn sentinel_user_is_seeded() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let (login, groupid): (String, i64) = conn
            .query_row(
                "SELECT login, groupid FROM users WHERE id = -1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(login, "deleted");
        assert_eq!(groupid, -1);
    }

    #[test]
    fn first_real_user_gets_positive_id() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = users::insert(
            &conn,
            &users::NewUser {
                groupid: 2,
                login: "alice",
                password_hash: "x",
                name: "Alice",
                email: "alice@example.org",
            },
        )
        .unwrap();
        assert!(id > 0);
    }

    #[test]
    fn foreign_keys_enforced() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let result = conn.execute(
            "INSERT INTO news (userid, title) VALUES (?1, ?2)",
            params![4242, "orphan"],
        );
        assert!(result.is_err());
    }

    #[test]
    fn ensure_admin_runs_once() {
        let pool = test_pool();
        let first = ensure_admin(&pool, 4).unwrap();
        let second = ensure_admin(&pool, 4).unwrap();

        let plain = first.expect("admin should be created on an empty database");
        assert!(second.is_none());

        let conn = pool.get().unwrap();
        let admin = users::find_by_login(&conn, BOOTSTRAP_ADMIN_LOGIN)
            .unwrap()
            .unwrap();
        assert_eq!(admin.groupid, ADMIN_GROUP_ID);
        assert!(password::verify_password(&plain, &admin.password));
    }
}
