//! Queries against the `users` and `groups` tables.
//!
//! Every lookup by id ignores ids `<= 0`: those belong to the sentinel
//! deleted user and are never real accounts.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Group, User, UserListing, DELETED_USER_ID};

const USER_COLUMNS: &str = "id, groupid, login, password, name, email, created";

pub struct NewUser<'a> {
    pub groupid: i64,
    pub login: &'a str,
    pub password_hash: &'a str,
    pub name: &'a str,
    pub email: &'a str,
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        groupid: row.get(1)?,
        login: row.get(2)?,
        password: row.get(3)?,
        name: row.get(4)?,
        email: row.get(5)?,
        created: row.get(6)?,
    })
}

pub fn find_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    if id <= 0 {
        return Ok(None);
    }
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        user_from_row,
    )
    .optional()
}

pub fn find_by_login(conn: &Connection, login: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE login = ?1 AND id > 0"),
        params![login],
        user_from_row,
    )
    .optional()
}

/// Resolve the key typed into the password reset form: an e-mail address
/// when it contains `@`, a login otherwise. Several accounts may share an
/// address; the oldest one wins.
pub fn find_for_reset(conn: &Connection, key: &str) -> rusqlite::Result<Option<User>> {
    if key.contains('@') {
        conn.query_row(
            &format!(
                "SELECT {USER_COLUMNS} FROM users WHERE email = ?1 AND id > 0 ORDER BY id LIMIT 1"
            ),
            params![key],
            user_from_row,
        )
        .optional()
    } else {
        find_by_login(conn, key)
    }
}

pub fn login_exists(conn: &Connection, login: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE login = ?1",
        params![login],
        |row| row.get(0),
    )
}

pub fn insert(conn: &Connection, user: &NewUser<'_>) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO users (groupid, login, password, name, email) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user.groupid,
            user.login,
            user.password_hash,
            user.name,
            user.email
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Save name and e-mail, and the group when one is given, in one
/// transaction.
pub fn update_profile(
    conn: &mut Connection,
    id: i64,
    name: &str,
    email: &str,
    groupid: Option<i64>,
) -> rusqlite::Result<usize> {
    let tx = conn.transaction()?;
    let updated = tx.execute(
        "UPDATE users SET name = ?1, email = ?2 WHERE id = ?3 AND id > 0",
        params![name, email, id],
    )?;
    if let Some(groupid) = groupid {
        set_group(&tx, id, groupid)?;
    }
    tx.commit()?;

    Ok(updated)
}

/// True when `err` comes from a UNIQUE constraint, as opposed to any other
/// constraint kind.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

pub fn set_group(conn: &Connection, id: i64, groupid: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE users SET groupid = ?1 WHERE id = ?2 AND id > 0",
        params![groupid, id],
    )
}

pub fn set_password(conn: &Connection, id: i64, password_hash: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE users SET password = ?1 WHERE id = ?2 AND id > 0",
        params![password_hash, id],
    )
}

/// Hand the user's news items and projects to the sentinel deleted user,
/// then remove the account. Returns false when there was no such account.
pub fn delete(conn: &mut Connection, id: i64) -> rusqlite::Result<bool> {
    if id <= 0 {
        return Ok(false);
    }

    let tx = conn.transaction()?;
    tx.execute(
        "UPDATE news SET userid = ?1 WHERE userid = ?2",
        params![DELETED_USER_ID, id],
    )?;
    tx.execute(
        "UPDATE projects SET userid = ?1 WHERE userid = ?2",
        params![DELETED_USER_ID, id],
    )?;
    let removed = tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    tx.commit()?;

    Ok(removed > 0)
}

/// Every real account with its group name, ordered by display name.
pub fn list(conn: &Connection) -> rusqlite::Result<Vec<UserListing>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.login, u.name, u.email, g.name FROM users u \
         JOIN groups g ON u.groupid = g.id \
         WHERE u.id > 0 \
         ORDER BY u.name, u.id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(UserListing {
            id: row.get(0)?,
            login: row.get(1)?,
            name: row.get(2)?,
            email: row.get(3)?,
            group_name: row.get(4)?,
        })
    })?;
    rows.collect()
}

/// Groups an administrator may assign.
pub fn assignable_groups(conn: &Connection) -> rusqlite::Result<Vec<Group>> {
    let mut stmt =
        conn.prepare("SELECT id, name, manage_users FROM groups WHERE id >= 0 ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(Group {
            id: row.get(0)?,
            name: row.get(1)?,
            manage_users: row.get(2)?,
        })
    })?;
    rows.collect()
}

pub fn is_assignable_group(conn: &Connection, groupid: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM groups WHERE id = ?1 AND id >= 0",
        params![groupid],
        |row| row.get(0),
    )
}

pub fn count_managers(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM users u JOIN groups g ON u.groupid = g.id \
         WHERE u.id > 0 AND g.manage_users = 1",
        [],
        |row| row.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::DEFAULT_GROUP_ID;
    use crate::db::tests::test_pool;

    fn add(conn: &Connection, login: &str, name: &str, email: &str) -> i64 {
        insert(
            conn,
            &NewUser {
                groupid: DEFAULT_GROUP_ID,
                login,
                password_hash: "hash",
                name,
                email,
            },
        )
        .unwrap()
    }

    #[test]
    fn insert_then_find() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = add(&conn, "alice", "Alice", "alice@example.org");

        let user = find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(user.login, "alice");
        assert_eq!(user.groupid, DEFAULT_GROUP_ID);
        assert!(!user.created.is_empty());

        assert_eq!(find_by_login(&conn, "alice").unwrap().unwrap().id, id);
        assert!(find_by_login(&conn, "Alice").unwrap().is_none());
    }

    #[test]
    fn duplicate_login_is_rejected_by_constraint() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        add(&conn, "bob", "Bob", "bob@example.org");

        assert!(login_exists(&conn, "bob").unwrap());
        let second = insert(
            &conn,
            &NewUser {
                groupid: DEFAULT_GROUP_ID,
                login: "bob",
                password_hash: "hash",
                name: "Other Bob",
                email: "other@example.org",
            },
        );
        assert!(is_unique_violation(&second.unwrap_err()));
    }

    #[test]
    fn foreign_key_failure_is_not_a_unique_violation() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let err = insert(
            &conn,
            &NewUser {
                groupid: 99,
                login: "nogroup",
                password_hash: "hash",
                name: "No Group",
                email: "",
            },
        )
        .unwrap_err();
        assert!(!is_unique_violation(&err));
    }

    #[test]
    fn profile_update_is_all_or_nothing() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let id = add(&conn, "hugo", "Hugo", "hugo@example.org");

        assert!(update_profile(&mut conn, id, "Hugo B", "", Some(99)).is_err());
        let user = find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(user.name, "Hugo");
        assert_eq!(user.groupid, DEFAULT_GROUP_ID);

        assert_eq!(update_profile(&mut conn, id, "Hugo B", "", Some(1)).unwrap(), 1);
        let user = find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(user.name, "Hugo B");
        assert_eq!(user.groupid, 1);
    }

    #[test]
    fn sentinel_is_not_an_account() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        assert!(find_by_id(&conn, DELETED_USER_ID).unwrap().is_none());
        assert!(find_by_login(&conn, "deleted").unwrap().is_none());
        assert_eq!(
            update_profile(&mut conn, DELETED_USER_ID, "x", "", None).unwrap(),
            0
        );
    }

    #[test]
    fn reset_lookup_uses_email_when_key_has_at_sign() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let first = add(&conn, "carol", "Carol", "shared@example.org");
        add(&conn, "dave", "Dave", "shared@example.org");

        let by_email = find_for_reset(&conn, "shared@example.org").unwrap().unwrap();
        assert_eq!(by_email.id, first);

        let by_login = find_for_reset(&conn, "dave").unwrap().unwrap();
        assert_eq!(by_login.login, "dave");

        assert!(find_for_reset(&conn, "nobody@example.org").unwrap().is_none());
    }

    #[test]
    fn delete_reassigns_news_and_projects() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let id = add(&conn, "erin", "Erin", "erin@example.org");
        let keep = add(&conn, "frank", "Frank", "frank@example.org");

        conn.execute(
            "INSERT INTO news (userid, title) VALUES (?1, 'release'), (?2, 'other')",
            params![id, keep],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO projects (userid, name) VALUES (?1, 'game')",
            params![id],
        )
        .unwrap();

        assert!(delete(&mut conn, id).unwrap());
        assert!(find_by_id(&conn, id).unwrap().is_none());

        let news_owner: i64 = conn
            .query_row("SELECT userid FROM news WHERE title = 'release'", [], |r| {
                r.get(0)
            })
            .unwrap();
        let other_owner: i64 = conn
            .query_row("SELECT userid FROM news WHERE title = 'other'", [], |r| {
                r.get(0)
            })
            .unwrap();
        let project_owner: i64 = conn
            .query_row("SELECT userid FROM projects WHERE name = 'game'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(news_owner, DELETED_USER_ID);
        assert_eq!(other_owner, keep);
        assert_eq!(project_owner, DELETED_USER_ID);
    }

    #[test]
    fn delete_refuses_sentinel_and_unknown_ids() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        assert!(!delete(&mut conn, DELETED_USER_ID).unwrap());
        assert!(!delete(&mut conn, 999).unwrap());
    }

    #[test]
    fn list_hides_sentinel_and_orders_by_name() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        add(&conn, "zed", "Zed", "zed@example.org");
        add(&conn, "amy", "Amy", "amy@example.org");

        let names: Vec<String> = list(&conn).unwrap().into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["Amy", "Zed"]);
        assert_eq!(list(&conn).unwrap()[0].group_name, "users");
    }

    #[test]
    fn assignable_groups_exclude_deleted_group() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let ids: Vec<i64> = assignable_groups(&conn)
            .unwrap()
            .into_iter()
            .map(|g| g.id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(is_assignable_group(&conn, 1).unwrap());
        assert!(!is_assignable_group(&conn, -1).unwrap());
        assert!(!is_assignable_group(&conn, 7).unwrap());
    }

    #[test]
    fn count_managers_follows_group_flag() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = add(&conn, "gina", "Gina", "gina@example.org");
        assert_eq!(count_managers(&conn).unwrap(), 0);
        set_group(&conn, id, 1).unwrap();
        assert_eq!(count_managers(&conn).unwrap(), 1);
    }
}
