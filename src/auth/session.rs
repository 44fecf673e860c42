use axum::http::{header, HeaderMap};
use rand::Rng;
use rusqlite::params;

use crate::error::AppResult;
use crate::state::DbPool;

/// Create a new session for a user. Returns the session token.
pub fn create_session(pool: &DbPool, user_id: i64, hours: u64) -> AppResult<String> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) \
         VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Drop every expired session. Returns how many were removed.
pub fn purge_expired(pool: &DbPool) -> AppResult<usize> {
    let conn = pool.get()?;
    let removed = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )?;
    Ok(removed)
}

pub fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

pub fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_pool;
    use crate::db::users::{self, NewUser};
    use axum::http::HeaderValue;

    fn session_count(pool: &DbPool) -> i64 {
        pool.get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))
            .unwrap()
    }

    fn seed_user(pool: &DbPool) -> i64 {
        let conn = pool.get().unwrap();
        users::insert(
            &conn,
            &NewUser {
                groupid: 2,
                login: "alice",
                password_hash: "hash",
                name: "Alice",
                email: "alice@example.org",
            },
        )
        .unwrap()
    }

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn create_and_delete_session() {
        let pool = test_pool();
        let user_id = seed_user(&pool);

        let token = create_session(&pool, user_id, 1).unwrap();
        assert_eq!(session_count(&pool), 1);

        delete_session(&pool, &token).unwrap();
        assert_eq!(session_count(&pool), 0);
    }

    #[test]
    fn purge_removes_only_expired_sessions() {
        let pool = test_pool();
        let user_id = seed_user(&pool);

        create_session(&pool, user_id, 0).unwrap();
        create_session(&pool, user_id, 24).unwrap();

        assert_eq!(purge_expired(&pool).unwrap(), 1);
        assert_eq!(session_count(&pool), 1);
    }

    #[test]
    fn sessions_go_away_with_their_user() {
        let pool = test_pool();
        let user_id = seed_user(&pool);
        create_session(&pool, user_id, 24).unwrap();

        let mut conn = pool.get().unwrap();
        users::delete(&mut conn, user_id).unwrap();
        drop(conn);

        assert_eq!(session_count(&pool), 0);
    }

    #[test]
    fn cookie_value_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; homesite_session=abc123"),
        );
        assert_eq!(cookie_value(&headers, "homesite_session"), Some("abc123"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn session_cookie_format() {
        assert_eq!(
            session_cookie("s", "tok", 2),
            "s=tok; HttpOnly; SameSite=Strict; Path=/; Max-Age=7200"
        );
        assert!(clear_session_cookie("s").ends_with("Max-Age=0"));
    }
}
