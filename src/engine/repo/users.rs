//! User Repository: accounts, roles, positions and credentials.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::parse_column;
use crate::engine::error::{Result, TrackerError};
use crate::engine::forms::UserDraft;
use crate::engine::session::hash_password;
use crate::engine::types::{Role, User};

pub const USER_SELECT: &str = "SELECT u.sap, u.name, u.username, u.role, u.position_id, p.name
     FROM users u LEFT JOIN positions p ON p.id = u.position_id";

pub struct UserRepo<'a> {
    conn: &'a Connection,
}

impl<'a> UserRepo<'a> {
    #[must_use]
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Inserts a user. The draft must carry a password.
    ///
    /// # Errors
    /// Returns `Conflict` if the SAP or username is taken.
    pub fn add(&self, draft: &UserDraft) -> Result<()> {
        if self.find_by_sap(draft.sap)?.is_some() {
            return Err(TrackerError::Conflict(format!(
                "User with SAP {} already exists",
                draft.sap
            )));
        }
        self.ensure_username_free(&draft.username, None)?;
        let password = draft.password.as_deref().unwrap_or_default();

        self.conn.execute(
            "INSERT INTO users (sap, name, username, password_hash, role, position_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                draft.sap,
                draft.name,
                draft.username,
                hash_password(draft.sap, password),
                draft.role.to_string(),
                draft.position_id
            ],
        )?;
        debug!(sap = draft.sap, "user inserted");
        Ok(())
    }

    fn ensure_username_free(&self, username: &str, except_sap: Option<i64>) -> Result<()> {
        match self.find_by_username(username)? {
            Some(existing) if Some(existing.sap) != except_sap => Err(TrackerError::Conflict(
                format!("Username '{username}' is already taken"),
            )),
            _ => Ok(()),
        }
    }

    /// Lists users ordered by name, optionally only one role.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn get_all(&self, role: Option<Role>) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT} ORDER BY u.name COLLATE NOCASE, u.sap"))?;
        let rows = stmt.query_map([], Self::row_to_user)?;
        let mut users = Vec::new();
        for user in rows {
            let user = user?;
            if role.map_or(true, |r| r == user.role) {
                users.push(user);
            }
        }
        Ok(users)
    }

    /// # Errors
    /// Returns error if the query fails.
    pub fn find_by_sap(&self, sap: i64) -> Result<Option<User>> {
        let sql = format!("{USER_SELECT} WHERE u.sap = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![sap], Self::row_to_user)
            .optional()?)
    }

    /// Case-insensitive username lookup.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("{USER_SELECT} WHERE LOWER(u.username) = LOWER(?1)");
        Ok(self
            .conn
            .query_row(&sql, params![username.trim()], Self::row_to_user)
            .optional()?)
    }

    /// The user and stored digest for a login attempt.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn credentials(&self, username: &str) -> Result<Option<(User, String)>> {
        let Some(user) = self.find_by_username(username)? else {
            return Ok(None);
        };
        Ok(self.password_hash(user.sap)?.map(|hash| (user, hash)))
    }

    /// Stored password digest of one account.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn password_hash(&self, sap: i64) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT password_hash FROM users WHERE sap = ?1",
                params![sap],
                |r| r.get(0),
            )
            .optional()?)
    }

    /// Rewrites a user. A draft without a password keeps the stored one.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown SAP, `Conflict` for a taken username.
    pub fn update(&self, draft: &UserDraft) -> Result<()> {
        if self.find_by_sap(draft.sap)?.is_none() {
            return Err(TrackerError::not_found("User", draft.sap));
        }
        self.ensure_username_free(&draft.username, Some(draft.sap))?;

        let password_hash = draft
            .password
            .as_deref()
            .map(|password| hash_password(draft.sap, password));
        self.conn.execute(
            "UPDATE users SET name = ?1, username = ?2, role = ?3, position_id = ?4,
                    password_hash = COALESCE(?5, password_hash)
             WHERE sap = ?6",
            params![
                draft.name,
                draft.username,
                draft.role.to_string(),
                draft.position_id,
                password_hash,
                draft.sap
            ],
        )?;
        Ok(())
    }

    /// Deletes a user that owns no projects or tasks.
    ///
    /// # Errors
    /// Returns `Conflict` if work is still assigned, `NotFound` if absent.
    pub fn delete(&self, sap: i64) -> Result<()> {
        let owned: i64 = self.conn.query_row(
            "SELECT (SELECT COUNT(*) FROM projects WHERE assigned_to = ?1)
                  + (SELECT COUNT(*) FROM tasks WHERE assigned_to = ?1)",
            params![sap],
            |r| r.get(0),
        )?;
        if owned > 0 {
            return Err(TrackerError::Conflict(format!(
                "Failed to delete user because {owned} project(s) or task(s) are assigned to them"
            )));
        }
        let removed = self
            .conn
            .execute("DELETE FROM users WHERE sap = ?1", params![sap])?;
        if removed == 0 {
            return Err(TrackerError::not_found("User", sap));
        }
        Ok(())
    }

    /// # Errors
    /// Returns error if the query fails.
    pub fn count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?)
    }

    fn row_to_user(row: &Row) -> rusqlite::Result<User> {
        let role: String = row.get(3)?;
        Ok(User {
            sap: row.get(0)?,
            name: row.get(1)?,
            username: row.get(2)?,
            role: parse_column(3, &role)?,
            position_id: row.get(4)?,
            position_name: row.get(5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::db::Db;
    use crate::engine::session::verify_password;

    fn draft(sap: i64, username: &str, role: Role) -> UserDraft {
        UserDraft {
            sap,
            name: username.to_uppercase(),
            username: username.to_string(),
            password: Some("pw".to_string()),
            role,
            position_id: None,
        }
    }

    #[test]
    fn test_add_and_lookup() {
        let conn = Db::open_in_memory().unwrap();
        let repo = UserRepo::new(&conn);
        repo.add(&draft(1, "root", Role::Admin)).unwrap();
        repo.add(&draft(2, "kai", Role::Itga)).unwrap();

        assert_eq!(repo.find_by_username("KAI").unwrap().unwrap().sap, 2);
        assert_eq!(repo.get_all(None).unwrap().len(), 2);
        assert_eq!(repo.get_all(Some(Role::Itga)).unwrap().len(), 1);
        assert_eq!(repo.count().unwrap(), 2);

        let (user, hash) = repo.credentials("kai").unwrap().unwrap();
        assert!(verify_password(user.sap, "pw", &hash));
    }

    #[test]
    fn test_duplicates_conflict() {
        let conn = Db::open_in_memory().unwrap();
        let repo = UserRepo::new(&conn);
        repo.add(&draft(1, "root", Role::Admin)).unwrap();
        assert!(matches!(
            repo.add(&draft(1, "other", Role::Admin)),
            Err(TrackerError::Conflict(_))
        ));
        assert!(matches!(
            repo.add(&draft(2, "ROOT", Role::Admin)),
            Err(TrackerError::Conflict(_))
        ));
    }

    #[test]
    fn test_rename_keeps_password() {
        let conn = Db::open_in_memory().unwrap();
        let repo = UserRepo::new(&conn);
        repo.add(&draft(2, "kai", Role::Itga)).unwrap();

        let mut renamed = draft(2, "kai.s", Role::Sap);
        renamed.password = None;
        repo.update(&renamed).unwrap();

        let (user, stored) = repo.credentials("kai.s").unwrap().unwrap();
        assert_eq!(user.role, Role::Sap);
        assert!(verify_password(user.sap, "pw", &stored));
        assert!(repo.find_by_username("kai").unwrap().is_none());
    }

    #[test]
    fn test_update_sets_password_with_the_rest() {
        let conn = Db::open_in_memory().unwrap();
        let repo = UserRepo::new(&conn);
        repo.add(&draft(2, "kai", Role::Itga)).unwrap();
        let before = repo.password_hash(2).unwrap().unwrap();

        let mut changed = draft(2, "kai", Role::DataScience);
        changed.password = Some("new-pw".to_string());
        repo.update(&changed).unwrap();

        let (user, stored) = repo.credentials("kai").unwrap().unwrap();
        assert_eq!(user.role, Role::DataScience);
        assert_ne!(stored, before);
        assert!(verify_password(2, "new-pw", &stored));
        assert!(!verify_password(2, "pw", &stored));
        assert_eq!(repo.password_hash(99).unwrap(), None);
    }

    #[test]
    fn test_delete_missing_user() {
        let conn = Db::open_in_memory().unwrap();
        let repo = UserRepo::new(&conn);
        assert!(matches!(repo.delete(9), Err(TrackerError::NotFound { .. })));
    }
}
