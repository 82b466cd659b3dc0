use chrono::NaiveDateTime;
use schema::{Session, User, UserId, UserRole};
use sha2::{Digest, Sha256};
use ulid::Ulid;

use crate::MemoryStore;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("name, username and password are required")]
    Incomplete,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("username {0:?} is already taken")]
    UsernameTaken(String),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("not logged in")]
    Unauthenticated,
    #[error("{0:?} accounts may not perform this operation")]
    PermissionDenied(UserRole),
}

/// Who may call an operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Any logged-in account
    Member,
    /// Employees and admins
    Staff,
    Admin,
}

/// Hex-encoded SHA-256 of the trimmed password
pub fn digest_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.trim().as_bytes()))
}

pub fn register(
    store: &mut MemoryStore,
    name: &str,
    username: &str,
    password: &str,
    confirm: &str,
    now: NaiveDateTime,
) -> Result<UserId, AuthError> {
    let (name, username) = (name.trim(), username.trim());
    if name.is_empty() || username.is_empty() || password.trim().is_empty() {
        return Err(AuthError::Incomplete);
    }
    if password.trim() != confirm.trim() {
        return Err(AuthError::PasswordMismatch);
    }
    if store.user_by_username(username).is_some() {
        return Err(AuthError::UsernameTaken(username.to_string()));
    }

    let id = store.insert_user(User {
        id: UserId::default(),
        name: name.to_string(),
        username: username.to_string(),
        password_digest: digest_password(password),
        active: true,
        joined_date: now,
        role: UserRole::User,
    });
    log::info!("registered user {username}");

    Ok(id)
}

pub fn login(store: &mut MemoryStore, username: &str, password: &str) -> Result<Session, AuthError> {
    let digest = digest_password(password);
    let user = store
        .user_by_username(username.trim())
        .filter(|user| user.active && user.password_digest == digest)
        .ok_or(AuthError::InvalidCredentials)?;

    let session = Session {
        token: Ulid::new().to_string(),
        name: user.name.clone(),
        role: user.role,
    };
    let id = user.id;
    store.open_session(session.token.clone(), id);
    log::info!("user {} logged in", username.trim());

    Ok(session)
}

pub fn logout(store: &mut MemoryStore, token: &str) -> Result<(), AuthError> {
    store
        .close_session(token)
        .then_some(())
        .ok_or(AuthError::Unauthenticated)
}

/// Resolves a session token and checks the account may perform an operation
pub fn authorize<'a>(
    store: &'a MemoryStore,
    token: Option<&str>,
    access: Access,
) -> Result<&'a User, AuthError> {
    let user = token
        .and_then(|token| store.session_user(token))
        .filter(|user| user.active)
        .ok_or(AuthError::Unauthenticated)?;

    let allowed = match access {
        Access::Member => true,
        Access::Staff => user.role.is_staff(),
        Access::Admin => user.role == UserRole::Admin,
    };

    if allowed {
        Ok(user)
    } else {
        Err(AuthError::PermissionDenied(user.role))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::test::{at, seeded};

    #[test]
    fn test_register_and_login() -> Result<(), AuthError> {
        let mut store = seeded();

        register(&mut store, "Lan", " lan ", "secret", "secret", at(1, 0, 0))?;
        let session = login(&mut store, "lan", " secret ")?;

        assert_eq!(session.role, UserRole::User);
        assert_eq!(
            authorize(&store, Some(&session.token), Access::Member).map(|u| u.username.as_str()),
            Ok("lan")
        );

        Ok(())
    }

    #[test]
    fn test_register_rejections() {
        let mut store = seeded();

        assert_eq!(
            register(&mut store, "Lan", "lan", "a", "b", at(1, 0, 0)),
            Err(AuthError::PasswordMismatch)
        );
        assert_eq!(
            register(&mut store, "Mai", "mai", "a", "a", at(1, 0, 0)),
            Err(AuthError::UsernameTaken("mai".to_string()))
        );
        assert_eq!(
            register(&mut store, "", "x", "a", "a", at(1, 0, 0)),
            Err(AuthError::Incomplete)
        );
    }

    #[test]
    fn test_confirmation_ignores_surrounding_spaces() -> Result<(), AuthError> {
        let mut store = seeded();

        register(&mut store, "Lan", "lan", "secret ", "secret", at(1, 0, 0))?;
        assert!(login(&mut store, "lan", "secret").is_ok());

        Ok(())
    }

    #[test]
    fn test_bad_password() {
        let mut store = seeded();
        assert_eq!(
            login(&mut store, "tan", "2").map(|s| s.role),
            Err(AuthError::InvalidCredentials)
        );
    }

    #[test]
    fn test_access_levels() -> Result<(), AuthError> {
        let mut store = seeded();
        let customer = login(&mut store, "mai", "1")?.token;
        let employee = login(&mut store, "son", "1")?.token;
        let admin = login(&mut store, "tan", "1")?.token;

        assert!(authorize(&store, Some(&customer), Access::Member).is_ok());
        assert_eq!(
            authorize(&store, Some(&customer), Access::Staff).map(|u| u.id),
            Err(AuthError::PermissionDenied(UserRole::User))
        );
        assert!(authorize(&store, Some(&employee), Access::Staff).is_ok());
        assert_eq!(
            authorize(&store, Some(&employee), Access::Admin).map(|u| u.id),
            Err(AuthError::PermissionDenied(UserRole::Employee))
        );
        assert!(authorize(&store, Some(&admin), Access::Admin).is_ok());
        assert_eq!(
            authorize(&store, None, Access::Member).map(|u| u.id),
            Err(AuthError::Unauthenticated)
        );

        logout(&mut store, &admin)?;
        assert_eq!(
            authorize(&store, Some(&admin), Access::Admin).map(|u| u.id),
            Err(AuthError::Unauthenticated)
        );

        Ok(())
    }
}
