use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Credentials, NewUser, Principal, Role, User, UserPatch};
use crate::services::auth::{self, HashCost, TokenKind, TokenPair, TokenService};
use crate::state::AppState;

const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 254;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::invalid(format!(
            "name must be between 1 and {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Shape check only: one `@`, a non-empty local part, a dotted domain and no
/// whitespace.
fn validate_email(email: &str) -> Result<(), AppError> {
    let valid = email.len() <= MAX_EMAIL_LEN
        && !email.chars().any(char::is_whitespace)
        && match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            }
            None => false,
        };
    if !valid {
        return Err(AppError::invalid("invalid email address"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(AppError::invalid(format!(
            "password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_new_user(req: &NewUser) -> Result<(), AppError> {
    validate_name(&req.name)?;
    validate_email(&req.email)?;
    validate_password(&req.password)
}

fn ensure_email_free(conn: &Connection, email: &str) -> Result<(), AppError> {
    if queries::get_user_by_email(conn, email)?.is_some() {
        return Err(AppError::conflict("email already registered"));
    }
    Ok(())
}

/// The email is checked again under the write lock: another sign-up may
/// have taken it while the password was being hashed.
fn insert_user(
    conn: &mut Connection,
    req: &NewUser,
    role: Role,
    password_hash: String,
) -> Result<User, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    ensure_email_free(&tx, &req.email)?;

    let user = User {
        id: Uuid::new_v4(),
        name: req.name.clone(),
        email: req.email.clone(),
        password_hash,
        role,
        created_at: Utc::now(),
    };
    queries::insert_user(&tx, &user)?;
    let user = get_user(&tx, user.id)?;
    tx.commit()?;

    tracing::info!(user_id = %user.id, role = %user.role, "user registered");
    Ok(user)
}

async fn hash_blocking(password: String, cost: HashCost) -> Result<String, AppError> {
    let hash = tokio::task::spawn_blocking(move || auth::hash_password(&password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing task failed: {e}")))??;
    Ok(hash)
}

async fn verify_blocking(password: String, stored: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || auth::verify_password(&password, &stored))
        .await
        .map_err(|e| AppError::Internal(format!("password check task failed: {e}")))
}

/// Self-service sign-up always yields a regular user. The database lock is
/// not held while the password is hashed.
pub async fn register(state: &AppState, req: &NewUser) -> Result<User, AppError> {
    validate_new_user(req)?;
    {
        let db = state.db();
        ensure_email_free(&db, &req.email)?;
    }

    let password_hash = hash_blocking(req.password.clone(), state.hash_cost).await?;

    let mut db = state.db();
    insert_user(&mut db, req, Role::User, password_hash)
}

pub async fn authenticate(state: &AppState, creds: &Credentials) -> Result<User, AppError> {
    let user = {
        let db = state.db();
        queries::get_user_by_email(&db, &creds.email)?
    };
    if let Some(user) = user {
        if verify_blocking(creds.password.clone(), user.password_hash.clone()).await? {
            return Ok(user);
        }
    }
    tracing::warn!(email = %creds.email, "login failed");
    Err(AppError::unauthenticated("incorrect email or password"))
}

pub async fn login(state: &AppState, creds: &Credentials) -> Result<(User, TokenPair), AppError> {
    let user = authenticate(state, creds).await?;
    let pair = state.tokens.issue_pair(user.id)?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok((user, pair))
}

/// Trade a refresh token for a new access token. The refresh token itself is
/// handed back unchanged.
pub fn refresh(
    conn: &Connection,
    tokens: &TokenService,
    refresh_token: &str,
) -> Result<TokenPair, AppError> {
    let claims = tokens
        .verify(refresh_token, TokenKind::Refresh)
        .ok_or_else(|| AppError::unauthenticated("invalid refresh token"))?;
    if queries::get_user(conn, claims.sub)?.is_none() {
        return Err(AppError::unauthenticated("user not found"));
    }
    Ok(TokenPair {
        access_token: tokens.issue(claims.sub, TokenKind::Access)?,
        refresh_token: refresh_token.to_string(),
        token_type: "bearer",
    })
}

pub fn get_user(conn: &Connection, id: Uuid) -> Result<User, AppError> {
    queries::get_user(conn, id)?.ok_or_else(|| AppError::not_found("user not found"))
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<User, AppError> {
    queries::get_user_by_email(conn, email)?.ok_or_else(|| AppError::not_found("user not found"))
}

pub fn update_profile(
    conn: &Connection,
    principal: &Principal,
    patch: &UserPatch,
) -> Result<User, AppError> {
    let mut user = get_user(conn, principal.id)?;

    if let Some(name) = &patch.name {
        validate_name(name)?;
        user.name = name.clone();
    }
    if let Some(email) = &patch.email {
        validate_email(email)?;
        if let Some(existing) = queries::get_user_by_email(conn, email)? {
            if existing.id != user.id {
                return Err(AppError::conflict("email already registered"));
            }
        }
        user.email = email.clone();
    }

    queries::update_user(conn, &user)?;
    tracing::info!(user_id = %user.id, "profile updated");
    get_user(conn, user.id)
}

/// Make sure the configured admin account exists and carries the admin role.
/// Does nothing unless both `ADMIN_EMAIL` and `ADMIN_PASSWORD` are set.
pub fn ensure_admin(conn: &mut Connection, config: &AppConfig) -> Result<Option<User>, AppError> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(None);
    };

    if let Some(mut user) = queries::get_user_by_email(conn, email)? {
        if user.role != Role::Admin {
            user.role = Role::Admin;
            queries::update_user(conn, &user)?;
            tracing::info!(user_id = %user.id, "existing user promoted to admin");
        }
        return Ok(Some(user));
    }

    let req = NewUser {
        name: config.admin_name.clone(),
        email: email.clone(),
        password: password.clone(),
    };
    validate_new_user(&req)?;
    let password_hash = auth::hash_password(password, HashCost::from(config))?;
    let admin = insert_user(conn, &req, Role::Admin, password_hash)?;
    tracing::info!(user_id = %admin.id, email = %admin.email, "admin account created");
    Ok(Some(admin))
}
