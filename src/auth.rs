use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{AppError, Result},
    models::{Identity, NewUser, Role, User},
    password::{self, MIN_PASSWORD_LEN},
    repository::{Repository, RepositoryState},
};

/// Claims
///
/// The payload signed into every bearer token. A token is bound to one user id and
/// one role and carries a fixed expiry; `jti` identifies it for revocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id, as a string per the JWT convention.
    pub sub: String,
    pub role: Role,
    /// Token id, recorded on logout.
    pub jti: Uuid,
    pub iat: usize,
    pub exp: usize,
}

/// Session
///
/// Result of a successful login: the signed token and the identity it is bound to.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Handlers receive it as an
/// explicit argument; nothing about the caller is read from ambient state.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub role: Role,
    /// The presented token's id and expiry, needed to revoke it.
    pub token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl AuthUser {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// require_role
///
/// The single capability check in front of every role-restricted operation.
/// Exact match only.
pub fn require_role(user: &AuthUser, role: Role) -> Result<()> {
    if user.role == role {
        Ok(())
    } else {
        tracing::warn!(user_id = user.id, required = %role, actual = %user.role, "role check failed");
        Err(AppError::Forbidden)
    }
}

/// Signs a token for `user` that expires `token_ttl_hours` after issue.
pub fn issue_token(config: &AppConfig, user: &User) -> Result<Session> {
    let issued_at = Utc::now();
    let expires_at = issued_at + Duration::hours(config.token_ttl_hours);

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role,
        jti: Uuid::new_v4(),
        iat: issued_at.timestamp() as usize,
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    Ok(Session {
        token,
        identity: Identity::from(user),
        expires_at,
    })
}

/// Verifies signature and expiry. Any failure is `Unauthenticated`.
pub fn decode_token(config: &AppConfig, token: &str) -> Result<Claims> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!("rejected token: {:?}", e.kind());
        AppError::Unauthenticated
    })
}

/// resolve_identity
///
/// Turns a raw bearer token into the caller's identity. The token must verify, must
/// not be revoked, and must still match an existing, active user with the role it
/// was issued for.
pub async fn resolve_identity(
    repo: &dyn Repository,
    config: &AppConfig,
    token: &str,
) -> Result<AuthUser> {
    let claims = decode_token(config, token)?;

    if repo.is_token_revoked(claims.jti).await? {
        return Err(AppError::Unauthenticated);
    }

    let user_id: i64 = claims.sub.parse().map_err(|_| AppError::Unauthenticated)?;
    let user = repo
        .get_user(user_id)
        .await?
        .filter(|u| u.is_active && u.role == claims.role)
        .ok_or(AppError::Unauthenticated)?;

    let expires_at =
        DateTime::<Utc>::from_timestamp(claims.exp as i64, 0).ok_or(AppError::Unauthenticated)?;

    Ok(AuthUser {
        id: user.id,
        email: user.email,
        role: user.role,
        token_id: claims.jti,
        expires_at,
    })
}

/// authenticate
///
/// Unknown email, inactive account and wrong password are indistinguishable to
/// the caller, in both the error returned and the hashing work done.
pub async fn authenticate(
    repo: &dyn Repository,
    config: &AppConfig,
    email: &str,
    password: &str,
) -> Result<Session> {
    // Every failure path pays for exactly one Argon2 verification.
    let Some(user) = repo.get_user_by_email(email.trim()).await? else {
        password::verify_against_dummy(password);
        tracing::info!("login failed: unknown email");
        return Err(AppError::InvalidCredentials);
    };

    let password_ok = password::verify_password(password, &user.password_hash)?;

    if !user.is_active {
        tracing::info!(user_id = user.id, "login failed: account inactive");
        return Err(AppError::InvalidCredentials);
    }

    if !password_ok {
        tracing::info!(user_id = user.id, "login failed: wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let session = issue_token(config, &user)?;
    tracing::info!(user_id = user.id, role = %user.role, "login succeeded");
    Ok(session)
}

/// change_password
///
/// Input checks run before the store is touched: confirmation first, then length,
/// then the current password.
pub async fn change_password(
    repo: &dyn Repository,
    user: &AuthUser,
    current: &str,
    new: &str,
    confirm: &str,
) -> Result<()> {
    if new != confirm {
        return Err(AppError::validation("New passwords do not match"));
    }
    if new.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }

    let stored = repo
        .get_user(user.id)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    if !password::verify_password(current, &stored.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }

    let hash = password::hash_password(new)?;
    if !repo.update_password(user.id, &hash).await? {
        return Err(AppError::Unauthenticated);
    }

    tracing::info!(user_id = user.id, "password changed");
    Ok(())
}

/// register
///
/// Creates a plain `user` account. Duplicate email or username is a conflict.
pub async fn register(
    repo: &dyn Repository,
    username: Option<String>,
    email: &str,
    password: &str,
) -> Result<Identity> {
    let email = email.trim().to_string();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation("A valid email address is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    let username = username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());

    let new_user = NewUser {
        username,
        email,
        password_hash: password::hash_password(password)?,
        role: Role::User,
    };

    match repo.create_user(new_user).await {
        Ok(user) => {
            tracing::info!(user_id = user.id, "user registered");
            Ok(Identity::from(&user))
        }
        Err(AppError::Storage(sqlx::Error::Database(db_err)))
            if db_err.is_unique_violation() =>
        {
            Err(AppError::Conflict(
                "An account with that email or username already exists".to_string(),
            ))
        }
        Err(e) => Err(e),
    }
}

/// logout
///
/// Revokes the presented token until it would have expired anyway.
pub async fn logout(repo: &dyn Repository, user: &AuthUser) -> Result<()> {
    repo.revoke_token(user.token_id, user.expires_at).await?;
    tracing::info!(user_id = user.id, "token revoked");
    Ok(())
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument. Requires an
/// `Authorization: Bearer <token>` header; every failure rejects with 401.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthenticated)?;

        resolve_identity(repo.as_ref(), &config, token.trim()).await
    }
}
