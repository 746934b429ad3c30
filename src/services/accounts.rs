use serde::Serialize;

use crate::{
    auth::AuthService,
    error::{AppError, AppResult},
    models::{user::validate_email, User},
    services::profile::Profile,
    store::Store,
};

/// Returned by sign-up and sign-in
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user: Profile,
}

pub async fn sign_up(
    store: &dyn Store,
    auth: &AuthService,
    email: &str,
    password: &str,
    username: Option<String>,
) -> AppResult<Session> {
    let email = validate_email(email)?;
    let hash = auth.hash_password(password)?;
    let user = store.create_user(User::new(&email, username, hash)).await?;

    tracing::info!(user_id = %user.id, "User signed up");
    Ok(Session {
        token: auth.generate_token(user.id)?,
        user: user.into(),
    })
}

pub async fn sign_in(
    store: &dyn Store,
    auth: &AuthService,
    email: &str,
    password: &str,
) -> AppResult<Session> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let email = validate_email(email).map_err(|_| invalid())?;
    let user = store.get_user_by_email(&email).await?.ok_or_else(invalid)?;
    if !auth.verify_password(password, &user.password_hash) {
        tracing::debug!(user_id = %user.id, "Sign-in rejected");
        return Err(invalid());
    }

    tracing::info!(user_id = %user.id, "User signed in");
    Ok(Session {
        token: auth.generate_token(user.id)?,
        user: user.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn auth() -> AuthService {
        AuthService::new("test-secret".into(), 3600, 4)
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let store = InMemoryStore::new();
        let auth = auth();

        let session = sign_up(&store, &auth, "Ann@Example.com", "password1", Some("ann".into()))
            .await
            .unwrap();
        assert_eq!(session.user.email, "ann@example.com");
        assert_eq!(auth.validate_token(&session.token).unwrap().sub, session.user.id);

        let again = sign_in(&store, &auth, "ann@example.com", "password1").await.unwrap();
        assert_eq!(again.user.id, session.user.id);
    }

    #[tokio::test]
    async fn test_duplicate_sign_up_conflicts() {
        let store = InMemoryStore::new();
        let auth = auth();
        sign_up(&store, &auth, "ann@example.com", "password1", None).await.unwrap();
        assert!(matches!(
            sign_up(&store, &auth, "ANN@example.com", "password2", None).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_in_failures_are_unauthorized() {
        let store = InMemoryStore::new();
        let auth = auth();
        sign_up(&store, &auth, "ann@example.com", "password1", None).await.unwrap();

        for (email, password) in [
            ("ann@example.com", "wrong-password"),
            ("nobody@example.com", "password1"),
            ("garbage", "password1"),
        ] {
            assert!(matches!(
                sign_in(&store, &auth, email, password).await,
                Err(AppError::Unauthorized(_))
            ));
        }
    }
}
