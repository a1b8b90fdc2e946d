//! Account and session handling, delegated to the account service.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Account, Author, Session};
use crate::traits::AccountService;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Signup {
    pub username: String,
    pub password: String,
    pub email: String,
}

/// Response of a login or signup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginResponse {
    pub session: Session,
}

/// A session joined with the profile of its account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session: Session,
    pub account: Account,
}

#[derive(Clone)]
pub struct Accounts {
    service: Arc<dyn AccountService>,
}

impl Accounts {
    pub fn new(service: Arc<dyn AccountService>) -> Self {
        Self { service }
    }

    /// Creates the account unless the username already resolves, then logs in.
    pub async fn signup(&self, signup: &Signup) -> Result<LoginResponse> {
        if let Err(e) = self.service.read_account_by_username(&signup.username).await {
            log::debug!("no account for {:?} ({e}), creating one", signup.username);
            let account = self
                .service
                .create_account(&signup.username, &signup.email, &signup.password)
                .await?;
            log::info!("created account {} ({})", account.username, account.id);
        }
        self.login(&Credentials {
            username: signup.username.clone(),
            password: signup.password.clone(),
        })
        .await
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse> {
        let session = self
            .service
            .login(&credentials.username, &credentials.password)
            .await?;
        Ok(LoginResponse { session })
    }

    pub async fn logout(&self, session_id: &str) -> Result<()> {
        Ok(self.service.logout(session_id).await?)
    }

    pub async fn read_session(&self, session_id: &str) -> Result<SessionView> {
        let session = self.service.read_session(session_id).await?;
        let account = self.service.read_account_by_id(&session.user_id).await?;
        Ok(SessionView { session, account })
    }

    /// Resolves a session to a non-empty user id.
    pub async fn user_id(&self, session_id: &str) -> Result<String> {
        let session = self.service.read_session(session_id).await?;
        if session.user_id.is_empty() {
            return Err(AppError::unauthorized("user id not found"));
        }
        Ok(session.user_id)
    }

    /// Resolves a session to the user id and display name used on new records.
    pub async fn author(&self, session_id: &str) -> Result<Author> {
        if session_id.is_empty() {
            return Err(AppError::unauthorized("not logged in"));
        }
        let session = self.service.read_session(session_id).await?;
        let account = self.service.read_account_by_id(&session.user_id).await?;
        Ok(Author {
            user_id: session.user_id,
            user_name: account.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockAccountService;

    fn session(user_id: &str) -> Session {
        Session {
            id: "s1".into(),
            user_id: user_id.into(),
            ..Session::default()
        }
    }

    fn account(id: &str, username: &str) -> Account {
        Account {
            id: id.into(),
            username: username.into(),
            ..Account::default()
        }
    }

    #[tokio::test]
    async fn signup_creates_missing_account_then_logs_in() {
        let mut service = MockAccountService::new();
        service
            .expect_read_account_by_username()
            .returning(|_| Err(anyhow::anyhow!("account not found")));
        service
            .expect_create_account()
            .withf(|u, e, p| u == "ada" && e == "ada@example.com" && p == "password1")
            .times(1)
            .returning(|_, _, _| Ok(account("u1", "ada")));
        service
            .expect_login()
            .withf(|u, p| u == "ada" && p == "password1")
            .times(1)
            .returning(|_, _| Ok(session("u1")));

        let accounts = Accounts::new(Arc::new(service));
        let rsp = accounts
            .signup(&Signup {
                username: "ada".into(),
                password: "password1".into(),
                email: "ada@example.com".into(),
            })
            .await
            .unwrap();
        assert_eq!(rsp.session.user_id, "u1");
    }

    #[tokio::test]
    async fn signup_for_existing_account_only_logs_in() {
        let mut service = MockAccountService::new();
        service
            .expect_read_account_by_username()
            .returning(|_| Ok(account("u1", "ada")));
        service.expect_create_account().never();
        service
            .expect_login()
            .returning(|_, _| Err(anyhow::anyhow!("invalid username or password")));

        let accounts = Accounts::new(Arc::new(service));
        let err = accounts
            .signup(&Signup {
                username: "ada".into(),
                password: "wrong".into(),
                email: String::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid username or password");
    }

    #[tokio::test]
    async fn read_session_joins_account() {
        let mut service = MockAccountService::new();
        service.expect_read_session().returning(|_| Ok(session("u1")));
        service
            .expect_read_account_by_id()
            .withf(|id| id == "u1")
            .returning(|_| Ok(account("u1", "ada")));

        let view = Accounts::new(Arc::new(service))
            .read_session("s1")
            .await
            .unwrap();
        assert_eq!(view.account.username, "ada");
        assert_eq!(view.session.id, "s1");
    }

    #[tokio::test]
    async fn empty_user_id_is_unauthenticated() {
        let mut service = MockAccountService::new();
        service.expect_read_session().returning(|_| Ok(session("")));
        let err = Accounts::new(Arc::new(service))
            .user_id("s1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert_eq!(err.to_string(), "user id not found");
    }

    #[tokio::test]
    async fn author_requires_a_session_id() {
        let service = MockAccountService::new();
        let err = Accounts::new(Arc::new(service))
            .author("")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "not logged in");
    }
}
