//! The hosted user and session service.

use async_trait::async_trait;
use ds_core::{Account, AccountService, Session};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::M3oClient;

const SERVICE: &str = "user";

#[derive(Debug, Serialize)]
struct CreateBody<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AccountResponse {
    account: Account,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SessionResponse {
    session: Session,
}

pub struct M3oAccounts {
    client: M3oClient,
}

impl M3oAccounts {
    pub fn new(client: M3oClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AccountService for M3oAccounts {
    async fn create_account(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> anyhow::Result<Account> {
        let body = CreateBody {
            username,
            email,
            password,
        };
        let rsp: AccountResponse = self.client.call(SERVICE, "Create", &body).await?;
        Ok(rsp.account)
    }

    async fn read_account_by_id(&self, id: &str) -> anyhow::Result<Account> {
        let rsp: AccountResponse = self
            .client
            .call(SERVICE, "Read", &json!({ "id": id }))
            .await?;
        Ok(rsp.account)
    }

    async fn read_account_by_username(&self, username: &str) -> anyhow::Result<Account> {
        let rsp: AccountResponse = self
            .client
            .call(SERVICE, "Read", &json!({ "username": username }))
            .await?;
        Ok(rsp.account)
    }

    async fn login(&self, username: &str, password: &str) -> anyhow::Result<Session> {
        let rsp: SessionResponse = self
            .client
            .call(
                SERVICE,
                "Login",
                &json!({ "username": username, "password": password }),
            )
            .await?;
        Ok(rsp.session)
    }

    async fn logout(&self, session_id: &str) -> anyhow::Result<()> {
        let _: IgnoredAny = self
            .client
            .call(SERVICE, "Logout", &json!({ "sessionId": session_id }))
            .await?;
        Ok(())
    }

    async fn read_session(&self, session_id: &str) -> anyhow::Result<Session> {
        let rsp: SessionResponse = self
            .client
            .call(SERVICE, "ReadSession", &json!({ "sessionId": session_id }))
            .await?;
        Ok(rsp.session)
    }
}
