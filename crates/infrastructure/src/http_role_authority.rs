use async_trait::async_trait;
use reqwest::{StatusCode, header};
use serde::Deserialize;

use rolewarden_application::RoleAuthority;
use rolewarden_core::{AppError, AppResult, PrincipalId, RealmId, RoleId};
use rolewarden_domain::{Member, Realm, RoleHandle};

/// Chat-platform REST binding for the authorization collaborator.
///
/// Carries no command-layer logic; it answers the realm/member/role
/// lookups and the role revocation the reconciliation pass needs.
pub struct HttpRoleAuthority {
    http_client: reqwest::Client,
    api_base_url: String,
    authorization: String,
}

#[derive(Debug, Deserialize)]
struct MemberResponse {
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RoleResponse {
    id: String,
}

impl HttpRoleAuthority {
    /// Creates a binding against the given API base URL, authenticating
    /// with the supplied bot token.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        api_base_url: impl Into<String>,
        bot_token: &str,
    ) -> Self {
        let api_base_url: String = api_base_url.into();

        Self {
            http_client,
            api_base_url: api_base_url.trim_end_matches('/').to_owned(),
            authorization: format!("Bot {bot_token}"),
        }
    }

    async fn get(&self, url: String, context: &'static str) -> AppResult<reqwest::Response> {
        self.http_client
            .get(url)
            .header(header::AUTHORIZATION, self.authorization.as_str())
            .send()
            .await
            .map_err(|error| transport_error(context, &error))
    }
}

fn transport_error(context: &str, error: &reqwest::Error) -> AppError {
    AppError::Transient(format!("{context} transport error: {error}"))
}

async fn classify_failure(context: &str, response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_owned());

    if status == StatusCode::FORBIDDEN {
        AppError::Forbidden(format!("{context}: {body}"))
    } else if status == StatusCode::NOT_FOUND {
        AppError::NotFound(format!("{context}: {body}"))
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        AppError::Transient(format!(
            "{context} returned status {}: {body}",
            status.as_u16()
        ))
    } else {
        AppError::Internal(format!(
            "{context} returned status {}: {body}",
            status.as_u16()
        ))
    }
}

fn parse_snowflake(value: &str, context: &str) -> AppResult<i64> {
    value.parse::<i64>().map_err(|error| {
        AppError::Internal(format!(
            "{context} returned non-numeric identifier '{value}': {error}"
        ))
    })
}

#[async_trait]
impl RoleAuthority for HttpRoleAuthority {
    async fn find_realm(&self, realm_id: RealmId) -> AppResult<Option<Realm>> {
        let url = format!("{}/guilds/{realm_id}", self.api_base_url);
        let response = self.get(url, "realm lookup").await?;

        let status = response.status();
        if status.is_success() {
            return Ok(Some(Realm { id: realm_id }));
        }
        // A realm the credential can no longer see is gone for lifecycle
        // purposes, whether it was deleted or the bot was removed from it.
        if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
            return Ok(None);
        }

        Err(classify_failure("realm lookup", response).await)
    }

    async fn find_member(
        &self,
        realm: &Realm,
        principal_id: PrincipalId,
    ) -> AppResult<Option<Member>> {
        let url = format!(
            "{}/guilds/{}/members/{principal_id}",
            self.api_base_url, realm.id
        );
        let response = self.get(url, "member lookup").await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(classify_failure("member lookup", response).await);
        }

        let member = response
            .json::<MemberResponse>()
            .await
            .map_err(|error| AppError::Internal(format!("invalid member payload: {error}")))?;

        let mut role_ids = Vec::with_capacity(member.roles.len());
        for role in &member.roles {
            role_ids.push(RoleId::new(parse_snowflake(role, "member lookup")?));
        }

        Ok(Some(Member {
            principal_id,
            role_ids,
        }))
    }

    async fn find_role(&self, realm: &Realm, role_id: RoleId) -> AppResult<Option<RoleHandle>> {
        let url = format!("{}/guilds/{}/roles", self.api_base_url, realm.id);
        let response = self.get(url, "role lookup").await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(classify_failure("role lookup", response).await);
        }

        let roles = response
            .json::<Vec<RoleResponse>>()
            .await
            .map_err(|error| AppError::Internal(format!("invalid role payload: {error}")))?;

        for role in &roles {
            if parse_snowflake(role.id.as_str(), "role lookup")? == role_id.as_i64() {
                return Ok(Some(RoleHandle { id: role_id }));
            }
        }

        Ok(None)
    }

    async fn revoke_role(
        &self,
        realm: &Realm,
        member: &Member,
        role: &RoleHandle,
        audit_reason: &str,
    ) -> AppResult<()> {
        let url = format!(
            "{}/guilds/{}/members/{}/roles/{}",
            self.api_base_url, realm.id, member.principal_id, role.id
        );

        let response = self
            .http_client
            .delete(url)
            .header(header::AUTHORIZATION, self.authorization.as_str())
            .header("X-Audit-Log-Reason", audit_reason)
            .send()
            .await
            .map_err(|error| transport_error("role revocation", &error))?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(classify_failure("role revocation", response).await)
    }
}

#[cfg(test)]
mod tests {
    use super::parse_snowflake;

    #[test]
    fn snowflakes_parse_from_decimal_strings() {
        assert_eq!(parse_snowflake("123456789", "test").ok(), Some(123_456_789));
        assert!(parse_snowflake("not-a-number", "test").is_err());
    }
}
