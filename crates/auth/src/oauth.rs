use anyhow::{anyhow, Context};
use carpool_config::IdentityProviderConfig;
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope,
    TokenResponse, TokenUrl,
};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::debug;

use crate::IdentityProfile;

/// Authorization-code client for the external identity provider.
#[derive(Clone)]
pub(crate) struct IdentityOAuth {
    client: BasicClient,
    http: reqwest::Client,
    userinfo_url: String,
    scopes: Vec<String>,
}

impl IdentityOAuth {
    pub(crate) fn from_config(config: &IdentityProviderConfig) -> anyhow::Result<Option<Self>> {
        if !config.is_configured() {
            return Ok(None);
        }

        let (Some(client_id), Some(client_secret), Some(authorize_url), Some(token_url), Some(userinfo_url)) = (
            config.client_id.clone(),
            config.client_secret.clone(),
            config.authorize_url.clone(),
            config.token_url.clone(),
            config.userinfo_url.clone(),
        ) else {
            return Ok(None);
        };

        let client = BasicClient::new(
            ClientId::new(client_id),
            Some(ClientSecret::new(client_secret)),
            AuthUrl::new(authorize_url).context("invalid identity provider authorize url")?,
            Some(TokenUrl::new(token_url).context("invalid identity provider token url")?),
        )
        .set_auth_type(oauth2::AuthType::RequestBody);

        let http = reqwest::Client::builder()
            .user_agent("carpool-backend")
            .build()
            .context("failed to build identity provider http client")?;

        Ok(Some(Self {
            client,
            http,
            userinfo_url,
            scopes: config.scopes.clone(),
        }))
    }

    pub(crate) fn authorize_url(&self, state: &str, redirect_uri: &str) -> anyhow::Result<String> {
        let redirect = RedirectUrl::new(redirect_uri.to_owned())
            .context("invalid redirect uri for identity provider")?;

        let client = self.client.clone().set_redirect_uri(redirect);
        let mut request = client.authorize_url(|| CsrfToken::new(state.to_owned()));
        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let (url, _) = request.url();

        Ok(url.to_string())
    }

    pub(crate) async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> anyhow::Result<IdentityProfile> {
        let redirect = RedirectUrl::new(redirect_uri.to_owned())
            .context("invalid redirect uri for identity provider")?;

        let token_response = self
            .client
            .clone()
            .set_redirect_uri(redirect)
            .exchange_code(AuthorizationCode::new(code.to_owned()))
            .request_async(async_http_client)
            .await
            .context("failed to exchange identity provider code")?;

        let access_token = token_response.access_token().secret();
        self.fetch_userinfo(access_token).await
    }

    async fn fetch_userinfo(&self, access_token: &str) -> anyhow::Result<IdentityProfile> {
        let user: UserInfoResponse = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .context("failed to call identity provider userinfo endpoint")?
            .error_for_status()
            .context("identity provider userinfo endpoint returned error")?
            .json()
            .await
            .context("failed to decode identity provider userinfo")?;

        if user.sub.trim().is_empty() {
            return Err(anyhow!("identity provider returned an empty subject"));
        }

        debug!(sub = %user.sub, "fetched identity provider profile");
        Ok(user.into())
    }
}

#[derive(Deserialize)]
struct UserInfoResponse {
    sub: String,
    email: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl From<UserInfoResponse> for IdentityProfile {
    fn from(user: UserInfoResponse) -> Self {
        IdentityProfile {
            subject: user.sub,
            email: user.email,
            first_name: user.given_name,
            last_name: user.family_name,
            display_name: user.name,
            avatar_url: user.picture,
        }
    }
}
