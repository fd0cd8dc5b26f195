//! HTTP implementation of [`ListService`].

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, instrument};

use super::{ListMode, ListService, Membership};
use crate::errors::ListError;

/// List service speaking the remote REST API.
///
/// Endpoints are resolved relative to `base_url` and scoped to the owning
/// account:
///
/// - `GET  /{owner}/{list}/members/{user}.json` (200 member, 404 not a member)
/// - `POST /{owner}/{list}/members.json?id={user}`
/// - `POST /{owner}/lists.json?name={name}&mode={mode}`
pub struct HttpListService {
    http_client: reqwest::Client,
    base_url: String,
    owner: String,
    token: Option<String>,
}

impl HttpListService {
    pub fn new(
        http_client: reqwest::Client,
        base_url: &str,
        owner: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            owner: owner.into(),
            token,
        }
    }

    /// Resolve `segments` under the owner's scope, escaping each one.
    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, ListError> {
        let invalid = |details: String| ListError::InvalidUrl {
            url: self.base_url.clone(),
            details,
        };
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push(&self.owner)
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ListService for HttpListService {
    #[instrument(skip(self))]
    async fn membership(&self, list_id: &str, user_id: i64) -> Result<Membership, ListError> {
        let user = format!("{}.json", user_id);
        let url = self.url(&[list_id, "members", &user])?;
        let response = self.authorize(self.http_client.get(url)).send().await?;

        match response.status() {
            status if status.is_success() => Ok(Membership::Member),
            StatusCode::NOT_FOUND => {
                debug!("Membership lookup returned not found");
                Ok(Membership::NotMember)
            }
            status => Err(ListError::UnexpectedStatus {
                operation: "membership".to_string(),
                status: status.as_u16(),
            }),
        }
    }

    #[instrument(skip(self))]
    async fn add_member(&self, list_id: &str, user_id: i64) -> Result<(), ListError> {
        let url = self.url(&[list_id, "members.json"])?;
        let request = self
            .http_client
            .post(url)
            .query(&[("id", user_id.to_string())]);
        let response = self.authorize(request).send().await?;

        if !response.status().is_success() {
            return Err(ListError::UnexpectedStatus {
                operation: "add_member".to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_list(&self, name: &str, mode: ListMode) -> Result<(), ListError> {
        let url = self.url(&["lists.json"])?;
        let request = self
            .http_client
            .post(url)
            .query(&[("name", name), ("mode", mode.as_str())]);
        let response = self.authorize(request).send().await?;

        if !response.status().is_success() {
            return Err(ListError::UnexpectedStatus {
                operation: "create_list".to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}
