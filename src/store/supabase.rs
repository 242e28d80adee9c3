use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::{AttemptRecord, AttemptStore, NewAttempt, StoreError};
use crate::{
    progress::RankingEntry,
    types::{Challenge, ChallengeId, UserId},
};

/// Table holding challenges.
const CHALLENGES_TABLE: &str = "challenges";
/// Table holding graded attempts.
const SUBMISSIONS_TABLE: &str = "submissions";
/// Database function ranking users by challenges solved.
const RANKING_RPC: &str = "rpc/get_ranking";

/// A store backed by Supabase's PostgREST interface.
#[derive(Clone)]
pub struct SupabaseStore {
    /// Shared HTTP client.
    client:        Client,
    /// Base REST endpoint, e.g. `https://xyz.supabase.co/rest/v1`.
    rest_endpoint: String,
    /// Project API key.
    api_key:       String,
    /// Signed-in user's session token; the API key is used when absent.
    access_token:  Option<String>,
}

impl SupabaseStore {
    /// Creates a store talking to `rest_endpoint`.
    pub fn new(
        client: Client,
        rest_endpoint: impl Into<String>,
        api_key: impl Into<String>,
        access_token: Option<String>,
    ) -> Self {
        Self {
            client,
            rest_endpoint: rest_endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token,
        }
    }

    /// Starts an authenticated request against `table`.
    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        self.client
            .request(method, format!("{}/{}", self.rest_endpoint, table))
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    /// Sends a request and decodes the JSON body of a successful response.
    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let response = send(request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Connectivity(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

/// Sends a request, turning transport failures and non-success statuses into
/// [`StoreError`]s.
async fn send(request: RequestBuilder) -> Result<Response, StoreError> {
    let response = request
        .send()
        .await
        .map_err(|e| StoreError::Connectivity(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// PostgREST equality filter for `value`.
fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

impl AttemptStore for SupabaseStore {
    async fn fetch_challenge(&self, id: &ChallengeId) -> Result<Challenge, StoreError> {
        let rows: Vec<Challenge> = self
            .fetch(
                self.request(Method::GET, CHALLENGES_TABLE)
                    .query(&[("select", "*".to_string()), ("id", eq(id)), ("limit", "1".to_string())]),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn list_challenges(&self) -> Result<Vec<Challenge>, StoreError> {
        self.fetch(
            self.request(Method::GET, CHALLENGES_TABLE)
                .query(&[("select", "*"), ("order", "id.asc")]),
        )
        .await
    }

    async fn fetch_latest_attempt(
        &self,
        user: &UserId,
        challenge: &ChallengeId,
    ) -> Result<Option<AttemptRecord>, StoreError> {
        let rows: Vec<AttemptRecord> = self
            .fetch(self.request(Method::GET, SUBMISSIONS_TABLE).query(&[
                ("select", "*".to_string()),
                ("user_id", eq(user)),
                ("challenge_id", eq(challenge)),
                ("order", "created_at.desc".to_string()),
                ("limit", "1".to_string()),
            ]))
            .await?;

        Ok(rows.into_iter().next())
    }

    async fn persist_attempt(&self, attempt: &NewAttempt) -> Result<(), StoreError> {
        send(
            self.request(Method::POST, SUBMISSIONS_TABLE)
                .header("Prefer", "return=minimal")
                .json(&[attempt]),
        )
        .await?;

        tracing::debug!(
            "Saved attempt of {} at challenge {} (solved: {})",
            attempt.user_id,
            attempt.challenge_id,
            attempt.solved
        );
        Ok(())
    }

    async fn list_attempts(&self, user: Option<&UserId>) -> Result<Vec<AttemptRecord>, StoreError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "created_at.asc".to_string()),
        ];
        if let Some(user) = user {
            query.push(("user_id", eq(user)));
        }

        self.fetch(self.request(Method::GET, SUBMISSIONS_TABLE).query(&query))
            .await
    }

    /// Ranks through the `get_ranking` database function, which sees every
    /// user's submissions.
    async fn fetch_ranking(&self) -> Result<Vec<RankingEntry>, StoreError> {
        self.fetch(
            self.request(Method::POST, RANKING_RPC)
                .json(&serde_json::json!({})),
        )
        .await
    }
}
