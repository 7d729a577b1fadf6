//! Bitbucket Cloud API client.

use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use cascade_core::CascadeOptions;

use crate::error::{Error, Result};
use crate::traits::BitbucketApi;
use crate::types::CreatePullRequest;

// === Internal API response types ===

/// Repository as returned by the repositories endpoint; only the clone
/// links matter here.
#[derive(serde::Deserialize)]
struct ApiRepository {
    full_name: String,
    links: ApiRepositoryLinks,
}

#[derive(serde::Deserialize)]
struct ApiRepositoryLinks {
    #[serde(default)]
    clone: Vec<ApiCloneLink>,
}

#[derive(serde::Deserialize)]
struct ApiCloneLink {
    name: String,
    href: String,
}

/// The branching model of a repository.
#[derive(serde::Deserialize)]
struct ApiBranchingModel {
    development: ApiDevelopmentBranch,
    #[serde(default)]
    branch_types: Vec<ApiBranchType>,
}

#[derive(serde::Deserialize)]
struct ApiDevelopmentBranch {
    name: String,
}

#[derive(serde::Deserialize)]
struct ApiBranchType {
    kind: String,
    prefix: String,
}

/// Minimal shape of a created pull request.
#[derive(serde::Deserialize)]
struct ApiPullRequest {
    id: u64,
}

// === Request bodies ===

#[derive(serde::Serialize)]
struct ApiCreatePullRequest<'a> {
    title: &'a str,
    description: &'a str,
    source: ApiRef<'a>,
    destination: ApiRef<'a>,
}

#[derive(serde::Serialize)]
struct ApiRef<'a> {
    branch: ApiBranch<'a>,
}

#[derive(serde::Serialize)]
struct ApiBranch<'a> {
    name: &'a str,
}

/// Bitbucket Cloud API client using basic auth with an app password.
pub struct BitbucketClient {
    client: Client,
    base_url: String,
    username: String,
    /// App password stored as `SecretString` for automatic zeroization.
    password: SecretString,
}

impl BitbucketClient {
    /// Default Bitbucket Cloud API URL.
    pub const DEFAULT_API_URL: &'static str = "https://api.bitbucket.org/2.0";

    /// Create a new client.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        Self::with_base_url(username, password, Self::DEFAULT_API_URL)
    }

    /// Create a new client with a custom API URL (tests, mirrors).
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed.
    pub fn with_base_url(
        username: impl Into<String>,
        password: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("cascade-bot"));

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            username: username.into(),
            password: SecretString::from(password.into()),
        })
    }

    /// Make a GET request.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make a POST request.
    async fn post<T: DeserializeOwned, B: serde::Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .json(body)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Handle API response.
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            let body = response.json().await?;
            return Ok(body);
        }

        match status.as_u16() {
            401 => Err(Error::AuthenticationFailed),
            status_code => {
                let text = response.text().await.unwrap_or_default();
                Err(Error::ApiError {
                    status: status_code,
                    message: text,
                })
            }
        }
    }

    // === Repository operations ===

    /// Resolve the clone URL of a repository.
    ///
    /// Returns the link matching the first-listed protocol name, the
    /// first available link when none matches, and an error when the
    /// repository exposes no clone links at all.
    ///
    /// # Errors
    /// Returns [`Error::MissingCloneLink`] or an API error.
    pub async fn get_clone_url(
        &self,
        owner: &str,
        repo: &str,
        protocols: &[&str],
    ) -> Result<String> {
        let repository: ApiRepository =
            self.get(&format!("/repositories/{owner}/{repo}")).await?;

        let links = &repository.links.clone;
        for protocol in protocols {
            if let Some(link) = links.iter().find(|link| link.name == *protocol) {
                return Ok(link.href.clone());
            }
        }

        links
            .first()
            .map(|link| link.href.clone())
            .ok_or_else(|| Error::MissingCloneLink(repository.full_name.clone()))
    }

    /// Read the branching model and derive the cascade options from it.
    ///
    /// # Errors
    /// Returns [`Error::ConfigurationMissing`] when the model has no
    /// branch type of kind `release`.
    pub async fn get_cascade_options(&self, owner: &str, repo: &str) -> Result<CascadeOptions> {
        let model: ApiBranchingModel = self
            .get(&format!("/repositories/{owner}/{repo}/branching-model"))
            .await?;

        model
            .branch_types
            .into_iter()
            .find(|branch_type| branch_type.kind == "release")
            .map(|branch_type| CascadeOptions {
                development_name: model.development.name.clone(),
                release_prefix: branch_type.prefix,
            })
            .ok_or_else(|| Error::ConfigurationMissing(repo.to_string()))
    }

    /// File a pull request, returning its id.
    ///
    /// Reviewers are deliberately not set.
    ///
    /// # Errors
    /// Returns an API error if creation fails.
    pub async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pull_request: CreatePullRequest,
    ) -> Result<u64> {
        let body = ApiCreatePullRequest {
            title: &pull_request.title,
            description: &pull_request.description,
            source: ApiRef {
                branch: ApiBranch {
                    name: &pull_request.source,
                },
            },
            destination: ApiRef {
                branch: ApiBranch {
                    name: &pull_request.destination,
                },
            },
        };

        let created: ApiPullRequest = self
            .post(&format!("/repositories/{owner}/{repo}/pullrequests"), &body)
            .await?;

        Ok(created.id)
    }
}

impl std::fmt::Debug for BitbucketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitbucketClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish_non_exhaustive()
    }
}

// === Trait implementation ===

impl BitbucketApi for BitbucketClient {
    async fn get_clone_url(&self, owner: &str, repo: &str, protocols: &[&str]) -> Result<String> {
        self.get_clone_url(owner, repo, protocols).await
    }

    async fn get_cascade_options(&self, owner: &str, repo: &str) -> Result<CascadeOptions> {
        self.get_cascade_options(owner, repo).await
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pull_request: CreatePullRequest,
    ) -> Result<u64> {
        self.create_pull_request(owner, repo, pull_request).await
    }
}
