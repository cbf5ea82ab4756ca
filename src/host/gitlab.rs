//! GitLab REST API (v4) implementation of [`SourceHost`].

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::SourceHost;
use crate::errors::HostError;

/// Project paths and file paths are single URL segments in the v4 API.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const USER_AGENT: &str = "codeowners-rotator";

#[derive(Debug, Deserialize)]
struct Project {
    default_branch: Option<String>,
}

#[derive(Debug, Serialize)]
struct FileCommit<'a> {
    branch: &'a str,
    content: &'a str,
    commit_message: &'a str,
}

pub struct GitLabHost {
    client: reqwest::Client,
    api_base: String,
    token: String,
}

impl GitLabHost {
    /// `base_url` is the instance root, e.g. `https://gitlab.example.com`.
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: format!("{}/api/v4", base_url.trim_end_matches('/')),
            token: token.to_string(),
        }
    }

    fn project_url(&self, repository: &str) -> String {
        format!(
            "{}/projects/{}",
            self.api_base,
            utf8_percent_encode(repository, PATH_SEGMENT)
        )
    }

    fn file_url(&self, repository: &str, path: &str) -> String {
        format!(
            "{}/repository/files/{}",
            self.project_url(repository),
            utf8_percent_encode(path, PATH_SEGMENT)
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("PRIVATE-TOKEN", &self.token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
    }

    async fn send(
        &self,
        repository: &str,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, HostError> {
        request.send().await.map_err(|source| HostError::Request {
            repository: repository.to_string(),
            operation,
            source,
        })
    }

    async fn status_error(
        repository: &str,
        operation: &'static str,
        resp: reqwest::Response,
    ) -> HostError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        HostError::Status {
            repository: repository.to_string(),
            operation,
            status,
            body,
        }
    }

    async fn branch_exists(&self, repository: &str, branch: &str) -> Result<bool, HostError> {
        let url = format!(
            "{}/repository/branches/{}",
            self.project_url(repository),
            utf8_percent_encode(branch, PATH_SEGMENT)
        );
        let resp = self
            .send(
                repository,
                "get branch",
                self.request(reqwest::Method::GET, &url),
            )
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::status_error(repository, "get branch", resp).await),
        }
    }

    async fn file_exists(
        &self,
        repository: &str,
        path: &str,
        branch: &str,
    ) -> Result<bool, HostError> {
        let resp = self
            .send(
                repository,
                "check file",
                self.request(reqwest::Method::HEAD, &self.file_url(repository, path))
                    .query(&[("ref", branch)]),
            )
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::status_error(repository, "check file", resp).await),
        }
    }
}

#[async_trait]
impl SourceHost for GitLabHost {
    async fn resolve_default_branch(&self, repository: &str) -> Result<String, HostError> {
        let resp = self
            .send(
                repository,
                "get project",
                self.request(reqwest::Method::GET, &self.project_url(repository)),
            )
            .await?;
        if !resp.status().is_success() {
            return Err(Self::status_error(repository, "get project", resp).await);
        }
        let project: Project = resp.json().await.map_err(|e| HostError::Decode {
            repository: repository.to_string(),
            operation: "get project",
            message: e.to_string(),
        })?;

        if let Some(branch) = project.default_branch.filter(|b| !b.is_empty()) {
            debug!(repository, branch = %branch, "Resolved default branch");
            return Ok(branch);
        }

        // Empty projects report no default branch; probe the usual names.
        for candidate in ["main", "master"] {
            if self.branch_exists(repository, candidate).await? {
                return Ok(candidate.to_string());
            }
        }
        warn!(repository, "Could not determine default branch, using 'main'");
        Ok("main".to_string())
    }

    async fn get_file(
        &self,
        repository: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>, HostError> {
        let url = format!("{}/raw", self.file_url(repository, path));
        let resp = self
            .send(
                repository,
                "get file",
                self.request(reqwest::Method::GET, &url)
                    .query(&[("ref", branch)]),
            )
            .await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let content = resp.text().await.map_err(|e| HostError::Decode {
                    repository: repository.to_string(),
                    operation: "get file",
                    message: e.to_string(),
                })?;
                Ok(Some(content))
            }
            _ => Err(Self::status_error(repository, "get file", resp).await),
        }
    }

    async fn put_file(
        &self,
        repository: &str,
        path: &str,
        branch: &str,
        content: &str,
        commit_message: &str,
    ) -> Result<(), HostError> {
        let exists = self.file_exists(repository, path, branch).await?;
        let (method, operation) = if exists {
            (reqwest::Method::PUT, "update file")
        } else {
            (reqwest::Method::POST, "create file")
        };

        let body = FileCommit {
            branch,
            content,
            commit_message,
        };
        let resp = self
            .send(
                repository,
                operation,
                self.request(method, &self.file_url(repository, path))
                    .json(&body),
            )
            .await?;
        if !resp.status().is_success() {
            return Err(Self::status_error(repository, operation, resp).await);
        }

        info!(repository, path, branch, "{} {}", operation, path);
        Ok(())
    }
}
