//! GitHub Actions `workflow_dispatch` client.
//!
//! Starts the job-search workflow through the REST API:
//!
//! ```text
//! POST {api_base}/repos/{owner}/{repo}/actions/workflows/{workflow}/dispatches
//! {"ref": "<git_ref>"}
//! ```
//!
//! GitHub answers `204 No Content` on success.

use crate::domain::config::WorkflowDispatchConfig;
use crate::domain::{Invocation, OperationError, TriggerSecret};
use crate::ports::PrivilegedOperation;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const GITHUB_API_VERSION: &str = "2022-11-28";

#[derive(Serialize)]
struct DispatchBody<'a> {
    #[serde(rename = "ref")]
    git_ref: &'a str,
}

/// Dispatches a GitHub Actions workflow run.
pub struct WorkflowDispatch {
    client: Client,
    url: String,
    git_ref: String,
    workflow: String,
    credential: TriggerSecret,
}

impl WorkflowDispatch {
    /// Create a dispatcher. The credential is the repository-scoped token
    /// allowed to start workflows; it is only ever sent to `api_base`.
    pub fn new(
        config: &WorkflowDispatchConfig,
        credential: TriggerSecret,
    ) -> Result<Self, OperationError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| OperationError::Misconfigured(e.to_string()))?;

        let url = format!(
            "{}/repos/{}/{}/actions/workflows/{}/dispatches",
            config.api_base.trim_end_matches('/'),
            config.owner,
            config.repo,
            config.workflow
        );

        Ok(Self {
            client,
            url,
            git_ref: config.git_ref.clone(),
            workflow: config.workflow.clone(),
            credential,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn headers(&self) -> Result<HeaderMap, OperationError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("trigger-gateway/", env!("CARGO_PKG_VERSION"))),
        );

        let mut bearer = b"Bearer ".to_vec();
        bearer.extend_from_slice(self.credential.expose());
        let mut auth = HeaderValue::from_bytes(&bearer).map_err(|_| {
            OperationError::Misconfigured("dispatch credential is not a valid header value".into())
        })?;
        zeroize::Zeroize::zeroize(&mut bearer);
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        Ok(headers)
    }
}

#[async_trait]
impl PrivilegedOperation for WorkflowDispatch {
    fn name(&self) -> &str {
        "workflow_dispatch"
    }

    async fn invoke(&self) -> Result<Invocation, OperationError> {
        debug!(url = %self.url, git_ref = %self.git_ref, "Dispatching workflow");

        let response = self
            .client
            .post(&self.url)
            .headers(self.headers()?)
            .json(&DispatchBody {
                git_ref: &self.git_ref,
            })
            .send()
            .await
            .map_err(|e| {
                // reqwest errors carry the URL, never headers
                OperationError::Transport(e.without_url().to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            info!(workflow = %self.workflow, git_ref = %self.git_ref, "Workflow dispatched");
            Ok(Invocation::with_detail(format!(
                "{}@{}",
                self.workflow, self.git_ref
            )))
        } else {
            warn!(status = status.as_u16(), workflow = %self.workflow, "Workflow dispatch refused");
            Err(OperationError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}
