//! Nomad HTTP API client

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use nomad_api::{
    AllocResourceUsage, AllocationListStub, Job, JobDeregisterResponse, JobParseRequest,
    JobRegisterRequest, JobRegisterResponse, TOKEN_HEADER,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};
use url::Url;

use crate::errors::OrchestratorError;
use crate::scheduler::logs::split_lines;
use crate::version;
use crate::scheduler::{
    InstanceUsage, JobSnapshot, JobState, LogStream, SchedulerClient, SchedulerJobStatus,
    SubmitAck, UsageStats,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for a Nomad agent
#[derive(Debug, Clone)]
pub struct NomadOptions {
    pub address: String,
    pub namespace: Option<String>,
    pub region: Option<String>,
    pub token: Option<SecretString>,
    pub request_timeout: Duration,
}

impl Default for NomadOptions {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:4646".to_string(),
            namespace: None,
            region: None,
            token: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Scheduler client backed by the Nomad HTTP API
pub struct NomadClient {
    client: Client,
    base_url: Url,
    namespace: Option<String>,
    region: Option<String>,
    token: Option<SecretString>,
    request_timeout: Duration,
}

impl NomadClient {
    pub fn new(options: NomadOptions) -> Result<Self, OrchestratorError> {
        let base_url = Url::parse(options.address.trim_end_matches('/')).map_err(|e| {
            OrchestratorError::ConfigError(format!(
                "Invalid scheduler address '{}': {}",
                options.address, e
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(OrchestratorError::ConfigError(format!(
                "Invalid scheduler address '{}'",
                options.address
            )));
        }

        // No overall timeout here; log streams may stay open indefinitely
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(version::user_agent())
            .build()?;

        Ok(Self {
            client,
            base_url,
            namespace: options.namespace.filter(|ns| !ns.is_empty()),
            region: options.region.filter(|r| !r.is_empty()),
            token: options.token,
            request_timeout: options.request_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, OrchestratorError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| OrchestratorError::ConfigError("Invalid scheduler address".into()))?
            .pop_if_empty()
            .push("v1")
            .extend(segments);

        {
            let mut query = url.query_pairs_mut();
            if let Some(namespace) = &self.namespace {
                query.append_pair("namespace", namespace);
            }
            if let Some(region) = &self.region {
                query.append_pair("region", region);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("{} {}", method, url.path());

        let request = self.client.request(method, url);
        match &self.token {
            Some(token) => request.header(TOKEN_HEADER, token.expose_secret()),
            None => request,
        }
    }

    /// Send a request, mapping non-success responses to upstream errors
    async fn send(
        &self,
        request: RequestBuilder,
        operation: &str,
        enforced: bool,
    ) -> Result<Response, OrchestratorError> {
        let response = request.send().await.map_err(|e| {
            error!("Scheduler {} failed: {}", operation, e);
            OrchestratorError::SchedulerUnavailable(format!("{}: {}", operation, e))
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!("Scheduler {} failed: {} - {}", operation, status, body.trim());
        Err(classify(status, body.trim(), operation, enforced))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &str,
        enforced: bool,
    ) -> Result<T, OrchestratorError> {
        let response = self
            .send(request.timeout(self.request_timeout), operation, enforced)
            .await?;
        response.json().await.map_err(|e| {
            OrchestratorError::SchedulerUnavailable(format!(
                "{}: unreadable response: {}",
                operation, e
            ))
        })
    }

    /// Parse an HCL job document into its JSON form
    pub async fn parse_job(&self, job_document: &str) -> Result<Job, OrchestratorError> {
        let url = self.endpoint(&["jobs", "parse"])?;
        let body = JobParseRequest {
            job_hcl: job_document.to_string(),
            canonicalize: true,
        };
        self.send_json(self.request(Method::POST, url).json(&body), "parse job", false)
            .await
    }

    async fn register(
        &self,
        job: Job,
        enforce_index: Option<u64>,
    ) -> Result<JobRegisterResponse, OrchestratorError> {
        let url = self.endpoint(&["jobs"])?;
        let body = JobRegisterRequest {
            job,
            enforce_index: enforce_index.is_some(),
            job_modify_index: enforce_index.unwrap_or_default(),
        };
        self.send_json(
            self.request(Method::POST, url).json(&body),
            "register job",
            enforce_index.is_some(),
        )
        .await
    }

    /// Fetch a job, `None` when the scheduler does not know it
    pub async fn get_job(&self, job_id: &str) -> Result<Option<Job>, OrchestratorError> {
        let url = self.endpoint(&["job", job_id])?;
        match self
            .send_json(self.request(Method::GET, url), "read job", false)
            .await
        {
            Ok(job) => Ok(Some(job)),
            Err(OrchestratorError::JobNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Most recently created allocation of a job
    pub async fn latest_allocation(
        &self,
        job_id: &str,
    ) -> Result<Option<AllocationListStub>, OrchestratorError> {
        let url = self.endpoint(&["job", job_id, "allocations"])?;
        let allocations: Vec<AllocationListStub> = match self
            .send_json(self.request(Method::GET, url), "list allocations", false)
            .await
        {
            Ok(allocations) => allocations,
            Err(OrchestratorError::JobNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(allocations.into_iter().max_by_key(|a| a.create_index))
    }
}

/// Map a non-success scheduler response to an error
fn classify(status: StatusCode, body: &str, operation: &str, enforced: bool) -> OrchestratorError {
    let detail = if body.is_empty() {
        format!("{}: {}", operation, status)
    } else {
        format!("{}: {} - {}", operation, status, body)
    };

    if status == StatusCode::NOT_FOUND {
        return OrchestratorError::JobNotFound(detail);
    }
    if enforced && body.to_lowercase().contains("modify index") {
        return OrchestratorError::ConcurrentModification(detail);
    }
    if status.is_client_error() {
        OrchestratorError::SchedulerRejected(detail)
    } else {
        OrchestratorError::SchedulerUnavailable(detail)
    }
}

#[async_trait]
impl SchedulerClient for NomadClient {
    async fn submit(
        &self,
        job_document: &str,
        job_id: &str,
    ) -> Result<SubmitAck, OrchestratorError> {
        let mut job = match self.parse_job(job_document).await {
            Err(OrchestratorError::JobNotFound(detail)) => {
                return Err(OrchestratorError::SchedulerUnavailable(detail))
            }
            other => other?,
        };

        if job.id.as_deref() != Some(job_id) {
            warn!(
                job_id = job_id,
                document_id = ?job.id,
                "Job document id differs from the assigned job id, overriding"
            );
            job.id = Some(job_id.to_string());
        }

        let response = match self.register(job, None).await {
            Err(OrchestratorError::JobNotFound(detail)) => {
                return Err(OrchestratorError::SchedulerRejected(detail))
            }
            other => other?,
        };

        debug!(job_id = job_id, eval_id = %response.eval_id, "Job submitted");
        Ok(ack(job_id, response))
    }

    async fn cancel(&self, job_id: &str) -> Result<(), OrchestratorError> {
        let mut url = self.endpoint(&["job", job_id])?;
        url.query_pairs_mut().append_pair("purge", "true");

        let request = self
            .request(Method::DELETE, url)
            .timeout(self.request_timeout);
        match self.send(request, "deregister job", false).await {
            Ok(response) => {
                let response: JobDeregisterResponse = response.json().await.unwrap_or_default();
                debug!(job_id = job_id, eval_id = %response.eval_id, "Job deregistered");
                Ok(())
            }
            Err(OrchestratorError::JobNotFound(_)) => {
                debug!(job_id = job_id, "Job already absent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn status_of(&self, job_id: &str) -> Result<JobState, OrchestratorError> {
        let Some(job) = self.get_job(job_id).await? else {
            return Ok(JobState::NotFound);
        };

        Ok(JobState::Found(JobSnapshot {
            job_id: job.id.unwrap_or_else(|| job_id.to_string()),
            status: SchedulerJobStatus::parse(job.status.as_deref().unwrap_or_default()),
            modify_index: job.job_modify_index,
        }))
    }

    async fn restart(&self, job_id: &str) -> Result<SubmitAck, OrchestratorError> {
        let job = self
            .get_job(job_id)
            .await?
            .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))?;
        let modify_index = job.job_modify_index.unwrap_or_default();

        let response = match self.register(job, Some(modify_index)).await {
            Err(OrchestratorError::JobNotFound(detail)) => {
                return Err(OrchestratorError::SchedulerRejected(detail))
            }
            other => other?,
        };

        debug!(job_id = job_id, eval_id = %response.eval_id, "Job re-registered");
        Ok(ack(job_id, response))
    }

    async fn stream_logs(
        &self,
        job_id: &str,
        task_name: &str,
        follow: bool,
    ) -> Result<LogStream, OrchestratorError> {
        let Some(allocation) = self.latest_allocation(job_id).await? else {
            debug!(job_id = job_id, "No allocation, no logs");
            return Ok(stream::empty().boxed());
        };

        let mut url = self.endpoint(&["client", "fs", "logs", &allocation.id])?;
        url.query_pairs_mut()
            .append_pair("task", task_name)
            .append_pair("type", "stdout")
            .append_pair("origin", "start")
            .append_pair("offset", "0")
            .append_pair("plain", "true")
            .append_pair("follow", if follow { "true" } else { "false" });

        let mut request = self.request(Method::GET, url);
        if !follow {
            request = request.timeout(self.request_timeout);
        }

        let response = match self.send(request, "read logs", false).await {
            Err(OrchestratorError::JobNotFound(_)) => return Ok(stream::empty().boxed()),
            other => other?,
        };

        Ok(split_lines(Box::pin(response.bytes_stream())).boxed())
    }

    async fn usage_stats(&self, job_id: &str) -> Result<UsageStats, OrchestratorError> {
        let Some(allocation) = self.latest_allocation(job_id).await? else {
            return Ok(UsageStats::NoInstance);
        };

        let url = self.endpoint(&["client", "allocation", &allocation.id, "stats"])?;
        let stats: AllocResourceUsage = match self
            .send_json(self.request(Method::GET, url), "read allocation stats", false)
            .await
        {
            Ok(stats) => stats,
            Err(OrchestratorError::JobNotFound(_)) => return Ok(UsageStats::NoInstance),
            Err(e) => return Err(e),
        };

        let memory = &stats.resource_usage.memory_stats;
        Ok(UsageStats::Available(InstanceUsage {
            cpu_ticks: stats.resource_usage.cpu_stats.total_ticks,
            memory_bytes: if memory.rss > 0 { memory.rss } else { memory.usage },
            instance_id: allocation.id,
            instance_status: allocation.client_status,
            node_id: allocation.node_id,
        }))
    }
}

fn ack(job_id: &str, response: JobRegisterResponse) -> SubmitAck {
    SubmitAck {
        job_id: job_id.to_string(),
        eval_id: response.eval_id,
        job_modify_index: response.job_modify_index,
        warnings: Some(response.warnings).filter(|w| !w.is_empty()),
    }
}
