//! Template catalog built from the job files on disk

use tracing::warn;

use crate::errors::OrchestratorError;
use crate::filesys::dir::Dir;
use crate::models::service::ServiceType;
use crate::models::template::ServiceTemplate;

const TEMPLATE_EXTENSIONS: [&str; 2] = ["nomad", "hcl"];

/// Lists job template files available to new services
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    jobs_dir: Dir,
}

impl TemplateCatalog {
    pub fn new(jobs_dir: Dir) -> Self {
        Self { jobs_dir }
    }

    /// All `*.nomad` and `*.hcl` files in the jobs directory, by file name
    pub async fn list(&self) -> Result<Vec<ServiceTemplate>, OrchestratorError> {
        if !self.jobs_dir.exists().await {
            warn!(
                jobs_dir = %self.jobs_dir.path().display(),
                "Jobs directory does not exist"
            );
            return Ok(Vec::new());
        }

        let templates = self
            .jobs_dir
            .files_with_extension(&TEMPLATE_EXTENSIONS)
            .await?
            .into_iter()
            .filter_map(|file| file.name().map(template_from_file))
            .collect();

        Ok(templates)
    }
}

fn template_from_file(file_name: &str) -> ServiceTemplate {
    let name = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name)
        .to_string();

    ServiceTemplate {
        service_type: service_type_from_name(&name),
        description: format!("Template for {} service", name),
        job_file: file_name.to_string(),
        name,
    }
}

/// Guess the service type from a template name
pub fn service_type_from_name(name: &str) -> ServiceType {
    let name = name.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| name.contains(w));

    if mentions(&["mysql", "postgres", "mongodb", "redis"]) {
        ServiceType::Database
    } else if mentions(&["nginx", "apache", "nodejs", "php"]) {
        ServiceType::WebServer
    } else if mentions(&["kafka", "rabbitmq"]) {
        ServiceType::MessageQueue
    } else if mentions(&["prometheus", "grafana", "loki"]) {
        ServiceType::Monitoring
    } else if mentions(&["jenkins", "nexus", "sonar"]) {
        ServiceType::Devops
    } else {
        ServiceType::Custom
    }
}
