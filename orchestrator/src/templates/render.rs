//! Job template renderer
//!
//! Placeholders are substituted in three stages: fixed placeholders
//! (`{{JOB_ID}}`, `{{SERVICE_NAME}}`, `{{IMAGE}}`), then one `{{KEY}}` per custom
//! variable, then one `{{ENV_KEY}}` per environment variable. Text inserted by a
//! substitution is never scanned again, so a value containing `{{...}}` stays
//! literal. Unknown placeholders are left as they are.

use std::collections::HashMap;

use tracing::debug;

use crate::errors::OrchestratorError;
use crate::filesys::dir::Dir;
use crate::models::service::Service;

pub const JOB_ID_PLACEHOLDER: &str = "{{JOB_ID}}";
pub const SERVICE_NAME_PLACEHOLDER: &str = "{{SERVICE_NAME}}";
pub const IMAGE_PLACEHOLDER: &str = "{{IMAGE}}";

/// Renders job documents from template files stored in the jobs directory
#[derive(Debug, Clone)]
pub struct JobTemplateRenderer {
    jobs_dir: Dir,
}

impl JobTemplateRenderer {
    pub fn new(jobs_dir: Dir) -> Self {
        Self { jobs_dir }
    }

    pub fn jobs_dir(&self) -> &Dir {
        &self.jobs_dir
    }

    /// Read `template_file` from the jobs directory and render it for `service`
    pub async fn render(
        &self,
        template_file: &str,
        service: &Service,
        job_id: &str,
    ) -> Result<String, OrchestratorError> {
        let template_file = template_file.trim();
        if template_file.is_empty() {
            return Err(OrchestratorError::TemplateFileEmpty);
        }

        let file = self
            .jobs_dir
            .entry(template_file)
            .ok_or_else(|| OrchestratorError::TemplateNotFound(template_file.to_string()))?;
        let content = match file.read_string().await {
            Ok(content) => content,
            Err(OrchestratorError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OrchestratorError::TemplateNotFound(
                    file.path().display().to_string(),
                ));
            }
            Err(e) => return Err(e),
        };

        debug!(
            template = %file.path().display(),
            job_id = job_id,
            "Rendering job template"
        );

        Ok(render_text(&content, service, job_id))
    }
}

/// Render template text for `service`
pub fn render_text(template: &str, service: &Service, job_id: &str) -> String {
    let mut document = Document::new(template);

    document.substitute(JOB_ID_PLACEHOLDER, job_id);
    document.substitute(SERVICE_NAME_PLACEHOLDER, &service.name);
    document.substitute(IMAGE_PLACEHOLDER, &service.config.image);

    for (key, value) in sorted(&service.config.custom_variables) {
        document.substitute(&format!("{{{{{}}}}}", key), value);
    }

    for (key, value) in sorted(&service.config.environment) {
        document.substitute(&format!("{{{{ENV_{}}}}}", key), value);
    }

    document.into_text()
}

fn sorted(map: &HashMap<String, String>) -> Vec<(&String, &String)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort();
    entries
}

#[derive(Debug)]
enum Segment {
    /// Template text still open to substitution
    Template(String),
    /// Inserted value, never scanned again
    Value(String),
}

#[derive(Debug)]
struct Document {
    segments: Vec<Segment>,
}

impl Document {
    fn new(template: &str) -> Self {
        Self {
            segments: vec![Segment::Template(template.to_string())],
        }
    }

    fn substitute(&mut self, placeholder: &str, value: &str) {
        if placeholder.is_empty() {
            return;
        }

        let mut segments = Vec::with_capacity(self.segments.len());
        for segment in self.segments.drain(..) {
            match segment {
                Segment::Template(text) if text.contains(placeholder) => {
                    let mut parts = text.split(placeholder).peekable();
                    while let Some(part) = parts.next() {
                        if !part.is_empty() {
                            segments.push(Segment::Template(part.to_string()));
                        }
                        if parts.peek().is_some() {
                            segments.push(Segment::Value(value.to_string()));
                        }
                    }
                }
                other => segments.push(other),
            }
        }
        self.segments = segments;
    }

    fn into_text(self) -> String {
        self.segments
            .into_iter()
            .map(|segment| match segment {
                Segment::Template(text) | Segment::Value(text) => text,
            })
            .collect()
    }
}
