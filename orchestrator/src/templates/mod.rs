//! Job templates: rendering and the template catalog

pub mod catalog;
pub mod render;

pub use catalog::TemplateCatalog;
pub use render::JobTemplateRenderer;
