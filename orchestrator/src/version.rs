//! Build identification

/// Crate version baked in at compile time
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source revision, exported by release builds as `SVCORCH_REVISION`
pub const REVISION: Option<&str> = option_env!("SVCORCH_REVISION");

/// `<version>`, or `<version> (<revision>)` when the revision is known
pub fn label() -> String {
    match REVISION.filter(|r| !r.is_empty()) {
        Some(revision) => format!("{} ({})", VERSION, revision),
        None => VERSION.to_string(),
    }
}

/// User agent sent with every scheduler request
pub fn user_agent() -> String {
    format!("svcorch/{}", VERSION)
}
