//! Vista Package Management
//!
//! Turns a project descriptor (`package.json`) into the concrete dependency
//! manifest handed to the registry client, and fingerprints that manifest so
//! builds can tell when the installed dependency set changed.

pub mod descriptor;
pub mod manifest;
pub mod registry;
pub mod resolver;
pub mod rules;
pub mod tooling;

pub use descriptor::PackageDescriptor;
pub use manifest::{Combination, DependencyManifest};
pub use registry::{InstalledManifest, InstalledPackage, OfflinePackager, Packager};
pub use resolver::{resolve, CACHE_BUST_KEY, CACHE_BUST_VERSION};
pub use rules::TemplateRules;
pub use tooling::{is_transform_v7, TransformRuntime};

/// Package management errors
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("Invalid package.json: {0}")]
    InvalidDescriptor(#[from] serde_json::Error),

    #[error("Could not fetch dependencies: {0}")]
    RegistryError(String),

    #[error("Invalid field value: {field} - {reason}")]
    InvalidField { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, PackageError>;
