pub mod audit;
pub mod config;
pub mod error;
pub mod git;
pub mod logging;
pub mod pipeline;
pub mod security;

// Re-export commonly used types for convenience
pub use error::{GatewayError, GatewayResult};
pub use git::{DispatchRequest, RemoteLocator, RepositoryResolver, ResolvedRepository};
pub use pipeline::{Collaborators, Gateway};
pub use security::{EnvironmentSanitizer, TrustedEnvironment};
