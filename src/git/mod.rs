pub mod dispatch;
pub mod locator;
pub mod policy;
pub mod resolver;
pub mod sync;

// Re-export commonly used types
pub use dispatch::{DispatchError, DispatchRequest};
pub use locator::{LocatorStyle, RemoteLocator, ResolutionError};
pub use policy::{SyncDecision, SyncPolicy, SyncSource, SYNC_OVERRIDE_VAR, SYNC_SETTING_KEY};
pub use resolver::{RepositoryResolver, ResolvedRepository, DEFAULT_REMOTE_USER};
pub use sync::{CacheSynchronizer, SyncError, SyncOperation, Synchronizer};
