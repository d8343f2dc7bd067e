pub mod coordinator;
pub mod redirect;
pub mod refresh;
pub mod store;

pub use coordinator::RefreshCoordinator;
pub use redirect::{LoginRedirect, NoopLoginRedirect, StderrLoginRedirect};
pub use refresh::{HttpTokenRefresher, RefreshedTokens, TokenRefresher};
pub use store::{CredentialStore, FileSystemCredentialStore, MemoryCredentialStore, Session};
