//! # Warden Core
//!
//! Client-side session coordinator for APIs secured with short-lived bearer
//! access tokens and longer-lived refresh tokens.
//!
//! ## Overview
//!
//! - **Token storage**: [`TokenStore`] with in-memory and JSON file backends
//! - **Single-flight refresh**: [`RefreshCoordinator`] guarantees at most one
//!   refresh exchange in flight, however many callers need a new token
//! - **Proactive refresh**: [`ExpiryMonitor`] refreshes shortly before the
//!   access token expires
//! - **Reactive refresh**: [`RequestInterceptor`] attaches the bearer token and
//!   retries a 401 exactly once after a refresh
//! - **Lifecycle events**: [`SessionEventBus`] reports `auth:token-refreshed`
//!   and `auth:token-expired`
//!
//! ## Examples
//!
//! ```no_run
//! use warden_config::ConfigLoader;
//! use warden_core::{Credentials, Session, SessionEvent, SessionEventKind};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let load = ConfigLoader::new().load()?;
//! let session = Session::from_config(load.config)?;
//!
//! session
//!     .events()
//!     .subscribe(SessionEventKind::Expired, |_: &SessionEvent| {
//!         eprintln!("session expired, please log in again");
//!     })
//!     .detach();
//!
//! if !session.restore() {
//!     session
//!         .login(&Credentials {
//!             username: "alice".into(),
//!             password: "secret".into(),
//!         })
//!         .await?;
//! }
//!
//! let me: serde_json::Value = session.client().get_json("/users/me/").await?;
//! println!("{me}");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod events;
pub mod interceptor;
pub mod monitor;
pub mod refresh;
pub mod session;
pub mod store;
pub mod token;
pub mod transport;

pub use error::{
    ClientError, ClientResult, DecodeError, RefreshError, RefreshResult,
    SessionError, SessionResult, StoreError, StoreResult, TransportError,
};
pub use events::{SessionEvent, SessionEventBus, SessionEventKind, Subscription};
pub use interceptor::RequestInterceptor;
pub use monitor::{ExpiryMonitor, TickOutcome};
pub use refresh::RefreshCoordinator;
pub use session::{Credentials, Session};
pub use store::{FileTokenStore, MemoryTokenStore, StorageKeys, TokenStore};
pub use token::{SessionState, Token, TokenClaims, TokenKind, TokenPair};
pub use transport::{
    ApiRequest, ApiResponse, HttpTransport, MultipartField, MultipartValue,
    ReqwestTransport, RequestBody,
};
