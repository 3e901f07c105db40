//! OAuth 2.0 resource server surface.
//!
//! - **Protected Resource Metadata** ([RFC 9728](https://datatracker.ietf.org/doc/html/rfc9728)):
//!   per-route documents under `/.well-known/oauth-protected-resource`.
//! - **Challenges**: the single 401 shape with a `WWW-Authenticate` header
//!   pointing clients at that document.

mod error;
mod metadata;

pub use error::{AuthorizationError, ResourceServerConfig, www_authenticate_401};
pub use metadata::{ProtectedResourceMetadata, metadata_responder};
