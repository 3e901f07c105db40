//! Subject and audience checks supplied by the application.
//!
//! Both are async and fallible. Any `Fn(String) -> impl Future` closure is a
//! [`SubjectTest`], any `Fn(String, String) -> impl Future` closure an
//! [`AudienceTest`]:
//!
//! ```rust,ignore
//! let subject = |sub: String| async move { Ok(users.exists(&sub).await?) };
//! let audience = |aud: String, url: String| async move { Ok(url.starts_with(&aud)) };
//! ```

use anyhow::Result;

/// Decides whether the token subject is acceptable.
pub trait SubjectTest: Send + Sync + 'static {
    fn test_subject(&self, sub: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// Decides whether one `aud` value is acceptable for the requested URL.
pub trait AudienceTest: Send + Sync + 'static {
    fn test_audience(&self, aud: &str, url: &str) -> impl Future<Output = Result<bool>> + Send;
}

impl<F, Fut> SubjectTest for F
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool>> + Send,
{
    fn test_subject(&self, sub: &str) -> impl Future<Output = Result<bool>> + Send {
        self(sub.to_owned())
    }
}

impl<F, Fut> AudienceTest for F
where
    F: Fn(String, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool>> + Send,
{
    fn test_audience(&self, aud: &str, url: &str) -> impl Future<Output = Result<bool>> + Send {
        self(aud.to_owned(), url.to_owned())
    }
}
