use std::fmt;

/// A wrapper that keeps credential material out of logs and audit output.
///
/// [`Principal`](crate::Principal) stores the credentials it was
/// authenticated with inside a `Secret`, so formatting a principal (or an
/// error or event that embeds one) never prints them.
///
/// # Examples
///
/// ```
/// use request_authz::Secret;
///
/// let password = Secret::new("hunter2".to_string());
/// assert_eq!(format!("{:?}", password), "[REDACTED]");
/// assert_eq!(password.expose_secret(), "hunter2");
/// ```
// Do NOT add Clone, Copy, or Default derives: duplicating credentials must stay explicit.
pub struct Secret<T> {
    inner: T,
}

impl<T> Secret<T> {
    /// Wraps a sensitive value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Explicitly exposes the secret value.
    ///
    /// Make sure the returned reference is not logged or displayed.
    pub fn expose_secret(&self) -> &T {
        &self.inner
    }
}

// The only access path is expose_secret(). No Deref, AsRef or Borrow.

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}
