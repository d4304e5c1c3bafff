//! Redacting wrapper for credentials
//!
//! Access and refresh tokens travel through logs, `Debug` output of
//! configuration structs and error values. Wrapping them in [`Secret`] keeps
//! them out of all of those and wipes the backing memory on drop.

use std::fmt;
use zeroize::Zeroize;

/// Sensitive value - redacted in Debug/Display/logs
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the inner value. Only the code that puts the value on the
    /// wire or on disk should call this.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl From<String> for Secret<String> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Secret<String> {
    fn from(value: &str) -> Self {
        Self::new(value.to_owned())
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_and_display_are_redacted() {
        let token = Secret::from("eyJhbGciOiJIUzI1NiJ9.access");
        assert_eq!(format!("{token:?}"), "[REDACTED]");
        assert_eq!(format!("{token}"), "[REDACTED]");
    }

    #[test]
    fn redaction_survives_nesting() {
        #[derive(Debug)]
        #[allow(dead_code)]
        struct Pair {
            access: Secret<String>,
            refresh: Secret<String>,
        }

        let pair = Pair {
            access: Secret::from("at_123"),
            refresh: Secret::from("rt_456"),
        };
        let debug = format!("{pair:?}");
        assert!(!debug.contains("at_123"), "leaked access token: {debug}");
        assert!(!debug.contains("rt_456"), "leaked refresh token: {debug}");
    }

    #[test]
    fn clone_keeps_the_value() {
        let token = Secret::from(String::from("rt_789"));
        let copy = token.clone();
        drop(token);
        assert_eq!(copy.expose(), "rt_789");
    }
}
