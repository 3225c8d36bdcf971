pub use crate::types::AsmError;

pub type Result<T> = std::result::Result<T, AsmError>;

/// Wraps foreign errors into an `AsmError` variant with a leading message.
pub trait ErrorContext<T> {
    fn with_context<F>(self, kind: fn(String) -> AsmError, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::fmt::Display,
{
    fn with_context<F>(self, kind: fn(String) -> AsmError, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| kind(format!("{}: {}", f(), e)))
    }
}
