//! Error types for the dependency resolution engine.

use std::fmt;

/// Resolution errors surfaced by the non-panicking API.
///
/// Most conditions in this engine degrade gracefully to "produce a fresh
/// instance"; the variants here cover the cases a caller can usefully
/// inspect through [`Factory::try_resolve`](crate::Factory::try_resolve).
///
/// # Examples
///
/// ```rust
/// use forge_di::DiError;
///
/// let missing = DiError::NotRegistered("MyService");
/// let mismatch = DiError::TypeMismatch("std::string::String");
/// let circular = DiError::Circular(vec!["ServiceA", "ServiceB", "ServiceA"]);
///
/// println!("{}", missing);
/// println!("{}", circular);
/// ```
#[derive(Debug, Clone)]
pub enum DiError {
    /// Promised dependency was never registered
    NotRegistered(&'static str),
    /// Type downcast failed
    TypeMismatch(&'static str),
    /// Circular dependency detected (includes the full chain)
    Circular(Vec<&'static str>),
    /// Maximum resolution nesting depth exceeded
    DepthExceeded(usize),
}

impl fmt::Display for DiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiError::NotRegistered(name) => write!(f, "Dependency not registered: {}", name),
            DiError::TypeMismatch(name) => write!(f, "Type mismatch for: {}", name),
            DiError::Circular(path) => {
                write!(f, "Circular dependency: {}", path.join(" > "))
            }
            DiError::DepthExceeded(depth) => write!(f, "Max resolution depth {} exceeded", depth),
        }
    }
}

impl std::error::Error for DiError {}

/// Result type for resolution operations.
pub type DiResult<T> = Result<T, DiError>;
