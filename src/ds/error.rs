/// Error type for definition building and instantiation.
///
/// Guard operations themselves never produce these: a disallowed read is a
/// plain "not found" and a disallowed write without a hook falls back to a
/// direct write. Errors surface only from `with_trait`/`extend` resolution,
/// from guard construction, and from user methods.
#[derive(Debug)]
pub enum ClaspError {
    /// A string-addressed trait or extend source could not be located:
    /// unknown registry name, unresolvable relative path, or an
    /// undeterminable caller location.
    Resolution(String),
    /// The instance declares virtual members but the active composition
    /// engine offers no interception support. Raised at guard construction,
    /// fatal; silently degrading would change visible behavior.
    HostCapability(String),
    /// A member was invoked that is missing or not a method.
    NotCallable(String),
    /// Failure raised from inside a user-supplied method.
    Runtime(String),
}

impl std::fmt::Display for ClaspError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClaspError::Resolution(msg) => write!(f, "Resolution error: {}", msg),
            ClaspError::HostCapability(msg) => write!(f, "Host capability error: {}", msg),
            ClaspError::NotCallable(name) => write!(f, "Member is not callable: {}", name),
            ClaspError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl std::error::Error for ClaspError {}
