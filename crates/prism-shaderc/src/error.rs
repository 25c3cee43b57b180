/// A failure reported by the shader compiler.
///
/// `diagnostics` carries the compiler's own text so callers can surface it
/// verbatim.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("shader {kind} error: {diagnostics}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub diagnostics: String,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum CompileErrorKind {
    /// The target profile string is not understood.
    #[error("profile")]
    Profile,
    /// The source failed to parse.
    #[error("parse")]
    Parse,
    /// The module parsed but failed validation.
    #[error("validation")]
    Validation,
    /// No entry point with the requested name exists for the profile's stage.
    #[error("entry point")]
    EntryPoint,
}

impl CompileError {
    pub(crate) fn new(kind: CompileErrorKind, diagnostics: impl Into<String>) -> Self {
        Self { kind, diagnostics: diagnostics.into() }
    }
}
