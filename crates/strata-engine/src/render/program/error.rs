use std::fmt;

use super::stage::StageKind;

/// Errors raised while building or feeding a shader program.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramError {
    /// A stage failed to parse or validate. `log` is the compiler diagnostic.
    Compile {
        stage: StageKind,
        label: String,
        log: String,
    },
    /// The two stages do not form a usable program.
    Link { label: String, log: String },
    /// The model matrix has no inverse, so no inverse-transpose can be derived.
    NonInvertibleModel { determinant: f32 },
}

impl ProgramError {
    pub(crate) fn link(label: &str, log: impl Into<String>) -> Self {
        Self::Link {
            label: label.to_string(),
            log: log.into(),
        }
    }
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramError::Compile { stage, label, log } => {
                write!(f, "{stage} stage '{label}' failed to compile:\n{log}")
            }
            ProgramError::Link { label, log } => {
                write!(f, "program '{label}' failed to link: {log}")
            }
            ProgramError::NonInvertibleModel { determinant } => {
                write!(f, "model matrix is not invertible (determinant {determinant})")
            }
        }
    }
}

impl std::error::Error for ProgramError {}
