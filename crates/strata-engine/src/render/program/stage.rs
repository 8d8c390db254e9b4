use std::fmt;
use std::sync::Arc;

use naga::valid::{Capabilities, ValidationFlags, Validator};

use super::error::ProgramError;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl StageKind {
    fn naga(self) -> naga::ShaderStage {
        match self {
            StageKind::Vertex => naga::ShaderStage::Vertex,
            StageKind::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StageKind::Vertex => "vertex",
            StageKind::Fragment => "fragment",
        })
    }
}

/// One compiled (parsed + validated) WGSL stage.
///
/// A single source may hold both stages; compile it once per [`StageKind`].
#[derive(Debug, Clone)]
pub struct ShaderStage {
    kind: StageKind,
    label: String,
    source: Arc<str>,
    entry_point: Option<String>,
    module: naga::Module,
}

impl ShaderStage {
    pub fn compile(kind: StageKind, label: &str, source: &str) -> Result<Self, ProgramError> {
        let fail = |log: String| ProgramError::Compile {
            stage: kind,
            label: label.to_string(),
            log,
        };

        let module = naga::front::wgsl::parse_str(source).map_err(|e| fail(e.emit_to_string(source)))?;

        Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(&module)
            .map_err(|e| fail(e.emit_to_string(source)))?;

        // A missing entry point is a link-time failure, as with a stage lacking `main`.
        let entry_point = module
            .entry_points
            .iter()
            .find(|ep| ep.stage == kind.naga())
            .map(|ep| ep.name.clone());

        log::debug!("compiled {kind} stage '{label}' (entry {entry_point:?})");

        Ok(Self {
            kind,
            label: label.to_string(),
            source: source.into(),
            entry_point,
            module,
        })
    }

    #[inline]
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn entry_point(&self) -> Option<&str> {
        self.entry_point.as_deref()
    }

    pub(crate) fn module(&self) -> &naga::Module {
        &self.module
    }

    pub(crate) fn entry(&self) -> Option<&naga::EntryPoint> {
        let name = self.entry_point.as_deref()?;
        self.module
            .entry_points
            .iter()
            .find(|ep| ep.stage == self.kind.naga() && ep.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_carries_diagnostic() {
        let err = ShaderStage::compile(StageKind::Vertex, "broken", "fn vs_main( {").unwrap_err();
        match err {
            ProgramError::Compile { stage, label, log } => {
                assert_eq!(stage, StageKind::Vertex);
                assert_eq!(label, "broken");
                assert!(!log.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn type_error_fails_validation_or_parse() {
        let src = "@fragment fn fs_main() -> @location(0) vec4<f32> { return 1.0; }";
        assert!(matches!(
            ShaderStage::compile(StageKind::Fragment, "bad", src),
            Err(ProgramError::Compile { .. })
        ));
    }

    #[test]
    fn picks_entry_point_of_requested_stage() {
        let src = r#"
            @vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }
            @fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }
        "#;
        let v = ShaderStage::compile(StageKind::Vertex, "s", src).unwrap();
        let f = ShaderStage::compile(StageKind::Fragment, "s", src).unwrap();
        assert_eq!(v.entry_point(), Some("vs_main"));
        assert_eq!(f.entry_point(), Some("fs_main"));
    }

    #[test]
    fn stage_without_entry_point_still_compiles() {
        let src = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        let v = ShaderStage::compile(StageKind::Vertex, "s", src).unwrap();
        assert_eq!(v.entry_point(), None);
    }
}
