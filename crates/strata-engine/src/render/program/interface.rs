//! Program interface reflection and the link step.
//!
//! Names are resolved once, at link time, by walking the naga modules of both
//! stages. Anything the program does not declare resolves to `None`.

use std::fmt;

use naga::{AddressSpace, Binding, Handle, ImageClass, ImageDimension, Module, Scalar, ScalarKind, Type, TypeInner};

use super::error::ProgramError;
use super::stage::{ShaderStage, StageKind};
use super::uniform::{UniformKind, UniformLocation, UniformSlot};

/// Name of the optional rendered-texture binding.
pub const RENDERED_TEXTURE: &str = "u_RenderedTexture";

/// Named vertex streams a program can consume.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AttributeSlot {
    Position,
    Normal,
    Color,
    Uv,
}

impl AttributeSlot {
    pub const ALL: [AttributeSlot; 4] = [
        AttributeSlot::Position,
        AttributeSlot::Normal,
        AttributeSlot::Color,
        AttributeSlot::Uv,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AttributeSlot::Position => "vs_Pos",
            AttributeSlot::Normal => "vs_Nor",
            AttributeSlot::Color => "vs_Col",
            AttributeSlot::Uv => "vs_UV",
        }
    }

    /// Components per vertex in the buffers drawables supply for this slot.
    pub fn stream_components(self) -> u8 {
        match self {
            AttributeSlot::Uv => 2,
            _ => 4,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

/// A vertex-stage input. Inputs outside the attribute vocabulary have no slot
/// and always read the constant default value.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexInput {
    pub location: u32,
    pub components: u8,
    pub slot: Option<AttributeSlot>,
}

/// Placement of the program's uniform block in bind group 0.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UniformBlockLayout {
    pub binding: u32,
    pub size: u32,
}

/// Resolved attribute/uniform tables of a linked program.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramInterface {
    vertex_inputs: Vec<VertexInput>,
    uniforms: [Option<UniformLocation>; UniformSlot::COUNT],
    block: Option<UniformBlockLayout>,
    rendered_texture: Option<u32>,
}

impl ProgramInterface {
    /// Checks that `vertex` and `fragment` form a program and resolves its names.
    pub fn link(label: &str, vertex: &ShaderStage, fragment: &ShaderStage) -> Result<Self, ProgramError> {
        let fail = |log: String| ProgramError::link(label, log);

        for (stage, expected) in [(vertex, StageKind::Vertex), (fragment, StageKind::Fragment)] {
            if stage.kind() != expected {
                return Err(fail(format!(
                    "'{}' is a {} stage, expected {expected}",
                    stage.label(),
                    stage.kind()
                )));
            }
        }

        let vs = vertex
            .entry()
            .ok_or_else(|| fail(format!("'{}' has no @vertex entry point", vertex.label())))?;
        let fs = fragment
            .entry()
            .ok_or_else(|| fail(format!("'{}' has no @fragment entry point", fragment.label())))?;

        let mut vertex_inputs = Vec::new();
        for input in entry_inputs(vertex.module(), vs) {
            let ty = input.ty.filter(|t| t.scalar == Scalar::F32 && t.columns == 1).ok_or_else(|| {
                fail(format!(
                    "vertex input `{}` at location {} must be an f32 scalar or vector",
                    input.display_name(),
                    input.location
                ))
            })?;
            vertex_inputs.push(VertexInput {
                location: input.location,
                components: ty.rows,
                slot: input.name.as_deref().and_then(AttributeSlot::from_name),
            });
        }
        vertex_inputs.sort_by_key(|i| i.location);

        let varyings = entry_outputs(vertex.module(), vs);
        for input in entry_inputs(fragment.module(), fs) {
            match varyings.iter().find(|o| o.location == input.location) {
                Some(out) if out.ty == input.ty => {}
                Some(out) => {
                    return Err(fail(format!(
                        "fragment input `{}` at location {} is {} but the vertex stage writes {}",
                        input.display_name(),
                        input.location,
                        describe(input.ty),
                        describe(out.ty)
                    )));
                }
                None => {
                    return Err(fail(format!(
                        "fragment input `{}` at location {} is not written by the vertex stage",
                        input.display_name(),
                        input.location
                    )));
                }
            }
        }

        let vres = reflect_resources(vertex).map_err(&fail)?;
        let fres = reflect_resources(fragment).map_err(&fail)?;

        let block = match (vres.block, fres.block) {
            (Some(a), Some(b)) if a != b => {
                return Err(fail("uniform block layout differs between stages".into()));
            }
            (a, b) => a.or(b),
        };
        let rendered_texture = match (vres.rendered_texture, fres.rendered_texture) {
            (Some(a), Some(b)) if a != b => {
                return Err(fail(format!("`{RENDERED_TEXTURE}` binding differs between stages")));
            }
            (a, b) => a.or(b),
        };
        if let (Some(b), Some(t)) = (&block, rendered_texture) {
            if b.binding == t {
                return Err(fail(format!("uniform block and `{RENDERED_TEXTURE}` share binding {t}")));
            }
        }

        let mut uniforms = [None; UniformSlot::COUNT];
        if let Some(block) = &block {
            for slot in UniformSlot::ALL {
                let Some(member) = block.members.iter().find(|m| m.name == slot.name()) else {
                    continue;
                };
                if !member.ty.is_some_and(|t| t.matches(slot.kind())) {
                    return Err(fail(format!(
                        "uniform `{}` is declared as {}, expected {}",
                        slot.name(),
                        describe(member.ty),
                        slot.kind().wgsl()
                    )));
                }
                uniforms[slot.index()] = Some(UniformLocation(member.offset));
            }
        }

        let iface = Self {
            vertex_inputs,
            uniforms,
            block: block.map(|b| UniformBlockLayout {
                binding: b.binding,
                size: b.size,
            }),
            rendered_texture,
        };

        log::debug!(
            "linked program '{label}': {} vertex inputs, {} of {} uniforms, block {:?}",
            iface.vertex_inputs.len(),
            iface.uniforms.iter().flatten().count(),
            UniformSlot::COUNT,
            iface.block
        );

        Ok(iface)
    }

    /// All vertex inputs, sorted by location.
    #[inline]
    pub fn vertex_inputs(&self) -> &[VertexInput] {
        &self.vertex_inputs
    }

    pub fn attribute(&self, slot: AttributeSlot) -> Option<VertexInput> {
        self.vertex_inputs.iter().copied().find(|i| i.slot == Some(slot))
    }

    #[inline]
    pub fn uniform(&self, slot: UniformSlot) -> Option<UniformLocation> {
        self.uniforms[slot.index()]
    }

    #[inline]
    pub fn block(&self) -> Option<UniformBlockLayout> {
        self.block
    }

    /// Binding (group 0) of `u_RenderedTexture`, if declared.
    #[inline]
    pub fn rendered_texture(&self) -> Option<u32> {
        self.rendered_texture
    }
}

// ── reflection ────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct ValueType {
    scalar: Scalar,
    rows: u8,
    columns: u8,
}

impl ValueType {
    fn of(module: &Module, ty: Handle<Type>) -> Option<Self> {
        match module.types[ty].inner {
            TypeInner::Scalar(scalar) => Some(Self { scalar, rows: 1, columns: 1 }),
            TypeInner::Vector { size, scalar } => Some(Self {
                scalar,
                rows: size as u8,
                columns: 1,
            }),
            TypeInner::Matrix { columns, rows, scalar } => Some(Self {
                scalar,
                rows: rows as u8,
                columns: columns as u8,
            }),
            _ => None,
        }
    }

    fn matches(self, kind: UniformKind) -> bool {
        let (scalar, rows, columns) = match kind {
            UniformKind::Int => (Scalar::I32, 1, 1),
            UniformKind::Vec2 => (Scalar::F32, 2, 1),
            UniformKind::Vec4 => (Scalar::F32, 4, 1),
            UniformKind::Mat4 => (Scalar::F32, 4, 4),
        };
        self == Self { scalar, rows, columns }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.scalar.kind {
            ScalarKind::Float => "f",
            ScalarKind::Sint => "i",
            ScalarKind::Uint => "u",
            _ => "?",
        };
        let scalar = format!("{prefix}{}", u32::from(self.scalar.width) * 8);
        match (self.columns, self.rows) {
            (1, 1) => f.write_str(&scalar),
            (1, r) => write!(f, "vec{r}<{scalar}>"),
            (c, r) => write!(f, "mat{c}x{r}<{scalar}>"),
        }
    }
}

fn describe(ty: Option<ValueType>) -> String {
    ty.map_or_else(|| "a non-numeric type".to_string(), |t| t.to_string())
}

/// A `@location` binding found on an entry point's inputs or outputs.
struct Located {
    location: u32,
    name: Option<String>,
    ty: Option<ValueType>,
}

impl Located {
    fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

fn entry_inputs(module: &Module, ep: &naga::EntryPoint) -> Vec<Located> {
    let mut out = Vec::new();
    for arg in &ep.function.arguments {
        collect_locations(module, arg.name.as_deref(), arg.ty, arg.binding.as_ref(), &mut out);
    }
    out
}

fn entry_outputs(module: &Module, ep: &naga::EntryPoint) -> Vec<Located> {
    let mut out = Vec::new();
    if let Some(result) = &ep.function.result {
        collect_locations(module, None, result.ty, result.binding.as_ref(), &mut out);
    }
    out
}

fn collect_locations(
    module: &Module,
    name: Option<&str>,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut Vec<Located>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => out.push(Located {
            location: *location,
            name: name.map(str::to_string),
            ty: ValueType::of(module, ty),
        }),
        Some(_) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for m in members {
                    collect_locations(module, m.name.as_deref(), m.ty, m.binding.as_ref(), out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct BlockMember {
    name: String,
    offset: u32,
    ty: Option<ValueType>,
}

#[derive(Debug, Clone, PartialEq)]
struct BlockReflection {
    binding: u32,
    size: u32,
    members: Vec<BlockMember>,
}

#[derive(Debug, Default)]
struct StageResources {
    block: Option<BlockReflection>,
    rendered_texture: Option<u32>,
}

fn reflect_resources(stage: &ShaderStage) -> Result<StageResources, String> {
    let module = stage.module();
    let mut res = StageResources::default();

    for (_, var) in module.global_variables.iter() {
        let name = var.name.as_deref().unwrap_or("<unnamed>");
        let group0_binding = || match &var.binding {
            Some(rb) if rb.group == 0 => Ok(rb.binding),
            Some(rb) => Err(format!("`{name}` is in group {}, only group 0 is bound", rb.group)),
            None => Err(format!("`{name}` has no binding")),
        };

        match var.space {
            AddressSpace::Private | AddressSpace::WorkGroup => {}
            AddressSpace::Uniform => {
                if res.block.is_some() {
                    return Err(format!("`{name}` is a second uniform block; only one is supported"));
                }
                let TypeInner::Struct { members, span } = &module.types[var.ty].inner else {
                    return Err(format!("uniform `{name}` must be a struct"));
                };
                res.block = Some(BlockReflection {
                    binding: group0_binding()?,
                    size: *span,
                    members: members
                        .iter()
                        .map(|m| BlockMember {
                            name: m.name.clone().unwrap_or_default(),
                            offset: m.offset,
                            ty: ValueType::of(module, m.ty),
                        })
                        .collect(),
                });
            }
            AddressSpace::Handle if name == RENDERED_TEXTURE && is_float_texture_2d(module, var.ty) => {
                res.rendered_texture = Some(group0_binding()?);
            }
            _ => {
                return Err(format!("unsupported resource `{name}` in {} stage", stage.kind()));
            }
        }
    }

    Ok(res)
}

fn is_float_texture_2d(module: &Module, ty: Handle<Type>) -> bool {
    matches!(
        module.types[ty].inner,
        TypeInner::Image {
            dim: ImageDimension::D2,
            arrayed: false,
            class: ImageClass::Sampled {
                kind: ScalarKind::Float,
                multi: false,
            },
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        struct Uniforms {
            u_Model: mat4x4<f32>,
            u_ModelInvTr: mat4x4<f32>,
            u_ViewProj: mat4x4<f32>,
            u_LightPos: vec4<f32>,
            u_Time: i32,
        };
        @group(0) @binding(0) var<uniform> u: Uniforms;

        struct VsOut {
            @builtin(position) pos: vec4<f32>,
            @location(0) nor: vec4<f32>,
        };

        @vertex
        fn vs_main(
            @location(0) vs_Pos: vec4<f32>,
            @location(1) vs_Nor: vec4<f32>,
            @location(3) vs_UV: vec2<f32>,
        ) -> VsOut {
            var o: VsOut;
            o.pos = u.u_ViewProj * u.u_Model * vs_Pos + vec4<f32>(vs_UV, 0.0, 0.0) * 0.0;
            o.nor = u.u_ModelInvTr * vs_Nor;
            return o;
        }

        @fragment
        fn fs_main(v: VsOut) -> @location(0) vec4<f32> {
            return v.nor * f32(u.u_Time) + u.u_LightPos;
        }
    "#;

    fn stages(src: &str) -> (ShaderStage, ShaderStage) {
        (
            ShaderStage::compile(StageKind::Vertex, "t", src).unwrap(),
            ShaderStage::compile(StageKind::Fragment, "t", src).unwrap(),
        )
    }

    fn link(src: &str) -> Result<ProgramInterface, ProgramError> {
        let (v, f) = stages(src);
        ProgramInterface::link("t", &v, &f)
    }

    fn link_log(src: &str) -> String {
        match link(src) {
            Err(ProgramError::Link { log, .. }) => log,
            other => panic!("expected link error, got {other:?}"),
        }
    }

    // ── resolution ────────────────────────────────────────────────────────

    #[test]
    fn resolves_declared_uniform_offsets() {
        let iface = link(FULL).unwrap();
        assert_eq!(iface.uniform(UniformSlot::Model), Some(UniformLocation(0)));
        assert_eq!(iface.uniform(UniformSlot::ModelInvTr), Some(UniformLocation(64)));
        assert_eq!(iface.uniform(UniformSlot::ViewProj), Some(UniformLocation(128)));
        assert_eq!(iface.uniform(UniformSlot::LightPos), Some(UniformLocation(192)));
        assert_eq!(iface.uniform(UniformSlot::Time), Some(UniformLocation(208)));
        assert_eq!(iface.block(), Some(UniformBlockLayout { binding: 0, size: 224 }));
    }

    #[test]
    fn undeclared_names_resolve_to_none() {
        let iface = link(FULL).unwrap();
        assert_eq!(iface.uniform(UniformSlot::Freq), None);
        assert_eq!(iface.uniform(UniformSlot::ScreenDims), None);
        assert_eq!(iface.attribute(AttributeSlot::Color), None);
        assert_eq!(iface.rendered_texture(), None);
    }

    #[test]
    fn resolves_attribute_locations_and_widths() {
        let iface = link(FULL).unwrap();
        let uv = iface.attribute(AttributeSlot::Uv).unwrap();
        assert_eq!((uv.location, uv.components), (3, 2));
        let pos = iface.attribute(AttributeSlot::Position).unwrap();
        assert_eq!((pos.location, pos.components), (0, 4));
        let locs: Vec<u32> = iface.vertex_inputs().iter().map(|i| i.location).collect();
        assert_eq!(locs, vec![0, 1, 3]);
    }

    #[test]
    fn program_without_resources_has_no_block() {
        let src = r#"
            @vertex fn vs_main(@location(0) vs_Pos: vec4<f32>) -> @builtin(position) vec4<f32> { return vs_Pos; }
            @fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }
        "#;
        let iface = link(src).unwrap();
        assert_eq!(iface.block(), None);
        assert!(UniformSlot::ALL.iter().all(|s| iface.uniform(*s).is_none()));
    }

    #[test]
    fn resolves_rendered_texture_binding() {
        let src = r#"
            @group(0) @binding(1) var u_RenderedTexture: texture_2d<f32>;
            @vertex fn vs_main(@location(0) vs_Pos: vec4<f32>) -> @builtin(position) vec4<f32> { return vs_Pos; }
            @fragment fn fs_main(@builtin(position) p: vec4<f32>) -> @location(0) vec4<f32> {
                return textureLoad(u_RenderedTexture, vec2<i32>(p.xy), 0);
            }
        "#;
        assert_eq!(link(src).unwrap().rendered_texture(), Some(1));
    }

    // ── link failures ─────────────────────────────────────────────────────

    #[test]
    fn missing_vertex_entry_point() {
        let src = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        assert!(link_log(src).contains("@vertex"));
    }

    #[test]
    fn swapped_stages_fail() {
        let (v, f) = stages(FULL);
        assert!(matches!(
            ProgramInterface::link("t", &f, &v),
            Err(ProgramError::Link { .. })
        ));
    }

    #[test]
    fn unmatched_varying() {
        let src = r#"
            @vertex fn vs_main(@location(0) vs_Pos: vec4<f32>) -> @builtin(position) vec4<f32> { return vs_Pos; }
            @fragment fn fs_main(@location(2) c: vec4<f32>) -> @location(0) vec4<f32> { return c; }
        "#;
        assert!(link_log(src).contains("not written"));
    }

    #[test]
    fn mistyped_varying() {
        let src = r#"
            struct VsOut { @builtin(position) pos: vec4<f32>, @location(0) c: vec2<f32>, };
            @vertex fn vs_main(@location(0) vs_Pos: vec4<f32>) -> VsOut {
                var o: VsOut; o.pos = vs_Pos; o.c = vs_Pos.xy; return o;
            }
            @fragment fn fs_main(@location(0) c: vec4<f32>) -> @location(0) vec4<f32> { return c; }
        "#;
        assert!(link_log(src).contains("vec2<f32>"));
    }

    #[test]
    fn mistyped_known_uniform() {
        let src = r#"
            struct Uniforms { u_Time: f32, };
            @group(0) @binding(0) var<uniform> u: Uniforms;
            @vertex fn vs_main(@location(0) vs_Pos: vec4<f32>) -> @builtin(position) vec4<f32> { return vs_Pos * u.u_Time; }
            @fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }
        "#;
        let log = link_log(src);
        assert!(log.contains("u_Time") && log.contains("i32"));
    }

    #[test]
    fn unknown_uniform_members_are_ignored() {
        let src = r#"
            struct Uniforms { u_Time: i32, u_Custom: vec4<f32>, };
            @group(0) @binding(0) var<uniform> u: Uniforms;
            @vertex fn vs_main(@location(0) vs_Pos: vec4<f32>) -> @builtin(position) vec4<f32> { return vs_Pos + u.u_Custom * f32(u.u_Time); }
            @fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }
        "#;
        let iface = link(src).unwrap();
        assert_eq!(iface.uniform(UniformSlot::Time), Some(UniformLocation(0)));
    }

    #[test]
    fn non_struct_uniform_is_rejected() {
        let src = r#"
            @group(0) @binding(0) var<uniform> u_Time: i32;
            @vertex fn vs_main(@location(0) vs_Pos: vec4<f32>) -> @builtin(position) vec4<f32> { return vs_Pos * f32(u_Time); }
            @fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }
        "#;
        assert!(link_log(src).contains("struct"));
    }

    #[test]
    fn storage_buffers_are_unsupported() {
        let src = r#"
            @group(0) @binding(0) var<storage, read> data: array<vec4<f32>>;
            @vertex fn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> { return data[i]; }
            @fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }
        "#;
        assert!(link_log(src).contains("unsupported"));
    }

    #[test]
    fn integer_vertex_input_is_rejected() {
        let src = r#"
            @vertex fn vs_main(@location(0) id: u32) -> @builtin(position) vec4<f32> { return vec4<f32>(f32(id)); }
            @fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }
        "#;
        assert!(link_log(src).contains("f32"));
    }

    #[test]
    fn differing_blocks_between_stages() {
        let vs = r#"
            struct U { u_Model: mat4x4<f32>, };
            @group(0) @binding(0) var<uniform> u: U;
            @vertex fn vs_main(@location(0) vs_Pos: vec4<f32>) -> @builtin(position) vec4<f32> { return u.u_Model * vs_Pos; }
        "#;
        let fs = r#"
            struct U { u_Time: i32, };
            @group(0) @binding(0) var<uniform> u: U;
            @fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(f32(u.u_Time)); }
        "#;
        let v = ShaderStage::compile(StageKind::Vertex, "v", vs).unwrap();
        let f = ShaderStage::compile(StageKind::Fragment, "f", fs).unwrap();
        match ProgramInterface::link("split", &v, &f) {
            Err(ProgramError::Link { log, .. }) => assert!(log.contains("differs")),
            other => panic!("expected link error, got {other:?}"),
        }
    }
}
