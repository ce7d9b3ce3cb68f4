use homd::renderer::{
    RenderError, ShaderStage, UniformKind,
    reflect::{AttributeFormat, ProgramInterface, reflect_stage},
};

const VERTEX: &str = r#"
struct Uniforms {
    transform: mat4x4<f32>,
    scale: f32,
    tint: vec4<f32>,
};
@group(0) @binding(0) var<uniform> uniforms: Uniforms;

struct In {
    @builtin(vertex_index) index: u32,
    @location(2) uv: vec2<f32>,
    @location(0) position: vec3<f32>,
};

@vertex
fn main_vs(input: In) -> @builtin(position) vec4<f32> {
    return uniforms.transform * vec4<f32>(input.position * uniforms.scale, 1.0) + vec4<f32>(input.uv, 0.0, 0.0);
}
"#;

const FRAGMENT: &str = r#"
@fragment
fn main_fs() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;

fn bindings(pairs: &[(u32, &str)]) -> Vec<(u32, String)> {
    pairs.iter().map(|(s, n)| (*s, n.to_string())).collect()
}

#[test]
fn vertex_inputs_and_uniform_block_are_reflected() {
    let stage = reflect_stage(VERTEX, ShaderStage::Vertex).unwrap();
    assert_eq!(stage.entry_point, "main_vs");

    let inputs: Vec<_> = stage
        .inputs
        .iter()
        .map(|i| (i.location, i.name.as_str(), i.format))
        .collect();
    assert_eq!(
        inputs,
        [
            (0, "position", AttributeFormat::Float32x3),
            (2, "uv", AttributeFormat::Float32x2)
        ]
    );

    let block = stage.uniforms.unwrap();
    // `scale` is not addressable, but still takes up space
    assert_eq!(block.members.len(), 2);
    assert_eq!(block.location("transform").unwrap().kind, UniformKind::Mat4);
    let tint = block.location("tint").unwrap();
    assert_eq!((tint.offset, tint.kind), (80, UniformKind::Vec4));
    assert_eq!(block.size, 96);
}

#[test]
fn link_packs_attributes_in_slot_order() {
    let vertex = reflect_stage(VERTEX, ShaderStage::Vertex).unwrap();
    let fragment = reflect_stage(FRAGMENT, ShaderStage::Fragment).unwrap();
    assert!(fragment.uniforms.is_none());

    let program =
        ProgramInterface::link(&vertex, &fragment, &bindings(&[(2, "uv"), (0, "position")]))
            .unwrap();
    let layout: Vec<_> = program
        .attributes
        .iter()
        .map(|a| (a.slot, a.offset))
        .collect();
    assert_eq!(layout, [(0, 0), (2, 12)]);
    assert_eq!(program.stride, 20);
    assert_eq!(program.fragment_entry, "main_fs");
    assert_eq!(program.uniform("tint").unwrap().offset, 80);
    assert!(matches!(program.uniform("scale"), Err(RenderError::UnknownUniform(name)) if name == "scale"));
}

#[test]
fn link_rejects_bad_bindings() {
    let vertex = reflect_stage(VERTEX, ShaderStage::Vertex).unwrap();
    let fragment = reflect_stage(FRAGMENT, ShaderStage::Fragment).unwrap();

    for pairs in [
        &[(0, "position")][..],
        &[(0, "normal"), (2, "uv")][..],
        &[(0, "position"), (1, "uv")][..],
        &[(0, "position"), (2, "uv"), (2, "uv")][..],
    ] {
        let result = ProgramInterface::link(&vertex, &fragment, &bindings(pairs));
        assert!(matches!(result, Err(RenderError::Link(_))), "{pairs:?}");
    }
}

#[test]
fn compile_errors_carry_the_diagnostics() {
    let err = reflect_stage("fn broken( {", ShaderStage::Vertex).unwrap_err();
    match err {
        RenderError::Compile { stage, log } => {
            assert_eq!(stage, ShaderStage::Vertex);
            assert!(!log.is_empty());
        }
        other => panic!("unexpected {other:?}"),
    }

    // Valid WGSL, but no vertex entry point
    let err = reflect_stage(FRAGMENT, ShaderStage::Vertex).unwrap_err();
    assert!(err.to_string().contains("no @vertex entry point"), "{err}");
}

#[test]
fn uniforms_outside_the_first_binding_are_rejected() {
    let source = r#"
@group(1) @binding(0) var<uniform> colour: vec4<f32>;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return colour;
}
"#;
    let err = reflect_stage(source, ShaderStage::Fragment).unwrap_err();
    assert!(err.to_string().contains("@group(0) @binding(0)"), "{err}");
}

#[test]
fn stages_must_agree_on_the_uniform_block() {
    let vertex = reflect_stage(VERTEX, ShaderStage::Vertex).unwrap();
    let fragment = reflect_stage(
        r#"
@group(0) @binding(0) var<uniform> tint: vec4<f32>;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return tint;
}
"#,
        ShaderStage::Fragment,
    )
    .unwrap();
    let err = ProgramInterface::link(&vertex, &fragment, &bindings(&[(0, "position"), (2, "uv")]))
        .unwrap_err();
    assert!(matches!(err, RenderError::Link(_)));
}
