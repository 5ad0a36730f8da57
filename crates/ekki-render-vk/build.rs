// SPDX-License-Identifier: CEPL-1.0
use std::{env, fs, path::PathBuf};

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Layout must match `model::Vertex` and `ekki_render::PushConstants`:
    //   binding 0, location 0: R32G32B32_SFLOAT (position)
    //   binding 0, location 1: R32G32B32_SFLOAT (color)
    //   push constants: mat4 transform, vec4 color (80 bytes)
    let vs_src = r#"
#version 450
layout(location = 0) in vec3 inPosition;
layout(location = 1) in vec3 inColor;

layout(push_constant) uniform Push {
    mat4 transform;
    vec4 color;
} push;

layout(location = 0) out vec3 vColor;

void main() {
    vColor = inColor;
    gl_Position = push.transform * vec4(inPosition, 1.0);
}
"#;

    let fs_src = r#"
#version 450
layout(location = 0) in vec3 vColor;

layout(push_constant) uniform Push {
    mat4 transform;
    vec4 color;
} push;

layout(location = 0) out vec4 outColor;

void main() {
    outColor = vec4(vColor * push.color.rgb, push.color.a);
}
"#;

    let comp = shaderc::Compiler::new().unwrap();
    let mut opts = shaderc::CompileOptions::new().unwrap();
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    let vs_spv = comp
        .compile_into_spirv(vs_src, shaderc::ShaderKind::Vertex, "simple.vert", "main", Some(&opts))
        .unwrap();
    let fs_spv = comp
        .compile_into_spirv(fs_src, shaderc::ShaderKind::Fragment, "simple.frag", "main", Some(&opts))
        .unwrap();

    fs::write(out.join("simple.vert.spv"), vs_spv.as_binary_u8()).unwrap();
    fs::write(out.join("simple.frag.spv"), fs_spv.as_binary_u8()).unwrap();

    println!("cargo:rerun-if-changed=build.rs");
}
