use std::borrow::Cow;

use wgpu::naga::ShaderStage;

/// Names the wrapper provides through the uniform block.
const BUILTIN_UNIFORMS: [&str; 3] = ["time", "mouse", "resolution"];

/// Compiles the static full-screen triangle vertex shader.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("fullscreen triangle vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

/// Wraps the user shader and hands it to naga as GLSL.
///
/// Parse and validation failures surface through the device error scope
/// the caller has pushed, not through the return value.
pub(crate) fn compile_fragment_shader(device: &wgpu::Device, source: &str) -> wgpu::ShaderModule {
    let wrapped = wrap_fragment(source);
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("offscreen fragment"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(wrapped),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    })
}

/// Produces a self-contained Vulkan GLSL fragment shader from glslsandbox code.
///
/// `#version`, `precision` and the built-in uniform declarations are blanked
/// rather than removed so `#line 1` keeps compiler line numbers aligned with
/// the user's file. The user's `main` is renamed by macro and called from the
/// generated entry point in [`FOOTER`].
pub(crate) fn wrap_fragment(source: &str) -> String {
    let mut body = String::with_capacity(source.len() + 1);
    for line in source.lines() {
        let trimmed = line.trim_start();
        let skip = trimmed.starts_with("#version")
            || trimmed.starts_with("precision ")
            || declares_builtin_uniform(trimmed);
        if !skip {
            body.push_str(line);
        }
        body.push('\n');
    }

    format!("{HEADER}\n#line 1\n{body}{FOOTER}")
}

fn declares_builtin_uniform(line: &str) -> bool {
    if !line.starts_with("uniform ") {
        return false;
    }
    let declaration = line.split("//").next().unwrap_or(line);
    declaration
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .any(|token| BUILTIN_UNIFORMS.contains(&token))
}

/// GLSL prologue injected ahead of every fragment shader.
///
/// The block layout must match `FrameParams` in `gpu/uniforms.rs`.
const HEADER: &str = r"#version 450
layout(location = 0) out vec4 offscreen_color;

layout(std140, set = 0, binding = 0) uniform FrameParams {
    vec2 _resolution;
    vec2 _mouse;
    float _time;
    int _colorspace;
} frame;

#define resolution frame._resolution
#define mouse frame._mouse
#define time frame._time

vec4 offscreen_FragColor;
vec4 offscreen_FragCoord;
#define gl_FragColor offscreen_FragColor
#define gl_FragCoord offscreen_FragCoord
#define main offscreen_user_main
";

/// GLSL epilogue: flips to a bottom-left origin, runs the user shader and
/// applies the output colorspace.
const FOOTER: &str = r"
#undef main
#undef gl_FragCoord

vec4 offscreen_to_yuv(vec4 rgba) {
    float y = 0.299 * rgba.r + 0.587 * rgba.g + 0.114 * rgba.b;
    float u = -0.168736 * rgba.r - 0.331264 * rgba.g + 0.5 * rgba.b + 0.5;
    float v = 0.5 * rgba.r - 0.418688 * rgba.g - 0.081312 * rgba.b + 0.5;
    return vec4(y, u, v, rgba.a);
}

void main() {
    offscreen_FragCoord = vec4(gl_FragCoord.x, frame._resolution.y - gl_FragCoord.y, gl_FragCoord.z, gl_FragCoord.w);
    offscreen_FragColor = vec4(0.0, 0.0, 0.0, 1.0);
    offscreen_user_main();
    vec4 color = clamp(offscreen_FragColor, 0.0, 1.0);
    if (frame._colorspace == 1) {
        color = offscreen_to_yuv(color);
    }
    offscreen_color = color;
}
";

/// Minimal full-screen triangle vertex shader.
const VERTEX_SHADER_GLSL: &str = r"#version 450
const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    gl_Position = vec4(positions[gl_VertexIndex], 0.0, 1.0);
}
";
