//! Built-in GLSL sources for fixed-function emulation
//!
//! The integer codes baked into the shaders mirror the `encode()` values of
//! the corresponding enums in `glaze_core`; the two must stay in sync.
//! [`uniform_specs`] and [`attribute_specs`] describe the same interface for
//! drivers and tests that build the shader without reflecting the sources.

use glaze_core::{AttributeSpec, UniformSpec, VariableType, MAX_LIGHTS, MAX_TEXTURES};

pub const EMULATION_VERTEX_SHADER: &str = r#"#version 150

const int MAX_LIGHTS = 8;
const int MAX_TEXTURES = 4;

uniform mat4 uModelview;
uniform mat4 uProjection;
uniform mat3 uNormalMatrix;

uniform bool uEnableLighting;
uniform vec4 uGlobalLight;
uniform bool uEnableLight[MAX_LIGHTS];
uniform vec4 uLightPos[MAX_LIGHTS];
uniform vec4 uLightAmbient[MAX_LIGHTS];
uniform vec4 uLightDiffuse[MAX_LIGHTS];
uniform vec4 uLightSpecular[MAX_LIGHTS];
uniform vec3 uSpotlightDirection[MAX_LIGHTS];
uniform float uSpotlightCutoff[MAX_LIGHTS];
uniform float uSpotlightExponent[MAX_LIGHTS];
uniform vec3 uLightAttenuation[MAX_LIGHTS];

uniform vec4 uMatAmbient;
uniform vec4 uMatSpecular;
uniform vec4 uMatEmissive;
uniform float uMatShininess;

uniform mat4 uTextureMatrix[MAX_TEXTURES];
uniform mat4 uTexGenObjPlanes[MAX_TEXTURES];
uniform mat4 uTexGenEyePlanes[MAX_TEXTURES];
// 0 = attribute, 1 = object planes, 2 = eye planes, 3 = sphere map,
// 4 = normal map, 5 = reflection map
uniform int uTexCoordSource[MAX_TEXTURES];

in vec4 aVertex;
in vec3 aNormal;
in vec4 aDiffuse;
in vec4 aTexCoord[MAX_TEXTURES];

out vec4 vColor;
out vec4 vTexCoord[MAX_TEXTURES];
out float vEyeDepth;

vec4 lighting(vec3 eyePos, vec3 normal) {
    vec4 color = uMatEmissive + uMatAmbient * uGlobalLight;
    for (int i = 0; i < MAX_LIGHTS; i++) {
        if (!uEnableLight[i]) {
            continue;
        }
        vec3 toLight;
        float atten = 1.0;
        float spot = 1.0;
        if (uLightPos[i].w == 0.0) {
            toLight = normalize(uLightPos[i].xyz);
        } else {
            toLight = uLightPos[i].xyz - eyePos;
            float d = length(toLight);
            toLight /= d;
            vec3 att = uLightAttenuation[i];
            atten = 1.0 / (att.x + att.y * d + att.z * d * d);
            if (uSpotlightCutoff[i] != -1.0) {
                float sd = dot(-toLight, normalize(uSpotlightDirection[i]));
                spot = sd < uSpotlightCutoff[i] ? 0.0
                                                : pow(max(sd, 0.0), uSpotlightExponent[i]);
            }
        }
        float nl = max(dot(normal, toLight), 0.0);
        vec4 contrib = uMatAmbient * uLightAmbient[i] + aDiffuse * uLightDiffuse[i] * nl;
        if (nl > 0.0 && uMatShininess > 0.0) {
            vec3 h = normalize(toLight + normalize(-eyePos));
            contrib += uMatSpecular * uLightSpecular[i] *
                       pow(max(dot(normal, h), 0.0), uMatShininess);
        }
        color += atten * spot * contrib;
    }
    color.a = aDiffuse.a;
    return clamp(color, 0.0, 1.0);
}

vec4 texCoord(int i, vec3 eyePos, vec3 normal) {
    int src = uTexCoordSource[i];
    vec4 tc;
    if (src == 0) {
        tc = aTexCoord[i];
    } else if (src == 1) {
        tc = uTexGenObjPlanes[i] * aVertex;
    } else if (src == 2) {
        tc = uTexGenEyePlanes[i] * (uModelview * aVertex);
    } else if (src == 3) {
        vec3 r = reflect(normalize(eyePos), normal);
        float m = 2.0 * sqrt(r.x * r.x + r.y * r.y + (r.z + 1.0) * (r.z + 1.0));
        tc = vec4(r.x / m + 0.5, r.y / m + 0.5, 0.0, 1.0);
    } else if (src == 4) {
        tc = vec4(normal, 1.0);
    } else {
        tc = vec4(reflect(normalize(eyePos), normal), 1.0);
    }
    return uTextureMatrix[i] * tc;
}

void main() {
    vec4 eye = uModelview * aVertex;
    vec3 eyePos = eye.xyz / eye.w;
    vec3 normal = normalize(uNormalMatrix * aNormal);

    vColor = uEnableLighting ? lighting(eyePos, normal) : aDiffuse;
    for (int i = 0; i < MAX_TEXTURES; i++) {
        vTexCoord[i] = texCoord(i, eyePos, normal);
    }
    vEyeDepth = -eyePos.z;
    gl_Position = uProjection * eye;
}
"#;

pub const EMULATION_FRAGMENT_SHADER: &str = r#"#version 150

const int MAX_TEXTURES = 4;

uniform float uAlphaRefValue;
// comparison code, -1 when the alpha test always passes
uniform int uAlphaComparison;

uniform bool uEnableFog;
// linear fog: (start, end, 0); exp: (density, 0, 1); exp squared: (density, 0, -1)
uniform vec3 uFogConfig;
uniform vec4 uFogColor;

uniform sampler1D uTex1D[MAX_TEXTURES];
uniform sampler2D uTex2D[MAX_TEXTURES];
uniform sampler3D uTex3D[MAX_TEXTURES];
uniform samplerCube uTexCube[MAX_TEXTURES];
// -1 = unit disabled, 0/1/2/3 = 1D/2D/3D/cube
uniform int uTexConfig[MAX_TEXTURES];
// comparison code for 2D depth maps, -1 when not comparing
uniform int uDepthComparison[MAX_TEXTURES];

uniform ivec3 uCombineSrcRGB[MAX_TEXTURES];
uniform ivec3 uCombineSrcAlpha[MAX_TEXTURES];
uniform ivec3 uCombineOpRGB[MAX_TEXTURES];
uniform ivec3 uCombineOpAlpha[MAX_TEXTURES];
uniform int uCombineFuncRGB[MAX_TEXTURES];
uniform int uCombineFuncAlpha[MAX_TEXTURES];
uniform vec4 uCombineColor[MAX_TEXTURES];

in vec4 vColor;
in vec4 vTexCoord[MAX_TEXTURES];
in float vEyeDepth;

out vec4 fColor;

// 0 ==, 1 >, 2 <, 3 >=, 4 <=, 5 !=, 6 never, 7 always
bool compare(float value, float ref, int func) {
    if (func == 0) return value == ref;
    if (func == 1) return value > ref;
    if (func == 2) return value < ref;
    if (func == 3) return value >= ref;
    if (func == 4) return value <= ref;
    if (func == 5) return value != ref;
    if (func == 6) return false;
    return true;
}

vec4 sampleUnit(int i) {
    int cfg = uTexConfig[i];
    vec4 tc = vTexCoord[i];
    if (cfg == 0) {
        return texture(uTex1D[i], tc.s / tc.q);
    }
    if (cfg == 1) {
        vec4 s = texture(uTex2D[i], tc.st / tc.q);
        if (uDepthComparison[i] >= 0) {
            float passed = compare(s.r, tc.p / tc.q, uDepthComparison[i]) ? 1.0 : 0.0;
            return vec4(vec3(passed), 1.0);
        }
        return s;
    }
    if (cfg == 2) {
        return texture(uTex3D[i], tc.stp / tc.q);
    }
    return texture(uTexCube[i], tc.stp);
}

// sources: 0 current texture, 1 previous result, 2 constant color,
// 3 vertex color, 4+u texture of unit u
vec4 sourceValue(int src, int unit, vec4 tex, vec4 prev) {
    if (src == 0) return tex;
    if (src == 1) return prev;
    if (src == 2) return uCombineColor[unit];
    if (src == 3) return vColor;
    return sampleUnit(src - 4);
}

// operands: 0 color, 1 alpha, 2 one minus color, 3 one minus alpha
vec4 operandValue(int op, vec4 val) {
    if (op == 0) return val;
    if (op == 1) return val.aaaa;
    if (op == 2) return vec4(1.0) - val;
    return vec4(1.0) - val.aaaa;
}

// functions: 0 replace, 1 modulate, 2 add, 3 add signed, 4 interpolate,
// 5 subtract, 6 dot3 rgb, 7 dot3 rgba
vec3 combine(int func, vec3 a0, vec3 a1, vec3 a2) {
    if (func == 0) return a0;
    if (func == 1) return a0 * a1;
    if (func == 2) return a0 + a1;
    if (func == 3) return a0 + a1 - 0.5;
    if (func == 4) return a0 * a2 + a1 * (1.0 - a2);
    if (func == 5) return a0 - a1;
    return vec3(4.0 * dot(a0 - 0.5, a1 - 0.5));
}

void main() {
    vec4 prev = vColor;
    for (int i = 0; i < MAX_TEXTURES; i++) {
        if (uTexConfig[i] < 0) {
            continue;
        }
        vec4 tex = sampleUnit(i);

        ivec3 srcRGB = uCombineSrcRGB[i];
        ivec3 opRGB = uCombineOpRGB[i];
        vec3 c0 = operandValue(opRGB.x, sourceValue(srcRGB.x, i, tex, prev)).rgb;
        vec3 c1 = operandValue(opRGB.y, sourceValue(srcRGB.y, i, tex, prev)).rgb;
        vec3 c2 = operandValue(opRGB.z, sourceValue(srcRGB.z, i, tex, prev)).rgb;
        vec3 rgb = combine(uCombineFuncRGB[i], c0, c1, c2);

        float alpha;
        if (uCombineFuncRGB[i] == 7) {
            // dot3 rgba overwrites alpha with the dot result
            alpha = rgb.r;
        } else {
            ivec3 srcA = uCombineSrcAlpha[i];
            ivec3 opA = uCombineOpAlpha[i];
            float a0 = operandValue(opA.x, sourceValue(srcA.x, i, tex, prev)).a;
            float a1 = operandValue(opA.y, sourceValue(srcA.y, i, tex, prev)).a;
            float a2 = operandValue(opA.z, sourceValue(srcA.z, i, tex, prev)).a;
            alpha = combine(uCombineFuncAlpha[i], vec3(a0), vec3(a1), vec3(a2)).r;
        }
        prev = clamp(vec4(rgb, alpha), 0.0, 1.0);
    }

    if (uAlphaComparison >= 0 && !compare(prev.a, uAlphaRefValue, uAlphaComparison)) {
        discard;
    }

    if (uEnableFog) {
        float blend;
        if (uFogConfig.z == 0.0) {
            blend = (uFogConfig.y - vEyeDepth) / (uFogConfig.y - uFogConfig.x);
        } else if (uFogConfig.z > 0.0) {
            blend = exp(-uFogConfig.x * vEyeDepth);
        } else {
            blend = exp(-pow(uFogConfig.x * vEyeDepth, 2.0));
        }
        prev.rgb = mix(uFogColor.rgb, prev.rgb, clamp(blend, 0.0, 1.0));
    }
    fColor = prev;
}
"#;

/// Uniform interface of the emulation shader, in declaration order.
pub fn uniform_specs() -> Vec<UniformSpec> {
    vec![
        UniformSpec::new("uModelview", VariableType::Mat4, 1),
        UniformSpec::new("uProjection", VariableType::Mat4, 1),
        UniformSpec::new("uNormalMatrix", VariableType::Mat3, 1),
        UniformSpec::new("uEnableLighting", VariableType::Bool, 1),
        UniformSpec::new("uGlobalLight", VariableType::Vec4, 1),
        UniformSpec::new("uEnableLight", VariableType::Bool, MAX_LIGHTS),
        UniformSpec::new("uLightPos", VariableType::Vec4, MAX_LIGHTS),
        UniformSpec::new("uLightAmbient", VariableType::Vec4, MAX_LIGHTS),
        UniformSpec::new("uLightDiffuse", VariableType::Vec4, MAX_LIGHTS),
        UniformSpec::new("uLightSpecular", VariableType::Vec4, MAX_LIGHTS),
        UniformSpec::new("uSpotlightDirection", VariableType::Vec3, MAX_LIGHTS),
        UniformSpec::new("uSpotlightCutoff", VariableType::Float, MAX_LIGHTS),
        UniformSpec::new("uSpotlightExponent", VariableType::Float, MAX_LIGHTS),
        UniformSpec::new("uLightAttenuation", VariableType::Vec3, MAX_LIGHTS),
        UniformSpec::new("uMatAmbient", VariableType::Vec4, 1),
        UniformSpec::new("uMatSpecular", VariableType::Vec4, 1),
        UniformSpec::new("uMatEmissive", VariableType::Vec4, 1),
        UniformSpec::new("uMatShininess", VariableType::Float, 1),
        UniformSpec::new("uTextureMatrix", VariableType::Mat4, MAX_TEXTURES),
        UniformSpec::new("uTexGenObjPlanes", VariableType::Mat4, MAX_TEXTURES),
        UniformSpec::new("uTexGenEyePlanes", VariableType::Mat4, MAX_TEXTURES),
        UniformSpec::new("uTexCoordSource", VariableType::Int, MAX_TEXTURES),
        UniformSpec::new("uAlphaRefValue", VariableType::Float, 1),
        UniformSpec::new("uAlphaComparison", VariableType::Int, 1),
        UniformSpec::new("uEnableFog", VariableType::Bool, 1),
        UniformSpec::new("uFogConfig", VariableType::Vec3, 1),
        UniformSpec::new("uFogColor", VariableType::Vec4, 1),
        UniformSpec::new("uTex1D", VariableType::Sampler1d, MAX_TEXTURES),
        UniformSpec::new("uTex2D", VariableType::Sampler2d, MAX_TEXTURES),
        UniformSpec::new("uTex3D", VariableType::Sampler3d, MAX_TEXTURES),
        UniformSpec::new("uTexCube", VariableType::SamplerCube, MAX_TEXTURES),
        UniformSpec::new("uTexConfig", VariableType::Int, MAX_TEXTURES),
        UniformSpec::new("uDepthComparison", VariableType::Int, MAX_TEXTURES),
        UniformSpec::new("uCombineSrcRGB", VariableType::IVec3, MAX_TEXTURES),
        UniformSpec::new("uCombineSrcAlpha", VariableType::IVec3, MAX_TEXTURES),
        UniformSpec::new("uCombineOpRGB", VariableType::IVec3, MAX_TEXTURES),
        UniformSpec::new("uCombineOpAlpha", VariableType::IVec3, MAX_TEXTURES),
        UniformSpec::new("uCombineFuncRGB", VariableType::Int, MAX_TEXTURES),
        UniformSpec::new("uCombineFuncAlpha", VariableType::Int, MAX_TEXTURES),
        UniformSpec::new("uCombineColor", VariableType::Vec4, MAX_TEXTURES),
    ]
}

/// Attribute interface of the emulation shader, in declaration order.
pub fn attribute_specs() -> Vec<AttributeSpec> {
    vec![
        AttributeSpec::new("aVertex", VariableType::Vec4, 1),
        AttributeSpec::new("aNormal", VariableType::Vec3, 1),
        AttributeSpec::new("aDiffuse", VariableType::Vec4, 1),
        AttributeSpec::new("aTexCoord", VariableType::Vec4, MAX_TEXTURES),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specs_cover_shader_declarations() {
        for spec in uniform_specs() {
            let declared = EMULATION_VERTEX_SHADER.contains(spec.name.as_str())
                || EMULATION_FRAGMENT_SHADER.contains(spec.name.as_str());
            assert!(declared, "{} missing from shader sources", spec.name);
        }
        for spec in attribute_specs() {
            assert!(
                EMULATION_VERTEX_SHADER.contains(spec.name.as_str()),
                "{} missing from vertex shader",
                spec.name
            );
        }
    }

    #[test]
    fn test_sampler_demand_fits_sixteen_units() {
        let samplers: usize = uniform_specs()
            .iter()
            .filter(|s| s.ty.is_sampler())
            .map(|s| s.length)
            .sum();
        assert!(samplers <= 16);
    }
}
