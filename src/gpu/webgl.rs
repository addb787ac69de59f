//! WebGL2 device (wasm32 only)
//!
//! One framebuffer per texture so any field can be a render target, one
//! shared index buffer for the full-screen quad, uniform locations looked up
//! once after linking. Float render support is probed by attaching a small
//! texture of each precision and checking framebuffer completeness.

use web_sys::{
    WebGl2RenderingContext as GL, WebGlBuffer, WebGlFramebuffer, WebGlProgram, WebGlShader,
    WebGlTexture, WebGlUniformLocation,
};

use crate::core::error::{EngineError, EngineResult};
use crate::core::field::{FieldFormat, FilterMode, Precision};
use crate::core::math::Texel;
use crate::gpu::{
    ActiveUniform, BlendMode, Capabilities, CompiledProgram, FormatSupport, GpuBackend,
    ProgramId, RenderTarget, ShaderSource, TextureDesc, TextureId, UniformKind, UniformSlot,
    UniformValue,
};

const QUAD_VERTICES: [f32; 8] = [-1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0, -1.0];
const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

struct GlTexture {
    texture: WebGlTexture,
    fbo: WebGlFramebuffer,
}

struct GlProgram {
    program: WebGlProgram,
    locations: Vec<Option<WebGlUniformLocation>>,
}

pub struct WebGlBackend {
    gl: GL,
    textures: Vec<Option<GlTexture>>,
    programs: Vec<Option<GlProgram>>,
    current: Option<ProgramId>,
    capabilities: Capabilities,
    _quad: (WebGlBuffer, WebGlBuffer),
}

fn internal_format(format: FieldFormat) -> u32 {
    match (format.precision, format.channels) {
        (Precision::Half, 1) => GL::R16F,
        (Precision::Half, 2) => GL::RG16F,
        (Precision::Half, _) => GL::RGBA16F,
        (Precision::Full, 1) => GL::R32F,
        (Precision::Full, 2) => GL::RG32F,
        (Precision::Full, _) => GL::RGBA32F,
        (Precision::Byte, 1) => GL::R8,
        (Precision::Byte, 2) => GL::RG8,
        (Precision::Byte, _) => GL::RGBA8,
    }
}

fn uniform_kind(gl_type: u32) -> Option<UniformKind> {
    match gl_type {
        GL::FLOAT => Some(UniformKind::Float),
        GL::FLOAT_VEC2 => Some(UniformKind::Vec2),
        GL::FLOAT_VEC3 => Some(UniformKind::Vec3),
        GL::FLOAT_VEC4 => Some(UniformKind::Vec4),
        GL::INT => Some(UniformKind::Int),
        GL::SAMPLER_2D => Some(UniformKind::Sampler2D),
        _ => None,
    }
}

impl WebGlBackend {
    pub fn new(gl: GL) -> EngineResult<Self> {
        let quad = Self::upload_quad(&gl)?;
        let capabilities = Self::probe(&gl);
        log::info!("WebGL2 capabilities: {:?}", capabilities);

        Ok(Self {
            gl,
            textures: Vec::new(),
            programs: Vec::new(),
            current: None,
            capabilities,
            _quad: quad,
        })
    }

    fn upload_quad(gl: &GL) -> EngineResult<(WebGlBuffer, WebGlBuffer)> {
        let vertices = gl
            .create_buffer()
            .ok_or_else(|| EngineError::Context("createBuffer failed".to_string()))?;
        let indices = gl
            .create_buffer()
            .ok_or_else(|| EngineError::Context("createBuffer failed".to_string()))?;

        let vertex_bytes: Vec<u8> = QUAD_VERTICES.iter().flat_map(|v| v.to_le_bytes()).collect();
        let index_bytes: Vec<u8> = QUAD_INDICES.iter().flat_map(|i| i.to_le_bytes()).collect();

        gl.bind_buffer(GL::ARRAY_BUFFER, Some(&vertices));
        gl.buffer_data_with_u8_array(GL::ARRAY_BUFFER, &vertex_bytes, GL::STATIC_DRAW);
        gl.bind_buffer(GL::ELEMENT_ARRAY_BUFFER, Some(&indices));
        gl.buffer_data_with_u8_array(GL::ELEMENT_ARRAY_BUFFER, &index_bytes, GL::STATIC_DRAW);
        gl.vertex_attrib_pointer_with_i32(0, 2, GL::FLOAT, false, 0, 0);
        gl.enable_vertex_attrib_array(0);

        Ok((vertices, indices))
    }

    fn probe(gl: &GL) -> Capabilities {
        let has = |name: &str| matches!(gl.get_extension(name), Ok(Some(_)));
        let color_buffer_float = has("EXT_color_buffer_float");
        let float_linear = has("OES_texture_float_linear");

        let renderable = |format: u32| -> bool {
            if !color_buffer_float {
                return false;
            }
            let (Some(texture), Some(fbo)) = (gl.create_texture(), gl.create_framebuffer()) else {
                return false;
            };
            gl.bind_texture(GL::TEXTURE_2D, Some(&texture));
            gl.tex_storage_2d(GL::TEXTURE_2D, 1, format, 4, 4);
            gl.bind_framebuffer(GL::FRAMEBUFFER, Some(&fbo));
            gl.framebuffer_texture_2d(GL::FRAMEBUFFER, GL::COLOR_ATTACHMENT0, GL::TEXTURE_2D, Some(&texture), 0);
            let complete = gl.check_framebuffer_status(GL::FRAMEBUFFER) == GL::FRAMEBUFFER_COMPLETE;
            gl.bind_framebuffer(GL::FRAMEBUFFER, None);
            gl.delete_framebuffer(Some(&fbo));
            gl.delete_texture(Some(&texture));
            complete
        };

        Capabilities {
            // 16F textures are always filterable in WebGL2
            half_float: FormatSupport { renderable: renderable(GL::RGBA16F), linear: true },
            full_float: FormatSupport { renderable: renderable(GL::RGBA32F), linear: float_linear },
        }
    }

    fn compile_shader(&self, kind: u32, source: &ShaderSource) -> EngineResult<WebGlShader> {
        let gl = &self.gl;
        let shader = gl
            .create_shader(kind)
            .ok_or_else(|| EngineError::Context("createShader failed".to_string()))?;
        gl.shader_source(&shader, source.glsl);
        gl.compile_shader(&shader);

        let ok = gl
            .get_shader_parameter(&shader, GL::COMPILE_STATUS)
            .as_bool()
            .unwrap_or(false);
        if !ok {
            let log = gl.get_shader_info_log(&shader).unwrap_or_default();
            gl.delete_shader(Some(&shader));
            return Err(EngineError::ShaderCompile {
                label: source.label.to_string(),
                log,
            });
        }
        Ok(shader)
    }

    fn gl_texture(&self, id: TextureId) -> Option<&GlTexture> {
        self.textures.get(id.0 as usize).and_then(Option::as_ref)
    }
}

impl GpuBackend for WebGlBackend {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> EngineResult<TextureId> {
        let gl = &self.gl;
        let res = desc.resolution;
        if !res.is_valid() {
            return Err(EngineError::InvalidResolution { width: res.width, height: res.height });
        }
        let alloc_error = |reason: String| EngineError::Allocation {
            label: desc.label.to_string(),
            reason,
        };

        let texture = gl
            .create_texture()
            .ok_or_else(|| alloc_error("createTexture returned null".to_string()))?;
        let filter = match desc.filter {
            FilterMode::Linear => GL::LINEAR,
            FilterMode::Nearest => GL::NEAREST,
        } as i32;

        gl.active_texture(GL::TEXTURE0);
        gl.bind_texture(GL::TEXTURE_2D, Some(&texture));
        gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_MIN_FILTER, filter);
        gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_MAG_FILTER, filter);
        gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_WRAP_S, GL::CLAMP_TO_EDGE as i32);
        gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_WRAP_T, GL::CLAMP_TO_EDGE as i32);
        gl.tex_storage_2d(
            GL::TEXTURE_2D,
            1,
            internal_format(desc.format),
            res.width as i32,
            res.height as i32,
        );

        let error = gl.get_error();
        if error != GL::NO_ERROR {
            gl.delete_texture(Some(&texture));
            return Err(alloc_error(format!("texStorage2D failed with 0x{:x}", error)));
        }

        let Some(fbo) = gl.create_framebuffer() else {
            gl.delete_texture(Some(&texture));
            return Err(alloc_error("createFramebuffer returned null".to_string()));
        };
        gl.bind_framebuffer(GL::FRAMEBUFFER, Some(&fbo));
        gl.framebuffer_texture_2d(GL::FRAMEBUFFER, GL::COLOR_ATTACHMENT0, GL::TEXTURE_2D, Some(&texture), 0);
        let status = gl.check_framebuffer_status(GL::FRAMEBUFFER);
        gl.bind_framebuffer(GL::FRAMEBUFFER, None);
        if status != GL::FRAMEBUFFER_COMPLETE {
            gl.delete_framebuffer(Some(&fbo));
            gl.delete_texture(Some(&texture));
            return Err(alloc_error(format!("framebuffer incomplete (0x{:x})", status)));
        }

        let entry = GlTexture { texture, fbo };
        let id = match self.textures.iter().position(Option::is_none) {
            Some(slot) => {
                self.textures[slot] = Some(entry);
                slot
            }
            None => {
                self.textures.push(Some(entry));
                self.textures.len() - 1
            }
        };
        Ok(TextureId(id as u32))
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if let Some(entry) = self.textures.get_mut(texture.0 as usize).and_then(Option::take) {
            self.gl.delete_framebuffer(Some(&entry.fbo));
            self.gl.delete_texture(Some(&entry.texture));
        }
    }

    fn compile_program(
        &mut self,
        label: &str,
        vertex: &ShaderSource,
        fragment: &ShaderSource,
    ) -> EngineResult<CompiledProgram> {
        let vs = self.compile_shader(GL::VERTEX_SHADER, vertex)?;
        let fs = match self.compile_shader(GL::FRAGMENT_SHADER, fragment) {
            Ok(fs) => fs,
            Err(e) => {
                self.gl.delete_shader(Some(&vs));
                return Err(e);
            }
        };

        let gl = &self.gl;
        let program = gl
            .create_program()
            .ok_or_else(|| EngineError::Context("createProgram failed".to_string()))?;
        gl.attach_shader(&program, &vs);
        gl.attach_shader(&program, &fs);
        gl.bind_attrib_location(&program, 0, "aPosition");
        gl.link_program(&program);
        gl.delete_shader(Some(&vs));
        gl.delete_shader(Some(&fs));

        let linked = gl
            .get_program_parameter(&program, GL::LINK_STATUS)
            .as_bool()
            .unwrap_or(false);
        if !linked {
            let log = gl.get_program_info_log(&program).unwrap_or_default();
            gl.delete_program(Some(&program));
            return Err(EngineError::ShaderLink { label: label.to_string(), log });
        }

        let count = gl
            .get_program_parameter(&program, GL::ACTIVE_UNIFORMS)
            .as_f64()
            .unwrap_or(0.0) as u32;
        let mut uniforms = Vec::with_capacity(count as usize);
        let mut locations = Vec::with_capacity(count as usize);
        for index in 0..count {
            let Some(info) = gl.get_active_uniform(&program, index) else {
                continue;
            };
            let Some(kind) = uniform_kind(info.type_()) else {
                log::warn!("{}: skipping uniform '{}' of unsupported type", label, info.name());
                continue;
            };
            let name = info.name();
            locations.push(gl.get_uniform_location(&program, &name));
            uniforms.push(ActiveUniform {
                name,
                kind,
                slot: UniformSlot(uniforms.len() as u32),
            });
        }

        let id = ProgramId(self.programs.len() as u32);
        self.programs.push(Some(GlProgram { program, locations }));
        Ok(CompiledProgram { id, uniforms })
    }

    fn destroy_program(&mut self, program: ProgramId) {
        if let Some(entry) = self.programs.get_mut(program.0 as usize).and_then(Option::take) {
            self.gl.delete_program(Some(&entry.program));
        }
        if self.current == Some(program) {
            self.current = None;
        }
    }

    fn use_program(&mut self, program: ProgramId) {
        let entry = self.programs.get(program.0 as usize).and_then(Option::as_ref);
        self.gl.use_program(entry.map(|p| &p.program));
        self.current = entry.map(|_| program);
    }

    fn set_uniform(&mut self, slot: UniformSlot, value: UniformValue) {
        let Some(program) = self
            .current
            .and_then(|id| self.programs.get(id.0 as usize))
            .and_then(Option::as_ref)
        else {
            return;
        };
        let location = program.locations.get(slot.0 as usize).and_then(Option::as_ref);
        let gl = &self.gl;
        match value {
            UniformValue::Float(v) => gl.uniform1f(location, v),
            UniformValue::Vec2([x, y]) => gl.uniform2f(location, x, y),
            UniformValue::Vec3([x, y, z]) => gl.uniform3f(location, x, y, z),
            UniformValue::Vec4([x, y, z, w]) => gl.uniform4f(location, x, y, z, w),
            UniformValue::Int(v) => gl.uniform1i(location, v),
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        let entry = self.gl_texture(texture).map(|t| t.texture.clone());
        self.gl.active_texture(GL::TEXTURE0 + unit);
        self.gl.bind_texture(GL::TEXTURE_2D, entry.as_ref());
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.gl.viewport(0, 0, width as i32, height as i32);
    }

    fn set_blend(&mut self, mode: BlendMode) {
        match mode {
            BlendMode::Disabled => self.gl.disable(GL::BLEND),
            BlendMode::PremultipliedOver => {
                self.gl.blend_func(GL::ONE, GL::ONE_MINUS_SRC_ALPHA);
                self.gl.enable(GL::BLEND);
            }
        }
    }

    fn draw_quad(&mut self, target: RenderTarget) -> EngineResult<()> {
        let fbo = match target {
            RenderTarget::Screen => None,
            RenderTarget::Field(id) => Some(
                self.gl_texture(id)
                    .map(|t| t.fbo.clone())
                    .ok_or(EngineError::UnknownTexture(id))?,
            ),
        };
        self.gl.bind_framebuffer(GL::FRAMEBUFFER, fbo.as_ref());
        self.gl
            .draw_elements_with_i32(GL::TRIANGLES, QUAD_INDICES.len() as i32, GL::UNSIGNED_SHORT, 0);
        Ok(())
    }

    fn surface_size(&self) -> (u32, u32) {
        (
            self.gl.drawing_buffer_width().max(0) as u32,
            self.gl.drawing_buffer_height().max(0) as u32,
        )
    }

    fn read_texture(&self, _texture: TextureId) -> EngineResult<Vec<Texel>> {
        Err(EngineError::Unsupported("texture readback"))
    }

    fn read_surface(&self) -> EngineResult<Vec<Texel>> {
        Err(EngineError::Unsupported("surface readback"))
    }
}

impl Drop for WebGlBackend {
    fn drop(&mut self) {
        for entry in self.textures.iter_mut().filter_map(Option::take) {
            self.gl.delete_framebuffer(Some(&entry.fbo));
            self.gl.delete_texture(Some(&entry.texture));
        }
        for entry in self.programs.iter_mut().filter_map(Option::take) {
            self.gl.delete_program(Some(&entry.program));
        }
    }
}
