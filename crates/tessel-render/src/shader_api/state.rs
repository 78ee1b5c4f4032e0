//! Engine state behind the shader API lock.

use std::sync::Arc;

use tessel_core::alloc::HandleTable;
use tessel_test_utils::{BlendDesc, DepthStencilDesc, NativeDevice, RasterizerDesc, Viewport};

use crate::buffer::{IndexBuffer, VertexBuffer};
use crate::caps::{HardwareConfig, HardwareFeatures};
use crate::commit::{CommitFunc, CommitMask, CommitRegistry, update_desired};
use crate::error::ShaderApiError;
use crate::handles::{GeometryShaderHandle, PixelShaderHandle, VertexBufferHandle, VertexShaderHandle};
use crate::shader::{GeometryShader, PixelShader, VertexShader};
use crate::state::{
    FALLBACK_STREAM, IndexBufferBinding, MAX_VERTEX_STREAMS, PipelineState, VertexBufferBinding,
};
use crate::state_objects::StateObjectCache;
use crate::vertex_format::{VertexField, VertexFlags, VertexFormat, fallback_stream_data};

pub(crate) struct ShaderApiState {
    pub(super) device: Arc<dyn NativeDevice>,
    pub(super) config: HardwareConfig,
    pub(super) desired: PipelineState,
    pub(super) current: PipelineState,
    pub(super) registry: CommitRegistry,
    /// Commit functions whose native object could not be created. They run
    /// forced on the next commit.
    pub(super) retry: CommitMask,
    pub(super) vertex_shaders: HandleTable<VertexShader>,
    pub(super) pixel_shaders: HandleTable<PixelShader>,
    pub(super) geometry_shaders: HandleTable<GeometryShader>,
    pub(super) vertex_buffers: HandleTable<VertexBuffer>,
    pub(super) index_buffers: HandleTable<IndexBuffer>,
    pub(super) state_objects: StateObjectCache,
    pub(super) fallback_buffer: VertexBufferHandle,
    pub(super) deactivated: bool,
    pub(super) resetting: bool,
}

impl ShaderApiState {
    pub(super) fn new(device: Arc<dyn NativeDevice>, config: HardwareConfig) -> Result<Self, ShaderApiError> {
        let mut vertex_buffers = HandleTable::new();
        let fallback_buffer = vertex_buffers.insert(create_fallback_buffer(device.as_ref())?);

        let mut state = Self {
            device,
            config,
            desired: PipelineState::default(),
            current: PipelineState::default(),
            registry: CommitRegistry::new(),
            retry: CommitMask::empty(),
            vertex_shaders: HandleTable::new(),
            pixel_shaders: HandleTable::new(),
            geometry_shaders: HandleTable::new(),
            vertex_buffers,
            index_buffers: HandleTable::new(),
            state_objects: StateObjectCache::new(),
            fallback_buffer,
            deactivated: false,
            resetting: false,
        };
        state.reset_render_state(true);
        Ok(state)
    }

    pub(super) fn supports_stream_offset(&self) -> bool {
        self.config.supports(HardwareFeatures::STREAM_OFFSET)
    }

    // Desired-state setters. Each queues its commit function when the value
    // changes, or unconditionally while a reset is in progress.

    pub(super) fn set_vertex_shader(&mut self, shader: Option<VertexShaderHandle>) {
        let force = self.resetting;
        update_desired(
            &mut self.desired.vertex_shader,
            shader,
            &mut self.registry,
            CommitFunc::VertexShader,
            force,
        );
        update_desired(
            &mut self.desired.input_layout.vertex_shader,
            shader,
            &mut self.registry,
            CommitFunc::InputLayout,
            force,
        );
    }

    pub(super) fn set_pixel_shader(&mut self, shader: Option<PixelShaderHandle>) {
        update_desired(
            &mut self.desired.pixel_shader,
            shader,
            &mut self.registry,
            CommitFunc::PixelShader,
            self.resetting,
        );
    }

    pub(super) fn set_geometry_shader(&mut self, shader: Option<GeometryShaderHandle>) {
        update_desired(
            &mut self.desired.geometry_shader,
            shader,
            &mut self.registry,
            CommitFunc::GeometryShader,
            self.resetting,
        );
    }

    pub(super) fn set_vertex_buffer_binding(
        &mut self,
        stream: usize,
        binding: VertexBufferBinding,
        format: Option<VertexFormat>,
    ) {
        let force = self.resetting;
        update_desired(
            &mut self.desired.vertex_buffers[stream],
            binding,
            &mut self.registry,
            CommitFunc::VertexBuffers,
            force,
        );
        update_desired(
            &mut self.desired.input_layout.formats[stream],
            format,
            &mut self.registry,
            CommitFunc::InputLayout,
            force,
        );
    }

    pub(super) fn set_index_buffer_binding(&mut self, binding: IndexBufferBinding) {
        update_desired(
            &mut self.desired.index_buffer,
            binding,
            &mut self.registry,
            CommitFunc::IndexBuffer,
            self.resetting,
        );
    }

    pub(super) fn set_rasterizer_state(&mut self, desc: RasterizerDesc) {
        update_desired(
            &mut self.desired.rasterizer,
            desc,
            &mut self.registry,
            CommitFunc::RasterizerState,
            self.resetting,
        );
    }

    pub(super) fn set_depth_stencil_state(&mut self, desc: DepthStencilDesc) {
        update_desired(
            &mut self.desired.depth_stencil,
            desc,
            &mut self.registry,
            CommitFunc::DepthStencilState,
            self.resetting,
        );
    }

    pub(super) fn set_blend_state(&mut self, desc: BlendDesc) {
        update_desired(
            &mut self.desired.blend,
            desc,
            &mut self.registry,
            CommitFunc::BlendState,
            self.resetting,
        );
    }

    pub(super) fn set_viewports(&mut self, viewports: &[Viewport]) {
        if !self.resetting && self.desired.viewports == viewports {
            return;
        }
        update_desired(
            &mut self.desired.viewports,
            viewports.to_vec(),
            &mut self.registry,
            CommitFunc::Viewports,
            self.resetting,
        );
    }

    pub(super) fn set_topology(&mut self, topology: Option<wgpu::PrimitiveTopology>) {
        update_desired(
            &mut self.desired.topology,
            topology,
            &mut self.registry,
            CommitFunc::Topology,
            self.resetting,
        );
    }

    fn fallback_binding(&self) -> VertexBufferBinding {
        VertexBufferBinding {
            buffer: Some(self.fallback_buffer),
            stride: 0,
            byte_offset: 0,
        }
    }

    /// Returns every piece of pipeline state to its default.
    ///
    /// A full reset also drops the cached state objects and commits with
    /// `force`, because the device's actual state cannot be trusted.
    pub(super) fn reset_render_state(&mut self, full: bool) {
        tracing::debug!("Resetting render state (full: {})", full);
        self.resetting = true;

        if full {
            self.state_objects.release_all(self.device.as_ref());
        }

        self.set_vertex_shader(None);
        self.set_geometry_shader(None);
        self.set_pixel_shader(None);

        let fallback = self.fallback_binding();
        for stream in 0..MAX_VERTEX_STREAMS {
            let binding = if stream == FALLBACK_STREAM {
                fallback
            } else {
                VertexBufferBinding::UNBOUND
            };
            self.set_vertex_buffer_binding(stream, binding, None);
        }
        self.set_index_buffer_binding(IndexBufferBinding::default());

        self.set_rasterizer_state(RasterizerDesc::default());
        self.set_depth_stencil_state(DepthStencilDesc::default());
        self.set_blend_state(BlendDesc::default());
        self.set_viewports(&[]);
        self.set_topology(None);
        self.desired.clear_color = wgpu::Color::BLACK;

        self.resetting = false;
        self.commit_state_changes(full);
    }

    pub(super) fn set_deactivated(&mut self, deactivated: bool) {
        if self.deactivated == deactivated {
            return;
        }
        self.deactivated = deactivated;
        if deactivated {
            tracing::info!("Device deactivated; commits and locks are suspended");
        } else {
            tracing::info!("Device reactivated; forcing a full state reset");
            self.reset_render_state(true);
        }
    }
}

/// A static buffer holding one default value per vertex field.
fn create_fallback_buffer(device: &dyn NativeDevice) -> Result<VertexBuffer, ShaderApiError> {
    let data = fallback_stream_data();
    let element = VertexFormat::new(VertexFlags::empty()).with_user_data(4);
    let count = VertexField::ALL.len() as u32;

    let mut buffer = VertexBuffer::new(Some(element), count, false);
    buffer
        .core
        .allocate(device)
        .map_err(ShaderApiError::BufferCreation)?;

    match buffer.core.lock(device, count, false, false) {
        Ok(_) => buffer.core.unlock(device, &data, count),
        Err(e) => tracing::warn!("Failed to fill the fallback vertex stream: {}", e),
    }
    Ok(buffer)
}
