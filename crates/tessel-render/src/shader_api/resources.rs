//! Resource creation, destruction and the unbind-before-release rule.
//!
//! A resource is stripped from the desired state before it is released. If
//! the current state still references it, pending commits are flushed first
//! so the device never holds a released object.

use tessel_core::profiling::profile_function;

use tessel_test_utils::NativeVertexBinding;

use super::state::ShaderApiState;
use crate::buffer::{BufferStatus, IndexBuffer, LockDesc, LockError, VertexBuffer, index_size};
use crate::commit::CommitFunc;
use crate::error::ShaderApiError;
use crate::handles::{
    GeometryShaderHandle, IndexBufferHandle, PixelShaderHandle, VertexBufferHandle, VertexShaderHandle,
};
use crate::shader::{GeometryShader, PixelShader, ShaderEntry, ShaderStage, VertexShader};
use crate::state::{IndexBufferBinding, MAX_VERTEX_STREAMS, VertexBufferBinding};
use crate::vertex_format::VertexFormat;

impl ShaderApiState {
    // Shaders

    pub(super) fn create_vertex_shader(&mut self, bytecode: &[u8]) -> Result<VertexShaderHandle, ShaderApiError> {
        let entry = ShaderEntry::create(self.device.as_ref(), ShaderStage::Vertex, bytecode)?;
        let handle = self.vertex_shaders.insert(VertexShader::new(entry));
        tracing::debug!("Created vertex shader {:?}", handle);
        Ok(handle)
    }

    pub(super) fn create_pixel_shader(&mut self, bytecode: &[u8]) -> Result<PixelShaderHandle, ShaderApiError> {
        let entry = ShaderEntry::create(self.device.as_ref(), ShaderStage::Pixel, bytecode)?;
        let handle = self.pixel_shaders.insert(PixelShader { entry });
        tracing::debug!("Created pixel shader {:?}", handle);
        Ok(handle)
    }

    pub(super) fn create_geometry_shader(
        &mut self,
        bytecode: &[u8],
    ) -> Result<GeometryShaderHandle, ShaderApiError> {
        let entry = ShaderEntry::create(self.device.as_ref(), ShaderStage::Geometry, bytecode)?;
        let handle = self.geometry_shaders.insert(GeometryShader { entry });
        tracing::debug!("Created geometry shader {:?}", handle);
        Ok(handle)
    }

    pub(super) fn destroy_vertex_shader(&mut self, shader: VertexShaderHandle) -> Result<(), ShaderApiError> {
        if !self.vertex_shaders.contains(shader) {
            tracing::warn!("Attempted to destroy invalid vertex shader {:?}", shader);
            return Err(ShaderApiError::InvalidHandle);
        }

        if self.desired.references_vertex_shader(shader) {
            self.set_vertex_shader(None);
        }
        if self.current.references_vertex_shader(shader) {
            self.commit_state_changes(false);
        }

        let device = self.device.as_ref();
        if let Some(entry) = self.vertex_shaders.get_mut(shader) {
            entry.release(device);
        }
        self.vertex_shaders.remove(shader);
        tracing::debug!("Destroyed vertex shader {:?}", shader);
        Ok(())
    }

    pub(super) fn destroy_pixel_shader(&mut self, shader: PixelShaderHandle) -> Result<(), ShaderApiError> {
        let Some(native) = self.pixel_shaders.get(shader).map(|s| s.entry.native()) else {
            tracing::warn!("Attempted to destroy invalid pixel shader {:?}", shader);
            return Err(ShaderApiError::InvalidHandle);
        };

        if self.desired.pixel_shader == Some(shader) {
            self.set_pixel_shader(None);
        }
        if self.current.pixel_shader == Some(shader) {
            self.commit_state_changes(false);
        }

        self.device.release_shader(native);
        self.pixel_shaders.remove(shader);
        tracing::debug!("Destroyed pixel shader {:?}", shader);
        Ok(())
    }

    pub(super) fn destroy_geometry_shader(&mut self, shader: GeometryShaderHandle) -> Result<(), ShaderApiError> {
        let Some(native) = self.geometry_shaders.get(shader).map(|s| s.entry.native()) else {
            tracing::warn!("Attempted to destroy invalid geometry shader {:?}", shader);
            return Err(ShaderApiError::InvalidHandle);
        };

        if self.desired.geometry_shader == Some(shader) {
            self.set_geometry_shader(None);
        }
        if self.current.geometry_shader == Some(shader) {
            self.commit_state_changes(false);
        }

        self.device.release_shader(native);
        self.geometry_shaders.remove(shader);
        tracing::debug!("Destroyed geometry shader {:?}", shader);
        Ok(())
    }

    // Buffers

    pub(super) fn create_vertex_buffer(
        &mut self,
        format: Option<VertexFormat>,
        count: u32,
        dynamic: bool,
    ) -> Result<VertexBufferHandle, ShaderApiError> {
        let mut buffer = VertexBuffer::new(format, count, dynamic);
        buffer
            .core
            .allocate(self.device.as_ref())
            .map_err(|e| {
                tracing::warn!("Failed to create vertex buffer: {}", e);
                ShaderApiError::BufferCreation(e)
            })?;
        Ok(self.vertex_buffers.insert(buffer))
    }

    pub(super) fn create_index_buffer(
        &mut self,
        format: Option<wgpu::IndexFormat>,
        count: u32,
        dynamic: bool,
    ) -> Result<IndexBufferHandle, ShaderApiError> {
        let mut buffer = IndexBuffer::new(format, count, dynamic);
        buffer
            .core
            .allocate(self.device.as_ref())
            .map_err(|e| {
                tracing::warn!("Failed to create index buffer: {}", e);
                ShaderApiError::BufferCreation(e)
            })?;
        Ok(self.index_buffers.insert(buffer))
    }

    pub(super) fn destroy_vertex_buffer(&mut self, buffer: VertexBufferHandle) -> Result<(), ShaderApiError> {
        if buffer == self.fallback_buffer || !self.vertex_buffers.contains(buffer) {
            tracing::warn!("Attempted to destroy invalid vertex buffer {:?}", buffer);
            return Err(ShaderApiError::InvalidHandle);
        }

        self.unbind_vertex_buffer(buffer);

        let device = self.device.as_ref();
        if let Some(entry) = self.vertex_buffers.get_mut(buffer) {
            entry.core.release_native(device);
        }
        self.vertex_buffers.remove(buffer);
        tracing::debug!("Destroyed vertex buffer {:?}", buffer);
        Ok(())
    }

    pub(super) fn destroy_index_buffer(&mut self, buffer: IndexBufferHandle) -> Result<(), ShaderApiError> {
        if !self.index_buffers.contains(buffer) {
            tracing::warn!("Attempted to destroy invalid index buffer {:?}", buffer);
            return Err(ShaderApiError::InvalidHandle);
        }

        self.unbind_index_buffer(buffer);

        let device = self.device.as_ref();
        if let Some(entry) = self.index_buffers.get_mut(buffer) {
            entry.core.release_native(device);
        }
        self.index_buffers.remove(buffer);
        tracing::debug!("Destroyed index buffer {:?}", buffer);
        Ok(())
    }

    /// Removes `buffer` from every stream, flushing if it was submitted.
    pub(super) fn unbind_vertex_buffer(&mut self, buffer: VertexBufferHandle) {
        for stream in 0..MAX_VERTEX_STREAMS {
            if self.desired.vertex_buffers[stream].buffer == Some(buffer) {
                self.set_vertex_buffer_binding(stream, VertexBufferBinding::UNBOUND, None);
            }
        }
        if self.current.references_vertex_buffer(buffer) {
            self.commit_state_changes(false);
        }
    }

    pub(super) fn unbind_index_buffer(&mut self, buffer: IndexBufferHandle) {
        if self.desired.references_index_buffer(buffer) {
            self.set_index_buffer_binding(IndexBufferBinding::default());
        }
        if self.current.references_index_buffer(buffer) {
            self.commit_state_changes(false);
        }
    }

    pub(super) fn bind_vertex_buffer(
        &mut self,
        stream: usize,
        buffer: Option<VertexBufferHandle>,
        byte_offset: u32,
    ) -> Result<(), ShaderApiError> {
        // The last stream carries the constant fallback data.
        if stream >= MAX_VERTEX_STREAMS - 1 {
            tracing::warn!("Refusing to bind vertex stream {}", stream);
            return Err(ShaderApiError::ReservedStream(stream));
        }

        let (binding, format) = match buffer {
            Some(handle) => {
                let entry = self
                    .vertex_buffers
                    .get(handle)
                    .filter(|_| handle != self.fallback_buffer)
                    .ok_or(ShaderApiError::InvalidHandle)?;
                let binding = VertexBufferBinding {
                    buffer: Some(handle),
                    stride: entry.stride(),
                    byte_offset,
                };
                (binding, entry.format())
            }
            None => (VertexBufferBinding::UNBOUND, None),
        };
        self.set_vertex_buffer_binding(stream, binding, format);
        Ok(())
    }

    pub(super) fn bind_index_buffer(
        &mut self,
        buffer: Option<IndexBufferHandle>,
        byte_offset: u32,
    ) -> Result<(), ShaderApiError> {
        let binding = match buffer {
            Some(handle) => {
                let entry = self
                    .index_buffers
                    .get(handle)
                    .ok_or(ShaderApiError::InvalidHandle)?;
                IndexBufferBinding {
                    buffer: Some(handle),
                    format: entry.format().unwrap_or(wgpu::IndexFormat::Uint16),
                    byte_offset,
                }
            }
            None => IndexBufferBinding::default(),
        };
        self.set_index_buffer_binding(binding);
        Ok(())
    }

    // Casts

    pub(super) fn begin_cast_vertex_buffer(&mut self, buffer: VertexBufferHandle, format: VertexFormat) -> bool {
        let stream_offset = self.supports_stream_offset();
        let cast = self
            .vertex_buffers
            .get_mut(buffer)
            .is_some_and(|entry| entry.begin_cast(format, stream_offset));
        if cast {
            self.refresh_vertex_buffer_bindings(buffer);
        }
        cast
    }

    pub(super) fn end_cast_vertex_buffer(&mut self, buffer: VertexBufferHandle) {
        if let Some(entry) = self.vertex_buffers.get_mut(buffer) {
            entry.end_cast();
            self.refresh_vertex_buffer_bindings(buffer);
        }
    }

    pub(super) fn begin_cast_index_buffer(&mut self, buffer: IndexBufferHandle, format: wgpu::IndexFormat) -> bool {
        let stream_offset = self.supports_stream_offset();
        let cast = self
            .index_buffers
            .get_mut(buffer)
            .is_some_and(|entry| entry.begin_cast(format, stream_offset));
        if cast {
            self.refresh_index_buffer_binding(buffer);
        }
        cast
    }

    pub(super) fn end_cast_index_buffer(&mut self, buffer: IndexBufferHandle) {
        if let Some(entry) = self.index_buffers.get_mut(buffer) {
            entry.end_cast();
            self.refresh_index_buffer_binding(buffer);
        }
    }

    /// Re-reads stride and format for every stream bound to `buffer`.
    fn refresh_vertex_buffer_bindings(&mut self, buffer: VertexBufferHandle) {
        let Some((stride, format)) = self
            .vertex_buffers
            .get(buffer)
            .map(|entry| (entry.stride(), entry.format()))
        else {
            return;
        };
        for stream in 0..MAX_VERTEX_STREAMS {
            let binding = self.desired.vertex_buffers[stream];
            if binding.buffer == Some(buffer) {
                self.set_vertex_buffer_binding(stream, VertexBufferBinding { stride, ..binding }, format);
            }
        }
    }

    fn refresh_index_buffer_binding(&mut self, buffer: IndexBufferHandle) {
        let binding = self.desired.index_buffer;
        if binding.buffer != Some(buffer) {
            return;
        }
        if let Some(entry) = self.index_buffers.get(buffer) {
            let format = entry.format().unwrap_or(wgpu::IndexFormat::Uint16);
            self.set_index_buffer_binding(IndexBufferBinding { format, ..binding });
        }
    }

    // Buffer locks

    pub(super) fn lock_vertex_buffer(
        &mut self,
        buffer: VertexBufferHandle,
        max_vertices: u32,
        append: bool,
    ) -> Result<LockDesc, LockError> {
        profile_function!();
        let stream_offset = self.supports_stream_offset();
        let device = self.device.as_ref();
        let entry = self
            .vertex_buffers
            .get_mut(buffer)
            .filter(|_| buffer != self.fallback_buffer)
            .ok_or(LockError::InvalidHandle)?;
        let was_allocated = entry.core.native().is_some();
        let region = entry.core.lock(device, max_vertices, append, self.deactivated)?;
        let desc = LockDesc::new(&region, entry.stride(), stream_offset);

        if !was_allocated {
            self.forget_vertex_buffer_binding(buffer, false);
        }
        Ok(desc)
    }

    pub(super) fn lock_index_buffer(
        &mut self,
        buffer: IndexBufferHandle,
        max_indices: u32,
        append: bool,
    ) -> Result<LockDesc, LockError> {
        profile_function!();
        let stream_offset = self.supports_stream_offset();
        let device = self.device.as_ref();
        let entry = self
            .index_buffers
            .get_mut(buffer)
            .ok_or(LockError::InvalidHandle)?;
        let was_allocated = entry.core.native().is_some();
        let region = entry.core.lock(device, max_indices, append, self.deactivated)?;
        let stride = entry.format().map(index_size).unwrap_or(0);
        let desc = LockDesc::new(&region, stride, stream_offset);

        if !was_allocated {
            self.forget_index_buffer_binding(buffer, false);
        }
        Ok(desc)
    }

    pub(super) fn unlock_vertex_buffer(&mut self, buffer: VertexBufferHandle, data: &[u8], written: u32) {
        let device = self.device.as_ref();
        if let Some(entry) = self.vertex_buffers.get_mut(buffer) {
            entry.core.unlock(device, data, written);
        }
    }

    pub(super) fn unlock_index_buffer(&mut self, buffer: IndexBufferHandle, data: &[u8], written: u32) {
        let device = self.device.as_ref();
        if let Some(entry) = self.index_buffers.get_mut(buffer) {
            entry.core.unlock(device, data, written);
        }
    }

    pub(super) fn vertex_buffer_status(&self, buffer: VertexBufferHandle) -> Option<BufferStatus> {
        self.vertex_buffers.get(buffer).map(|entry| entry.core.status())
    }

    pub(super) fn index_buffer_status(&self, buffer: IndexBufferHandle) -> Option<BufferStatus> {
        self.index_buffers.get(buffer).map(|entry| entry.core.status())
    }

    /// Frees the native objects of every dynamic buffer.
    ///
    /// Used when the device is lost; the next lock of each buffer
    /// re-allocates it.
    pub(super) fn release_dynamic_resources(&mut self) {
        let dynamic_vertex: Vec<_> = self
            .vertex_buffers
            .iter()
            .filter(|(_, buffer)| buffer.core.is_dynamic())
            .map(|(handle, _)| handle)
            .collect();
        let dynamic_index: Vec<_> = self
            .index_buffers
            .iter()
            .filter(|(_, buffer)| buffer.core.is_dynamic())
            .map(|(handle, _)| handle)
            .collect();
        for handle in dynamic_vertex {
            self.forget_vertex_buffer_binding(handle, true);
        }
        for handle in dynamic_index {
            self.forget_index_buffer_binding(handle, true);
        }

        let device = self.device.as_ref();
        let mut released = 0;
        for (_, buffer) in self.vertex_buffers.iter_mut() {
            if buffer.core.is_dynamic() {
                buffer.core.release_native(device);
                released += 1;
            }
        }
        for (_, buffer) in self.index_buffers.iter_mut() {
            if buffer.core.is_dynamic() {
                buffer.core.release_native(device);
                released += 1;
            }
        }
        tracing::debug!("Released {} dynamic buffers", released);
    }

    /// Marks every stream the device has `buffer` bound on as unbound, so the
    /// next commit binds its current native object again.
    ///
    /// With `unbind_native` the streams are also cleared on the device right
    /// away, which must happen before the native buffer is released.
    fn forget_vertex_buffer_binding(&mut self, buffer: VertexBufferHandle, unbind_native: bool) {
        let mut forgotten = false;
        for stream in 0..MAX_VERTEX_STREAMS {
            if self.current.vertex_buffers[stream].buffer != Some(buffer) {
                continue;
            }
            if unbind_native && !self.deactivated {
                self.device
                    .set_vertex_buffers(stream as u32, &[NativeVertexBinding::default()]);
            }
            self.current.vertex_buffers[stream] = VertexBufferBinding::UNBOUND;
            forgotten = true;
        }
        if forgotten {
            self.registry.register(CommitFunc::VertexBuffers);
        }
    }

    fn forget_index_buffer_binding(&mut self, buffer: IndexBufferHandle, unbind_native: bool) {
        if !self.current.references_index_buffer(buffer) {
            return;
        }
        let unbound = IndexBufferBinding::default();
        if unbind_native && !self.deactivated {
            self.device.set_index_buffer(None, unbound.format, 0);
        }
        self.current.index_buffer = unbound;
        self.registry.register(CommitFunc::IndexBuffer);
    }

    /// Releases every resource the engine still owns.
    pub(super) fn shutdown(&mut self) {
        let device = self.device.as_ref();
        for (_, mut shader) in self.vertex_shaders.remove_all() {
            shader.release(device);
        }
        for (_, shader) in self.pixel_shaders.remove_all() {
            device.release_shader(shader.entry.native());
        }
        for (_, shader) in self.geometry_shaders.remove_all() {
            device.release_shader(shader.entry.native());
        }
        for (_, mut buffer) in self.vertex_buffers.remove_all() {
            buffer.core.release_native(device);
        }
        for (_, mut buffer) in self.index_buffers.remove_all() {
            buffer.core.release_native(device);
        }
        self.state_objects.release_all(device);
        self.registry.clear();
    }
}
