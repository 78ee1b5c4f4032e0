//! Commit function bodies and the draw path.

use tessel_core::alloc::HandleTable;
use tessel_core::profiling::{profile_function, profile_scope};
use tessel_test_utils::{NativeDevice, NativeInputLayout, NativeVertexBinding};

use super::state::ShaderApiState;
use crate::commit::{CommitFunc, changed_ranges, commit_field};
use crate::handles::VertexShaderHandle;
use crate::shader::VertexShader;
use crate::state::StreamFormats;

impl ShaderApiState {
    /// Runs every queued commit function once, in registration order.
    ///
    /// Skipped entirely while the device is deactivated; the queue is kept
    /// so nothing is lost.
    pub(super) fn commit_state_changes(&mut self, force: bool) {
        if self.deactivated {
            return;
        }
        profile_function!();

        for func in self.registry.take() {
            self.execute_commit(func, force);
        }
    }

    fn execute_commit(&mut self, func: CommitFunc, force: bool) {
        let force = force || self.retry.contains(func.mask());
        let mut complete = true;
        let device = self.device.as_ref();
        let desired = &self.desired;
        let current = &mut self.current;

        let applied = match func {
            CommitFunc::Viewports => {
                commit_field(&desired.viewports, &mut current.viewports, force, |viewports| {
                    device.set_viewports(viewports)
                })
            }
            CommitFunc::VertexShader => {
                let shaders = &self.vertex_shaders;
                commit_field(&desired.vertex_shader, &mut current.vertex_shader, force, |shader| {
                    let native = shader.and_then(|h| shaders.get(h)).map(|s| s.entry.native());
                    device.set_vertex_shader(native)
                })
            }
            CommitFunc::GeometryShader => {
                let shaders = &self.geometry_shaders;
                commit_field(&desired.geometry_shader, &mut current.geometry_shader, force, |shader| {
                    let native = shader.and_then(|h| shaders.get(h)).map(|s| s.entry.native());
                    device.set_geometry_shader(native)
                })
            }
            CommitFunc::PixelShader => {
                let shaders = &self.pixel_shaders;
                commit_field(&desired.pixel_shader, &mut current.pixel_shader, force, |shader| {
                    let native = shader.and_then(|h| shaders.get(h)).map(|s| s.entry.native());
                    device.set_pixel_shader(native)
                })
            }
            CommitFunc::VertexBuffers => {
                let ranges = changed_ranges(&desired.vertex_buffers, &current.vertex_buffers, force);
                for range in &ranges {
                    let bindings: Vec<NativeVertexBinding> = desired.vertex_buffers[range.clone()]
                        .iter()
                        .map(|binding| NativeVertexBinding {
                            buffer: binding
                                .buffer
                                .and_then(|h| self.vertex_buffers.get(h))
                                .and_then(|buffer| buffer.core.native()),
                            stride: binding.stride,
                            offset: binding.byte_offset,
                        })
                        .collect();
                    device.set_vertex_buffers(range.start as u32, &bindings);
                    current.vertex_buffers[range.clone()]
                        .copy_from_slice(&desired.vertex_buffers[range.clone()]);
                }
                !ranges.is_empty()
            }
            CommitFunc::IndexBuffer => {
                let buffers = &self.index_buffers;
                commit_field(&desired.index_buffer, &mut current.index_buffer, force, |binding| {
                    let native = binding
                        .buffer
                        .and_then(|h| buffers.get(h))
                        .and_then(|buffer| buffer.core.native());
                    device.set_index_buffer(native, binding.format, binding.byte_offset)
                })
            }
            CommitFunc::InputLayout => {
                if !force && desired.input_layout == current.input_layout {
                    false
                } else {
                    let key = desired.input_layout;
                    let layout = input_layout(
                        &mut self.vertex_shaders,
                        device,
                        key.vertex_shader,
                        &key.formats,
                    );
                    complete = key.vertex_shader.is_none() || layout.is_some();
                    device.set_input_layout(layout);
                    current.input_layout = key;
                    true
                }
            }
            CommitFunc::RasterizerState => {
                let cache = &mut self.state_objects;
                commit_field(&desired.rasterizer, &mut current.rasterizer, force, |desc| {
                    let state = cache.rasterizer(device, desc);
                    complete = state.is_some();
                    device.set_rasterizer_state(state)
                })
            }
            CommitFunc::DepthStencilState => {
                let cache = &mut self.state_objects;
                commit_field(&desired.depth_stencil, &mut current.depth_stencil, force, |desc| {
                    let state = cache.depth_stencil(device, desc);
                    complete = state.is_some();
                    device.set_depth_stencil_state(state)
                })
            }
            CommitFunc::BlendState => {
                let cache = &mut self.state_objects;
                commit_field(&desired.blend, &mut current.blend, force, |desc| {
                    let state = cache.blend(device, desc);
                    complete = state.is_some();
                    device.set_blend_state(state)
                })
            }
            CommitFunc::Topology => {
                commit_field(&desired.topology, &mut current.topology, force, |topology| {
                    if let Some(topology) = topology {
                        device.set_primitive_topology(*topology);
                    }
                })
            }
        };

        if applied {
            tracing::trace!("Committed {:?}", func);
        }
        if complete {
            self.retry.remove(func.mask());
        } else {
            tracing::debug!("{:?} bound a null object; retrying on the next commit", func);
            self.retry.insert(func.mask());
            self.registry.register(func);
        }
    }

    /// Native input layout for `shader` reading `formats`, built on first use.
    pub(super) fn input_layout(
        &mut self,
        shader: Option<VertexShaderHandle>,
        formats: &StreamFormats,
    ) -> Option<NativeInputLayout> {
        input_layout(&mut self.vertex_shaders, self.device.as_ref(), shader, formats)
    }

    /// Indexed draw. Topology is set and state committed before every draw.
    pub(super) fn draw(&mut self, topology: wgpu::PrimitiveTopology, first_index: u32, index_count: u32) {
        if self.deactivated {
            return;
        }
        profile_function!();
        self.set_topology(Some(topology));
        self.commit_state_changes(false);
        self.device.draw_indexed(index_count, first_index, 0);
    }

    pub(super) fn draw_vertices(
        &mut self,
        topology: wgpu::PrimitiveTopology,
        first_vertex: u32,
        vertex_count: u32,
    ) {
        if self.deactivated {
            return;
        }
        profile_function!();
        self.set_topology(Some(topology));
        self.commit_state_changes(false);
        self.device.draw(vertex_count, first_vertex);
    }

    pub(super) fn clear_buffers(&mut self, color: bool, depth: Option<f32>, stencil: Option<u8>) {
        if self.deactivated {
            return;
        }
        profile_scope!("clear_buffers");
        self.commit_state_changes(false);
        if color {
            self.device.clear_render_target(self.desired.clear_color);
            self.current.clear_color = self.desired.clear_color;
        }
        if depth.is_some() || stencil.is_some() {
            self.device.clear_depth_stencil(depth, stencil);
        }
    }
}

fn input_layout(
    shaders: &mut HandleTable<VertexShader>,
    device: &dyn NativeDevice,
    shader: Option<VertexShaderHandle>,
    formats: &StreamFormats,
) -> Option<NativeInputLayout> {
    let shader = shaders.get_mut(shader?)?;
    let VertexShader { entry, layouts } = shader;
    layouts.get_or_create(device, formats, entry.reflection(), entry.bytecode())
}
