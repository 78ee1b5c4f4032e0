//! RAII guards for locked vertex and index buffers.
//!
//! A guard holds the shader API lock for as long as the buffer is mapped, so
//! no other call can observe or disturb the buffer mid-write. Writes go to a
//! CPU staging area that is handed to the device on unlock.

use bytemuck::Pod;
use parking_lot::lock_api::{MutexGuard, RawMutex};

use super::state::ShaderApiState;
use crate::buffer::{BufferStatus, LockDesc};
use crate::handles::{IndexBufferHandle, VertexBufferHandle};

fn write_pod<T: Pod>(staging: &mut [u8], elements: &[T]) -> usize {
    let bytes = bytemuck::cast_slice::<T, u8>(elements);
    let len = bytes.len().min(staging.len());
    staging[..len].copy_from_slice(&bytes[..len]);
    len
}

/// A locked vertex buffer. Dropping it unlocks with nothing written.
///
/// The guard holds the engine lock. Calling back into the same shader API
/// while it is alive deadlocks on a shared engine and panics on a local one;
/// query the buffer through [`status`](Self::status) and
/// [`room_remaining`](Self::room_remaining) instead.
pub struct VertexBufferLock<'a, R: RawMutex> {
    state: MutexGuard<'a, R, ShaderApiState>,
    buffer: VertexBufferHandle,
    desc: LockDesc,
    staging: Vec<u8>,
    written: u32,
}

impl<'a, R: RawMutex> VertexBufferLock<'a, R> {
    pub(super) fn new(state: MutexGuard<'a, R, ShaderApiState>, buffer: VertexBufferHandle, desc: LockDesc) -> Self {
        Self {
            state,
            buffer,
            staging: vec![0; (desc.stride * desc.element_count) as usize],
            desc,
            written: 0,
        }
    }

    pub fn desc(&self) -> &LockDesc {
        &self.desc
    }

    pub fn buffer(&self) -> VertexBufferHandle {
        self.buffer
    }

    /// Status of the locked buffer, read through the held lock.
    pub fn status(&self) -> Option<BufferStatus> {
        self.state.vertex_buffer_status(self.buffer)
    }

    /// Vertices that fit after the write cursor, not counting this lock.
    pub fn room_remaining(&self) -> Option<u32> {
        self.state
            .vertex_buffers
            .get(self.buffer)
            .map(|entry| entry.core.room_remaining())
    }

    /// The writable region, `stride * element_count` bytes.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.staging
    }

    /// Copies `vertices` to the start of the region.
    ///
    /// Returns the number of bytes copied; excess input is ignored.
    pub fn write<T: Pod>(&mut self, vertices: &[T]) -> usize {
        write_pod(&mut self.staging, vertices)
    }

    /// Unlocks, committing the first `written` vertices.
    pub fn unlock(mut self, written: u32) {
        self.written = written;
    }
}

impl<R: RawMutex> Drop for VertexBufferLock<'_, R> {
    fn drop(&mut self) {
        self.state
            .unlock_vertex_buffer(self.buffer, &self.staging, self.written);
    }
}

/// A locked index buffer. Dropping it unlocks with nothing written.
///
/// Holds the engine lock like [`VertexBufferLock`].
pub struct IndexBufferLock<'a, R: RawMutex> {
    state: MutexGuard<'a, R, ShaderApiState>,
    buffer: IndexBufferHandle,
    desc: LockDesc,
    staging: Vec<u8>,
    written: u32,
}

impl<'a, R: RawMutex> IndexBufferLock<'a, R> {
    pub(super) fn new(state: MutexGuard<'a, R, ShaderApiState>, buffer: IndexBufferHandle, desc: LockDesc) -> Self {
        Self {
            state,
            buffer,
            staging: vec![0; (desc.stride * desc.element_count) as usize],
            desc,
            written: 0,
        }
    }

    pub fn desc(&self) -> &LockDesc {
        &self.desc
    }

    pub fn buffer(&self) -> IndexBufferHandle {
        self.buffer
    }

    pub fn status(&self) -> Option<BufferStatus> {
        self.state.index_buffer_status(self.buffer)
    }

    pub fn room_remaining(&self) -> Option<u32> {
        self.state
            .index_buffers
            .get(self.buffer)
            .map(|entry| entry.core.room_remaining())
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.staging
    }

    /// Copies `indices` to the start of the region.
    pub fn write<T: Pod>(&mut self, indices: &[T]) -> usize {
        write_pod(&mut self.staging, indices)
    }

    pub fn unlock(mut self, written: u32) {
        self.written = written;
    }
}

impl<R: RawMutex> Drop for IndexBufferLock<'_, R> {
    fn drop(&mut self) {
        self.state
            .unlock_index_buffer(self.buffer, &self.staging, self.written);
    }
}
