//! Vertex and index buffers with the append/discard lock protocol.
//!
//! Both buffer kinds share a [`BufferCore`] that tracks the write cursor and
//! decides how each lock maps the native buffer:
//!
//! | append | room | pending flush | dynamic | map |
//! |---|---|---|---|---|
//! | yes | yes | no | any | no-overwrite, or discard at offset 0 |
//! | yes | no, or pending flush | | | fail |
//! | no | yes | no | yes | no-overwrite, or discard at offset 0 |
//! | no | otherwise | | | discard, cursor reset to 0 |

use std::fmt;

use tessel_core::profiling::profile_function;
use tessel_test_utils::{BufferDesc, MapMode, NativeBuffer, NativeDevice, NativeError};

use crate::vertex_format::VertexFormat;

/// Why a lock failed. The write cursor is never moved by a failed lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The buffer handle is stale or was never issued.
    InvalidHandle,
    AlreadyLocked,
    /// No element format is bound to the buffer yet.
    FormatUnknown,
    /// The device is deactivated; writes are dropped until it returns.
    DeviceDeactivated,
    /// Zero elements were requested.
    EmptyLock,
    /// More elements were requested than the buffer holds.
    TooManyElements { requested: u32, capacity: u32 },
    /// An append lock did not fit after the cursor, or followed a flush.
    NoRoom,
    /// The native buffer could not be re-allocated.
    AllocationFailed(NativeError),
    MapFailed(NativeError),
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHandle => write!(f, "Invalid or stale buffer handle"),
            Self::AlreadyLocked => write!(f, "Buffer is already locked"),
            Self::FormatUnknown => write!(f, "Buffer has no element format bound"),
            Self::DeviceDeactivated => write!(f, "Device is deactivated"),
            Self::EmptyLock => write!(f, "Requested a lock of zero elements"),
            Self::TooManyElements {
                requested,
                capacity,
            } => write!(
                f,
                "Too many elements for buffer ({} > {})",
                requested, capacity
            ),
            Self::NoRoom => write!(f, "Not enough room to append"),
            Self::AllocationFailed(e) => write!(f, "Buffer allocation failed: {}", e),
            Self::MapFailed(e) => write!(f, "Buffer map failed: {}", e),
        }
    }
}

impl std::error::Error for LockError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum BufferKind {
    Vertex,
    Index,
}

/// The byte range mapped by a successful lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRegion {
    pub byte_offset: u64,
    pub byte_len: u64,
    pub element_count: u32,
    pub mode: MapMode,
}

/// Where a locked region sits, as seen by draw calls.
///
/// With stream offset support the stream is bound at `byte_offset` and
/// `first_element` is 0; otherwise `first_element` indexes from the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockDesc {
    pub first_element: u32,
    pub byte_offset: u32,
    pub stride: u32,
    pub element_count: u32,
    pub mode: MapMode,
}

impl LockDesc {
    pub(crate) fn new(region: &LockRegion, stride: u32, stream_offset: bool) -> Self {
        let offset = region.byte_offset as u32;
        let (first_element, byte_offset) = if stream_offset || stride == 0 {
            (0, offset)
        } else {
            (offset / stride, 0)
        };
        Self {
            first_element,
            byte_offset,
            stride,
            element_count: region.element_count,
            mode: region.mode,
        }
    }
}

/// A snapshot of a buffer's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStatus {
    pub native: Option<NativeBuffer>,
    pub byte_size: u64,
    pub first_unwritten_offset: u64,
    pub element_size: Option<u32>,
    pub dynamic: bool,
    pub locked: bool,
    pub pending_flush: bool,
}

/// Lock bookkeeping shared by vertex and index buffers.
pub(crate) struct BufferCore {
    kind: BufferKind,
    native: Option<NativeBuffer>,
    byte_size: u64,
    element_size: Option<u32>,
    first_unwritten: u64,
    dynamic: bool,
    pending_flush: bool,
    locked: Option<LockRegion>,
}

impl BufferCore {
    pub(crate) fn new(kind: BufferKind, byte_size: u64, element_size: Option<u32>, dynamic: bool) -> Self {
        Self {
            kind,
            native: None,
            byte_size,
            element_size: element_size.filter(|size| *size > 0),
            first_unwritten: 0,
            dynamic,
            pending_flush: false,
            locked: None,
        }
    }

    /// Creates the native buffer.
    pub(crate) fn allocate(&mut self, device: &dyn NativeDevice) -> Result<NativeBuffer, NativeError> {
        let desc = match self.kind {
            BufferKind::Vertex => BufferDesc::vertex(None, self.byte_size, self.dynamic),
            BufferKind::Index => BufferDesc::index(None, self.byte_size, self.dynamic),
        };
        let native = device.create_buffer(&desc)?;
        tracing::debug!(
            "Allocated {:?} buffer {:?} ({} bytes, dynamic: {})",
            self.kind,
            native,
            self.byte_size,
            self.dynamic
        );
        self.native = Some(native);
        self.first_unwritten = 0;
        self.pending_flush = false;
        Ok(native)
    }

    /// Releases the native buffer. The next lock re-allocates it.
    pub(crate) fn release_native(&mut self, device: &dyn NativeDevice) {
        if let Some(native) = self.native.take() {
            device.release_buffer(native);
        }
        self.first_unwritten = 0;
        self.locked = None;
    }

    pub(crate) fn native(&self) -> Option<NativeBuffer> {
        self.native
    }

    pub(crate) fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.locked.is_some()
    }

    pub(crate) fn element_size(&self) -> Option<u32> {
        self.element_size
    }

    /// Capacity in elements, or in bytes while the format is unknown.
    pub(crate) fn capacity(&self) -> u32 {
        match self.element_size {
            Some(size) => (self.byte_size / size as u64) as u32,
            None => self.byte_size as u32,
        }
    }

    /// Whole elements that still fit after the write cursor.
    pub(crate) fn room_remaining(&self) -> u32 {
        let bytes = self.byte_size.saturating_sub(self.first_unwritten);
        match self.element_size {
            Some(size) => (bytes / size as u64) as u32,
            None => bytes as u32,
        }
    }

    pub(crate) fn set_element_size(&mut self, size: Option<u32>, stream_offset: bool) {
        self.element_size = size.filter(|size| *size > 0);
        if let Some(size) = self.element_size
            && !stream_offset
        {
            // Without stream offsets the cursor must land on an element boundary.
            let size = size as u64;
            self.first_unwritten = self.first_unwritten.div_ceil(size) * size;
        }
    }

    /// Marks the next lock of a dynamic buffer as a discard.
    pub(crate) fn flush(&mut self) {
        self.pending_flush = self.dynamic;
    }

    pub(crate) fn lock(
        &mut self,
        device: &dyn NativeDevice,
        max_elements: u32,
        append: bool,
        deactivated: bool,
    ) -> Result<LockRegion, LockError> {
        profile_function!();

        if self.locked.is_some() {
            return Err(LockError::AlreadyLocked);
        }
        let element_size = self.element_size.ok_or(LockError::FormatUnknown)?;
        if deactivated {
            return Err(LockError::DeviceDeactivated);
        }
        if max_elements == 0 {
            return Err(LockError::EmptyLock);
        }
        let capacity = self.capacity();
        if max_elements > capacity {
            tracing::warn!(
                "Too many elements for {:?} buffer ({} > {})",
                self.kind,
                max_elements,
                capacity
            );
            return Err(LockError::TooManyElements {
                requested: max_elements,
                capacity,
            });
        }

        let native = match self.native {
            Some(native) => native,
            None => self.allocate(device).map_err(LockError::AllocationFailed)?,
        };

        let byte_len = max_elements as u64 * element_size as u64;
        let has_room = self.first_unwritten + byte_len <= self.byte_size;
        let cursor_mode = if self.first_unwritten == 0 {
            MapMode::Discard
        } else {
            MapMode::NoOverwrite
        };

        let (byte_offset, mode, reset) = if append {
            if !has_room || self.pending_flush {
                return Err(LockError::NoRoom);
            }
            (self.first_unwritten, cursor_mode, false)
        } else if has_room && !self.pending_flush && self.dynamic {
            (self.first_unwritten, cursor_mode, false)
        } else {
            (0, MapMode::Discard, true)
        };

        if let Err(e) = device.map_buffer(native, byte_offset, byte_len, mode) {
            tracing::warn!("Failed to map {:?} buffer {:?}: {}", self.kind, native, e);
            return Err(LockError::MapFailed(e));
        }

        if reset {
            self.first_unwritten = 0;
            self.pending_flush = false;
        }
        let region = LockRegion {
            byte_offset,
            byte_len,
            element_count: max_elements,
            mode,
        };
        tracing::trace!("Locked {:?} buffer {:?}: {:?}", self.kind, native, region);
        self.locked = Some(region);
        Ok(region)
    }

    /// Hands the written bytes to the device and advances the cursor.
    ///
    /// Does nothing if the buffer is not locked.
    pub(crate) fn unlock(&mut self, device: &dyn NativeDevice, data: &[u8], written_elements: u32) {
        let Some(region) = self.locked.take() else {
            return;
        };
        let Some(native) = self.native else {
            return;
        };
        let element_size = self.element_size.unwrap_or(1) as u64;
        let written = written_elements.min(region.element_count) as u64 * element_size;
        let len = (written as usize).min(data.len());
        device.unmap_buffer(native, region.byte_offset, &data[..len]);
        self.first_unwritten = region.byte_offset + written;
    }

    pub(crate) fn status(&self) -> BufferStatus {
        BufferStatus {
            native: self.native,
            byte_size: self.byte_size,
            first_unwritten_offset: self.first_unwritten,
            element_size: self.element_size,
            dynamic: self.dynamic,
            locked: self.locked.is_some(),
            pending_flush: self.pending_flush,
        }
    }
}

/// A vertex buffer resource.
pub struct VertexBuffer {
    pub(crate) core: BufferCore,
    format: Option<VertexFormat>,
    casting: bool,
}

impl VertexBuffer {
    /// `count` is in vertices, or in bytes when `format` is `None`.
    pub(crate) fn new(format: Option<VertexFormat>, count: u32, dynamic: bool) -> Self {
        let size = format.map(|f| f.vertex_size()).filter(|size| *size > 0);
        let byte_size = count as u64 * size.unwrap_or(1) as u64;
        Self {
            core: BufferCore::new(BufferKind::Vertex, byte_size, size, dynamic),
            format: format.filter(|f| !f.is_empty()),
            casting: false,
        }
    }

    pub fn format(&self) -> Option<VertexFormat> {
        self.format
    }

    pub fn stride(&self) -> u32 {
        self.core.element_size().unwrap_or(0)
    }

    /// Temporarily views an unknown-format buffer as `format`.
    pub(crate) fn begin_cast(&mut self, format: VertexFormat, stream_offset: bool) -> bool {
        if (self.format.is_some() && !self.casting) || format.is_empty() {
            tracing::warn!("begin_cast requires a buffer created without a vertex format");
            return false;
        }
        self.format = Some(format);
        self.casting = true;
        self.core.set_element_size(Some(format.vertex_size()), stream_offset);
        true
    }

    pub(crate) fn end_cast(&mut self) {
        if self.casting {
            self.format = None;
            self.casting = false;
            self.core.set_element_size(None, true);
        }
    }
}

/// An index buffer resource.
pub struct IndexBuffer {
    pub(crate) core: BufferCore,
    format: Option<wgpu::IndexFormat>,
    casting: bool,
}

impl IndexBuffer {
    /// `count` is in indices, or in bytes when `format` is `None`.
    pub(crate) fn new(format: Option<wgpu::IndexFormat>, count: u32, dynamic: bool) -> Self {
        let size = format.map(index_size);
        let byte_size = count as u64 * size.unwrap_or(1) as u64;
        Self {
            core: BufferCore::new(BufferKind::Index, byte_size, size, dynamic),
            format,
            casting: false,
        }
    }

    pub fn format(&self) -> Option<wgpu::IndexFormat> {
        self.format
    }

    pub(crate) fn begin_cast(&mut self, format: wgpu::IndexFormat, stream_offset: bool) -> bool {
        if self.format.is_some() && !self.casting {
            tracing::warn!("begin_cast requires a buffer created without an index format");
            return false;
        }
        self.format = Some(format);
        self.casting = true;
        self.core.set_element_size(Some(index_size(format)), stream_offset);
        true
    }

    pub(crate) fn end_cast(&mut self) {
        if self.casting {
            self.format = None;
            self.casting = false;
            self.core.set_element_size(None, true);
        }
    }
}

/// Size in bytes of one index.
pub fn index_size(format: wgpu::IndexFormat) -> u32 {
    match format {
        wgpu::IndexFormat::Uint16 => 2,
        wgpu::IndexFormat::Uint32 => 4,
    }
}
