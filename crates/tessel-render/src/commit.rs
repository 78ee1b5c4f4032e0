//! Commit function registry and field-diff helpers.

use std::ops::Range;

use bitflags::bitflags;

/// A commit function: applies one slice of desired state to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitFunc {
    Viewports,
    VertexShader,
    GeometryShader,
    PixelShader,
    VertexBuffers,
    IndexBuffer,
    InputLayout,
    RasterizerState,
    DepthStencilState,
    BlendState,
    Topology,
}

bitflags! {
    /// One bit per [`CommitFunc`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CommitMask: u16 {
        const VIEWPORTS = 1 << 0;
        const VERTEX_SHADER = 1 << 1;
        const GEOMETRY_SHADER = 1 << 2;
        const PIXEL_SHADER = 1 << 3;
        const VERTEX_BUFFERS = 1 << 4;
        const INDEX_BUFFER = 1 << 5;
        const INPUT_LAYOUT = 1 << 6;
        const RASTERIZER_STATE = 1 << 7;
        const DEPTH_STENCIL_STATE = 1 << 8;
        const BLEND_STATE = 1 << 9;
        const TOPOLOGY = 1 << 10;
    }
}

impl CommitFunc {
    pub const ALL: [CommitFunc; 11] = [
        CommitFunc::Viewports,
        CommitFunc::VertexShader,
        CommitFunc::GeometryShader,
        CommitFunc::PixelShader,
        CommitFunc::VertexBuffers,
        CommitFunc::IndexBuffer,
        CommitFunc::InputLayout,
        CommitFunc::RasterizerState,
        CommitFunc::DepthStencilState,
        CommitFunc::BlendState,
        CommitFunc::Topology,
    ];

    pub fn mask(self) -> CommitMask {
        match self {
            CommitFunc::Viewports => CommitMask::VIEWPORTS,
            CommitFunc::VertexShader => CommitMask::VERTEX_SHADER,
            CommitFunc::GeometryShader => CommitMask::GEOMETRY_SHADER,
            CommitFunc::PixelShader => CommitMask::PIXEL_SHADER,
            CommitFunc::VertexBuffers => CommitMask::VERTEX_BUFFERS,
            CommitFunc::IndexBuffer => CommitMask::INDEX_BUFFER,
            CommitFunc::InputLayout => CommitMask::INPUT_LAYOUT,
            CommitFunc::RasterizerState => CommitMask::RASTERIZER_STATE,
            CommitFunc::DepthStencilState => CommitMask::DEPTH_STENCIL_STATE,
            CommitFunc::BlendState => CommitMask::BLEND_STATE,
            CommitFunc::Topology => CommitMask::TOPOLOGY,
        }
    }
}

/// Commit functions pending for the next commit, in registration order.
///
/// Each function is queued at most once per cycle.
#[derive(Debug, Default)]
pub struct CommitRegistry {
    mask: CommitMask,
    pending: Vec<CommitFunc>,
}

impl CommitRegistry {
    pub fn new() -> Self {
        Self {
            mask: CommitMask::empty(),
            pending: Vec::with_capacity(CommitFunc::ALL.len()),
        }
    }

    /// Queues `func`. Returns false if it was already queued.
    pub fn register(&mut self, func: CommitFunc) -> bool {
        if self.mask.contains(func.mask()) {
            return false;
        }
        self.mask.insert(func.mask());
        self.pending.push(func);
        true
    }

    pub fn is_registered(&self, func: CommitFunc) -> bool {
        self.mask.contains(func.mask())
    }

    pub fn pending(&self) -> &[CommitFunc] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes and returns every queued function, clearing the bitmap.
    pub fn take(&mut self) -> Vec<CommitFunc> {
        self.mask = CommitMask::empty();
        std::mem::take(&mut self.pending)
    }

    pub fn clear(&mut self) {
        self.mask = CommitMask::empty();
        self.pending.clear();
    }
}

/// Writes `value` into a desired-state field and queues `func` if it changed.
///
/// With `force_register` the function is queued even when the value is
/// unchanged. Returns whether the field changed.
pub fn update_desired<T: PartialEq>(
    slot: &mut T,
    value: T,
    registry: &mut CommitRegistry,
    func: CommitFunc,
    force_register: bool,
) -> bool {
    let changed = *slot != value;
    if changed {
        *slot = value;
    }
    if changed || force_register {
        registry.register(func);
    }
    changed
}

/// Applies `desired` through `apply` if it differs from `current` (or `force`),
/// then records it as current.
pub fn commit_field<T: PartialEq + Clone>(
    desired: &T,
    current: &mut T,
    force: bool,
    apply: impl FnOnce(&T),
) -> bool {
    if !force && desired == current {
        return false;
    }
    apply(desired);
    *current = desired.clone();
    true
}

/// Contiguous runs of indices where `desired` and `current` differ.
///
/// With `force` the whole slice is one run.
pub fn changed_ranges<T: PartialEq>(desired: &[T], current: &[T], force: bool) -> Vec<Range<usize>> {
    let len = desired.len().min(current.len());
    if force {
        return if len == 0 { Vec::new() } else { vec![0..len] };
    }

    let mut ranges = Vec::new();
    let mut start = None;
    for i in 0..len {
        match (desired[i] != current[i], start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                ranges.push(s..i);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        ranges.push(s..len);
    }
    ranges
}
