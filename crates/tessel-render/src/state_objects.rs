//! Cache of immutable rasterizer, depth-stencil and blend state objects.
//!
//! Creating native state objects is expensive, so objects are shared between
//! every bind of an identical descriptor.

use ahash::AHashMap;
use tessel_core::profiling::profile_function;
use tessel_test_utils::{
    BlendDesc, DepthStencilDesc, NativeBlendState, NativeDepthStencilState, NativeDevice,
    NativeRasterizerState, NativeStateObject, RasterizerDesc,
};

#[derive(Default)]
pub struct StateObjectCache {
    rasterizer: AHashMap<RasterizerDesc, NativeRasterizerState>,
    depth_stencil: AHashMap<DepthStencilDesc, NativeDepthStencilState>,
    blend: AHashMap<BlendDesc, NativeBlendState>,
}

impl StateObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rasterizer(
        &mut self,
        device: &dyn NativeDevice,
        desc: &RasterizerDesc,
    ) -> Option<NativeRasterizerState> {
        if let Some(state) = self.rasterizer.get(desc) {
            return Some(*state);
        }
        profile_function!();
        match device.create_rasterizer_state(desc) {
            Ok(state) => {
                self.rasterizer.insert(*desc, state);
                Some(state)
            }
            Err(e) => {
                tracing::warn!("Failed to create rasterizer state: {}", e);
                None
            }
        }
    }

    pub fn depth_stencil(
        &mut self,
        device: &dyn NativeDevice,
        desc: &DepthStencilDesc,
    ) -> Option<NativeDepthStencilState> {
        if let Some(state) = self.depth_stencil.get(desc) {
            return Some(*state);
        }
        profile_function!();
        match device.create_depth_stencil_state(desc) {
            Ok(state) => {
                self.depth_stencil.insert(*desc, state);
                Some(state)
            }
            Err(e) => {
                tracing::warn!("Failed to create depth-stencil state: {}", e);
                None
            }
        }
    }

    pub fn blend(&mut self, device: &dyn NativeDevice, desc: &BlendDesc) -> Option<NativeBlendState> {
        if let Some(state) = self.blend.get(desc) {
            return Some(*state);
        }
        profile_function!();
        match device.create_blend_state(desc) {
            Ok(state) => {
                self.blend.insert(*desc, state);
                Some(state)
            }
            Err(e) => {
                tracing::warn!("Failed to create blend state: {}", e);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rasterizer.len() + self.depth_stencil.len() + self.blend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases every cached object.
    pub fn release_all(&mut self, device: &dyn NativeDevice) {
        for (_, state) in self.rasterizer.drain() {
            device.release_state_object(NativeStateObject::Rasterizer(state));
        }
        for (_, state) in self.depth_stencil.drain() {
            device.release_state_object(NativeStateObject::DepthStencil(state));
        }
        for (_, state) in self.blend.drain() {
            device.release_state_object(NativeStateObject::Blend(state));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_test_utils::{MockNativeDevice, NativeCall};

    #[test]
    fn test_state_objects_are_shared() {
        let mock = MockNativeDevice::new();
        let mut cache = StateObjectCache::new();

        let a = cache.rasterizer(&mock, &RasterizerDesc::default());
        let b = cache.rasterizer(&mock, &RasterizerDesc::default());
        let c = cache.rasterizer(&mock, &RasterizerDesc::default().with_cull_mode(None));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(mock.count(|call| matches!(call, NativeCall::CreateRasterizerState { .. })), 2);
    }

    #[test]
    fn test_release_all() {
        let mock = MockNativeDevice::new();
        let mut cache = StateObjectCache::new();
        cache.rasterizer(&mock, &RasterizerDesc::default());
        cache.depth_stencil(&mock, &DepthStencilDesc::default());
        cache.blend(&mock, &BlendDesc::default());
        assert_eq!(cache.len(), 3);

        cache.release_all(&mock);
        assert!(cache.is_empty());
        assert_eq!(mock.live_object_count(), 0);
    }

    #[test]
    fn test_creation_failure_not_cached() {
        let mock = MockNativeDevice::new();
        let mut cache = StateObjectCache::new();
        mock.fail_next_state_object();
        assert!(cache.blend(&mock, &BlendDesc::default()).is_none());
        assert!(cache.blend(&mock, &BlendDesc::default()).is_some());
    }
}
