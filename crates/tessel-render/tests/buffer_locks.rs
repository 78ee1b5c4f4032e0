//! Buffer lock modes, write cursors and device deactivation.

mod common;

use common::setup;
use tessel_render::{LockError, SharedShaderApi, VertexBufferHandle, VertexFlags, VertexFormat};
use tessel_test_utils::{MapMode, MockNativeDevice, NativeBuffer, NativeCall, NativeError, mock_bytecode};
use wgpu::PrimitiveTopology;

const POSITION_SIZE: u64 = 12;

fn dynamic_positions(api: &SharedShaderApi, count: u32) -> VertexBufferHandle {
    api.create_vertex_buffer(Some(VertexFormat::position()), count, true)
        .unwrap()
}

fn cursor(api: &SharedShaderApi, buffer: VertexBufferHandle) -> u64 {
    api.vertex_buffer_status(buffer).unwrap().first_unwritten_offset
}

fn map_modes(mock: &MockNativeDevice) -> Vec<(u64, MapMode)> {
    mock.calls()
        .into_iter()
        .filter_map(|c| match c {
            NativeCall::MapBuffer { offset, mode, .. } => Some((offset, mode)),
            _ => None,
        })
        .collect()
}

/// Native buffers bound at `stream`, in call order.
fn stream_binds(mock: &MockNativeDevice, stream: u32) -> Vec<Option<NativeBuffer>> {
    mock.calls()
        .into_iter()
        .filter_map(|c| match c {
            NativeCall::SetVertexBuffers { start_slot, bindings } if start_slot <= stream => bindings
                .get((stream - start_slot) as usize)
                .map(|binding| binding.buffer),
            _ => None,
        })
        .collect()
}

#[test]
fn test_append_locks_advance_monotonically() {
    let (mock, api) = setup();
    let buffer = dynamic_positions(&api, 64);
    mock.clear_calls();

    let writes = [4u32, 7, 1, 10, 3];
    let mut expected = 0;
    for k in writes {
        let guard = api.lock_vertex_buffer(buffer, k, true).unwrap();
        assert_eq!(guard.desc().byte_offset as u64, expected);
        assert_eq!(guard.desc().element_count, k);
        guard.unlock(k);

        expected += k as u64 * POSITION_SIZE;
        assert_eq!(cursor(&api, buffer), expected);
    }

    let modes = map_modes(&mock);
    assert_eq!(modes.len(), writes.len());
    assert_eq!(modes[0], (0, MapMode::Discard));
    assert!(modes[1..].iter().all(|(_, mode)| *mode == MapMode::NoOverwrite));
    assert_eq!(api.vertex_buffer_room(buffer), Some(64 - 25));
}

#[test]
fn test_lock_without_room_wraps_to_start() {
    let (mock, api) = setup();
    let buffer = dynamic_positions(&api, 10);

    api.lock_vertex_buffer(buffer, 6, true).unwrap().unlock(6);
    assert_eq!(cursor(&api, buffer), 6 * POSITION_SIZE);
    mock.clear_calls();

    let guard = api.lock_vertex_buffer(buffer, 6, false).unwrap();
    assert_eq!(guard.desc().byte_offset, 0);
    assert_eq!(guard.desc().mode, MapMode::Discard);
    guard.unlock(6);

    assert_eq!(map_modes(&mock), vec![(0, MapMode::Discard)]);
    assert_eq!(cursor(&api, buffer), 6 * POSITION_SIZE);
}

#[test]
fn test_append_without_room_fails() {
    let (_mock, api) = setup();
    let buffer = dynamic_positions(&api, 10);
    api.lock_vertex_buffer(buffer, 6, true).unwrap().unlock(6);

    let result = api.lock_vertex_buffer(buffer, 6, true);
    assert_eq!(result.err(), Some(LockError::NoRoom));
    assert_eq!(cursor(&api, buffer), 6 * POSITION_SIZE);
}

#[test]
fn test_flush_forces_discard() {
    let (mock, api) = setup();
    let buffer = dynamic_positions(&api, 32);
    api.lock_vertex_buffer(buffer, 4, true).unwrap().unlock(4);
    api.flush_vertex_buffer(buffer);
    assert!(api.vertex_buffer_status(buffer).unwrap().pending_flush);

    assert_eq!(api.lock_vertex_buffer(buffer, 4, true).err(), Some(LockError::NoRoom));

    mock.clear_calls();
    api.lock_vertex_buffer(buffer, 4, false).unwrap().unlock(2);
    assert_eq!(map_modes(&mock), vec![(0, MapMode::Discard)]);

    let status = api.vertex_buffer_status(buffer).unwrap();
    assert!(!status.pending_flush);
    assert_eq!(status.first_unwritten_offset, 2 * POSITION_SIZE);
}

#[test]
fn test_static_buffer_relocks_discard() {
    let (mock, api) = setup();
    let buffer = api
        .create_vertex_buffer(Some(VertexFormat::position()), 32, false)
        .unwrap();
    api.lock_vertex_buffer(buffer, 4, false).unwrap().unlock(4);
    api.flush_vertex_buffer(buffer);
    assert!(!api.vertex_buffer_status(buffer).unwrap().pending_flush);
    mock.clear_calls();

    api.lock_vertex_buffer(buffer, 4, false).unwrap().unlock(4);
    assert_eq!(map_modes(&mock), vec![(0, MapMode::Discard)]);
}

#[test]
fn test_guard_writes_reach_the_device() {
    let (mock, api) = setup();
    let buffer = dynamic_positions(&api, 8);
    let native = api.vertex_buffer_status(buffer).unwrap().native.unwrap();

    let positions = [[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
    let mut guard = api.lock_vertex_buffer(buffer, 2, true).unwrap();
    assert_eq!(guard.data_mut().len(), 24);
    assert_eq!(guard.write(&positions), 24);
    guard.unlock(2);

    let contents = mock.buffer_contents(native).unwrap();
    assert_eq!(&contents[..24], bytemuck::cast_slice::<_, u8>(&positions));
}

#[test]
fn test_dropped_guard_writes_nothing() {
    let (mock, api) = setup();
    let buffer = dynamic_positions(&api, 8);
    api.lock_vertex_buffer(buffer, 2, true).unwrap().unlock(2);
    mock.clear_calls();

    {
        let mut guard = api.lock_vertex_buffer(buffer, 2, true).unwrap();
        guard.write(&[[9.0f32; 3]; 2]);
    }

    assert_eq!(mock.count(|c| matches!(c, NativeCall::UnmapBuffer { len: 0, .. })), 1);
    assert_eq!(cursor(&api, buffer), 2 * POSITION_SIZE);
    assert!(!api.vertex_buffer_status(buffer).unwrap().locked);
}

#[test]
fn test_lock_validation_errors() {
    let (mock, api) = setup();
    let buffer = dynamic_positions(&api, 16);

    assert_eq!(api.lock_vertex_buffer(buffer, 0, false).err(), Some(LockError::EmptyLock));
    assert_eq!(
        api.lock_vertex_buffer(buffer, 17, false).err(),
        Some(LockError::TooManyElements {
            requested: 17,
            capacity: 16
        })
    );

    mock.fail_next_map();
    assert_eq!(
        api.lock_vertex_buffer(buffer, 4, false).err(),
        Some(LockError::MapFailed(NativeError::MapFailed))
    );
    assert_eq!(cursor(&api, buffer), 0);
    assert!(!api.vertex_buffer_status(buffer).unwrap().locked);

    api.destroy_vertex_buffer(buffer).unwrap();
    assert_eq!(api.lock_vertex_buffer(buffer, 1, false).err(), Some(LockError::InvalidHandle));
    assert_eq!(
        api.lock_vertex_buffer(api.fallback_vertex_buffer(), 1, false).err(),
        Some(LockError::InvalidHandle)
    );
}

#[test]
fn test_cast_unknown_format_buffer() {
    let (_mock, api) = setup();
    let buffer = api.create_vertex_buffer(None, 256, true).unwrap();

    assert_eq!(api.lock_vertex_buffer(buffer, 4, false).err(), Some(LockError::FormatUnknown));

    assert!(api.begin_cast_vertex_buffer(buffer, VertexFormat::position()));
    assert_eq!(api.vertex_buffer_room(buffer), Some(256 / 12));
    {
        let guard = api.lock_vertex_buffer(buffer, 21, false).unwrap();
        assert_eq!(guard.desc().stride, 12);
        guard.unlock(21);
    }
    api.end_cast_vertex_buffer(buffer);

    assert_eq!(api.lock_vertex_buffer(buffer, 4, false).err(), Some(LockError::FormatUnknown));

    let typed = dynamic_positions(&api, 4);
    assert!(!api.begin_cast_vertex_buffer(typed, VertexFormat::position()));
}

#[test]
fn test_element_offsets_without_stream_offset_support() {
    let (_mock, api) = setup();
    api.override_stream_offset_support(true, false);
    let buffer = dynamic_positions(&api, 32);
    api.lock_vertex_buffer(buffer, 5, true).unwrap().unlock(5);

    {
        let guard = api.lock_vertex_buffer(buffer, 3, true).unwrap();
        assert_eq!(guard.desc().first_element, 5);
        assert_eq!(guard.desc().byte_offset, 0);
    }

    api.override_stream_offset_support(false, false);
    let guard = api.lock_vertex_buffer(buffer, 3, true).unwrap();
    assert_eq!(guard.desc().first_element, 0);
    assert_eq!(guard.desc().byte_offset, 5 * 12);
}

#[test]
fn test_index_buffer_locks() {
    let (mock, api) = setup();
    let buffer = api
        .create_index_buffer(Some(wgpu::IndexFormat::Uint16), 100, true)
        .unwrap();
    let native = api.index_buffer_status(buffer).unwrap().native.unwrap();

    let indices: Vec<u16> = (0..30).collect();
    let mut guard = api.lock_index_buffer(buffer, 30, true).unwrap();
    assert_eq!(guard.desc().stride, 2);
    guard.write(&indices);
    guard.unlock(30);

    assert_eq!(api.index_buffer_status(buffer).unwrap().first_unwritten_offset, 60);
    assert_eq!(api.index_buffer_room(buffer), Some(70));
    assert_eq!(
        &mock.buffer_contents(native).unwrap()[..60],
        bytemuck::cast_slice::<_, u8>(&indices)
    );

    api.flush_index_buffer(buffer);
    let guard = api.lock_index_buffer(buffer, 10, false).unwrap();
    assert_eq!(guard.desc().byte_offset, 0);
    assert_eq!(guard.desc().mode, MapMode::Discard);
}

#[test]
fn test_release_dynamic_resources_reallocates_lazily() {
    let (mock, api) = setup();
    let dynamic = dynamic_positions(&api, 16);
    let fixed = api
        .create_vertex_buffer(Some(VertexFormat::position()), 16, false)
        .unwrap();
    api.lock_vertex_buffer(dynamic, 4, true).unwrap().unlock(4);

    api.release_dynamic_resources();

    let status = api.vertex_buffer_status(dynamic).unwrap();
    assert_eq!(status.native, None);
    assert_eq!(status.first_unwritten_offset, 0);
    assert!(api.vertex_buffer_status(fixed).unwrap().native.is_some());

    mock.clear_calls();
    api.lock_vertex_buffer(dynamic, 4, true).unwrap().unlock(4);
    assert_eq!(mock.count(|c| matches!(c, NativeCall::CreateBuffer { dynamic: true, .. })), 1);
    assert!(api.vertex_buffer_status(dynamic).unwrap().native.is_some());
}

#[test]
fn test_release_dynamic_resources_rebinds_reallocated_buffers() {
    let (mock, api) = setup();
    let vertices = dynamic_positions(&api, 16);
    let indices = api
        .create_index_buffer(Some(wgpu::IndexFormat::Uint16), 16, true)
        .unwrap();
    api.lock_vertex_buffer(vertices, 3, true).unwrap().unlock(3);
    api.lock_index_buffer(indices, 3, true).unwrap().unlock(3);
    api.bind_vertex_buffer(0, Some(vertices), 0).unwrap();
    api.bind_index_buffer(Some(indices), 0).unwrap();
    api.draw(PrimitiveTopology::TriangleList, 0, 3);

    let old_vertices = api.vertex_buffer_status(vertices).unwrap().native.unwrap();
    let old_indices = api.index_buffer_status(indices).unwrap().native.unwrap();
    mock.clear_calls();

    api.release_dynamic_resources();

    let unbind_vertices = mock
        .position(|c| match c {
            NativeCall::SetVertexBuffers { start_slot: 0, bindings } => bindings[0].buffer.is_none(),
            _ => false,
        })
        .unwrap();
    let release_vertices = mock
        .position(|c| matches!(c, NativeCall::ReleaseBuffer { buffer } if *buffer == old_vertices))
        .unwrap();
    assert!(unbind_vertices < release_vertices);

    let unbind_indices = mock
        .position(|c| matches!(c, NativeCall::SetIndexBuffer { buffer: None, .. }))
        .unwrap();
    let release_indices = mock
        .position(|c| matches!(c, NativeCall::ReleaseBuffer { buffer } if *buffer == old_indices))
        .unwrap();
    assert!(unbind_indices < release_indices);

    api.lock_vertex_buffer(vertices, 3, true).unwrap().unlock(3);
    api.lock_index_buffer(indices, 3, true).unwrap().unlock(3);
    let new_vertices = api.vertex_buffer_status(vertices).unwrap().native.unwrap();
    let new_indices = api.index_buffer_status(indices).unwrap().native.unwrap();
    assert_ne!(new_vertices, old_vertices);
    assert_ne!(new_indices, old_indices);
    mock.clear_calls();

    api.draw(PrimitiveTopology::TriangleList, 0, 3);

    assert_eq!(stream_binds(&mock, 0), vec![Some(new_vertices)]);
    assert_eq!(
        mock.count(|c| matches!(c, NativeCall::SetIndexBuffer { buffer: Some(b), .. } if *b == new_indices)),
        1
    );
}

#[test]
fn test_draw_before_reallocation_rebinds_after_lock() {
    let (mock, api) = setup();
    let vertices = dynamic_positions(&api, 16);
    api.bind_vertex_buffer(0, Some(vertices), 0).unwrap();
    api.draw_vertices(PrimitiveTopology::TriangleList, 0, 3);
    api.release_dynamic_resources();
    mock.clear_calls();

    // Nothing to bind until the buffer is locked again.
    api.draw_vertices(PrimitiveTopology::TriangleList, 0, 3);
    assert_eq!(stream_binds(&mock, 0), vec![None]);

    api.lock_vertex_buffer(vertices, 3, true).unwrap().unlock(3);
    let native = api.vertex_buffer_status(vertices).unwrap().native.unwrap();
    mock.clear_calls();

    api.draw_vertices(PrimitiveTopology::TriangleList, 0, 3);
    api.draw_vertices(PrimitiveTopology::TriangleList, 0, 3);
    assert_eq!(stream_binds(&mock, 0), vec![Some(native)]);
}

#[test]
fn test_cast_refreshes_bound_streams() {
    let (mock, api) = setup();
    let buffer = api.create_vertex_buffer(None, 240, true).unwrap();
    assert!(api.begin_cast_vertex_buffer(buffer, VertexFormat::position()));
    api.bind_vertex_buffer(0, Some(buffer), 0).unwrap();
    assert_eq!(api.desired_state().vertex_buffers[0].stride, 12);
    assert_eq!(api.desired_state().input_layout.formats[0], Some(VertexFormat::position()));

    api.end_cast_vertex_buffer(buffer);
    let desired = api.desired_state();
    assert_eq!(desired.vertex_buffers[0].buffer, Some(buffer));
    assert_eq!(desired.vertex_buffers[0].stride, 0);
    assert_eq!(desired.input_layout.formats[0], None);

    let lit = VertexFormat::new(VertexFlags::POSITION | VertexFlags::NORMAL);
    assert!(api.begin_cast_vertex_buffer(buffer, lit));
    assert_eq!(api.desired_state().vertex_buffers[0].stride, 24);
    assert_eq!(api.desired_state().input_layout.formats[0], Some(lit));

    mock.clear_calls();
    api.draw_vertices(PrimitiveTopology::TriangleList, 0, 3);
    let strides: Vec<u32> = mock
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            NativeCall::SetVertexBuffers { start_slot: 0, bindings } => Some(bindings[0].stride),
            _ => None,
        })
        .collect();
    assert_eq!(strides, vec![24]);

    let indices = api.create_index_buffer(None, 64, true).unwrap();
    api.bind_index_buffer(Some(indices), 0).unwrap();
    assert_eq!(api.desired_state().index_buffer.format, wgpu::IndexFormat::Uint16);
    assert!(api.begin_cast_index_buffer(indices, wgpu::IndexFormat::Uint32));
    assert_eq!(api.desired_state().index_buffer.format, wgpu::IndexFormat::Uint32);
}

#[test]
fn test_guard_reports_status_while_locked() {
    let (_mock, api) = setup();
    let buffer = dynamic_positions(&api, 16);
    api.lock_vertex_buffer(buffer, 4, true).unwrap().unlock(4);

    let guard = api.lock_vertex_buffer(buffer, 2, true).unwrap();
    assert!(guard.status().unwrap().locked);
    assert_eq!(guard.room_remaining(), Some(12));
    guard.unlock(2);
    assert_eq!(api.vertex_buffer_room(buffer), Some(10));

    let indices = api
        .create_index_buffer(Some(wgpu::IndexFormat::Uint16), 8, true)
        .unwrap();
    let guard = api.lock_index_buffer(indices, 8, false).unwrap();
    assert!(guard.status().unwrap().locked);
    assert_eq!(guard.room_remaining(), Some(8));
}

#[test]
fn test_deactivated_device_drops_locks_and_commits() {
    let (mock, api) = setup();
    let buffer = dynamic_positions(&api, 16);
    api.lock_vertex_buffer(buffer, 4, true).unwrap().unlock(4);
    let shader = api.create_vertex_shader(&mock_bytecode(&["POSITION"])).unwrap();

    api.set_deactivated(true);
    assert!(api.is_deactivated());
    mock.clear_calls();

    assert_eq!(
        api.lock_vertex_buffer(buffer, 4, true).err(),
        Some(LockError::DeviceDeactivated)
    );
    assert_eq!(cursor(&api, buffer), 4 * POSITION_SIZE);

    api.bind_vertex_shader(Some(shader)).unwrap();
    api.commit_state_changes(false);
    api.draw_vertices(PrimitiveTopology::TriangleList, 0, 3);
    api.clear_buffers(true, None, None);
    assert_eq!(mock.call_count(), 0);
    assert!(!api.pending_commits().is_empty());

    api.set_deactivated(false);
    assert!(!api.is_deactivated());
    assert_eq!(mock.count(|c| matches!(c, NativeCall::ReleaseStateObject { .. })), 3);
    assert!(api.pending_commits().is_empty());
    assert!(api.lock_vertex_buffer(buffer, 4, true).is_ok());
}
