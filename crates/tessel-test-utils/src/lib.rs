//! Native device seam and test utilities for Tessel.
//!
//! The shader API never talks to a graphics driver directly. Everything it
//! needs from the driver goes through the object-safe [`NativeDevice`] trait
//! and adapter enumeration goes through [`AdapterSource`].
//!
//! - [`NativeDevice`] / [`AdapterSource`] - the native API surface
//! - native object ids and descriptors (`NativeBuffer`, `RasterizerDesc`, ...)
//! - `MockNativeDevice` - a recording implementation (requires `mock` feature)
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "mock")]
//! # {
//! use tessel_test_utils::{BufferDesc, MockNativeDevice, NativeCall, NativeDevice};
//!
//! let mock = MockNativeDevice::new();
//! let buffer = mock
//!     .create_buffer(&BufferDesc::vertex(Some("verts"), 1024, false))
//!     .unwrap();
//! mock.set_primitive_topology(wgpu::PrimitiveTopology::TriangleList);
//!
//! assert_eq!(mock.count(|call| matches!(call, NativeCall::CreateBuffer { .. })), 1);
//! assert!(mock.is_live_buffer(buffer));
//! # }
//! ```
//!
//! # Design
//!
//! Native objects are plain ids owned by the device implementation, so the
//! engine can store them in snapshots and caches without lifetimes. Methods
//! take `&self`; the mock uses a `parking_lot::Mutex` for interior mutability.

#[cfg(feature = "mock")]
pub mod mock_device;
pub mod native_device;
pub mod native_types;

#[cfg(feature = "mock")]
pub use mock_device::*;
pub use native_device::*;
pub use native_types::*;
