//! Cisco IOS device support.
//!
//! - [`ios`] holds the CLI output parsers and the change command builder.
//! - [`IosDeviceAdapter`] captures a device into a [`DeviceState`](crate::state::DeviceState).
//! - [`IosChangeApplier`] pushes an access-VLAN change.
//!
//! Both work over any [`SessionFactory`](crate::connection::SessionFactory).

pub mod adapter;
pub mod applier;
pub mod ios;

pub use adapter::IosDeviceAdapter;
pub use applier::IosChangeApplier;
