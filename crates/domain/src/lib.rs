//! Domain entities and repositories for MarineLink
//!
//! This crate owns the entities the command & presence core touches:
//! - Boats (one per owner)
//! - Devices and their protected keys
//! - Channels (logical outputs addressed by hardware pin)
//! - The Request Authenticator for device-originated requests

pub mod authenticator;
pub mod boats;
pub mod channels;
pub mod devices;
pub mod error;
pub mod model;

pub use authenticator::{AuthenticatedDevice, RequestAuthenticator};
pub use boats::BoatRepository;
pub use channels::ChannelRepository;
pub use devices::DeviceRegistry;
pub use error::{DomainError, Result};
pub use model::{
    Boat, BoatId, BoatStatus, Channel, ChannelCreate, ChannelId, ChannelType, DeviceCreate,
    DeviceCreated, DeviceId, DeviceSummary, KeyRotated, OwnerId, ToggleChannel,
};
