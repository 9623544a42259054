//! Room lifecycle: creation on match, teardown on next or disconnect

pub mod manager;

pub use manager::RoomManager;
