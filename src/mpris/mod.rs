//! MPRIS player access over the D-Bus session bus.

pub mod connection;
pub mod events;
pub mod metadata;
pub mod playback;

pub use events::{MprisEventCallback, MprisEventHandler, PlayerSnapshot};
pub use metadata::TrackMetadata;
pub use playback::{MprisSource, PlaybackStatus};
