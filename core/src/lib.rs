//! Core of the pothole map monitor.
//!
//! The modules cover decoding of the push feed, the view-state store, the sync
//! controller that reconciles push notifications with endpoint reads, and the
//! pure scene builder consumed by the visualizer.

pub mod channel;
pub mod config;
pub mod prelude;
pub mod records;
pub mod render;
pub mod store;
pub mod sync;
pub mod telemetry;

pub use prelude::{SyncError, SyncResult};

pub use channel::{ChannelEvent, PushChannel, Signal};
pub use config::MonitorConfig;
pub use records::{GeoPosition, LiveDetector, PointRecord};
pub use render::{render_scene, MapScene, Marker, MarkerKind};
pub use store::PositionStore;
pub use sync::{SyncController, SyncEffect};
