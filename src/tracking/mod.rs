//! Session and click tracking
//!
//! Tracking is best-effort: writes are awaited under a timeout and any
//! failure is logged and dropped so it never blocks a navigation.

pub mod device;
pub mod recorder;
pub mod session;

pub use device::detect_device_type;
pub use recorder::ClickTracker;
pub use session::{generate_session_id, is_session_id};
