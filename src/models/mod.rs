mod fallback;
mod link;
mod prelander;
mod tracking;

pub use fallback::{FallbackCandidate, NewFallbackCandidate, UpdateFallbackCandidate};
pub use link::{NewTargetLink, TargetLink, UpdateTargetLink};
pub use prelander::{NewLead, PrelanderConfig, PrelanderInput, PrelanderLead};
pub use tracking::{ClickEvent, DeviceType, NewClickEvent, SessionRecord, SessionVisit};
