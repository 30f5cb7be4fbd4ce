//! Quota allocation logic and state management.

mod backend;
mod cell;
mod dedup;
mod definition;
mod engine;
mod key;
mod tick;
mod window;

pub use backend::QuotaBackend;
pub use cell::CellStore;
pub use dedup::DedupCache;
pub use definition::{LabelType, LabelValue, Labels, QuotaDefinition, QuotaRequest};
pub use engine::MemQuota;
pub use key::make_key;
pub use tick::{ManualTicks, SystemTicks, TickSource};
pub use window::{window_ticks, RollingWindow, NANOS_PER_TICK, TICKS_PER_SECOND};
