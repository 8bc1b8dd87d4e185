pub mod catalog;
pub mod config;
pub mod drill;
pub mod logging;

pub use drill::{
    drill_engine, Direction, Dojo, Draw, DrillConfig, DrillEngine, DrillError, ItemId, LoadReport,
    ResetScope, Snapshot, WeightRecord,
};
