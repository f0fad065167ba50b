pub use config::SimulationConfig;
pub use driver::{Autopilot, HumanDriver, PrecursorDriver, TriggerInput};
pub use error::RouteError;
pub use plugin::{AiResponse, Plugin, SignalData};
pub use route::{BogusInstruction, Route, RouteBuilder};
pub use section::{AspectKind, FreeSections, Section, SectionAspect};
pub use signalling::{SignalContext, Signalling, MAX_PLUGIN_SIGNALS};
pub use simulation::Simulation;
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use station::{DoorSides, Station, StationStop, StationType, StopMode, StopState};
pub use track::{Event, Track, TrackElement, TrackEvent};
pub use train::{
    Actuator, AirBrakeHandle, BrakeType, Command, ControlBuffer, Controls, DoorMode, Notch,
    StopSkipMode, Train, TrainAttributes, TrainState,
};
pub use util::Interval;

mod config;
mod debug;
mod driver;
mod error;
mod plugin;
mod route;
mod section;
mod signalling;
mod simulation;
mod station;
mod track;
mod train;
mod util;

new_key_type! {
    /// Unique ID of a [Train].
    pub struct TrainId;
}

/// The trains of a simulation, keyed by [TrainId].
pub type TrainSet = SlotMap<TrainId, Train>;
