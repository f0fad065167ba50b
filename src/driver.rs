pub use self::human::HumanDriver;
pub use self::precursor::PrecursorDriver;
pub(crate) use self::governor::update_stop_state;
use crate::plugin::Plugin;
use crate::route::Route;
use crate::section::Section;
use crate::train::{Actuator, Train};
use crate::{TrainId, TrainSet};

mod envelope;
mod governor;
mod human;
mod lookahead;
mod precursor;

/// The world as a driver sees it when it is triggered.
#[derive(Clone, Copy)]
pub struct TriggerInput<'a> {
    /// The train being driven.
    pub train: &'a Train,
    pub route: &'a Route,
    /// The live state of the signalling sections.
    pub sections: &'a [Section],
    pub trains: &'a TrainSet,
    /// Seconds since midnight.
    pub clock: f64,
    pub player: Option<TrainId>,
}

impl TriggerInput<'_> {
    /// Whether the train being driven is the player's.
    pub fn is_player(&self) -> bool {
        self.player == Some(self.train.id())
    }
}

/// Something that drives a train.
pub trait Autopilot {
    /// Called once per frame. The driver decides whether a decision pass is due,
    /// and issues its commands through `controls`.
    fn trigger(
        &mut self,
        input: &TriggerInput,
        plugin: Option<&mut dyn Plugin>,
        controls: &mut dyn Actuator,
    );
}
