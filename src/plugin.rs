//! The boundary to onboard train protection and driving plugins.

use crate::train::{Actuator, Train};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How soon a plugin that handled a decision pass wants to be asked again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AiResponse {
    /// The plugin did not drive; the built-in driver should.
    None,
    Short,
    Medium,
    Long,
}

impl AiResponse {
    /// The base and jitter span of the poll interval this response asks for, in s.
    pub(crate) fn interval(self) -> Option<(f64, f64)> {
        match self {
            AiResponse::None => None,
            AiResponse::Short => Some((0.2, 0.1)),
            AiResponse::Medium => Some((0.4, 0.2)),
            AiResponse::Long => Some((0.8, 0.4)),
        }
    }
}

/// The aspect of a signal ahead and the distance to it.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignalData {
    pub aspect: i32,
    /// Distance from the front of the train to the signal, in m.
    pub distance: f64,
}

/// A plugin installed on a train.
pub trait Plugin {
    /// Whether the plugin can drive the train.
    fn supports_ai(&self) -> bool {
        false
    }

    /// Asks the plugin to drive the train for one decision pass.
    fn update_ai(&mut self, _train: &Train, _controls: &mut dyn Actuator) -> AiResponse {
        AiResponse::None
    }

    /// Informs the plugin of the signals ahead, nearest first.
    fn update_signals(&mut self, _signals: &[SignalData]) {}

    /// The reverser position the plugin last asked for, if it ever did.
    fn last_reverser(&self) -> Option<i32> {
        None
    }
}
