//! Stations, their stop points and the per-train stop state.

use crate::util::Interval;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The kind of station.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StationType {
    #[default]
    Normal,
    /// The train reverses here.
    ChangeEnds,
    /// The end of the line.
    Terminal,
}

/// Which trains stop at a station.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StopMode {
    #[default]
    AllStop,
    AllPass,
    /// Only the player train stops.
    PlayerStop,
    /// Only the player train passes.
    PlayerPass,
}

/// How far a train is through its stop at the current station.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StopState {
    #[default]
    Pending,
    Boarding,
    Completed,
    /// The train is being relocated to another station.
    Jumping,
}

/// The sides of the train on which doors open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DoorSides {
    pub left: bool,
    pub right: bool,
}

impl DoorSides {
    /// Whether any side is set.
    pub fn any(&self) -> bool {
        self.left || self.right
    }
}

/// A stop point within a station.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StationStop {
    /// The track position of the stop point in m.
    pub position: f64,
    /// How far beyond the stop point the front of the train may come to rest, in m.
    pub forward_tolerance: f64,
    /// How far short of the stop point the front of the train may come to rest, in m.
    pub backward_tolerance: f64,
    /// The number of cars this stop point is meant for, or zero for any train.
    pub cars: usize,
}

impl StationStop {
    /// The range of front positions that count as stopped at this stop point.
    pub fn window(&self) -> Interval {
        Interval::around(self.position, self.backward_tolerance, self.forward_tolerance)
    }
}

/// A station on the route.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Station {
    pub name: String,
    /// Scheduled arrival time in seconds since midnight.
    pub arrival_time: Option<f64>,
    /// Scheduled departure time in seconds since midnight.
    pub departure_time: Option<f64>,
    /// Minimum dwell time in s.
    pub stop_time: f64,
    pub doors: DoorSides,
    pub kind: StationType,
    pub stop_mode: StopMode,
    pub stops: Vec<StationStop>,
}

impl Station {
    /// Whether a train (the player's, or an AI train) is scheduled to stop here.
    pub fn stops_train(&self, is_player: bool) -> bool {
        match self.stop_mode {
            StopMode::AllStop => true,
            StopMode::AllPass => false,
            StopMode::PlayerStop => is_player,
            StopMode::PlayerPass => !is_player,
        }
    }

    /// The index of the stop point for a train of `cars` cars: the first one meant for
    /// any train or for at least as many cars, falling back to the last.
    pub fn stop_index(&self, cars: usize) -> Option<usize> {
        self.stops
            .iter()
            .position(|stop| stop.cars == 0 || cars <= stop.cars)
            .or_else(|| self.stops.len().checked_sub(1))
    }

    /// The stop point for a train of `cars` cars.
    pub fn stop_for(&self, cars: usize) -> Option<&StationStop> {
        self.stop_index(cars).map(|idx| &self.stops[idx])
    }

    /// Whether this is a normal station. Terminal and change-ends stations hold the player
    /// train and its departure signal.
    pub fn is_normal(&self) -> bool {
        self.kind == StationType::Normal
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn stop(position: f64, cars: usize) -> StationStop {
        StationStop {
            position,
            forward_tolerance: 5.0,
            backward_tolerance: 5.0,
            cars,
        }
    }

    #[test]
    fn stop_index_selection() {
        let station = Station {
            stops: vec![stop(100.0, 4), stop(120.0, 6), stop(140.0, 8)],
            ..Default::default()
        };
        assert_eq!(station.stop_index(3), Some(0));
        assert_eq!(station.stop_index(5), Some(1));
        assert_eq!(station.stop_index(8), Some(2));
        assert_eq!(station.stop_index(10), Some(2));
        assert_eq!(Station::default().stop_index(3), None);
    }

    #[test]
    fn stop_modes() {
        let mut station = Station::default();
        assert!(station.stops_train(false));
        station.stop_mode = StopMode::PlayerStop;
        assert!(station.stops_train(true));
        assert!(!station.stops_train(false));
        station.stop_mode = StopMode::PlayerPass;
        assert!(!station.stops_train(true));
        assert!(station.stops_train(false));
    }

    #[test]
    fn change_ends_is_not_normal() {
        let mut station = Station::default();
        assert!(station.is_normal());
        station.kind = StationType::ChangeEnds;
        assert!(!station.is_normal());
        station.kind = StationType::Terminal;
        assert!(!station.is_normal());
    }
}
