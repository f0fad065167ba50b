//! Scans the track ahead of a train for things it must slow down or stop for.

use crate::route::Route;
use crate::section::Section;
use crate::station::{Station, StopState};
use crate::track::Event;
use crate::train::{StopSkipMode, Train, TrainState};
use crate::TrainSet;

/// Distances below this are too short to brake along a curve for, in m.
const MIN_CURVE_DISTANCE: f64 = 0.1; // m

/// Closest approach to a train ahead before braking is forced, in m.
const MIN_FOLLOW_DISTANCE: f64 = 10.0; // m

/// Trains ahead closer than this lower the braking thresholds, in m.
const MAX_FOLLOW_DISTANCE: f64 = 100.0; // m

/// Speed above which a longer cushion is kept before a stop signal, in m/s.
const FAST_APPROACH_SPEED: f64 = 35.0 / 3.6; // m/s

/// How the driver must react to a hazard.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Response {
    /// Brake along a curve needing this deceleration, in m/s^2.
    Curve(f64),
    /// Force the service brake and look again after 0.1 s.
    Service,
    /// Force the service and emergency brakes and look again after the given interval in s.
    Emergency(f64),
}

/// What the scan found.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Scan {
    Clear(Hazards),
    Intervene(Response),
}

/// The combined hazards ahead.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Hazards {
    /// The greatest deceleration any hazard needs, in m/s^2.
    pub dec: f64,
    /// Whether a hazard is close enough to lower the braking thresholds.
    pub reduce: bool,
    /// Distance to the nearest station stop ahead, in m.
    pub stop_distance: f64,
}

impl Hazards {
    fn add(&mut self, dec: f64) {
        self.dec = f64::max(self.dec, dec);
    }
}

/// What the scanner reads.
pub(crate) struct ScanInput<'a> {
    pub train: &'a Train,
    pub route: &'a Route,
    pub sections: &'a [Section],
    pub trains: &'a TrainSet,
    pub is_player: bool,
    pub speed_factor: f64,
    /// Deceleration used where a curve is too short, in m/s^2.
    pub brake_deceleration: f64,
}

/// How far ahead to look, given the cruise deceleration threshold.
pub(crate) fn horizon(at_station: bool, speed: f64, cruise: f64) -> f64 {
    let base = if at_station { 150.0 } else { 50.0 };
    base + speed * speed / (2.0 * cruise)
}

/// Deceleration to stop from `speed` within `dist`, or `fallback` when too close.
pub(crate) fn stopping_deceleration(speed: f64, dist: f64, fallback: f64) -> f64 {
    if dist > MIN_CURVE_DISTANCE {
        speed * speed / (2.0 * dist)
    } else if speed > 0.0 {
        fallback
    } else {
        0.0
    }
}

/// Deceleration needed to meet a lower limit at `dist` ahead.
pub(crate) fn limit_deceleration(speed: f64, limit: f64, speed_factor: f64, dist: f64) -> Option<f64> {
    if limit < speed && dist > MIN_CURVE_DISTANCE {
        Some((speed * speed - limit * limit * speed_factor) / (2.0 * dist))
    } else {
        None
    }
}

/// Response to a buffer stop `dist` ahead.
pub(crate) fn buffer_response(speed: f64, dist: f64) -> Response {
    if dist > 10.0 {
        Response::Curve(speed * speed / (2.0 * dist))
    } else if dist > 5.0 {
        Response::Service
    } else {
        Response::Emergency(10.0)
    }
}

/// Response to the rear of another train `dist` ahead.
pub(crate) fn train_response(speed: f64, dist: f64, fallback: f64) -> Response {
    if dist > MIN_FOLLOW_DISTANCE {
        let shift = 0.75 * MIN_FOLLOW_DISTANCE + speed;
        Response::Curve(stopping_deceleration(speed, dist - shift, fallback))
    } else if dist >= 0.5 * MIN_FOLLOW_DISTANCE {
        Response::Service
    } else {
        Response::Emergency(1.0)
    }
}

/// Scans ahead of the train, starting from an already required deceleration `dec`.
pub(crate) fn scan(input: &ScanInput, horizon: f64, dec: f64) -> Scan {
    let train = input.train;
    let tp = train.pos_front();
    let speed = train.vel();
    let mut hazards = Hazards {
        dec,
        reduce: false,
        stop_distance: next_stop_distance(input, horizon),
    };

    for (at, event) in input.route.track().events_ahead(tp, horizon) {
        let dist = at - tp;
        match *event {
            Event::LimitChange { next, .. } => {
                if let Some(edec) = limit_deceleration(speed, next, input.speed_factor, dist) {
                    hazards.add(edec);
                }
            }
            Event::SectionChange { next: Some(next), .. } if dist > 0.0 => {
                let Some(permitted) = input.sections.get(next).and_then(|s| s.visible_speed()) else {
                    continue;
                };
                let permitted = permitted * input.speed_factor;
                if permitted < speed || speed <= 0.0 {
                    signal_hazard(input, &mut hazards, permitted, dist);
                }
            }
            Event::StationStart { station } if train.station().is_none() => {
                match train.stop_skip() {
                    StopSkipMode::None => station_hazard(input, &mut hazards, station, false),
                    StopSkipMode::Decelerate => station_hazard(input, &mut hazards, station, true),
                    StopSkipMode::Linespeed => {}
                }
            }
            Event::StationEnd { station }
                if train.station().is_none() && train.stop_skip() == StopSkipMode::None =>
            {
                station_hazard(input, &mut hazards, station, false)
            }
            Event::TrackEnd if input.is_player => {
                hazards.add(if dist >= 15.0 {
                    speed * speed / (2.0 * dist)
                } else {
                    input.brake_deceleration
                });
            }
            _ => {}
        }
    }

    if input.is_player {
        for dist in input.route.buffers().iter().map(|b| b - tp).filter(|d| *d > 0.0) {
            match buffer_response(speed, dist) {
                Response::Curve(edec) => hazards.add(edec),
                response => return Scan::Intervene(response),
            }
        }
    }

    let others = input
        .trains
        .values()
        .filter(|t| t.id() != train.id() && t.state() == TrainState::Available);
    for other in others {
        let dist = other.pos_rear() - tp;
        if dist > -MIN_FOLLOW_DISTANCE && dist < horizon {
            match train_response(speed, dist, input.brake_deceleration) {
                Response::Curve(edec) => hazards.add(edec),
                response => return Scan::Intervene(response),
            }
            if dist < MAX_FOLLOW_DISTANCE {
                hazards.reduce = true;
            }
        }
    }

    Scan::Clear(hazards)
}

/// Adds the hazard of the stop point at the station the train is in, while it has yet
/// to stop there.
pub(crate) fn current_station(input: &ScanInput, hazards: &mut Hazards) {
    let train = input.train;
    if train.stop_state() != StopState::Pending || train.stop_skip() != StopSkipMode::None {
        return;
    }
    let Some(station) = train.station().and_then(|i| input.route.station(i)) else {
        return;
    };
    if !station.stops_train(input.is_player) {
        return;
    }
    let Some(stop) = station.stop_for(train.attributes().cars) else {
        return;
    };
    let dist = stop.position - train.pos_front();
    if dist > 0.0 {
        let dist = approach_distance(dist, input.speed_factor, &mut hazards.reduce);
        hazards.add(stopping_deceleration(train.vel(), dist, input.brake_deceleration));
    } else {
        hazards.add(input.brake_deceleration);
    }
}

/// The distance to plan a station stop over: a close stop lowers the braking
/// thresholds, a relaxed driver aims 5 m short of a far one.
fn approach_distance(dist: f64, speed_factor: f64, reduce: &mut bool) -> f64 {
    if dist < 25.0 {
        *reduce = true;
        dist
    } else if speed_factor < 1.0 {
        dist - 5.0
    } else {
        dist
    }
}

/// The stop point of a station ahead the train should stop at.
fn stop_ahead<'a>(input: &'a ScanInput, station: usize) -> Option<(&'a Station, f64, f64)> {
    let st = input.route.station(station)?;
    if !st.stops_train(input.is_player) || input.train.last_station() == Some(station) {
        return None;
    }
    let stop = st.stop_for(input.train.attributes().cars)?;
    Some((st, stop.position - input.train.pos_front(), stop.forward_tolerance))
}

fn next_stop_distance(input: &ScanInput, horizon: f64) -> f64 {
    if input.train.stop_skip() != StopSkipMode::None {
        return f64::INFINITY;
    }
    input
        .route
        .track()
        .events_ahead(input.train.pos_front(), horizon)
        .filter_map(|(_, ev)| match ev {
            Event::StationStart { station } => stop_ahead(input, *station),
            _ => None,
        })
        .map(|(_, dist, _)| dist)
        .filter(|dist| *dist > 0.0)
        .fold(f64::INFINITY, f64::min)
}

fn station_hazard(input: &ScanInput, hazards: &mut Hazards, station: usize, passing: bool) {
    let Some((_, dist, forward_tolerance)) = stop_ahead(input, station) else {
        return;
    };
    if dist <= -forward_tolerance {
        return;
    }
    let dist = approach_distance(dist, input.speed_factor, &mut hazards.reduce);
    if !passing || dist > 25.0 {
        hazards.add(stopping_deceleration(
            input.train.vel(),
            dist,
            input.brake_deceleration,
        ));
    }
}

fn signal_hazard(input: &ScanInput, hazards: &mut Hazards, permitted: f64, dist: f64) {
    let speed = input.train.vel();
    if permitted != 0.0 {
        if dist >= 1.0 {
            hazards.add((speed * speed - permitted * permitted) / (2.0 * dist));
        }
        return;
    }

    let train = input.train;
    let at_station = train.station().is_some();
    let (dist, cushion) = if at_station && train.stop_state() == StopState::Completed && dist < 120.0 {
        (1.0, 25.0)
    } else if (at_station && train.stop_state() == StopState::Pending) || hazards.stop_distance < dist {
        (dist, 1.0)
    } else if speed > FAST_APPROACH_SPEED {
        (dist, 55.0)
    } else {
        (dist, 35.0)
    };
    hazards.add(if dist > cushion {
        speed * speed / (2.0 * (dist - cushion))
    } else {
        input.brake_deceleration
    });
    if dist < 100.0 {
        hazards.reduce = true;
    }
}
