use super::envelope::{Envelope, PollInterval, Region, SolveInput, SpeedBands, Thresholds};
use super::governor::{hold_terminal, Governor, StopView};
use super::lookahead::{current_station, horizon, scan, Response, Scan, ScanInput};
use super::{Autopilot, TriggerInput};
use crate::debug::debug_decision;
use crate::plugin::Plugin;
use crate::station::{Station, StopState};
use crate::train::{Actuator, AirBrakeHandle, Train};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};

/// Schedule error beyond which the speed factor is corrected in proportion, in s.
const LARGE_ERROR: f64 = 30.0; // s

/// Speed factor correction per second of error beyond [LARGE_ERROR].
const LARGE_CORRECTION: f64 = 0.0025; // 1/s

/// Schedule error within which the speed factor returns to the driver's personality, in s.
const SMALL_ERROR: f64 = 15.0; // s

/// Step by which the speed factor returns to the driver's personality.
const SMALL_CORRECTION: f64 = 0.05;

const MIN_SPEED_FACTOR: f64 = 0.7;
const MAX_SPEED_FACTOR: f64 = 1.1;

/// The AI speed limit is exceeded by up to this factor.
const SPEED_LIMIT_MARGIN: f64 = 1.2;

/// An AI driver that drives a train along the route: obeying signals and limits,
/// stopping at stations and keeping to the timetable by adjusting how fast it likes to run.
#[derive(Clone, Debug)]
pub struct HumanDriver {
    rng: StdRng,
    interval: PollInterval,
    /// The clock at the last decision pass.
    last_processed: f64,
    envelope: Envelope,
    /// Fraction of the speed limit the driver currently aims for.
    speed_factor: f64,
    /// The fraction the driver settles back to when on time.
    personality: f64,
    /// The station at which the speed factor was last corrected.
    last_station: Option<usize>,
    /// The route's AI speed limit in m/s.
    speed_limit: f64,
    governor: Governor,
}

impl HumanDriver {
    /// Creates a driver for a train, with a random personality drawn from `seed`.
    ///
    /// # Parameters
    /// * `train` - The train to be driven
    /// * `speed_limit` - The AI speed limit of the route in m/s
    /// * `seed` - Seed of the driver's random number generator
    pub fn new(train: &Train, speed_limit: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let personality = Uniform::new(0.90, 1.00).sample(&mut rng);
        let last_station = train
            .station()
            .filter(|_| train.stop_state() == StopState::Boarding);
        Self {
            rng,
            interval: PollInterval::new(1.0),
            last_processed: 0.0,
            envelope: Envelope::new(train.attributes()),
            speed_factor: personality,
            personality,
            last_station,
            speed_limit,
            governor: Governor::default(),
        }
    }

    /// Replaces the driver's personality speed factor.
    pub fn with_personality(mut self, factor: f64) -> Self {
        self.personality = factor;
        self.speed_factor = factor;
        self
    }

    /// The fraction of the speed limit the driver currently aims for.
    pub fn speed_factor(&self) -> f64 {
        self.speed_factor
    }

    /// The time until the next decision pass is due, measured from the last, in s.
    pub fn interval(&self) -> f64 {
        self.interval.get()
    }

    fn perform_default(
        &mut self,
        input: &TriggerInput,
        neutral_reverser: bool,
        controls: &mut dyn Actuator,
    ) {
        let train = input.train;
        if train.derailed() {
            if !controls.controls().emergency {
                controls.apply_emergency_brake();
            }
            return;
        }
        self.drift(input);

        controls.apply_const_speed(false);
        controls.apply_hold_brake(false);
        let view = StopView {
            train,
            station: train.station().and_then(|i| input.route.station(i)),
            clock: input.clock,
            is_player: input.is_player(),
            neutral_reverser,
        };

        let branch = if train.section_limit() == 0.0 {
            debug!("passed a signal at stop");
            controls.apply_emergency_brake();
            controls.apply_notch(-1, 1);
            self.interval.set(0.5);
            "stop signal"
        } else if train.doors().any() || train.stop_state() == StopState::Boarding {
            self.envelope.slip_ceiling = train.attributes().max_power_notch + 1;
            self.governor
                .board(&view, &mut self.rng, &mut self.interval, controls);
            "board"
        } else if view.ready_to_open() {
            self.governor
                .arrive(&view, &mut self.rng, &mut self.interval, controls);
            "arrive"
        } else if view.at_terminal() {
            hold_terminal(&view, &mut self.interval, controls);
            "terminal"
        } else {
            return self.drive(input, controls);
        };
        debug_decision(train.id(), branch, 0.0, self.interval.get());
    }

    /// Corrects the speed factor once per station, by how far off schedule the train arrived.
    fn drift(&mut self, input: &TriggerInput) {
        let train = input.train;
        if train.stop_state() != StopState::Boarding {
            return;
        }
        let Some(idx) = train.station() else {
            return;
        };
        if self.last_station == Some(idx) {
            return;
        }
        self.last_station = Some(idx);
        let scheduled = input
            .route
            .station(idx)
            .and_then(|s| scheduled_arrival(s, train.timetable_delta(), input.clock));
        if let Some(time) = scheduled {
            let factor = adjust_speed_factor(self.speed_factor, self.personality, input.clock - time);
            if factor != self.speed_factor {
                debug!("speed factor {:.3} -> {:.3}", self.speed_factor, factor);
            }
            self.speed_factor = factor;
        }
    }

    fn drive(&mut self, input: &TriggerInput, controls: &mut dyn Actuator) {
        let train = input.train;
        let attrs = train.attributes();
        controls.apply_reverser(1);

        let power = controls.controls().power.driver;
        if train.wheel_slip() && power > 1 {
            debug!("wheel slip at power notch {}", power);
            self.envelope.slip_ceiling = power;
            controls.apply_notch(-1, -1);
            controls.apply_air_brake(AirBrakeHandle::Release);
            self.interval.set(2.5);
            debug_decision(train.id(), "wheel slip", 0.0, self.interval.get());
            return;
        }

        let speed = train.vel();
        let limit = (self.speed_limit * SPEED_LIMIT_MARGIN)
            .min(train.route_limit())
            .min(train.section_limit());
        let bands = SpeedBands::new(limit, speed, self.speed_factor, self.envelope.brake_mode);
        let brake_deceleration = train.planning_deceleration();
        let mut thresholds = Thresholds::new(attrs, brake_deceleration, self.speed_factor);
        let dec = bands.overspeed_deceleration(speed, thresholds.step);

        let scan_input = ScanInput {
            train,
            route: input.route,
            sections: input.sections,
            trains: input.trains,
            is_player: input.is_player(),
            speed_factor: self.speed_factor,
            brake_deceleration,
        };
        let horizon = horizon(train.station().is_some(), speed, thresholds.cruise);
        let mut hazards = match scan(&scan_input, horizon, dec) {
            Scan::Clear(hazards) => hazards,
            Scan::Intervene(response) => {
                self.intervene(response, controls);
                debug_decision(train.id(), "intervene", f64::INFINITY, self.interval.get());
                return;
            }
        };
        controls.release_emergency_brake();
        current_station(&scan_input, &mut hazards);
        if hazards.reduce {
            thresholds.reduce();
        }

        let solve = SolveInput {
            dec: hazards.dec,
            acc: train.acc(),
            speed,
            bands,
            thresholds,
        };
        let region = self
            .envelope
            .solve(&solve, attrs, &mut self.interval, controls);
        let branch = match region {
            Region::Brake => "brake",
            Region::Cut => "cut",
            Region::Power => "power",
        };
        debug_decision(train.id(), branch, hazards.dec, self.interval.get());
    }

    /// Forces the brakes on for a hazard too close to brake for smoothly.
    fn intervene(&mut self, response: Response, controls: &mut dyn Actuator) {
        controls.apply_notch(-1, 1);
        controls.apply_air_brake(AirBrakeHandle::Service);
        match response {
            Response::Service => self.interval.set(0.1),
            Response::Emergency(secs) => {
                debug!("emergency stop");
                controls.apply_emergency_brake();
                self.interval.set(secs);
            }
            Response::Curve(_) => {}
        }
    }
}

impl Autopilot for HumanDriver {
    fn trigger(
        &mut self,
        input: &TriggerInput,
        plugin: Option<&mut dyn Plugin>,
        controls: &mut dyn Actuator,
    ) {
        let clock = input.clock;
        if self.last_processed > clock {
            self.last_processed = clock;
            return;
        }
        let elapsed = clock - self.last_processed;
        if elapsed < self.interval.get() {
            return;
        }
        self.governor.elapse(elapsed);
        self.last_processed = clock;

        let neutral_reverser = plugin
            .as_ref()
            .map_or(true, |p| p.last_reverser().is_none());
        if let Some(plugin) = plugin.filter(|p| p.supports_ai()) {
            if let Some((base, jitter)) = plugin.update_ai(input.train, controls).interval() {
                self.interval.set(base + jitter * self.rng.gen::<f64>());
                return;
            }
        }
        if input.train.stop_state() == StopState::Jumping {
            return;
        }
        self.perform_default(input, neutral_reverser, controls);
    }
}

/// The time the train was due at a station, if the timetable says.
/// A station with only a departure time gives the latest arrival that still allows
/// the minimum dwell, or nothing if the train is early for it.
fn scheduled_arrival(station: &Station, delta: f64, clock: f64) -> Option<f64> {
    if let Some(arrival) = station.arrival_time {
        return Some(arrival - delta);
    }
    let mut time = station.departure_time? - delta;
    if time > clock {
        time -= station.stop_time;
        if time > clock {
            return None;
        }
    }
    Some(time)
}

/// The speed factor after arriving `diff` seconds late (negative when early).
fn adjust_speed_factor(current: f64, personality: f64, diff: f64) -> f64 {
    if diff < -LARGE_ERROR {
        f64::max(current - LARGE_CORRECTION * (-diff - LARGE_ERROR), MIN_SPEED_FACTOR)
    } else if diff > LARGE_ERROR {
        f64::min(current + LARGE_CORRECTION * (diff - LARGE_ERROR), MAX_SPEED_FACTOR)
    } else if diff.abs() < SMALL_ERROR {
        if current < personality {
            f64::min(current + SMALL_CORRECTION, personality)
        } else {
            f64::max(current - SMALL_CORRECTION, personality)
        }
    } else {
        current
    }
}
