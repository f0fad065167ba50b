pub use self::controls::{
    Actuator, AirBrakeHandle, BrakeType, Command, ControlBuffer, Controls, Notch,
};
use crate::station::{DoorSides, StopState};
use crate::TrainId;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod controls;

/// Speed below which a train counts as stopped for door operation, in m/s.
pub(crate) const DOOR_SPEED_LIMIT: f64 = 0.25;

/// Rate at which brake cylinder pressure follows its target, in Pa/s.
const PRESSURE_RATE: f64 = 300_000.0;

/// Lifecycle state of a train.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TrainState {
    /// Not yet introduced into the world.
    Pending,
    /// Running normally.
    #[default]
    Available,
    /// A placeholder train replaying a recorded schedule.
    Bogus,
    Disposed,
}

/// Who operates the doors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DoorMode {
    #[default]
    SemiAutomatic,
    /// The doors are operated by the train itself.
    Automatic,
    Manual,
}

/// How the train treats its next scheduled stop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StopSkipMode {
    #[default]
    None,
    /// Slow down through the station without stopping.
    Decelerate,
    /// Run through the station at line speed.
    Linespeed,
}

/// The attributes of a simulated train.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrainAttributes {
    /// The number of cars.
    pub cars: usize,
    /// The overall length in m.
    pub length: f64,
    pub max_power_notch: i32,
    pub max_brake_notch: i32,
    pub brake_type: BrakeType,
    /// The nominal service brake deceleration in m/s^2.
    pub brake_deceleration: f64,
    /// The deceleration of the motors when braking, in m/s^2, or zero if there is none.
    pub motor_deceleration: f64,
    /// The emergency brake deceleration in m/s^2.
    pub emergency_deceleration: f64,
    /// The acceleration at full power in m/s^2.
    pub max_acceleration: f64,
    /// Brake cylinder pressure at full service braking, in Pa.
    pub service_pressure: f64,
    /// Brake cylinder pressure at emergency braking, in Pa.
    pub emergency_pressure: f64,
    pub has_hold_brake: bool,
    pub has_const_speed: bool,
    /// Power and brake share one handle.
    pub single_handle: bool,
    pub door_open_mode: DoorMode,
    pub door_close_mode: DoorMode,
}

impl Default for TrainAttributes {
    fn default() -> Self {
        Self {
            cars: 4,
            length: 80.0,
            max_power_notch: 4,
            max_brake_notch: 7,
            brake_type: BrakeType::default(),
            brake_deceleration: 1.0,
            motor_deceleration: 0.0,
            emergency_deceleration: 1.4,
            max_acceleration: 0.8,
            service_pressure: 440_000.0,
            emergency_pressure: 480_000.0,
            has_hold_brake: false,
            has_const_speed: false,
            single_handle: false,
            door_open_mode: DoorMode::default(),
            door_close_mode: DoorMode::default(),
        }
    }
}

/// A simulated train.
#[derive(Clone, Debug)]
pub struct Train {
    id: TrainId,
    attrs: TrainAttributes,
    state: TrainState,
    /// Track position of the front of the train in m.
    pos: f64,
    /// Speed in m/s.
    vel: f64,
    /// Acceleration measured over the last step, in m/s^2.
    acc: f64,
    controls: Controls,
    /// Brake cylinder pressure in Pa.
    pressure: f64,
    /// Which door sides are open.
    doors: DoorSides,
    wheel_slip: bool,
    derailed: bool,
    skip: StopSkipMode,
    /// How far behind schedule the train is meant to run, in s.
    timetable_delta: f64,
    /// The station whose platform zone the front of the train is in.
    pub(crate) zone: Option<usize>,
    /// The station the train is calling at, which is `None` while passing through.
    pub(crate) station: Option<usize>,
    pub(crate) stop_state: StopState,
    pub(crate) last_station: Option<usize>,
    /// Time the train arrived at its current station.
    pub(crate) arrival_time: f64,
    /// Time the train may depart from its current station.
    pub(crate) departure_time: f64,
    pub(crate) current_section: Option<usize>,
    /// Limit of the section the train is in, in m/s.
    pub(crate) section_limit: f64,
    /// Limit of the route at the front of the train, in m/s.
    pub(crate) route_limit: f64,
}

impl Train {
    /// Creates a new train, stopped at the given front position.
    pub(crate) fn new(id: TrainId, attributes: &TrainAttributes, pos: f64) -> Self {
        Self {
            id,
            attrs: *attributes,
            state: TrainState::Available,
            pos,
            vel: 0.0,
            acc: 0.0,
            controls: Controls::default(),
            pressure: 0.0,
            doors: DoorSides::default(),
            wheel_slip: false,
            derailed: false,
            skip: StopSkipMode::None,
            timetable_delta: 0.0,
            zone: None,
            station: None,
            stop_state: StopState::Pending,
            last_station: None,
            arrival_time: 0.0,
            departure_time: 0.0,
            current_section: None,
            section_limit: f64::INFINITY,
            route_limit: f64::INFINITY,
        }
    }

    /// Gets the train's ID.
    pub fn id(&self) -> TrainId {
        self.id
    }

    pub fn attributes(&self) -> &TrainAttributes {
        &self.attrs
    }

    pub fn state(&self) -> TrainState {
        self.state
    }

    /// Whether the train takes part in occupancy and signalling.
    pub fn is_present(&self) -> bool {
        matches!(self.state, TrainState::Available | TrainState::Bogus)
    }

    /// The track position of the front of the train in m.
    pub fn pos_front(&self) -> f64 {
        self.pos
    }

    /// The track position of the rear of the train in m.
    pub fn pos_rear(&self) -> f64 {
        self.pos - self.attrs.length
    }

    /// The speed in m/s.
    pub fn vel(&self) -> f64 {
        self.vel
    }

    /// The acceleration in m/s^2.
    pub fn acc(&self) -> f64 {
        self.acc
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    /// Brake cylinder pressure in Pa.
    pub fn brake_pressure(&self) -> f64 {
        self.pressure
    }

    pub fn doors(&self) -> DoorSides {
        self.doors
    }

    pub fn wheel_slip(&self) -> bool {
        self.wheel_slip
    }

    pub fn derailed(&self) -> bool {
        self.derailed
    }

    pub fn stop_skip(&self) -> StopSkipMode {
        self.skip
    }

    pub fn timetable_delta(&self) -> f64 {
        self.timetable_delta
    }

    /// The station the train is calling at, once its front is in the platform zone.
    /// A train skipping the station is not calling at it.
    pub fn station(&self) -> Option<usize> {
        self.station
    }

    pub fn stop_state(&self) -> StopState {
        self.stop_state
    }

    /// The station whose platform zone the front of the train is in.
    pub fn zone(&self) -> Option<usize> {
        self.zone
    }

    /// The station the train most recently entered.
    pub fn last_station(&self) -> Option<usize> {
        self.last_station
    }

    /// The time at which the train may leave its current station.
    pub fn departure_time(&self) -> f64 {
        self.departure_time
    }

    /// The signalling section the front of the train is in.
    pub fn current_section(&self) -> Option<usize> {
        self.current_section
    }

    /// The speed limit of the current section, in m/s.
    pub fn section_limit(&self) -> f64 {
        self.section_limit
    }

    /// The route speed limit at the front of the train, in m/s.
    pub fn route_limit(&self) -> f64 {
        self.route_limit
    }

    /// The brake deceleration the driver plans with: the motor deceleration if the train
    /// has one weaker than the service brake, else the service brake deceleration.
    pub fn planning_deceleration(&self) -> f64 {
        let motor = self.attrs.motor_deceleration;
        if motor != 0.0 && motor < self.attrs.brake_deceleration {
            motor
        } else {
            self.attrs.brake_deceleration
        }
    }

    pub fn set_state(&mut self, state: TrainState) {
        self.state = state;
    }

    pub fn set_vel(&mut self, vel: f64) {
        self.vel = vel;
    }

    pub fn set_wheel_slip(&mut self, slip: bool) {
        self.wheel_slip = slip;
    }

    pub fn set_brake_pressure(&mut self, pressure: f64) {
        self.pressure = pressure;
    }

    pub fn set_derailed(&mut self, derailed: bool) {
        self.derailed = derailed;
    }

    pub fn set_stop_skip(&mut self, skip: StopSkipMode) {
        self.skip = skip;
    }

    pub fn set_timetable_delta(&mut self, delta: f64) {
        self.timetable_delta = delta;
    }

    pub fn set_stop_state(&mut self, state: StopState) {
        self.stop_state = state;
    }

    /// Applies queued commands to the train.
    pub(crate) fn execute(&mut self, commands: &[Command]) {
        for command in commands {
            match *command {
                Command::OpenDoors(sides) => {
                    self.doors.left |= sides.left;
                    self.doors.right |= sides.right;
                }
                Command::CloseDoors(sides) => {
                    self.doors.left &= !sides.left;
                    self.doors.right &= !sides.right;
                }
                Command::Relocate(pos) => self.pos = pos,
                Command::Dispose => self.state = TrainState::Disposed,
                _ => self.controls.apply(command, &self.attrs),
            }
        }
    }

    /// Integrates the train's velocity and position.
    /// Acceleration is a linear map of notch position; reverse running is not modelled.
    ///
    /// # Parameters
    /// * `dt` - The time step in seconds
    pub(crate) fn integrate(&mut self, dt: f64) {
        self.controls.power.actual = self.controls.power.driver;
        self.controls.brake.actual = self.controls.brake.driver;
        if self.state == TrainState::Bogus {
            return;
        }

        self.update_pressure(dt);
        let braking = self.pressure / self.attrs.service_pressure * self.attrs.brake_deceleration;
        let power = self.controls.power.actual;
        let traction = if self.controls.reverser == 1
            && power > 0
            && self.controls.brake.actual == 0
            && !self.controls.emergency
            && !self.controls.const_speed
        {
            self.attrs.max_acceleration * power as f64 / self.attrs.max_power_notch.max(1) as f64
        } else {
            0.0
        };
        let braking = if self.controls.hold_brake && self.vel < 0.1 {
            braking.max(self.attrs.brake_deceleration)
        } else {
            braking
        };

        let vel = f64::max(self.vel + dt * (traction - braking), 0.0);
        let pos = self.pos + 0.5 * (self.vel + vel) * dt;
        self.acc = if dt > 0.0 { (vel - self.vel) / dt } else { 0.0 };
        self.vel = vel;
        self.pos = pos;
    }

    /// Moves the brake cylinder pressure toward what the brake controls ask for.
    fn update_pressure(&mut self, dt: f64) {
        let target = if self.controls.emergency {
            Some(self.attrs.emergency_pressure)
        } else if self.attrs.brake_type == BrakeType::AutomaticAirBrake {
            match self.controls.air_brake {
                AirBrakeHandle::Release => Some(0.0),
                AirBrakeHandle::Lap => None,
                AirBrakeHandle::Service => Some(self.attrs.service_pressure),
            }
        } else {
            let max = self.attrs.max_brake_notch.max(1) as f64;
            Some(self.attrs.service_pressure * self.controls.brake.actual as f64 / max)
        };
        if let Some(target) = target {
            let step = PRESSURE_RATE * dt;
            self.pressure += (target - self.pressure).clamp(-step, step);
        }
    }
}
