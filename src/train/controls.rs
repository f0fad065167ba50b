use super::TrainAttributes;
use crate::station::DoorSides;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// The braking system of a train.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BrakeType {
    /// Notched brake acting directly on the brake cylinders.
    #[default]
    ElectromagneticStraightAir,
    /// Notched brake with an electric command line.
    ElectricCommandBrake,
    /// Automatic air brake, driven by a Release/Lap/Service handle.
    AutomaticAirBrake,
}

/// Position of the automatic air brake handle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AirBrakeHandle {
    #[default]
    Release,
    Lap,
    Service,
}

/// A notch handle, as commanded by the driver and as actually applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Notch {
    pub driver: i32,
    pub actual: i32,
}

/// The state of a train's driving controls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Controls {
    pub power: Notch,
    pub brake: Notch,
    /// -1 backwards, 0 neutral, 1 forwards.
    pub reverser: i32,
    pub air_brake: AirBrakeHandle,
    pub emergency: bool,
    pub hold_brake: bool,
    pub const_speed: bool,
}

/// A request to change something about a train.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Command {
    /// Relative change of the power and brake notches.
    Notch { power: i32, brake: i32 },
    /// Absolute reverser position.
    Reverser(i32),
    AirBrake(AirBrakeHandle),
    EmergencyBrake(bool),
    HoldBrake(bool),
    ConstSpeed(bool),
    OpenDoors(DoorSides),
    CloseDoors(DoorSides),
    /// Move the train so its front is at the given track position.
    Relocate(f64),
    /// Remove the train from the simulation.
    Dispose,
}

impl Controls {
    /// Applies a command to the controls, ignoring commands that do not concern them.
    pub(crate) fn apply(&mut self, command: &Command, attrs: &TrainAttributes) {
        match *command {
            Command::Notch { power, brake } => self.apply_notch(power, brake, attrs),
            Command::Reverser(value) => self.reverser = value.clamp(-1, 1),
            Command::AirBrake(handle) => {
                if attrs.brake_type == BrakeType::AutomaticAirBrake {
                    self.air_brake = handle;
                }
            }
            Command::EmergencyBrake(true) => {
                self.full_brake(attrs);
                self.emergency = true;
                self.hold_brake = false;
                self.const_speed = false;
            }
            Command::EmergencyBrake(false) => {
                if self.emergency {
                    self.full_brake(attrs);
                    self.emergency = false;
                }
            }
            Command::HoldBrake(on) => self.hold_brake = on && attrs.has_hold_brake,
            Command::ConstSpeed(on) => self.const_speed = on && attrs.has_const_speed,
            Command::OpenDoors(_)
            | Command::CloseDoors(_)
            | Command::Relocate(_)
            | Command::Dispose => {}
        }
    }

    /// Whether neither power nor brake is notched.
    pub fn is_neutral(&self) -> bool {
        self.power.driver == 0 && self.brake.driver == 0
    }

    fn apply_notch(&mut self, power: i32, brake: i32, attrs: &TrainAttributes) {
        let mut p = (self.power.driver + power).clamp(0, attrs.max_power_notch.max(0));
        let b = (self.brake.driver + brake).clamp(0, attrs.max_brake_notch.max(0));
        if attrs.single_handle && b != 0 {
            p = 0;
        }
        self.power.driver = p;
        self.brake.driver = b;
    }

    fn full_brake(&mut self, attrs: &TrainAttributes) {
        self.apply_notch(0, attrs.max_brake_notch, attrs);
        if attrs.single_handle {
            self.power.driver = 0;
        }
        if attrs.brake_type == BrakeType::AutomaticAirBrake {
            self.air_brake = AirBrakeHandle::Service;
        }
    }
}

/// Something that accepts driving commands on behalf of a train.
pub trait Actuator {
    /// Queues a command.
    fn send(&mut self, command: Command);

    /// The controls as they will be once every queued command is applied.
    fn controls(&self) -> &Controls;

    fn apply_notch(&mut self, power: i32, brake: i32) {
        self.send(Command::Notch { power, brake });
    }

    fn apply_reverser(&mut self, value: i32) {
        self.send(Command::Reverser(value));
    }

    fn apply_air_brake(&mut self, handle: AirBrakeHandle) {
        self.send(Command::AirBrake(handle));
    }

    fn apply_emergency_brake(&mut self) {
        self.send(Command::EmergencyBrake(true));
    }

    fn release_emergency_brake(&mut self) {
        self.send(Command::EmergencyBrake(false));
    }

    fn apply_hold_brake(&mut self, on: bool) {
        self.send(Command::HoldBrake(on));
    }

    fn apply_const_speed(&mut self, on: bool) {
        self.send(Command::ConstSpeed(on));
    }

    fn open_doors(&mut self, sides: DoorSides) {
        self.send(Command::OpenDoors(sides));
    }

    fn close_doors(&mut self, sides: DoorSides) {
        self.send(Command::CloseDoors(sides));
    }
}

/// Collects the commands issued for one train during a decision pass,
/// keeping a preview of the resulting controls.
pub struct ControlBuffer {
    attrs: TrainAttributes,
    controls: Controls,
    commands: SmallVec<[Command; 8]>,
}

impl ControlBuffer {
    /// Creates a buffer starting from the train's current controls.
    pub fn new(attrs: &TrainAttributes, controls: &Controls) -> Self {
        Self {
            attrs: *attrs,
            controls: *controls,
            commands: SmallVec::new(),
        }
    }

    /// The queued commands, in order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Consumes the buffer, returning the queued commands.
    pub fn into_commands(self) -> SmallVec<[Command; 8]> {
        self.commands
    }
}

impl Actuator for ControlBuffer {
    fn send(&mut self, command: Command) {
        self.controls.apply(&command, &self.attrs);
        self.commands.push(command);
    }

    fn controls(&self) -> &Controls {
        &self.controls
    }
}
