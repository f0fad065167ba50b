use super::{Autopilot, TriggerInput};
use crate::plugin::Plugin;
use crate::route::BogusInstruction;
use crate::train::{Actuator, Command};
use crate::util::Interval;
use log::info;

/// Poll interval once the precursor has been placed, in s.
const REPLAY_INTERVAL: f64 = 5.0; // s

/// Replays the route's precursor schedule, placing a bogus train by linear interpolation
/// between the waypoints around the current time, and disposing of it after the last.
#[derive(Clone, Debug)]
pub struct PrecursorDriver {
    interval: f64,
    last_processed: f64,
}

impl Default for PrecursorDriver {
    fn default() -> Self {
        Self {
            interval: 1.0,
            last_processed: 0.0,
        }
    }
}

impl PrecursorDriver {
    pub fn new() -> Self {
        Default::default()
    }
}

/// Where the schedule puts the train at `clock`, or `None` once it has run out.
fn scheduled_position(instructions: &[BogusInstruction], clock: f64) -> Option<f64> {
    let last = instructions.last()?;
    if clock > last.time {
        return None;
    }
    let a = instructions
        .iter()
        .rposition(|ins| ins.time < clock)
        .map_or(instructions[0], |idx| instructions[idx]);
    let b = instructions
        .iter()
        .find(|ins| ins.time > a.time)
        .copied()
        .unwrap_or(*last);
    let r = Interval::new(a.time, b.time).inv_lerp_clamped(clock);
    Some(Interval::new(a.position, b.position).lerp(r))
}

impl Autopilot for PrecursorDriver {
    fn trigger(
        &mut self,
        input: &TriggerInput,
        _plugin: Option<&mut dyn Plugin>,
        controls: &mut dyn Actuator,
    ) {
        if input.clock - self.last_processed < self.interval {
            return;
        }
        self.last_processed = input.clock;
        self.interval = REPLAY_INTERVAL;
        match scheduled_position(input.route.instructions(), input.clock) {
            Some(pos) => controls.send(Command::Relocate(pos)),
            None => {
                info!("precursor schedule finished at {:.0}", input.clock);
                controls.send(Command::Dispose);
            }
        }
    }
}
