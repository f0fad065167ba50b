//! Turns a required deceleration into notch commands.

use crate::train::{Actuator, AirBrakeHandle, BrakeType, TrainAttributes};
use log::debug;

/// The poll interval of a driver in s, rescaled by every decision it makes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PollInterval(f64);

impl PollInterval {
    pub fn new(secs: f64) -> Self {
        Self(secs)
    }

    pub fn get(&self) -> f64 {
        self.0
    }

    pub fn set(&mut self, secs: f64) {
        self.0 = secs;
    }

    /// Multiplies the interval by `factor`, but not below `floor`.
    pub fn shrink(&mut self, factor: f64, floor: f64) {
        self.0 = f64::max(self.0 * factor, floor);
    }

    /// Multiplies the interval by `factor`, but not above `cap`.
    pub fn grow(&mut self, factor: f64, cap: f64) {
        self.0 = f64::min(self.0 * factor, cap);
    }
}

/// Deceleration thresholds of the solver, in m/s^2.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Thresholds {
    /// Power below this deceleration, cut above.
    pub cruise: f64,
    /// Brake above this deceleration.
    pub start: f64,
    /// The deceleration of one brake notch.
    pub step: f64,
}

impl Thresholds {
    pub fn new(attrs: &TrainAttributes, brake_deceleration: f64, speed_factor: f64) -> Self {
        let max_notch = attrs.max_brake_notch;
        let mut th = if attrs.brake_type == BrakeType::AutomaticAirBrake || max_notch <= 0 {
            Self {
                cruise: 0.3 * brake_deceleration,
                start: 0.5 * brake_deceleration,
                step: 0.1 * brake_deceleration,
            }
        } else if max_notch <= 2 {
            Self {
                cruise: 0.2 * brake_deceleration,
                start: 0.4 * brake_deceleration,
                step: 0.5 * brake_deceleration,
            }
        } else {
            Self {
                cruise: 0.2 * brake_deceleration,
                start: 0.5 * brake_deceleration,
                step: brake_deceleration / max_notch as f64,
            }
        };
        if speed_factor >= 1.0 {
            th.cruise *= 1.25;
            th.start *= 1.25;
            th.step *= 1.25;
        }
        th
    }

    /// Lowers the cruise and start thresholds when close to a hazard.
    pub fn reduce(&mut self) {
        self.cruise *= 0.3;
        self.start *= 0.3;
    }

    /// The deceleration above which a train already braking keeps braking.
    pub fn brake_mode_threshold(&self) -> f64 {
        0.75 * self.start + 0.25 * self.cruise
    }
}

/// Speeds at which the driver starts and stops applying power, and starts braking.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SpeedBands {
    /// The effective limit in m/s, already scaled by the speed factor.
    pub limit: f64,
    pub power_start: f64,
    pub power_end: f64,
    pub brake_start: f64,
}

impl SpeedBands {
    pub fn new(limit: f64, speed: f64, speed_factor: f64, brake_mode: bool) -> Self {
        if limit == f64::INFINITY {
            return Self {
                limit,
                power_start: limit,
                power_end: limit,
                brake_start: limit,
            };
        }
        let limit = limit * speed_factor;
        let (power_start, power_end) = if speed < 8.0 {
            (0.75 * limit, 0.95 * limit)
        } else {
            (limit - 2.5, limit - 1.5)
        };
        let brake_start = if brake_mode { power_end } else { limit + 0.5 };
        Self {
            limit,
            power_start,
            power_end,
            brake_start,
        }
    }

    /// The deceleration asked for by running faster than the braking speed.
    pub fn overspeed_deceleration(&self, speed: f64, step: f64) -> f64 {
        if speed > 0.0 && speed > self.brake_start {
            step + 0.1 * (speed - self.brake_start)
        } else {
            0.0
        }
    }

    /// The least acceptable acceleration while powering, tapering toward the limit.
    pub fn acceleration_floor(&self, speed: f64) -> f64 {
        let d = self.limit - speed;
        if self.limit.is_finite() && d > 0.0 {
            0.1 / (0.1 * d + 1.0) - 0.12
        } else {
            -1.0
        }
    }
}

/// Which part of the envelope a decision falls in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Region {
    Brake,
    Cut,
    Power,
}

/// Chooses the region for a required deceleration.
pub(crate) fn region(dec: f64, th: &Thresholds, brake_mode: bool) -> Region {
    if (!brake_mode && dec > th.start) || (brake_mode && dec > th.brake_mode_threshold()) {
        Region::Brake
    } else if dec > th.cruise {
        Region::Cut
    } else {
        Region::Power
    }
}

/// The measured state the solver reacts to.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SolveInput {
    pub dec: f64,
    pub acc: f64,
    pub speed: f64,
    pub bands: SpeedBands,
    pub thresholds: Thresholds,
}

/// The hysteretic state of the solver.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Envelope {
    pub brake_mode: bool,
    /// Power notch at which wheel slip was last seen; power stays below it.
    pub slip_ceiling: i32,
}

impl Envelope {
    pub fn new(attrs: &TrainAttributes) -> Self {
        Self {
            brake_mode: false,
            slip_ceiling: attrs.max_power_notch + 1,
        }
    }

    /// Issues notch commands for one decision and rescales the poll interval.
    pub fn solve(
        &mut self,
        input: &SolveInput,
        attrs: &TrainAttributes,
        interval: &mut PollInterval,
        controls: &mut dyn Actuator,
    ) -> Region {
        let th = &input.thresholds;
        let region = region(input.dec, th, self.brake_mode);
        if (region == Region::Brake) != self.brake_mode {
            debug!("brake mode {}", region == Region::Brake);
        }
        match region {
            Region::Brake => {
                self.brake_mode = true;
                let diff = -input.acc - input.dec;
                if diff < -th.step {
                    // Not braking hard enough
                    if controls.controls().power.driver == 0 {
                        controls.apply_notch(0, 1);
                        controls.apply_air_brake(AirBrakeHandle::Service);
                    } else {
                        controls.apply_notch(-1, 0);
                    }
                    interval.shrink(0.4, 0.3);
                } else if diff > th.step {
                    // Braking too hard
                    controls.apply_notch(-1, -1);
                    controls.apply_air_brake(AirBrakeHandle::Release);
                    interval.shrink(0.4, 0.3);
                } else {
                    controls.apply_notch(-1, 0);
                    controls.apply_air_brake(AirBrakeHandle::Lap);
                    interval.grow(1.2, 1.0);
                }
                hold_if_neutral(controls);
                if attrs.brake_type == BrakeType::AutomaticAirBrake {
                    interval.set(0.1);
                }
            }
            Region::Cut => {
                self.brake_mode = false;
                controls.apply_notch(-1, -1);
                controls.apply_air_brake(AirBrakeHandle::Release);
                hold_if_neutral(controls);
                interval.shrink(0.4, 0.3);
            }
            Region::Power => {
                self.brake_mode = false;
                self.power(input, attrs, interval, controls);
            }
        }
        region
    }

    fn power(
        &mut self,
        input: &SolveInput,
        attrs: &TrainAttributes,
        interval: &mut PollInterval,
        controls: &mut dyn Actuator,
    ) {
        let bands = &input.bands;
        let speed = input.speed;
        if speed < bands.power_start {
            self.notch_up(controls, false);
            let power = controls.controls().power.driver as f64;
            if bands.power_start == f64::INFINITY {
                interval.set(0.3 + 0.1 * power);
            } else {
                let p = power / attrs.max_power_notch.max(1) as f64;
                interval.set(0.3 + 15.0 * p / (bands.power_start - speed + 1.0));
            }
            interval.grow(1.0, 1.3);
        } else if speed > bands.power_end {
            controls.apply_notch(-1, -1);
            controls.apply_air_brake(AirBrakeHandle::Release);
            interval.shrink(0.3, 0.2);
        } else if input.acc < bands.acceleration_floor(speed) {
            self.notch_up(controls, true);
            interval.set(1.3);
        } else {
            // Hold speed
            controls.apply_notch(0, -1);
            controls.apply_air_brake(AirBrakeHandle::Release);
            if controls.controls().power.driver != 0 {
                controls.apply_const_speed(true);
            }
            hold_if_neutral(controls);
            interval.grow(1.1, 1.5);
        }
    }

    /// Releases a brake notch, or with the brake released adds a power notch below the
    /// wheel slip ceiling. With `settled`, power is only added once the last notch took.
    fn notch_up(&self, controls: &mut dyn Actuator, settled: bool) {
        let ctl = *controls.controls();
        if ctl.brake.driver == 0 {
            if ctl.power.driver < self.slip_ceiling - 1
                && (!settled || ctl.power.driver == ctl.power.actual)
            {
                controls.apply_notch(1, 0);
            }
        } else {
            controls.apply_notch(0, -1);
        }
        controls.apply_air_brake(AirBrakeHandle::Release);
    }
}

fn hold_if_neutral(controls: &mut dyn Actuator) {
    if controls.controls().is_neutral() {
        controls.apply_hold_brake(true);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::train::{ControlBuffer, Controls};
    use assert_approx_eq::assert_approx_eq;

    fn attrs() -> TrainAttributes {
        TrainAttributes {
            max_power_notch: 4,
            max_brake_notch: 8,
            brake_deceleration: 1.0,
            ..Default::default()
        }
    }

    fn input(dec: f64, acc: f64, speed: f64, limit: f64) -> SolveInput {
        SolveInput {
            dec,
            acc,
            speed,
            bands: SpeedBands::new(limit, speed, 1.0, false),
            thresholds: Thresholds::new(&attrs(), 1.0, 1.0),
        }
    }

    #[test]
    fn thresholds_by_notch_count() {
        let th = Thresholds::new(&attrs(), 1.0, 0.9);
        assert_approx_eq!(th.cruise, 0.2);
        assert_approx_eq!(th.start, 0.5);
        assert_approx_eq!(th.step, 0.125);
        let th = Thresholds::new(&attrs(), 1.0, 1.0);
        assert_approx_eq!(th.cruise, 0.25);
        assert_approx_eq!(th.start, 0.625);
        let two = TrainAttributes {
            max_brake_notch: 2,
            ..attrs()
        };
        let th = Thresholds::new(&two, 1.0, 0.9);
        assert_approx_eq!(th.start, 0.4);
        assert_approx_eq!(th.step, 0.5);
    }

    #[test]
    fn speed_bands() {
        let bands = SpeedBands::new(20.0, 10.0, 0.9, false);
        assert_approx_eq!(bands.limit, 18.0);
        assert_approx_eq!(bands.power_start, 15.5);
        assert_approx_eq!(bands.power_end, 16.5);
        assert_approx_eq!(bands.brake_start, 18.5);
        let bands = SpeedBands::new(20.0, 5.0, 1.0, true);
        assert_approx_eq!(bands.power_start, 15.0);
        assert_approx_eq!(bands.brake_start, 19.0);
        assert_approx_eq!(bands.overspeed_deceleration(21.0, 0.1), 0.3);
        assert_eq!(SpeedBands::new(f64::INFINITY, 5.0, 1.0, false).acceleration_floor(5.0), -1.0);
    }

    #[test]
    fn hysteresis() {
        let th = Thresholds::new(&attrs(), 1.0, 0.9);
        // Between the re-entry threshold (0.425) and the start threshold (0.5)
        assert_eq!(region(0.45, &th, false), Region::Cut);
        assert_eq!(region(0.45, &th, true), Region::Brake);
        assert_eq!(region(0.55, &th, false), Region::Brake);
        assert_eq!(region(0.1, &th, true), Region::Power);
    }

    #[test]
    fn brakes_harder_and_shortens_interval() {
        let mut env = Envelope::new(&attrs());
        let mut interval = PollInterval::new(1.0);
        let mut buf = ControlBuffer::new(&attrs(), &Controls::default());
        let region = env.solve(&input(1.0, 0.0, 15.0, 30.0), &attrs(), &mut interval, &mut buf);
        assert_eq!(region, Region::Brake);
        assert!(env.brake_mode);
        assert_eq!(buf.controls().brake.driver, 1);
        assert_approx_eq!(interval.get(), 0.4);
        env.solve(&input(1.0, 0.0, 15.0, 30.0), &attrs(), &mut interval, &mut buf);
        assert_approx_eq!(interval.get(), 0.3);
    }

    #[test]
    fn holding_brake_lengthens_interval() {
        let mut env = Envelope::new(&attrs());
        env.brake_mode = true;
        let mut interval = PollInterval::new(0.5);
        let mut controls = Controls::default();
        controls.brake.driver = 3;
        let mut buf = ControlBuffer::new(&attrs(), &controls);
        env.solve(&input(0.7, -0.7, 15.0, 30.0), &attrs(), &mut interval, &mut buf);
        assert_eq!(buf.controls().brake.driver, 3);
        assert_approx_eq!(interval.get(), 0.6);
    }

    #[test]
    fn powers_up_when_slow() {
        let mut env = Envelope::new(&attrs());
        let mut interval = PollInterval::new(1.0);
        let mut buf = ControlBuffer::new(&attrs(), &Controls::default());
        env.solve(&input(0.0, 0.0, 0.0, f64::INFINITY), &attrs(), &mut interval, &mut buf);
        assert_eq!(buf.controls().power.driver, 1);
        assert_approx_eq!(interval.get(), 0.4);
    }

    #[test]
    fn wheel_slip_ceiling_caps_power() {
        let mut env = Envelope::new(&attrs());
        env.slip_ceiling = 2;
        let mut interval = PollInterval::new(1.0);
        let mut controls = Controls::default();
        controls.power.driver = 1;
        let mut buf = ControlBuffer::new(&attrs(), &controls);
        env.solve(&input(0.0, 0.0, 0.0, f64::INFINITY), &attrs(), &mut interval, &mut buf);
        assert_eq!(buf.controls().power.driver, 1);
    }

    #[test]
    fn overspeed_cuts_power() {
        let mut env = Envelope::new(&attrs());
        let mut interval = PollInterval::new(1.0);
        let mut controls = Controls::default();
        controls.power.driver = 2;
        let mut buf = ControlBuffer::new(&attrs(), &controls);
        // 19 m/s against a 20 m/s limit: above the power end band, below brake start
        env.solve(&input(0.0, 0.0, 19.0, 20.0), &attrs(), &mut interval, &mut buf);
        assert_eq!(buf.controls().power.driver, 1);
        assert_approx_eq!(interval.get(), 0.3);
    }
}
