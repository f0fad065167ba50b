//! Station stops: when to open and close doors, how to hold the train while boarding,
//! and how a train's stop state advances.

use super::envelope::PollInterval;
use crate::station::{DoorSides, Station, StopState};
use crate::train::{
    Actuator, AirBrakeHandle, BrakeType, Command, DoorMode, Train, DOOR_SPEED_LIMIT,
};
use log::debug;
use rand::Rng;

/// Speed below which a train counts as standing at a stop, in m/s.
const STANDSTILL_SPEED: f64 = 1.0 / 3.6; // m/s

/// Speed below which the brake is eased to half while boarding, in m/s.
const BOARDING_SPEED: f64 = 0.02; // m/s

/// The station context of a decision pass.
pub(crate) struct StopView<'a> {
    pub train: &'a Train,
    pub station: Option<&'a Station>,
    pub clock: f64,
    pub is_player: bool,
    /// Whether the reverser may be put in neutral, which a plugin can veto.
    pub neutral_reverser: bool,
}

impl StopView<'_> {
    /// Distance from the front of the train to its stop point, positive when short.
    fn stop_distance(&self) -> Option<(f64, f64, f64)> {
        let stop = self.station?.stop_for(self.train.attributes().cars)?;
        Some((
            stop.position - self.train.pos_front(),
            stop.backward_tolerance,
            stop.forward_tolerance,
        ))
    }

    /// Whether the train has come to rest at a stop it must open doors at.
    pub fn ready_to_open(&self) -> bool {
        let Some(station) = self.station else {
            return false;
        };
        let Some((dist, backward, _)) = self.stop_distance() else {
            return false;
        };
        dist < backward
            && station.stops_train(self.is_player)
            && station.doors.any()
            && self.train.vel().abs() < DOOR_SPEED_LIMIT
            && self.train.stop_state() == StopState::Pending
    }

    /// Whether the player train is standing at the stop of a terminal or change-ends station.
    pub fn at_terminal(&self) -> bool {
        if !self.terminal_boarding() {
            return false;
        }
        let Some((dist, backward, forward)) = self.stop_distance() else {
            return false;
        };
        dist < backward
            && -dist < forward
            && self.train.vel().abs() < DOOR_SPEED_LIMIT
    }

    /// Whether this is the player train at a terminal or change-ends station.
    fn terminal_boarding(&self) -> bool {
        self.is_player && self.station.map_or(false, |s| !s.is_normal())
    }
}

/// Decides the door requests of a driver, with a short random hesitation before opening.
#[derive(Clone, Debug, Default)]
pub(crate) struct Governor {
    /// Time until the doors may be opened, in s.
    door_timer: f64,
    door_attempted: bool,
}

impl Governor {
    /// Counts down the hesitation timer.
    pub fn elapse(&mut self, dt: f64) {
        self.door_timer -= dt;
    }

    /// Asks for the doors to be opened once the hesitation has passed.
    fn request_open<R: Rng>(&mut self, view: &StopView, rng: &mut R, controls: &mut dyn Actuator) {
        if view.train.attributes().door_open_mode == DoorMode::Automatic {
            return;
        }
        if !self.door_attempted {
            self.door_timer = rng.gen_range(0..5) as f64;
            self.door_attempted = true;
        }
        if self.door_timer < 0.0 {
            if let Some(station) = view.station {
                debug!("opening doors");
                controls.open_doors(station.doors);
            }
        }
    }

    fn request_close(&mut self, view: &StopView, controls: &mut dyn Actuator) {
        if view.train.attributes().door_open_mode == DoorMode::Automatic {
            return;
        }
        self.door_attempted = false;
        controls.close_doors(DoorSides {
            left: true,
            right: true,
        });
    }

    /// Arrived at the stop point: open the doors.
    pub fn arrive<R: Rng>(
        &mut self,
        view: &StopView,
        rng: &mut R,
        interval: &mut PollInterval,
        controls: &mut dyn Actuator,
    ) {
        self.request_open(view, rng, controls);
        interval.set(1.0);
    }

    /// Doors are open or the train is boarding: hold it still and handle the doors.
    pub fn board<R: Rng>(
        &mut self,
        view: &StopView,
        rng: &mut R,
        interval: &mut PollInterval,
        controls: &mut dyn Actuator,
    ) {
        let train = view.train;
        let attrs = train.attributes();
        if view.terminal_boarding() {
            if view.neutral_reverser {
                controls.apply_reverser(0);
            }
            controls.apply_notch(-1, 1);
            if !controls.controls().emergency {
                controls.apply_emergency_brake();
            }
            if view.ready_to_open() {
                self.request_open(view, rng, controls);
            }
            interval.set(1.0);
            return;
        }

        interval.set(1.0);
        controls.apply_notch(-1, 0);
        if attrs.brake_type == BrakeType::AutomaticAirBrake {
            let pressure = train.brake_pressure();
            let handle = if train.departure_time() - view.clock > 10.0
                || pressure < 0.3 * attrs.service_pressure
            {
                AirBrakeHandle::Service
            } else if pressure > 0.9 * attrs.emergency_pressure {
                AirBrakeHandle::Release
            } else {
                AirBrakeHandle::Lap
            };
            controls.apply_air_brake(handle);
        } else {
            let target = if train.vel().abs() < BOARDING_SPEED {
                interval.set(0.3);
                (0.5 * attrs.max_brake_notch as f64).ceil() as i32
            } else {
                attrs.max_brake_notch
            };
            let brake = controls.controls().brake.driver;
            if brake < target {
                controls.apply_notch(0, 1);
            } else if brake > target {
                controls.apply_notch(0, -1);
            }
        }
        controls.release_emergency_brake();

        let at_station = view.station.is_some();
        match train.stop_state() {
            StopState::Completed if at_station => self.request_close(view, controls),
            StopState::Boarding if at_station => {}
            _ if view.ready_to_open() => {
                self.request_open(view, rng, controls);
                interval.set(1.0);
            }
            _ => self.request_close(view, controls),
        }
    }
}

/// Holds the player train at a terminal or change-ends station once boarding is over.
pub(crate) fn hold_terminal(view: &StopView, interval: &mut PollInterval, controls: &mut dyn Actuator) {
    if view.neutral_reverser {
        controls.apply_reverser(0);
    }
    controls.apply_notch(-1, 1);
    controls.apply_air_brake(AirBrakeHandle::Service);
    controls.apply_emergency_brake();
    interval.set(10.0);
}

/// Advances a train's stop state at its current station, opening and closing doors
/// that the train operates itself.
pub(crate) fn update_stop_state(train: &mut Train, station: &Station, clock: f64, is_player: bool) {
    let attrs = *train.attributes();
    let Some(stop) = station.stop_for(attrs.cars) else {
        return;
    };
    let stops = station.stops_train(is_player);
    let standing = train.vel().abs() < STANDSTILL_SPEED && stop.window().contains(train.pos_front());

    match train.stop_state() {
        StopState::Pending if stops && standing => {
            if attrs.door_open_mode == DoorMode::Automatic && station.doors.any() {
                train.execute(&[Command::OpenDoors(station.doors)]);
            }
            let doors = train.doors();
            let opened = (!station.doors.left || doors.left) && (!station.doors.right || doors.right);
            if opened {
                let departure = station
                    .departure_time
                    .map(|dep| dep - train.timetable_delta())
                    .unwrap_or(clock);
                train.arrival_time = clock;
                train.departure_time = f64::max(departure, clock + station.stop_time);
                train.stop_state = StopState::Boarding;
                debug!("boarding until {:.0}", train.departure_time);
            }
        }
        StopState::Boarding => {
            if attrs.door_close_mode == DoorMode::Automatic && clock > train.departure_time {
                train.execute(&[Command::CloseDoors(DoorSides {
                    left: true,
                    right: true,
                })]);
            }
            if !train.doors().any() || clock > train.departure_time {
                train.stop_state = StopState::Completed;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::station::{StationStop, StationType};
    use crate::train::{ControlBuffer, TrainAttributes};
    use crate::TrainId;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn station() -> Station {
        Station {
            departure_time: Some(100.0),
            stop_time: 20.0,
            doors: DoorSides {
                left: true,
                right: false,
            },
            stops: vec![StationStop {
                position: 500.0,
                forward_tolerance: 5.0,
                backward_tolerance: 5.0,
                cars: 0,
            }],
            ..Default::default()
        }
    }

    fn train(pos: f64) -> Train {
        let mut train = Train::new(TrainId::default(), &TrainAttributes::default(), pos);
        train.station = Some(0);
        train
    }

    #[test]
    fn boarding_needs_open_doors() {
        let st = station();
        let mut t = train(498.0);
        update_stop_state(&mut t, &st, 50.0, false);
        assert_eq!(t.stop_state(), StopState::Pending);
        t.execute(&[Command::OpenDoors(st.doors)]);
        update_stop_state(&mut t, &st, 50.0, false);
        assert_eq!(t.stop_state(), StopState::Boarding);
        assert_eq!(t.departure_time(), 100.0);
    }

    #[test]
    fn late_train_keeps_minimum_dwell() {
        let st = station();
        let mut t = train(500.0);
        t.execute(&[Command::OpenDoors(st.doors)]);
        update_stop_state(&mut t, &st, 95.0, false);
        assert_eq!(t.departure_time(), 115.0);
        update_stop_state(&mut t, &st, 110.0, false);
        assert_eq!(t.stop_state(), StopState::Boarding);
        update_stop_state(&mut t, &st, 116.0, false);
        assert_eq!(t.stop_state(), StopState::Completed);
    }

    #[test]
    fn closing_doors_completes_boarding() {
        let st = station();
        let mut t = train(500.0);
        t.execute(&[Command::OpenDoors(st.doors)]);
        update_stop_state(&mut t, &st, 50.0, false);
        t.execute(&[Command::CloseDoors(st.doors)]);
        update_stop_state(&mut t, &st, 51.0, false);
        assert_eq!(t.stop_state(), StopState::Completed);
    }

    #[test]
    fn door_hesitation() {
        let st = station();
        let t = train(499.0);
        let view = StopView {
            train: &t,
            station: Some(&st),
            clock: 0.0,
            is_player: false,
            neutral_reverser: true,
        };
        assert!(view.ready_to_open());
        let mut gov = Governor::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut interval = PollInterval::new(0.5);
        let mut buf = ControlBuffer::new(t.attributes(), t.controls());
        gov.arrive(&view, &mut rng, &mut interval, &mut buf);
        assert_eq!(interval.get(), 1.0);
        gov.elapse(5.0);
        gov.arrive(&view, &mut rng, &mut interval, &mut buf);
        assert_eq!(
            buf.commands().last(),
            Some(&Command::OpenDoors(st.doors))
        );
    }

    #[test]
    fn boarding_eases_brake_when_stopped() {
        let st = station();
        let mut t = train(500.0);
        t.stop_state = StopState::Boarding;
        let view = StopView {
            train: &t,
            station: Some(&st),
            clock: 60.0,
            is_player: false,
            neutral_reverser: true,
        };
        let mut gov = Governor::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut interval = PollInterval::new(1.0);
        let mut buf = ControlBuffer::new(t.attributes(), t.controls());
        gov.board(&view, &mut rng, &mut interval, &mut buf);
        assert_eq!(buf.controls().brake.driver, 1);
        assert_eq!(interval.get(), 0.3);
        assert!(!buf.commands().iter().any(|c| matches!(c, Command::CloseDoors(_))));
    }

    fn terminal() -> Station {
        Station {
            kind: StationType::Terminal,
            ..station()
        }
    }

    #[test]
    fn terminal_hold() {
        let st = terminal();
        let t = train(500.0);
        for neutral in [true, false] {
            let view = StopView {
                train: &t,
                station: Some(&st),
                clock: 0.0,
                is_player: true,
                neutral_reverser: neutral,
            };
            assert!(view.at_terminal());
            let mut interval = PollInterval::new(1.0);
            let mut buf = ControlBuffer::new(t.attributes(), t.controls());
            hold_terminal(&view, &mut interval, &mut buf);
            assert_eq!(interval.get(), 10.0);
            assert!(buf.controls().emergency);
            assert_eq!(buf.commands().contains(&Command::Reverser(0)), neutral);
        }
    }

    #[test]
    fn terminal_boarding_keeps_emergency_brake() {
        let st = terminal();
        let mut t = train(500.0);
        t.stop_state = StopState::Boarding;
        for neutral in [true, false] {
            let view = StopView {
                train: &t,
                station: Some(&st),
                clock: 60.0,
                is_player: true,
                neutral_reverser: neutral,
            };
            let mut gov = Governor::default();
            let mut rng = StdRng::seed_from_u64(1);
            let mut interval = PollInterval::new(0.3);
            let mut buf = ControlBuffer::new(t.attributes(), t.controls());
            gov.board(&view, &mut rng, &mut interval, &mut buf);
            assert_eq!(interval.get(), 1.0);
            assert!(buf.controls().emergency);
            assert_eq!(buf.commands().contains(&Command::Reverser(0)), neutral);
        }
    }

    #[test]
    fn ai_train_boards_normally_at_terminal() {
        let st = terminal();
        let mut t = train(500.0);
        t.stop_state = StopState::Boarding;
        let view = StopView {
            train: &t,
            station: Some(&st),
            clock: 60.0,
            is_player: false,
            neutral_reverser: true,
        };
        let mut buf = ControlBuffer::new(t.attributes(), t.controls());
        Governor::default().board(
            &view,
            &mut StdRng::seed_from_u64(1),
            &mut PollInterval::new(1.0),
            &mut buf,
        );
        assert!(!buf.controls().emergency);
        assert!(!buf.commands().contains(&Command::Reverser(0)));
    }

    /// The air brake handle chosen while boarding with the given cylinder pressure.
    fn boarding_handle(pressure: f64, clock: f64) -> AirBrakeHandle {
        let st = station();
        let attrs = TrainAttributes {
            brake_type: BrakeType::AutomaticAirBrake,
            ..Default::default()
        };
        let mut t = Train::new(TrainId::default(), &attrs, 500.0);
        t.station = Some(0);
        t.stop_state = StopState::Boarding;
        t.departure_time = 100.0;
        t.set_brake_pressure(pressure);
        let view = StopView {
            train: &t,
            station: Some(&st),
            clock,
            is_player: false,
            neutral_reverser: true,
        };
        let mut buf = ControlBuffer::new(t.attributes(), t.controls());
        Governor::default().board(
            &view,
            &mut StdRng::seed_from_u64(1),
            &mut PollInterval::new(1.0),
            &mut buf,
        );
        buf.commands()
            .iter()
            .find_map(|c| match c {
                Command::AirBrake(handle) => Some(*handle),
                _ => None,
            })
            .expect("no air brake command")
    }

    #[test]
    fn air_brake_service_until_near_departure() {
        assert_eq!(boarding_handle(300_000.0, 60.0), AirBrakeHandle::Service);
    }

    #[test]
    fn air_brake_service_when_pressure_low() {
        assert_eq!(boarding_handle(100_000.0, 95.0), AirBrakeHandle::Service);
    }

    #[test]
    fn air_brake_release_when_pressure_high() {
        assert_eq!(boarding_handle(440_000.0, 95.0), AirBrakeHandle::Release);
    }

    #[test]
    fn air_brake_lap_in_band() {
        assert_eq!(boarding_handle(300_000.0, 95.0), AirBrakeHandle::Lap);
    }
}
