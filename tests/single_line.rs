//! Tests of AI trains running along a single line.

use train_sim::{
    AspectKind, DoorSides, Event, RouteBuilder, Section, SectionAspect, Simulation,
    SimulationConfig, Station, StationStop, StopSkipMode, StopState, TrainAttributes,
};

const SECTION_LENGTH: f64 = 400.0;

/// A straight line with a 60 km/h limit, split into `sections` linked signalling sections.
fn line(sections: usize) -> RouteBuilder {
    let mut builder = RouteBuilder::new();
    builder.add_element(
        -100.0,
        &[(
            0.0,
            Event::LimitChange {
                previous: f64::INFINITY,
                next: 60.0 / 3.6,
            },
        )],
    );
    for i in 0..sections {
        let pos = SECTION_LENGTH * i as f64;
        let idx = builder.add_section(Section::new(
            pos,
            AspectKind::IndexBased,
            vec![
                SectionAspect::new(0, 0.0),
                SectionAspect::new(1, 45.0 / 3.6),
                SectionAspect::new(2, f64::INFINITY),
            ],
        ));
        if i > 0 {
            builder.link_sections(idx - 1, idx);
        }
        builder.add_element(
            pos,
            &[(
                0.0,
                Event::SectionChange {
                    previous: i.checked_sub(1),
                    next: Some(idx),
                },
            )],
        );
    }
    builder
}

/// Test that an AI train's position increases monotonically from a standstill.
#[test]
fn ai_train_drives_forward() {
    let mut sim = Simulation::new(line(0).build().unwrap(), SimulationConfig::default());
    let train = sim.add_ai_train(&TrainAttributes::default(), 100.0);

    let mut pos = sim.get_train(train).unwrap().pos_front();
    for _ in 0..600 {
        sim.step(0.1);
        let next_pos = sim.get_train(train).unwrap().pos_front();
        assert!(next_pos >= pos);
        pos = next_pos;
    }
    assert!(pos > 200.0);
    assert!(sim.get_train(train).unwrap().vel() <= 60.0 / 3.6 + 1.0);
}

/// Test that an AI train stops short of a signal held at stop by a train standing beyond it.
#[test]
fn ai_train_stops_at_signal() {
    let mut sim = Simulation::new(line(5).build().unwrap(), SimulationConfig::default());
    // Standing in section 3, behind the signal at 1200 m
    sim.add_train(&TrainAttributes::default(), 1300.0);
    let ai = sim.add_ai_train(&TrainAttributes::default(), 100.0);

    for _ in 0..3000 {
        sim.step(0.1);
        assert!(sim.get_train(ai).unwrap().pos_front() < 1200.0);
    }
    let train = sim.get_train(ai).unwrap();
    assert!(train.pos_front() > 800.0);
    assert!(train.vel() < 0.5);
    assert_eq!(sim.signalling().sections()[3].current_aspect(), Some(0));
}

/// The line with a station whose platform runs from 500 m to 750 m, stopping at 700 m.
fn station_line() -> (RouteBuilder, usize) {
    let mut builder = line(0);
    let station = builder.add_station(Station {
        name: "Central".into(),
        departure_time: Some(150.0),
        stop_time: 15.0,
        doors: DoorSides {
            left: true,
            right: false,
        },
        stops: vec![StationStop {
            position: 700.0,
            forward_tolerance: 10.0,
            backward_tolerance: 10.0,
            cars: 0,
        }],
        ..Default::default()
    });
    builder.add_element(
        500.0,
        &[
            (0.0, Event::StationStart { station }),
            (250.0, Event::StationEnd { station }),
        ],
    );
    (builder, station)
}

/// Test that an AI train stops at a station, boards, and leaves on time.
#[test]
fn ai_train_calls_at_station() {
    let (builder, station) = station_line();
    let mut sim = Simulation::new(builder.build().unwrap(), SimulationConfig::default());
    let ai = sim.add_ai_train(&TrainAttributes::default(), 100.0);

    let mut boarded_at = None;
    for _ in 0..4000 {
        sim.step(0.1);
        let train = sim.get_train(ai).unwrap();
        if boarded_at.is_none() && train.stop_state() == StopState::Boarding {
            boarded_at = Some(train.pos_front());
            assert!(train.doors().left);
        }
        if train.pos_front() > 760.0 {
            // Never leaves before the departure time
            assert!(sim.clock() >= 150.0);
        }
    }
    let stopped = boarded_at.expect("train never boarded");
    assert!((stopped - 700.0).abs() <= 10.0);
    let train = sim.get_train(ai).unwrap();
    assert!(train.pos_front() > 760.0);
    assert!(!train.doors().any());
    assert_eq!(train.last_station(), Some(station));
}

/// Test that a train told to skip a station runs through it, then drops the skip.
#[test]
fn skipping_train_runs_through_station() {
    let (builder, station) = station_line();
    let mut sim = Simulation::new(builder.build().unwrap(), SimulationConfig::default());
    let ai = sim.add_ai_train(&TrainAttributes::default(), 100.0);
    sim.get_train_mut(ai)
        .unwrap()
        .set_stop_skip(StopSkipMode::Linespeed);

    let mut min_vel = f64::INFINITY;
    for _ in 0..3000 {
        sim.step(0.1);
        let train = sim.get_train(ai).unwrap();
        assert_ne!(train.stop_state(), StopState::Boarding);
        assert!(!train.doors().any());
        assert_eq!(train.station(), None);
        if (500.0..750.0).contains(&train.pos_front()) {
            assert_eq!(train.zone(), Some(station));
            min_vel = min_vel.min(train.vel());
        }
    }
    assert!(min_vel > 1.0);
    let train = sim.get_train(ai).unwrap();
    assert!(train.pos_front() > 760.0);
    assert_eq!(train.last_station(), Some(station));
    assert_eq!(train.stop_skip(), StopSkipMode::None);
}

/// Test that a bogus train follows its schedule and disappears after the last waypoint.
#[test]
fn precursor_follows_schedule() {
    let mut builder = line(0);
    builder.add_instruction(10.0, 0.0);
    builder.add_instruction(20.0, 100.0);
    let mut sim = Simulation::new(builder.build().unwrap(), SimulationConfig::default());
    let bogus = sim.add_bogus_train(&TrainAttributes::default());

    for _ in 0..150 {
        sim.step(0.1);
    }
    let pos = sim.get_train(bogus).unwrap().pos_front();
    assert!(pos > 0.0 && pos < 100.0);

    for _ in 0..150 {
        sim.step(0.1);
    }
    assert!(sim.get_train(bogus).is_none());
    assert_eq!(sim.iter_trains().count(), 0);
}

/// Test that runs with the same seed are identical.
#[test]
fn seeded_runs_repeat() {
    let run = || {
        let config = SimulationConfig {
            seed: 9,
            ..Default::default()
        };
        let mut sim = Simulation::new(line(3).build().unwrap(), config);
        let ai = sim.add_ai_train(&TrainAttributes::default(), 50.0);
        for _ in 0..500 {
            sim.step(0.1);
        }
        sim.get_train(ai).unwrap().pos_front()
    };
    assert_eq!(run(), run());
}
