//! Tests of the signalling network driven through a simulation.

use std::cell::RefCell;
use std::rc::Rc;
use train_sim::{
    AspectKind, Command, Event, FreeSections, Plugin, RouteBuilder, Section, SectionAspect,
    SignalData, Simulation, SimulationConfig, Station, StationStop, TrainAttributes,
};

const SECTION_LENGTH: f64 = 400.0;

/// A straight line of linked sections, with a section change event at each signal.
/// `departure` marks the section whose signal is the departure signal of station 0,
/// which then lies in the section before it.
fn line(sections: usize, departure: Option<usize>) -> RouteBuilder {
    let mut builder = RouteBuilder::new();
    for i in 0..sections {
        let pos = SECTION_LENGTH * i as f64;
        let mut section = Section::new(
            pos,
            AspectKind::IndexBased,
            vec![
                SectionAspect::new(0, 0.0),
                SectionAspect::new(1, 12.5),
                SectionAspect::new(2, f64::INFINITY),
            ],
        );
        section.station = departure.filter(|d| *d == i).map(|_| 0);
        let idx = builder.add_section(section);
        if i > 0 {
            builder.link_sections(idx - 1, idx);
        }

        let mut events = vec![(
            0.0,
            Event::SectionChange {
                previous: i.checked_sub(1),
                next: Some(idx),
            },
        )];
        if departure == Some(i + 1) {
            events.push((200.0, Event::StationStart { station: 0 }));
            events.push((395.0, Event::StationEnd { station: 0 }));
        }
        builder.add_element(pos, &events);
    }
    builder
}

fn aspects(sim: &Simulation) -> Vec<Option<usize>> {
    sim.signalling()
        .sections()
        .iter()
        .map(|s| s.current_aspect())
        .collect()
}

/// Test that an empty three section chain clears to its most permissive aspect.
#[test]
fn clear_chain() {
    let mut sim = Simulation::new(line(3, None).build().unwrap(), SimulationConfig::default());
    sim.step(0.1);
    assert_eq!(aspects(&sim), vec![Some(2), Some(2), Some(2)]);
    for section in sim.signalling().sections() {
        assert_eq!(section.free_sections(), FreeSections::Unbounded);
    }
}

/// Test that a train straddling two sections holds both at stop.
#[test]
fn straddling_train_occupies_both_sections() {
    let mut sim = Simulation::new(line(4, None).build().unwrap(), SimulationConfig::default());
    let id = sim.add_train(&TrainAttributes::default(), 850.0);
    sim.step(0.1);
    assert_eq!(aspects(&sim), vec![Some(1), Some(0), Some(0), Some(2)]);
    let sections = sim.signalling().sections();
    assert_eq!(sections[1].occupants(), &[id]);
    assert_eq!(sections[2].occupants(), &[id]);
    assert_eq!(sections[0].free_sections(), FreeSections::Count(1));
}

/// Test that the aspect behind a train never becomes more restrictive as it moves away.
#[test]
fn aspects_clear_as_train_moves_away() {
    let mut sim = Simulation::new(line(4, None).build().unwrap(), SimulationConfig::default());
    let id = sim.add_train(&TrainAttributes::default(), 500.0);
    let mut last = 0;
    for pos in [500.0, 900.0, 1300.0] {
        sim.command(id, &[Command::Relocate(pos)]);
        sim.step(0.1);
        let aspect = sim.signalling().sections()[0].current_aspect().unwrap();
        assert!(aspect >= last);
        last = aspect;
    }
    assert_eq!(last, 2);
}

/// Test that a departure signal is held until the train has reached its stop point
/// and it is nearly time to leave.
#[test]
fn departure_signal_waits_for_timetable() {
    let mut builder = line(3, Some(1));
    builder.add_station(Station {
        departure_time: Some(100.0),
        stops: vec![StationStop {
            position: 380.0,
            forward_tolerance: 5.0,
            backward_tolerance: 5.0,
            cars: 0,
        }],
        ..Default::default()
    });
    let mut sim = Simulation::new(builder.build().unwrap(), SimulationConfig::default());
    let id = sim.add_train(&TrainAttributes::default(), 300.0);
    sim.step(0.1);
    assert_eq!(aspects(&sim)[1], Some(0));
    assert!(!sim.signalling().sections()[1].reached_stop_point());

    // At the stop point, but too early to leave
    sim.command(id, &[Command::Relocate(380.0)]);
    sim.step(0.1);
    assert_eq!(aspects(&sim)[1], Some(0));
    assert!(sim.signalling().sections()[1].reached_stop_point());

    // Less than fifteen seconds before departure
    sim.set_clock(85.5);
    sim.step(0.1);
    assert_eq!(aspects(&sim)[1], Some(2));
}

/// Test that a terminal station with no train to hold keeps its signal at stop.
#[test]
fn terminal_holds_without_train() {
    let mut builder = line(2, Some(1));
    builder.add_station(Station {
        kind: train_sim::StationType::Terminal,
        ..Default::default()
    });
    let mut sim = Simulation::new(builder.build().unwrap(), SimulationConfig::default());
    sim.step(0.1);
    assert_eq!(aspects(&sim), vec![Some(1), Some(0)]);
}

#[derive(Default)]
struct Recorder {
    signals: Rc<RefCell<Vec<SignalData>>>,
}

impl Plugin for Recorder {
    fn update_signals(&mut self, signals: &[SignalData]) {
        *self.signals.borrow_mut() = signals.to_vec();
    }
}

/// Test that a plugin is told about the signals ahead up to the first at stop.
#[test]
fn plugin_sees_signals_ahead() {
    let mut sim = Simulation::new(line(4, None).build().unwrap(), SimulationConfig::default());
    let own = sim.add_train(&TrainAttributes::default(), 100.0);
    sim.add_train(&TrainAttributes::default(), 1300.0);
    let recorder = Recorder::default();
    let signals = recorder.signals.clone();
    sim.set_plugin(own, Box::new(recorder));
    sim.step(0.1);

    let signals = signals.borrow();
    let aspects: Vec<_> = signals.iter().map(|s| s.aspect).collect();
    assert_eq!(aspects, vec![2, 2, 1, 0]);
    assert_eq!(signals[1].distance, 300.0);
}
