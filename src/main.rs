use std::time::Instant;

use train_sim::{
    AspectKind, DoorSides, Event, RouteBuilder, RouteError, Section, SectionAspect, Simulation,
    SimulationConfig, Station, StationStop, TrainAttributes,
};

const SECTION_LENGTH: f64 = 400.0; // m
const NUM_SECTIONS: usize = 24;
const STATION_SECTIONS: [usize; 2] = [6, 15];

fn main() -> Result<(), RouteError> {
    let mut builder = RouteBuilder::new();
    let aspects = vec![
        SectionAspect::new(0, 0.0),
        SectionAspect::new(1, 45.0 / 3.6),
        SectionAspect::new(2, 75.0 / 3.6),
        SectionAspect::new(3, f64::INFINITY),
    ];

    let morning = 8.0 * 3600.0;
    for (n, at) in STATION_SECTIONS.iter().enumerate() {
        let platform = (*at - 1) as f64 * SECTION_LENGTH;
        builder.add_station(Station {
            name: format!("Station {}", n + 1),
            arrival_time: Some(morning + 120.0 + 240.0 * n as f64),
            departure_time: Some(morning + 150.0 + 240.0 * n as f64),
            stop_time: 20.0,
            doors: DoorSides {
                left: true,
                right: false,
            },
            stops: vec![StationStop {
                position: platform + 300.0,
                forward_tolerance: 5.0,
                backward_tolerance: 5.0,
                cars: 0,
            }],
            ..Default::default()
        });
    }

    for i in 0..NUM_SECTIONS {
        let pos = i as f64 * SECTION_LENGTH;
        let mut section = Section::new(pos, AspectKind::IndexBased, aspects.clone());
        section.station = STATION_SECTIONS.iter().position(|s| *s == i);
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
        if i == 0 {
            events.push((
                0.0,
                Event::LimitChange {
                    previous: f64::INFINITY,
                    next: 90.0 / 3.6,
                },
            ));
        }
        if let Some(station) = STATION_SECTIONS.iter().position(|s| *s == i + 1) {
            events.push((100.0, Event::StationStart { station }));
            events.push((350.0, Event::StationEnd { station }));
        }
        builder.add_element(pos, &events);
    }
    builder.add_element(
        NUM_SECTIONS as f64 * SECTION_LENGTH,
        &[(0.0, Event::TrackEnd)],
    );
    builder.add_buffer(NUM_SECTIONS as f64 * SECTION_LENGTH + 10.0);

    let config = SimulationConfig {
        seed: 42,
        ai_speed_limit: 80.0 / 3.6,
    };
    let mut sim = Simulation::new(builder.build()?, config);
    sim.set_clock(morning);
    let attributes = TrainAttributes::default();
    for pos in [1700.0, 1100.0, 500.0, 100.0] {
        sim.add_ai_train(&attributes, pos);
    }

    println!("Simulating...");
    let num_frames = 1000;
    for _ in 0..10 {
        let start = Instant::now();
        for _ in 0..num_frames {
            sim.step(0.05);
        }
        let frame = start.elapsed() / num_frames;
        let lead = sim
            .iter_trains()
            .map(|t| t.pos_front())
            .fold(f64::NEG_INFINITY, f64::max);
        println!(
            "Avg. frame: {:?} --> {:.0}x realtime ({} trains, lead at {:.0} m)",
            frame,
            0.05 / frame.as_secs_f64(),
            sim.iter_trains().count(),
            lead,
        );
    }
    Ok(())
}
