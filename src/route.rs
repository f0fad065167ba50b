//! The immutable description of a route, assembled and validated at load time.

use crate::error::RouteError;
use crate::section::Section;
use crate::station::Station;
use crate::track::{Event, Track, TrackElement, TrackEvent};
use crate::util::Interval;
use log::warn;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A waypoint of a bogus (precursor) train's schedule.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BogusInstruction {
    /// Seconds since midnight.
    pub time: f64,
    /// The track position of the front of the train.
    pub position: f64,
}

/// The span of track over which a train counts as being at a station.
#[derive(Clone, Copy, Debug, PartialEq)]
struct StationZone {
    station: usize,
    span: Interval,
}

/// A route: its track, stations, signalling layout, buffers and precursor schedule.
#[derive(Clone, Debug, Default)]
pub struct Route {
    track: Track,
    stations: Vec<Station>,
    sections: Vec<Section>,
    /// Track positions of fixed buffer stops.
    buffers: Vec<f64>,
    instructions: Vec<BogusInstruction>,
    zones: Vec<StationZone>,
}

impl Route {
    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn station(&self, idx: usize) -> Option<&Station> {
        self.stations.get(idx)
    }

    /// The initial layout of the signalling sections.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn buffers(&self) -> &[f64] {
        &self.buffers
    }

    /// The schedule replayed by bogus trains, in time order.
    pub fn instructions(&self) -> &[BogusInstruction] {
        &self.instructions
    }

    /// The station whose platform zone contains `pos`.
    pub fn station_at(&self, pos: f64) -> Option<usize> {
        self.zones
            .iter()
            .find(|zone| zone.span.min <= pos && pos < zone.span.max)
            .map(|zone| zone.station)
    }

    /// The section containing `pos`: the one with the greatest start at or before it.
    pub fn section_at(&self, pos: f64) -> Option<usize> {
        section_containing(&self.sections, pos)
    }

    /// The track span a section covers, up to the start of the section after it.
    pub fn section_span(&self, idx: usize) -> Option<Interval> {
        let section = self.sections.get(idx)?;
        let end = section
            .next
            .and_then(|n| self.sections.get(n))
            .map(|n| n.position)
            .filter(|end| *end > section.position)
            .unwrap_or(f64::INFINITY);
        Some(Interval::new(section.position, end))
    }
}

fn section_containing(sections: &[Section], pos: f64) -> Option<usize> {
    sections
        .iter()
        .enumerate()
        .filter(|(_, s)| s.position <= pos)
        .fold(None, |best: Option<(usize, f64)>, (idx, s)| match best {
            Some((_, at)) if at > s.position => best,
            _ => Some((idx, s.position)),
        })
        .map(|(idx, _)| idx)
}

/// Assembles a [Route], checking its references when built.
#[derive(Clone, Debug, Default)]
pub struct RouteBuilder {
    elements: Vec<TrackElement>,
    stations: Vec<Station>,
    sections: Vec<Section>,
    buffers: Vec<f64>,
    instructions: Vec<BogusInstruction>,
}

impl RouteBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a track element; elements must be added in ascending position order.
    pub fn add_element(&mut self, position: f64, events: &[(f64, Event)]) -> usize {
        self.elements.push(TrackElement {
            position,
            events: events
                .iter()
                .map(|(offset, event)| TrackEvent {
                    offset: *offset,
                    event: *event,
                })
                .collect(),
        });
        self.elements.len() - 1
    }

    /// Adds a station, returning its index.
    pub fn add_station(&mut self, station: Station) -> usize {
        self.stations.push(station);
        self.stations.len() - 1
    }

    /// Adds a signalling section, returning its index.
    pub fn add_section(&mut self, section: Section) -> usize {
        self.sections.push(section);
        self.sections.len() - 1
    }

    /// Links two sections so that `next` lies directly ahead of `prev`.
    pub fn link_sections(&mut self, prev: usize, next: usize) {
        if let Some(section) = self.sections.get_mut(prev) {
            section.next = Some(next);
        }
        if let Some(section) = self.sections.get_mut(next) {
            section.previous = Some(prev);
        }
    }

    pub fn add_buffer(&mut self, position: f64) {
        self.buffers.push(position);
    }

    pub fn add_instruction(&mut self, time: f64, position: f64) {
        self.instructions.push(BogusInstruction { time, position });
    }

    /// Validates the route.
    pub fn build(self) -> Result<Route, RouteError> {
        let stations = self.stations.len();
        let sections = self.sections.len();

        for (idx, section) in self.sections.iter().enumerate() {
            if section.aspects.is_empty() {
                return Err(RouteError::EmptyAspectTable { section: idx });
            }
            for link in [section.previous, section.next].into_iter().flatten() {
                if link >= sections {
                    return Err(RouteError::SectionLinkOutOfRange { section: idx, link });
                }
            }
            if let Some(station) = section.station.filter(|s| *s >= stations) {
                return Err(RouteError::SectionStationOutOfRange {
                    section: idx,
                    station,
                });
            }
        }

        for (idx, element) in self.elements.iter().enumerate() {
            if idx > 0 && element.position < self.elements[idx - 1].position {
                return Err(RouteError::UnorderedTrack { element: idx });
            }
            for ev in &element.events {
                match ev.event {
                    Event::StationStart { station } | Event::StationEnd { station }
                        if station >= stations =>
                    {
                        return Err(RouteError::EventStationOutOfRange {
                            element: idx,
                            station,
                        });
                    }
                    Event::SectionChange { previous, next } => {
                        for section in [previous, next].into_iter().flatten() {
                            if section >= sections {
                                return Err(RouteError::EventSectionOutOfRange {
                                    element: idx,
                                    section,
                                });
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        if self
            .instructions
            .windows(2)
            .any(|pair| pair[1].time < pair[0].time)
        {
            return Err(RouteError::UnorderedInstructions);
        }

        for (idx, station) in self.stations.iter().enumerate() {
            if station.stops.is_empty() && station.doors.any() {
                warn!("station {} ({}) opens doors but has no stop points", idx, station.name);
            }
        }

        let track = Track::new(self.elements);
        let zones = station_zones(&track);
        Ok(Route {
            track,
            stations: self.stations,
            sections: self.sections,
            buffers: self.buffers,
            instructions: self.instructions,
            zones,
        })
    }
}

/// Pairs each station start event with the first end event of that station after it.
fn station_zones(track: &Track) -> Vec<StationZone> {
    track
        .events()
        .filter_map(|(start, ev)| match ev {
            Event::StationStart { station } => Some((start, *station)),
            _ => None,
        })
        .map(|(start, station)| {
            let end = track
                .events()
                .find(|(at, ev)| {
                    *at >= start && matches!(ev, Event::StationEnd { station: s } if *s == station)
                })
                .map_or(f64::INFINITY, |(at, _)| at);
            StationZone {
                station,
                span: Interval::new(start, end),
            }
        })
        .collect()
}
