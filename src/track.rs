//! The one-dimensional track the trains run along.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Something that happens at a point on the track.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Event {
    /// The start of a station's platform zone.
    StationStart { station: usize },
    /// The end of a station's platform zone.
    StationEnd { station: usize },
    /// The route speed limit changes, in m/s.
    LimitChange { previous: f64, next: f64 },
    /// The boundary between two signalling sections.
    SectionChange {
        previous: Option<usize>,
        next: Option<usize>,
    },
    /// The end of the track.
    TrackEnd,
    /// A point sound source; has no effect on driving.
    PointSound,
}

/// An [Event] together with its offset from the start of its [TrackElement].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackEvent {
    /// Offset in m from the element's starting position.
    pub offset: f64,
    pub event: Event,
}

/// A stretch of track starting at a given position.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackElement {
    /// The starting track position in m.
    pub position: f64,
    /// The events attached to this element.
    pub events: Vec<TrackEvent>,
}

/// The ordered track elements of a route.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Track {
    elements: Vec<TrackElement>,
}

impl Track {
    /// Creates a track from elements in ascending position order.
    pub(crate) fn new(elements: Vec<TrackElement>) -> Self {
        Self { elements }
    }

    /// The track elements.
    pub fn elements(&self) -> &[TrackElement] {
        &self.elements
    }

    /// The index of the element containing `pos`, i.e. the last element starting
    /// at or before it. Positions before the first element map to the first element.
    pub fn element_index_at(&self, pos: f64) -> usize {
        self.elements
            .partition_point(|el| el.position <= pos)
            .saturating_sub(1)
    }

    /// Iterates over the absolute positions and events of every element from the one
    /// containing `pos` up to, but not including, the first element starting at or
    /// beyond `pos + horizon`.
    pub fn events_ahead(&self, pos: f64, horizon: f64) -> impl Iterator<Item = (f64, &Event)> {
        let end = pos + horizon;
        self.elements[self.element_index_at(pos)..]
            .iter()
            .take_while(move |el| el.position < end)
            .flat_map(|el| {
                el.events
                    .iter()
                    .map(move |ev| (el.position + ev.offset, &ev.event))
            })
    }

    /// Iterates over the absolute positions and events of the whole track.
    pub fn events(&self) -> impl Iterator<Item = (f64, &Event)> {
        self.elements.iter().flat_map(|el| {
            el.events
                .iter()
                .map(move |ev| (el.position + ev.offset, &ev.event))
        })
    }

    /// The route speed limit in force at `pos`, which is the new limit of the last
    /// limit change at or before it.
    pub fn limit_at(&self, pos: f64) -> f64 {
        self.events()
            .take_while(|(at, _)| *at <= pos)
            .filter_map(|(_, ev)| match ev {
                Event::LimitChange { next, .. } => Some(*next),
                _ => None,
            })
            .last()
            .unwrap_or(f64::INFINITY)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn element(position: f64, events: &[(f64, Event)]) -> TrackElement {
        TrackElement {
            position,
            events: events
                .iter()
                .map(|(offset, event)| TrackEvent {
                    offset: *offset,
                    event: *event,
                })
                .collect(),
        }
    }

    fn sample_track() -> Track {
        Track::new(vec![
            element(0.0, &[]),
            element(25.0, &[(0.0, Event::LimitChange { previous: f64::INFINITY, next: 20.0 })]),
            element(50.0, &[]),
            element(75.0, &[(5.0, Event::LimitChange { previous: 20.0, next: 10.0 })]),
            element(100.0, &[(0.0, Event::TrackEnd)]),
        ])
    }

    #[test]
    fn element_lookup() {
        let track = sample_track();
        assert_eq!(track.element_index_at(-5.0), 0);
        assert_eq!(track.element_index_at(25.0), 1);
        assert_eq!(track.element_index_at(74.9), 2);
        assert_eq!(track.element_index_at(500.0), 4);
    }

    #[test]
    fn events_ahead_stop_at_horizon() {
        let track = sample_track();
        let found: Vec<_> = track.events_ahead(30.0, 50.0).collect();
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].0, 80.0);
        let found: Vec<_> = track.events_ahead(30.0, 45.0).collect();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn limit_lookup() {
        let track = sample_track();
        assert_eq!(track.limit_at(10.0), f64::INFINITY);
        assert_eq!(track.limit_at(25.0), 20.0);
        assert_eq!(track.limit_at(79.0), 20.0);
        assert_eq!(track.limit_at(81.0), 10.0);
    }
}
