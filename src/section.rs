use crate::{TrainId, TrainSet};
use itertools::Itertools;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// How a section's aspects are chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AspectKind {
    /// The aspect is the next one coded above the aspect of the section ahead.
    ValueBased,
    /// The aspect index is the number of free sections ahead.
    #[default]
    IndexBased,
}

/// A signal aspect and the speed it permits.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SectionAspect {
    /// The aspect code, zero being stop.
    pub number: i32,
    /// The permitted speed in m/s.
    pub speed: f64,
}

impl SectionAspect {
    pub const fn new(number: i32, speed: f64) -> Self {
        Self { number, speed }
    }
}

/// The number of consecutive free sections from a section onwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FreeSections {
    Count(usize),
    /// Every section up to the end of the chain is free.
    Unbounded,
}

impl Default for FreeSections {
    fn default() -> Self {
        FreeSections::Count(0)
    }
}

impl FreeSections {
    /// The value for a free section behind one with `self` free sections.
    pub fn behind(self) -> Self {
        match self {
            FreeSections::Count(n) => FreeSections::Count(n + 1),
            FreeSections::Unbounded => FreeSections::Unbounded,
        }
    }
}

/// A signalling block.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Section {
    /// The track position of the start of the section, where its signal stands.
    pub position: f64,
    pub kind: AspectKind,
    /// The aspects the signal can show, most restrictive first.
    pub aspects: Vec<SectionAspect>,
    /// The station whose departure this section's signal controls.
    pub station: Option<usize>,
    pub previous: Option<usize>,
    pub next: Option<usize>,
    /// Whether the signal is invisible to drivers.
    pub invisible: bool,
    current_aspect: Option<usize>,
    free_sections: FreeSections,
    reached_stop_point: bool,
    occupants: SmallVec<[TrainId; 2]>,
}

impl Section {
    /// Creates a new, unlinked section.
    pub fn new(position: f64, kind: AspectKind, aspects: Vec<SectionAspect>) -> Self {
        Self {
            position,
            kind,
            aspects,
            station: None,
            previous: None,
            next: None,
            invisible: false,
            current_aspect: None,
            free_sections: FreeSections::default(),
            reached_stop_point: false,
            occupants: SmallVec::new(),
        }
    }

    /// The index of the aspect currently shown, once computed.
    pub fn current_aspect(&self) -> Option<usize> {
        self.current_aspect
    }

    /// The aspect currently shown, once computed.
    pub fn aspect(&self) -> Option<&SectionAspect> {
        self.current_aspect.and_then(|idx| self.aspects.get(idx))
    }

    /// The speed permitted by the current aspect, if it is visible to drivers.
    pub fn visible_speed(&self) -> Option<f64> {
        if self.invisible {
            None
        } else {
            self.aspect().map(|a| a.speed)
        }
    }

    pub fn free_sections(&self) -> FreeSections {
        self.free_sections
    }

    /// Whether the train held at this section's station reached its stop point.
    pub fn reached_stop_point(&self) -> bool {
        self.reached_stop_point
    }

    /// The trains with any part inside the section.
    pub fn occupants(&self) -> &[TrainId] {
        &self.occupants
    }

    /// The index of the most restrictive aspect.
    pub fn zero_aspect(&self) -> usize {
        match self.kind {
            AspectKind::ValueBased => self
                .aspects
                .iter()
                .position_min_by_key(|a| a.number)
                .unwrap_or(0),
            AspectKind::IndexBased => 0,
        }
    }

    /// The code of the last, most permissive aspect.
    pub(crate) fn last_number(&self) -> i32 {
        self.aspects.last().map(|a| a.number).unwrap_or(0)
    }

    /// The index of the first aspect coded above `number`, or the last aspect.
    pub(crate) fn first_above(&self, number: i32) -> usize {
        self.aspects
            .iter()
            .position(|a| a.number > number)
            .unwrap_or(self.aspects.len().saturating_sub(1))
    }

    /// Whether no present train occupies the section.
    pub fn is_free(&self, trains: &TrainSet) -> bool {
        self.present(trains).next().is_none()
    }

    /// Whether no present train other than `train` occupies the section.
    pub fn is_free_except(&self, train: TrainId, trains: &TrainSet) -> bool {
        self.present(trains).all(|id| id == train)
    }

    /// The first available (not bogus) occupant.
    pub fn first_train(&self, trains: &TrainSet) -> Option<TrainId> {
        self.occupants.iter().copied().find(|id| {
            trains
                .get(*id)
                .map_or(false, |t| t.state() == crate::TrainState::Available)
        })
    }

    fn present<'a>(&'a self, trains: &'a TrainSet) -> impl Iterator<Item = TrainId> + 'a {
        self.occupants
            .iter()
            .copied()
            .filter(move |id| trains.get(*id).map_or(false, |t| t.is_present()))
    }

    pub(crate) fn set_state(&mut self, aspect: usize, free: FreeSections) {
        self.current_aspect = Some(aspect);
        self.free_sections = free;
    }

    pub(crate) fn set_reached_stop_point(&mut self) {
        self.reached_stop_point = true;
    }

    /// Replaces the occupants. A train entering the section clears the stop point flag.
    pub(crate) fn set_occupants(&mut self, occupants: &[TrainId]) {
        if occupants.iter().any(|id| !self.occupants.contains(id)) {
            self.reached_stop_point = false;
        }
        self.occupants.clear();
        self.occupants.extend_from_slice(occupants);
    }
}
