//! The fixed-block signalling network.

use crate::debug::debug_aspect;
use crate::plugin::SignalData;
use crate::section::{AspectKind, FreeSections, Section};
use crate::station::Station;
use crate::train::{Train, TrainState};
use crate::{TrainId, TrainSet};
use arrayvec::ArrayVec;
use log::trace;

/// The most signals reported to a plugin at once.
pub const MAX_PLUGIN_SIGNALS: usize = 16;

/// Lead time before departure at which a departure signal may clear, in s.
const DEPARTURE_GRACE: f64 = 15.0; // s

/// The world state the signalling network reads.
#[derive(Clone, Copy)]
pub struct SignalContext<'a> {
    pub trains: &'a TrainSet,
    pub stations: &'a [Station],
    /// Seconds since midnight.
    pub clock: f64,
    pub player: Option<TrainId>,
}

/// The chain of signalling sections and their aspects.
#[derive(Clone, Debug, Default)]
pub struct Signalling {
    sections: Vec<Section>,
}

impl Signalling {
    /// Creates a network from sections whose links have already been validated.
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn get_section(&self, idx: usize) -> Option<&Section> {
        self.sections.get(idx)
    }

    /// Recomputes the aspect of every section, cascading from the last.
    pub fn update_all_sections(&mut self, ctx: &SignalContext) {
        if let Some(last) = self.sections.len().checked_sub(1) {
            self.update_section(last, ctx);
        }
    }

    /// Recomputes the aspect of a section, then of every section behind it.
    /// Out of range indices are ignored.
    pub fn update_section(&mut self, idx: usize, ctx: &SignalContext) {
        let mut next = Some(idx).filter(|i| *i < self.sections.len());
        let mut remaining = self.sections.len();
        while let Some(idx) = next {
            if remaining == 0 {
                break;
            }
            remaining -= 1;
            self.recompute(idx, ctx);
            next = self.sections[idx]
                .previous
                .filter(|i| *i < self.sections.len());
        }
    }

    /// Recomputes the free section count and aspect of a single section.
    fn recompute(&mut self, idx: usize, ctx: &SignalContext) {
        let mut held = self.station_hold(idx, ctx);
        let section = &self.sections[idx];
        if !section.is_free(ctx.trains) {
            held = true;
        }

        let ahead = section.next.and_then(|n| self.sections.get(n));
        let free = if held {
            FreeSections::Count(0)
        } else {
            match ahead {
                Some(ahead) => ahead.free_sections().behind(),
                None => FreeSections::Unbounded,
            }
        };

        let last = section.aspects.len().saturating_sub(1);
        let aspect = if held {
            section.zero_aspect()
        } else {
            match section.kind {
                AspectKind::ValueBased => {
                    let number = ahead
                        .and_then(|s| s.aspect())
                        .map(|a| a.number)
                        .unwrap_or_else(|| section.last_number());
                    section.first_above(number)
                }
                AspectKind::IndexBased => match free {
                    FreeSections::Count(n) if n < section.aspects.len() => n,
                    _ => last,
                },
            }
        };

        if section.current_aspect() != Some(aspect) {
            trace!("section {} shows aspect {}", idx, aspect);
            debug_aspect(idx, aspect);
        }
        self.sections[idx].set_state(aspect, free);
    }

    /// Whether the section's departure signal must be held at stop for its station.
    /// Records when the train being held reaches its stop point.
    fn station_hold(&mut self, idx: usize, ctx: &SignalContext) -> bool {
        let Some(d) = self.sections[idx].station else {
            return false;
        };
        let Some(station) = ctx.stations.get(d) else {
            return false;
        };

        let train = self
            .train_behind(idx, ctx.trains)
            .or_else(|| most_delayed_train(ctx.trains))
            .and_then(|id| ctx.trains.get(id));
        let Some(train) = train else {
            return !station.is_normal();
        };

        if !self.sections[idx].reached_stop_point() && train.station() == Some(d) {
            let reached = match station.stop_for(train.attributes().cars) {
                Some(stop) => train.pos_front() >= stop.position - stop.backward_tolerance,
                None => true,
            };
            if reached {
                self.sections[idx].set_reached_stop_point();
            }
        }

        let t = station
            .departure_time
            .map(|dep| dep - DEPARTURE_GRACE)
            .or(station.arrival_time)
            .unwrap_or(-DEPARTURE_GRACE);
        if ctx.player == Some(train.id())
            && !station.is_normal()
            && station.departure_time.is_none()
        {
            true
        } else if t >= 0.0 && ctx.clock < t - train.timetable_delta() {
            true
        } else {
            !self.sections[idx].reached_stop_point()
        }
    }

    /// The first available train found walking back from the section before `idx`.
    fn train_behind(&self, idx: usize, trains: &TrainSet) -> Option<TrainId> {
        let mut prev = self.sections[idx].previous;
        let mut remaining = self.sections.len();
        while let Some(i) = prev {
            let section = self.sections.get(i)?;
            if let Some(id) = section.first_train(trains) {
                return Some(id);
            }
            if remaining == 0 {
                break;
            }
            remaining -= 1;
            prev = section.previous;
        }
        None
    }

    /// The signal data a plugin on `train` sees for section `idx`. A section the train
    /// is alone in reports the aspect it would show once the train has left it.
    pub fn plugin_signal(&self, train: &Train, idx: usize, trains: &TrainSet) -> Option<SignalData> {
        let section = self.sections.get(idx)?;
        let alone = section.occupants().contains(&train.id())
            && section.is_free_except(train.id(), trains);

        let aspect = if alone {
            let ahead = section.next.and_then(|n| self.sections.get(n));
            match (section.kind, ahead) {
                (AspectKind::IndexBased, Some(ahead)) => {
                    let last = section.aspects.len().saturating_sub(1);
                    let idx = match ahead.free_sections() {
                        FreeSections::Unbounded => last,
                        FreeSections::Count(n) => (n + 1).min(last),
                    };
                    section.aspects.get(idx).map_or(0, |a| a.number)
                }
                (AspectKind::ValueBased, Some(ahead)) => match ahead.aspect() {
                    Some(a) => section
                        .aspects
                        .get(section.first_above(a.number))
                        .map_or(0, |a| a.number),
                    None => section.last_number(),
                },
                (_, None) => section.last_number(),
            }
        } else {
            section
                .aspect()
                .map(|a| a.number)
                .unwrap_or_else(|| section.last_number())
        };
        Some(SignalData {
            aspect,
            distance: section.position - train.pos_front(),
        })
    }

    /// The signals ahead of `train` for its plugin, starting at its current section and
    /// ending after the first stop aspect.
    pub fn plugin_sections(
        &self,
        train: &Train,
        trains: &TrainSet,
    ) -> ArrayVec<SignalData, MAX_PLUGIN_SIGNALS> {
        let mut signals = ArrayVec::new();
        let mut idx = Some(train.current_section().unwrap_or(0));
        while let Some(i) = idx {
            let Some(signal) = self.plugin_signal(train, i, trains) else {
                break;
            };
            signals.push(signal);
            if signal.aspect == 0 || signals.is_full() {
                break;
            }
            idx = self.sections[i].next;
        }
        signals
    }

    /// Records which trains occupy each section.
    pub(crate) fn set_occupants(&mut self, idx: usize, occupants: &[TrainId]) {
        if let Some(section) = self.sections.get_mut(idx) {
            section.set_occupants(occupants);
        }
    }
}

/// The available train furthest behind schedule.
fn most_delayed_train(trains: &TrainSet) -> Option<TrainId> {
    trains
        .values()
        .filter(|t| t.state() == TrainState::Available)
        .fold(None, |best: Option<&Train>, t| match best {
            Some(b) if b.timetable_delta() >= t.timetable_delta() => Some(b),
            _ => Some(t),
        })
        .map(|t| t.id())
}
