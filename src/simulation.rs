use crate::config::SimulationConfig;
#[cfg(feature = "debug")]
use crate::debug::take_debug_frame;
use crate::driver::{update_stop_state, Autopilot, HumanDriver, PrecursorDriver, TriggerInput};
use crate::plugin::Plugin;
use crate::route::Route;
use crate::signalling::{SignalContext, Signalling};
use crate::station::StopState;
use crate::train::{
    Command, ControlBuffer, StopSkipMode, Train, TrainAttributes, TrainState,
};
use crate::{TrainId, TrainSet};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slotmap::SecondaryMap;
use smallvec::SmallVec;

/// Limit granted to a train stopped after passing a signal at stop, in m/s.
const PROCEED_ON_SIGHT_LIMIT: f64 = 25.0 / 3.6; // m/s

/// Speed below which a train stopped at a signal may proceed on sight, in m/s.
const PROCEED_ON_SIGHT_SPEED: f64 = 0.03; // m/s

/// A rail simulation.
pub struct Simulation {
    /// The route being run on.
    route: Route,
    /// The live state of the signalling sections.
    signalling: Signalling,
    /// The trains being simulated.
    trains: TrainSet,
    /// The drivers of the trains that are not driven from outside.
    drivers: SecondaryMap<TrainId, Box<dyn Autopilot>>,
    /// Plugins installed on trains.
    plugins: SecondaryMap<TrainId, Box<dyn Plugin>>,
    /// Seconds since midnight.
    clock: f64,
    /// The current frame of simulation.
    frame: usize,
    /// The train driven by the player, if any.
    player: Option<TrainId>,
    config: SimulationConfig,
    /// Seeds the random number generators of new drivers.
    rng: StdRng,
    /// Debugging information from the previously simulated frame.
    #[cfg(feature = "debug")]
    debug: serde_json::Value,
}

impl Simulation {
    /// Creates a new simulation on the given route.
    pub fn new(route: Route, config: SimulationConfig) -> Self {
        Self {
            signalling: Signalling::new(route.sections().to_vec()),
            route,
            trains: TrainSet::with_key(),
            drivers: SecondaryMap::new(),
            plugins: SecondaryMap::new(),
            clock: 0.0,
            frame: 0,
            player: None,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            #[cfg(feature = "debug")]
            debug: serde_json::Value::Null,
        }
    }

    /// Adds a train with its front at `pos`, driven from outside through [Self::command].
    pub fn add_train(&mut self, attributes: &TrainAttributes, pos: f64) -> TrainId {
        self.trains
            .insert_with_key(|id| Train::new(id, attributes, pos))
    }

    /// Adds a train with its front at `pos`, driven by an AI driver.
    pub fn add_ai_train(&mut self, attributes: &TrainAttributes, pos: f64) -> TrainId {
        let id = self.add_train(attributes, pos);
        let driver = HumanDriver::new(&self.trains[id], self.config.ai_speed_limit, self.rng.gen());
        self.drivers.insert(id, Box::new(driver));
        id
    }

    /// Adds a bogus train that replays the route's precursor schedule.
    pub fn add_bogus_train(&mut self, attributes: &TrainAttributes) -> TrainId {
        let pos = self
            .route
            .instructions()
            .first()
            .map_or(0.0, |ins| ins.position);
        let id = self.add_train(attributes, pos);
        self.trains[id].set_state(TrainState::Bogus);
        self.drivers.insert(id, Box::new(PrecursorDriver::new()));
        id
    }

    /// Replaces the driver of a train.
    pub fn set_autopilot(&mut self, train_id: TrainId, driver: Box<dyn Autopilot>) {
        if self.trains.contains_key(train_id) {
            self.drivers.insert(train_id, driver);
        }
    }

    /// Installs a plugin on a train.
    pub fn set_plugin(&mut self, train_id: TrainId, plugin: Box<dyn Plugin>) {
        if self.trains.contains_key(train_id) {
            self.plugins.insert(train_id, plugin);
        }
    }

    /// Sets which train is the player's.
    pub fn set_player(&mut self, train_id: Option<TrainId>) {
        self.player = train_id;
    }

    pub fn player(&self) -> Option<TrainId> {
        self.player
    }

    /// Removes a train along with its driver and plugin.
    pub fn remove_train(&mut self, train_id: TrainId) {
        self.trains.remove(train_id);
        self.drivers.remove(train_id);
        self.plugins.remove(train_id);
        if self.player == Some(train_id) {
            self.player = None;
        }
    }

    /// Applies commands to a train immediately.
    pub fn command(&mut self, train_id: TrainId, commands: &[Command]) {
        if let Some(train) = self.trains.get_mut(train_id) {
            train.execute(commands);
        }
    }

    /// Sets the time of day in seconds since midnight.
    pub fn set_clock(&mut self, clock: f64) {
        self.clock = clock;
    }

    /// Gets the time of day in seconds since midnight.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Advances the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        self.clock += dt;
        self.locate_trains();
        self.update_signals();
        self.export_plugin_signals();
        self.update_stop_states();
        self.trigger_drivers();
        self.remove_disposed();
        self.integrate(dt);
        self.frame += 1;

        #[cfg(feature = "debug")]
        {
            self.debug = take_debug_frame();
        }
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// The signalling network, with the aspects computed in the last frame.
    pub fn signalling(&self) -> &Signalling {
        &self.signalling
    }

    /// Returns an iterator over all the trains in the simulation.
    pub fn iter_trains(&self) -> impl Iterator<Item = &Train> {
        self.trains.values()
    }

    /// Gets a reference to the train with the given ID.
    pub fn get_train(&self, train_id: TrainId) -> Option<&Train> {
        self.trains.get(train_id)
    }

    /// Gets a mutable reference to the train with the given ID.
    pub fn get_train_mut(&mut self, train_id: TrainId) -> Option<&mut Train> {
        self.trains.get_mut(train_id)
    }

    /// Gets the debugging information for the previously simulated frame as JSON array.
    #[cfg(feature = "debug")]
    pub fn debug(&mut self) -> serde_json::Value {
        self.debug.clone()
    }

    /// Finds the section, station zone and speed limits of every train,
    /// and records which trains occupy each section.
    fn locate_trains(&mut self) {
        let sections = self.route.sections().len();
        let spans: Vec<_> = (0..sections)
            .filter_map(|idx| self.route.section_span(idx))
            .collect();
        let mut occupancy: Vec<SmallVec<[TrainId; 2]>> = vec![SmallVec::new(); sections];

        for (id, train) in &mut self.trains {
            if !train.is_present() {
                continue;
            }
            let front = train.pos_front();
            let rear = train.pos_rear();
            for (idx, span) in spans.iter().enumerate() {
                if span.min <= front && rear < span.max {
                    occupancy[idx].push(id);
                }
            }

            let section = self.route.section_at(front);
            if section != train.current_section {
                train.current_section = section;
                train.section_limit = section
                    .and_then(|idx| self.signalling.get_section(idx))
                    .and_then(|s| s.visible_speed())
                    .unwrap_or(f64::INFINITY);
            }
            if train.section_limit == 0.0
                && train.controls().emergency
                && train.vel().abs() < PROCEED_ON_SIGHT_SPEED
            {
                train.section_limit = PROCEED_ON_SIGHT_LIMIT;
            }

            let zone = self.route.station_at(front);
            if zone != train.zone {
                if train.zone.is_some() {
                    // A skip only applies to the next station
                    train.set_stop_skip(StopSkipMode::None);
                }
                if zone.is_some() {
                    train.last_station = zone;
                }
                train.zone = zone;
                train.station = zone.filter(|_| train.stop_skip() == StopSkipMode::None);
                train.stop_state = StopState::Pending;
            }
            train.route_limit = self.route.track().limit_at(front);
        }

        for (idx, occupants) in occupancy.iter().enumerate() {
            self.signalling.set_occupants(idx, occupants);
        }
    }

    fn update_signals(&mut self) {
        let ctx = SignalContext {
            trains: &self.trains,
            stations: self.route.stations(),
            clock: self.clock,
            player: self.player,
        };
        self.signalling.update_all_sections(&ctx);
    }

    fn export_plugin_signals(&mut self) {
        for (id, plugin) in self.plugins.iter_mut() {
            if let Some(train) = self.trains.get(id) {
                let signals = self.signalling.plugin_sections(train, &self.trains);
                plugin.update_signals(&signals);
            }
        }
    }

    fn update_stop_states(&mut self) {
        for (id, train) in &mut self.trains {
            if train.state() != TrainState::Available {
                continue;
            }
            if let Some(station) = train.station().and_then(|idx| self.route.station(idx)) {
                update_stop_state(train, station, self.clock, self.player == Some(id));
            }
        }
    }

    /// Lets every driver decide, then applies what they asked for.
    fn trigger_drivers(&mut self) {
        let mut pending = vec![];
        for (id, driver) in self.drivers.iter_mut() {
            let Some(train) = self.trains.get(id).filter(|t| t.is_present()) else {
                continue;
            };
            let input = TriggerInput {
                train,
                route: &self.route,
                sections: self.signalling.sections(),
                trains: &self.trains,
                clock: self.clock,
                player: self.player,
            };
            let mut buffer = ControlBuffer::new(train.attributes(), train.controls());
            let plugin = self
                .plugins
                .get_mut(id)
                .map(|p| &mut **p as &mut dyn Plugin);
            driver.trigger(&input, plugin, &mut buffer);
            pending.push((id, buffer.into_commands()));
        }

        for (id, commands) in pending {
            if let Some(train) = self.trains.get_mut(id) {
                train.execute(&commands);
            }
        }
    }

    fn remove_disposed(&mut self) {
        let disposed: Vec<_> = self
            .trains
            .iter()
            .filter(|(_, t)| t.state() == TrainState::Disposed)
            .map(|(id, _)| id)
            .collect();
        for id in disposed {
            info!("disposing of train {:?}", id);
            self.remove_train(id);
        }
    }

    /// Integrates the velocities and positions of all trains.
    fn integrate(&mut self, dt: f64) {
        for train in self.trains.values_mut() {
            if train.is_present() {
                train.integrate(dt);
            }
        }
    }
}
