use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::core::Interval;
use crate::data::{
    SelectableId, SelectionUpdate, SharedSelectable, SubscriptionId, Table, TableId,
    TableObserver,
};
use crate::error::{StockError, StockResult};
use crate::stock::controller_config::{ControllerConfig, GroupingConfig};
use crate::stock::grouping::Grouping;
use crate::stock::registry::{Registry, Selection};

static NEXT_CONTROLLER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControllerId(u64);

/// Notification emitted to listeners registered with [`Controller::on_signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerSignal {
    DataChanged,
}

/// One of the two independent selection tracks of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionTrack {
    /// The visible window of the plot.
    Primary,
    /// The whole dataset, as shown by scrollers and overviews.
    FullRange,
}

/// Which tracks changed during [`Controller::refresh_selection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshResult {
    pub primary: bool,
    pub full_range: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RegistryRef {
    Main,
    Grouped(Interval),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TrackState {
    pub(crate) registry: RegistryRef,
    pub(crate) selection: Selection,
    pub(crate) interval: Option<Interval>,
    /// Set when sources or data changed since this track last published.
    pub(crate) stale: bool,
}

impl Default for TrackState {
    fn default() -> Self {
        Self {
            registry: RegistryRef::Main,
            selection: Selection::default(),
            interval: None,
            stale: false,
        }
    }
}

type SignalListener = Box<dyn FnMut(ControllerSignal)>;

/// Table observer owned by the controller.
///
/// Only records the invalidation; the controller applies it before its next
/// read.
#[derive(Default)]
struct ControllerSignals {
    pending: Cell<bool>,
    listeners: RefCell<Vec<SignalListener>>,
}

impl ControllerSignals {
    fn emit(&self, signal: ControllerSignal) {
        // a listener that triggers another emit is not re-entered
        let Ok(mut listeners) = self.listeners.try_borrow_mut() else {
            return;
        };
        for listener in listeners.iter_mut() {
            listener(signal);
        }
    }
}

impl TableObserver for ControllerSignals {
    fn table_changed(&self, table: TableId) {
        trace!(table = ?table, "table invalidated");
        self.pending.set(true);
        self.emit(ControllerSignal::DataChanged);
    }
}

struct SourceEntry {
    selectable: SharedSelectable,
    table: Table,
    primary: bool,
    full_range: bool,
}

impl SourceEntry {
    fn on_track(&self, track: SelectionTrack) -> bool {
        match track {
            SelectionTrack::Primary => self.primary,
            SelectionTrack::FullRange => self.full_range,
        }
    }
}

/// Coordinates registries, grouping and selections for every data source of a chart.
pub struct Controller {
    id: ControllerId,
    pixel_width: f64,
    pub(crate) main: Registry,
    pub(crate) registries: HashMap<Interval, Registry>,
    pub(crate) grouping: Grouping,
    pub(crate) full_range_grouping: Grouping,
    pub(crate) primary: TrackState,
    pub(crate) full_range: TrackState,
    sources: IndexMap<SelectableId, SourceEntry>,
    tables: IndexMap<TableId, (Table, SubscriptionId)>,
    signals: Rc<ControllerSignals>,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> StockResult<Self> {
        config.validate()?;
        Ok(Self::with_parts(
            Grouping::from_config(&config.grouping)?,
            Grouping::from_config(&config.full_range_grouping)?,
            config.pixel_width,
        ))
    }

    fn with_parts(grouping: Grouping, full_range_grouping: Grouping, pixel_width: f64) -> Self {
        Self {
            id: ControllerId(NEXT_CONTROLLER_ID.fetch_add(1, Ordering::Relaxed)),
            pixel_width,
            main: Registry::new(),
            registries: HashMap::new(),
            grouping,
            full_range_grouping,
            primary: TrackState::default(),
            full_range: TrackState::default(),
            sources: IndexMap::new(),
            tables: IndexMap::new(),
            signals: Rc::new(ControllerSignals::default()),
        }
    }

    #[must_use]
    pub fn id(&self) -> ControllerId {
        self.id
    }

    #[must_use]
    pub fn pixel_width(&self) -> f64 {
        self.pixel_width
    }

    pub fn set_pixel_width(&mut self, pixel_width: f64) -> StockResult<()> {
        if !pixel_width.is_finite() || pixel_width <= 0.0 {
            return Err(StockError::InvalidConfig(format!(
                "pixel_width must be finite and > 0, got {pixel_width}"
            )));
        }
        self.pixel_width = pixel_width;
        Ok(())
    }

    #[must_use]
    pub fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    #[must_use]
    pub fn full_range_grouping(&self) -> &Grouping {
        &self.full_range_grouping
    }

    /// Replaces primary grouping settings; the next selection applies them.
    pub fn set_grouping(&mut self, config: &GroupingConfig) -> StockResult<()> {
        self.grouping = Grouping::from_config(config)?;
        debug!(enabled = config.enabled, forced = config.forced, "grouping replaced");
        self.signals.emit(ControllerSignal::DataChanged);
        Ok(())
    }

    pub fn set_full_range_grouping(&mut self, config: &GroupingConfig) -> StockResult<()> {
        self.full_range_grouping = Grouping::from_config(config)?;
        debug!(
            enabled = config.enabled,
            forced = config.forced,
            "full-range grouping replaced"
        );
        self.signals.emit(ControllerSignal::DataChanged);
        Ok(())
    }

    /// Edits the grouping of `track` in place.
    ///
    /// A failed edit leaves the previous settings untouched. On success the
    /// track republishes on its next selection.
    pub fn edit_grouping<F>(&mut self, track: SelectionTrack, edit: F) -> StockResult<()>
    where
        F: FnOnce(&mut Grouping) -> StockResult<()>,
    {
        let (grouping, state) = match track {
            SelectionTrack::Primary => (&mut self.grouping, &mut self.primary),
            SelectionTrack::FullRange => (&mut self.full_range_grouping, &mut self.full_range),
        };
        let mut edited = grouping.clone();
        edit(&mut edited)?;
        *grouping = edited;
        state.stale = true;
        debug!(
            track = ?track,
            enabled = grouping.is_enabled(),
            forced = grouping.is_forced(),
            "grouping edited"
        );
        self.signals.emit(ControllerSignal::DataChanged);
        Ok(())
    }

    /// Registers a listener for controller signals.
    pub fn on_signal(&mut self, listener: impl FnMut(ControllerSignal) + 'static) {
        self.signals.listeners.borrow_mut().push(Box::new(listener));
    }

    /// Adds a source to the primary (`allow_selection`) or full-range track.
    ///
    /// Registering the same selectable for the same track twice is a no-op.
    pub fn register_source(
        &mut self,
        selectable: &SharedSelectable,
        allow_selection: bool,
    ) -> &mut Self {
        let (id, table) = {
            let source = selectable.borrow();
            (source.id(), source.mapping().table().clone())
        };
        let entry = self.sources.entry(id).or_insert_with(|| SourceEntry {
            selectable: Rc::clone(selectable),
            table: table.clone(),
            primary: false,
            full_range: false,
        });
        let registered = if allow_selection {
            &mut entry.primary
        } else {
            &mut entry.full_range
        };
        if *registered {
            return self;
        }
        *registered = true;
        selectable.borrow_mut().set_controller(Some(self.id));

        if !self.tables.contains_key(&table.id()) {
            let observer = Rc::downgrade(&self.signals);
            let subscription = table.subscribe(observer);
            self.tables.insert(table.id(), (table.clone(), subscription));
        }
        debug!(
            selectable = ?id,
            table = ?table.id(),
            allow_selection,
            tables = self.tables.len(),
            "source registered"
        );
        self.invalidate_registries();
        self.signals.emit(ControllerSignal::DataChanged);
        self
    }

    /// Removes a source from both tracks and drops tables nobody references.
    pub fn deregister_source(&mut self, selectable: &SharedSelectable) -> &mut Self {
        let id = selectable.borrow().id();
        let Some(entry) = self.sources.shift_remove(&id) else {
            return self;
        };
        entry.selectable.borrow_mut().set_controller(None);

        let sources = &self.sources;
        self.tables.retain(|table_id, (table, subscription)| {
            let referenced = sources
                .values()
                .any(|source| source.table.id() == *table_id);
            if !referenced {
                table.unsubscribe(*subscription);
            }
            referenced
        });
        debug!(
            selectable = ?id,
            table = ?entry.table.id(),
            tables = self.tables.len(),
            "source deregistered"
        );
        self.invalidate_registries();
        self.signals.emit(ControllerSignal::DataChanged);
        self
    }

    #[must_use]
    pub fn sources_count(&self) -> usize {
        self.sources.len()
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> + '_ {
        self.tables.values().map(|(table, _)| table)
    }

    /// Selects `[start_key, end_key]` on the primary track.
    ///
    /// `NaN` endpoints keep the previous endpoint. Returns `true` when the
    /// selection was recomputed and published to the primary sources.
    pub fn select(&mut self, start_key: f64, end_key: f64, force_update: bool) -> bool {
        self.apply_pending_invalidation();
        let start_key = if start_key.is_nan() {
            self.primary.selection.start_key
        } else {
            start_key
        };
        let end_key = if end_key.is_nan() {
            self.primary.selection.end_key
        } else {
            end_key
        };
        if start_key.is_nan() || end_key.is_nan() {
            return false;
        }
        let main_updated = self.ensure_main();
        let target_points = self.grouping.target_points(self.pixel_width);
        self.select_track(
            SelectionTrack::Primary,
            start_key,
            end_key,
            target_points,
            main_updated,
            force_update,
        )
    }

    /// Selects the whole dataset on the full-range track with about `points_count` points.
    pub fn refresh_full_range_sources(&mut self, points_count: f64) -> &mut Self {
        let main_updated = self.ensure_main();
        let (first_key, last_key) = (self.main.first_key(), self.main.last_key());
        self.select_track(
            SelectionTrack::FullRange,
            first_key,
            last_key,
            points_count,
            main_updated,
            false,
        );
        self
    }

    /// Re-runs both tracks after data or width changes.
    ///
    /// A primary window touching a data edge follows the new edge.
    pub fn refresh_selection(&mut self, pixel_width: f64) -> RefreshResult {
        if pixel_width.is_finite() && pixel_width > 0.0 {
            self.pixel_width = pixel_width;
        }
        let sticks_left = self.sticks_left();
        let sticks_right = self.sticks_right();
        let main_updated = self.ensure_main();
        let (first_key, last_key) = (self.main.first_key(), self.main.last_key());

        let mut start_key = self.primary.selection.start_key;
        if start_key.is_nan() || (sticks_left && !first_key.is_nan()) {
            start_key = first_key;
        }
        let mut end_key = self.primary.selection.end_key;
        if end_key.is_nan() || (sticks_right && !last_key.is_nan()) {
            end_key = last_key;
        }

        let mut result = RefreshResult::default();
        if start_key.is_nan() || end_key.is_nan() {
            return result;
        }
        let target_points = self.grouping.target_points(self.pixel_width);
        result.primary = self.select_track(
            SelectionTrack::Primary,
            start_key,
            end_key,
            target_points,
            main_updated,
            false,
        );
        let target_points = self.full_range_grouping.target_points(self.pixel_width);
        result.full_range = self.select_track(
            SelectionTrack::FullRange,
            first_key,
            last_key,
            target_points,
            main_updated,
            false,
        );
        result
    }

    /// Applies recorded table invalidations and rebuilds the main registry if needed.
    pub(crate) fn ensure_main(&mut self) -> bool {
        self.apply_pending_invalidation();
        refresh_registry(&self.tables, &mut self.main, None)
    }

    /// Ensures the registry behind `track` is current and returns it.
    pub(crate) fn track_registry(&mut self, track: SelectionTrack) -> &Registry {
        self.ensure_main();
        let registry = self.track(track).registry;
        if let RegistryRef::Grouped(interval) = registry {
            if let Some(grouped) = self.registries.get_mut(&interval) {
                refresh_registry(&self.tables, grouped, Some(interval));
            }
        }
        self.registry(registry)
    }

    pub(crate) fn registry(&self, registry: RegistryRef) -> &Registry {
        match registry {
            RegistryRef::Main => &self.main,
            RegistryRef::Grouped(interval) => self.registries.get(&interval).unwrap_or(&self.main),
        }
    }

    pub(crate) fn track(&self, track: SelectionTrack) -> &TrackState {
        match track {
            SelectionTrack::Primary => &self.primary,
            SelectionTrack::FullRange => &self.full_range,
        }
    }

    fn apply_pending_invalidation(&mut self) {
        if !self.signals.pending.replace(false) {
            return;
        }
        self.invalidate_registries();
        for entry in self.sources.values().filter(|entry| entry.primary) {
            entry.selectable.borrow_mut().invalidate_selection();
        }
        debug!(cached_registries = self.registries.len(), "table invalidation applied");
    }

    fn invalidate_registries(&mut self) {
        self.main.set_dirty();
        for registry in self.registries.values_mut() {
            registry.set_dirty();
        }
        // registries may be rebuilt by any read, so each track keeps its own flag
        self.primary.stale = true;
        self.full_range.stale = true;
    }

    fn select_track(
        &mut self,
        track: SelectionTrack,
        start_key: f64,
        end_key: f64,
        target_points: f64,
        main_updated: bool,
        force_update: bool,
    ) -> bool {
        if start_key.is_nan() || end_key.is_nan() {
            return false;
        }
        let (mut start_key, mut end_key) = if start_key > end_key {
            (end_key, start_key)
        } else {
            (start_key, end_key)
        };
        if end_key - start_key < 1.0 {
            if start_key + 1.0 <= self.main.last_key() {
                end_key = start_key + 1.0;
            } else {
                start_key = end_key - 1.0;
            }
        }

        let current = *self.track(track);
        let range_changed =
            start_key != current.selection.start_key || end_key != current.selection.end_key;

        let grouping = match track {
            SelectionTrack::Primary => &mut self.grouping,
            SelectionTrack::FullRange => &mut self.full_range_grouping,
        };
        let interval = grouping.choose_interval(start_key, end_key, target_points, &self.main);

        let (registry, registry_updated) = match interval {
            None => (RegistryRef::Main, main_updated),
            Some(interval) => {
                let grouped = self.registries.entry(interval).or_default();
                let updated = refresh_registry(&self.tables, grouped, Some(interval));
                (RegistryRef::Grouped(interval), updated)
            }
        };

        if !(force_update
            || current.stale
            || range_changed
            || registry != current.registry
            || registry_updated
            || main_updated)
        {
            trace!(track = ?track, start_key, end_key, "selection unchanged");
            return false;
        }

        let resolved = self.registry(registry);
        let selection = resolved.selection(start_key, end_key);
        let sync_mode = resolved.is_in_sync_mode();
        let update = if sync_mode {
            SelectionUpdate::Fast {
                selection,
                interval,
            }
        } else {
            SelectionUpdate::Mapped {
                start_key,
                end_key,
                interval,
            }
        };
        for entry in self.sources.values().filter(|entry| entry.on_track(track)) {
            entry.selectable.borrow_mut().apply_selection(update);
        }

        let state = TrackState {
            registry,
            selection,
            interval,
            stale: false,
        };
        match track {
            SelectionTrack::Primary => self.primary = state,
            SelectionTrack::FullRange => self.full_range = state,
        }
        debug!(
            track = ?track,
            start_key,
            end_key,
            interval = ?interval,
            sync_mode,
            "selection published"
        );
        true
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::with_parts(
            Grouping::default(),
            Grouping::full_range(),
            ControllerConfig::new().pixel_width,
        )
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("id", &self.id)
            .field("pixel_width", &self.pixel_width)
            .field("sources", &self.sources.len())
            .field("tables", &self.tables.len())
            .field("cached_registries", &self.registries.len())
            .finish()
    }
}

fn refresh_registry(
    tables: &IndexMap<TableId, (Table, SubscriptionId)>,
    registry: &mut Registry,
    interval: Option<Interval>,
) -> bool {
    if !registry.is_dirty() {
        return false;
    }
    registry.reset_sources();
    for (table, _) in tables.values() {
        registry.add_source(table.storage(interval));
    }
    registry.update()
}
