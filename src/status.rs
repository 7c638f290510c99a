use crate::station::StationId;
use hashbrown::HashMap;

/// Lifecycle timestamps for one issued instruction, keyed by the cycle in
/// which each stage happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEntry {
    pub label: String,
    pub station: Option<StationId>,
    pub issued: u64,
    pub start_exec: Option<u64>,
    pub end_exec: Option<u64>,
    pub write: Option<u64>,
}

/// Append-only table of instruction lifecycles, in issue order. Stage
/// updates arrive keyed by station id; the open entry for that station is
/// tracked so the broadcast-matching path never compares labels.
#[derive(Debug, Clone, Default)]
pub struct StatusTable {
    entries: Vec<LifecycleEntry>,
    open: HashMap<StationId, usize>,
}

impl StatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_issue(&mut self, label: String, station: Option<StationId>, cycle: u64) {
        if let Some(id) = station {
            self.open.insert(id, self.entries.len());
        }

        self.entries.push(LifecycleEntry {
            label,
            station,
            issued: cycle,
            start_exec: None,
            end_exec: None,
            write: None,
        });
    }

    pub fn record_start_exec(&mut self, station: StationId, cycle: u64) {
        if let Some(entry) = self.entry_mut(station) {
            entry.start_exec = Some(cycle);
        }
    }

    pub fn record_end_exec(&mut self, station: StationId, cycle: u64) {
        if let Some(entry) = self.entry_mut(station) {
            entry.end_exec = Some(cycle);
        }
    }

    pub fn record_write(&mut self, station: StationId, cycle: u64) {
        if let Some(entry) = self.entry_mut(station) {
            entry.write = Some(cycle);
        }
    }

    pub fn entries(&self) -> &[LifecycleEntry] {
        &self.entries
    }

    // Stage updates for a station with no recorded issue are dropped.
    fn entry_mut(&mut self, station: StationId) -> Option<&mut LifecycleEntry> {
        let idx = *self.open.get(&station)?;
        self.entries.get_mut(idx)
    }
}
