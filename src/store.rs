//! # Track Store
//!
//! Holds the primary track and, in compare mode, one secondary track.
//!
//! Loading is split in two halves so the store never blocks on the network:
//! [`TrackStore::begin_load`] hands out a [`LoadTicket`], and the host passes it
//! back to [`TrackStore::complete_load`] together with the fetch result. Only
//! the most recent ticket per slot is honoured, so a slow response cannot
//! overwrite a later selection. The previously loaded track stays in place
//! while a load is pending.

use log::{debug, info, warn};

use crate::error::{ReplayError, Result};
use crate::index::TimestampIndex;
use crate::{Sample, Track, TrackId};

/// Which track slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Primary,
    Secondary,
}

/// Observable state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    /// A fetch is in flight (a previous track may still be loaded)
    Loading,
    Loaded,
}

/// Receipt for an in-flight load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    slot: Slot,
    id: TrackId,
    generation: u64,
}

impl LoadTicket {
    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn id(&self) -> &TrackId {
        &self.id
    }
}

/// Result of handing a fetch result back to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Track installed with this revision
    Applied { revision: u64 },
    /// A newer selection superseded this ticket, result dropped
    Stale,
    /// Fetch failed, slot left as it was
    Failed(ReplayError),
}

#[derive(Debug, Clone)]
struct LoadedTrack {
    track: Track,
    revision: u64,
    index: TimestampIndex,
}

#[derive(Debug, Clone, Default)]
struct TrackSlot {
    /// Id most recently requested for this slot
    selected: Option<TrackId>,
    pending: Option<u64>,
    loaded: Option<LoadedTrack>,
}

impl TrackSlot {
    fn state(&self) -> SlotState {
        if self.pending.is_some() {
            SlotState::Loading
        } else if self.loaded.is_some() {
            SlotState::Loaded
        } else {
            SlotState::Empty
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrackStore {
    primary: TrackSlot,
    secondary: TrackSlot,
    compare_mode: bool,
    next_generation: u64,
    next_revision: u64,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, slot: Slot) -> &TrackSlot {
        match slot {
            Slot::Primary => &self.primary,
            Slot::Secondary => &self.secondary,
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut TrackSlot {
        match slot {
            Slot::Primary => &mut self.primary,
            Slot::Secondary => &mut self.secondary,
        }
    }

    // ========================================================================
    // Compare Mode
    // ========================================================================

    pub fn compare_mode(&self) -> bool {
        self.compare_mode
    }

    /// Enter or leave compare mode. Leaving discards the secondary track.
    pub fn set_compare_mode(&mut self, enabled: bool) {
        if self.compare_mode == enabled {
            return;
        }
        self.compare_mode = enabled;
        if !enabled {
            self.clear(Slot::Secondary);
        }
        debug!("[TrackStore] compare mode {}", if enabled { "on" } else { "off" });
    }

    /// Slot a list selection goes to under the current mode.
    pub fn target_slot(&self) -> Slot {
        if self.compare_mode {
            Slot::Secondary
        } else {
            Slot::Primary
        }
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Start loading `id` into `slot`.
    ///
    /// Returns `None` when `id` is already selected for that slot, or when a
    /// secondary load is requested outside compare mode.
    pub fn begin_load(&mut self, slot: Slot, id: TrackId) -> Option<LoadTicket> {
        if slot == Slot::Secondary && !self.compare_mode {
            warn!("[TrackStore] secondary load of {} ignored outside compare mode", id);
            return None;
        }
        if self.slot(slot).selected.as_ref() == Some(&id) {
            return None;
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let s = self.slot_mut(slot);
        s.selected = Some(id.clone());
        s.pending = Some(generation);

        debug!("[TrackStore] loading {} into {:?} (generation {})", id, slot, generation);
        Some(LoadTicket {
            slot,
            id,
            generation,
        })
    }

    /// Finish a load started with [`begin_load`](Self::begin_load).
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<Sample>>,
    ) -> LoadOutcome {
        if self.slot(ticket.slot).pending != Some(ticket.generation) {
            debug!(
                "[TrackStore] dropping stale response for {} (generation {})",
                ticket.id, ticket.generation
            );
            return LoadOutcome::Stale;
        }

        match result {
            Ok(samples) => {
                self.next_revision += 1;
                let revision = self.next_revision;
                info!(
                    "[TrackStore] {:?} <- track {} ({} samples)",
                    ticket.slot,
                    ticket.id,
                    samples.len()
                );
                let index = TimestampIndex::build(&samples);
                let s = self.slot_mut(ticket.slot);
                s.pending = None;
                s.loaded = Some(LoadedTrack {
                    track: Track::new(ticket.id, samples),
                    revision,
                    index,
                });
                LoadOutcome::Applied { revision }
            }
            Err(e) => {
                warn!("[TrackStore] failed to load track {}: {}", ticket.id, e);
                let s = self.slot_mut(ticket.slot);
                s.pending = None;
                // Back to whatever is still displayed, so the same id can be retried
                s.selected = s.loaded.as_ref().map(|l| l.track.id.clone());
                LoadOutcome::Failed(e)
            }
        }
    }

    /// Drop the slot's track and any pending load.
    pub fn clear(&mut self, slot: Slot) {
        *self.slot_mut(slot) = TrackSlot::default();
    }

    // ========================================================================
    // Swap
    // ========================================================================

    /// Exchange primary and secondary. Pending loads are abandoned.
    pub fn swap(&mut self) -> Result<()> {
        if !self.compare_mode || self.primary.loaded.is_none() || self.secondary.loaded.is_none() {
            return Err(ReplayError::NothingToSwap);
        }
        std::mem::swap(&mut self.primary, &mut self.secondary);
        for s in [&mut self.primary, &mut self.secondary] {
            s.pending = None;
            s.selected = s.loaded.as_ref().map(|l| l.track.id.clone());
        }
        info!(
            "[TrackStore] swapped, primary is now {}",
            self.primary.selected.as_ref().map(|id| id.to_string()).unwrap_or_default()
        );
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn state(&self, slot: Slot) -> SlotState {
        self.slot(slot).state()
    }

    pub fn track(&self, slot: Slot) -> Option<&Track> {
        self.slot(slot).loaded.as_ref().map(|l| &l.track)
    }

    /// Changes whenever the slot receives a different track.
    pub fn revision(&self, slot: Slot) -> Option<u64> {
        self.slot(slot).loaded.as_ref().map(|l| l.revision)
    }

    pub fn timestamp_index(&self, slot: Slot) -> Option<&TimestampIndex> {
        self.slot(slot).loaded.as_ref().map(|l| &l.index)
    }

    pub fn selected_id(&self, slot: Slot) -> Option<&TrackId> {
        self.slot(slot).selected.as_ref()
    }

    pub fn primary(&self) -> Option<&Track> {
        self.track(Slot::Primary)
    }

    pub fn secondary(&self) -> Option<&Track> {
        self.track(Slot::Secondary)
    }
}
