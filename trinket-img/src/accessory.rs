use anyhow::Result;
use image::RgbaImage;
use tracing::{debug, warn};

pub mod loader;

pub use loader::{FileLoader, ImageLoader, spawn_load};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Earring,
    Necklace,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::Earring, Slot::Necklace];

    /// Catalog categories route by name: anything mentioning earrings goes to
    /// the earring slot, everything else is worn at the neck.
    pub fn for_category(category: &str) -> Slot {
        if category.to_lowercase().contains("earring") {
            Slot::Earring
        } else {
            Slot::Necklace
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Absent,
    Pending,
    Loaded,
}

/// Issued by [`AccessoryStore::select`]; hand it back with the load result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub slot: Slot,
    pub token: u64,
    pub source: String,
}

#[derive(Debug, Default)]
struct SlotState {
    source: Option<String>,
    image: Option<RgbaImage>,
    token: u64,
}

#[derive(Debug, Default)]
pub struct AccessoryStore {
    earring: SlotState,
    necklace: SlotState,
    next_token: u64,
}

impl AccessoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, slot: Slot) -> &SlotState {
        match slot {
            Slot::Earring => &self.earring,
            Slot::Necklace => &self.necklace,
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut SlotState {
        match slot {
            Slot::Earring => &mut self.earring,
            Slot::Necklace => &mut self.necklace,
        }
    }

    /// Switches `slot` to `source`, dropping whatever image it showed. The
    /// returned ticket must be used to load the new image; `None` clears the
    /// slot and needs no load.
    pub fn select(&mut self, slot: Slot, source: Option<String>) -> Option<LoadTicket> {
        self.next_token += 1;
        let token = self.next_token;

        let state = self.slot_mut(slot);
        state.image = None;
        state.token = token;
        state.source = source.clone();

        debug!("Selected {source:?} for {slot:?} (token {token})");
        source.map(|source| LoadTicket {
            slot,
            token,
            source,
        })
    }

    pub fn clear(&mut self, slot: Slot) {
        self.select(slot, None);
    }

    pub fn clear_all(&mut self) {
        for slot in Slot::ALL {
            self.clear(slot);
        }
    }

    /// Records the outcome of a load. Results for superseded tickets are
    /// dropped. Returns whether the image was stored.
    pub fn complete(&mut self, ticket: LoadTicket, result: Result<RgbaImage>) -> bool {
        let state = self.slot_mut(ticket.slot);
        if state.token != ticket.token {
            debug!(
                "Discarding stale load of {} for {:?}",
                ticket.source, ticket.slot
            );
            return false;
        }

        match result {
            Ok(img) => {
                debug!(
                    "Loaded {} ({}x{}) for {:?}",
                    ticket.source,
                    img.width(),
                    img.height(),
                    ticket.slot
                );
                state.image = Some(img);
                true
            }
            Err(e) => {
                warn!("Failed to load {} for {:?}: {e:?}", ticket.source, ticket.slot);
                false
            }
        }
    }

    pub fn loaded(&self, slot: Slot) -> Option<&RgbaImage> {
        self.slot(slot).image.as_ref()
    }

    /// Changes on every select or clear of `slot`.
    pub fn token(&self, slot: Slot) -> u64 {
        self.slot(slot).token
    }

    pub fn source(&self, slot: Slot) -> Option<&str> {
        self.slot(slot).source.as_deref()
    }

    /// A slot whose load failed stays `Pending` for good.
    pub fn state(&self, slot: Slot) -> LoadState {
        let state = self.slot(slot);
        match (&state.source, &state.image) {
            (_, Some(_)) => LoadState::Loaded,
            (Some(_), None) => LoadState::Pending,
            (None, None) => LoadState::Absent,
        }
    }

    pub fn any_pending(&self) -> bool {
        Slot::ALL
            .iter()
            .any(|s| self.state(*s) == LoadState::Pending)
    }
}
