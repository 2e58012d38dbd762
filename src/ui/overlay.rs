use ratatui::layout::Rect;

use crate::country::CountryKey;

/// Detail overlay visibility. `Open` carries the key captured at selection
/// time, so the overlay keeps showing the same country while the filtered
/// list changes underneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overlay {
    #[default]
    Closed,
    Open(CountryKey),
}

impl Overlay {
    /// Open on the card at `index` of the filtered view. Returns false (and
    /// stays put) if the index is out of range.
    pub fn open_at(&mut self, filtered: &[CountryKey], index: usize) -> bool {
        match filtered.get(index) {
            Some(key) => {
                *self = Overlay::Open(*key);
                true
            }
            None => false,
        }
    }

    pub fn close(&mut self) {
        *self = Overlay::Closed;
    }

    pub fn key(&self) -> Option<CountryKey> {
        match self {
            Overlay::Open(key) => Some(*key),
            Overlay::Closed => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Overlay::Open(_))
    }
}

/// Where a pointer press landed relative to the open overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    Backdrop,
    Panel,
    CloseButton,
}

/// Overlay geometry from the last drawn frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverlayHitArea {
    pub panel: Rect,
    pub close_button: Rect,
}

impl OverlayHitArea {
    pub fn classify(&self, column: u16, row: u16) -> PointerTarget {
        if rect_contains(self.close_button, column, row) {
            PointerTarget::CloseButton
        } else if rect_contains(self.panel, column, row) {
            PointerTarget::Panel
        } else {
            PointerTarget::Backdrop
        }
    }
}

pub fn rect_contains(rect: Rect, column: u16, row: u16) -> bool {
    column >= rect.x
        && row >= rect.y
        && u32::from(column) < u32::from(rect.x) + u32::from(rect.width)
        && u32::from(row) < u32::from(rect.y) + u32::from(rect.height)
}
