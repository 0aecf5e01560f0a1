//! Settings boundary: owns the live [`ScanSettings`] and decides when a
//! regeneration is due.

use crate::color::Rgb;
use crate::debounce::Debouncer;
use crate::settings::ScanSettings;
use std::time::{Duration, Instant};

/// What an [`SettingsController::update`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SettingsChange {
    /// New clear color; the viewer session must be rebuilt.
    pub background: Option<Rgb>,
    /// A geometry-affecting field moved and a debounced resample is pending.
    pub geometry: bool,
}

impl SettingsChange {
    pub fn is_empty(&self) -> bool {
        self.background.is_none() && !self.geometry
    }
}

#[derive(Debug, Clone)]
pub struct SettingsController {
    settings: ScanSettings,
    debounce: Debouncer,
}

impl SettingsController {
    pub fn new(settings: ScanSettings, debounce: Duration) -> Self {
        Self {
            settings: settings.clamped(),
            debounce: Debouncer::new(debounce),
        }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Installs `next` (clamped). Geometry changes (re)arm the debounce;
    /// background changes are reported for an immediate session rebuild.
    pub fn update(&mut self, next: ScanSettings, now: Instant) -> SettingsChange {
        let next = next.clamped();
        let change = SettingsChange {
            background: (next.background != self.settings.background).then_some(next.background),
            geometry: next.geometry_differs(&self.settings),
        };

        if change.geometry {
            self.debounce.trigger(now);
        }
        self.settings = next;
        change
    }

    /// The settings to resample with, once the burst has gone quiet. Always
    /// the latest values, not the ones present when the burst started.
    pub fn poll(&mut self, now: Instant) -> Option<ScanSettings> {
        self.debounce.fire(now).then_some(self.settings)
    }

    /// Drops any pending debounced resample (e.g. after an explicit generate).
    pub fn cancel_pending(&mut self) {
        self.debounce.cancel();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }
}

impl Default for SettingsController {
    fn default() -> Self {
        Self::new(ScanSettings::default(), crate::debounce::DEFAULT_DEBOUNCE)
    }
}
