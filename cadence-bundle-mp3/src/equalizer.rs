// Cadence
// Copyright (c) 2026 The Project Cadence Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A 32 band equalizer operating on the polyphase sub-bands.

/// The number of equalizer bands, one per polyphase sub-band.
pub const EQ_BANDS: usize = 32;

/// The setting of a band that is removed from the output entirely.
pub const BAND_NOT_PRESENT: f32 = f32::NEG_INFINITY;

/// `Equalizer` holds a gain setting for each of the 32 sub-bands.
///
/// Settings are in the range [-1.0, 1.0] and map to a linear gain of `2^setting`. A setting of
/// [`BAND_NOT_PRESENT`] silences the band.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Equalizer {
    settings: [f32; EQ_BANDS],
}

impl Default for Equalizer {
    fn default() -> Self {
        Equalizer { settings: [0.0; EQ_BANDS] }
    }
}

impl Equalizer {
    /// Instantiates an equalizer from a list of settings. Missing bands are set to 0, and settings
    /// beyond the 32nd are ignored.
    pub fn from_settings(settings: &[f32]) -> Self {
        let mut eq = Equalizer::default();

        for (band, &setting) in eq.settings.iter_mut().zip(settings) {
            *band = limit(setting);
        }

        eq
    }

    /// Sets the setting of a band and returns the previous setting. Bands out of range are
    /// ignored, returning 0.
    pub fn set_band(&mut self, band: usize, setting: f32) -> f32 {
        match self.settings.get_mut(band) {
            Some(current) => std::mem::replace(current, limit(setting)),
            None => 0.0,
        }
    }

    /// Gets the setting of a band, or 0 if the band is out of range.
    pub fn band(&self, band: usize) -> f32 {
        self.settings.get(band).copied().unwrap_or(0.0)
    }

    /// Gets the linear gain factor of each band.
    pub fn band_factors(&self) -> [f32; EQ_BANDS] {
        let mut factors = [0f32; EQ_BANDS];

        for (factor, &setting) in factors.iter_mut().zip(&self.settings) {
            *factor = if setting == BAND_NOT_PRESENT { 0.0 } else { setting.exp2() };
        }

        factors
    }
}

#[inline(always)]
fn limit(setting: f32) -> f32 {
    if setting == BAND_NOT_PRESENT {
        setting
    }
    else if setting.is_nan() {
        0.0
    }
    else {
        setting.clamp(-1.0, 1.0)
    }
}
