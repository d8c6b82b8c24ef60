/*
 * Part of mlat-client-rust (https://github.com/tjmullicani/mlat-client-rust) - an ADS-B multilateration client.
 * Based on mlat-client (https://github.com/mutability/mlat-client)
 * Copyright 2023, Timothy Mullican <timothy.j.mullican@gmail.com>
 * Copyright 2015, Oliver Jowett <oliver@mutability.co.uk>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use std::collections::HashSet;

use log::{debug, info};

use crate::modes::modes_classifier::AcClassifier;
use crate::modes::modes_error::{CoreError, CoreResult};
use crate::modes::modes_message::{EventData, ModesMessage};
use crate::modes::{framers, modes as df};

/// Decoder mode, selecting the receiver-clock frequency/epoch pairing (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderMode {
    None,
    Beast,
    Radarcape,
    RadarcapeEmulated,
    Avr,
    AvrMlat,
    Sbs,
}

impl DecoderMode {
    pub fn frequency(self) -> u64 {
        match self {
            DecoderMode::Beast | DecoderMode::Avr | DecoderMode::AvrMlat => 12_000_000,
            DecoderMode::Radarcape | DecoderMode::RadarcapeEmulated => 1_000_000_000,
            DecoderMode::Sbs => 20_000_000,
            DecoderMode::None => 0,
        }
    }

    pub fn epoch(self) -> Epoch {
        match self {
            // the emulated variant carries the same GPS-style 48-bit
            // timestamp encoding but isn't actually GPS-locked to UTC
            // midnight, so it free-runs like Beast/AVR instead.
            DecoderMode::Radarcape => Epoch::UtcMidnight,
            _ => Epoch::None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DecoderMode::None => "none",
            DecoderMode::Beast => "BEAST",
            DecoderMode::Radarcape => "RADARCAPE",
            DecoderMode::RadarcapeEmulated => "RADARCAPE_EMULATED",
            DecoderMode::Avr => "AVR",
            DecoderMode::AvrMlat => "AVRMLAT",
            DecoderMode::Sbs => "SBS",
        }
    }

    /// True if this mode's receiver-clock timestamps are GPS-disciplined
    /// nanosecond counters rather than free-running cycle counters.
    pub fn is_gps(self) -> bool {
        matches!(self, DecoderMode::Radarcape | DecoderMode::RadarcapeEmulated)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Epoch {
    None,
    UtcMidnight,
}

impl Epoch {
    pub fn as_str_opt(self) -> Option<&'static str> {
        match self {
            Epoch::None => None,
            Epoch::UtcMidnight => Some("utc_midnight"),
        }
    }
}

/// Per-DF admission rules (§3, §4.5). Indexed 0..=31 by downlink format.
#[derive(Clone, Debug)]
pub struct FilterTable {
    pub default_filter: [bool; 32],
    pub specific_filter: [Option<HashSet<u32>>; 32],
}

impl Default for FilterTable {
    fn default() -> Self {
        FilterTable {
            default_filter: [false; 32],
            specific_filter: std::array::from_fn(|_| None),
        }
    }
}

impl FilterTable {
    pub fn is_empty(&self) -> bool {
        self.default_filter.iter().all(|&b| !b) && self.specific_filter.iter().all(|e| e.is_none())
    }
}

/// Everything a caller supplies up front to build a `ReaderState` (§6
/// "Reader configuration surface"). No file/env parsing lives here; the CLI
/// binary is responsible for turning parsed flags into this struct.
#[derive(Clone, Debug, Default)]
pub struct ReaderConfig {
    pub mode: DecoderMode,
    pub allow_mode_change: bool,
    pub want_zero_timestamps: bool,
    pub want_mlat_messages: bool,
    pub want_invalid_messages: bool,
    pub want_events: bool,
    pub track_seen: bool,
    pub filters: FilterTable,
    pub modeac_filter: Option<HashSet<u16>>,
}

impl Default for DecoderMode {
    fn default() -> Self {
        DecoderMode::None
    }
}

/// Process-wide decoder state (§3). Owns one input stream's worth of
/// synchronization/clock-discipline/filter state; independent instances
/// share nothing and may run on separate threads (§5).
pub struct ReaderState {
    pub mode: DecoderMode,
    pub frequency: u64,
    pub epoch: Epoch,

    pub last_timestamp: u64,
    pub last_ts_mono_ms: u64,
    pub outliers: u32,

    pub radarcape_utc_bugfix: bool,

    pub seen: Option<HashSet<u32>>,
    pub filters: FilterTable,
    pub modeac_filter: Option<HashSet<u16>>,

    pub received_messages: u64,
    pub suppressed_messages: u64,
    pub mlat_messages: u64,

    pub classifier: AcClassifier,

    pub allow_mode_change: bool,
    pub want_zero_timestamps: bool,
    pub want_mlat_messages: bool,
    pub want_invalid_messages: bool,
    pub want_events: bool,

    have_timestamp_reference: bool,

    /// A sync error the framer already reported, held back so the messages
    /// decoded before it could be flushed first (§4.2); raised on the next
    /// `feed()` call instead of this one.
    pending_error: Option<CoreError>,
}

impl ReaderState {
    pub fn new(config: ReaderConfig) -> Self {
        let mode = config.mode;
        ReaderState {
            mode,
            frequency: mode.frequency(),
            epoch: mode.epoch(),
            last_timestamp: 0,
            last_ts_mono_ms: 0,
            outliers: 0,
            // the original assumes the bug is present until a status frame says otherwise
            radarcape_utc_bugfix: true,
            seen: if config.track_seen { Some(HashSet::new()) } else { None },
            filters: config.filters,
            modeac_filter: config.modeac_filter,
            received_messages: 0,
            suppressed_messages: 0,
            mlat_messages: 0,
            classifier: AcClassifier::new(),
            allow_mode_change: config.allow_mode_change,
            want_zero_timestamps: config.want_zero_timestamps,
            want_mlat_messages: config.want_mlat_messages,
            want_invalid_messages: config.want_invalid_messages,
            want_events: config.want_events,
            have_timestamp_reference: false,
            pending_error: None,
        }
    }

    pub fn set_mode(&mut self, new_mode: DecoderMode) -> Option<ModesMessage> {
        if new_mode == self.mode {
            return None;
        }

        let old_mode = self.mode;
        self.mode = new_mode;
        self.frequency = new_mode.frequency();
        self.epoch = new_mode.epoch();
        self.have_timestamp_reference = false;
        self.outliers = 0;

        info!("decoder mode change: {} -> {}", old_mode.name(), new_mode.name());

        if !self.want_events {
            return None;
        }

        let mut eventdata = std::collections::BTreeMap::new();
        eventdata.insert("mode".to_string(), EventData::Str(new_mode.name().to_string()));
        eventdata.insert("frequency".to_string(), EventData::U64(self.frequency));
        eventdata.insert(
            "epoch".to_string(),
            match new_mode.epoch().as_str_opt() {
                Some(s) => EventData::Str(s.to_string()),
                None => EventData::Null,
            },
        );

        Some(ModesMessage::new_event(df::DF_EVENT_MODE_CHANGE, 0, eventdata))
    }

    /// True iff this is the very first non-synthetic timestamp seen since
    /// the mode was last (re)set, so timestamp discipline should just adopt
    /// it as the reference rather than checking it for plausibility.
    pub fn adopt_or_check_timestamp(&mut self, ts: u64, now_mono_ms: u64) -> bool {
        if !self.have_timestamp_reference {
            self.have_timestamp_reference = true;
            self.last_timestamp = ts;
            self.last_ts_mono_ms = now_mono_ms;
            self.outliers = 0;
            return true;
        }
        false
    }

    /// Feeds raw bytes from the wire into the framer selected by the current
    /// decoder mode, then runs timestamp discipline and the admission filter
    /// over whatever messages come out.
    ///
    /// Returns `(consumed, messages)`. On a sync error, any messages already
    /// decoded before the bad byte are still delivered via `Ok` this call;
    /// the error itself is held back and only raised by the *next* call to
    /// `feed` (at offset 0, since the caller is expected to have advanced
    /// past `consumed` bytes in between) — matching §4.2's "flush decoded
    /// messages before surfacing the error" contract.
    pub fn feed(&mut self, buf: &[u8], now_mono_ms: u64, max_messages: usize) -> CoreResult<(usize, Vec<ModesMessage>)> {
        if let Some(error) = self.pending_error.take() {
            return Err(error);
        }

        let outcome = match self.mode {
            DecoderMode::Beast | DecoderMode::Radarcape | DecoderMode::RadarcapeEmulated => {
                framers::beast::feed(self, buf, max_messages)
            }
            DecoderMode::Sbs => framers::sbs::feed(self, buf, max_messages),
            DecoderMode::Avr | DecoderMode::AvrMlat => framers::avr::feed(self, buf, max_messages),
            DecoderMode::None => return Err(CoreError::NoDecoderMode),
        };

        let (raw_messages, consumed, pending_error) = match outcome {
            framers::FeedOutcome::Ok { messages, consumed } => (messages, consumed, None),
            framers::FeedOutcome::Pending { messages, consumed, error } => (messages, consumed, Some(error)),
            framers::FeedOutcome::Fatal(error) => return Err(error),
        };

        let mut admitted = Vec::with_capacity(raw_messages.len());
        for message in raw_messages {
            self.process_message(message, now_mono_ms, &mut admitted)?;
        }

        if let Some(error) = pending_error {
            debug!(
                "framer reported pending error after flushing {} message(s); raising on next feed() call",
                admitted.len()
            );
            self.pending_error = Some(error);
        }

        Ok((consumed, admitted))
    }

    /// Runs timestamp discipline then the admission filter over a single
    /// freshly-decoded message, appending it (and any synthetic event
    /// frames discipline needed to raise first) to `out` iff admitted.
    fn process_message(&mut self, mut message: ModesMessage, now_mono_ms: u64, out: &mut Vec<ModesMessage>) -> CoreResult<()> {
        self.received_messages += 1;

        let mut events = Vec::new();
        if message.df <= df::DF_MODEAC {
            // Mode A/C (df == DF_MODEAC) still needs the preamble-length
            // fixup applied inside discipline(); only synthetic event
            // frames (df > DF_MODEAC) skip it entirely.
            crate::modes::modes_timestamp::discipline(self, &mut message, now_mono_ms, &mut events)?;
        }
        out.extend(events);

        if crate::modes::modes_filter::filter_message(self, &message) {
            out.push(message);
        } else {
            self.suppressed_messages += 1;
        }
        Ok(())
    }
}
