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

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::modes::modes as df;
use crate::modes::modes::is_synthetic_timestamp;
use crate::modes::modes_error::{CoreError, CoreResult};
use crate::modes::modes_message::{EventData, ModesMessage};
use crate::modes::modes_reader::{Epoch, ReaderState};

/// Backward-moves smaller than this many frequency-seconds are jitter, not a
/// clock reset (grace window from the original implementation's timestamp
/// tracking, not spelled out numerically in the distilled spec).
const BACKWARD_GRACE_SECONDS: u64 = 90;

/// One day, in nanoseconds, for the Radarcape UTC-bugfix day-wrap.
const NANOS_PER_DAY: u64 = 86_400_000_000_000;

/// End-of-day rollover window boundaries, in nanoseconds (§4.4).
const ROLLOVER_HIGH_WATERMARK_NS: u64 = 86_340_000_000_000;
const ROLLOVER_LOW_WATERMARK_NS: u64 = 60_000_000_000;

/// Runs timestamp discipline over a single freshly-decoded, non-synthetic
/// message: GPS nanosecond widening + UTC bugfix, per-frame-length
/// preamble fixup, end-of-day rollover detection, and jump/outlier
/// detection. Any synthetic event frames the discipline needs to emit
/// (rollover, timestamp-jump) are appended to `events` *before* `message`
/// is admitted, matching the ordering guarantee in §5.
pub fn discipline(
    state: &mut ReaderState,
    message: &mut ModesMessage,
    now_mono_ms: u64,
    events: &mut Vec<ModesMessage>,
) -> CoreResult<()> {
    if is_synthetic_timestamp(message.timestamp) {
        if message.timestamp != 0 {
            state.mlat_messages += 1;
        }
        return Ok(());
    }

    if state.mode.is_gps() {
        widen_gps_timestamp(state, message);
    }
    apply_length_fixup(state, message);

    if message.df == df::DF_MODEAC {
        // Mode A/C gets the same preamble-offset fixup as every other
        // frame length, but is exempt from the plausibility/outlier path
        // below (the original's `timestamp_check`/`timestamp_update` calls
        // are gated on `type != '1'`).
        return Ok(());
    }

    let ts = message.timestamp;

    if state.epoch == Epoch::UtcMidnight
        && state.last_timestamp >= ROLLOVER_HIGH_WATERMARK_NS
        && ts <= ROLLOVER_LOW_WATERMARK_NS
    {
        debug!("end-of-day rollover: last={} new={}", state.last_timestamp, ts);
        if state.want_events {
            events.push(ModesMessage::new_event(df::DF_EVENT_EPOCH_ROLLOVER, ts, BTreeMap::new()));
        }
        state.last_timestamp = ts;
        state.last_ts_mono_ms = now_mono_ms;
        state.outliers = 0;
        return Ok(());
    }

    if state.adopt_or_check_timestamp(ts, now_mono_ms) {
        return Ok(());
    }

    if ts < state.last_timestamp && state.last_timestamp - ts < BACKWARD_GRACE_SECONDS * state.frequency {
        // small backward jitter; treat as accepted without moving the reference backward
        state.outliers = 0;
        return Ok(());
    }

    let ts_elapsed = ts as i128 - state.last_timestamp as i128;
    let sys_elapsed_ms = now_mono_ms as i128 - state.last_ts_mono_ms as i128;
    let sys_elapsed = sys_elapsed_ms * state.frequency as i128 / 1000;
    let offset = (ts_elapsed - sys_elapsed).abs();

    let reset_threshold: i128 = if state.mode.is_gps() {
        1_000_000_000
    } else {
        BACKWARD_GRACE_SECONDS as i128 * state.frequency as i128
    };

    if offset > reset_threshold {
        warn!("receiver clock reset detected: offset {} exceeds {}", offset, reset_threshold);
        return Err(CoreError::ClockReset { last_timestamp: state.last_timestamp });
    }

    let max_offset = (1.25 * state.frequency as f64) as i128;
    if offset > max_offset {
        state.outliers += 1;
        if state.outliers > df::OUTLIER_LIMIT {
            if state.want_events {
                let mut eventdata = BTreeMap::new();
                eventdata.insert("last-timestamp".to_string(), EventData::U64(state.last_timestamp));
                events.push(ModesMessage::new_event(df::DF_EVENT_TIMESTAMP_JUMP, ts, eventdata));
            }
            // re-anchor on the new value past the outlier limit so the
            // decoder resyncs instead of treating every subsequent frame
            // as an outlier forever.
            state.last_timestamp = ts;
            state.last_ts_mono_ms = now_mono_ms;
            state.outliers = 0;
        }
        // outlier: frame is dropped by the filter stage.
        return Ok(());
    }

    state.outliers = 0;
    state.last_timestamp = ts;
    state.last_ts_mono_ms = now_mono_ms;
    Ok(())
}

fn widen_gps_timestamp(state: &ReaderState, message: &mut ModesMessage) {
    let raw = message.timestamp;
    let secs = raw >> 30;
    let nanos = raw & 0x3fff_ffff;
    let mut ns = secs.wrapping_mul(1_000_000_000).wrapping_add(nanos);
    if !state.radarcape_utc_bugfix {
        ns = if ns >= 1_000_000_000 {
            ns - 1_000_000_000
        } else {
            NANOS_PER_DAY - (1_000_000_000 - ns)
        };
    }
    message.timestamp = ns;
}

fn apply_length_fixup(state: &ReaderState, message: &mut ModesMessage) {
    let len = message.data.len();
    if state.mode.is_gps() {
        let adjust: u64 = match len {
            2 => 20_300,
            7 => 64_000,
            14 => 120_000,
            _ => 0,
        };
        message.timestamp = if adjust <= message.timestamp {
            message.timestamp - adjust
        } else {
            // wrap to the previous day rather than clamping to zero
            message.timestamp + NANOS_PER_DAY - adjust
        };
    } else if state.frequency == 12_000_000 {
        let adjust: u64 = match len {
            2 => 244,
            7 => 768,
            14 => 768,
            _ => 0,
        };
        message.timestamp = message.timestamp.saturating_sub(adjust);
    }
}
