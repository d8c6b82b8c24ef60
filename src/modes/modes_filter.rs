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

use crate::modes::modes as df;
use crate::modes::modes::is_synthetic_timestamp;
use crate::modes::modes_message::ModesMessage;
use crate::modes::modes_reader::ReaderState;

/// Runs the nine-step admission pipeline (§4.5) over a single message that
/// has already gone through timestamp discipline. Returns `true` iff the
/// message should be delivered to the caller.
pub fn filter_message(state: &mut ReaderState, message: &ModesMessage) -> bool {
    // 1. drop MLAT-sentinel timestamps unless explicitly wanted
    if is_synthetic_timestamp(message.timestamp) && message.timestamp != 0 && !state.want_mlat_messages {
        return false;
    }

    // 2. drop anything while we're in an outlier run
    if state.outliers > 0 {
        return false;
    }

    // 3. drop anything that didn't advance the clock
    if message.timestamp < state.last_timestamp {
        return false;
    }

    // 4. Mode A/C is gated purely by modeac_filter
    if message.df == df::DF_MODEAC {
        return match &state.modeac_filter {
            None => true,
            Some(set) => message
                .address
                .map(|addr| set.contains(&(addr as u16)))
                .unwrap_or(false),
        };
    }

    // 5. invalid frames only pass through if explicitly wanted
    if !message.valid {
        return state.want_invalid_messages;
    }

    // 6. CRC-validated DF11/17/18 addresses always get recorded, win or lose
    if matches!(message.df, 11 | 17 | 18) {
        if let (Some(seen), Some(addr)) = (state.seen.as_mut(), message.address) {
            seen.insert(addr);
        }
    }

    // 7. zero timestamps ("no timestamp available") are opt-in
    if message.timestamp == 0 && !state.want_zero_timestamps {
        return false;
    }

    // 8. no filters configured at all: admit everything that survived so far
    if state.filters.is_empty() {
        return true;
    }

    // 9. otherwise defer to the per-DF default/specific filter tables
    let df_index = message.df as usize;
    if df_index >= state.filters.default_filter.len() {
        return false;
    }
    if state.filters.default_filter[df_index] {
        return true;
    }
    if let Some(set) = &state.filters.specific_filter[df_index] {
        if let Some(addr) = message.address {
            return set.contains(&addr);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::modes_reader::{DecoderMode, ReaderConfig};
    use std::collections::HashSet;

    fn state_with(config: ReaderConfig) -> ReaderState {
        ReaderState::new(config)
    }

    #[test]
    fn outlier_run_drops_everything() {
        let mut state = state_with(ReaderConfig { mode: DecoderMode::Beast, ..Default::default() });
        state.outliers = 1;
        let msg = ModesMessage::from_buffer(10, 0, vec![0u8; 7]);
        assert!(!filter_message(&mut state, &msg));
    }

    #[test]
    fn modeac_filter_gates_by_address() {
        let mut filter = HashSet::new();
        filter.insert(0x1200u16);
        let mut config = ReaderConfig { mode: DecoderMode::Beast, ..Default::default() };
        config.modeac_filter = Some(filter);
        let mut state = state_with(config);

        let admitted = ModesMessage::from_buffer(10, 0, vec![0x12, 0x00]);
        assert!(filter_message(&mut state, &admitted));

        let rejected = ModesMessage::from_buffer(10, 0, vec![0x34, 0x56]);
        assert!(!filter_message(&mut state, &rejected));
    }

    #[test]
    fn invalid_frames_dropped_unless_wanted() {
        let mut config = ReaderConfig { mode: DecoderMode::Beast, ..Default::default() };
        config.want_invalid_messages = false;
        let mut state = state_with(config);
        let msg = ModesMessage::from_buffer(10, 0, vec![0u8; 7]); // df garbage, valid=false
        assert!(!msg.valid);
        assert!(!filter_message(&mut state, &msg));

        state.want_invalid_messages = true;
        assert!(filter_message(&mut state, &msg));
    }

    #[test]
    fn seen_set_records_df17_address_even_when_later_dropped() {
        let mut config = ReaderConfig { mode: DecoderMode::Beast, ..Default::default() };
        config.track_seen = true;
        let mut state = state_with(config);
        state.filters.default_filter[17] = false; // nothing admitted for df17

        let data = hex::decode("884b178558a124123456781bc9c3").unwrap();
        let msg = ModesMessage::from_buffer(10, 0, data);
        assert!(msg.valid);
        assert!(!filter_message(&mut state, &msg));
        assert!(state.seen.as_ref().unwrap().contains(&0x4b1785));
    }

    #[test]
    fn no_filters_admits_everything_that_survived() {
        let mut state = state_with(ReaderConfig { mode: DecoderMode::Beast, ..Default::default() });
        let data = hex::decode("884b178558a124123456781bc9c3").unwrap();
        let msg = ModesMessage::from_buffer(10, 0, data);
        assert!(filter_message(&mut state, &msg));
    }
}
