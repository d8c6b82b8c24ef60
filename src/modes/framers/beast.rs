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

use log::trace;

use crate::modes::framers::FeedOutcome;
use crate::modes::modes as df;
use crate::modes::modes_error::CoreError;
use crate::modes::modes_message::{EventData, ModesMessage};
use crate::modes::modes_reader::{DecoderMode, ReaderState};

const ESC: u8 = 0x1a;

enum Advance {
    Byte(u8, usize),
    NeedMoreData,
    SyncError(String),
}

/// Reads one logical (de-escaped) byte starting at `i`. A lone 0x1A not
/// followed by a second 0x1A is a framing error: the stream put the start of
/// the next frame where a stuffed byte was expected.
fn advance(buf: &[u8], i: usize) -> Advance {
    if i >= buf.len() {
        return Advance::NeedMoreData;
    }
    if buf[i] == ESC {
        if i + 1 >= buf.len() {
            return Advance::NeedMoreData;
        }
        if buf[i + 1] == ESC {
            return Advance::Byte(ESC, i + 2);
        }
        return Advance::SyncError("unescaped 0x1a inside frame body".to_string());
    }
    Advance::Byte(buf[i], i + 1)
}

/// Reads `count` de-escaped bytes starting at `i`, returning `(bytes,
/// next_index)` or `None` if the buffer runs out first (incomplete frame).
fn read_bytes(buf: &[u8], mut i: usize, count: usize) -> Result<Option<(Vec<u8>, usize)>, CoreError> {
    let mut out = Vec::with_capacity(count);
    while out.len() < count {
        match advance(buf, i) {
            Advance::Byte(b, next) => {
                out.push(b);
                i = next;
            }
            Advance::NeedMoreData => return Ok(None),
            Advance::SyncError(reason) => return Err(CoreError::Sync { offset: i, reason }),
        }
    }
    Ok(Some((out, i)))
}

fn body_len(type_byte: u8) -> Option<usize> {
    match type_byte {
        b'1' => Some(2),
        b'2' => Some(7),
        b'3' => Some(14),
        b'4' => Some(14),
        _ => None,
    }
}

pub fn feed(state: &mut ReaderState, buf: &[u8], max_messages: usize) -> FeedOutcome {
    let mut messages = Vec::new();
    let mut i = 0usize;

    while messages.len() < max_messages {
        let frame_start = i;
        if i >= buf.len() {
            return FeedOutcome::Ok { messages, consumed: frame_start };
        }
        if buf[i] != ESC {
            return FeedOutcome::Pending {
                messages,
                consumed: frame_start,
                error: CoreError::Sync { offset: frame_start, reason: "frame did not start with 0x1a".to_string() },
            };
        }
        if i + 1 >= buf.len() {
            return FeedOutcome::Ok { messages, consumed: frame_start };
        }
        let type_byte = buf[i + 1];
        i += 2;

        if type_byte == b'5' {
            match read_bytes(buf, i, 21) {
                Ok(Some((payload, next))) => {
                    i = next;
                    if let Some(event) = decode_position_event(&payload) {
                        messages.push(event);
                    }
                    continue;
                }
                Ok(None) => return FeedOutcome::Ok { messages, consumed: frame_start },
                Err(e) => return FeedOutcome::Pending { messages, consumed: frame_start, error: e },
            }
        }

        let Some(blen) = body_len(type_byte) else {
            return FeedOutcome::Pending {
                messages,
                consumed: frame_start,
                error: CoreError::Sync { offset: frame_start, reason: format!("unknown beast frame type {:#04x}", type_byte) },
            };
        };

        let preamble = match read_bytes(buf, i, 7) {
            Ok(Some((bytes, next))) => {
                i = next;
                bytes
            }
            Ok(None) => return FeedOutcome::Ok { messages, consumed: frame_start },
            Err(e) => return FeedOutcome::Pending { messages, consumed: frame_start, error: e },
        };
        let timestamp = preamble[0..6].iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
        let signal = preamble[6];

        let body = match read_bytes(buf, i, blen) {
            Ok(Some((bytes, next))) => {
                i = next;
                bytes
            }
            Ok(None) => return FeedOutcome::Ok { messages, consumed: frame_start },
            Err(e) => return FeedOutcome::Pending { messages, consumed: frame_start, error: e },
        };

        trace!("beast frame type={} ts={} signal={} body={}", type_byte as char, timestamp, signal, hex::encode(&body));

        if type_byte == b'4' {
            handle_status(state, timestamp, &body, &mut messages);
            continue;
        }

        messages.push(ModesMessage::from_buffer(timestamp, signal, body));
    }

    FeedOutcome::Ok { messages, consumed: i }
}

fn handle_status(state: &mut ReaderState, timestamp: u64, body: &[u8], messages: &mut Vec<ModesMessage>) {
    let dip_switches = body[0];
    let pps_delta = if body.len() > 1 { body[1] as i8 } else { 0 };
    let gps_status_byte = if body.len() > 2 { body[2] } else { 0 };

    // always tracked, independent of whether events are wanted (§9 open
    // question 2: the bug is assumed present until a status frame says
    // otherwise).
    state.radarcape_utc_bugfix = gps_status_byte & 0x80 != 0;

    if state.allow_mode_change {
        let new_mode = if dip_switches & 0x10 != 0 {
            if gps_status_byte & 0x20 != 0 {
                DecoderMode::RadarcapeEmulated
            } else {
                DecoderMode::Radarcape
            }
        } else {
            DecoderMode::Beast
        };

        if new_mode != state.mode {
            if let Some(event) = state.set_mode(new_mode) {
                messages.push(event);
            }
        }
    }

    if !state.want_events {
        return;
    }

    let settings = radarcape_settings_to_list(dip_switches);
    let gps_status = radarcape_gpsstatus_to_map(gps_status_byte);

    let mut eventdata = BTreeMap::new();
    eventdata.insert(
        "settings".to_string(),
        EventData::StrList(settings.iter().map(|s| s.to_string()).collect()),
    );
    eventdata.insert("timestamp_pps_delta".to_string(), EventData::I8(pps_delta));
    eventdata.insert("gps_status".to_string(), EventData::Map(gps_status));

    messages.push(ModesMessage::new_event(df::DF_EVENT_RADARCAPE_STATUS, timestamp, eventdata));
}

/// Bit layout from the original `radarcape_settings_to_list`: note bit 0x04
/// only disambiguates avr/avrmlat when bit 0x01 ("beast") is clear, it isn't
/// a top-level setting string of its own.
fn radarcape_settings_to_list(dip: u8) -> [&'static str; 7] {
    [
        if dip & 0x01 != 0 { "beast" } else if dip & 0x04 != 0 { "avrmlat" } else { "avr" },
        if dip & 0x02 != 0 { "filtered_frames" } else { "all_frames" },
        if dip & 0x08 != 0 { "no_crc" } else { "check_crc" },
        if dip & 0x10 != 0 { "gps_timestamps" } else { "legacy_timestamps" },
        if dip & 0x20 != 0 { "rtscts" } else { "no_rtscts" },
        if dip & 0x40 != 0 { "no_fec" } else { "fec" },
        if dip & 0x80 != 0 { "modeac" } else { "no_modeac" },
    ]
}

/// When the top bit of the GPS status byte is clear, the dict collapses to
/// just `{utc_bugfix: false, timestamp_ok: true}`; otherwise `utc_bugfix` is
/// unconditionally `true` here too (the *tracked* bugfix state lives in
/// `ReaderState::radarcape_utc_bugfix`, set independently above) and the
/// remaining six keys read one status bit each.
fn radarcape_gpsstatus_to_map(status: u8) -> BTreeMap<String, EventData> {
    let mut map = BTreeMap::new();
    if status & 0x80 == 0 {
        map.insert("utc_bugfix".to_string(), EventData::Bool(false));
        map.insert("timestamp_ok".to_string(), EventData::Bool(true));
        return map;
    }
    map.insert("utc_bugfix".to_string(), EventData::Bool(true));
    map.insert("timestamp_ok".to_string(), EventData::Bool(status & 0x20 == 0));
    map.insert("sync_ok".to_string(), EventData::Bool(status & 0x10 != 0));
    map.insert("utc_offset_ok".to_string(), EventData::Bool(status & 0x08 != 0));
    map.insert("sats_ok".to_string(), EventData::Bool(status & 0x04 != 0));
    map.insert("tracking_ok".to_string(), EventData::Bool(status & 0x02 != 0));
    map.insert("antenna_ok".to_string(), EventData::Bool(status & 0x01 != 0));
    map
}

fn decode_position_event(payload: &[u8]) -> Option<ModesMessage> {
    if payload.len() < 16 {
        return None;
    }
    let lat = f32::from_be_bytes(payload[4..8].try_into().ok()?);
    let lon = f32::from_be_bytes(payload[8..12].try_into().ok()?);
    let alt = f32::from_be_bytes(payload[12..16].try_into().ok()?);

    let mut eventdata = BTreeMap::new();
    eventdata.insert("lat".to_string(), EventData::F32(lat));
    eventdata.insert("lon".to_string(), EventData::F32(lon));
    eventdata.insert("alt".to_string(), EventData::F32(alt));

    Some(ModesMessage::new_event(df::DF_EVENT_RADARCAPE_POSITION, 0, eventdata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::modes_reader::ReaderConfig;

    #[test]
    fn s1_beast_mode_s_short_df4() {
        // constructed so residual(body) == 0x781d23 (see modes_message tests
        // for the matching unit-level check)
        // type '2', ts=000000000001, signal=00, body=20000000f87b7c
        let buf = hex::decode("1a320000000000010020000000f87b7c").unwrap();

        let mut config = ReaderConfig::default();
        config.mode = crate::modes::modes_reader::DecoderMode::Beast;
        let mut state = ReaderState::new(config);
        match feed(&mut state, &buf, 10) {
            FeedOutcome::Ok { messages, consumed } => {
                assert_eq!(consumed, buf.len());
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].df, 4);
                assert!(messages[0].valid);
                assert_eq!(messages[0].address, Some(0x781d23));
                assert_eq!(messages[0].altitude, None);
            }
            FeedOutcome::Pending { .. } | FeedOutcome::Fatal(_) => panic!("expected clean parse"),
        }
    }

    #[test]
    fn s2_beast_escape_in_timestamp() {
        // type '3' long frame, timestamp starts with an escaped 0x1a byte
        let buf = hex::decode("1a331a1a0000000000ff884b178558a124123456781bc9c3").unwrap();
        let mut config = ReaderConfig::default();
        config.mode = crate::modes::modes_reader::DecoderMode::Beast;
        let mut state = ReaderState::new(config);
        match feed(&mut state, &buf, 10) {
            FeedOutcome::Ok { messages, consumed } => {
                assert_eq!(consumed, buf.len());
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].timestamp, 0x1a0000000000);
                assert_eq!(messages[0].signal, 0xff);
                assert_eq!(messages[0].data.len(), 14);
                assert_eq!(messages[0].crc_residual, Some(0));
            }
            FeedOutcome::Pending { .. } | FeedOutcome::Fatal(_) => panic!("expected clean parse"),
        }
    }

    #[test]
    fn incomplete_trailing_frame_is_not_consumed() {
        let mut buf = hex::decode("1a32000000000001").unwrap();
        buf.extend(vec![0x20, 0x00]); // body truncated
        let mut config = ReaderConfig::default();
        config.mode = crate::modes::modes_reader::DecoderMode::Beast;
        let mut state = ReaderState::new(config);
        match feed(&mut state, &buf, 10) {
            FeedOutcome::Ok { messages, consumed } => {
                assert!(messages.is_empty());
                assert_eq!(consumed, 0);
            }
            _ => panic!("expected Ok with zero progress"),
        }
    }

    #[test]
    fn unknown_frame_type_is_sync_error() {
        let buf = hex::decode("1a39").unwrap();
        let mut config = ReaderConfig::default();
        config.mode = crate::modes::modes_reader::DecoderMode::Beast;
        let mut state = ReaderState::new(config);
        match feed(&mut state, &buf, 10) {
            FeedOutcome::Pending { error, .. } => assert!(matches!(error, CoreError::Sync { .. })),
            _ => panic!("expected a sync error"),
        }
    }

    #[test]
    fn s5_status_frame_switches_to_radarcape_and_emits_mode_change() {
        // type '4' status: dip switches bit 4 (0x10, gps timestamps) set,
        // gps-status byte (payload[2]) bit 5 (0x20) clear -> plain RADARCAPE.
        let mut payload = vec![0u8; 14];
        payload[0] = 0x10;
        payload[1] = 0x00; // pps delta
        payload[2] = 0x00; // gps status, bit 5 clear -> not emulated
        let mut buf = vec![0x1a, b'4'];
        buf.extend_from_slice(&[0, 0, 0, 0, 0, 0]); // timestamp
        buf.push(0xff); // signal
        buf.extend_from_slice(&payload);

        let mut config = ReaderConfig::default();
        config.mode = crate::modes::modes_reader::DecoderMode::Beast;
        config.allow_mode_change = true;
        config.want_events = true;
        let mut state = ReaderState::new(config);

        match feed(&mut state, &buf, 10) {
            FeedOutcome::Ok { messages, consumed } => {
                assert_eq!(consumed, buf.len());
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[0].df, df::DF_EVENT_MODE_CHANGE);
                assert_eq!(messages[1].df, df::DF_EVENT_RADARCAPE_STATUS);
                assert_eq!(state.mode, crate::modes::modes_reader::DecoderMode::Radarcape);
                assert_eq!(state.frequency, 1_000_000_000);
            }
            FeedOutcome::Pending { .. } | FeedOutcome::Fatal(_) => panic!("expected clean parse"),
        }
    }
}
