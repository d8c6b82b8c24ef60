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

use log::trace;

use crate::modes::framers::FeedOutcome;
use crate::modes::modes_crc;
use crate::modes::modes_error::CoreError;
use crate::modes::modes_message::ModesMessage;
use crate::modes::modes_reader::ReaderState;

const DLE: u8 = 0x10;
const STX: u8 = 0x02;
const ETX: u8 = 0x03;

fn message_len(subtype: u8) -> Option<usize> {
    match subtype {
        0x01 => Some(14), // ADS-B/TIS-B
        0x05 => Some(14), // Mode S long
        0x07 => Some(7),  // Mode S short
        0x09 => Some(2),  // Mode A/C
        _ => None,
    }
}

/// Scans a DLE-stuffed run starting right after `DLE STX`, de-escaping `10
/// 10` into a single `0x10` and stopping at (but not consuming) the `DLE` of
/// a trailing `DLE ETX`. Returns `(payload, index_of_dle_etx)`.
fn scan_escaped(buf: &[u8], mut i: usize) -> Result<Option<(Vec<u8>, usize)>, CoreError> {
    let mut payload = Vec::new();
    loop {
        if i >= buf.len() {
            return Ok(None);
        }
        if buf[i] == DLE {
            if i + 1 >= buf.len() {
                return Ok(None);
            }
            if buf[i + 1] == ETX {
                return Ok(Some((payload, i)));
            }
            if buf[i + 1] != DLE {
                return Err(CoreError::Sync {
                    offset: i,
                    reason: format!("unexpected DLE {:#04x} inside SBS frame", buf[i + 1]),
                });
            }
            payload.push(DLE);
            i += 2;
            continue;
        }
        payload.push(buf[i]);
        i += 1;
    }
}

/// Reads one DLE-escaped byte (used for the two trailing CRC bytes).
fn read_escaped_byte(buf: &[u8], i: usize) -> Result<Option<(u8, usize)>, CoreError> {
    if i >= buf.len() {
        return Ok(None);
    }
    if buf[i] != DLE {
        return Ok(Some((buf[i], i + 1)));
    }
    if i + 1 >= buf.len() {
        return Ok(None);
    }
    if buf[i + 1] != DLE {
        return Err(CoreError::Sync { offset: i, reason: format!("unexpected DLE {:#04x} in SBS CRC trailer", buf[i + 1]) });
    }
    Ok(Some((DLE, i + 2)))
}

pub fn feed(state: &mut ReaderState, buf: &[u8], max_messages: usize) -> FeedOutcome {
    let mut messages = Vec::new();
    let mut i = 0usize;

    while messages.len() < max_messages {
        let frame_start = i;
        if i + 1 >= buf.len() {
            return FeedOutcome::Ok { messages, consumed: frame_start };
        }
        if buf[i] != DLE || buf[i + 1] != STX {
            return FeedOutcome::Pending {
                messages,
                consumed: frame_start,
                error: CoreError::Sync {
                    offset: frame_start,
                    reason: format!("expected DLE STX but found {:#04x} {:#04x}", buf[i], buf[i + 1]),
                },
            };
        }

        let (payload, etx_index) = match scan_escaped(buf, i + 2) {
            Ok(Some(v)) => v,
            Ok(None) => return FeedOutcome::Ok { messages, consumed: frame_start },
            Err(e) => return FeedOutcome::Pending { messages, consumed: frame_start, error: e },
        };

        // two DLE-escaped CRC bytes follow DLE ETX; we don't use their value
        // (the residual is folded back into the frame below) but we must
        // still consume them byte-exactly.
        let after_etx = etx_index + 2;
        let (_, after_crc1) = match read_escaped_byte(buf, after_etx) {
            Ok(Some(v)) => v,
            Ok(None) => return FeedOutcome::Ok { messages, consumed: frame_start },
            Err(e) => return FeedOutcome::Pending { messages, consumed: frame_start, error: e },
        };
        let (_, after_crc2) = match read_escaped_byte(buf, after_crc1) {
            Ok(Some(v)) => v,
            Ok(None) => return FeedOutcome::Ok { messages, consumed: frame_start },
            Err(e) => return FeedOutcome::Pending { messages, consumed: frame_start, error: e },
        };

        i = after_crc2;

        if payload.len() < 5 {
            // too short to even carry a subtype + timestamp; skip silently
            continue;
        }

        let Some(len) = message_len(payload[0]) else {
            // unknown sub-type, silently skipped per §4.2.2
            continue;
        };
        if payload.len() < 5 + len {
            continue;
        }

        let mut data = payload[5..5 + len].to_vec();
        if len >= 3 {
            let crc = modes_crc::buffer_crc(&data[..len - 3]);
            data[len - 3] ^= (crc >> 16) as u8;
            data[len - 2] ^= (crc >> 8) as u8;
            data[len - 1] ^= crc as u8;
        }

        // little-endian 3-byte counter
        let raw = (payload[2] as u64) | (payload[3] as u64) << 8 | (payload[4] as u64) << 16;
        // re-anchor at (start of frame + 112us) regardless of frame length
        let anchored = (raw + (14 - len) as u64 * 160) & 0x00ff_ffff;

        let widened_hi = state.last_timestamp & 0xffff_ffff_ff00_0000;
        let mut widened = anchored | widened_hi;
        if widened < state.last_timestamp {
            widened += 1 << 24;
        }
        state.last_timestamp = widened;

        trace!("sbs frame subtype={:#04x} ts={} body={}", payload[0], widened, hex::encode(&data));

        messages.push(ModesMessage::from_buffer(widened, 0, data));
    }

    FeedOutcome::Ok { messages, consumed: i }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::modes_reader::{DecoderMode, ReaderConfig};

    fn escape(bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for &b in bytes {
            out.push(b);
            if b == DLE {
                out.push(DLE);
            }
        }
        out
    }

    fn wrap_frame(subtype: u8, ts: [u8; 3], body: &[u8]) -> Vec<u8> {
        let mut payload = vec![subtype, 0];
        payload.extend_from_slice(&ts);
        payload.extend_from_slice(body);

        let mut frame = vec![DLE, STX];
        frame.extend(escape(&payload));
        frame.push(DLE);
        frame.push(ETX);
        // two CRC bytes (unused by our decoder, but must still be present)
        frame.push(0x00);
        frame.push(0x00);
        frame
    }

    #[test]
    fn s4_sbs_rollover_widens_by_exactly_2_24() {
        let mut config = ReaderConfig::default();
        config.mode = DecoderMode::Sbs;
        let mut state = ReaderState::new(config);
        state.last_timestamp = 0x0000_0000_00ff_fff0;

        // 14-byte body (subtype 0x05) so the (14-len)*160 re-anchor term is
        // zero and the widened timestamp matches the raw counter exactly.
        let body = vec![0u8; 14];
        let frame = wrap_frame(0x05, [0x10, 0x00, 0x00], &body);

        match feed(&mut state, &frame, 10) {
            FeedOutcome::Ok { messages, consumed } => {
                assert_eq!(consumed, frame.len());
                assert_eq!(messages.len(), 1);
                assert_eq!(state.last_timestamp, 0x0000_0000_0100_0010);
            }
            FeedOutcome::Pending { .. } | FeedOutcome::Fatal(_) => panic!("expected clean parse"),
        }
    }

    #[test]
    fn unknown_subtype_is_silently_skipped() {
        let mut config = ReaderConfig::default();
        config.mode = DecoderMode::Sbs;
        let mut state = ReaderState::new(config);

        let frame = wrap_frame(0xee, [0, 0, 0], &[]);
        match feed(&mut state, &frame, 10) {
            FeedOutcome::Ok { messages, consumed } => {
                assert!(messages.is_empty());
                assert_eq!(consumed, frame.len());
            }
            _ => panic!("expected clean parse with no messages"),
        }
    }

    #[test]
    fn lost_sync_without_dle_stx_reports_error() {
        let mut config = ReaderConfig::default();
        config.mode = DecoderMode::Sbs;
        let mut state = ReaderState::new(config);
        let buf = [0x00, 0x01, 0x02];
        match feed(&mut state, &buf, 10) {
            FeedOutcome::Pending { error, .. } => assert!(matches!(error, CoreError::Sync { .. })),
            _ => panic!("expected a sync error"),
        }
    }
}
