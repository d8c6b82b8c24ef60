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
use crate::modes::modes_error::CoreError;
use crate::modes::modes_message::ModesMessage;
use crate::modes::modes_reader::ReaderState;

fn hex_value(c: u8) -> Option<u32> {
    match c {
        b'0'..=b'9' => Some((c - b'0') as u32),
        b'a'..=b'f' => Some((c - b'a' + 10) as u32),
        b'A'..=b'F' => Some((c - b'A' + 10) as u32),
        _ => None,
    }
}

fn has_timestamp(format: u8) -> bool {
    matches!(format, b'@' | b'%' | b'<')
}

pub fn feed(_state: &mut ReaderState, buf: &[u8], max_messages: usize) -> FeedOutcome {
    let mut messages = Vec::new();
    let mut i = 0usize;

    while messages.len() < max_messages {
        let frame_start = i;
        if i >= buf.len() {
            return FeedOutcome::Ok { messages, consumed: frame_start };
        }

        let format = buf[i];
        if !matches!(format, b'@' | b'%' | b'<' | b'*' | b':') {
            return FeedOutcome::Pending {
                messages,
                consumed: frame_start,
                error: CoreError::Sync {
                    offset: frame_start,
                    reason: format!("expected '@'/'%'/'<'/'*'/':' but found {:#04x}", format),
                },
            };
        }
        let mut m = i + 1;

        let mut timestamp: u64 = 0;
        if has_timestamp(format) {
            for _ in 0..12 {
                if m >= buf.len() {
                    return FeedOutcome::Ok { messages, consumed: frame_start };
                }
                let Some(v) = hex_value(buf[m]) else {
                    return FeedOutcome::Pending {
                        messages,
                        consumed: frame_start,
                        error: CoreError::Sync { offset: m, reason: format!("expected a hex digit but found {:#04x}", buf[m]) },
                    };
                };
                timestamp = (timestamp << 4) | v as u64;
                m += 1;
            }
        }

        let mut signal: u8 = 0;
        if format == b'<' {
            if m + 1 >= buf.len() {
                return FeedOutcome::Ok { messages, consumed: frame_start };
            }
            let (Some(hi), Some(lo)) = (hex_value(buf[m]), hex_value(buf[m + 1])) else {
                return FeedOutcome::Pending {
                    messages,
                    consumed: frame_start,
                    error: CoreError::Sync { offset: m, reason: "expected a hex digit pair for signal level".to_string() },
                };
            };
            signal = ((hi << 4) | lo) as u8;
            m += 2;
        }

        let mut data = Vec::with_capacity(14);
        let mut hex_digits = 0usize;
        loop {
            if m >= buf.len() {
                return FeedOutcome::Ok { messages, consumed: frame_start };
            }
            if buf[m] == b';' {
                break;
            }
            if m + 1 >= buf.len() {
                return FeedOutcome::Ok { messages, consumed: frame_start };
            }
            let (Some(hi), Some(lo)) = (hex_value(buf[m]), hex_value(buf[m + 1])) else {
                return FeedOutcome::Pending {
                    messages,
                    consumed: frame_start,
                    error: CoreError::Sync { offset: m, reason: "expected a hex digit pair in message body".to_string() },
                };
            };
            if data.len() < 14 {
                data.push(((hi << 4) | lo) as u8);
            }
            hex_digits += 2;
            m += 2;
        }

        // consume ';'
        m += 1;

        // CR LF / LF CR / LF-only / CR-only are all accepted; skip until the
        // first CR or LF, then consume the whole run of them.
        while m < buf.len() && buf[m] != b'\r' && buf[m] != b'\n' {
            m += 1;
        }
        if m >= buf.len() {
            return FeedOutcome::Ok { messages, consumed: frame_start };
        }
        while m < buf.len() && (buf[m] == b'\r' || buf[m] == b'\n') {
            m += 1;
        }

        let body_len = hex_digits / 2;
        if !matches!(body_len, 2 | 7 | 14) {
            return FeedOutcome::Pending {
                messages,
                consumed: frame_start,
                error: CoreError::Sync {
                    offset: frame_start,
                    reason: format!("unexpected {}-byte AVR message", body_len),
                },
            };
        }

        i = m;
        trace!("avr frame format={} ts={} signal={} body={}", format as char, timestamp, signal, hex::encode(&data));
        messages.push(ModesMessage::from_buffer(timestamp, signal, data));
    }

    FeedOutcome::Ok { messages, consumed: i }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::modes_reader::{DecoderMode, ReaderConfig};

    fn make_state() -> ReaderState {
        let mut config = ReaderConfig::default();
        config.mode = DecoderMode::Avr;
        ReaderState::new(config)
    }

    #[test]
    fn s6_avr_with_timestamp() {
        let buf = b"@0000000000008D4B1785D0BE05B05B6A0C5C;\n".to_vec();
        let mut state = make_state();
        match feed(&mut state, &buf, 10) {
            FeedOutcome::Ok { messages, consumed } => {
                assert_eq!(consumed, buf.len());
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].df, 17);
                assert_eq!(messages[0].timestamp, 0);
                assert_eq!(messages[0].address, Some(0x4b1785));
            }
            FeedOutcome::Pending { .. } | FeedOutcome::Fatal(_) => panic!("expected clean parse"),
        }
    }

    #[test]
    fn no_timestamp_format_defaults_to_zero() {
        let buf = b"*8D4B1785D0BE05B05B6A0C5C;\r\n".to_vec();
        let mut state = make_state();
        match feed(&mut state, &buf, 10) {
            FeedOutcome::Ok { messages, .. } => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].timestamp, 0);
            }
            FeedOutcome::Pending { .. } | FeedOutcome::Fatal(_) => panic!("expected clean parse"),
        }
    }

    #[test]
    fn angle_format_decodes_signal_byte() {
        let buf = b"<000000000000FF8D4B1785D0BE05B05B6A0C5C;\n".to_vec();
        let mut state = make_state();
        match feed(&mut state, &buf, 10) {
            FeedOutcome::Ok { messages, .. } => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].signal, 0xff);
            }
            FeedOutcome::Pending { .. } | FeedOutcome::Fatal(_) => panic!("expected clean parse"),
        }
    }

    #[test]
    fn bad_hex_digit_is_sync_error() {
        let buf = b"*8DZZ785D0BE05B05B6A0C5C;\n".to_vec();
        let mut state = make_state();
        match feed(&mut state, &buf, 10) {
            FeedOutcome::Pending { error, .. } => assert!(matches!(error, CoreError::Sync { .. })),
            _ => panic!("expected a sync error"),
        }
    }

    #[test]
    fn incomplete_trailing_frame_not_consumed() {
        let buf = b"*8D4B1785".to_vec();
        let mut state = make_state();
        match feed(&mut state, &buf, 10) {
            FeedOutcome::Ok { messages, consumed } => {
                assert!(messages.is_empty());
                assert_eq!(consumed, 0);
            }
            _ => panic!("expected Ok with zero progress"),
        }
    }
}
