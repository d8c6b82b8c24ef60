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
 *
 * References:
 *   https://mode-s.org/decode/content/ads-b/8-error-control.html
 *   https://mode-s.org/decode/book-the_1090mhz_riddle-junzi_sun.pdf
 */

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Serialize, Serializer};

use crate::modes::modes::{self, *};
use crate::modes::modes_crc;

/// Decodes a 13-bit altitude field (AC13), either Q-bit linear or Gillham code.
pub fn decode_ac13(ac13: u32) -> Option<i32> {
    if ac13 == 0 || (ac13 & 0x0040) != 0 {
        // M-bit set means metric altitude, which we don't decode.
        return None;
    }

    if (ac13 & 0x0010) != 0 {
        let n = ((ac13 & 0x1f80) >> 2) | ((ac13 & 0x0020) >> 1) | (ac13 & 0x000f);
        return Some((n as i32) * 25 - 1000);
    }

    if (ac13 & 0x1500) == 0 {
        // illegal gillham code
        return None;
    }

    let mut h: i32 = 0;
    if ac13 & 0x1000 != 0 {
        h ^= 7;
    } // C1
    if ac13 & 0x0400 != 0 {
        h ^= 3;
    } // C2
    if ac13 & 0x0100 != 0 {
        h ^= 1;
    } // C4

    if h & 5 == 5 {
        h ^= 2;
    }
    if h > 5 {
        return None;
    }

    let mut f: i32 = 0;
    if ac13 & 0x0010 != 0 {
        f ^= 0x1ff;
    } // D1
    if ac13 & 0x0004 != 0 {
        f ^= 0x0ff;
    } // D2
    if ac13 & 0x0001 != 0 {
        f ^= 0x07f;
    } // D4
    if ac13 & 0x0800 != 0 {
        f ^= 0x03f;
    } // A1
    if ac13 & 0x0200 != 0 {
        f ^= 0x01f;
    } // A2
    if ac13 & 0x0080 != 0 {
        f ^= 0x00f;
    } // A4
    if ac13 & 0x0020 != 0 {
        f ^= 0x007;
    } // B1
    if ac13 & 0x0008 != 0 {
        f ^= 0x003;
    } // B2
    if ac13 & 0x0002 != 0 {
        f ^= 0x001;
    } // B4

    if f & 1 != 0 {
        h = 6 - h;
    }

    let altitude = 500 * f + 100 * h - 1300;
    if altitude < -1200 {
        return None;
    }
    Some(altitude)
}

/// Decodes a 12-bit altitude field by widening it to AC13 and reusing that decode.
pub fn decode_ac12(ac12: u32) -> Option<i32> {
    let ac13 = ((ac12 & 0x0fc0) << 1) | (ac12 & 0x003f);
    decode_ac13(ac13)
}

/// Payload carried by event messages (`df >= DF_MODEAC`). Untyped to match the
/// variety of shapes the different event kinds need (§6).
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventData {
    Null,
    U64(u64),
    I8(i8),
    F32(f32),
    Bool(bool),
    Str(String),
    StrList(Vec<String>),
    Map(BTreeMap<String, EventData>),
}

/// The canonical decoded frame: either a real Mode S/Mode A/C reply or a
/// synthetic event (`df >= DF_MODEAC`).
///
/// Equality, ordering, and hashing are defined over `data` alone (lexicographic
/// by byte, Jenkins one-at-a-time over the first four bytes) so that two
/// messages with identical bodies compare equal regardless of decode state —
/// matching the wire-identity semantics the source used for dedup.
#[derive(Clone, Debug, Serialize)]
pub struct ModesMessage {
    pub timestamp: u64,
    pub signal: u8,

    pub df: u32,
    pub nuc: u32,

    pub even_cpr: bool,
    pub odd_cpr: bool,
    pub valid: bool,
    pub crc_residual: Option<u32>,
    pub address: Option<u32>,
    pub altitude: Option<i32>,

    #[serde(serialize_with = "data_as_hex")]
    pub data: Vec<u8>,

    pub eventdata: BTreeMap<String, EventData>,
}

fn data_as_hex<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(data))
}

impl ModesMessage {
    fn blank(timestamp: u64, signal: u8, data: Vec<u8>) -> Self {
        ModesMessage {
            timestamp,
            signal,
            df: 0,
            nuc: 0,
            even_cpr: false,
            odd_cpr: false,
            valid: false,
            crc_residual: None,
            address: None,
            altitude: None,
            data,
            eventdata: BTreeMap::new(),
        }
    }

    /// Decodes a raw Mode S/Mode A/C body, per the dispatch table in §4.3.
    ///
    /// `data.len()` must be 2, 7, or 14; any other length yields a message
    /// with `valid = false` and nothing else populated (the caller is
    /// expected to have already sized the body correctly from the framer).
    pub fn from_buffer(timestamp: u64, signal: u8, data: Vec<u8>) -> Self {
        let mut message = ModesMessage::blank(timestamp, signal, data);

        if message.data.len() == 2 {
            message.df = DF_MODEAC;
            message.address =
                Some(((message.data[0] as u32) << 8) | message.data[1] as u32);
            message.valid = true;
            return message;
        }

        let df = ((message.data[0] >> 3) & 31) as u32;
        message.df = df;

        let len = message.data.len();
        if (df < 16 && len != 7) || (df >= 16 && len != 14) {
            // wrong body length for this DF; no further processing
            return message;
        }

        let crc = modes_crc::residual(&message.data);
        message.crc_residual = Some(crc);

        match df {
            modes::DF_SHORT_AIR_SURVEILLANCE
            | modes::DF_SURVEILLANCE_ALTITUDE
            | modes::DF_COMM_B_ALTITUDE
            | modes::DF_COMM_B_IDENTITY => {
                message.address = Some(crc);
                message.altitude = decode_ac13(
                    ((message.data[2] & 0x1f) as u32) << 8 | message.data[3] as u32,
                );
                message.valid = true;
            }
            modes::DF_SURVEILLANCE_IDENTITY | modes::DF_COMM_D_ELM | modes::DF_COMM_D_ELM_UF24 => {
                // DF24 is dispatched through the same length gate as every
                // other long-frame DF above, which can misclassify real
                // ELM traffic in the wild; preserved as the prior
                // implementation behaved.
                message.address = Some(crc);
                message.valid = true;
            }
            modes::DF_ALL_CALL_REPLY => {
                message.valid = (crc & !0x7f) == 0;
                if message.valid {
                    message.address = Some(address_from_body(&message.data));
                }
            }
            modes::DF_EXTENDED_SQUITTER | modes::DF_EXTENDED_SQUITTER_NON_TRANSPONDER => {
                message.valid = crc == 0;
                if message.valid {
                    message.address = Some(address_from_body(&message.data));
                    decode_es_airborne_position(&mut message);
                }
            }
            _ => {
                // unrecognized DF; leave valid = false
            }
        }

        message
    }

    /// Builds a synthetic event message. `data` stays empty; `eventdata`
    /// carries the event-specific payload described in §6.
    pub fn new_event(df: u32, timestamp: u64, eventdata: BTreeMap<String, EventData>) -> Self {
        let mut message = ModesMessage::blank(timestamp, 0, Vec::new());
        message.df = df;
        message.eventdata = eventdata;
        message
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Jenkins one-at-a-time hash over the first four body bytes.
    pub fn hash_key(&self) -> u32 {
        let mut hash: u32 = 0;
        for &byte in self.data.iter().take(4) {
            hash = hash.wrapping_add(byte as u32);
            hash = hash.wrapping_add(hash << 10);
            hash ^= hash >> 6;
        }
        hash = hash.wrapping_add(hash << 3);
        hash ^= hash >> 11;
        hash = hash.wrapping_add(hash << 15);
        hash
    }
}

fn address_from_body(data: &[u8]) -> u32 {
    (data[1] as u32) << 16 | (data[2] as u32) << 8 | data[3] as u32
}

/// ADS-B extended squitter airborne position fields: NUCp, CPR parity, AC12
/// altitude, plus the crude zero-data sanity check from §4.3.
fn decode_es_airborne_position(message: &mut ModesMessage) {
    let metype = message.data[4] >> 3;
    let is_airborne_position = (9..=18).contains(&metype) || (20..=21).contains(&metype);
    if !is_airborne_position {
        return;
    }

    message.nuc = if metype <= 18 {
        18 - metype as u32
    } else {
        29 - metype as u32
    };

    if message.data[6] & 0x04 != 0 {
        message.odd_cpr = true;
    } else {
        message.even_cpr = true;
    }

    let lat_zero = message.data[7] == 0 && (message.data[8] & 0x7f) == 0;
    let lon_zero = message.data[9] == 0 && message.data[10] == 0;
    if lat_zero || lon_zero {
        message.valid = false;
        return;
    }

    let ac12 = ((message.data[5] as u32) << 4) | ((message.data[6] as u32 & 0xf0) >> 4);
    message.altitude = decode_ac12(ac12);
}

impl PartialEq for ModesMessage {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for ModesMessage {}

impl PartialOrd for ModesMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ModesMessage {
    fn cmp(&self, other: &Self) -> Ordering {
        self.data.cmp(&other.data)
    }
}

impl Hash for ModesMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash_key());
    }
}

impl fmt::Display for ModesMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.data.is_empty() {
            write!(f, "{}", hex::encode(&self.data))
        } else if let Some(event_name) = modes::df_event_name(self.df) {
            write!(f, "{}@{}:{:?}", event_name, self.timestamp, self.eventdata)
        } else {
            write!(f, "DF{}@{}:{:?}", self.df, self.timestamp, self.eventdata)
        }
    }
}
