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

// Real Mode S downlink formats handled by the decoder (§4.3).
pub const DF_SHORT_AIR_SURVEILLANCE: u32 = 0;
pub const DF_SURVEILLANCE_ALTITUDE: u32 = 4;
pub const DF_SURVEILLANCE_IDENTITY: u32 = 5;
pub const DF_ALL_CALL_REPLY: u32 = 11;
pub const DF_COMM_B_ALTITUDE: u32 = 16;
pub const DF_EXTENDED_SQUITTER: u32 = 17;
pub const DF_EXTENDED_SQUITTER_NON_TRANSPONDER: u32 = 18;
pub const DF_COMM_B_IDENTITY: u32 = 20;
pub const DF_COMM_D_ELM: u32 = 21;
pub const DF_COMM_D_ELM_UF24: u32 = 24;

// Special DF types for non-Mode-S messages
pub const DF_MODEAC: u32 = 32;
pub const DF_EVENT_TIMESTAMP_JUMP: u32 = 33;
pub const DF_EVENT_MODE_CHANGE: u32 = 34;
pub const DF_EVENT_EPOCH_ROLLOVER: u32 = 35;
pub const DF_EVENT_RADARCAPE_STATUS: u32 = 36;
pub const DF_EVENT_RADARCAPE_POSITION: u32 = 37;

/// A timestamp that indicates the data is synthetic, created from a
/// multilateration result. (0xFF00 "MLAT" as ASCII)
pub const MAGIC_MLAT_TIMESTAMP: u64 = 0xFF004D4C4154;

/// Number of consecutive outliers tolerated before a jump event fires.
pub const OUTLIER_LIMIT: u32 = 1;

/// True if `timestamp` is a synthetic value exempt from clock discipline:
/// either "no timestamp available" (0) or one of the 11 values making up
/// the MLAT magic sentinel range.
pub fn is_synthetic_timestamp(timestamp: u64) -> bool {
    timestamp == 0 || (timestamp >= MAGIC_MLAT_TIMESTAMP && timestamp <= MAGIC_MLAT_TIMESTAMP + 10)
}

pub fn df_event_name(df: u32) -> Option<&'static str> {
    match df {
        DF_EVENT_TIMESTAMP_JUMP => Some("DF_EVENT_TIMESTAMP_JUMP"),
        DF_EVENT_MODE_CHANGE => Some("DF_EVENT_MODE_CHANGE"),
        DF_EVENT_EPOCH_ROLLOVER => Some("DF_EVENT_EPOCH_ROLLOVER"),
        DF_EVENT_RADARCAPE_STATUS => Some("DF_EVENT_RADARCAPE_STATUS"),
        DF_EVENT_RADARCAPE_POSITION => Some("DF_EVENT_RADARCAPE_POSITION"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_timestamp_bounds() {
        assert!(is_synthetic_timestamp(0));
        assert!(is_synthetic_timestamp(MAGIC_MLAT_TIMESTAMP));
        assert!(is_synthetic_timestamp(MAGIC_MLAT_TIMESTAMP + 10));
        assert!(!is_synthetic_timestamp(MAGIC_MLAT_TIMESTAMP + 11));
        assert!(!is_synthetic_timestamp(1));
    }
}
