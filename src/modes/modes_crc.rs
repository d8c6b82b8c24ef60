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
 *   https://github.com/antirez/dump1090/
 */

use hex_slice::AsHex;
use log::trace;
use std::sync::OnceLock;

/// Generator polynomial for the Mode S CRC (24-bit, MSB-first, no reflection).
pub const MODES_GENERATOR_POLY: u32 = 0xfff409;

fn crc_table() -> &'static [u32; 256] {
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u32; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let mut c = (i as u32) << 16;
            for _ in 0..8 {
                if c & 0x800000 != 0 {
                    c = (c << 1) ^ MODES_GENERATOR_POLY;
                } else {
                    c <<= 1;
                }
            }
            *entry = c & 0x00ff_ffff;
        }
        table
    })
}

/// Table-driven CRC over the entire buffer.
pub fn buffer_crc(buf: &[u8]) -> u32 {
    let table = crc_table();
    let mut rem: u32 = 0;
    for &byte in buf {
        rem = ((rem & 0x00ffff) << 8) ^ table[(byte as u32 ^ ((rem & 0xff0000) >> 16)) as usize];
    }
    trace!("crc: buf = {:#02x}, rem = {:#08x}", buf.as_hex(), rem);
    rem
}

/// CRC residual of a full Mode S frame: `buffer_crc` over everything but the
/// last 3 bytes, XORed with the 24-bit value carried in those last 3 bytes.
///
/// For AP-overlaid frames the residual equals the ICAO address; for DF11 it
/// equals the IID in the low 7 bits; for DF17/18 it is 0 when the frame is
/// intact.
pub fn residual(frame: &[u8]) -> u32 {
    let len = frame.len();
    if len < 3 {
        return 0;
    }

    let crc = buffer_crc(&frame[..len - 3]);
    crc ^ ((frame[len - 3] as u32) << 16) ^ ((frame[len - 2] as u32) << 8) ^ (frame[len - 1] as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_entry_for_zero_byte_is_zero() {
        // shifting a zero byte into the register never sets the top bit, so
        // the register stays zero through all eight shifts.
        let table = crc_table();
        assert_eq!(table[0], 0);
    }

    #[test]
    fn residual_of_intact_df17_is_zero() {
        // a synthetic DF17 squitter (address 4b1785) with a correct trailing CRC
        let frame = hex::decode("8d4b1785580ded18280000ff2870").unwrap();
        assert_eq!(residual(&frame), 0);
    }

    #[test]
    fn residual_of_corrupt_frame_is_nonzero() {
        let mut frame = hex::decode("8d4b1785580ded18280000ff2870").unwrap();
        frame[3] ^= 0x01;
        assert_ne!(residual(&frame), 0);
    }

    #[test]
    fn short_frame_residual_is_zero() {
        assert_eq!(residual(&[0x00, 0x01]), 0);
    }
}
