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

use thiserror::Error;

/// Errors that can cross a single `feed()` call boundary.
///
/// Stream sync errors are recoverable from the caller's point of view: the
/// framer flushes any already-decoded messages first and only raises the
/// error on the *next* call, at offset 0 of the remaining buffer. A
/// `ClockReset` is the only error that persists past that boundary in the
/// sense that the caller is expected to drop all downstream synchronization
/// state in response to it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Lost sync with the input stream: bad escape sequence, unknown frame
    /// type, or a byte that didn't belong where it was found.
    #[error("lost sync with input stream at offset {offset}: {reason}")]
    Sync { offset: usize, reason: String },

    /// The device clock appears to have been reset outright (not merely
    /// jumped): the timestamp moved outside the plausible window by more
    /// than 90 frequency-seconds in non-GPS modes, or more than 1 second in
    /// GPS mode while not at end-of-day.
    #[error("receiver clock reset detected, last timestamp was {last_timestamp}")]
    ClockReset { last_timestamp: u64 },

    /// No decoder mode has been selected yet.
    #[error("decoder mode is not set, no decoder type selected")]
    NoDecoderMode,
}

pub type CoreResult<T> = Result<T, CoreError>;
