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

pub mod avr;
pub mod beast;
pub mod sbs;

use crate::modes::modes_error::CoreError;
use crate::modes::modes_message::ModesMessage;

/// Common return shape for every framer's `feed` entry point (design note
/// §9: the source's goto/error-pending idiom maps onto a sum type).
pub enum FeedOutcome {
    /// Clean parse; `consumed` bytes of the input buffer were fully decoded.
    Ok { messages: Vec<ModesMessage>, consumed: usize },
    /// A sync error was hit, but messages decoded *before* the bad byte are
    /// still returned; the caller must advance past `consumed` bytes and
    /// will get `error` again (at offset 0 of what remains) on the next call.
    Pending { messages: Vec<ModesMessage>, consumed: usize, error: CoreError },
    /// Unrecoverable; no partial progress is reported.
    Fatal(CoreError),
}
