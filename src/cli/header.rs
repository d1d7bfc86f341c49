//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Mailextract.
//
// Mailextract is free software: you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Mailextract is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Mailextract. If not, see <http://www.gnu.org/licenses/>.

use log::warn;

use super::main::HeaderCommand;
use crate::mime::address::{parse_address_list, remove_invalid_and_duplicates};
use crate::mime::encoded_word::decode_encoded_words;

pub(super) fn header(cmd: HeaderCommand) {
    match cmd {
        HeaderCommand::Decode { text } => {
            println!("{}", decode_encoded_words(&text));
        },
        HeaderCommand::Addresses { text } => {
            let mut warnings = Vec::new();
            let addresses = remove_invalid_and_duplicates(parse_address_list(
                "Address",
                &text,
                &mut warnings,
            ));

            for warning in warnings {
                warn!("{}", warning);
            }
            for address in addresses {
                println!("{}", address);
            }
        },
    }
}
