// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Handshake tokens and the byte-reversal codec.
//!
//! The handshake is two fixed plaintext literals. The server echoes the
//! first one back with its byte order reversed; the client reverses
//! whatever it receives before comparing. There is no secret here: anyone
//! who knows the identifiers and the literals can complete the handshake.

use super::ble_constants::{FRIEND_TOKEN, MATCH_CONTROL_TOKEN};

/// Return a copy of `bytes` with the byte order fully reversed.
///
/// Applying it twice yields the input, including for the empty slice.
pub fn reverse(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().rev().copied().collect()
}

/// The two handshake messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Sent by the client once the service is found; echoed by the server.
    MatchControl,
    /// Sent by the client once proximity holds; terminal for the server.
    Friend,
}

impl Token {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MatchControl => "MATCH_CONTROL",
            Self::Friend => "FRIEND",
        }
    }
}

/// Wire values of the two tokens, agreed out of band by both roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens {
    match_control: Vec<u8>,
    friend: Vec<u8>,
}

impl Default for Tokens {
    fn default() -> Self {
        Self::new(MATCH_CONTROL_TOKEN, FRIEND_TOKEN)
    }
}

impl Tokens {
    pub fn new(match_control: impl Into<String>, friend: impl Into<String>) -> Self {
        Self {
            match_control: match_control.into().into_bytes(),
            friend: friend.into().into_bytes(),
        }
    }

    /// Bytes to write for `token`.
    pub fn encode(&self, token: Token) -> Vec<u8> {
        match token {
            Token::MatchControl => self.match_control.clone(),
            Token::Friend => self.friend.clone(),
        }
    }

    /// Identify a value written to the server's characteristic.
    ///
    /// Writes arrive unreversed, so this is a plain comparison.
    pub fn classify(&self, value: &[u8]) -> Option<Token> {
        if value == self.match_control.as_slice() {
            Some(Token::MatchControl)
        } else if value == self.friend.as_slice() {
            Some(Token::Friend)
        } else {
            None
        }
    }

    /// Value the server notifies after accepting a match-control write.
    pub fn echo(&self, value: &[u8]) -> Vec<u8> {
        reverse(value)
    }

    /// Whether an inbound value on the client decodes to the match-control
    /// token once reversed.
    pub fn is_echo(&self, value: &[u8]) -> bool {
        reverse(value) == self.match_control
    }
}

/// Render a value for logs without assuming it is valid UTF-8.
pub fn display_value(value: &[u8]) -> String {
    String::from_utf8_lossy(value).into_owned()
}
