// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use serde::{Deserialize, Serialize};

/// How sequence numbers behave when an initiated session (re)connects.
///
/// `Transient` starts from the configured initial number on every logon;
/// `Persistent` continues from the engine's durable record.
#[repr(u8)]
#[derive(Deserialize, Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SequenceNumberType {
    #[serde(rename = "Transient", alias = "transient", alias = "TRANSIENT")]
    Transient = 0,
    #[default]
    #[serde(rename = "Persistent", alias = "persistent", alias = "PERSISTENT")]
    Persistent = 1,
}

impl SequenceNumberType {
    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Transient),
            1 => Some(Self::Persistent),
            _ => None,
        }
    }
}

impl fmt::Display for SequenceNumberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SequenceNumberType::Transient => "Transient",
            SequenceNumberType::Persistent => "Persistent",
        })
    }
}
