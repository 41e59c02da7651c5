// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Template-id registry for the engine/library control plane.
//!
//! Every frame on the control stream starts with an 8-byte header whose
//! `template_id` selects one of the message kinds below. Ids 1..63 are
//! reserved for library-originated requests, 64.. for engine-originated
//! events and replies.

use std::convert::TryFrom;

use thiserror::Error;

/// All control-plane message kinds understood by this library.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    // library -> engine
    LibraryConnect = 1,
    InitiateConnection = 2,
    ReleaseSession = 3,
    RequestSession = 4,

    // engine -> library
    ManageConnection = 64,
    Logon = 65,
    FixMessage = 66,
    Disconnect = 67,
    EngineError = 68,
    ApplicationHeartbeat = 69,
    ReleaseSessionReply = 70,
    RequestSessionReply = 71,
    Catchup = 72,
    NewSentPosition = 73,
    NotLeader = 74,
    ControlNotification = 75,
}

impl MessageType {
    #[inline]
    pub fn from_u16(v: u16) -> Option<Self> {
        Some(match v {
            1 => Self::LibraryConnect,
            2 => Self::InitiateConnection,
            3 => Self::ReleaseSession,
            4 => Self::RequestSession,
            64 => Self::ManageConnection,
            65 => Self::Logon,
            66 => Self::FixMessage,
            67 => Self::Disconnect,
            68 => Self::EngineError,
            69 => Self::ApplicationHeartbeat,
            70 => Self::ReleaseSessionReply,
            71 => Self::RequestSessionReply,
            72 => Self::Catchup,
            73 => Self::NewSentPosition,
            74 => Self::NotLeader,
            75 => Self::ControlNotification,
            _ => return None,
        })
    }
}

/// Returned when a frame header names a template this library does not know.
#[derive(Debug, Error)]
#[error("unknown template id: {0}")]
pub struct UnknownTemplateId(pub u16);

impl TryFrom<u16> for MessageType {
    type Error = UnknownTemplateId;

    fn try_from(v: u16) -> Result<Self, Self::Error> {
        MessageType::from_u16(v).ok_or(UnknownTemplateId(v))
    }
}
