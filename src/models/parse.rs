// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use enum_dispatch::enum_dispatch;

use crate::models::{
    connect::{ApplicationHeartbeat, LibraryConnect, NotLeader},
    control::{Catchup, ControlNotification, NewSentPosition},
    disconnect::Disconnect,
    error::EngineError,
    fix_message::FixMessage,
    frame::split_frame,
    initiate::InitiateConnection,
    logon::Logon,
    manage::ManageConnection,
    message_type::MessageType,
    release::{ReleaseSession, ReleaseSessionReply},
    request_session::{RequestSession, RequestSessionReply},
};

/// Library id the engine itself speaks with on broadcast frames.
pub const ENGINE_LIBRARY_ID: u32 = 0;

/// Accessors shared by every decoded control frame.
#[enum_dispatch]
pub trait ControlFrame {
    fn message_type(&self) -> MessageType;
    fn library_id(&self) -> u32;
}

macro_rules! control_frame {
    ($($ty:ident),+ $(,)?) => {
        $(impl ControlFrame for $ty {
            fn message_type(&self) -> MessageType {
                MessageType::$ty
            }

            fn library_id(&self) -> u32 {
                self.library_id
            }
        })+
    };
}

control_frame!(
    LibraryConnect,
    InitiateConnection,
    ReleaseSession,
    RequestSession,
    ManageConnection,
    Logon,
    FixMessage,
    Disconnect,
    EngineError,
    ApplicationHeartbeat,
    ReleaseSessionReply,
    RequestSessionReply,
    Catchup,
    NewSentPosition,
    NotLeader,
    ControlNotification,
);

/// A decoded engine-to-library frame.
#[enum_dispatch(ControlFrame)]
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    ManageConnection(ManageConnection),
    Logon(Logon),
    FixMessage(FixMessage),
    Disconnect(Disconnect),
    EngineError(EngineError),
    ApplicationHeartbeat(ApplicationHeartbeat),
    ReleaseSessionReply(ReleaseSessionReply),
    RequestSessionReply(RequestSessionReply),
    Catchup(Catchup),
    NewSentPosition(NewSentPosition),
    NotLeader(NotLeader),
    ControlNotification(ControlNotification),
}

impl EngineMessage {
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let (header, block, var) = split_frame(frame)?;
        Ok(match header.template()? {
            MessageType::ManageConnection => {
                Self::ManageConnection(ManageConnection::decode(block, var)?)
            },
            MessageType::Logon => Self::Logon(Logon::decode(block, var)?),
            MessageType::FixMessage => Self::FixMessage(FixMessage::decode(block, var)?),
            MessageType::Disconnect => Self::Disconnect(Disconnect::decode(block, var)?),
            MessageType::EngineError => {
                Self::EngineError(EngineError::decode(block, var)?)
            },
            MessageType::ApplicationHeartbeat => {
                Self::ApplicationHeartbeat(ApplicationHeartbeat::decode(block, var)?)
            },
            MessageType::ReleaseSessionReply => {
                Self::ReleaseSessionReply(ReleaseSessionReply::decode(block, var)?)
            },
            MessageType::RequestSessionReply => {
                Self::RequestSessionReply(RequestSessionReply::decode(block, var)?)
            },
            MessageType::Catchup => Self::Catchup(Catchup::decode(block, var)?),
            MessageType::NewSentPosition => {
                Self::NewSentPosition(NewSentPosition::decode(block, var)?)
            },
            MessageType::NotLeader => Self::NotLeader(NotLeader::decode(block, var)?),
            MessageType::ControlNotification => {
                Self::ControlNotification(ControlNotification::decode(block, var)?)
            },
            other => anyhow::bail!("frame {other:?} is not an engine-to-library message"),
        })
    }
}

/// A decoded library-to-engine frame. Decoding lives here so the engine side
/// of a test harness can speak the same wire dialect as the library.
#[enum_dispatch(ControlFrame)]
#[derive(Debug, Clone, PartialEq)]
pub enum LibraryMessage {
    LibraryConnect(LibraryConnect),
    InitiateConnection(InitiateConnection),
    ReleaseSession(ReleaseSession),
    RequestSession(RequestSession),
}

impl LibraryMessage {
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let (header, block, var) = split_frame(frame)?;
        Ok(match header.template()? {
            MessageType::LibraryConnect => {
                Self::LibraryConnect(LibraryConnect::decode(block, var)?)
            },
            MessageType::InitiateConnection => {
                Self::InitiateConnection(InitiateConnection::decode(block, var)?)
            },
            MessageType::ReleaseSession => {
                Self::ReleaseSession(ReleaseSession::decode(block, var)?)
            },
            MessageType::RequestSession => {
                Self::RequestSession(RequestSession::decode(block, var)?)
            },
            other => anyhow::bail!("frame {other:?} is not a library-to-engine message"),
        })
    }
}
