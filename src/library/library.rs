// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The library poller: a single-threaded cooperative loop owning the
//! registry, the reply tracker, the liveness detector and the connect
//! controller. The caller provides the thread and calls [`FixLibrary::poll`]
//! at whatever cadence suits it; no thread is ever spawned and no call
//! blocks on I/O. The one bounded busy-wait is the connect loop, which polls
//! the transport with the configured idle strategy until an engine heartbeat
//! arrives or the attempt budget is spent.

use std::rc::Rc;

use bytes::BytesMut;
use tracing::{debug, info, warn};

use crate::{
    cfg::config::{LibraryConfig, SessionConfig},
    errors::LibraryError,
    library::{
        connector::ConnectController,
        dispatcher::Dispatcher,
        handler::LibraryHandler,
        liveness::LivenessDetector,
        proxy::GatewayProxy,
        replies::{Reply, ReplyKind, ReplyTracker},
    },
    models::{
        error::EngineErrorType,
        initiate::InitiateConnection,
        release::ReleaseSession,
        request_session::RequestSession,
    },
    session::{registry::SessionRegistry, session::SessionState},
    transport::{InboundSubscription, OutboundPublication},
    utils::{EpochClock, SystemEpochClock},
};

/// Fragments drained per transport poll inside the connect loop.
const CONNECT_FRAGMENT_LIMIT: usize = 10;

pub struct FixLibrary {
    cfg: LibraryConfig,
    clock: Box<dyn EpochClock>,
    subscription: Box<dyn InboundSubscription>,
    proxy: GatewayProxy,
    registry: SessionRegistry,
    tracker: ReplyTracker,
    liveness: LivenessDetector,
    connector: ConnectController,
    handler: Box<dyn LibraryHandler>,
    closed: bool,
}

impl FixLibrary {
    /// Builds a library and blocks (bounded) until the control-plane
    /// connection to one of the configured engines is live.
    pub fn connect(
        cfg: LibraryConfig,
        handler: Box<dyn LibraryHandler>,
        subscription: Box<dyn InboundSubscription>,
        publication: Rc<dyn OutboundPublication>,
    ) -> Result<Self, LibraryError> {
        Self::connect_with_clock(
            cfg,
            handler,
            subscription,
            publication,
            Box::new(SystemEpochClock),
        )
    }

    pub fn connect_with_clock(
        cfg: LibraryConfig,
        handler: Box<dyn LibraryHandler>,
        subscription: Box<dyn InboundSubscription>,
        publication: Rc<dyn OutboundPublication>,
        clock: Box<dyn EpochClock>,
    ) -> Result<Self, LibraryError> {
        cfg.validate()
            .map_err(|e| LibraryError::InvalidConfiguration(format!("{e:#}")))?;

        let proxy = GatewayProxy::new(cfg.library_id, publication);
        let connector = ConnectController::new(cfg.engine_channels.clone());
        let liveness = LivenessDetector::new(cfg.reply_timeout_ms);

        let mut library = Self {
            cfg,
            clock,
            subscription,
            proxy,
            registry: SessionRegistry::new(),
            tracker: ReplyTracker::new(),
            liveness,
            connector,
            handler,
            closed: false,
        };
        library.connect_loop()?;
        Ok(library)
    }

    /// One cooperative tick. Drains up to `fragment_limit` inbound fragments,
    /// polls every owned session, runs liveness detection and the reply
    /// deadline sweep, and returns the amount of work done.
    pub fn poll(&mut self, fragment_limit: usize) -> Result<u64, LibraryError> {
        if self.closed {
            return Err(LibraryError::Closed);
        }
        let mut work = 0u64;

        // A reconnect left pending from an earlier failed attempt.
        if self.connector.clustered() && !self.liveness.is_connected() {
            self.connect_loop()?;
            work += 1;
        }

        work += self.drain(fragment_limit) as u64;

        let now = self.clock.time_ms();
        work += self.registry.poll_sessions(now);

        let mut liveness_lost = false;
        self.liveness.poll(now, || liveness_lost = true);
        if liveness_lost {
            work += 1;
            if self.connector.clustered() {
                self.connector.advance_channel();
                self.connect_loop()?;
            }
        }

        work += self.tracker.publish_pending(self.proxy.publication());
        work += self.tracker.sweep(now);
        Ok(work)
    }

    /// Asks the engine to open an outbound FIX connection; the returned
    /// handle resolves once the engine hands the session over.
    pub fn initiate(&mut self, session: SessionConfig) -> Result<Reply, LibraryError> {
        self.ensure_open()?;
        let correlation_id = self.tracker.next_correlation_id();
        let msg = InitiateConnection {
            library_id: self.cfg.library_id,
            port: session.port,
            sequence_number_type: session.sequence_number_type,
            initial_sequence_number: session.initial_sequence_number,
            heartbeat_interval_s: session.heartbeat_interval_s,
            correlation_id,
            host: session.host,
            sender_comp_id: session.sender_comp_id,
            sender_sub_id: session.sender_sub_id,
            sender_location_id: session.sender_location_id,
            target_comp_id: session.target_comp_id,
            username: session.username.clone(),
            password: session.password.clone(),
        };
        let mut buf = BytesMut::with_capacity(128);
        msg.encode(&mut buf);

        let deadline = self.clock.time_ms() + self.cfg.reply_timeout_ms;
        let reply = self.tracker.register(
            ReplyKind::Initiate,
            correlation_id,
            deadline,
            buf.freeze(),
            Some((session.username, session.password)),
        );
        self.tracker.publish_pending(self.proxy.publication());
        info!(correlation_id, "initiate submitted");
        Ok(reply)
    }

    /// Returns ownership of a session to the engine.
    pub fn release_to_gateway(&mut self, session_id: i64) -> Result<Reply, LibraryError> {
        self.ensure_open()?;
        let correlation_id = self.tracker.next_correlation_id();
        let library_id = self.cfg.library_id;
        let Some(subscriber) = self.registry.find_by_session_id(session_id) else {
            return Err(LibraryError::UnknownSession(session_id));
        };
        let session = &subscriber.session;
        let msg = ReleaseSession {
            library_id,
            state: session.state(),
            connection_id: session.connection_id(),
            correlation_id,
            heartbeat_interval_ms: session.heartbeat_interval_ms(),
            last_sent_sequence_number: session.last_sent_sequence_number(),
            last_received_sequence_number: session.last_received_sequence_number(),
            username: session.username().to_string(),
            password: session.password().to_string(),
        };
        let mut buf = BytesMut::with_capacity(128);
        msg.encode(&mut buf);

        let deadline = self.clock.time_ms() + self.cfg.reply_timeout_ms;
        let reply = self.tracker.register(
            ReplyKind::Release,
            correlation_id,
            deadline,
            buf.freeze(),
            None,
        );
        self.tracker.publish_pending(self.proxy.publication());
        info!(correlation_id, session_id, "release submitted");
        Ok(reply)
    }

    /// Asks for ownership of an engine-held session.
    pub fn request_session(
        &mut self,
        session_id: i64,
        last_received_sequence_number: i32,
    ) -> Result<Reply, LibraryError> {
        self.ensure_open()?;
        let correlation_id = self.tracker.next_correlation_id();
        let msg = RequestSession {
            library_id: self.cfg.library_id,
            session_id,
            correlation_id,
            last_received_sequence_number,
        };
        let mut buf = BytesMut::with_capacity(64);
        msg.encode(&mut buf);

        let deadline = self.clock.time_ms() + self.cfg.reply_timeout_ms;
        let reply = self.tracker.register(
            ReplyKind::RequestSession,
            correlation_id,
            deadline,
            buf.freeze(),
            None,
        );
        self.tracker.publish_pending(self.proxy.publication());
        info!(correlation_id, session_id, "session request submitted");
        Ok(reply)
    }

    /// Closes the library and disables every owned session. Closing twice is
    /// a programmer error.
    pub fn close(&mut self) -> Result<(), LibraryError> {
        if self.closed {
            return Err(LibraryError::Closed);
        }
        self.registry.close_all();
        self.closed = true;
        info!(library_id = self.cfg.library_id, "library closed");
        Ok(())
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.liveness.is_connected()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn library_id(&self) -> u32 {
        self.cfg.library_id
    }

    pub fn current_channel(&self) -> &str {
        self.connector.current_channel()
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub fn session_ids(&self) -> Vec<i64> {
        self.registry.session_ids()
    }

    /// State of one owned session, if this library holds it.
    pub fn session_state(&self, session_id: i64) -> Option<SessionState> {
        self.registry
            .get_by_session_id(session_id)
            .map(|s| s.session.state())
    }

    pub fn pending_replies(&self) -> usize {
        self.tracker.pending_count()
    }

    // --- internals ---

    fn ensure_open(&self) -> Result<(), LibraryError> {
        if self.closed {
            return Err(LibraryError::Closed);
        }
        Ok(())
    }

    fn drain(&mut self, fragment_limit: usize) -> usize {
        let now_ms = self.clock.time_ms();
        let mut dispatcher = Dispatcher {
            library_id: self.cfg.library_id,
            now_ms,
            registry: &mut self.registry,
            tracker: &mut self.tracker,
            liveness: &mut self.liveness,
            connector: &mut self.connector,
            handler: self.handler.as_mut(),
        };
        self.subscription.poll(&mut dispatcher, fragment_limit)
    }

    /// Iterative connect state machine:
    ///
    /// ```text
    /// INIT -> SEND_CONNECT -> AWAIT_HEARTBEAT -> CONNECTED
    ///             ^               |  deadline -> next engine, budget - 1
    ///             |               |  redirect -> restart on new channel
    ///             +---------------+  latched error -> fail
    /// ```
    fn connect_loop(&mut self) -> Result<(), LibraryError> {
        self.connector.set_connecting(true);
        let result = self.run_connect_attempts();
        self.connector.set_connecting(false);
        result
    }

    fn run_connect_attempts(&mut self) -> Result<(), LibraryError> {
        let mut attempts_left = self.cfg.reconnect_attempts;
        loop {
            let channel = self.connector.current_channel().to_string();
            self.initialize_streams(&channel)?;

            let correlation_id = self.tracker.next_correlation_id();
            self.connector.begin_attempt(correlation_id);
            self.proxy.library_connect(correlation_id);

            let start = self.clock.time_ms();
            let deadline = start + self.cfg.reply_timeout_ms;
            let resend_interval = (self.cfg.reply_timeout_ms / 4).max(1);
            let mut next_resend = start + resend_interval;
            let mut redirected = false;

            while self.clock.time_ms() < deadline {
                self.drain(CONNECT_FRAGMENT_LIMIT);

                if let Some((kind, message)) = self.connector.take_latched_error() {
                    warn!(%kind, message = %message, "connect failed with engine error");
                    return Err(map_connect_error(kind, message));
                }
                if self.connector.take_channel_changed() {
                    redirected = true;
                    break;
                }
                if self.liveness.is_connected() {
                    self.connector.mark_streams_initialized();
                    info!(channel = %channel, correlation_id, "connected to engine");
                    return Ok(());
                }

                let now = self.clock.time_ms();
                if now >= next_resend {
                    // Heartbeat still outstanding; the connect frame may have
                    // raced a leader change, so keep offering it.
                    self.proxy.library_connect(correlation_id);
                    next_resend = now + resend_interval;
                }
                self.cfg.idle_strategy.idle();
            }

            if redirected {
                // A redirect is not a failed attempt.
                debug!(
                    channel = self.connector.current_channel(),
                    "restarting connect on redirected channel"
                );
                continue;
            }
            if attempts_left == 0 {
                return Err(LibraryError::UnableToConnect {
                    attempts: self.cfg.reconnect_attempts,
                    channel,
                });
            }
            attempts_left -= 1;
            self.connector.advance_channel();
        }
    }

    fn initialize_streams(&mut self, channel: &str) -> Result<(), LibraryError> {
        if !self.connector.needs_stream_initialization() {
            return Ok(());
        }
        self.subscription
            .reconnect(channel)
            .and_then(|()| self.proxy.publication().reconnect(channel))
            .map_err(|e| LibraryError::UnableToConnect {
                attempts: 0,
                channel: format!("{channel}: {e:#}"),
            })
    }
}

fn map_connect_error(kind: EngineErrorType, message: String) -> LibraryError {
    match kind {
        EngineErrorType::InvalidConfiguration | EngineErrorType::UnknownLibrary => {
            LibraryError::InvalidConfiguration(format!("{kind}: {message}"))
        },
        EngineErrorType::DuplicateSession => LibraryError::DuplicateSession(0),
        _ => LibraryError::UnableToConnect {
            attempts: 0,
            channel: message,
        },
    }
}
