/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod bind;
mod component;
mod legacy;
mod sasl;
mod tls;

use std::cell::Cell;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use sha1::Digest;
use sha1::Sha1;
use tracing::debug;
use tracing::warn;

use crate::Element;

use super::Jid;
use super::Promise;
use super::Signal;
use super::StreamConfig;
use super::XmlStream;
use super::XmppError;
use super::constants::NS_CLIENT;
use super::constants::NS_STREAMS;
use super::constants::events;

pub use component::ComponentAuthenticator;

/// Resource used for legacy authentication when the JID has none.
pub const DEFAULT_RESOURCE: &str = "iksemel";

/// Progress of the stream negotiation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthState {
    Connecting,
    AwaitingRoot,
    AwaitingFeatures,
    Authenticating,
    Bound,
    Authenticated,
    Ended,
}

/// Drives the negotiation of a stream from connection to authentication.
///
/// The stream calls these as the transport and the peer make progress.
pub trait Authenticator {
    fn connection_made(self: Rc<Self>, stream: &XmlStream);

    /// The peer's root element has arrived.
    fn stream_started(self: Rc<Self>, stream: &XmlStream, root: &Element);

    fn connection_lost(self: Rc<Self>, _stream: &XmlStream) {}
}

/// What the authenticator does after an initializer succeeds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Step {
    /// Continue with the next initializer.
    Done,
    /// Restart the stream and continue when the new features arrive.
    Reset,
}

/// One step of the stream negotiation, such as STARTTLS or resource binding.
pub trait Initializer {
    fn name(&self) -> &'static str;

    /// The negotiation state while this initializer runs.
    fn state(&self) -> AuthState {
        AuthState::AwaitingFeatures
    }

    fn initialize(&self, stream: &XmlStream) -> Promise<Step>;
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TlsPolicy {
    Never,
    #[default]
    IfAvailable,
    Required,
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    jid: Jid,
    password: Option<String>,
    tls_policy: TlsPolicy,
    allow_legacy: bool,
}

impl ClientConfig {
    pub fn new(jid: Jid) -> ClientConfig {
        ClientConfig {
            jid,
            password: None,
            tls_policy: TlsPolicy::default(),
            allow_legacy: true,
        }
    }

    pub fn password(mut self, password: &str) -> ClientConfig {
        self.password = Some(password.to_string());
        self
    }

    pub fn tls_policy(mut self, policy: TlsPolicy) -> ClientConfig {
        self.tls_policy = policy;
        self
    }

    /// Allows servers without XMPP 1.0 and `jabber:iq:auth` login.
    pub fn allow_legacy(mut self, allow: bool) -> ClientConfig {
        self.allow_legacy = allow;
        self
    }

    pub fn jid(&self) -> &Jid {
        &self.jid
    }
}

/// Login data shared by the client initializers.
pub(crate) struct Account {
    jid: RefCell<Jid>,
    password: RefCell<Option<String>>,
    tls_policy: TlsPolicy,
    allow_legacy: bool,
    legacy_used: Cell<bool>,
}

impl Account {
    fn jid(&self) -> Jid {
        self.jid.borrow().clone()
    }

    fn password(&self) -> Option<String> {
        self.password.borrow().clone()
    }
}

pub(crate) fn sha1_hex(parts: &[&str]) -> String {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

pub(crate) fn iq(kind: &str) -> Element {
    let mut iq = Element::new("iq", Some(NS_CLIENT));
    iq.set_attribute("type", kind);
    iq
}

/// Reports a failed negotiation step and closes the stream if the error is fatal.
fn report_failure(stream: &XmlStream, err: XmppError) -> bool {
    warn!(error = %err, "stream negotiation failed");
    if let XmppError::Tls(_) = &err {
        stream.publish_event(events::TLS_FAILED, &Signal::Failure(err.clone()));
    }
    let fatal = err.is_fatal();
    stream.publish_event(events::INIT_FAILED, &Signal::Failure(err));
    if fatal {
        stream.close();
    }
    fatal
}

/// Client side negotiation: STARTTLS, SASL or legacy login, resource
/// binding and session establishment.
///
/// # Examples
///
/// ```
/// use iks_xmlstream::xmpp::{Action, AuthState, ClientAuthenticator, ClientConfig, Jid};
///
/// let jid = Jid::new("juliet@example.com/balcony").unwrap();
/// let (stream, auth) = ClientAuthenticator::create_stream(ClientConfig::new(jid).password("r0m30"));
/// stream.connection_made();
/// assert_eq!(auth.state(), AuthState::AwaitingRoot);
/// assert!(matches!(stream.next_action(), Some(Action::Send(_))));
/// ```
pub struct ClientAuthenticator {
    account: Rc<Account>,
    state: Cell<AuthState>,
    initializers: RefCell<VecDeque<Rc<dyn Initializer>>>,
}

impl ClientAuthenticator {
    pub fn new(config: ClientConfig) -> Rc<ClientAuthenticator> {
        let account = Rc::new(Account {
            jid: RefCell::new(config.jid),
            password: RefCell::new(config.password),
            tls_policy: config.tls_policy,
            allow_legacy: config.allow_legacy,
            legacy_used: Cell::new(false),
        });
        let mut initializers: VecDeque<Rc<dyn Initializer>> = VecDeque::new();
        if !config.allow_legacy {
            initializers.push_back(Rc::new(bind::VersionInitializer));
        }
        initializers.push_back(Rc::new(tls::TlsInitializer::new(Rc::clone(&account))));
        initializers.push_back(Rc::new(AuthInitializer {
            account: Rc::clone(&account),
        }));
        initializers.push_back(Rc::new(bind::BindInitializer::new(Rc::clone(&account))));
        initializers.push_back(Rc::new(bind::SessionInitializer));
        Rc::new(ClientAuthenticator {
            account,
            state: Cell::new(AuthState::Connecting),
            initializers: RefCell::new(initializers),
        })
    }

    /// Creates a client stream with a new authenticator attached.
    pub fn create_stream(config: ClientConfig) -> (XmlStream, Rc<ClientAuthenticator>) {
        let stream = XmlStream::new(StreamConfig::new(NS_CLIENT, config.jid.domainpart()));
        let auth = ClientAuthenticator::new(config);
        stream.set_authenticator(auth.clone());
        (stream, auth)
    }

    pub fn state(&self) -> AuthState {
        self.state.get()
    }

    /// The JID of the session, with the resource assigned by the server once bound.
    pub fn jid(&self) -> Jid {
        self.account.jid()
    }

    pub fn set_password(&self, password: &str) {
        *self.account.password.borrow_mut() = Some(password.to_string());
    }

    /// Appends an initializer to run after the built in ones.
    pub fn add_initializer(&self, initializer: Rc<dyn Initializer>) {
        self.initializers.borrow_mut().push_back(initializer);
    }

    /// Runs the failed initializer again, for example after changing the password.
    pub fn retry(self: &Rc<Self>, stream: &XmlStream) {
        if matches!(self.state.get(), AuthState::Authenticating | AuthState::Bound) {
            Rc::clone(self).run_chain(stream);
        }
    }

    fn run_chain(self: Rc<Self>, stream: &XmlStream) {
        let next = self.initializers.borrow().front().cloned();
        let Some(initializer) = next else {
            debug!(jid = %self.account.jid(), "stream authenticated");
            self.state.set(AuthState::Authenticated);
            stream.publish_event(events::STREAM_AUTHD, &Signal::Stream);
            return;
        };
        debug!(initializer = initializer.name(), "running initializer");
        self.state.set(initializer.state());
        let weak = stream.downgrade();
        let this = Rc::clone(&self);
        initializer.initialize(stream).on_complete(move |result| {
            if let Some(stream) = weak.upgrade() {
                this.step_finished(&stream, result);
            }
        });
    }

    fn step_finished(self: Rc<Self>, stream: &XmlStream, result: Result<Step, XmppError>) {
        match result {
            Ok(step) => {
                self.initializers.borrow_mut().pop_front();
                match step {
                    Step::Done => self.run_chain(stream),
                    Step::Reset => {
                        self.state.set(AuthState::AwaitingRoot);
                        stream.reset();
                        stream.send_header();
                    }
                }
            }
            Err(err) => {
                if report_failure(stream, err) {
                    self.state.set(AuthState::Ended);
                }
            }
        }
    }
}

impl Authenticator for ClientAuthenticator {
    fn connection_made(self: Rc<Self>, stream: &XmlStream) {
        stream.send_header();
        self.state.set(AuthState::AwaitingRoot);
    }

    fn stream_started(self: Rc<Self>, stream: &XmlStream, _root: &Element) {
        if self.state.get() != AuthState::AwaitingRoot {
            warn!(state = ?self.state.get(), "unexpected stream restart");
            return;
        }
        if stream.version() < (1, 0) {
            // No features to wait for
            self.run_chain(stream);
            return;
        }
        self.state.set(AuthState::AwaitingFeatures);
        let weak = stream.downgrade();
        let this = Rc::clone(&self);
        let query = format!("/features[@xmlns='{NS_STREAMS}']");
        let subscribed = stream.dispatcher().subscribe_once(&query, 0, move |_| {
            if let Some(stream) = weak.upgrade() {
                Rc::clone(&this).run_chain(&stream);
            }
            Ok(())
        });
        if let Err(err) = subscribed {
            report_failure(stream, err.into());
        }
    }

    fn connection_lost(self: Rc<Self>, _stream: &XmlStream) {
        if self.state.get() != AuthState::Authenticated {
            debug!(state = ?self.state.get(), "connection lost during negotiation");
        }
        self.state.set(AuthState::Ended);
    }
}

/// Picks SASL when the server offers it, legacy login otherwise.
struct AuthInitializer {
    account: Rc<Account>,
}

impl Initializer for AuthInitializer {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn state(&self) -> AuthState {
        AuthState::Authenticating
    }

    fn initialize(&self, stream: &XmlStream) -> Promise<Step> {
        if let Some(mechanisms) = stream.feature(super::constants::NS_XMPP_SASL, "mechanisms") {
            return sasl::authenticate(stream, &self.account, &mechanisms);
        }
        if self.account.allow_legacy {
            return legacy::authenticate(stream, &self.account);
        }
        Promise::ready(Err(XmppError::FeatureNotAdvertised("mechanisms".to_string())))
    }
}
