/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Read;
use std::io::Write;
use std::net::Shutdown;
use std::net::TcpStream;
use std::net::ToSocketAddrs;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConnection;
use rustls::RootCertStore;
use rustls::StreamOwned;
use rustls::pki_types::ServerName;
use tracing::debug;

use crate::Element;

use super::Action;
use super::AuthState;
use super::ClientAuthenticator;
use super::ClientConfig;
use super::Jid;
use super::Signal;
use super::TlsError;
use super::XmlStream;
use super::XmppError;
use super::constants::CLIENT_PORT;
use super::constants::events;

pub struct XmppClientBuilder {
    config: ClientConfig,
    server: Option<String>,
    connection_timeout: Duration,
    debug: bool,
}

impl XmppClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        XmppClientBuilder {
            config,
            server: None,
            connection_timeout: Duration::from_secs(30),
            debug: false,
        }
    }

    pub fn server(mut self, server: Option<String>) -> Self {
        self.server = server;
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Prints all sent and received bytes to the standard output.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn connect(self) -> Result<XmppClient, XmppError> {
        let domain = self.config.jid().domainpart().to_string();
        let host = match &self.server {
            Some(server) => server.as_str(),
            None => domain.as_str(),
        };
        // Rust resolver does require a port number but does NOT provide
        // a way to provide a default one :(
        let column_pos = host.find(':');
        let bracket_pos = host.find(']');
        let need_port = match (column_pos, bracket_pos) {
            (None, None) | (None, Some(_)) => true,
            (Some(_), None) => false,
            (Some(column), Some(bracket)) => column < bracket,
        };
        let mut addresses = if need_port {
            (host, CLIENT_PORT).to_socket_addrs()
        } else {
            host.to_socket_addrs()
        }?;
        let Some(address) = addresses.next() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no address found for {host}"),
            )
            .into());
        };
        debug!(%address, "connecting");
        let tcp_stream = TcpStream::connect_timeout(&address, self.connection_timeout)?;

        let (stream, auth) = ClientAuthenticator::create_stream(self.config);
        let stanzas: Rc<RefCell<VecDeque<Element>>> = Rc::default();
        let failure: Rc<RefCell<Option<XmppError>>> = Rc::default();
        for query in ["/message", "/presence", "/iq[@type='get']", "/iq[@type='set']"] {
            let stanzas = Rc::clone(&stanzas);
            stream.dispatcher().subscribe(query, -100, move |signal| {
                if let Signal::Element(el) = signal {
                    stanzas.borrow_mut().push_back(el.clone());
                }
                Ok(())
            })?;
        }
        for event in [events::INIT_FAILED, events::STREAM_ERROR] {
            let failure = Rc::clone(&failure);
            stream.dispatcher().subscribe(event, 0, move |signal| {
                if let Signal::Failure(err) = signal {
                    failure.borrow_mut().get_or_insert_with(|| err.clone());
                }
                Ok(())
            })?;
        }
        if self.debug {
            stream.dispatcher().subscribe(events::RAW_IN, 0, |signal| {
                if let Signal::Data(bytes) = signal {
                    println!("Received bytes: {}", String::from_utf8_lossy(bytes));
                }
                Ok(())
            })?;
            stream.dispatcher().subscribe(events::RAW_OUT, 0, |signal| {
                if let Signal::Data(bytes) = signal {
                    println!("Sending bytes: {}", String::from_utf8_lossy(bytes));
                }
                Ok(())
            })?;
        }

        let mut client = XmppClient {
            stream,
            auth,
            transport: Transport::Plain(tcp_stream),
            domain,
            stanzas,
            failure,
            read_buffer: vec![0; 4096],
        };
        client.stream.connection_made();
        client.pump()?;
        Ok(client)
    }
}

enum Transport {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
    Closed,
}

impl Transport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Transport::Plain(tcp) => tcp.read(buf),
            Transport::Tls(tls) => tls.read(buf),
            Transport::Closed => Ok(0),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match self {
            Transport::Plain(tcp) => tcp.write_all(bytes),
            Transport::Tls(tls) => {
                tls.write_all(bytes)?;
                tls.flush()
            }
            Transport::Closed => Err(std::io::ErrorKind::NotConnected.into()),
        }
    }

    fn close(&mut self) {
        match std::mem::replace(self, Transport::Closed) {
            Transport::Plain(tcp) => {
                let _ = tcp.shutdown(Shutdown::Both);
            }
            Transport::Tls(mut tls) => {
                tls.conn.send_close_notify();
                let _ = tls.flush();
                let _ = tls.sock.shutdown(Shutdown::Both);
            }
            Transport::Closed => {}
        }
    }
}

/// Blocking XMPP client over TCP, with STARTTLS through rustls.
pub struct XmppClient {
    stream: XmlStream,
    auth: Rc<ClientAuthenticator>,
    transport: Transport,
    domain: String,
    stanzas: Rc<RefCell<VecDeque<Element>>>,
    failure: Rc<RefCell<Option<XmppError>>>,
    read_buffer: Vec<u8>,
}

impl XmppClient {
    pub fn build(config: ClientConfig) -> XmppClientBuilder {
        XmppClientBuilder::new(config)
    }

    pub fn stream(&self) -> &XmlStream {
        &self.stream
    }

    pub fn jid(&self) -> Jid {
        self.auth.jid()
    }

    /// Carries out the actions queued by the stream.
    fn pump(&mut self) -> Result<(), XmppError> {
        while let Some(action) = self.stream.next_action() {
            match action {
                Action::Send(bytes) => self.transport.write_all(&bytes)?,
                Action::StartTls => self.start_tls()?,
                Action::Close => {
                    self.transport.close();
                    self.stream.connection_lost();
                }
            }
        }
        Ok(())
    }

    fn start_tls(&mut self) -> Result<(), XmppError> {
        let Transport::Plain(tcp) = std::mem::replace(&mut self.transport, Transport::Closed) else {
            return Err(TlsError::Handshake("transport is not plain TCP".to_string()).into());
        };
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let name = ServerName::try_from(self.domain.clone())
            .map_err(|err| TlsError::Handshake(err.to_string()))?;
        let conn = ClientConnection::new(Arc::new(config), name)
            .map_err(|err| TlsError::Handshake(err.to_string()))?;
        let mut tls = StreamOwned::new(conn, tcp);
        debug!(domain = %self.domain, "TLS handshake");
        while tls.conn.is_handshaking() {
            tls.conn
                .complete_io(&mut tls.sock)
                .map_err(|err| TlsError::Handshake(err.to_string()))?;
        }
        self.transport = Transport::Tls(Box::new(tls));
        self.stream.security_layer_established();
        Ok(())
    }

    fn read_once(&mut self) -> Result<(), XmppError> {
        self.pump()?;
        if self.stream.is_closed() {
            return Err(XmppError::ConnectionLost);
        }
        let nr_read = self.transport.read(&mut self.read_buffer)?;
        if nr_read == 0 {
            self.transport.close();
            self.stream.connection_lost();
            return Err(XmppError::ConnectionLost);
        }
        self.stream.data_received(&self.read_buffer[..nr_read]);
        self.pump()
    }

    fn take_failure(&self) -> Option<XmppError> {
        self.failure.borrow_mut().take()
    }

    /// Runs the stream negotiation, returns the bound JID.
    pub fn run_until_authenticated(&mut self) -> Result<Jid, XmppError> {
        loop {
            if let Some(err) = self.take_failure() {
                return Err(err);
            }
            match self.auth.state() {
                AuthState::Authenticated => return Ok(self.auth.jid()),
                AuthState::Ended => return Err(XmppError::ConnectionLost),
                _ => self.read_once()?,
            }
        }
    }

    /// Returns the next message, presence or iq request received.
    pub fn wait_for_stanza(&mut self) -> Result<Element, XmppError> {
        loop {
            if let Some(stanza) = self.stanzas.borrow_mut().pop_front() {
                return Ok(stanza);
            }
            if let Some(err) = self.take_failure() {
                return Err(err);
            }
            self.read_once()?;
        }
    }

    pub fn send(&mut self, stanza: &Element) -> Result<(), XmppError> {
        self.stream.send(stanza);
        self.pump()
    }

    pub fn close(&mut self) -> Result<(), XmppError> {
        self.stream.close();
        self.pump()
    }
}
