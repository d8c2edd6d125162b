//! IRC network handler.
//!
//! One handler per (server, account) pair drives the session state
//! machine: connect, register, identify with NickServ, send the invite
//! command, join channels, then watch announcer lines and feed them to
//! the announce parsers bound to this server. On transport errors the
//! run loop reconnects with exponential backoff.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use snatch_proto::command::response;
use snatch_proto::{Command, Message, Transport};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::announce::{AnnounceParser, ParseOutcome};
use crate::db::{IrcChannel, Network};
use crate::error::HandlerError;
use crate::indexer::{DefinitionError, IndexerDefinition};
use crate::metrics;
use crate::pipeline::ReleaseSink;

use super::{Backoff, ChannelHealth};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(60);
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_IDENTIFY_ATTEMPTS: u32 = 3;
const DEADLINE_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Operations delivered to the run loop from other tasks.
enum HandlerCommand {
    Stop,
    Restart,
    NickChange(String),
    Identify { account: String, password: String },
    JoinChannel(IrcChannel),
    PartChannel(String),
}

/// Why a session ended.
enum SessionEnd {
    /// Stop requested; the run loop terminates.
    Stopped,
    /// Restart requested; reconnect immediately with the latest snapshot.
    Restart,
    /// Transport or auth failure; reconnect after backoff.
    Failed(HandlerError),
}

/// Control flow out of a message or command step.
enum Flow {
    Continue,
    End(SessionEnd),
}

/// Session phase, advanced by server replies.
///
/// Disconnected/Connecting are implicit in the run loop; Terminated is
/// the `stopped` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Registering,
    Identifying,
    Active,
}

/// Per-session mutable state, discarded on reconnect.
struct Session {
    phase: Phase,
    nick: String,
    identify_attempts: u32,
    identify_deadline: Option<Instant>,
    register_deadline: Instant,
    /// Re-identify once the server confirms a nick change.
    reidentify_on_nick: bool,
}

impl Session {
    fn new(network: &Network) -> Self {
        Self {
            phase: Phase::Registering,
            nick: network.nickserv.account.clone(),
            identify_attempts: 0,
            identify_deadline: None,
            register_deadline: Instant::now() + REGISTRATION_TIMEOUT,
            reidentify_on_nick: false,
        }
    }
}

/// An indexer definition bound to this handler, with compiled parser.
pub struct AnnounceBinding {
    parser: AnnounceParser,
    settings: HashMap<String, String>,
    channels: HashSet<String>,
    announcers: HashSet<String>,
}

impl AnnounceBinding {
    pub fn new(
        def: Arc<IndexerDefinition>,
        settings: HashMap<String, String>,
    ) -> Result<Self, DefinitionError> {
        let channels = def.irc.channels.iter().map(|c| c.to_lowercase()).collect();
        let announcers = def.irc.announcers.iter().map(|a| a.to_lowercase()).collect();
        let parser = AnnounceParser::new(def, settings.clone())?;

        Ok(Self {
            parser,
            settings,
            channels,
            announcers,
        })
    }

    /// Whether this indexer announces on the channel via the nick.
    fn covers(&self, channel: &str, announcer: &str) -> bool {
        self.channels.contains(channel) && self.announcers.contains(announcer)
    }

    fn indexer(&self) -> &str {
        &self.parser.definition().identifier
    }
}

/// Connection status, readable by the health API.
#[derive(Default)]
struct ConnectionState {
    connected: bool,
    connected_since: Option<chrono::DateTime<Utc>>,
    current_nick: String,
}

/// A live IRC session for one (server, account) pair.
pub struct IrcHandler {
    network: RwLock<Arc<Network>>,
    bindings: RwLock<Arc<Vec<AnnounceBinding>>>,
    sink: Arc<dyn ReleaseSink>,
    health: RwLock<HashMap<String, ChannelHealth>>,
    state: RwLock<ConnectionState>,
    cmd_tx: mpsc::UnboundedSender<HandlerCommand>,
    cmd_rx: Mutex<Option<mpsc::UnboundedReceiver<HandlerCommand>>>,
    stopped: AtomicBool,
}

impl IrcHandler {
    pub fn new(
        network: Network,
        bindings: Vec<AnnounceBinding>,
        sink: Arc<dyn ReleaseSink>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        Self {
            network: RwLock::new(Arc::new(network)),
            bindings: RwLock::new(Arc::new(bindings)),
            sink,
            health: RwLock::new(HashMap::new()),
            state: RwLock::new(ConnectionState::default()),
            cmd_tx,
            cmd_rx: Mutex::new(Some(cmd_rx)),
            stopped: AtomicBool::new(false),
        }
    }

    // ------------------------------------------------------------------
    // Operations called by the supervisor
    // ------------------------------------------------------------------

    /// Idempotent stop; the run loop exits promptly.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let _ = self.cmd_tx.send(HandlerCommand::Stop);
    }

    /// Force a disconnect and reconnect with the latest network snapshot.
    pub fn restart(&self) {
        let _ = self.cmd_tx.send(HandlerCommand::Restart);
    }

    /// Swap the network snapshot used by the next (re)connect.
    pub fn set_network(&self, network: Network) {
        *self.network.write() = Arc::new(network);
    }

    /// Current network snapshot.
    pub fn get_network(&self) -> Arc<Network> {
        self.network.read().clone()
    }

    /// Replace the indexer bindings attached to this handler.
    pub fn set_bindings(&self, bindings: Vec<AnnounceBinding>) {
        *self.bindings.write() = Arc::new(bindings);
    }

    /// Change nick on the live session; re-identifies after confirmation.
    pub fn handle_nick_change(&self, nick: String) {
        let _ = self.cmd_tx.send(HandlerCommand::NickChange(nick));
    }

    /// Re-identify with NickServ on the live session.
    pub fn handle_nickserv_identify(&self, account: String, password: String) {
        let _ = self
            .cmd_tx
            .send(HandlerCommand::Identify { account, password });
    }

    /// Join a channel on the live session.
    pub fn handle_join_channel(&self, channel: IrcChannel) {
        let _ = self.cmd_tx.send(HandlerCommand::JoinChannel(channel));
    }

    /// Part a channel on the live session.
    pub fn handle_part_channel(&self, name: String) {
        let _ = self.cmd_tx.send(HandlerCommand::PartChannel(name));
    }

    /// True iff the socket is open and registration completed.
    pub fn connected(&self) -> bool {
        self.state.read().connected
    }

    pub fn connected_since(&self) -> Option<chrono::DateTime<Utc>> {
        self.state.read().connected_since
    }

    /// Snapshot of per-channel health, configuration order not guaranteed.
    pub fn health_snapshot(&self) -> Vec<ChannelHealth> {
        let mut channels: Vec<ChannelHealth> = self.health.read().values().cloned().collect();
        channels.sort_by(|a, b| a.name.cmp(&b.name));
        channels
    }

    // ------------------------------------------------------------------
    // Run loop
    // ------------------------------------------------------------------

    /// Drive the session state machine until [`Self::stop`].
    pub async fn run(&self) {
        let Some(mut rx) = self.cmd_rx.lock().take() else {
            warn!("handler run loop already started");
            return;
        };

        let mut backoff = Backoff::new();

        while !self.stopped.load(Ordering::SeqCst) {
            let network = self.get_network();
            let end = self.run_session(&network, &mut rx, &mut backoff).await;
            self.mark_disconnected();

            match end {
                SessionEnd::Stopped => break,
                SessionEnd::Restart => {
                    info!(server = %network.server, "restarting session");
                    backoff.reset();
                    continue;
                }
                SessionEnd::Failed(e) => {
                    warn!(
                        server = %network.server,
                        error = %e,
                        code = e.error_code(),
                        "session ended"
                    );
                }
            }

            if self.stopped.load(Ordering::SeqCst) {
                break;
            }

            metrics::IRC_RECONNECTS.inc();
            let delay = backoff.next_delay();
            info!(
                server = %network.server,
                delay_secs = delay.as_secs(),
                "reconnecting after backoff"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                cmd = rx.recv() => match cmd {
                    None | Some(HandlerCommand::Stop) => break,
                    Some(HandlerCommand::Restart) => backoff.reset(),
                    // Other operations only make sense on a live session.
                    Some(_) => {}
                }
            }
        }

        self.mark_disconnected();
        debug!("handler run loop exited");
    }

    async fn run_session(
        &self,
        network: &Network,
        rx: &mut mpsc::UnboundedReceiver<HandlerCommand>,
        backoff: &mut Backoff,
    ) -> SessionEnd {
        info!(
            server = %network.server,
            port = network.port,
            tls = network.tls,
            "connecting"
        );

        let connect = tokio::time::timeout(
            CONNECT_TIMEOUT,
            Transport::connect(&network.server, network.port, network.tls),
        )
        .await;
        let mut transport = match connect {
            Err(_) => {
                return SessionEnd::Failed(HandlerError::ConnectTimeout(
                    CONNECT_TIMEOUT.as_secs(),
                ));
            }
            Ok(Err(e)) => return SessionEnd::Failed(e.into()),
            Ok(Ok(t)) => t,
        };

        // Fresh session, fresh health: every configured channel starts unmonitored.
        self.reset_health(network);

        let mut session = Session::new(network);
        self.state.write().current_nick = session.nick.clone();

        if let Err(e) = self.register(&mut transport, network, &session).await {
            return SessionEnd::Failed(e);
        }

        let mut deadline_timer = tokio::time::interval(DEADLINE_CHECK_INTERVAL);
        deadline_timer.tick().await;

        loop {
            let flow = tokio::select! {
                msg = transport.next() => match msg {
                    None => {
                        return SessionEnd::Failed(HandlerError::ServerClosed(
                            "connection closed by server".to_string(),
                        ));
                    }
                    Some(Err(e)) => return SessionEnd::Failed(e.into()),
                    Some(Ok(msg)) => {
                        self.handle_message(&mut transport, &mut session, backoff, msg).await
                    }
                },

                cmd = rx.recv() => {
                    let cmd = cmd.unwrap_or(HandlerCommand::Stop);
                    self.handle_command(&mut transport, &mut session, cmd).await
                }

                _ = deadline_timer.tick() => {
                    self.check_deadlines(&mut transport, &mut session).await
                }
            };

            match flow {
                Ok(Flow::Continue) => {}
                Ok(Flow::End(end)) => return end,
                Err(e) => return SessionEnd::Failed(e),
            }
        }
    }

    async fn register(
        &self,
        transport: &mut Transport,
        network: &Network,
        session: &Session,
    ) -> Result<(), HandlerError> {
        if let Some(pass) = network.pass.as_deref().filter(|p| !p.is_empty()) {
            transport
                .send(Message::new(Command::PASS(pass.to_string())))
                .await?;
        }
        transport
            .send(Message::new(Command::NICK(session.nick.clone())))
            .await?;
        transport
            .send(Message::new(Command::USER(
                session.nick.clone(),
                session.nick.clone(),
            )))
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Incoming messages
    // ------------------------------------------------------------------

    async fn handle_message(
        &self,
        transport: &mut Transport,
        session: &mut Session,
        backoff: &mut Backoff,
        msg: Message,
    ) -> Result<Flow, HandlerError> {
        match msg.command.clone() {
            Command::PING(token) => {
                transport.send(Message::new(Command::PONG(token))).await?;
            }

            Command::ERROR(reason) => {
                return Ok(Flow::End(SessionEnd::Failed(HandlerError::ServerClosed(
                    reason,
                ))));
            }

            Command::Response(response::RPL_WELCOME, _) => {
                self.on_welcome(session, backoff);
            }

            // Some servers reject JOIN until the MOTD burst completes, so
            // identify/invite/join wait for its end.
            Command::Response(response::RPL_ENDOFMOTD | response::ERR_NOMOTD, _) => {
                if session.phase == Phase::Registering {
                    self.on_registration_complete(transport, session).await?;
                }
            }

            Command::Response(response::ERR_NICKNAMEINUSE, _) => {
                if session.phase == Phase::Registering {
                    session.nick.push('_');
                    warn!(nick = %session.nick, "nickname in use, retrying");
                    transport
                        .send(Message::new(Command::NICK(session.nick.clone())))
                        .await?;
                }
            }

            Command::Response(response::ERR_PASSWDMISMATCH, _) => {
                return Ok(Flow::End(SessionEnd::Failed(HandlerError::AuthFailure(
                    "server password mismatch".to_string(),
                ))));
            }

            Command::Response(response::RPL_ENDOFNAMES, params) => {
                // Join confirmation fallback for servers that do not echo JOIN.
                if let Some(channel) = params.get(1) {
                    self.mark_monitoring(channel);
                }
            }

            Command::NOTICE(_, text) => {
                if msg
                    .source_nick()
                    .is_some_and(|n| n.eq_ignore_ascii_case("NickServ"))
                {
                    return self.on_nickserv_notice(transport, session, &text).await;
                }
                trace!(text = %text, "notice");
            }

            Command::INVITE(_, channel) => {
                self.on_invite(transport, &channel).await?;
            }

            Command::JOIN(channel, _) => {
                if msg.source_nick().is_some_and(|n| n == session.nick) {
                    info!(channel = %channel, "joined channel");
                    self.mark_monitoring(&channel);
                }
            }

            Command::PART(channel, _) => {
                if msg.source_nick().is_some_and(|n| n == session.nick) {
                    info!(channel = %channel, "parted channel");
                    self.mark_unmonitored(&channel);
                }
            }

            Command::NICK(new_nick) => {
                if msg.source_nick().is_some_and(|n| n == session.nick) {
                    info!(from = %session.nick, to = %new_nick, "nick changed");
                    session.nick = new_nick.clone();
                    self.state.write().current_nick = new_nick;
                    if session.reidentify_on_nick {
                        session.reidentify_on_nick = false;
                        let network = self.get_network();
                        if let Some(password) = network
                            .nickserv
                            .password
                            .as_deref()
                            .filter(|p| !p.is_empty())
                        {
                            let account = network.nickserv.account.clone();
                            self.send_identify(transport, session, &account, password)
                                .await?;
                        }
                    }
                }
            }

            Command::PRIVMSG(target, text) => {
                if let Some(source) = msg.source_nick() {
                    self.on_privmsg(&target, source, &text);
                }
            }

            other => {
                trace!(command = ?other, "unhandled message");
            }
        }

        Ok(Flow::Continue)
    }

    /// Welcome reply: the connection is registered.
    fn on_welcome(&self, session: &Session, backoff: &mut Backoff) {
        let network = self.get_network();
        info!(server = %network.server, nick = %session.nick, "registered");

        backoff.reset();
        let mut state = self.state.write();
        if !state.connected {
            metrics::IRC_CONNECTED_HANDLERS.inc();
        }
        state.connected = true;
        state.connected_since = Some(Utc::now());
    }

    /// End of the welcome burst: identify, invite, join.
    async fn on_registration_complete(
        &self,
        transport: &mut Transport,
        session: &mut Session,
    ) -> Result<(), HandlerError> {
        let network = self.get_network();

        match network
            .nickserv
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
        {
            Some(password) => {
                let account = network.nickserv.account.clone();
                self.send_identify(transport, session, &account, password)
                    .await?;
            }
            None => {
                self.proceed_to_channels(transport, session).await?;
            }
        }
        Ok(())
    }

    async fn on_nickserv_notice(
        &self,
        transport: &mut Transport,
        session: &mut Session,
        text: &str,
    ) -> Result<Flow, HandlerError> {
        if session.phase != Phase::Identifying {
            return Ok(Flow::Continue);
        }

        if is_identify_success(text) {
            info!("nickserv identify confirmed");
            session.identify_deadline = None;
            session.identify_attempts = 0;
            self.proceed_to_channels(transport, session).await?;
            return Ok(Flow::Continue);
        }

        if is_identify_failure(text) {
            error!(notice = %text, "nickserv identify rejected");
            if session.identify_attempts >= MAX_IDENTIFY_ATTEMPTS {
                return Ok(Flow::End(SessionEnd::Failed(HandlerError::AuthFailure(
                    text.to_string(),
                ))));
            }
            let network = self.get_network();
            if let Some(password) = network
                .nickserv
                .password
                .as_deref()
                .filter(|p| !p.is_empty())
            {
                let account = network.nickserv.account.clone();
                self.send_identify(transport, session, &account, password)
                    .await?;
            }
        }

        Ok(Flow::Continue)
    }

    async fn on_invite(
        &self,
        transport: &mut Transport,
        channel: &str,
    ) -> Result<(), HandlerError> {
        let network = self.get_network();
        let Some(configured) = network
            .enabled_channels()
            .find(|c| c.name.eq_ignore_ascii_case(channel))
        else {
            debug!(channel = %channel, "ignoring invite to unconfigured channel");
            return Ok(());
        };

        info!(channel = %channel, "invited, joining");
        let key = configured.password.clone().filter(|p| !p.is_empty());
        transport
            .send(Message::new(Command::JOIN(configured.name.clone(), key)))
            .await?;
        Ok(())
    }

    /// Handle a channel line: announcers feed the parser, everyone else is dropped.
    fn on_privmsg(&self, target: &str, source: &str, text: &str) {
        if !target.starts_with('#') {
            return;
        }
        let channel = target.to_lowercase();

        let monitored = self
            .health
            .read()
            .get(&channel)
            .map(|h| h.monitoring)
            .unwrap_or(false);
        if !monitored {
            return;
        }

        // Detached channels are joined but muted.
        let network = self.get_network();
        if network
            .channels
            .iter()
            .any(|c| c.detached && c.name.to_lowercase() == channel)
        {
            return;
        }

        let source = source.to_lowercase();
        let bindings = self.bindings.read().clone();
        for binding in bindings.iter() {
            if !binding.covers(&channel, &source) {
                continue;
            }
            self.touch_last_announce(&channel);

            match binding.parser.parse(text) {
                ParseOutcome::Parsed(release) => {
                    info!(
                        indexer = %release.indexer,
                        release = %release.name,
                        "announce parsed"
                    );
                    metrics::ANNOUNCES_PARSED.inc();
                    self.sink.deliver(release);
                    break;
                }
                ParseOutcome::Buffered => {
                    debug!(indexer = binding.indexer(), "announce line buffered");
                    break;
                }
                ParseOutcome::NotApplicable => continue,
                ParseOutcome::Invalid(reason) => {
                    warn!(
                        indexer = binding.indexer(),
                        reason = %reason,
                        line = %text,
                        "invalid announce"
                    );
                    metrics::ANNOUNCES_INVALID.inc();
                    break;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Commands from the supervisor
    // ------------------------------------------------------------------

    async fn handle_command(
        &self,
        transport: &mut Transport,
        session: &mut Session,
        cmd: HandlerCommand,
    ) -> Result<Flow, HandlerError> {
        match cmd {
            HandlerCommand::Stop => {
                let _ = transport
                    .send(Message::new(Command::QUIT(Some("shutting down".to_string()))))
                    .await;
                Ok(Flow::End(SessionEnd::Stopped))
            }
            HandlerCommand::Restart => {
                let _ = transport
                    .send(Message::new(Command::QUIT(Some("restarting".to_string()))))
                    .await;
                Ok(Flow::End(SessionEnd::Restart))
            }
            HandlerCommand::NickChange(nick) => {
                info!(nick = %nick, "changing nick");
                session.reidentify_on_nick = true;
                transport.send(Message::new(Command::NICK(nick))).await?;
                Ok(Flow::Continue)
            }
            HandlerCommand::Identify { account, password } => {
                self.send_identify(transport, session, &account, &password)
                    .await?;
                Ok(Flow::Continue)
            }
            HandlerCommand::JoinChannel(channel) => {
                info!(channel = %channel.name, "joining channel");
                self.health
                    .write()
                    .entry(channel.name.to_lowercase())
                    .or_insert_with(|| ChannelHealth::idle(&channel.name));
                let key = channel.password.clone().filter(|p| !p.is_empty());
                transport
                    .send(Message::new(Command::JOIN(channel.name, key)))
                    .await?;
                Ok(Flow::Continue)
            }
            HandlerCommand::PartChannel(name) => {
                info!(channel = %name, "parting channel");
                transport
                    .send(Message::new(Command::PART(name.clone(), None)))
                    .await?;
                self.health.write().remove(&name.to_lowercase());
                Ok(Flow::Continue)
            }
        }
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    async fn check_deadlines(
        &self,
        transport: &mut Transport,
        session: &mut Session,
    ) -> Result<Flow, HandlerError> {
        let now = Instant::now();

        if session.phase == Phase::Registering && now >= session.register_deadline {
            return Ok(Flow::End(SessionEnd::Failed(
                HandlerError::RegistrationTimeout,
            )));
        }

        if session.phase == Phase::Identifying
            && session.identify_deadline.is_some_and(|d| now >= d)
        {
            if session.identify_attempts >= MAX_IDENTIFY_ATTEMPTS {
                return Ok(Flow::End(SessionEnd::Failed(HandlerError::AuthFailure(
                    "no confirmation from NickServ".to_string(),
                ))));
            }
            warn!(
                attempt = session.identify_attempts,
                "nickserv identify timed out, retrying"
            );
            let network = self.get_network();
            if let Some(password) = network
                .nickserv
                .password
                .as_deref()
                .filter(|p| !p.is_empty())
            {
                let account = network.nickserv.account.clone();
                self.send_identify(transport, session, &account, password)
                    .await?;
            }
        }

        Ok(Flow::Continue)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn send_identify(
        &self,
        transport: &mut Transport,
        session: &mut Session,
        account: &str,
        password: &str,
    ) -> Result<(), HandlerError> {
        debug!(account = %account, "identifying with nickserv");
        transport
            .send(Message::new(Command::PRIVMSG(
                "NickServ".to_string(),
                format!("IDENTIFY {} {}", account, password),
            )))
            .await?;
        session.phase = Phase::Identifying;
        session.identify_attempts += 1;
        session.identify_deadline = Some(Instant::now() + IDENTIFY_TIMEOUT);
        Ok(())
    }

    /// Send the invite command (when configured) and join all channels.
    async fn proceed_to_channels(
        &self,
        transport: &mut Transport,
        session: &mut Session,
    ) -> Result<(), HandlerError> {
        let network = self.get_network();

        self.send_invite_command(transport, &network, &session.nick)
            .await?;

        for channel in network.enabled_channels() {
            let key = channel.password.clone().filter(|p| !p.is_empty());
            transport
                .send(Message::new(Command::JOIN(channel.name.clone(), key)))
                .await?;
        }

        session.phase = Phase::Active;
        Ok(())
    }

    /// Render and send the invite command, skipping when empty.
    ///
    /// The rendered line's first word is the target nick, the rest is the
    /// message body.
    async fn send_invite_command(
        &self,
        transport: &mut Transport,
        network: &Network,
        nick: &str,
    ) -> Result<(), HandlerError> {
        let Some(template) = network
            .invite_command
            .as_deref()
            .filter(|t| !t.trim().is_empty())
        else {
            return Ok(());
        };

        let mut vars: HashMap<String, String> = HashMap::new();
        for binding in self.bindings.read().iter() {
            vars.extend(
                binding
                    .settings
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
        }
        vars.insert("nick".to_string(), nick.to_string());

        let rendered = crate::announce::render(template, &vars);
        let rendered = rendered.trim();
        let Some((target, body)) = rendered.split_once(' ') else {
            warn!(rendered = %rendered, "invite command rendered without a body, skipping");
            return Ok(());
        };

        info!(target = %target, "sending invite command");
        transport
            .send(Message::new(Command::PRIVMSG(
                target.to_string(),
                body.to_string(),
            )))
            .await?;
        Ok(())
    }

    fn reset_health(&self, network: &Network) {
        let mut health = self.health.write();
        health.clear();
        for channel in network.enabled_channels() {
            health.insert(
                channel.name.to_lowercase(),
                ChannelHealth::idle(&channel.name),
            );
        }
    }

    fn mark_monitoring(&self, channel: &str) {
        let mut health = self.health.write();
        let entry = health
            .entry(channel.to_lowercase())
            .or_insert_with(|| ChannelHealth::idle(channel));
        if !entry.monitoring {
            entry.monitoring = true;
            entry.monitoring_since = Some(Utc::now());
        }
    }

    fn mark_unmonitored(&self, channel: &str) {
        if let Some(entry) = self.health.write().get_mut(&channel.to_lowercase()) {
            entry.monitoring = false;
            entry.monitoring_since = None;
        }
    }

    fn touch_last_announce(&self, channel: &str) {
        if let Some(entry) = self.health.write().get_mut(channel) {
            entry.last_announce = Some(Utc::now());
        }
    }

    fn mark_disconnected(&self) {
        let mut state = self.state.write();
        if state.connected {
            metrics::IRC_CONNECTED_HANDLERS.dec();
        }
        state.connected = false;
        state.connected_since = None;
    }
}

fn is_identify_success(text: &str) -> bool {
    let text = text.to_ascii_lowercase();
    text.contains("you are now identified")
        || text.contains("password accepted")
        || text.contains("you are successfully identified")
}

fn is_identify_failure(text: &str) -> bool {
    let text = text.to_ascii_lowercase();
    text.contains("invalid password")
        || text.contains("incorrect password")
        || text.contains("access denied")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_notice_classification() {
        assert!(is_identify_success(
            "You are now identified for account bot."
        ));
        assert!(is_identify_success("Password accepted - you are now recognized."));
        assert!(!is_identify_success("This nickname is registered."));

        assert!(is_identify_failure("Invalid password for bot."));
        assert!(!is_identify_failure("You are now identified for bot."));
    }
}
