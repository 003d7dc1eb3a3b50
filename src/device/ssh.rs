//! SSH-backed device sessions.
//!
//! Opens an interactive shell with a pty, waits for the device prompt, and
//! executes show commands with the device's structured (`| json`) formatter
//! so output arrives machine-readable. Algorithm preferences lean legacy:
//! switch management planes often run old SSH stacks.

use std::borrow::Cow;
use std::time::Duration;

use async_ssh2_tokio::client::{AuthMethod, Client};
use async_ssh2_tokio::{Config, ServerCheckMethod};
use log::{debug, info, trace};
use once_cell::sync::Lazy;
use regex::Regex;
use russh::keys::{Algorithm, EcdsaCurve, HashAlg};
use russh::{ChannelMsg, Preferred, cipher, compression, kex, mac};
use serde_json::Value;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::time;

use super::{ConnectionState, Device};
use crate::error::{CommandError, ConnectError, DisconnectError};
use crate::testbed::DeviceSpec;

/// Key exchange preference, modern first with legacy Diffie-Hellman
/// fallbacks for older firmware.
const KEX_ORDER: &[kex::Name] = &[
    kex::CURVE25519,
    kex::DH_G14_SHA256,
    kex::DH_GEX_SHA256,
    kex::DH_G14_SHA1,
    kex::DH_GEX_SHA1,
    kex::DH_G1_SHA1,
];

const KEY_TYPES: &[Algorithm] = &[
    Algorithm::Ed25519,
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP256,
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha256),
    },
    Algorithm::Rsa { hash: None },
    Algorithm::Dsa,
];

const CIPHERS: &[cipher::Name] = &[
    cipher::AES_128_CTR,
    cipher::AES_192_CTR,
    cipher::AES_256_CTR,
    cipher::AES_256_GCM,
    cipher::AES_128_CBC,
    cipher::AES_256_CBC,
];

const MACS: &[mac::Name] = &[mac::HMAC_SHA256, mac::HMAC_SHA512, mac::HMAC_SHA1];

const COMPRESSION: &[compression::Name] = &[compression::NONE, compression::ZLIB];

fn preferred() -> Preferred {
    Preferred {
        kex: Cow::Borrowed(KEX_ORDER),
        key: Cow::Borrowed(KEY_TYPES),
        cipher: Cow::Borrowed(CIPHERS),
        mac: Cow::Borrowed(MACS),
        compression: Cow::Borrowed(COMPRESSION),
    }
}

/// Matches a bare device prompt, e.g. `leaf1#`, `switch>` or
/// `leaf1(config)#`, with the control-character noise terminals prepend.
static PROMPT: Lazy<Regex> =
    Lazy::new(|| match Regex::new(r"^\x00*\r?[\w.\-/:()]+[>#]\s*$") {
        Ok(re) => re,
        Err(err) => panic!("invalid PROMPT regex: {err}"),
    });

/// Matches carriage returns and backspaces at the start of a line, which
/// interfere with line handling when left in place.
static CONTROL_PREFIX: Lazy<Regex> =
    Lazy::new(
        || match Regex::new(r"^(\r+(\s+\r+)*)|(\u{8}+(\s+\u{8}+)*)") {
            Ok(re) => re,
            Err(err) => panic!("invalid CONTROL_PREFIX regex: {err}"),
        },
    );

/// Sent once after connecting so long tables arrive without pagination.
const NO_PAGING_COMMAND: &str = "terminal length 0";

/// Rewrites a show command to request the device's JSON formatter.
fn structured(command: &str) -> String {
    if command.contains("| json") {
        command.to_string()
    } else {
        format!("{command} | json")
    }
}

/// Removes the echoed command from the start of captured output.
fn strip_echo(command: &str, all: &str) -> String {
    let mut content = all;
    if !command.is_empty() && content.starts_with(command) {
        content = content
            .strip_prefix(command)
            .unwrap_or(content)
            .trim_start_matches(['\n', '\r']);
    }
    content.to_string()
}

struct Shell {
    client: Client,
    to_shell: Sender<String>,
    from_shell: Receiver<String>,
    prompt: String,
}

impl Shell {
    async fn open(name: &str, spec: &DeviceSpec) -> Result<Self, ConnectError> {
        let config = Config {
            preferred: preferred(),
            inactivity_timeout: Some(Duration::from_secs(60)),
            ..Default::default()
        };

        let client = Client::connect_with_config(
            (spec.host.clone(), spec.port),
            &spec.username,
            AuthMethod::with_password(&spec.password),
            ServerCheckMethod::NoCheck,
            config,
        )
        .await?;
        debug!("{name}: TCP connection successful");

        let mut channel = client.get_channel().await?;
        channel
            .request_pty(false, "xterm", 800, 600, 0, 0, &[])
            .await?;
        channel.request_shell(false).await?;
        debug!("{name}: shell request successful");

        let (to_shell, mut from_user) = mpsc::channel::<String>(256);
        let (to_user, mut from_shell) = mpsc::channel::<String>(256);

        let io_name = name.to_string();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(data) = from_user.recv() => {
                        if let Err(e) = channel.data(data.as_bytes()).await {
                            debug!("{io_name}: failed to send data to shell: {e:?}");
                            break;
                        }
                    },
                    Some(msg) = channel.wait() => {
                        match msg {
                            ChannelMsg::Data { ref data } => {
                                if let Ok(s) = std::str::from_utf8(data)
                                    && to_user.send(s.to_string()).await.is_err() {
                                        debug!("{io_name}: shell output receiver dropped");
                                        break;
                                    }
                            }
                            ChannelMsg::ExitStatus { exit_status } => {
                                debug!("{io_name}: shell exited with status {exit_status}");
                                let _ = channel.eof().await;
                                break;
                            }
                            ChannelMsg::Eof => {
                                debug!("{io_name}: shell sent EOF");
                                break;
                            }
                            _ => {}
                        }
                    }
                }
            }
            debug!("{io_name}: ssh i/o task ended");
        });

        // Login banners scroll past as complete lines; the prompt is the
        // first incomplete line left in the buffer.
        let mut buffer = String::new();
        let prompt = loop {
            match from_shell.recv().await {
                Some(data) => {
                    trace!("{data:?}");
                    buffer.push_str(&data);
                    while let Some(pos) = buffer.find('\n') {
                        buffer.drain(..=pos);
                    }
                    if !buffer.is_empty() && PROMPT.is_match(&buffer) {
                        break buffer.clone();
                    }
                }
                None => return Err(ConnectError::ChannelClosed),
            }
        };
        debug!("{name}: initial prompt detected: {prompt:?}");

        Ok(Self {
            client,
            to_shell,
            from_shell,
            prompt,
        })
    }

    /// Sends a command and accumulates output until the prompt returns.
    async fn execute(&mut self, command: &str, deadline: Duration) -> Result<String, CommandError> {
        // Drop residual data from previous commands.
        while self.from_shell.try_recv().is_ok() {}

        self.to_shell.send(format!("{command}\n")).await?;

        let mut output = String::new();
        let from_shell = &mut self.from_shell;
        let prompt = &mut self.prompt;

        let result = time::timeout(deadline, async {
            let mut line_buffer = String::new();
            loop {
                match from_shell.recv().await {
                    Some(data) => {
                        line_buffer.push_str(&data);

                        while let Some(pos) = line_buffer.find('\n') {
                            let line: String = line_buffer.drain(..=pos).collect();
                            let cleaned = CONTROL_PREFIX.replace(&line, "");
                            output.push_str(&cleaned);
                        }

                        // An incomplete trailing line that looks like a
                        // prompt means the command is done.
                        if !line_buffer.is_empty() && PROMPT.is_match(&line_buffer) {
                            *prompt = line_buffer;
                            return Ok(());
                        }
                    }
                    None => return Err(CommandError::ChannelClosed),
                }
            }
        })
        .await;

        match result {
            Ok(Ok(())) => Ok(strip_echo(command, &output)),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(CommandError::Timeout(output)),
        }
    }
}

/// A managed switch reachable over SSH.
pub struct SshDevice {
    name: String,
    spec: DeviceSpec,
    connect_timeout: Duration,
    command_timeout: Duration,
    state: ConnectionState,
    shell: Option<Shell>,
}

impl SshDevice {
    pub fn new(
        name: impl Into<String>,
        spec: DeviceSpec,
        connect_timeout: Duration,
        command_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            spec,
            connect_timeout,
            command_timeout,
            state: ConnectionState::Disconnected,
            shell: None,
        }
    }
}

#[async_trait::async_trait]
impl Device for SshDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    async fn connect(&mut self) -> Result<(), ConnectError> {
        if self.is_connected() {
            debug!("{}: already connected", self.name);
            return Ok(());
        }

        self.state = ConnectionState::Connecting;
        match time::timeout(self.connect_timeout, Shell::open(&self.name, &self.spec)).await {
            Ok(Ok(mut shell)) => {
                // Best effort; not every platform has the command.
                if let Err(err) = shell.execute(NO_PAGING_COMMAND, self.command_timeout).await {
                    debug!("{}: could not disable paging: {err}", self.name);
                }
                self.shell = Some(shell);
                self.state = ConnectionState::Connected;
                info!("{}: session established", self.name);
                Ok(())
            }
            Ok(Err(err)) => {
                self.state = ConnectionState::Failed;
                Err(err)
            }
            Err(_) => {
                self.state = ConnectionState::Failed;
                Err(ConnectError::Timeout(self.connect_timeout))
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), DisconnectError> {
        if self.state != ConnectionState::Connected {
            debug!("{}: already disconnected", self.name);
            self.shell = None;
            return Ok(());
        }

        // The handle is disconnected from the caller's point of view no
        // matter how the teardown below goes.
        self.state = ConnectionState::Disconnected;

        if let Some(mut shell) = self.shell.take() {
            shell.from_shell.close();
            shell.to_shell.send("exit\n".to_string()).await?;
            // Give the exit a moment to reach the device before the
            // client drops and the transport closes.
            time::sleep(Duration::from_millis(100)).await;
        }
        debug!("{}: session closed", self.name);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
            && self
                .shell
                .as_ref()
                .map(|shell| !shell.client.is_closed())
                .unwrap_or(false)
    }

    async fn parse_command(&mut self, command: &str) -> Result<Value, CommandError> {
        if !self.is_connected() {
            return Err(CommandError::NotConnected);
        }
        let deadline = self.command_timeout;
        let shell = self.shell.as_mut().ok_or(CommandError::NotConnected)?;

        let full_command = structured(command);
        debug!("{}: executing '{full_command}'", self.name);
        let raw = shell.execute(&full_command, deadline).await?;
        trace!("{}: raw structured output: {raw:?}", self.name);

        Ok(serde_json::from_str(raw.trim())?)
    }
}
