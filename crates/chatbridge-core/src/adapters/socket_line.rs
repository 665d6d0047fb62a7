//! Socket-line adapter - Twitch chat and generic IRC.
//!
//! Opens a persistent TCP connection on a dedicated blocking thread,
//! performs a login handshake, then loops reading lines: answers server
//! keep-alive pings and extracts `(user, text)` pairs via a protocol
//! line pattern. Reading a socket is blocking and cannot share the
//! cooperative scheduler, so this adapter runs on its own OS thread with
//! an explicit read timeout as the cancellation suspension point.
//!
//! On any connection error the adapter logs and terminates; restart is
//! an explicit operator action, there is no automatic reconnect.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use regex::Regex;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{AdapterHandle, SourceAdapter};
use crate::ingest::IngestSink;
use crate::types::Source;

const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration of one socket-line ingress.
#[derive(Debug, Clone)]
pub struct SocketLineConfig {
    pub source: Source,
    pub host: String,
    pub port: u16,
    /// Lines written (CRLF-terminated) right after connecting
    pub handshake: Vec<String>,
    /// Pattern with two captures: user and message text
    pub line_pattern: String,
    /// Reply sent verbatim when the server pings
    pub pong_reply: String,
    /// False when a required credential was empty
    configured: bool,
}

impl SocketLineConfig {
    /// Twitch chat ingress (IRC-shaped, token handshake).
    pub fn twitch(username: &str, oauth_token: &str) -> Self {
        Self {
            source: Source::Twitch,
            host: "irc.chat.twitch.tv".to_string(),
            port: 6667,
            handshake: vec![
                format!("PASS {}", oauth_token),
                format!("NICK {}", username),
                format!("JOIN #{}", username),
            ],
            line_pattern: r":(\w+)!.* PRIVMSG #[^ ]+ :(.+)".to_string(),
            pong_reply: "PONG :tmi.twitch.tv".to_string(),
            configured: !username.is_empty() && !oauth_token.is_empty(),
        }
    }

    /// Generic IRC ingress.
    pub fn irc(server: &str, port: u16, channel: &str) -> Self {
        Self {
            source: Source::Irc,
            host: server.to_string(),
            port,
            handshake: vec![
                "NICK bridgebot".to_string(),
                "USER bridgebot 0 * :bridgebot".to_string(),
                format!("JOIN {}", channel),
            ],
            line_pattern: r":(\S+?)!\S* PRIVMSG \S+ :(.+)".to_string(),
            pong_reply: "PONG".to_string(),
            configured: !server.is_empty() && !channel.is_empty(),
        }
    }
}

/// Blocking line-protocol reader for Twitch/IRC-shaped chat.
pub struct SocketLineAdapter {
    config: SocketLineConfig,
}

impl SocketLineAdapter {
    pub fn new(config: SocketLineConfig) -> Self {
        Self { config }
    }

    /// Extract `(user, text)` from a protocol line, if it is a message.
    fn parse_line<'a>(pattern: &Regex, line: &'a str) -> Option<(&'a str, &'a str)> {
        let captures = pattern.captures(line)?;
        let user = captures.get(1)?.as_str();
        let text = captures.get(2)?.as_str();
        Some((user, text.trim_end()))
    }

    fn read_loop(
        config: &SocketLineConfig,
        sink: &IngestSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let pattern = Regex::new(&config.line_pattern).context("Invalid line pattern")?;

        let stream = TcpStream::connect((config.host.as_str(), config.port))
            .with_context(|| format!("Failed to connect to {}:{}", config.host, config.port))?;
        // The read timeout bounds how long cancellation can go unobserved
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .context("Failed to set read timeout")?;

        let mut writer = stream.try_clone().context("Failed to clone socket")?;
        for line in &config.handshake {
            writer
                .write_all(format!("{}\r\n", line).as_bytes())
                .context("Handshake write failed")?;
        }

        info!("{} adapter connected to {}:{}", config.source, config.host, config.port);

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        while !cancel.is_cancelled() {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => bail!("Connection closed by server"),
                Ok(_) => {
                    let line = line.trim_end();
                    if line.starts_with("PING") {
                        writer
                            .write_all(format!("{}\r\n", config.pong_reply).as_bytes())
                            .context("Pong write failed")?;
                        continue;
                    }
                    if let Some((user, text)) = Self::parse_line(&pattern, line) {
                        sink.submit(config.source, &config.source.tagged_user(user), text);
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    // Read timeout: loop around to observe cancellation
                    continue;
                }
                Err(e) => return Err(e).context("Socket read failed"),
            }
        }

        debug!("{} adapter cancelled", config.source);
        Ok(())
    }
}

#[async_trait]
impl SourceAdapter for SocketLineAdapter {
    fn source(&self) -> Source {
        self.config.source
    }

    fn is_configured(&self) -> bool {
        self.config.configured
    }

    async fn start(&self, sink: IngestSink, cancel: CancellationToken) -> Result<AdapterHandle> {
        let config = self.config.clone();
        let handle = std::thread::Builder::new()
            .name(format!("{}-reader", config.source.tag().to_lowercase()))
            .spawn(move || {
                if let Err(e) = Self::read_loop(&config, &sink, &cancel) {
                    error!("{} adapter terminated: {:#}", config.source, e);
                }
            })
            .context("Failed to spawn reader thread")?;
        Ok(AdapterHandle::Thread(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twitch_line_parsing() {
        let config = SocketLineConfig::twitch("streamer", "oauth:token");
        let pattern = Regex::new(&config.line_pattern).unwrap();

        let line = ":alice!alice@alice.tmi.twitch.tv PRIVMSG #streamer :hello world";
        let (user, text) = SocketLineAdapter::parse_line(&pattern, line).unwrap();
        assert_eq!(user, "alice");
        assert_eq!(text, "hello world");
    }

    #[test]
    fn test_irc_line_parsing() {
        let config = SocketLineConfig::irc("irc.libera.chat", 6667, "#rust");
        let pattern = Regex::new(&config.line_pattern).unwrap();

        let line = ":bob!~bob@host.example PRIVMSG #rust :how do I borrow?";
        let (user, text) = SocketLineAdapter::parse_line(&pattern, line).unwrap();
        assert_eq!(user, "bob");
        assert_eq!(text, "how do I borrow?");
    }

    #[test]
    fn test_non_message_lines_ignored() {
        let config = SocketLineConfig::twitch("streamer", "oauth:token");
        let pattern = Regex::new(&config.line_pattern).unwrap();

        assert!(SocketLineAdapter::parse_line(&pattern, "PING :tmi.twitch.tv").is_none());
        assert!(
            SocketLineAdapter::parse_line(&pattern, ":tmi.twitch.tv 001 streamer :Welcome")
                .is_none()
        );
    }

    #[test]
    fn test_twitch_handshake_order() {
        let config = SocketLineConfig::twitch("streamer", "oauth:token");
        assert_eq!(config.handshake[0], "PASS oauth:token");
        assert_eq!(config.handshake[1], "NICK streamer");
        assert_eq!(config.handshake[2], "JOIN #streamer");
    }

    #[test]
    fn test_empty_credentials_disable_adapter() {
        assert!(!SocketLineAdapter::new(SocketLineConfig::twitch("", "")).is_configured());
        assert!(
            !SocketLineAdapter::new(SocketLineConfig::irc("irc.libera.chat", 6667, ""))
                .is_configured()
        );
        assert!(
            SocketLineAdapter::new(SocketLineConfig::twitch("streamer", "oauth:tok"))
                .is_configured()
        );
    }

    #[tokio::test]
    async fn test_connection_error_terminates_thread_without_raising() {
        // Nothing listens on this port; the adapter must log and exit,
        // and joining it must not propagate the failure.
        let config = SocketLineConfig {
            source: Source::Irc,
            host: "127.0.0.1".to_string(),
            port: 1, // connection refused
            handshake: vec![],
            line_pattern: r":(\S+?)!\S* PRIVMSG \S+ :(.+)".to_string(),
            pong_reply: "PONG".to_string(),
            configured: true,
        };
        let adapter = SocketLineAdapter::new(config);
        let (sink, _rx) =
            IngestSink::new(std::sync::Arc::new(crate::filter::Blacklist::empty()), 10);
        let cancel = CancellationToken::new();

        let handle = adapter.start(sink, cancel).await.unwrap();
        handle.join(Source::Irc).await;
    }
}
