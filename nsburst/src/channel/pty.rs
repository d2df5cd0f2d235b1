//! Session protocol engine: discrete command/response exchanges over the
//! unframed shell stream.
//!
//! Every exchange writes one command line and then consumes output line by
//! line as it arrives, counting prompt lines, until its own completion
//! condition holds. Each exchange carries a deadline; missing it fails with
//! [`ChannelError::ProtocolTimeout`] instead of blocking forever.

use std::time::{Duration, Instant};

use bytes::Bytes;
use log::{debug, trace};

use super::framer::LineFramer;
use super::patterns::{LineKind, classify};
use crate::driver::Response;
use crate::error::{ChannelError, Error, Result};
use crate::transport::ByteChannel;

/// Configuration for PTY channel behavior.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Deadline for a single exchange (command sent to completion).
    pub timeout: Duration,

    /// Maximum bytes requested from the channel per read.
    pub read_chunk_size: usize,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            read_chunk_size: 1024,
        }
    }
}

/// How a teardown exchange finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// The device asked to save the modified configuration; the answer sent
    /// was `y` (`true`) or `n` (`false`).
    Answered(bool),
    /// A shell prompt came back.
    Prompt,
    /// The device closed the channel.
    Closed,
}

enum Scan {
    Continue,
    Done,
}

/// Interactive shell channel with prompt-aware command exchanges.
pub struct PtyChannel<C> {
    channel: C,
    config: PtyConfig,
    framer: LineFramer,
    /// Prompt seen at login; an unterminated tail only ends an exchange if it
    /// is exactly this prompt.
    prompt: Option<String>,
}

impl<C: ByteChannel> PtyChannel<C> {
    /// Wrap a connected channel.
    pub fn new(channel: C, config: PtyConfig) -> Self {
        Self {
            channel,
            config,
            framer: LineFramer::new(),
            prompt: None,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &PtyConfig {
        &self.config
    }

    /// Set the per-exchange deadline.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.config.timeout = timeout;
    }

    /// Wait for a prompt without sending anything, e.g. after login.
    ///
    /// Returns the prompt line and remembers it as the session prompt.
    pub async fn read_until_prompt(&mut self) -> Result<String> {
        let deadline = self.deadline();
        let mut prompt = String::new();
        self.scan(deadline, |line, kind| match kind {
            LineKind::Prompt => {
                prompt = line.to_string();
                Scan::Done
            }
            _ => Scan::Continue,
        })
        .await?;
        debug!("session prompt: {:?}", prompt);
        self.prompt = Some(prompt.trim_end().to_string());
        Ok(prompt)
    }

    /// The prompt learned by [`read_until_prompt`](Self::read_until_prompt).
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Send a housekeeping command and wait for `prompts` prompt lines.
    ///
    /// All output is discarded.
    pub async fn run_silent(&mut self, command: &str, prompts: usize) -> Result<()> {
        let deadline = self.send_line(command).await?;
        if prompts == 0 {
            return Ok(());
        }

        let mut seen = 0;
        self.scan(deadline, |line, kind| {
            if kind == LineKind::Prompt {
                seen += 1;
                debug!("prompt {}/{} for {:?}: {:?}", seen, prompts, command, line);
                if seen == prompts {
                    return Scan::Done;
                }
            }
            Scan::Continue
        })
        .await
    }

    /// Send a command and capture its output.
    ///
    /// The first line is the local echo of the command and is dropped. Every
    /// following line up to the first prompt goes into the result, each
    /// terminated by `\n`; the prompt itself is not included.
    pub async fn run(&mut self, command: &str) -> Result<Response> {
        let start = Instant::now();
        let deadline = self.send_line(command).await?;

        let mut result = String::new();
        let mut prompt = String::new();
        let mut first = true;
        self.scan(deadline, |line, kind| {
            if kind == LineKind::Prompt {
                prompt = line.to_string();
                return Scan::Done;
            }
            if first {
                first = false;
                trace!("echo: {:?}", line);
            } else {
                result.push_str(line);
                result.push('\n');
            }
            Scan::Continue
        })
        .await?;

        Ok(Response::new(command, result, prompt, start.elapsed()))
    }

    /// Send a session-ending command such as `exit`.
    ///
    /// If the device asks whether to save the modified configuration, answer
    /// `y` when `save` is set and `n` otherwise; that answer completes the
    /// exchange. The channel closing also completes it.
    pub async fn run_teardown(&mut self, command: &str, save: bool) -> Result<Teardown> {
        let deadline = match self.send_line(command).await {
            Ok(deadline) => deadline,
            Err(Error::Channel(ChannelError::Closed)) => return Ok(Teardown::Closed),
            Err(e) => return Err(e),
        };

        let mut outcome = Teardown::Prompt;
        let scanned = self
            .scan(deadline, |_, kind| match kind {
                LineKind::Confirm => {
                    outcome = Teardown::Answered(save);
                    Scan::Done
                }
                LineKind::Prompt => Scan::Done,
                LineKind::Output => Scan::Continue,
            })
            .await;

        match scanned {
            Ok(()) => {}
            Err(Error::Channel(ChannelError::Closed)) => return Ok(Teardown::Closed),
            Err(e) => return Err(e),
        }

        if let Teardown::Answered(save) = outcome {
            let answer: &[u8] = if save { b"y" } else { b"n" };
            debug!("answering save prompt with {:?}", answer);
            match self.channel.send(answer).await {
                Ok(()) | Err(Error::Channel(ChannelError::Closed)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(outcome)
    }

    /// Close the underlying channel.
    pub async fn close(&mut self) -> Result<()> {
        self.framer.clear();
        self.channel.close().await
    }

    fn deadline(&self) -> tokio::time::Instant {
        tokio::time::Instant::now() + self.config.timeout
    }

    async fn send_line(&mut self, command: &str) -> Result<tokio::time::Instant> {
        if !self.framer.is_empty() {
            trace!("discarding unread output before {:?}: {:?}", command, self.framer);
            self.framer.clear();
        }
        debug!("send: {:?}", command);
        let mut line = Vec::with_capacity(command.len() + 1);
        line.extend_from_slice(command.as_bytes());
        line.push(b'\n');
        self.channel.send(&line).await?;
        Ok(self.deadline())
    }

    /// Feed lines to `visit` until it reports completion.
    ///
    /// Complete lines are visited in order. The unterminated tail is visited
    /// (and consumed) only when it is a prompt, since prompts never end in a
    /// newline. Once the session prompt is known, a tail that merely ends in
    /// `->` is output cut short by a read boundary and waits for more data.
    async fn scan<F>(&mut self, deadline: tokio::time::Instant, mut visit: F) -> Result<()>
    where
        F: FnMut(&str, LineKind) -> Scan,
    {
        loop {
            while let Some(line) = self.framer.next_line() {
                if let Scan::Done = visit(&line, classify(&line)) {
                    return Ok(());
                }
            }

            let kind = self.tail_kind();
            if kind != LineKind::Output {
                let line = self.framer.take_partial();
                if let Scan::Done = visit(&line, kind) {
                    return Ok(());
                }
            }

            let chunk = self.read_chunk(deadline).await?;
            self.framer.push(&chunk);
        }
    }

    fn tail_kind(&self) -> LineKind {
        let tail = self.framer.partial();
        match (classify(tail), self.prompt.as_deref()) {
            (LineKind::Prompt, Some(prompt)) if tail.trim_end() != prompt => LineKind::Output,
            (kind, _) => kind,
        }
    }

    async fn read_chunk(&mut self, deadline: tokio::time::Instant) -> Result<Bytes> {
        let timeout = self.config.timeout;
        let chunk = tokio::time::timeout_at(deadline, self.channel.recv(self.config.read_chunk_size))
            .await
            .map_err(|_| ChannelError::ProtocolTimeout(timeout))??;

        match chunk {
            Some(chunk) => {
                trace!("recv: {} bytes", chunk.len());
                Ok(chunk)
            }
            None => Err(ChannelError::Closed.into()),
        }
    }
}
