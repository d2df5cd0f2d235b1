//! Scripted in-memory shell for testing.
//!
//! Emulates enough of a ScreenOS CLI to drive the protocol engine without a
//! device: a login banner followed by the prompt, local echo of every
//! command, canned output, the trailing prompt, and `exit` handling.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use super::ByteChannel;
use crate::error::{ChannelError, Result};

struct MockChannelInner {
    prompt: String,
    chunk_size: usize,
    /// Output waiting to be read.
    outbox: VecDeque<Bytes>,
    /// Canned output per command; the last entry is sticky.
    replies: HashMap<String, VecDeque<String>>,
    /// Commands that never get an answer.
    hang: HashSet<String>,
    /// Command lines received, without the trailing newline.
    sent: Vec<String>,
    unsaved_config: bool,
    /// `exit` returns to a prompt instead of closing the shell.
    exit_keeps_shell: bool,
    awaiting_answer: bool,
    save_answer: Option<String>,
    closed: bool,
    close_calls: usize,
}

/// Programmable [`ByteChannel`] emulating a device shell.
///
/// Clones share state, so a test can keep one handle for assertions while
/// the driver owns another.
///
/// # Example
///
/// ```rust,ignore
/// use nsburst::transport::MockChannel;
///
/// let mock = MockChannel::new("fw-edge-1->");
/// mock.respond("get hostname", "Hostname: fw-edge-1");
/// ```
#[derive(Clone)]
pub struct MockChannel {
    inner: Arc<Mutex<MockChannelInner>>,
}

impl MockChannel {
    /// Create a shell that greets with a banner and `prompt`.
    pub fn new(prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        let banner = Bytes::from(format!("Remote Management Console\r\n{}", prompt));
        Self {
            inner: Arc::new(Mutex::new(MockChannelInner {
                prompt,
                chunk_size: usize::MAX,
                outbox: VecDeque::from([banner]),
                replies: HashMap::new(),
                hang: HashSet::new(),
                sent: Vec::new(),
                unsaved_config: false,
                exit_keeps_shell: false,
                awaiting_answer: false,
                save_answer: None,
                closed: false,
                close_calls: 0,
            })),
        }
    }

    /// Deliver output in pieces of at most `size` bytes.
    pub fn with_chunk_size(self, size: usize) -> Self {
        self.lock().chunk_size = size.max(1);
        self
    }

    /// Ask to save the configuration on `exit`.
    pub fn with_unsaved_config(self) -> Self {
        self.lock().unsaved_config = true;
        self
    }

    /// Answer `exit` with a fresh prompt, as a nested session would.
    pub fn with_exit_to_prompt(self) -> Self {
        self.lock().exit_keeps_shell = true;
        self
    }

    /// Queue output for the next time `command` is sent.
    ///
    /// Lines are separated by `\n` and delivered with `\r\n`. Once a
    /// command's queue is down to one entry, that entry is repeated.
    pub fn respond(&self, command: &str, output: &str) {
        self.lock()
            .replies
            .entry(command.to_string())
            .or_default()
            .push_back(output.to_string());
    }

    /// Never answer `command`: no echo, no output, no prompt.
    pub fn hang_on(&self, command: &str) {
        self.lock().hang.insert(command.to_string());
    }

    /// Command lines received so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// How many times `command` was sent.
    pub fn count(&self, command: &str) -> usize {
        self.lock().sent.iter().filter(|c| *c == command).count()
    }

    /// The answer given to the save-configuration prompt, if it was asked.
    pub fn save_answer(&self) -> Option<String> {
        self.lock().save_answer.clone()
    }

    /// Whether `close` was called.
    pub fn is_closed(&self) -> bool {
        self.lock().close_calls > 0
    }

    fn lock(&self) -> MutexGuard<'_, MockChannelInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MockChannelInner {
    fn emit(&mut self, text: &str) {
        let mut data = Bytes::copy_from_slice(text.as_bytes());
        while !data.is_empty() {
            let n = self.chunk_size.min(data.len());
            self.outbox.push_back(data.split_to(n));
        }
    }

    fn handle_command(&mut self, command: &str) {
        self.sent.push(command.to_string());
        if self.hang.contains(command) {
            return;
        }

        if command == "exit" {
            self.emit("exit\r\n");
            if self.unsaved_config {
                self.emit("Configuration modified, save? [y]/n ");
                self.awaiting_answer = true;
            } else if self.exit_keeps_shell {
                let prompt = self.prompt.clone();
                self.emit(&prompt);
            } else {
                self.closed = true;
            }
            return;
        }

        let output = match self.replies.get_mut(command) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => String::new(),
        };

        let mut text = format!("{}\r\n", command);
        for line in output.lines() {
            text.push_str(line);
            text.push_str("\r\n");
        }
        text.push_str(&self.prompt);
        self.emit(&text);
    }
}

impl ByteChannel for MockChannel {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(ChannelError::Closed.into());
        }

        let text = String::from_utf8_lossy(data).into_owned();
        if inner.awaiting_answer {
            inner.awaiting_answer = false;
            inner.save_answer = Some(text);
            inner.closed = true;
            return Ok(());
        }

        for command in text.split('\n').filter(|c| !c.is_empty()) {
            inner.handle_command(command.trim_end_matches('\r'));
        }
        Ok(())
    }

    async fn recv(&mut self, max_bytes: usize) -> Result<Option<Bytes>> {
        let next = {
            let mut inner = self.lock();
            match inner.outbox.pop_front() {
                Some(mut chunk) => {
                    if chunk.len() > max_bytes.max(1) {
                        let head = chunk.split_to(max_bytes.max(1));
                        inner.outbox.push_front(chunk);
                        Some(Some(head))
                    } else {
                        Some(Some(chunk))
                    }
                }
                None if inner.closed => Some(None),
                None => None,
            }
        };

        match next {
            Some(chunk) => Ok(chunk),
            // Nothing buffered and the shell is still open: wait forever
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        let mut inner = self.lock();
        inner.closed = true;
        inner.close_calls += 1;
        inner.outbox.clear();
        Ok(())
    }
}
