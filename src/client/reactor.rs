//! Prompt/response automaton for interactive admin tool sessions.
//!
//! The admin tool asks questions on its output stream and waits for answers
//! on its input stream. A [`Reactor`] reads the output as prompt tokens,
//! answers the ones it has a registered reaction for and ignores the rest.
//!
//! Prompts end in `?` or `)` as often as in a newline, so tokens are split on
//! all three (see [`PromptCodec`]). Input prompts such as `Source node #2: `
//! end in neither and are recognized by the pending output ending in `": "`.
//!
//! A session ends when the output stream closes or when a whole
//! [`IDLE_INTERVAL`] passes without a single token. Either way the caller's
//! `on_idle` callback runs exactly once. A hung tool is torn down from there.

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::codec::{Decoder, FramedRead};
use tracing::{debug, warn};

/// Silence window after which a session counts as stalled.
pub const IDLE_INTERVAL: Duration = Duration::from_secs(1);

/// Bytes that end a prompt token.
const PROMPT_TERMINATORS: [u8; 3] = [b'\n', b'?', b')'];

/// Tail of an input prompt the tool is blocked on.
const OPEN_PROMPT_SUFFIX: &[u8] = b": ";

/// Splits tool output into prompt tokens on `\n`, `?` or `)`.
///
/// The terminator is dropped. Pending output ending in `": "` is an open
/// input prompt and is yielded as is. Whatever is left when the stream ends
/// is yielded as a final token.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptCodec;

impl Decoder for PromptCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(idx) = src.iter().position(|b| PROMPT_TERMINATORS.contains(b)) else {
            if src.ends_with(OPEN_PROMPT_SUFFIX) {
                let token = src.split();
                return Ok(Some(String::from_utf8_lossy(&token).into_owned()));
            }
            return Ok(None);
        };
        let mut token = src.split_to(idx + 1);
        token.truncate(idx);
        Ok(Some(String::from_utf8_lossy(&token).into_owned()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(token) = self.decode(src)? {
            return Ok(Some(token));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let token = src.split();
        Ok(Some(String::from_utf8_lossy(&token).into_owned()))
    }
}

/// One registered prompt answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    /// Substring that identifies the prompt.
    pub trigger: String,
    /// Line written back, without the trailing newline.
    pub response: String,
}

/// How a reactor session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// A full idle interval passed with no output.
    Idle,
    /// The output stream closed (tool exited or pipe torn down).
    EndOfStream,
}

/// Answers an interactive tool's prompts from a fixed reaction table.
///
/// Reactions are checked in registration order and the first trigger found
/// inside a token wins, so overlapping triggers resolve deterministically.
pub struct Reactor<R, W> {
    reader: R,
    writer: W,
    reactions: Vec<Reaction>,
}

impl<R, W> Reactor<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a reactor over a tool's output (`reader`) and input (`writer`).
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            reactions: Vec::new(),
        }
    }

    /// Register an answer for prompts containing `trigger`.
    pub fn add_reaction(&mut self, trigger: impl Into<String>, response: impl Into<String>) {
        self.reactions.push(Reaction {
            trigger: trigger.into(),
            response: response.into(),
        });
    }

    /// Run the session until the tool goes quiet or its output closes.
    ///
    /// `on_idle` runs exactly once, when the session ends. Failed writes to
    /// the tool's input are logged and otherwise ignored, since the input
    /// pipe closing is part of normal teardown.
    pub async fn react<F>(self, on_idle: F) -> SessionEnd
    where
        F: FnOnce(),
    {
        let Reactor {
            reader,
            mut writer,
            reactions,
        } = self;

        let mut tokens = FramedRead::new(reader, PromptCodec);
        let mut watchdog = interval_at(Instant::now() + IDLE_INTERVAL, IDLE_INTERVAL);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut seen: u64 = 0;
        let mut answered: usize = 0;

        let end = loop {
            tokio::select! {
                biased;

                token = tokens.next() => match token {
                    Some(Ok(token)) => {
                        seen += 1;
                        let Some(response) = find_response(&reactions, &token) else {
                            continue;
                        };
                        debug!(prompt = %token.trim(), response = %response, "reactor answering prompt");
                        if let Err(e) = write_line(&mut writer, response).await {
                            debug!(error = %e, "reactor could not write response");
                        }
                        answered += 1;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "reactor read failed, ending session");
                        break SessionEnd::EndOfStream;
                    }
                    None => break SessionEnd::EndOfStream,
                },
                _ = watchdog.tick() => {
                    if std::mem::take(&mut seen) == 0 {
                        debug!("reactor saw no output for a full interval");
                        break SessionEnd::Idle;
                    }
                }
            }
        };

        debug!(?end, answered, "reactor session finished");
        on_idle();
        end
    }
}

fn find_response<'a>(reactions: &'a [Reaction], token: &str) -> Option<&'a str> {
    let token = token.trim();
    reactions
        .iter()
        .find(|reaction| token.contains(reaction.trigger.as_str()))
        .map(|reaction| reaction.response.as_str())
}

async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
