//! Incremental extraction of array members from a streamed JSON document
//!
//! Attribute element lists can be large, so the lookup never buffers the whole body.
//! `ValueSplitter` tracks just enough JSON structure (containers, object keys, strings)
//! to cut out each member of the array at a given key path, chunk by chunk. Each member
//! is then parsed on its own.

use crate::error::{GoodDataError, Result};
use crate::types::Element;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;

/// Key path of the element array in an elements response
pub const ELEMENTS_PATH: [&str; 2] = ["attributeElements", "elements"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

#[derive(Debug)]
struct Frame {
    container: Container,
    /// Key of the member currently being read (objects only)
    key: Option<Vec<u8>>,
}

#[derive(Debug)]
struct Capture {
    depth: usize,
    scalar: bool,
    buf: Vec<u8>,
}

#[derive(Debug)]
pub struct ValueSplitter {
    target: Vec<Vec<u8>>,
    stack: Vec<Frame>,
    in_string: bool,
    escaped: bool,
    reading_key: bool,
    expect_key: bool,
    key_buf: Vec<u8>,
    capture: Option<Capture>,
    started: bool,
}

impl ValueSplitter {
    pub fn new(path: &[&str]) -> Self {
        Self {
            target: path.iter().map(|k| k.as_bytes().to_vec()).collect(),
            stack: Vec::new(),
            in_string: false,
            escaped: false,
            reading_key: false,
            expect_key: false,
            key_buf: Vec::new(),
            capture: None,
            started: false,
        }
    }

    pub fn attribute_elements() -> Self {
        Self::new(&ELEMENTS_PATH)
    }

    /// True when the cursor sits directly inside the target array
    fn at_target(&self) -> bool {
        self.stack.len() == self.target.len() + 1
            && self.stack.last().map(|f| f.container) == Some(Container::Array)
            && self.target.iter().zip(&self.stack).all(|(key, frame)| {
                frame.container == Container::Object
                    && frame.key.as_deref() == Some(key.as_slice())
            })
    }

    fn finish_capture(&mut self, out: &mut VecDeque<Vec<u8>>) {
        if let Some(capture) = self.capture.take() {
            out.push_back(capture.buf);
        }
    }

    fn capturing_scalar_at_depth(&self) -> bool {
        matches!(&self.capture, Some(c) if c.scalar && c.depth == self.stack.len())
    }

    /// Consume one chunk; completed members are appended to `out` as raw JSON bytes.
    pub fn feed(&mut self, chunk: &[u8], out: &mut VecDeque<Vec<u8>>) -> Result<()> {
        for &b in chunk {
            if self.in_string {
                self.string_byte(b, out)?;
                continue;
            }

            if b.is_ascii_whitespace() {
                if self.capturing_scalar_at_depth() {
                    self.finish_capture(out);
                } else if let Some(capture) = self.capture.as_mut() {
                    capture.buf.push(b);
                }
                continue;
            }

            // Bare scalars (numbers, literals) end at the next structural byte
            if matches!(b, b',' | b']' | b'}') && self.capturing_scalar_at_depth() {
                self.finish_capture(out);
            }

            if self.capture.is_none() && b != b',' && b != b']' && self.at_target() {
                self.capture = Some(Capture {
                    depth: self.stack.len(),
                    scalar: b != b'{' && b != b'[',
                    buf: Vec::new(),
                });
            }
            if let Some(capture) = self.capture.as_mut() {
                capture.buf.push(b);
            }

            match b {
                b'"' => {
                    self.in_string = true;
                    if self.expect_key
                        && self.stack.last().map(|f| f.container) == Some(Container::Object)
                    {
                        self.reading_key = true;
                        self.expect_key = false;
                        self.key_buf.clear();
                    }
                }
                b'{' => {
                    self.started = true;
                    self.stack.push(Frame {
                        container: Container::Object,
                        key: None,
                    });
                    self.expect_key = true;
                }
                b'[' => {
                    self.started = true;
                    self.stack.push(Frame {
                        container: Container::Array,
                        key: None,
                    });
                    self.expect_key = false;
                }
                b'}' | b']' => {
                    let expected = if b == b'}' {
                        Container::Object
                    } else {
                        Container::Array
                    };
                    match self.stack.pop() {
                        Some(frame) if frame.container == expected => {}
                        _ => return Err(malformed("unbalanced JSON in element stream")),
                    }
                    self.expect_key = false;
                    if matches!(&self.capture, Some(c) if !c.scalar && c.depth == self.stack.len())
                    {
                        self.finish_capture(out);
                    }
                }
                b',' => {
                    if let Some(frame) = self.stack.last_mut() {
                        if frame.container == Container::Object {
                            frame.key = None;
                            self.expect_key = true;
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn string_byte(&mut self, b: u8, out: &mut VecDeque<Vec<u8>>) -> Result<()> {
        if let Some(capture) = self.capture.as_mut() {
            capture.buf.push(b);
        }

        if self.escaped {
            self.escaped = false;
            if self.reading_key {
                self.key_buf.push(b);
            }
            return Ok(());
        }

        match b {
            b'\\' => {
                self.escaped = true;
                if self.reading_key {
                    self.key_buf.push(b);
                }
            }
            b'"' => {
                self.in_string = false;
                if self.reading_key {
                    self.reading_key = false;
                    let key = unescape_key(std::mem::take(&mut self.key_buf))?;
                    if let Some(frame) = self.stack.last_mut() {
                        frame.key = Some(key);
                    }
                } else if self.capturing_scalar_at_depth() {
                    self.finish_capture(out);
                }
            }
            _ => {
                if self.reading_key {
                    self.key_buf.push(b);
                }
            }
        }
        Ok(())
    }

    /// Call once the input is exhausted.
    pub fn finish(&mut self, out: &mut VecDeque<Vec<u8>>) -> Result<()> {
        if self.capturing_scalar_at_depth() {
            self.finish_capture(out);
        }
        if !self.started || !self.stack.is_empty() || self.in_string {
            return Err(malformed("element stream ended before the document closed"));
        }
        Ok(())
    }
}

fn malformed(msg: &str) -> GoodDataError {
    GoodDataError::Decode(<serde_json::Error as serde::de::Error>::custom(msg))
}

/// Decode JSON escapes in a raw object key
fn unescape_key(raw: Vec<u8>) -> Result<Vec<u8>> {
    if !raw.contains(&b'\\') {
        return Ok(raw);
    }
    let mut quoted = Vec::with_capacity(raw.len() + 2);
    quoted.push(b'"');
    quoted.extend_from_slice(&raw);
    quoted.push(b'"');
    let key: String = serde_json::from_slice(&quoted)?;
    Ok(key.into_bytes())
}

struct StreamState<S> {
    body: S,
    splitter: ValueSplitter,
    ready: VecDeque<Vec<u8>>,
    done: bool,
}

/// Lazily parse the elements of a streamed `attributeElements` document.
///
/// Members without a string `title` and `uri` are skipped.
pub fn element_stream<S, B, E>(body: S) -> impl Stream<Item = Result<Element>>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<GoodDataError>,
{
    let state = StreamState {
        body,
        splitter: ValueSplitter::attribute_elements(),
        ready: VecDeque::new(),
        done: false,
    };
    futures::stream::try_unfold(state, next_element::<S, B, E>)
}

async fn next_element<S, B, E>(
    mut state: StreamState<S>,
) -> Result<Option<(Element, StreamState<S>)>>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<GoodDataError>,
{
    loop {
        if let Some(raw) = state.ready.pop_front() {
            let value: Value = serde_json::from_slice(&raw)?;
            match Element::from_value(&value) {
                Some(element) => return Ok(Some((element, state))),
                None => {
                    tracing::debug!("Skipping element without title or uri");
                    continue;
                }
            }
        }
        if state.done {
            return Ok(None);
        }
        match state.body.next().await {
            Some(Ok(chunk)) => state.splitter.feed(chunk.as_ref(), &mut state.ready)?,
            Some(Err(e)) => return Err(e.into()),
            None => {
                state.splitter.finish(&mut state.ready)?;
                state.done = true;
            }
        }
    }
}
