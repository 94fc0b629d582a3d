//! CDP Transport Layer
//!
//! Speaks the DevTools protocol to Chrome over a minimal WebSocket client.
//! A reader thread routes responses back to waiting callers by message id.
//! Commands that anti-bot scripts can observe are swallowed before they reach Chrome.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::process::{Child, Command as Process, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};

use super::types::Command;
use crate::error::{Error, Result};

/// Commands that are never forwarded (highly detectable by anti-bot)
const BLOCKED_COMMANDS: &[&str] = &[
    "Runtime.enable",
    "Runtime.disable",
    "Debugger.enable",
    "Console.enable",
    "Profiler.enable",
];

/// Upper bound on a single command round trip
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Waiting caller: the method name (for error context) and its reply slot
type Pending = Arc<Mutex<HashMap<u64, (&'static str, oneshot::Sender<Result<Value>>)>>>;

/// WebSocket framing (RFC 6455), client side only
mod frame {
    use std::io::{Read, Write};
    use std::net::TcpStream;

    pub const TEXT: u8 = 0x1;
    pub const CLOSE: u8 = 0x8;
    pub const PING: u8 = 0x9;
    pub const PONG: u8 = 0xA;

    /// Write one masked, final frame
    pub fn write(stream: &mut TcpStream, opcode: u8, data: &[u8]) -> std::io::Result<()> {
        let len = data.len();
        let mut out = Vec::with_capacity(14 + len);
        out.push(0x80 | opcode);

        match len {
            0..=125 => out.push(0x80 | len as u8),
            126..=65535 => {
                out.push(0x80 | 126);
                out.extend_from_slice(&(len as u16).to_be_bytes());
            }
            _ => {
                out.push(0x80 | 127);
                out.extend_from_slice(&(len as u64).to_be_bytes());
            }
        }

        let mask: [u8; 4] = rand::random();
        out.extend_from_slice(&mask);
        out.extend(data.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));

        stream.write_all(&out)?;
        stream.flush()
    }

    /// Read one frame, returning `(opcode, payload)`
    pub fn read(stream: &mut TcpStream) -> std::io::Result<(u8, Vec<u8>)> {
        let mut header = [0u8; 2];
        stream.read_exact(&mut header)?;

        let opcode = header[0] & 0x0F;
        let masked = header[1] & 0x80 != 0;
        let len = match header[1] & 0x7F {
            126 => {
                let mut ext = [0u8; 2];
                stream.read_exact(&mut ext)?;
                u16::from_be_bytes(ext) as usize
            }
            127 => {
                let mut ext = [0u8; 8];
                stream.read_exact(&mut ext)?;
                u64::from_be_bytes(ext) as usize
            }
            n => n as usize,
        };

        let mask = if masked {
            let mut m = [0u8; 4];
            stream.read_exact(&mut m)?;
            Some(m)
        } else {
            None
        };

        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload)?;
        if let Some(mask) = mask {
            for (i, byte) in payload.iter_mut().enumerate() {
                *byte ^= mask[i % 4];
            }
        }

        Ok((opcode, payload))
    }
}

/// CDP Transport - owns the Chrome process and the WebSocket to it
pub struct Transport {
    child: Mutex<Child>,
    writer: Mutex<TcpStream>,
    next_id: AtomicU64,
    pending: Pending,
    /// When set, neither `close` nor `Drop` kills Chrome
    detached: AtomicBool,
}

impl Transport {
    /// Connect to Chrome's DevTools WebSocket
    pub fn connect(child: Child, ws_url: &str) -> Result<Self> {
        let rest = ws_url.trim_start_matches("ws://");
        let (host_port, path) = rest.split_once('/').unwrap_or((rest, ""));

        let mut stream = TcpStream::connect(host_port)
            .map_err(|e| Error::transport_io("Failed to connect to Chrome", e))?;

        let key = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            rand::random::<[u8; 16]>(),
        );
        let handshake = format!(
            "GET /{path} HTTP/1.1\r\n\
             Host: {host_port}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {key}\r\n\
             Sec-WebSocket-Version: 13\r\n\
             \r\n"
        );
        stream
            .write_all(handshake.as_bytes())
            .map_err(|e| Error::transport_io("Handshake write failed", e))?;

        let mut response = [0u8; 1024];
        let n = stream
            .read(&mut response)
            .map_err(|e| Error::transport_io("Handshake read failed", e))?;
        let response = String::from_utf8_lossy(&response[..n]);
        if !response.starts_with("HTTP/1.1 101") {
            return Err(Error::transport(format!(
                "WebSocket handshake failed: {}",
                response.lines().next().unwrap_or_default()
            )));
        }
        tracing::debug!("WebSocket connected to {}", ws_url);

        let reader = stream
            .try_clone()
            .map_err(|e| Error::transport_io("Failed to clone stream", e))?;
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let pending_reader = Arc::clone(&pending);
        std::thread::Builder::new()
            .name("cdp-reader".into())
            .spawn(move || reader_loop(reader, pending_reader))?;

        Ok(Self {
            child: Mutex::new(child),
            writer: Mutex::new(stream),
            next_id: AtomicU64::new(1),
            pending,
            detached: AtomicBool::new(false),
        })
    }

    /// Send a command, optionally scoped to a target session, and await its reply
    pub async fn call<C: Command>(&self, session_id: Option<&str>, command: &C) -> Result<C::Response> {
        let method = C::METHOD;
        if BLOCKED_COMMANDS.contains(&method) {
            tracing::debug!("Blocked CDP command: {}", method);
            return serde_json::from_value(json!({})).map_err(Into::into);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, (method, tx));

        let mut msg = json!({
            "id": id,
            "method": method,
            "params": serde_json::to_value(command)?,
        });
        if let Some(session_id) = session_id {
            msg["sessionId"] = Value::String(session_id.to_string());
        }
        let data = serde_json::to_vec(&msg)?;

        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = frame::write(&mut writer, frame::TEXT, &data) {
                self.pending.lock().await.remove(&id);
                return Err(Error::transport_io("WebSocket write failed", e));
            }
        }
        tracing::trace!(method, id, session = session_id.unwrap_or("-"), "sent CDP command");

        let result = match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(reply) => reply.map_err(|_| Error::transport("Response channel closed"))??,
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(Error::Timeout(format!(
                    "{} got no response within {}s",
                    method,
                    COMMAND_TIMEOUT.as_secs()
                )));
            }
        };

        Ok(serde_json::from_value(result)?)
    }

    /// Stop killing Chrome when this transport goes away
    pub fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }

    /// Whether [`detach`](Self::detach) has been called
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    /// Close the WebSocket and kill Chrome (unless detached)
    pub async fn close(&self) -> Result<()> {
        {
            let mut writer = self.writer.lock().await;
            let _ = frame::write(&mut writer, frame::CLOSE, &[]);
        }

        if !self.is_detached() {
            let mut child = self.child.lock().await;
            let _ = child.kill();
            let _ = child.wait();
        }
        Ok(())
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if self.is_detached() {
            return;
        }
        if let Ok(mut child) = self.child.try_lock() {
            let _ = child.kill();
        }
    }
}

/// Route replies to their callers until the socket closes
fn reader_loop(mut stream: TcpStream, pending: Pending) {
    loop {
        let (opcode, payload) = match frame::read(&mut stream) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!("WebSocket read error: {}", e);
                break;
            }
        };

        match opcode {
            frame::TEXT => {
                let msg: Value = match serde_json::from_slice(&payload) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!("Failed to parse CDP message: {}", e);
                        continue;
                    }
                };

                // Events carry no id; the flow never subscribes to them
                let Some(id) = msg.get("id").and_then(Value::as_u64) else {
                    tracing::trace!(
                        method = msg.get("method").and_then(|m| m.as_str()).unwrap_or("?"),
                        "ignoring CDP event"
                    );
                    continue;
                };

                let Some((method, reply)) = pending.blocking_lock().remove(&id) else {
                    tracing::trace!("Response for unknown id: {}", id);
                    continue;
                };

                let result = match msg.get("error") {
                    Some(error) => Err(Error::cdp(
                        method,
                        error.get("code").and_then(Value::as_i64).unwrap_or(-1),
                        error
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown"),
                    )),
                    None => Ok(msg.get("result").cloned().unwrap_or_else(|| json!({}))),
                };
                let _ = reply.send(result);
            }
            frame::PING => {
                let _ = frame::write(&mut stream, frame::PONG, &payload);
            }
            frame::CLOSE => {
                tracing::debug!("WebSocket closed by Chrome");
                break;
            }
            _ => {}
        }
    }

    // Fail everyone still waiting instead of leaving them to the timeout
    pending.blocking_lock().clear();
    tracing::debug!("CDP reader loop ended");
}

/// Launch Chrome and read its DevTools WebSocket URL from stderr
pub fn launch_chrome(path: &Path, args: &[String]) -> Result<(Child, String)> {
    let mut command = Process::new(path);
    command
        .args(args)
        .arg("--remote-debugging-port=0")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    // Own process group, so a Ctrl-C at the terminal stops us but not Chrome.
    // Only `close` and `Drop` end the browser.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let mut child = command
        .spawn()
        .map_err(|e| Error::Launch(format!("{}: {}", path.display(), e)))?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Launch("No stderr from Chrome".into()))?;

    // Chrome prints: DevTools listening on ws://127.0.0.1:PORT/devtools/browser/GUID
    let ws_url = BufReader::new(stderr)
        .lines()
        .map_while(|line| line.ok())
        .inspect(|line| tracing::trace!("Chrome stderr: {}", line))
        .find_map(|line| {
            line.contains("DevTools listening on")
                .then(|| line.find("ws://").map(|at| line[at..].trim().to_string()))
                .flatten()
        });

    match ws_url {
        Some(url) => {
            tracing::debug!("Chrome DevTools URL: {}", url);
            Ok((child, url))
        }
        None => {
            let _ = child.kill();
            Err(Error::Launch(
                "Chrome exited without printing a DevTools URL".into(),
            ))
        }
    }
}
