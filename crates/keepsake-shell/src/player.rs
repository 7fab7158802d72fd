/// mpv-backed audio output driven over mpv's JSON IPC.
///
/// One idle mpv child lives for the whole session:
///
/// ```text
///   MpvOutput::start()
///         │
///         ├── writer_task   ← MpvRequest queue, in order → socket
///         ├── reader_task   ← JSON lines from socket
///         │                      ├── reply (request_id) → waiting oneshot
///         │                      └── event               → forward_events
///         └── forward_events: start-file / end-file → PlayerEvent
/// ```
///
/// `load` pauses and replaces the current file, `play`/`pause` flip the
/// `pause` property and `set_volume` sets `volume`, so every change acts on
/// the running track. Events carry a generation number (one per loaded
/// file) so the page can drop the end of a file that was already replaced.
use keepsake_core::playlist::{AudioOutput, PlaybackRejected, Track};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

type Reply = oneshot::Sender<anyhow::Result<Value>>;
type PendingMap = Arc<Mutex<HashMap<u64, Reply>>>;

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Ended { generation: u64 },
    Failed { generation: u64, reason: String },
}

impl PlayerEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Ended { generation } | Self::Failed { generation, .. } => *generation,
        }
    }
}

// ── IPC plumbing ──────────────────────────────────────────────────────────────

struct MpvRequest {
    req_id: u64,
    payload: String,
    reply: Reply,
}

impl MpvRequest {
    fn new(command: &Value) -> anyhow::Result<(Self, oneshot::Receiver<anyhow::Result<Value>>)> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut payload = serde_json::to_string(&msg)?;
        payload.push('\n');
        let (reply, reply_rx) = oneshot::channel();
        Ok((
            Self {
                req_id,
                payload,
                reply,
            },
            reply_rx,
        ))
    }
}

/// Unsolicited mpv message (no `request_id`).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }
}

#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<MpvRequest>,
}

impl MpvHandle {
    /// Send `command` and wait for mpv's reply.
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let (request, reply_rx) = MpvRequest::new(&command)?;
        let req_id = request.req_id;
        self.tx
            .send(request)
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;
        tokio::time::timeout(REPLY_TIMEOUT, reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    /// Queue `command` without waiting. Queue order is wire order, so
    /// consecutive posts reach mpv in the order they were made.
    pub fn post(&self, command: Value) -> anyhow::Result<()> {
        let (request, reply_rx) = MpvRequest::new(&command)?;
        let req_id = request.req_id;
        self.tx
            .try_send(request)
            .map_err(|e| anyhow::anyhow!("mpv writer unavailable: {}", e))?;
        tokio::spawn(async move {
            match tokio::time::timeout(REPLY_TIMEOUT, reply_rx).await {
                Ok(Ok(Ok(_))) => {}
                Ok(Ok(Err(e))) => warn!("mpv: {} failed: {}", command, e),
                Ok(Err(_)) => debug!("mpv: reply channel dropped req={}", req_id),
                Err(_) => warn!("mpv: IPC timeout for req={}", req_id),
            }
        });
        Ok(())
    }

    pub fn load_paused(&self, src: &str) -> anyhow::Result<()> {
        self.set_pause(true)?;
        self.post(json!(["loadfile", src, "replace"]))
    }

    pub fn set_pause(&self, paused: bool) -> anyhow::Result<()> {
        self.post(json!(["set_property", "pause", paused]))
    }

    pub fn set_volume(&self, volume: f32) -> anyhow::Result<()> {
        let percent = (volume * 100.0).clamp(0.0, 100.0).round();
        self.post(json!(["set_property", "volume", percent]))
    }

    pub fn quit(&self) -> anyhow::Result<()> {
        self.post(json!(["quit"]))
    }
}

/// Split `stream` into a writer task fed by the returned handle and a reader
/// task that resolves replies and forwards everything else to `event_tx`.
fn start_io_tasks<S>(stream: S, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<MpvRequest>(64);

    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

    MpvHandle { tx: cmd_tx }
}

async fn fail_pending(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

async fn reader_task<R>(
    mut reader: BufReader<R>,
    pending: PendingMap,
    event_tx: mpsc::Sender<MpvEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                warn!("mpv reader: connection closed");
                fail_pending(&pending, "mpv IPC connection closed").await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                let Some(req_id) = val.get("request_id").and_then(Value::as_u64) else {
                    debug!("mpv reader: event {}", trimmed);
                    if event_tx.send(MpvEvent { raw: val }).await.is_err() {
                        break;
                    }
                    continue;
                };
                let Some(tx) = pending.lock().await.remove(&req_id) else {
                    debug!("mpv reader: response for unknown req={}", req_id);
                    continue;
                };
                let result = if val["error"].as_str() == Some("success") {
                    Ok(val)
                } else {
                    let err = val["error"].as_str().unwrap_or("unknown error");
                    Err(anyhow::anyhow!("mpv error: {}", err))
                };
                let _ = tx.send(result);
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_pending(&pending, "mpv IPC read error").await;
                break;
            }
        }
    }
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<MpvRequest>, pending: PendingMap)
where
    W: AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register before writing so the reader can always match the reply
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: send {}", req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

/// Turn mpv file events into playlist events. Every `loadfile` produces one
/// `start-file`, so counting them yields the same generation as
/// [`MpvOutput::generation`]. Ends caused by `stop`/`quit`/`redirect` are our
/// own doing and are not reported.
fn translate(event: &MpvEvent, generation: &mut u64) -> Option<PlayerEvent> {
    match event.event_name()? {
        "start-file" => {
            *generation += 1;
            None
        }
        "end-file" => match event.raw.get("reason").and_then(Value::as_str) {
            Some("eof") => Some(PlayerEvent::Ended {
                generation: *generation,
            }),
            Some("error") => Some(PlayerEvent::Failed {
                generation: *generation,
                reason: event
                    .raw
                    .get("file_error")
                    .and_then(Value::as_str)
                    .unwrap_or("playback error")
                    .to_string(),
            }),
            _ => None,
        },
        _ => None,
    }
}

async fn forward_events(
    mut mpv_rx: mpsc::Receiver<MpvEvent>,
    events: mpsc::Sender<PlayerEvent>,
) {
    let mut generation = 0;
    while let Some(event) = mpv_rx.recv().await {
        if let Some(player_event) = translate(&event, &mut generation) {
            // Receiver gone means the shell is shutting down
            if events.send(player_event).await.is_err() {
                break;
            }
        }
    }
}

// ── process ───────────────────────────────────────────────────────────────────

struct MpvProcess {
    child: tokio::process::Child,
    handle: MpvHandle,
}

fn spawn_idle_mpv() -> anyhow::Result<tokio::process::Child> {
    let mpv_binary = keepsake_core::platform::find_mpv_binary()
        .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;
    info!("mpv: spawning {:?}", mpv_binary);
    let child = tokio::process::Command::new(mpv_binary)
        .arg("--no-video")
        .arg("--idle=yes")
        .arg("--pause")
        .arg("--really-quiet")
        .arg(keepsake_core::platform::mpv_socket_arg())
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .spawn()?;
    Ok(child)
}

#[cfg(unix)]
async fn spawn_and_connect(event_tx: mpsc::Sender<MpvEvent>) -> anyhow::Result<MpvProcess> {
    let socket_path = std::path::PathBuf::from(keepsake_core::platform::mpv_socket_name());
    let _ = tokio::fs::remove_file(&socket_path).await;

    let child = spawn_idle_mpv()?;

    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if socket_path.exists() {
            break;
        }
    }
    if !socket_path.exists() {
        anyhow::bail!("mpv IPC socket did not appear");
    }

    let stream = UnixStream::connect(&socket_path).await?;
    info!("mpv: connected to IPC socket");
    Ok(MpvProcess {
        child,
        handle: start_io_tasks(stream, event_tx),
    })
}

#[cfg(windows)]
async fn spawn_and_connect(event_tx: mpsc::Sender<MpvEvent>) -> anyhow::Result<MpvProcess> {
    let child = spawn_idle_mpv()?;

    let pipe_path = format!(r"\\.\pipe\{}", keepsake_core::platform::mpv_socket_name());
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if let Ok(client) = ClientOptions::new().open(&pipe_path) {
            info!("mpv: connected to named pipe");
            return Ok(MpvProcess {
                child,
                handle: start_io_tasks(client, event_tx),
            });
        }
    }
    anyhow::bail!("mpv named pipe did not appear")
}

// ── AudioOutput ───────────────────────────────────────────────────────────────

pub struct MpvOutput {
    mpv: Option<MpvProcess>,
    source: Option<Track>,
    generation: u64,
    hidden: bool,
}

impl MpvOutput {
    /// Start the session's mpv child. Without mpv the output still works as a
    /// sink, but every `play` is rejected.
    pub async fn start(events: mpsc::Sender<PlayerEvent>) -> Self {
        let (mpv_tx, mpv_rx) = mpsc::channel(64);
        let mpv = match spawn_and_connect(mpv_tx).await {
            Ok(mpv) => {
                tokio::spawn(forward_events(mpv_rx, events));
                Some(mpv)
            }
            Err(e) => {
                warn!("mpv: unavailable, music playback disabled: {}", e);
                None
            }
        };
        Self {
            mpv,
            source: None,
            generation: 0,
            hidden: false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn shutdown(&mut self) {
        if let Some(mut mpv) = self.mpv.take() {
            if let Err(e) = mpv.handle.quit() {
                debug!("mpv: quit not delivered: {}", e);
            }
            let _ = mpv.child.start_kill();
        }
    }

    fn handle(&self) -> Option<&MpvHandle> {
        self.mpv.as_ref().map(|mpv| &mpv.handle)
    }
}

impl AudioOutput for MpvOutput {
    fn load(&mut self, track: &Track) {
        self.source = Some(track.clone());
        println!("♪ {}", track.title);
        let Some(handle) = self.handle() else {
            return;
        };
        match handle.load_paused(&track.src) {
            Ok(()) => {
                self.generation += 1;
                debug!("mpv: loaded {} (generation {})", track.src, self.generation);
            }
            Err(e) => warn!("mpv: failed to load {}: {}", track.src, e),
        }
    }

    fn play(&mut self) -> Result<(), PlaybackRejected> {
        if self.source.is_none() {
            return Err(PlaybackRejected("no track loaded".into()));
        }
        let handle = self
            .handle()
            .ok_or_else(|| PlaybackRejected("mpv is not running".into()))?;
        handle
            .set_pause(false)
            .map_err(|e| PlaybackRejected(e.to_string()))
    }

    fn pause(&mut self) {
        if let Some(Err(e)) = self.handle().map(|h| h.set_pause(true)) {
            warn!("mpv: pause failed: {}", e);
        }
    }

    fn set_volume(&mut self, volume: f32) {
        if let Some(Err(e)) = self.handle().map(|h| h.set_volume(volume)) {
            warn!("mpv: volume change failed: {}", e);
        }
    }

    fn hide(&mut self) {
        self.hidden = true;
        println!("(no music available, player hidden)");
    }
}
