use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, SyncSender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rodio::{OutputStream, OutputStreamBuilder, Sink};

use super::sink::{create_sink_at, open_source};
use super::types::{
    EndReason, EngineCmd, EngineEvent, EngineSnapshot, LoadMode, Property, SeekTarget,
};

const TICK: Duration = Duration::from_millis(100);

/// Engine thread entry point. Reports output-stream initialization through
/// `ready` before entering the command loop; an init failure is the only
/// fatal engine error.
pub(super) fn run(
    rx: Receiver<EngineCmd>,
    events: SyncSender<EngineEvent>,
    shared: Arc<Mutex<EngineSnapshot>>,
    volume: u8,
    ready: Sender<Result<(), String>>,
) {
    let mut stream = match OutputStreamBuilder::open_default_stream() {
        Ok(s) => s,
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };
    // rodio logs to stderr when OutputStream is dropped; noisy for us.
    stream.log_on_drop(false);
    let _ = ready.send(Ok(()));

    let mut pb = Playback {
        stream,
        events,
        shared,
        playlist: Vec::new(),
        pos: None,
        sink: None,
        sink_queued: 0,
        paused: true,
        volume: volume.min(100),
        started_at: None,
        accumulated: Duration::ZERO,
        current_duration: None,
        last_elapsed: Duration::ZERO,
    };

    loop {
        match rx.recv_timeout(TICK) {
            Ok(cmd) => match cmd {
                EngineCmd::Load(path, mode) => pb.load(path, mode),
                EngineCmd::QueueClear => pb.queue_clear(),
                EngineCmd::Pause => pb.pause(),
                EngineCmd::Resume => pb.resume(),
                EngineCmd::Stop => pb.stop(),
                EngineCmd::Seek(target) => pb.seek(target),
                EngineCmd::SetVolume(v) => pb.set_volume(v),
                EngineCmd::Shutdown => {
                    pb.halt();
                    pb.publish();
                    pb.emit(EngineEvent::Shutdown);
                    return;
                }
            },
            Err(RecvTimeoutError::Timeout) => pb.tick(),
            Err(RecvTimeoutError::Disconnected) => return,
        }
        pb.publish();
    }
}

/// The engine thread's whole mutable state: the internal play queue, the
/// live sink and the elapsed-time clock.
struct Playback {
    stream: OutputStream,
    events: SyncSender<EngineEvent>,
    shared: Arc<Mutex<EngineSnapshot>>,
    playlist: Vec<PathBuf>,
    pos: Option<usize>,
    sink: Option<Sink>,
    /// How many queue slots (starting at `pos`) have sources inside `sink`.
    /// 2 means the next slot is pre-queued and the transition is gapless.
    sink_queued: usize,
    paused: bool,
    volume: u8,
    started_at: Option<Instant>,
    accumulated: Duration,
    current_duration: Option<Duration>,
    last_elapsed: Duration,
}

impl Playback {
    fn load(&mut self, path: PathBuf, mode: LoadMode) {
        match mode {
            LoadMode::Replace => {
                self.playlist = vec![path];
                self.pos = Some(0);
                self.paused = false;
                self.start_current(Duration::ZERO);
                self.emit_pos();
            }
            LoadMode::Append => {
                self.playlist.push(path);
                self.maybe_preload(self.playlist.len() - 1);
            }
            LoadMode::AppendPlay => {
                self.playlist.push(path);
                let idx = self.playlist.len() - 1;
                if self.pos.is_none() {
                    self.pos = Some(idx);
                    self.paused = false;
                    self.start_current(Duration::ZERO);
                    self.emit_pos();
                } else {
                    self.maybe_preload(idx);
                }
            }
        }
    }

    /// Drop every queue slot except the active one.
    fn queue_clear(&mut self) {
        match self.pos {
            Some(i) => {
                let current = self.playlist[i].clone();
                self.playlist = vec![current];
                self.pos = Some(0);
                if self.sink.is_some() && self.sink_queued > 1 {
                    // A pre-queued source cannot be removed from a live
                    // sink; rebuild the active slot at its current position.
                    let at = self.elapsed();
                    self.start_current(at);
                }
            }
            None => self.playlist.clear(),
        }
    }

    fn pause(&mut self) {
        if self.paused {
            return;
        }
        if let Some(s) = &self.sink {
            s.pause();
        }
        if let Some(t) = self.started_at.take() {
            self.accumulated += t.elapsed();
        }
        self.paused = true;
    }

    fn resume(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        if let Some(s) = &self.sink {
            s.play();
            self.started_at = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        self.halt();
        self.emit(EngineEvent::EndOfFile(EndReason::Stopped));
        self.emit_pos();
    }

    /// Stop playback and clear the queue without emitting events.
    fn halt(&mut self) {
        if let Some(s) = self.sink.take() {
            s.stop();
        }
        self.playlist.clear();
        self.pos = None;
        self.sink_queued = 0;
        self.paused = true;
        self.started_at = None;
        self.accumulated = Duration::ZERO;
        self.current_duration = None;
    }

    fn seek(&mut self, target: SeekTarget) {
        if self.pos.is_none() || self.sink.is_none() {
            return;
        }
        let to = match target {
            SeekTarget::Absolute(d) => d,
            SeekTarget::Percent(p) => match self.current_duration {
                Some(total) => total.mul_f64((p / 100.0).clamp(0.0, 1.0)),
                None => {
                    tracing::warn!("percent seek ignored: track duration unknown");
                    return;
                }
            },
        };
        // Scrubbing rebuilds the sink and skips into the file.
        self.start_current(to);
    }

    fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
        if let Some(s) = &self.sink {
            s.set_volume(f32::from(self.volume) / 100.0);
        }
    }

    /// (Re)start the active queue slot at `start_at`, replacing any sink.
    fn start_current(&mut self, start_at: Duration) {
        let Some(i) = self.pos else { return };
        let path = self.playlist[i].clone();
        if let Some(s) = self.sink.take() {
            s.stop();
        }
        match create_sink_at(&self.stream, &path, start_at) {
            Ok((sink, total)) => {
                sink.set_volume(f32::from(self.volume) / 100.0);
                if self.paused {
                    self.started_at = None;
                } else {
                    sink.play();
                    self.started_at = Some(Instant::now());
                }
                self.accumulated = start_at;
                self.current_duration = total;
                self.sink = Some(sink);
                self.sink_queued = 1;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not start queue slot");
                self.sink = None;
                self.sink_queued = 0;
                self.started_at = None;
                self.accumulated = Duration::ZERO;
                self.current_duration = None;
                self.emit(EngineEvent::EndOfFile(EndReason::Error));
            }
        }
    }

    /// Pre-queue the slot directly after the active one into the live sink
    /// so the transition plays without a gap.
    fn maybe_preload(&mut self, index: usize) {
        let (Some(sink), Some(pos)) = (&self.sink, self.pos) else {
            return;
        };
        if index != pos + 1 || self.sink_queued != 1 {
            return;
        }
        match open_source(&self.playlist[index], Duration::ZERO) {
            Ok((source, _)) => {
                sink.append(source);
                self.sink_queued = 2;
            }
            Err(e) => tracing::warn!(error = %e, "lookahead preload failed"),
        }
    }

    /// Periodic work: detect source turnover inside the sink (a gapless
    /// transition already happened in the mixer) and publish elapsed time.
    fn tick(&mut self) {
        loop {
            let Some(sink) = &self.sink else { break };
            if self.sink_queued > 1 && sink.len() < self.sink_queued {
                self.sink_queued -= 1;
                self.advance_slot();
                continue;
            }
            if sink.empty() && !self.paused {
                // The last queued source ended with nothing pre-queued.
                self.sink = None;
                self.sink_queued = 0;
                let next = self
                    .pos
                    .map(|i| i + 1)
                    .filter(|&i| i < self.playlist.len());
                match next {
                    Some(i) => {
                        self.pos = Some(i);
                        self.start_current(Duration::ZERO);
                    }
                    None => {
                        self.pos = None;
                        self.started_at = None;
                        self.accumulated = Duration::ZERO;
                        self.current_duration = None;
                    }
                }
                // Publish the advanced queue before the event lands, so a
                // consumer that re-queries the snapshot sees the new slot.
                self.publish();
                self.emit(EngineEvent::EndOfFile(EndReason::Eof));
                self.emit_pos();
            }
            break;
        }

        let elapsed = self.elapsed();
        if self.sink.is_some()
            && !self.paused
            && elapsed.as_secs() != self.last_elapsed.as_secs()
        {
            self.last_elapsed = elapsed;
            let _ = self
                .events
                .try_send(EngineEvent::PropertyChanged(Property::Elapsed(elapsed)));
        }
    }

    /// A pre-queued source took over inside the sink: move to the next slot
    /// and restart the elapsed clock.
    fn advance_slot(&mut self) {
        if let Some(i) = self.pos {
            self.pos = Some(i + 1);
        }
        self.accumulated = Duration::ZERO;
        self.started_at = (!self.paused).then(Instant::now);
        self.current_duration = None;
        self.last_elapsed = Duration::ZERO;
        self.publish();
        self.emit(EngineEvent::EndOfFile(EndReason::Eof));
        self.emit_pos();
    }

    fn elapsed(&self) -> Duration {
        self.accumulated + self.started_at.map_or(Duration::ZERO, |t| t.elapsed())
    }

    /// End-of-file and shutdown must not be lost; block if the channel is
    /// momentarily full.
    fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    /// Queue-position changes are advisory; drop them under backpressure.
    fn emit_pos(&self) {
        let _ = self
            .events
            .try_send(EngineEvent::PropertyChanged(Property::QueuePos(self.pos)));
    }

    fn publish(&self) {
        if let Ok(mut s) = self.shared.lock() {
            s.queue = self.playlist.clone();
            s.pos = self.pos;
            s.elapsed = self.elapsed();
            s.paused = self.paused;
        }
    }
}
