pub mod chime;

use chime::WarningChime;

use rodio::{Decoder, OutputStream, Sink};
use std::{
    fs::File,
    io::BufReader,
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::{self, Sender},
        Arc, Mutex,
    },
    thread,
};

use crate::alert::CuePlayer;

enum AudioCommand {
    PlayCue,
    SetVolume(f32),
}

/// Plays the alert cue on a dedicated thread that owns the output device.
///
/// The thread and the device are opened lazily on the first command, so an
/// app without speakers only fails when a cue is actually requested.
pub struct AlertAudioHandle {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
    sound_path: Option<PathBuf>,
    volume: f32,
    threads_started: AtomicUsize,
}

impl AlertAudioHandle {
    pub fn new(sound_path: Option<PathBuf>, volume: f32) -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
            sound_path,
            volume: volume.clamp(0.0, 1.0),
            threads_started: AtomicUsize::new(0),
        }
    }

    /// The guard is held until the sender is stored, so concurrent first
    /// calls share one audio thread.
    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
        let mut guard = self.tx.lock().map_err(|e| e.to_string())?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        let sound_path = self.sound_path.clone();
        let initial_volume = self.volume;

        // Spawn dedicated audio thread holding non-Send audio objects
        thread::Builder::new()
            .name("alert-audio".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;
                let mut volume = initial_volume;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                    volume: f32,
                ) -> Result<(), String> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                        new_sink.set_volume(volume);
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::PlayCue => {
                            if let Err(err) = ensure_sink(&mut _stream, &mut sink, volume) {
                                log::warn!("Alert cue skipped: {err}");
                                continue;
                            }
                            if let Some(ref s) = sink {
                                if queue_cue(s, sound_path.as_ref()) {
                                    s.play();
                                } else {
                                    log::debug!("Alert cue still sounding; not queueing another");
                                }
                            }
                        }
                        AudioCommand::SetVolume(v) => {
                            volume = v.clamp(0.0, 1.0);
                            if let Some(ref s) = sink {
                                s.set_volume(volume);
                            }
                        }
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        self.threads_started.fetch_add(1, Ordering::SeqCst);
        *guard = Some(tx.clone());
        Ok(tx)
    }

    #[cfg(test)]
    fn threads_started(&self) -> usize {
        self.threads_started.load(Ordering::SeqCst)
    }

    pub fn play_cue(&self) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(AudioCommand::PlayCue).map_err(|e| e.to_string())
    }

    pub fn set_volume(&self, volume: f32) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(AudioCommand::SetVolume(volume))
            .map_err(|e| e.to_string())
    }
}

/// Appends the configured sound file, falling back to the built-in chime.
///
/// Cues never queue behind each other: while one is still sounding the new
/// request is dropped and `false` is returned.
fn queue_cue(sink: &Sink, sound_path: Option<&PathBuf>) -> bool {
    if !sink.empty() {
        return false;
    }
    if let Some(path) = sound_path {
        let decoded = File::open(path)
            .map_err(|e| e.to_string())
            .and_then(|file| Decoder::new(BufReader::new(file)).map_err(|e| e.to_string()));
        match decoded {
            Ok(source) => {
                sink.append(source);
                return true;
            }
            Err(err) => log::warn!(
                "Cannot play alert sound {}: {err}; using built-in chime",
                path.display()
            ),
        }
    }
    sink.append(WarningChime::new());
    true
}

impl CuePlayer for AlertAudioHandle {
    fn play_cue(&self) -> anyhow::Result<()> {
        AlertAudioHandle::play_cue(self).map_err(|err| anyhow::anyhow!(err))
    }
}
