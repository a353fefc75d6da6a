use std::{
    io::Cursor,
    sync::{
        mpsc::{self, Sender},
        Arc, Mutex,
    },
    thread,
};

use anyhow::{anyhow, Result};
use log::{debug, error};
use rodio::{Decoder, OutputStream, Sink};
use tokio::sync::oneshot;

enum AudioCommand {
    Play {
        bytes: Vec<u8>,
        done: oneshot::Sender<Result<(), String>>,
    },
}

/// Plays encoded audio clips (MP3, WAV, ...) on a dedicated thread that owns
/// the non-`Send` rodio output stream. Clips play one after another.
#[derive(Clone)]
pub struct AudioPlayerHandle {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
}

impl AudioPlayerHandle {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|e| anyhow!("audio handle poisoned: {e}"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();

        thread::Builder::new()
            .name("audio-player".to_string())
            .spawn(move || {
                let mut stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                ) -> Result<(), String> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Play { bytes, done } => {
                            let result = ensure_sink(&mut stream, &mut sink).and_then(|_| {
                                let source = Decoder::new(Cursor::new(bytes))
                                    .map_err(|e| format!("Failed to decode audio: {}", e))?;
                                if let Some(ref s) = sink {
                                    s.append(source);
                                    s.sleep_until_end();
                                }
                                Ok(())
                            });

                            if result.is_err() {
                                // Rebuild the device on the next clip.
                                sink = None;
                                stream = None;
                            }
                            if done.send(result).is_err() {
                                debug!("audio caller went away before playback finished");
                            }
                        }
                    }
                }
                debug!("audio player thread exiting");
            })
            .map_err(|e| {
                error!("Failed to spawn audio thread: {e}");
                anyhow!("failed to spawn audio thread: {e}")
            })?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    /// Queues a clip and waits until it has finished playing.
    pub async fn play(&self, bytes: Vec<u8>) -> Result<()> {
        let tx = self.ensure_thread()?;
        let (done, finished) = oneshot::channel();
        tx.send(AudioCommand::Play { bytes, done })
            .map_err(|e| anyhow!("audio thread unavailable: {e}"))?;

        finished
            .await
            .map_err(|_| anyhow!("audio thread stopped during playback"))?
            .map_err(|e| anyhow!(e))
    }
}

impl Default for AudioPlayerHandle {
    fn default() -> Self {
        Self::new()
    }
}
