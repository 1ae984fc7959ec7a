use async_trait::async_trait;
use readaloud_backend::domain::backend::{BackendDescriptor, SpeechBackend};
use parking_lot::Mutex;
use readaloud_backend::domain::tts::{BackendError, Language, Speed};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-process speech backend answering with a short WAV tone
pub struct StubBackend {
    descriptor: BackendDescriptor,
    /// Calls that succeed before every further call fails
    succeed_for: Option<usize>,
    error: BackendError,
    calls: AtomicUsize,
    speeds: Mutex<Vec<Speed>>,
}

impl StubBackend {
    pub fn speaking(id: &str, priority: u32) -> Self {
        Self {
            descriptor: BackendDescriptor::new(id, id, priority),
            succeed_for: None,
            error: BackendError::Unavailable("stub failure".to_string()),
            calls: AtomicUsize::new(0),
            speeds: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(id: &str, priority: u32, error: BackendError) -> Self {
        Self {
            succeed_for: Some(0),
            error,
            ..Self::speaking(id, priority)
        }
    }

    /// Succeeds `calls` times, then fails as unavailable
    pub fn failing_after(mut self, calls: usize) -> Self {
        self.succeed_for = Some(calls);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Speed of every call, in call order
    pub fn speeds(&self) -> Vec<Speed> {
        self.speeds.lock().clone()
    }
}

#[async_trait]
impl SpeechBackend for StubBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn synthesize(
        &self,
        _text: &str,
        _language: &Language,
        speed: Speed,
    ) -> Result<Vec<u8>, BackendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.speeds.lock().push(speed);
        match self.succeed_for {
            Some(limit) if call >= limit => Err(self.error.clone()),
            _ => Ok(tone_wav()),
        }
    }
}

/// 50 ms of 16 kHz mono audio
fn tone_wav() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..800 {
            writer.write_sample(if i % 2 == 0 { 1000i16 } else { -1000 }).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
