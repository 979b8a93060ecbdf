mod common;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use common::{Script, ScriptedChat};
use murmur_chat::voice::SilenceDetector;
use murmur_chat::{
    AudioPlayer, ChatSession, SpeechRecognizer, TranscriptStream, VoiceLoop, VoicePhase,
    VoiceSettings, VoiceTurn, VoiceTurnOutcome,
};
use murmur_llm::SpeechClient;
use murmur_persist::{InMemoryPersistenceClient, PersistenceClient};
use tokio::sync::watch;
use tokio::time::Instant;

/// Records which phase the loop was in when each collaborator was called
#[derive(Default)]
struct PhaseProbe {
    rx: Mutex<Option<watch::Receiver<VoicePhase>>>,
    seen: Mutex<Vec<(&'static str, VoicePhase)>>,
}

impl PhaseProbe {
    fn record(&self, call: &'static str) {
        let phase = self
            .rx
            .lock()
            .unwrap()
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or_default();
        self.seen.lock().unwrap().push((call, phase));
    }

    fn seen(&self) -> Vec<(&'static str, VoicePhase)> {
        self.seen.lock().unwrap().clone()
    }
}

/// Each utterance is a list of (delay before update in ms, transcript so far).
/// After the last update the stream stays open, like a live microphone.
struct ScriptedRecognizer {
    permissions: Mutex<VecDeque<bool>>,
    utterances: Mutex<VecDeque<Vec<(u64, &'static str)>>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
    probe: Arc<PhaseProbe>,
}

impl ScriptedRecognizer {
    fn new(probe: Arc<PhaseProbe>, utterances: Vec<Vec<(u64, &'static str)>>) -> Self {
        Self {
            permissions: Mutex::new(VecDeque::new()),
            utterances: Mutex::new(utterances.into()),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            probe,
        }
    }

    /// Answers for successive `authorize` calls; granted once exhausted
    fn with_permissions(self, answers: Vec<bool>) -> Self {
        *self.permissions.lock().unwrap() = answers.into();
        self
    }
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn authorize(&self) -> bool {
        self.permissions.lock().unwrap().pop_front().unwrap_or(true)
    }

    async fn start(&self) -> Result<TranscriptStream> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.probe.record("start");
        let updates = self.utterances.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::pin(async_stream::stream! {
            for (delay, text) in updates {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                yield text.to_string();
            }
            futures::future::pending::<()>().await;
        }))
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakeSpeech {
    fail: bool,
    texts: Mutex<Vec<String>>,
    probe: Arc<PhaseProbe>,
}

#[async_trait]
impl SpeechClient for FakeSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.probe.record("synthesize");
        self.texts.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(anyhow!("TTS API error (403): forbidden"));
        }
        Ok(text.as_bytes().to_vec())
    }
}

#[derive(Default)]
struct FakePlayer {
    played: Mutex<Vec<Vec<u8>>>,
    stops: AtomicUsize,
    probe: Arc<PhaseProbe>,
}

#[async_trait]
impl AudioPlayer for FakePlayer {
    async fn play(&self, audio: Vec<u8>) -> Result<()> {
        self.probe.record("play");
        tokio::time::sleep(Duration::from_millis(300)).await;
        self.played.lock().unwrap().push(audio);
        Ok(())
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    voice: VoiceLoop,
    chat: Arc<ScriptedChat>,
    recognizer: Arc<ScriptedRecognizer>,
    speech: Arc<FakeSpeech>,
    player: Arc<FakePlayer>,
    probe: Arc<PhaseProbe>,
    store: Arc<InMemoryPersistenceClient>,
    conversation_id: String,
}

async fn harness(
    replies: Vec<Script>,
    utterances: Vec<Vec<(u64, &'static str)>>,
    permissions: Vec<bool>,
    tts_fails: bool,
) -> Harness {
    let probe = Arc::new(PhaseProbe::default());
    let store = Arc::new(InMemoryPersistenceClient::new());
    let chat = Arc::new(ScriptedChat::new(replies).with_title("Voice Chat"));
    {
        let probe = probe.clone();
        chat.on_stream(move || probe.record("chat"));
    }
    let session = Arc::new(ChatSession::start(chat.clone(), store.clone()).await.unwrap());
    let conversation_id = session.conversation_id().to_string();

    let recognizer =
        Arc::new(ScriptedRecognizer::new(probe.clone(), utterances).with_permissions(permissions));
    let speech = Arc::new(FakeSpeech {
        fail: tts_fails,
        texts: Mutex::new(Vec::new()),
        probe: probe.clone(),
    });
    let player = Arc::new(FakePlayer {
        probe: probe.clone(),
        ..Default::default()
    });

    let voice = VoiceLoop::new(session, recognizer.clone(), speech.clone(), player.clone());
    *probe.rx.lock().unwrap() = Some(voice.subscribe());

    Harness {
        voice,
        chat,
        recognizer,
        speech,
        player,
        probe,
        store,
        conversation_id,
    }
}

fn assert_elapsed(start: Instant, expected: Duration) {
    let elapsed = start.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(20),
        "elapsed {:?}, expected {:?}",
        elapsed,
        expected
    );
}

fn transcript_stream(updates: Vec<(u64, &'static str)>, stay_open: bool) -> TranscriptStream {
    Box::pin(async_stream::stream! {
        for (delay, text) in updates {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            yield text.to_string();
        }
        if stay_open {
            futures::future::pending::<()>().await;
        }
    })
}

#[tokio::test(start_paused = true)]
async fn test_silence_waits_for_quiet_after_last_change() {
    let detector = SilenceDetector::new(Duration::from_millis(1500));
    let mut stream = transcript_stream(
        vec![(0, "what"), (400, "what is"), (400, "what is rust")],
        true,
    );

    let start = Instant::now();
    let heard = detector.wait_for_utterance(&mut stream).await;

    assert_eq!(heard.as_deref(), Some("what is rust"));
    // last change at 800ms, then 1.5s of silence
    assert_elapsed(start, Duration::from_millis(2300));
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_and_blank_updates_do_not_rearm() {
    let detector = SilenceDetector::new(Duration::from_millis(1500));
    let mut stream = transcript_stream(
        vec![(0, "hello"), (1000, "hello"), (200, "  "), (100, "hello")],
        true,
    );

    let start = Instant::now();
    let heard = detector.wait_for_utterance(&mut stream).await;

    assert_eq!(heard.as_deref(), Some("hello"));
    assert_elapsed(start, Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn test_stream_end_settles_utterance() {
    let detector = SilenceDetector::default();

    let mut empty = transcript_stream(vec![(100, ""), (100, " ")], false);
    assert_eq!(detector.wait_for_utterance(&mut empty).await, None);

    let mut closed = transcript_stream(vec![(0, "bye")], false);
    let start = Instant::now();
    assert_eq!(detector.wait_for_utterance(&mut closed).await.as_deref(), Some("bye"));
    assert_elapsed(start, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_turn_walks_phases_in_order() {
    let h = harness(
        vec![Script::Reply(vec!["Rust is ", "a language."])],
        vec![vec![(0, "what"), (300, "what is rust")]],
        vec![],
        false,
    )
    .await;

    let outcome = h.voice.run_turn().await.unwrap();

    assert_eq!(
        outcome,
        VoiceTurnOutcome::Completed(VoiceTurn {
            transcript: "what is rust".into(),
            reply: "Rust is a language.".into(),
            spoken: true,
        })
    );
    assert_eq!(
        h.probe.seen(),
        vec![
            ("start", VoicePhase::Listening),
            ("chat", VoicePhase::Sending),
            ("synthesize", VoicePhase::AwaitingResponse),
            ("play", VoicePhase::Speaking),
        ]
    );
    assert_eq!(h.voice.phase(), VoicePhase::Idle);
    assert_eq!(h.recognizer.stops.load(Ordering::SeqCst), 1);
    assert_eq!(*h.player.played.lock().unwrap(), vec![b"Rust is a language.".to_vec()]);

    let stored = h.store.get_messages(&h.conversation_id).await.unwrap();
    assert_eq!(stored[0].content, "what is rust");
    assert_eq!(stored[1].content, "Rust is a language.");
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_never_listens() {
    let h = harness(vec![], vec![], vec![false], false).await;

    let outcome = h.voice.run_turn().await.unwrap();

    assert_eq!(outcome, VoiceTurnOutcome::PermissionDenied);
    assert_eq!(h.recognizer.starts.load(Ordering::SeqCst), 0);
    assert_eq!(h.chat.stream_calls(), 0);
    assert_eq!(h.voice.phase(), VoicePhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_empty_reply_skips_speech() {
    let h = harness(
        vec![Script::Reply(vec![])],
        vec![vec![(0, "hello?")]],
        vec![],
        false,
    )
    .await;

    let outcome = h.voice.run_turn().await.unwrap();

    assert!(matches!(outcome, VoiceTurnOutcome::Completed(VoiceTurn { spoken: false, .. })));
    assert!(h.speech.texts.lock().unwrap().is_empty());
    assert!(h.player.played.lock().unwrap().is_empty());
    assert_eq!(h.voice.phase(), VoicePhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_tts_failure_is_logged_and_turn_ends_idle() {
    let h = harness(
        vec![Script::Reply(vec!["Hi there"])],
        vec![vec![(0, "hi")]],
        vec![],
        true,
    )
    .await;

    let outcome = h.voice.run_turn().await.unwrap();

    assert!(matches!(outcome, VoiceTurnOutcome::Completed(VoiceTurn { spoken: false, .. })));
    assert_eq!(*h.speech.texts.lock().unwrap(), vec!["Hi there".to_string()]);
    assert!(h.player.played.lock().unwrap().is_empty());
    assert_eq!(h.voice.phase(), VoicePhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_run_resumes_listening_until_permission_revoked() {
    let h = harness(
        vec![Script::Reply(vec!["One"]), Script::Reply(vec!["Two"])],
        vec![vec![(0, "first")], vec![(0, "second")]],
        vec![true, true, false],
        false,
    )
    .await;
    let voice = h.voice.with_settings(VoiceSettings {
        silence_timeout: Duration::from_millis(1500),
        resume_delay: Duration::from_secs(1),
    });

    let start = Instant::now();
    voice.run(futures::future::pending()).await.unwrap();

    assert_eq!(h.chat.stream_calls(), 2);
    assert_eq!(h.player.played.lock().unwrap().len(), 2);
    // two turns of 1.5s silence + 0.3s playback, each followed by the resume delay
    assert_elapsed(start, Duration::from_millis(2 * (1500 + 300 + 1000)));
    assert_eq!(voice.phase(), VoicePhase::Idle);
    assert!(h.player.stops.load(Ordering::SeqCst) >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_listening() {
    let h = harness(vec![], vec![vec![]], vec![], false).await;

    let start = Instant::now();
    h.voice
        .run(tokio::time::sleep(Duration::from_secs(30)))
        .await
        .unwrap();

    assert_elapsed(start, Duration::from_secs(30));
    assert_eq!(h.chat.stream_calls(), 0);
    assert_eq!(h.voice.phase(), VoicePhase::Idle);
    assert!(h.recognizer.stops.load(Ordering::SeqCst) >= 1);
}
