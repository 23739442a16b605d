use super::scheduler::{deliver_due_reminders, reminder_text, ChannelNotifier};
use super::*;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sauti_core::{
    context::{Completion, Context, Source},
    message::{Attachment, OutgoingMessage},
    records::{NewReminder, Quote, Reminder},
    traits::Notifier,
    turn::{Part, Role},
};
use sauti_memory::Store;
use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;
use uuid::Uuid;

// --- fakes ---

#[derive(Default)]
struct ScriptedProvider {
    replies: StdMutex<VecDeque<Result<Completion, SautiError>>>,
    calls: StdMutex<Vec<Context>>,
    delay_ms: u64,
    /// Panic when the latest user text equals this.
    panic_on: Option<&'static str>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Result<Completion, SautiError>>) -> Self {
        Self {
            replies: StdMutex::new(replies.into()),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Context> {
        self.calls.lock().unwrap().clone()
    }
}

fn reply(text: &str) -> Result<Completion, SautiError> {
    Ok(Completion {
        text: text.to_string(),
        ..Default::default()
    })
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn requires_api_key(&self) -> bool {
        false
    }

    async fn complete(&self, context: &Context) -> Result<Completion, SautiError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if let (Some(trigger), Some(last)) = (self.panic_on, context.history.last()) {
            if last.text() == trigger {
                panic!("provider blew up");
            }
        }
        self.calls.lock().unwrap().push(context.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| reply("ok"))
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct RecordingChannel {
    sent: StdMutex<Vec<OutgoingMessage>>,
    audio: StdMutex<Vec<(String, usize)>>,
}

impl RecordingChannel {
    fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.text.clone())
            .collect()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "test"
    }

    async fn start(&self) -> Result<mpsc::Receiver<IncomingMessage>, SautiError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), SautiError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn send_audio(&self, target: &str, audio: &[u8]) -> Result<(), SautiError> {
        self.audio
            .lock()
            .unwrap()
            .push((target.to_string(), audio.len()));
        Ok(())
    }

    async fn stop(&self) -> Result<(), SautiError> {
        Ok(())
    }
}

#[derive(Default)]
struct FakeSearch {
    links: Vec<String>,
}

#[async_trait]
impl SearchBackend for FakeSearch {
    async fn images(&self, query: &str, animated: bool) -> Result<Vec<String>, SautiError> {
        let ext = if animated { "gif" } else { "jpg" };
        Ok(vec![format!("https://img.example/{}.{ext}", query.replace(' ', "-"))])
    }

    async fn videos(&self, _query: &str) -> Result<Vec<String>, SautiError> {
        Ok(vec!["https://www.youtube.com/watch?v=abc".to_string()])
    }

    async fn links(&self, _query: &str, limit: usize) -> Result<Vec<String>, SautiError> {
        Ok(self.links.iter().take(limit).cloned().collect())
    }
}

#[derive(Default)]
struct FakeMarket {
    asked: StdMutex<Vec<String>>,
}

#[async_trait]
impl MarketData for FakeMarket {
    async fn latest_close(&self, symbol: &str) -> Result<Option<Quote>, SautiError> {
        self.asked.lock().unwrap().push(symbol.to_string());
        Ok(Some(Quote {
            symbol: symbol.to_string(),
            price: 17.45,
            currency: "KES".into(),
        }))
    }
}

#[derive(Default)]
struct FakeExtractor {
    urls: StdMutex<Vec<String>>,
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract_url(&self, url: &str) -> Result<String, SautiError> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(format!(
            "--- WEBSITE CONTENT START ({url}) ---\npage body\n--- WEBSITE CONTENT END ---"
        ))
    }

    async fn extract_document(&self, data: &[u8], mime_type: &str) -> Result<String, SautiError> {
        Ok(format!(
            "--- START OF DOCUMENT ({mime_type}) ---\n{}\n--- END OF DOCUMENT ---",
            String::from_utf8_lossy(data)
        ))
    }
}

struct FakeSpeech;

#[async_trait]
impl Speech for FakeSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SautiError> {
        Ok(vec![0u8; text.len()])
    }
}

#[derive(Default)]
struct RecordingNotifier {
    delivered: StdMutex<Vec<Reminder>>,
    fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, reminder: &Reminder) -> Result<(), SautiError> {
        if self.fail {
            return Err(SautiError::Channel("gone".into()));
        }
        self.delivered.lock().unwrap().push(reminder.clone());
        Ok(())
    }
}

// --- harness ---

struct Harness {
    gateway: Arc<Gateway>,
    store: Arc<Store>,
    provider: Arc<ScriptedProvider>,
    channel: Arc<RecordingChannel>,
    market: Arc<FakeMarket>,
    extractor: Arc<FakeExtractor>,
}

async fn harness_with(provider: ScriptedProvider, search: FakeSearch) -> Harness {
    let store = Arc::new(Store::in_memory(30).await.unwrap());
    let provider = Arc::new(provider);
    let channel = Arc::new(RecordingChannel::default());
    let market = Arc::new(FakeMarket::default());
    let extractor = Arc::new(FakeExtractor::default());

    let mut channels: HashMap<String, Arc<dyn Channel>> = HashMap::new();
    channels.insert("test".to_string(), channel.clone());

    let backends = Backends {
        provider: provider.clone(),
        profiles: store.clone(),
        history: store.clone(),
        reminders: store.clone(),
        search: Arc::new(search),
        market: market.clone(),
        extractor: extractor.clone(),
        speech: Some(Arc::new(FakeSpeech)),
    };
    let gateway = Arc::new(Gateway::new(backends, channels, Settings::default()));

    Harness {
        gateway,
        store,
        provider,
        channel,
        market,
        extractor,
    }
}

async fn harness(replies: Vec<Result<Completion, SautiError>>) -> Harness {
    harness_with(ScriptedProvider::new(replies), FakeSearch::default()).await
}

fn message(text: &str) -> IncomingMessage {
    IncomingMessage {
        id: Uuid::new_v4(),
        channel: "test".into(),
        sender_id: "u1".into(),
        sender_name: Some("Amina".into()),
        text: text.into(),
        timestamp: Utc::now(),
        attachment: None,
        reply_target: Some("chat-1".into()),
    }
}

// --- pipeline ---

#[tokio::test]
async fn test_new_fact_end_to_end() {
    let h = harness(vec![
        reply("What a lovely name for a dog! [NEW_FACT]"),
        reply("user's dog is named Rex"),
    ])
    .await;

    h.gateway
        .handle_message(message("My dog's name is Rex"))
        .await;

    // Delivered text carries no sentinel.
    let sent = h.channel.texts();
    assert_eq!(sent, vec!["What a lovely name for a dog!".to_string()]);

    // The extraction call sees only the triggering message.
    let calls = h.provider.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].history.len(), 1);
    assert_eq!(calls[1].history[0].role(), Role::User);
    assert_eq!(calls[1].history[0].text(), "My dog's name is Rex");
    assert!(!calls[1].grounding);

    let profile = h.store.get_profile("u1").await.unwrap();
    assert_eq!(profile.facts, vec!["user's dog is named Rex".to_string()]);

    let history = h.store.load_history("u1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].text(), "What a lovely name for a dog!");
}

#[tokio::test]
async fn test_known_fact_is_not_duplicated() {
    let h = harness(vec![
        reply("Nice! [NEW_FACT]"),
        reply("user's dog is named Rex"),
        reply("Still nice! [NEW_FACT]"),
        reply("user's dog is named Rex"),
    ])
    .await;

    h.gateway.handle_message(message("My dog is Rex")).await;
    h.gateway.handle_message(message("Rex is my dog")).await;

    let profile = h.store.get_profile("u1").await.unwrap();
    assert_eq!(profile.facts.len(), 1);
}

#[tokio::test]
async fn test_prompt_carries_profile_and_history() {
    let h = harness(vec![reply("Hi!"), reply("Again!")]).await;
    h.store.add_fact("u1", "user lives in Kisumu").await.unwrap();

    h.gateway.handle_message(message("Hello")).await;
    h.gateway.handle_message(message("Hello again")).await;

    let calls = h.provider.calls();
    assert!(calls[0].system_prompt.contains("user lives in Kisumu"));
    assert!(calls[0].grounding);
    // Second call sees both earlier turns plus the new message.
    assert_eq!(calls[1].history.len(), 3);
    assert_eq!(calls[1].history[0].text(), "Hello");
    assert_eq!(calls[1].history[1].text(), "Hi!");
    assert_eq!(calls[1].history[2].text(), "Hello again");
}

#[tokio::test]
async fn test_generation_failure_keeps_user_turn_only() {
    let h = harness(vec![Err(SautiError::Provider("503".into()))]).await;

    h.gateway.handle_message(message("Are you there?")).await;

    assert_eq!(
        h.channel.texts(),
        vec![fallback::GENERATION_FALLBACK.to_string()]
    );
    let history = h.store.load_history("u1").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role(), Role::User);
    assert_eq!(history[0].text(), "Are you there?");
}

#[tokio::test]
async fn test_remind_directive_creates_reminder() {
    let h = harness(vec![reply(
        "Sure thing! [REMIND: in 10 minutes | drink water]",
    )])
    .await;
    let before = Utc::now();

    h.gateway.handle_message(message("remind me to drink water in 10 minutes")).await;

    let pending = h.store.reminders_for("u1").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].text, "drink water");
    assert_eq!(pending[0].channel, "test");
    assert_eq!(pending[0].channel_id, "chat-1");
    let offset = pending[0].due_at - before;
    // Stored timestamps have second precision.
    assert!(offset >= Duration::seconds(599) && offset < Duration::minutes(11));

    let sent = h.channel.texts().join("\n");
    assert!(sent.starts_with("Sure thing!"));
    assert!(sent.contains("Reminder set (in 10 minutes): drink water"));
    assert!(!sent.contains("[REMIND"));
}

#[tokio::test]
async fn test_unparseable_remind_creates_nothing() {
    let h = harness(vec![reply("Okay! [REMIND: whenever | chill]")]).await;

    h.gateway.handle_message(message("remind me to chill")).await;

    assert!(h.store.reminders_for("u1").await.unwrap().is_empty());
    let sent = h.channel.texts().join("\n");
    assert!(sent.contains("couldn't understand"));
}

#[tokio::test]
async fn test_second_remind_stays_literal() {
    let h = harness(vec![reply(
        "[REMIND: in 5 minutes | stretch] and [REMIND: in 1 hour | eat]",
    )])
    .await;

    h.gateway.handle_message(message("two reminders please")).await;

    let pending = h.store.reminders_for("u1").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].text, "stretch");
    assert!(h.channel.texts()[0].contains("[REMIND: in 1 hour | eat]"));
}

#[tokio::test]
async fn test_stock_and_media_substitutions_in_kind_order() {
    let h = harness(vec![reply(
        "Here you go [STOCK: SCOM] [GIF: money rain]",
    )])
    .await;

    h.gateway.handle_message(message("how is safaricom doing")).await;

    assert_eq!(*h.market.asked.lock().unwrap(), vec!["SCOM.NR".to_string()]);
    let sent = h.channel.texts().join("\n");
    let lines: Vec<&str> = sent.lines().collect();
    assert_eq!(lines[0], "Here you go");
    assert_eq!(lines[1], "https://img.example/money-rain.gif");
    assert_eq!(lines[2], "📈 **SCOM.NR Price:** 17.45 KES");
}

#[tokio::test]
async fn test_sources_footer_delivered_not_persisted() {
    let h = harness(vec![Ok(Completion {
        text: "Nairobi is sunny today.".into(),
        sources: vec![Source {
            url: "https://weather.example/nbo".into(),
            title: "Weather".into(),
        }],
        ..Default::default()
    })])
    .await;

    h.gateway.handle_message(message("weather?")).await;

    let sent = h.channel.texts().join("\n");
    assert!(sent.contains("Sources:\n- Weather (https://weather.example/nbo)"));
    let history = h.store.load_history("u1").await.unwrap();
    assert_eq!(history[1].text(), "Nairobi is sunny today.");
}

#[tokio::test]
async fn test_long_reply_is_chunked() {
    let long = "a".repeat(4500);
    let h = harness(vec![reply(&long)]).await;

    h.gateway.handle_message(message("write a lot")).await;

    let sent = h.channel.texts();
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|c| c.chars().count() <= 2000));
    assert_eq!(sent.concat(), long);
}

#[tokio::test]
async fn test_sentinel_only_reply_gets_short_acknowledgement() {
    let h = harness(vec![reply("[NEW_FACT]"), reply("NONE")]).await;

    h.gateway.handle_message(message("I like tea")).await;

    assert_eq!(h.channel.texts(), vec![fallback::EMPTY_REPLY.to_string()]);
    assert!(h.store.get_profile("u1").await.unwrap().facts.is_empty());
}

#[tokio::test]
async fn test_url_is_read_into_user_turn() {
    let h = harness(vec![reply("Summary here.")]).await;

    h.gateway
        .handle_message(message("summarize https://news.example/story please"))
        .await;

    assert_eq!(
        *h.extractor.urls.lock().unwrap(),
        vec!["https://news.example/story".to_string()]
    );
    let calls = h.provider.calls();
    let user_turn = calls[0].history.last().unwrap();
    assert_eq!(user_turn.parts().len(), 2);
    assert!(user_turn.text().contains("WEBSITE CONTENT START"));
}

#[tokio::test]
async fn test_image_attachment_goes_as_media() {
    let h = harness(vec![reply("Cute cat!")]).await;
    let mut msg = message("[Photo]");
    msg.attachment = Some(Attachment {
        mime_type: "image/jpeg".into(),
        data: vec![0xFF, 0xD8, 0xFF],
        filename: None,
    });

    h.gateway.handle_message(msg).await;

    let calls = h.provider.calls();
    let parts = calls[0].history.last().unwrap().parts();
    assert!(parts
        .iter()
        .any(|p| matches!(p, Part::Media { mime_type, .. } if mime_type == "image/jpeg")));
}

#[tokio::test]
async fn test_voice_mode_sends_audio_after_text() {
    let h = harness(vec![reply("**Habari!** [GIF: wave]")]).await;
    h.store.set_voice_mode("u1", true).await.unwrap();

    h.gateway.handle_message(message("hello")).await;

    assert_eq!(h.channel.texts().len(), 1);
    let audio = h.channel.audio.lock().unwrap();
    assert_eq!(audio.len(), 1);
    assert_eq!(audio[0].0, "chat-1");
    assert!(audio[0].1 > 0);
}

#[tokio::test]
async fn test_commands_skip_the_model() {
    let h = harness(vec![]).await;

    h.gateway.handle_message(message("/facts")).await;

    assert!(h.provider.calls().is_empty());
    assert!(h.channel.texts()[0].contains("don't know anything"));
}

#[tokio::test]
async fn test_research_command() {
    let search = FakeSearch {
        links: vec![
            "https://a.example/1".into(),
            "https://b.example/2".into(),
            "https://c.example/3".into(),
            "https://d.example/4".into(),
        ],
    };
    let h = harness_with(
        ScriptedProvider::new(vec![reply("**Solar in Kenya** report")]),
        search,
    )
    .await;

    h.gateway
        .handle_message(message("/research solar in kenya"))
        .await;

    assert_eq!(h.extractor.urls.lock().unwrap().len(), 3);
    let calls = h.provider.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].history[0].text().starts_with("RESEARCH TOPIC: solar in kenya"));
    assert_eq!(h.channel.texts(), vec!["**Solar in Kenya** report".to_string()]);
}

#[tokio::test]
async fn test_research_without_sources() {
    let h = harness(vec![]).await;
    h.gateway.handle_message(message("/research nothing")).await;
    assert_eq!(
        h.channel.texts(),
        vec![fallback::RESEARCH_NO_SOURCES.to_string()]
    );
}

#[tokio::test]
async fn test_same_sender_turns_do_not_interleave() {
    let provider = ScriptedProvider {
        replies: StdMutex::new(vec![reply("first"), reply("second")].into()),
        delay_ms: 30,
        ..Default::default()
    };
    let h = harness_with(provider, FakeSearch::default()).await;

    let a = h.gateway.clone().dispatch_message(message("one"));
    let b = h.gateway.clone().dispatch_message(message("two"));
    tokio::join!(a, b);

    let texts: Vec<String> = h
        .store
        .load_history("u1")
        .await
        .unwrap()
        .iter()
        .map(|t| t.text())
        .collect();
    assert_eq!(texts, vec!["one", "first", "two", "second"]);
    assert!(h.gateway.active_senders.lock().await.is_empty());
}

#[tokio::test]
async fn test_out_of_range_remind_keeps_sender_served() {
    let h = harness(vec![
        reply("On it! [REMIND: in 100000000 days | x]"),
        reply("Hello back!"),
    ])
    .await;

    h.gateway
        .clone()
        .dispatch_message(message("remind me much later"))
        .await;
    h.gateway.clone().dispatch_message(message("hi")).await;

    let sent = h.channel.texts();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].starts_with("On it!"));
    assert!(sent[0].contains("couldn't understand"));
    assert_eq!(sent[1], "Hello back!");
    assert!(h.store.reminders_for("u1").await.unwrap().is_empty());
    assert_eq!(h.store.load_history("u1").await.unwrap().len(), 4);
    assert!(h.gateway.active_senders.lock().await.is_empty());
}

#[tokio::test]
async fn test_panicking_turn_releases_sender() {
    let provider = ScriptedProvider {
        panic_on: Some("boom"),
        ..Default::default()
    };
    let h = harness_with(provider, FakeSearch::default()).await;

    let a = h.gateway.clone().dispatch_message(message("boom"));
    let b = h.gateway.clone().dispatch_message(message("hi"));
    tokio::join!(a, b);

    // The buffered message is still answered after the first turn dies.
    assert_eq!(h.channel.texts(), vec!["ok".to_string()]);
    assert!(h.gateway.active_senders.lock().await.is_empty());

    h.gateway.clone().dispatch_message(message("still there?")).await;
    assert_eq!(h.channel.texts().len(), 2);
}

#[tokio::test]
async fn test_same_sender_on_two_channels_is_serialized() {
    let provider = ScriptedProvider {
        replies: StdMutex::new(vec![reply("first"), reply("second")].into()),
        delay_ms: 30,
        ..Default::default()
    };
    let h = harness_with(provider, FakeSearch::default()).await;

    let mut elsewhere = message("two");
    elsewhere.channel = "console".into();
    let a = h.gateway.clone().dispatch_message(message("one"));
    let b = h.gateway.clone().dispatch_message(elsewhere);
    tokio::join!(a, b);

    // The second call already sees the first exchange.
    let calls = h.provider.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].history.len(), 3);
    assert_eq!(calls[1].history[1].text(), "first");
}

// --- scheduler ---

async fn seed_reminder(store: &Store, due_at: chrono::DateTime<Utc>) -> String {
    store
        .create_reminder(&NewReminder {
            owner_id: "u1".into(),
            channel: "test".into(),
            channel_id: "chat-1".into(),
            due_at,
            text: "drink water".into(),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_scheduler_delivers_due_reminder_once() {
    let store = Store::in_memory(30).await.unwrap();
    let now = Utc::now();
    seed_reminder(&store, now - Duration::seconds(5)).await;
    let notifier = RecordingNotifier::default();

    let delivered = deliver_due_reminders(&store, &notifier, now).await;

    assert_eq!(delivered, 1);
    assert_eq!(notifier.delivered.lock().unwrap().len(), 1);
    assert!(store.due_reminders(now).await.unwrap().is_empty());
    assert!(store.reminders_for("u1").await.unwrap().is_empty());

    // A second tick finds nothing.
    assert_eq!(deliver_due_reminders(&store, &notifier, now).await, 0);
    assert_eq!(notifier.delivered.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_scheduler_leaves_future_reminders() {
    let store = Store::in_memory(30).await.unwrap();
    let now = Utc::now();
    seed_reminder(&store, now + Duration::minutes(5)).await;
    let notifier = RecordingNotifier::default();

    assert_eq!(deliver_due_reminders(&store, &notifier, now).await, 0);
    assert_eq!(store.reminders_for("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_scheduler_drops_undeliverable_reminder() {
    let store = Store::in_memory(30).await.unwrap();
    let now = Utc::now();
    seed_reminder(&store, now - Duration::seconds(1)).await;
    let notifier = RecordingNotifier {
        fail: true,
        ..Default::default()
    };

    assert_eq!(deliver_due_reminders(&store, &notifier, now).await, 0);
    assert!(store.reminders_for("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_channel_notifier_routes_to_stored_destination() {
    let channel = Arc::new(RecordingChannel::default());
    let mut channels: HashMap<String, Arc<dyn Channel>> = HashMap::new();
    channels.insert("test".into(), channel.clone());
    let notifier = ChannelNotifier::new(channels);

    let reminder = Reminder {
        id: "r1".into(),
        owner_id: "u1".into(),
        channel: "test".into(),
        channel_id: "chat-9".into(),
        due_at: Utc::now(),
        text: "drink water".into(),
        status: sauti_core::records::ReminderStatus::Pending,
    };
    notifier.deliver(&reminder).await.unwrap();

    let sent = channel.sent.lock().unwrap();
    assert_eq!(sent[0].text, reminder_text(&reminder));
    assert_eq!(sent[0].text, "⏰ Reminder: drink water");
    assert_eq!(sent[0].reply_target.as_deref(), Some("chat-9"));

    let missing = Reminder {
        channel: "whatsapp".into(),
        ..reminder.clone()
    };
    assert!(notifier.deliver(&missing).await.is_err());
}
