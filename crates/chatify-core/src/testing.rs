//! In-memory doubles shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::cache::LocalCache;
use crate::clock::Clock;
use crate::compose::{AudioRecorder, MessageSink, RecordedAudio};
use crate::device::{Capability, DeviceCapabilities, MediaFile, Permission};
use crate::models::{
    sort_newest_first, Author, Coordinates, DeliveryState, Message, MessageId, Payload,
};
use crate::remote::{snapshot_channel, RemoteLog, SnapshotPublisher, Subscription};
use crate::storage::{BlobStore, ObjectHandle};
use crate::sync::{Outbox, OutboxEntry};
use crate::{Error, Result};

pub fn author() -> Author {
    Author::new("u1", "Ada").unwrap()
}

/// A confirmed text message as it would come out of a snapshot.
pub fn synced(text: &str, created_at: i64) -> Message {
    Message {
        id: format!("srv-{text}-{created_at}").parse().unwrap(),
        client_id: None,
        author: author(),
        created_at,
        payload: Payload::text(text).unwrap(),
        delivery: DeliveryState::Synced,
    }
}

#[derive(Default)]
struct RemoteState {
    records: Vec<Message>,
    next_id: u64,
    publishers: Vec<SnapshotPublisher>,
    fail_appends: bool,
    fail_subscribes: bool,
    hold_publishing: bool,
}

impl RemoteState {
    fn insert(&mut self, message: &Message) {
        self.next_id += 1;
        let mut record = message.clone();
        record.id = format!("srv-{}", self.next_id).parse().unwrap();
        record.client_id = Some(message.id.clone());
        record.delivery = DeliveryState::Synced;
        self.records.push(record);
    }
}

/// Remote log that publishes a snapshot to every subscriber after each append.
#[derive(Clone, Default)]
pub struct MemoryRemoteLog {
    state: Arc<Mutex<RemoteState>>,
}

impl MemoryRemoteLog {
    pub fn with(messages: Vec<Message>) -> Self {
        let log = Self::default();
        {
            let mut state = log.state.lock().unwrap();
            for message in &messages {
                state.insert(message);
            }
        }
        log
    }

    pub fn fail_appends(&self, fail: bool) {
        self.state.lock().unwrap().fail_appends = fail;
    }

    pub fn fail_subscribes(&self, fail: bool) {
        self.state.lock().unwrap().fail_subscribes = fail;
    }

    /// Drop every publisher, ending its subscription.
    pub fn close_subscriptions(&self) {
        self.state.lock().unwrap().publishers.clear();
    }

    /// Keep appends out of snapshots until released.
    pub fn hold_publishing(&self, hold: bool) {
        self.state.lock().unwrap().hold_publishing = hold;
    }

    pub fn records(&self) -> Vec<Message> {
        self.state.lock().unwrap().records.clone()
    }

    /// Records as a snapshot would order them.
    pub fn ordered(&self) -> Vec<Message> {
        let mut records = self.records();
        sort_newest_first(&mut records);
        records
    }

    pub fn live_subscribers(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .publishers
            .iter()
            .filter(|publisher| !publisher.is_cancelled())
            .count()
    }
}

impl RemoteLog for MemoryRemoteLog {
    fn subscribe(&self, generation: u64) -> Result<Subscription> {
        let mut state = self.state.lock().unwrap();
        if state.fail_subscribes {
            return Err(Error::Network("remote unavailable".to_string()));
        }
        let (publisher, subscription) = snapshot_channel(generation);
        publisher.publish(state.records.clone());
        state.publishers.push(publisher);
        Ok(subscription)
    }

    async fn append(&self, message: &Message) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_appends {
            return Err(Error::Network("remote unavailable".to_string()));
        }
        if state
            .records
            .iter()
            .any(|record| record.client_id.as_ref() == Some(&message.id))
        {
            return Ok(());
        }
        state.insert(message);

        if !state.hold_publishing {
            let records = state.records.clone();
            state
                .publishers
                .retain(|publisher| publisher.publish(records.clone()));
        }
        Ok(())
    }
}

/// Cache kept in memory, optionally failing every call.
#[derive(Default)]
pub struct MemoryCache {
    value: Mutex<Option<Vec<Message>>>,
    failing: bool,
}

impl MemoryCache {
    pub fn with(messages: Vec<Message>) -> Self {
        Self {
            value: Mutex::new(Some(messages)),
            failing: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            value: Mutex::new(None),
            failing: true,
        }
    }

    pub fn snapshot(&self) -> Option<Vec<Message>> {
        self.value.lock().unwrap().clone()
    }
}

impl LocalCache for MemoryCache {
    async fn load(&self) -> Result<Option<Vec<Message>>> {
        if self.failing {
            return Err(Error::Cache("storage unavailable".to_string()));
        }
        Ok(self.snapshot())
    }

    async fn save(&self, messages: &[Message]) -> Result<()> {
        if self.failing {
            return Err(Error::Cache("storage unavailable".to_string()));
        }
        *self.value.lock().unwrap() = Some(messages.to_vec());
        Ok(())
    }
}

#[derive(Default)]
struct OutboxState {
    entries: Vec<OutboxEntry>,
    fail_writes: bool,
}

/// Outbox kept in memory; clones share state.
#[derive(Clone, Default)]
pub struct MemoryOutbox {
    state: Arc<Mutex<OutboxState>>,
}

impl MemoryOutbox {
    pub fn push(&self, message: Message) {
        self.state.lock().unwrap().entries.push(OutboxEntry {
            message,
            attempts: 0,
        });
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn attempts_of_oldest(&self) -> u32 {
        self.state.lock().unwrap().entries[0].attempts
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }
}

impl Outbox for MemoryOutbox {
    async fn enqueue(&self, message: &Message) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(Error::Database("outbox unavailable".to_string()));
        }
        match state
            .entries
            .iter_mut()
            .find(|entry| entry.message.id == message.id)
        {
            Some(entry) => entry.attempts += 1,
            None => state.entries.push(OutboxEntry {
                message: message.clone(),
                attempts: 0,
            }),
        }
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<OutboxEntry>> {
        Ok(self.state.lock().unwrap().entries.clone())
    }

    async fn remove(&self, id: &MessageId) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .entries
            .retain(|entry| &entry.message.id != id);
        Ok(())
    }
}

/// Blob store that keeps bytes in a map and serves them from `base_url`.
pub struct MemoryBlobStore {
    base_url: String,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_puts: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            objects: Mutex::new(HashMap::new()),
            fail_puts: AtomicBool::new(false),
        }
    }

    pub fn fail_puts(&self) {
        self.fail_puts.store(true, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        _content_type: Option<&str>,
    ) -> Result<ObjectHandle> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Error::Storage("bucket unavailable".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
        Ok(ObjectHandle::new(key))
    }

    async fn url(&self, handle: &ObjectHandle) -> Result<String> {
        Ok(format!("{}/{}", self.base_url, handle.key()))
    }

    async fn delete(&self, handle: &ObjectHandle) -> Result<()> {
        self.objects.lock().unwrap().remove(handle.key());
        Ok(())
    }
}

/// Recorder that returns fixed samples, or fails on stop.
pub struct FakeRecorder {
    samples: Option<Vec<i16>>,
    releases: Rc<Cell<usize>>,
}

impl FakeRecorder {
    pub fn with_samples(samples: Vec<i16>) -> Self {
        Self {
            samples: Some(samples),
            releases: Rc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            samples: None,
            releases: Rc::default(),
        }
    }

    /// Shared counter of `release` calls.
    pub fn releases(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.releases)
    }
}

impl AudioRecorder for FakeRecorder {
    async fn stop(&mut self) -> Result<RecordedAudio> {
        match self.samples.take() {
            Some(samples) => Ok(RecordedAudio::Pcm16 {
                samples,
                sample_rate_hz: 16_000,
                channels: 1,
            }),
            None => Err(Error::Recording("device busy".to_string())),
        }
    }

    fn release(&mut self) {
        self.releases.set(self.releases.get() + 1);
    }
}

/// Scripted platform surface.
#[derive(Default)]
pub struct FakeDevice {
    permissions: HashMap<Capability, Permission>,
    library_image: Option<MediaFile>,
    camera_photo: Option<MediaFile>,
    position: Option<Coordinates>,
    recorders: RefCell<VecDeque<FakeRecorder>>,
    alerts: RefCell<Vec<String>>,
    permission_requests: RefCell<Vec<Capability>>,
}

impl FakeDevice {
    pub fn granting_all() -> Self {
        let permissions = [
            Capability::MediaLibrary,
            Capability::Camera,
            Capability::Microphone,
            Capability::Location,
        ]
        .into_iter()
        .map(|capability| (capability, Permission::Granted))
        .collect();
        Self {
            permissions,
            ..Self::default()
        }
    }

    pub fn with_permission(mut self, capability: Capability, permission: Permission) -> Self {
        self.permissions.insert(capability, permission);
        self
    }

    pub fn with_library_image(mut self, name: &str) -> Self {
        self.library_image = Some(image_file(name));
        self
    }

    pub fn with_camera_photo(mut self, name: &str) -> Self {
        self.camera_photo = Some(image_file(name));
        self
    }

    pub fn with_position(mut self, position: Coordinates) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_recorder(self, recorder: FakeRecorder) -> Self {
        self.recorders.borrow_mut().push_back(recorder);
        self
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.borrow().clone()
    }

    pub fn permission_requests(&self) -> Vec<Capability> {
        self.permission_requests.borrow().clone()
    }
}

fn image_file(name: &str) -> MediaFile {
    MediaFile {
        name: name.to_string(),
        mime_type: "image/jpeg".to_string(),
        bytes: b"jpeg".to_vec(),
    }
}

impl DeviceCapabilities for FakeDevice {
    type Recorder = FakeRecorder;

    async fn request_permission(&self, capability: Capability) -> Permission {
        self.permission_requests.borrow_mut().push(capability);
        self.permissions
            .get(&capability)
            .copied()
            .unwrap_or(Permission::Denied)
    }

    async fn pick_library_image(&self) -> Result<Option<MediaFile>> {
        Ok(self.library_image.clone())
    }

    async fn capture_photo(&self) -> Result<Option<MediaFile>> {
        Ok(self.camera_photo.clone())
    }

    async fn current_position(&self) -> Result<Coordinates> {
        self.position
            .ok_or_else(|| Error::InvalidInput("no position fix".to_string()))
    }

    async fn start_recording(&self) -> Result<FakeRecorder> {
        self.recorders
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| Error::Recording("no microphone".to_string()))
    }

    fn alert(&self, message: &str) {
        self.alerts.borrow_mut().push(message.to_string());
    }
}

/// Fixed wall clock.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(i64);

impl FixedClock {
    pub const fn new(now_ms: i64) -> Self {
        Self(now_ms)
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

/// Sink that records what it was given.
#[derive(Default)]
pub struct RecordingSink {
    pub messages: Vec<Message>,
    offline: bool,
    reject: bool,
}

impl RecordingSink {
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    /// Accepts composing but fails every submit.
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }
}

impl MessageSink for RecordingSink {
    fn can_accept(&self) -> bool {
        !self.offline
    }

    async fn submit(&mut self, message: Message) -> Result<()> {
        if self.reject {
            return Err(Error::Storage("outbox unavailable".to_string()));
        }
        self.messages.push(message);
        Ok(())
    }
}
