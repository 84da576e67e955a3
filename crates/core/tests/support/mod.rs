//! Shared mocks for delivery service tests

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use roadwatch_core::{AuthSession, DetectionGateway, DetectionReceipt, OfflineStore};
use roadwatch_domain::{
    BoundingBox, Detection, DetectionEvent, DeviceError, Result, SensorSnapshot, TriggerSource,
};
use tokio::sync::Semaphore;

/// Build a valid event with a deterministic timestamp offset
pub fn event(offset_secs: u32, confidence: f32) -> DetectionEvent {
    let timestamp = Utc.with_ymd_and_hms(2026, 8, 29, 12, 0, offset_secs).unwrap();
    DetectionEvent::new(
        timestamp,
        TriggerSource::Camera,
        vec![Detection {
            bbox: BoundingBox { x: 0.1, y: 0.1, width: 0.5, height: 0.5 },
            confidence,
            class_name: "pothole".to_string(),
        }],
        SensorSnapshot::default(),
        None,
    )
    .unwrap()
}

/// Gateway mock fed with a queue of canned responses
///
/// Once the canned responses are exhausted every call succeeds. An optional
/// gate semaphore blocks `submit_detection` until the test releases permits.
pub struct MockGateway {
    responses: Mutex<VecDeque<Result<DetectionReceipt>>>,
    pub submit_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
    pub gate: Option<Arc<Semaphore>>,
}

impl MockGateway {
    pub fn new(responses: Vec<Result<DetectionReceipt>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            submit_calls: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn gated(gate: Arc<Semaphore>) -> Self {
        let mut gateway = Self::new(Vec::new());
        gateway.gate = Some(gate);
        gateway
    }

    pub fn receipt(id: &str) -> Result<DetectionReceipt> {
        Ok(DetectionReceipt { id: id.to_string() })
    }
}

#[async_trait]
impl DetectionGateway for MockGateway {
    async fn submit_detection(&self, _event: &DetectionEvent) -> Result<DetectionReceipt> {
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| DeviceError::Internal(e.to_string()))?;
            permit.forget();
        }

        let call = self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(DetectionReceipt { id: format!("det-{call}") }))
    }

    async fn upload_image(&self, _detection_id: &str, _image_path: &Path) -> Result<()> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Auth session mock counting forced logins
pub struct MockAuth {
    pub login_calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl MockAuth {
    pub fn new() -> Self {
        Self { login_calls: AtomicUsize::new(0), fail: AtomicBool::new(false) }
    }

    pub fn failing() -> Self {
        let auth = Self::new();
        auth.fail.store(true, Ordering::SeqCst);
        auth
    }
}

#[async_trait]
impl AuthSession for MockAuth {
    async fn force_login(&self) -> Result<()> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            Err(DeviceError::Auth("login rejected".to_string()))
        } else {
            Ok(())
        }
    }
}

enum Record {
    Good(DetectionEvent),
    Corrupt,
}

/// In-memory offline store keyed by record name
pub struct MockStore {
    records: Mutex<BTreeMap<PathBuf, Record>>,
    sequence: AtomicUsize,
    pub archive_calls: AtomicUsize,
    pub quarantined: Mutex<Vec<PathBuf>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            sequence: AtomicUsize::new(0),
            archive_calls: AtomicUsize::new(0),
            quarantined: Mutex::new(Vec::new()),
        }
    }

    /// Seed a record as if a previous run had archived it
    pub fn seed(&self, event: DetectionEvent) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let path = PathBuf::from(format!("{}-{seq}.json", event.offline_file_stem()));
        self.records.lock().unwrap().insert(path, Record::Good(event));
    }

    /// Seed an unparseable record
    pub fn seed_corrupt(&self, name: &str) {
        self.records.lock().unwrap().insert(PathBuf::from(name), Record::Corrupt);
    }
}

#[async_trait]
impl OfflineStore for MockStore {
    async fn archive(&self, event: &DetectionEvent) -> Result<PathBuf> {
        self.archive_calls.fetch_add(1, Ordering::SeqCst);
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let path = PathBuf::from(format!("{}-{seq}.json", event.offline_file_stem()));
        self.records.lock().unwrap().insert(path.clone(), Record::Good(event.clone()));
        Ok(path)
    }

    async fn list(&self) -> Result<Vec<PathBuf>> {
        Ok(self.records.lock().unwrap().keys().cloned().collect())
    }

    async fn load(&self, path: &Path) -> Result<DetectionEvent> {
        match self.records.lock().unwrap().get(path) {
            Some(Record::Good(event)) => Ok(event.clone()),
            Some(Record::Corrupt) => {
                Err(DeviceError::Persistence(format!("corrupt record: {}", path.display())))
            }
            None => Err(DeviceError::Persistence(format!("missing record: {}", path.display()))),
        }
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        self.records.lock().unwrap().remove(path);
        Ok(())
    }

    async fn quarantine(&self, path: &Path) -> Result<()> {
        self.records.lock().unwrap().remove(path);
        self.quarantined.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.lock().unwrap().len())
    }
}
