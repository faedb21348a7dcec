//! Shared doubles for integration tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use aegis::error::DependencyError;
use aegis::probe::{FnCheck, HealthCheck};
use aegis::sink::{BoxFuture, PersistenceSink, WriteRecord};

/// Sink whose availability is flipped by the test.
pub struct ScriptedSink {
    pub up: AtomicBool,
    pub persisted: Mutex<Vec<String>>,
}

impl ScriptedSink {
    pub fn new(up: bool) -> Arc<Self> {
        Arc::new(Self {
            up: AtomicBool::new(up),
            persisted: Mutex::new(Vec::new()),
        })
    }

    #[allow(dead_code)]
    pub fn persisted_kinds(&self) -> Vec<String> {
        self.persisted.lock().unwrap().clone()
    }
}

impl PersistenceSink for ScriptedSink {
    fn persist<'a>(
        &'a self,
        record: &'a WriteRecord,
    ) -> BoxFuture<'a, Result<(), DependencyError>> {
        Box::pin(async move {
            if self.up.load(Ordering::SeqCst) {
                self.persisted.lock().unwrap().push(record.kind.clone());
                Ok(())
            } else {
                Err(DependencyError::ConnectionRefused)
            }
        })
    }
}

/// Health check reading a shared flag.
#[allow(dead_code)]
pub fn flag_check(flag: Arc<AtomicBool>) -> Arc<dyn HealthCheck> {
    Arc::new(FnCheck::new(move || {
        let flag = flag.clone();
        Box::pin(async move { flag.load(Ordering::SeqCst) })
    }))
}

/// Counter for operations invoked by the call path.
#[allow(dead_code)]
pub fn call_counter() -> Arc<AtomicU32> {
    Arc::new(AtomicU32::new(0))
}
