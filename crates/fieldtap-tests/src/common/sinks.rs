// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Recording ingest sink.

use parking_lot::Mutex;

use fieldtap_opcua::{IngestRecord, IngestSink, NormalizedValue};

/// Keeps every record it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<IngestRecord>>,
}

impl RecordingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the records.
    pub fn records(&self) -> Vec<IngestRecord> {
        self.records.lock().clone()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns `true` if nothing was received.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Returns the last record.
    pub fn last(&self) -> Option<IngestRecord> {
        self.records.lock().last().cloned()
    }

    /// Returns the assets of every record, in arrival order.
    pub fn assets(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.asset.clone()).collect()
    }

    /// Returns the first reading's value of the last record.
    pub fn last_value(&self) -> Option<NormalizedValue> {
        self.last().and_then(|r| r.readings.into_iter().next()).map(|r| r.value)
    }

    /// Forgets every record.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl IngestSink for RecordingSink {
    fn ingest(&self, record: IngestRecord) {
        self.records.lock().push(record);
    }
}
