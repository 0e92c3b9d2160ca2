// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! JSON-lines output of ingest records.
//!
//! Each record becomes one line:
//!
//! ```text
//! {"asset":"opcua/ns=5;s=Random1","timestamp":"2024-01-01 00:00:00.123456+00:00","readings":{"Random1":0.25}}
//! ```

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

use fieldtap_opcua::{IngestRecord, NormalizedValue};

use crate::error::BinResult;
use crate::shutdown::ShutdownListener;

#[derive(Serialize)]
struct RecordLine<'a> {
    asset: &'a str,
    timestamp: String,
    readings: BTreeMap<&'a str, &'a NormalizedValue>,
}

/// Encodes a record as a single JSON line, newline included.
pub fn encode_record(record: &IngestRecord) -> BinResult<String> {
    let line = RecordLine {
        asset: &record.asset,
        timestamp: record.timestamp.to_string(),
        readings: record
            .readings
            .iter()
            .map(|r| (r.name.as_str(), &r.value))
            .collect(),
    };
    let mut encoded = serde_json::to_string(&line)?;
    encoded.push('\n');
    Ok(encoded)
}

/// Writes records to `writer` until the channel closes or shutdown is
/// signalled. Records already queued at shutdown are still written.
///
/// Returns the number of records written.
pub async fn write_records<W>(
    mut records: mpsc::UnboundedReceiver<IngestRecord>,
    mut writer: W,
    mut shutdown: ShutdownListener,
) -> BinResult<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;

    loop {
        tokio::select! {
            record = records.recv() => match record {
                Some(record) => {
                    writer.write_all(encode_record(&record)?.as_bytes()).await?;
                    writer.flush().await?;
                    written += 1;
                }
                None => break,
            },
            _ = shutdown.triggered() => {
                while let Ok(record) = records.try_recv() {
                    writer.write_all(encode_record(&record)?.as_bytes()).await?;
                    written += 1;
                }
                writer.flush().await?;
                break;
            }
        }
    }

    debug!(written, "Record writer finished");
    Ok(written)
}
