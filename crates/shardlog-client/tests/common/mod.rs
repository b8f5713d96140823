//! Scripted stream service shared by the integration tests.
//!
//! Every call is recorded so tests can assert on exactly what the client
//! asked for. Responses are popped from per-operation queues; an empty
//! queue means "succeed with nothing interesting".

#![allow(dead_code)]

use async_trait::async_trait;
use shardlog_client::{
    Cursor, DescribeShardsPage, GetRecordsOutput, HashKeyRange, IteratorPosition,
    PutRecordsOutput, PutRecordsRequest, Record, SequenceNumber, ServiceError, Shard, ShardId,
    StreamService, WriteOutcome,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// How the next `put_records` call should answer.
pub enum PutScript {
    /// Fail the entries at these positions, accept the others.
    FailPositions(Vec<usize>),
    /// Fail the whole call.
    Error(ServiceError),
    /// Return these outcomes verbatim, whatever was submitted.
    Raw(Vec<WriteOutcome>),
}

#[derive(Default)]
pub struct ScriptedService {
    describe_pages: Mutex<VecDeque<Result<DescribeShardsPage, ServiceError>>>,
    describe_calls: Mutex<Vec<Option<ShardId>>>,
    iterator_calls: Mutex<Vec<(ShardId, IteratorPosition)>>,
    iterator_errors: Mutex<VecDeque<ServiceError>>,
    records_responses: Mutex<VecDeque<Result<GetRecordsOutput, ServiceError>>>,
    records_calls: Mutex<Vec<(Cursor, usize)>>,
    put_scripts: Mutex<VecDeque<PutScript>>,
    put_calls: Mutex<Vec<PutRecordsRequest>>,
    shutdown_calls: AtomicUsize,
    next_sequence: AtomicUsize,
}

impl ScriptedService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_page(&self, ids: &[&str], has_more_shards: bool) {
        self.describe_pages.lock().unwrap().push_back(Ok(DescribeShardsPage {
            shards: ids.iter().map(|id| shard(id)).collect(),
            has_more_shards,
        }));
    }

    pub fn push_describe_error(&self, error: ServiceError) {
        self.describe_pages.lock().unwrap().push_back(Err(error));
    }

    pub fn push_iterator_error(&self, error: ServiceError) {
        self.iterator_errors.lock().unwrap().push_back(error);
    }

    pub fn push_records(&self, output: GetRecordsOutput) {
        self.records_responses.lock().unwrap().push_back(Ok(output));
    }

    pub fn push_records_error(&self, error: ServiceError) {
        self.records_responses.lock().unwrap().push_back(Err(error));
    }

    pub fn push_put(&self, script: PutScript) {
        self.put_scripts.lock().unwrap().push_back(script);
    }

    pub fn describe_calls(&self) -> Vec<Option<ShardId>> {
        self.describe_calls.lock().unwrap().clone()
    }

    pub fn iterator_calls(&self) -> Vec<(ShardId, IteratorPosition)> {
        self.iterator_calls.lock().unwrap().clone()
    }

    pub fn records_calls(&self) -> Vec<(Cursor, usize)> {
        self.records_calls.lock().unwrap().clone()
    }

    pub fn put_calls(&self) -> Vec<PutRecordsRequest> {
        self.put_calls.lock().unwrap().clone()
    }

    pub fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }

    fn accept(&self) -> WriteOutcome {
        let seq = self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        WriteOutcome::accepted(seq.to_string(), "shardId-000000000000")
    }
}

#[async_trait]
impl StreamService for ScriptedService {
    async fn describe_shards(
        &self,
        _stream_name: &str,
        exclusive_start_shard_id: Option<&ShardId>,
    ) -> Result<DescribeShardsPage, ServiceError> {
        self.describe_calls
            .lock()
            .unwrap()
            .push(exclusive_start_shard_id.cloned());
        self.describe_pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(DescribeShardsPage {
                shards: Vec::new(),
                has_more_shards: false,
            }))
    }

    async fn get_shard_iterator(
        &self,
        _stream_name: &str,
        shard_id: &ShardId,
        position: &IteratorPosition,
    ) -> Result<Cursor, ServiceError> {
        self.iterator_calls
            .lock()
            .unwrap()
            .push((shard_id.clone(), position.clone()));
        if let Some(error) = self.iterator_errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(Cursor::new(format!("cursor-{}", shard_id)))
    }

    async fn get_records(
        &self,
        cursor: &Cursor,
        limit: usize,
    ) -> Result<GetRecordsOutput, ServiceError> {
        self.records_calls
            .lock()
            .unwrap()
            .push((cursor.clone(), limit));
        self.records_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(GetRecordsOutput {
                    records: Vec::new(),
                    next_cursor: Some(cursor.clone()),
                    millis_behind_latest: Some(0),
                })
            })
    }

    async fn put_records(
        &self,
        request: &PutRecordsRequest,
    ) -> Result<PutRecordsOutput, ServiceError> {
        self.put_calls.lock().unwrap().push(request.clone());
        let script = self.put_scripts.lock().unwrap().pop_front();

        let outcomes = match script {
            None => request.entries.iter().map(|_| self.accept()).collect(),
            Some(PutScript::Error(e)) => return Err(e),
            Some(PutScript::Raw(outcomes)) => outcomes,
            Some(PutScript::FailPositions(positions)) => (0..request.entries.len())
                .map(|i| {
                    if positions.contains(&i) {
                        WriteOutcome::failed(
                            "ProvisionedThroughputExceededException",
                            "Rate exceeded",
                        )
                    } else {
                        self.accept()
                    }
                })
                .collect(),
        };

        Ok(PutRecordsOutput { outcomes })
    }

    async fn shutdown(&self) -> Result<(), ServiceError> {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn shard(id: &str) -> Shard {
    Shard::new(
        id,
        HashKeyRange {
            starting_hash_key: "0".to_string(),
            ending_hash_key: "340282366920938463463374607431768211455".to_string(),
        },
        "0",
    )
}

pub fn record(seq: &str, key: &str, data: &'static str) -> Record {
    Record::new(SequenceNumber::new(seq), key, bytes::Bytes::from(data))
}
