use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot},
    time::{Duration, Instant},
};
use tracing::{debug, warn};

use crate::{
    core::{
        lines::LinePatchOutcome,
        store::{ObjectStore, StoreError, StoreSnapshotV1},
    },
    line::PatchOp,
    op::{Op, StoredOp},
    paginate::{Page, PageRequest},
    persist::{OpSink, PersistError},
    query::{ListFilter, list_page},
    record::{ObjectDraft, ObjectKey, ObjectPatch, ObjectRecord},
    types::{ObjectType, OpSeq, TenantId},
    worklist::{WorklistFilter, WorklistRow, worklist_page},
};

use super::events::ObjectEvent;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("runtime channel closed")]
    ChannelClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub flush_on_write: bool,
    pub batch_max_ops: usize,
    pub batch_max_latency_ms: u64,
    pub persist_queue_bound: usize,
    pub snapshot_every_ops: usize,
    pub compact_after_snapshot: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush_on_write: true,
            batch_max_ops: 32,
            batch_max_latency_ms: 75,
            persist_queue_bound: 64,
            snapshot_every_ops: 2000,
            compact_after_snapshot: false,
        }
    }
}

/// Cloneable handle to the task that owns the [`ObjectStore`].
#[derive(Clone)]
pub struct ServiceHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<ObjectEvent>,
}

type Reply<T> = oneshot::Sender<Result<T, RuntimeError>>;

enum Command {
    Create {
        tenant_id: TenantId,
        draft: ObjectDraft,
        resp: Reply<ObjectRecord>,
    },
    Get {
        key: ObjectKey,
        resp: Reply<Option<ObjectRecord>>,
    },
    Update {
        key: ObjectKey,
        patch: ObjectPatch,
        resp: Reply<ObjectRecord>,
    },
    Delete {
        key: ObjectKey,
        resp: Reply<ObjectRecord>,
    },
    List {
        tenant_id: TenantId,
        object_type: ObjectType,
        filter: ListFilter,
        start: Option<ObjectKey>,
        req: PageRequest,
        resp: Reply<Page<ObjectRecord>>,
    },
    Worklist {
        tenant_id: TenantId,
        event_id: String,
        filter: WorklistFilter,
        start: Option<ObjectKey>,
        req: PageRequest,
        resp: Reply<Page<WorklistRow>>,
    },
    PatchLines {
        key: ObjectKey,
        ops: Vec<PatchOp>,
        resp: Reply<(ObjectRecord, LinePatchOutcome)>,
    },
    Flush {
        resp: Reply<OpSeq>,
    },
    Checkpoint {
        resp: Reply<()>,
    },
    Shutdown {
        resp: Reply<()>,
    },
}

enum PersistMsg {
    Op(StoredOp),
    Flush {
        resp: oneshot::Sender<Result<OpSeq, PersistError>>,
    },
    Checkpoint {
        snapshot: StoreSnapshotV1,
        last_seq: OpSeq,
        compact: bool,
        resp: oneshot::Sender<Result<(), PersistError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

struct Loop {
    store: ObjectStore,
    events_tx: broadcast::Sender<ObjectEvent>,
    persist_tx: Option<mpsc::Sender<PersistMsg>>,
    config: RuntimeConfig,
    ops_since_snapshot: usize,
}

pub fn spawn_service(
    store: ObjectStore,
    sink: Option<Box<dyn OpSink>>,
    config: RuntimeConfig,
) -> ServiceHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(256);
    let (events_tx, _) = broadcast::channel::<ObjectEvent>(1024);

    let (persist_tx, mut durable_rx) = if let Some(sink) = sink {
        let (persist_tx, persist_rx) = mpsc::channel::<PersistMsg>(config.persist_queue_bound.max(1));
        let (durable_tx, durable_rx) = mpsc::unbounded_channel::<Result<OpSeq, PersistError>>();
        spawn_persistence_worker(sink, persist_rx, durable_tx, config.clone());
        (Some(persist_tx), Some(durable_rx))
    } else {
        (None, None)
    };

    let mut state = Loop {
        store,
        events_tx: events_tx.clone(),
        persist_tx,
        config,
        ops_since_snapshot: 0,
    };

    tokio::spawn(async move {
        loop {
            if let Some(rx) = durable_rx.as_mut() {
                tokio::select! {
                    cmd = cmd_rx.recv() => {
                        let Some(cmd) = cmd else { break; };
                        if state.handle(cmd).await {
                            break;
                        }
                    }
                    durable = rx.recv() => {
                        match durable {
                            Some(Ok(op_seq)) => {
                                let _ = state.events_tx.send(ObjectEvent::DurableUpTo { op_seq });
                            }
                            Some(Err(err)) => warn!(error = %err, "journal append failed"),
                            None => {}
                        }
                    }
                }
            } else {
                let Some(cmd) = cmd_rx.recv().await else { break; };
                if state.handle(cmd).await {
                    break;
                }
            }
        }
        debug!("service loop stopped");
    });

    ServiceHandle { cmd_tx, events_tx }
}

impl ServiceHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ObjectEvent> {
        self.events_tx.subscribe()
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn create(&self, tenant_id: &str, draft: ObjectDraft) -> Result<ObjectRecord, RuntimeError> {
        let tenant_id = tenant_id.to_string();
        self.request(|resp| Command::Create { tenant_id, draft, resp }).await
    }

    pub async fn get(&self, key: ObjectKey) -> Result<Option<ObjectRecord>, RuntimeError> {
        self.request(|resp| Command::Get { key, resp }).await
    }

    pub async fn update(&self, key: ObjectKey, patch: ObjectPatch) -> Result<ObjectRecord, RuntimeError> {
        self.request(|resp| Command::Update { key, patch, resp }).await
    }

    pub async fn delete(&self, key: ObjectKey) -> Result<ObjectRecord, RuntimeError> {
        self.request(|resp| Command::Delete { key, resp }).await
    }

    pub async fn list(
        &self,
        tenant_id: &str,
        object_type: ObjectType,
        filter: ListFilter,
        start: Option<ObjectKey>,
        req: PageRequest,
    ) -> Result<Page<ObjectRecord>, RuntimeError> {
        let tenant_id = tenant_id.to_string();
        self.request(|resp| Command::List {
            tenant_id,
            object_type,
            filter,
            start,
            req,
            resp,
        })
        .await
    }

    pub async fn worklist(
        &self,
        tenant_id: &str,
        event_id: &str,
        filter: WorklistFilter,
        start: Option<ObjectKey>,
        req: PageRequest,
    ) -> Result<Page<WorklistRow>, RuntimeError> {
        let tenant_id = tenant_id.to_string();
        let event_id = event_id.to_string();
        self.request(|resp| Command::Worklist {
            tenant_id,
            event_id,
            filter,
            start,
            req,
            resp,
        })
        .await
    }

    pub async fn patch_lines(
        &self,
        key: ObjectKey,
        ops: Vec<PatchOp>,
    ) -> Result<(ObjectRecord, LinePatchOutcome), RuntimeError> {
        self.request(|resp| Command::PatchLines { key, ops, resp }).await
    }

    pub async fn flush(&self) -> Result<OpSeq, RuntimeError> {
        self.request(|resp| Command::Flush { resp }).await
    }

    pub async fn checkpoint(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Checkpoint { resp }).await
    }

    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Shutdown { resp }).await
    }
}

impl Loop {
    /// Returns true when the loop should stop.
    async fn handle(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Create { tenant_id, draft, resp } => {
                let res = match self.store.create(&tenant_id, draft) {
                    Ok((rec, _)) => self
                        .commit(ObjectEvent::Created { key: rec.key() })
                        .await
                        .map(|()| rec),
                    Err(err) => Err(err.into()),
                };
                self.after_write(res.is_ok()).await;
                let _ = resp.send(res);
            }
            Command::Get { key, resp } => {
                let _ = resp.send(Ok(self.store.get_cloned(&key)));
            }
            Command::Update { key, patch, resp } => {
                let res = match self.store.update(&key, &patch) {
                    Ok((rec, _)) => self.commit(ObjectEvent::Updated { key }).await.map(|()| rec),
                    Err(err) => Err(err.into()),
                };
                self.after_write(res.is_ok()).await;
                let _ = resp.send(res);
            }
            Command::Delete { key, resp } => {
                let res = match self.store.delete(&key) {
                    Ok((rec, _)) => self.commit(ObjectEvent::Deleted { key }).await.map(|()| rec),
                    Err(err) => Err(err.into()),
                };
                self.after_write(res.is_ok()).await;
                let _ = resp.send(res);
            }
            Command::List {
                tenant_id,
                object_type,
                filter,
                start,
                req,
                resp,
            } => {
                let page = list_page(&self.store, &tenant_id, object_type, &filter, start, req);
                let _ = resp.send(Ok(page));
            }
            Command::Worklist {
                tenant_id,
                event_id,
                filter,
                start,
                req,
                resp,
            } => {
                let page = worklist_page(&self.store, &tenant_id, &event_id, &filter, start, req);
                let _ = resp.send(Ok(page));
            }
            Command::PatchLines { key, ops, resp } => {
                let count = ops.len();
                let res = match self.store.patch_lines(&key, &ops) {
                    Ok((rec, outcome, _)) => self
                        .commit(ObjectEvent::LinesPatched { key, ops: count })
                        .await
                        .map(|()| (rec, outcome)),
                    Err(err) => Err(err.into()),
                };
                self.after_write(res.is_ok()).await;
                let _ = resp.send(res);
            }
            Command::Flush { resp } => {
                let out = match &self.persist_tx {
                    Some(tx) => {
                        let (flush_tx, flush_rx) = oneshot::channel();
                        if tx.send(PersistMsg::Flush { resp: flush_tx }).await.is_err() {
                            Err(RuntimeError::ChannelClosed)
                        } else {
                            flush_rx
                                .await
                                .map_err(|_| RuntimeError::ChannelClosed)
                                .and_then(|r| r.map_err(RuntimeError::from))
                        }
                    }
                    None => Ok(self.store.latest_op_seq()),
                };
                let _ = resp.send(out);
            }
            Command::Checkpoint { resp } => {
                let out = self.checkpoint().await;
                if out.is_ok() {
                    self.ops_since_snapshot = 0;
                }
                let _ = resp.send(out);
            }
            Command::Shutdown { resp } => {
                let out = match &self.persist_tx {
                    Some(tx) => {
                        let (done_tx, done_rx) = oneshot::channel();
                        if tx.send(PersistMsg::Shutdown { resp: done_tx }).await.is_err() {
                            Err(RuntimeError::ChannelClosed)
                        } else {
                            done_rx.await.map_err(|_| RuntimeError::ChannelClosed)
                        }
                    }
                    None => Ok(()),
                };
                let _ = resp.send(out);
                return true;
            }
        }

        false
    }

    /// Forwards the store's queued ops to the journal and announces `event`.
    /// Waits for persist queue capacity; drained ops are never dropped.
    async fn commit(&mut self, event: ObjectEvent) -> Result<(), RuntimeError> {
        let ops = self.store.drain_pending_ops();
        match &self.persist_tx {
            Some(tx) => {
                for stored in ops {
                    tx.send(PersistMsg::Op(stored))
                        .await
                        .map_err(|_| RuntimeError::ChannelClosed)?;
                }
            }
            None => {
                let _ = self.events_tx.send(ObjectEvent::DurableUpTo {
                    op_seq: self.store.latest_op_seq(),
                });
            }
        }
        let _ = self.events_tx.send(event);
        Ok(())
    }

    async fn after_write(&mut self, applied: bool) {
        if !applied {
            return;
        }
        self.ops_since_snapshot += 1;
        if self.config.snapshot_every_ops == 0
            || self.ops_since_snapshot < self.config.snapshot_every_ops
            || self.persist_tx.is_none()
        {
            return;
        }
        match self.checkpoint().await {
            Ok(()) => self.ops_since_snapshot = 0,
            Err(err) => warn!(error = %err, "automatic checkpoint failed"),
        }
    }

    async fn checkpoint(&self) -> Result<(), RuntimeError> {
        let Some(tx) = &self.persist_tx else {
            return Ok(());
        };
        let snapshot = self.store.export_snapshot();
        let last_seq = self.store.latest_op_seq();
        let (cp_tx, cp_rx) = oneshot::channel();
        tx.send(PersistMsg::Checkpoint {
            snapshot,
            last_seq,
            compact: self.config.compact_after_snapshot,
            resp: cp_tx,
        })
        .await
        .map_err(|_| RuntimeError::ChannelClosed)?;
        cp_rx
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?
            .map_err(RuntimeError::from)
    }
}

fn spawn_persistence_worker(
    sink: Box<dyn OpSink>,
    mut rx: mpsc::Receiver<PersistMsg>,
    durable_tx: mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    config: RuntimeConfig,
) {
    let sink = Arc::new(Mutex::new(sink));
    let latency = Duration::from_millis(config.batch_max_latency_ms);
    tokio::spawn(async move {
        let mut buf = Vec::<StoredOp>::new();
        let mut deadline = Instant::now() + latency;
        let mut last_durable: OpSeq = 0;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                        break;
                    };

                    match msg {
                        PersistMsg::Op(stored) => {
                            let is_put = matches!(stored.op, Op::Put { .. });
                            buf.push(stored);

                            if buf.len() >= config.batch_max_ops || (config.flush_on_write && is_put) {
                                let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                                deadline = Instant::now() + latency;
                            }
                        }
                        PersistMsg::Flush { resp } => {
                            let result = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                            let _ = resp.send(result.map(|_| last_durable));
                            deadline = Instant::now() + latency;
                        }
                        PersistMsg::Checkpoint { snapshot, last_seq, compact, resp } => {
                            let result = match flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await {
                                Err(err) => Err(err),
                                Ok(()) => {
                                    let sink_ref = Arc::clone(&sink);
                                    tokio::task::spawn_blocking(move || {
                                        let mut sink = sink_ref.blocking_lock();
                                        sink.write_snapshot(&snapshot, last_seq)?;
                                        if compact {
                                            sink.compact_through(last_seq)?;
                                        }
                                        Result::<(), PersistError>::Ok(())
                                    })
                                    .await
                                    .unwrap_or_else(|e| Err(PersistError::Message(format!("join error: {e}"))))
                                }
                            };
                            let _ = resp.send(result);
                            deadline = Instant::now() + latency;
                        }
                        PersistMsg::Shutdown { resp } => {
                            let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                            let _ = resp.send(());
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline), if !buf.is_empty() => {
                    let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, false).await;
                    deadline = Instant::now() + latency;
                }
            }
        }
    });
}

async fn flush_buf(
    sink: &Arc<Mutex<Box<dyn OpSink>>>,
    buf: &mut Vec<StoredOp>,
    last_durable: &mut OpSeq,
    durable_tx: &mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    call_flush: bool,
) -> Result<(), PersistError> {
    if buf.is_empty() {
        if call_flush {
            let sink_ref = Arc::clone(sink);
            tokio::task::spawn_blocking(move || {
                let mut sink = sink_ref.blocking_lock();
                sink.flush()
            })
            .await
            .map_err(|e| PersistError::Message(format!("join error: {e}")))??;
        }
        return Ok(());
    }

    let ops = std::mem::take(buf);
    let count = ops.len();
    let sink_ref = Arc::clone(sink);
    let append_res: Result<OpSeq, PersistError> = tokio::task::spawn_blocking(move || {
        let mut sink = sink_ref.blocking_lock();
        let seq = sink.append_ops(&ops)?;
        if call_flush {
            sink.flush()?;
        }
        Ok(seq)
    })
    .await
    .map_err(|e| PersistError::Message(format!("join error: {e}")))?;

    match append_res {
        Ok(seq) => {
            *last_durable = (*last_durable).max(seq);
            debug!(ops = count, durable = *last_durable, "journal batch appended");
            let _ = durable_tx.send(Ok(*last_durable));
            Ok(())
        }
        Err(err) => {
            let _ = durable_tx.send(Err(PersistError::Message(format!("append failed: {err}"))));
            Err(err)
        }
    }
}
