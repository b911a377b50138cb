// src/flood/worker.rs
//! Фоновый пересчёт затопления.
//!
//! Интерактивный клиент меняет уровень воды чаще, чем успевает отработать точный BFS
//! на крупной сетке. Воркер держит отдельный поток:
//! - каждый запрос получает номер поколения и собственный флаг отмены;
//! - новый запрос поднимает флаг предыдущего, и тот прерывается;
//! - результаты устаревших поколений отбрасываются, а не смешиваются с актуальными;
//! - ошибка актуального запроса возвращается вызывающему, а не теряется в логе.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, warn};

use super::{FloodContext, FloodedCellSet, ReachabilityStrategy, compute_flooded_cancellable};
use crate::{FloodError, Result};

/// Готовый результат фонового расчёта.
#[derive(Debug, Clone)]
pub struct FloodUpdate {
    pub generation: u64,
    pub flooded: FloodedCellSet,
}

/// Ответ потока: результат или ошибка конкретного поколения.
struct WorkerReply {
    generation: u64,
    result: Result<FloodedCellSet>,
}

impl WorkerReply {
    fn into_update(self) -> Result<FloodUpdate> {
        self.result.map(|flooded| FloodUpdate {
            generation: self.generation,
            flooded,
        })
    }
}

enum WorkerCommand {
    Compute {
        generation: u64,
        water_level: f32,
        strategy: ReachabilityStrategy,
        cancel: Arc<AtomicBool>,
    },
    Shutdown,
}

pub struct FloodWorker {
    ctx: Arc<FloodContext>,
    cmd_tx: Sender<WorkerCommand>,
    update_rx: Receiver<WorkerReply>,
    generation: Arc<AtomicU64>,
    current_cancel: Option<Arc<AtomicBool>>,
    thread: Option<JoinHandle<()>>,
}

impl FloodWorker {
    /// Запускает поток расчёта над общим контекстом.
    pub fn spawn(ctx: Arc<FloodContext>) -> Result<Self> {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let (update_tx, update_rx) = crossbeam_channel::unbounded();
        let generation = Arc::new(AtomicU64::new(0));

        let latest = Arc::clone(&generation);
        let shared = Arc::clone(&ctx);
        let thread = thread::Builder::new()
            .name("flood-worker".into())
            .spawn(move || worker_main(&shared, &cmd_rx, &update_tx, &latest))?;

        Ok(Self {
            ctx,
            cmd_tx,
            update_rx,
            generation,
            current_cancel: None,
            thread: Some(thread),
        })
    }

    /// Ставит расчёт нового уровня, отменяя предыдущий. Возвращает номер поколения.
    ///
    /// Запрос аппроксимации без процедурной модели отклоняется сразу, с
    /// [`FloodError::ApproximationUnavailable`], и предыдущий расчёт не отменяет.
    pub fn request(&mut self, water_level: f32, strategy: ReachabilityStrategy) -> Result<u64> {
        if matches!(strategy, ReachabilityStrategy::LineSample { .. })
            && self.ctx.terrain().is_none()
        {
            return Err(FloodError::ApproximationUnavailable);
        }

        if let Some(previous) = self.current_cancel.take() {
            previous.store(true, Ordering::Relaxed);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = Arc::new(AtomicBool::new(false));
        self.current_cancel = Some(Arc::clone(&cancel));

        self.cmd_tx
            .send(WorkerCommand::Compute {
                generation,
                water_level,
                strategy,
                cancel,
            })
            .map_err(|_| FloodError::WorkerStopped)?;
        Ok(generation)
    }

    #[must_use]
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Неблокирующая проверка: актуальный результат, если он уже готов.
    ///
    /// `Ok(None)` значит, что расчёт ещё идёт; ошибка последнего запроса
    /// возвращается как `Err`.
    pub fn poll(&self) -> Result<Option<FloodUpdate>> {
        let mut latest = None;
        loop {
            match self.update_rx.try_recv() {
                Ok(reply) if reply.generation == self.current_generation() => latest = Some(reply),
                Ok(_) => {}
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if latest.is_none() {
                        return Err(FloodError::WorkerStopped);
                    }
                    break;
                }
            }
        }
        latest.map(WorkerReply::into_update).transpose()
    }

    /// Ждёт результат последнего запроса не дольше `timeout`.
    ///
    /// `Ok(None)` по таймауту; ошибка расчёта последнего запроса возвращается как `Err`.
    pub fn wait_latest(&self, timeout: Duration) -> Result<Option<FloodUpdate>> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.update_rx.recv_timeout(remaining) {
                Ok(reply) if reply.generation == self.current_generation() => {
                    return reply.into_update().map(Some);
                }
                Ok(stale) => debug!(generation = stale.generation, "stale flood result dropped"),
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => return Err(FloodError::WorkerStopped),
            }
        }
    }
}

impl Drop for FloodWorker {
    fn drop(&mut self) {
        if let Some(cancel) = self.current_cancel.take() {
            cancel.store(true, Ordering::Relaxed);
        }
        let _ = self.cmd_tx.send(WorkerCommand::Shutdown);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("flood worker thread panicked");
        }
    }
}

fn worker_main(
    ctx: &FloodContext,
    cmd_rx: &Receiver<WorkerCommand>,
    update_tx: &Sender<WorkerReply>,
    latest: &AtomicU64,
) {
    while let Ok(mut cmd) = cmd_rx.recv() {
        // из накопившейся очереди нужен только последний запрос
        while let Ok(next) = cmd_rx.try_recv() {
            cmd = next;
        }

        let WorkerCommand::Compute {
            generation,
            water_level,
            strategy,
            cancel,
        } = cmd
        else {
            break;
        };

        if generation != latest.load(Ordering::SeqCst) || cancel.load(Ordering::Relaxed) {
            continue;
        }

        let result = match strategy {
            ReachabilityStrategy::Exact => {
                match compute_flooded_cancellable(ctx.grid(), water_level, ctx.seeds(), &cancel) {
                    Some(flooded) => Ok(flooded),
                    None => {
                        debug!(generation, "flood request superseded");
                        continue;
                    }
                }
            }
            ReachabilityStrategy::LineSample { .. } => ctx.flood(water_level, strategy),
        };

        if let Err(err) = &result {
            warn!(generation, %err, "background flood request failed");
        }

        if generation == latest.load(Ordering::SeqCst)
            && update_tx.send(WorkerReply { generation, result }).is_err()
        {
            break;
        }
    }
}
