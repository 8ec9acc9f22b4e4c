use super::{fetch_snapshot, persist, PersistReport, Resync, SyncPolicy};
use crate::{
    api::{BoardApi, ColumnUpdate, NewColumn, NewTask, TaskUpdate},
    domain::{BoardId, ColumnId, DragGesture, MoveDirection, TaskId},
    error::{BoardError, Result},
    store::{BoardAction, BoardSnapshot, BoardStore, ItemChange, ReorderPlan},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

/// What happened to a drop after it was applied locally
#[derive(Debug)]
pub struct DropOutcome {
    pub plan: ReorderPlan,
    pub report: PersistReport,
    pub resync: Resync,
}

/// A background refetch result, tagged with the store revision it was
/// started at
type PendingResync = (u64, Result<BoardSnapshot>);

/// One board's local state kept in step with the server
///
/// Local state only changes inside these methods: either from a gesture or
/// when a refetch completes. Background refetches deliver their snapshots on
/// a channel. Snapshots that have already arrived are applied before every
/// mutation, and a snapshot started before a later mutation is discarded,
/// so a refetch never undoes newer local state.
pub struct BoardSync {
    api: Arc<dyn BoardApi>,
    store: BoardStore,
    policy: SyncPolicy,
    resync_tx: mpsc::UnboundedSender<PendingResync>,
    resync_rx: mpsc::UnboundedReceiver<PendingResync>,
    resyncs_in_flight: usize,
}

impl BoardSync {
    pub fn new(api: Arc<dyn BoardApi>, board: BoardId, policy: SyncPolicy) -> Self {
        let (resync_tx, resync_rx) = mpsc::unbounded_channel();
        Self {
            api,
            store: BoardStore::new(board),
            policy,
            resync_tx,
            resync_rx,
            resyncs_in_flight: 0,
        }
    }

    pub fn store(&self) -> &BoardStore {
        &self.store
    }

    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    pub fn resyncs_in_flight(&self) -> usize {
        self.resyncs_in_flight
    }

    /// Fetches the board for the first time
    pub async fn load(&mut self) -> Result<()> {
        self.refresh().await?;
        info!(
            board = %self.store.board_id(),
            columns = self.store.columns().len(),
            "board ready"
        );
        Ok(())
    }

    /// Replaces local state with the server's
    #[instrument(skip(self), fields(board = %self.store.board_id()))]
    pub async fn refresh(&mut self) -> Result<()> {
        let snapshot = fetch_snapshot(self.api.as_ref(), self.store.board_id()).await?;
        self.store.apply(BoardAction::Loaded(snapshot))?;
        Ok(())
    }

    /// Applies a task drop, persists it and resyncs per policy
    pub async fn drop_task(
        &mut self,
        gesture: DragGesture<TaskId, ColumnId>,
    ) -> Result<DropOutcome> {
        self.apply_pending_resync();
        let plan = self.store.drop_task(&gesture, self.policy.drop)?;
        Ok(self.settle(plan).await)
    }

    /// Applies a column drop, persists it and resyncs per policy
    pub async fn drop_column(
        &mut self,
        gesture: DragGesture<ColumnId, BoardId>,
    ) -> Result<DropOutcome> {
        self.apply_pending_resync();
        let plan = self.store.drop_column(&gesture)?;
        Ok(self.settle(plan).await)
    }

    /// Moves a task one column over through the server's move endpoint
    pub async fn step_task(&mut self, task: TaskId, direction: MoveDirection) -> Result<()> {
        self.apply_pending_resync();
        self.store
            .step_target(task, direction)?
            .ok_or_else(|| BoardError::DropTargetNotFound(format!("task {} {}", task, direction)))?;

        self.api.move_task(task, direction).await?;
        self.refresh().await
    }

    pub async fn create_column(&mut self, title: impl Into<String>) -> Result<ColumnId> {
        self.apply_pending_resync();
        let request = NewColumn {
            title: title.into(),
            position: Some(self.store.columns().len() as i64),
        };
        let column = self.api.create_column(self.store.board_id(), &request).await?;
        let id = column.id;

        let changes = self.store.apply(BoardAction::ColumnAdded(column))?;
        self.persist_changes(&changes).await;
        Ok(id)
    }

    pub async fn rename_column(&mut self, id: ColumnId, title: impl Into<String>) -> Result<()> {
        self.apply_pending_resync();
        let title = title.into();
        self.api
            .update_column(id, &ColumnUpdate::title(title.clone()))
            .await?;
        self.store.apply(BoardAction::ColumnRenamed { id, title })?;
        Ok(())
    }

    /// Deletes a column and closes the gap it leaves
    pub async fn delete_column(&mut self, id: ColumnId) -> Result<PersistReport> {
        self.apply_pending_resync();
        self.api.delete_column(id).await?;
        let changes = self.store.apply(BoardAction::ColumnRemoved(id))?;
        Ok(self.persist_changes(&changes).await)
    }

    /// Creates a task at the end of a column
    pub async fn create_task(&mut self, column: ColumnId, mut task: NewTask) -> Result<TaskId> {
        self.apply_pending_resync();
        if self.store.column(column).is_none() {
            return Err(BoardError::ItemNotFound(format!("column {}", column)));
        }

        task.position = Some(self.store.tasks(column).len() as i64);
        let mut created = self.api.create_task(column, &task).await?;
        created.column_id = Some(column);
        let id = created.id;

        let changes = self.store.apply(BoardAction::TaskAdded(created))?;
        self.persist_changes(&changes).await;
        Ok(id)
    }

    /// Updates title, description, deadline or priority.
    ///
    /// Placement fields are ignored; tasks move only through drops and steps.
    pub async fn update_task_details(
        &mut self,
        id: TaskId,
        mut update: TaskUpdate,
    ) -> Result<()> {
        self.apply_pending_resync();
        let mut task = self
            .store
            .task(id)
            .cloned()
            .ok_or_else(|| BoardError::ItemNotFound(format!("task {}", id)))?;

        update.position = None;
        update.column_id = None;
        self.api.update_task(id, &update).await?;

        if let Some(title) = update.title {
            task.set_title(title);
        }
        if let Some(description) = update.description {
            task.set_description(description);
        }
        if let Some(deadline) = update.deadline {
            task.set_deadline(deadline);
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        self.store.apply(BoardAction::TaskUpdated(task))?;
        Ok(())
    }

    /// Deletes a task and closes the gap it leaves
    pub async fn delete_task(&mut self, id: TaskId) -> Result<PersistReport> {
        self.apply_pending_resync();
        self.api.delete_task(id).await?;
        let changes = self.store.apply(BoardAction::TaskRemoved(id))?;
        Ok(self.persist_changes(&changes).await)
    }

    /// Makes every list dense locally and on the server
    pub async fn repair_positions(&mut self) -> Result<PersistReport> {
        self.apply_pending_resync();
        let changes = self.store.apply(BoardAction::Normalize)?;
        Ok(self.persist_changes(&changes).await)
    }

    /// Applies snapshots from finished background refetches
    ///
    /// Returns how many were applied. Snapshots overtaken by a later
    /// mutation are dropped and not counted.
    pub fn apply_pending_resync(&mut self) -> usize {
        let mut applied = 0;
        while let Ok((started_at, result)) = self.resync_rx.try_recv() {
            self.resyncs_in_flight = self.resyncs_in_flight.saturating_sub(1);
            if self.apply_resync(started_at, result) {
                applied += 1;
            }
        }
        applied
    }

    /// Waits for the next background refetch and applies it
    ///
    /// Returns false when none is in flight, it failed or it was overtaken
    /// by a later mutation.
    pub async fn wait_for_resync(&mut self) -> bool {
        if self.resyncs_in_flight == 0 {
            return false;
        }
        match self.resync_rx.recv().await {
            Some((started_at, result)) => {
                self.resyncs_in_flight -= 1;
                self.apply_resync(started_at, result)
            }
            None => false,
        }
    }

    async fn settle(&mut self, plan: ReorderPlan) -> DropOutcome {
        if plan.is_empty() {
            return DropOutcome {
                plan,
                report: PersistReport::default(),
                resync: Resync::None,
            };
        }

        let report = persist(self.api.as_ref(), &plan.changes).await;
        let resync = self.policy.resync_for(plan.crosses_containers, &report);
        self.resync(resync).await;

        DropOutcome {
            plan,
            report,
            resync,
        }
    }

    async fn persist_changes(&mut self, changes: &[ItemChange]) -> PersistReport {
        if changes.is_empty() {
            return PersistReport::default();
        }
        let report = persist(self.api.as_ref(), changes).await;
        let resync = self.policy.resync_for(false, &report);
        self.resync(resync).await;
        report
    }

    async fn resync(&mut self, resync: Resync) {
        match resync {
            Resync::None => {}
            Resync::Immediate => {
                // Local state stays usable; the next refetch gets another chance
                if let Err(e) = self.refresh().await {
                    error!(error = %e, "refetch after reorder failed");
                }
            }
            Resync::Background => self.spawn_resync(),
        }
    }

    fn spawn_resync(&mut self) {
        let api = Arc::clone(&self.api);
        let tx = self.resync_tx.clone();
        let board = self.store.board_id();
        let started_at = self.store.revision();
        self.resyncs_in_flight += 1;

        tokio::spawn(async move {
            let result = fetch_snapshot(api.as_ref(), board).await;
            let _ = tx.send((started_at, result));
        });
    }

    fn apply_resync(&mut self, started_at: u64, result: Result<BoardSnapshot>) -> bool {
        if started_at < self.store.revision() {
            debug!(
                started_at,
                revision = self.store.revision(),
                "discarding refetch overtaken by a later change"
            );
            return false;
        }

        let applied = result.and_then(|snapshot| self.store.apply(BoardAction::Loaded(snapshot)));
        match applied {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "background refetch failed");
                false
            }
        }
    }
}
