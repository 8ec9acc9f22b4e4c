use crate::{
    api::{BoardApi, ColumnUpdate, TaskUpdate},
    domain::BoardId,
    error::{BoardError, Result},
    store::{BoardSnapshot, ItemChange},
};
use futures::future::{join_all, try_join_all};
use tracing::{debug, instrument, warn};

/// Result of persisting one batch of position changes
#[derive(Debug, Default)]
pub struct PersistReport {
    pub attempted: usize,
    pub failures: Vec<(ItemChange, BoardError)>,
}

impl PersistReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.attempted - self.failures.len()
    }
}

/// Sends every change concurrently and waits for all of them.
///
/// A failed call does not stop the others and is not retried.
#[instrument(skip_all, fields(changes = changes.len()))]
pub async fn persist(api: &dyn BoardApi, changes: &[ItemChange]) -> PersistReport {
    let results = join_all(changes.iter().map(|change| persist_one(api, *change))).await;

    let failures: Vec<(ItemChange, BoardError)> = changes
        .iter()
        .zip(results)
        .filter_map(|(change, result)| match result {
            Ok(()) => None,
            Err(e) => {
                warn!(%change, error = %e, "failed to persist position");
                Some((*change, e))
            }
        })
        .collect();

    debug!(failed = failures.len(), "persist settled");
    PersistReport {
        attempted: changes.len(),
        failures,
    }
}

async fn persist_one(api: &dyn BoardApi, change: ItemChange) -> Result<()> {
    match change {
        ItemChange::Task(change) => {
            api.update_task(change.id, &TaskUpdate::placement(change.position, change.container))
                .await
        }
        ItemChange::Column(change) => {
            api.update_column(change.id, &ColumnUpdate::position(change.position))
                .await
        }
    }
}

/// Fetches a board's columns and then every column's tasks
#[instrument(skip(api))]
pub async fn fetch_snapshot(api: &dyn BoardApi, board: BoardId) -> Result<BoardSnapshot> {
    let columns = api.list_columns(board).await?;

    let lists = try_join_all(columns.iter().map(|column| async move {
        api.list_tasks(column.id)
            .await
            .map(|tasks| (column.id, tasks))
    }))
    .await?;

    Ok(BoardSnapshot {
        columns,
        tasks: lists.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::HttpBoardApi,
        domain::{ColumnId, PositionChange, TaskId},
    };
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn task_change(id: i64, position: i64) -> ItemChange {
        ItemChange::Task(PositionChange {
            id: TaskId(id),
            position,
            container: None,
        })
    }

    async fn api(server: &MockServer) -> HttpBoardApi {
        let api = HttpBoardApi::new(server.uri()).unwrap();
        api.set_access_token(Some("t".to_string())).await;
        api
    }

    #[tokio::test]
    async fn test_failed_call_does_not_stop_batch() {
        let mock_server = MockServer::start().await;
        for (id, status) in [(1, 200), (2, 500), (3, 200)] {
            Mock::given(method("PUT"))
                .and(path(format!("/tasks/{}", id)))
                .respond_with(ResponseTemplate::new(status).set_body_json(json!({})))
                .expect(1)
                .mount(&mock_server)
                .await;
        }

        let api = api(&mock_server).await;
        let changes = [task_change(1, 2), task_change(2, 0), task_change(3, 1)];
        let report = persist(&api, &changes).await;

        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded(), 2);
        assert!(!report.is_complete());
        assert_eq!(report.failures[0].0, task_change(2, 0));
        assert!(report.failures[0].1.is_server());
    }

    #[tokio::test]
    async fn test_column_change_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/columns/5"))
            .and(body_json(json!({"position": 1})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let api = api(&mock_server).await;
        let change = ItemChange::Column(PositionChange {
            id: ColumnId(5),
            position: 1,
            container: None,
        });

        assert!(persist(&api, &[change]).await.is_complete());
    }

    #[tokio::test]
    async fn test_fetch_snapshot() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/boards/1/columns"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 10, "title": "Todo", "position": 0},
                {"id": 20, "title": "Done", "position": 1}
            ])))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/columns/10/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "title": "a", "description": null, "position": 0}
            ])))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/columns/20/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&mock_server)
            .await;

        let api = api(&mock_server).await;
        let snapshot = fetch_snapshot(&api, BoardId(1)).await.unwrap();

        assert_eq!(snapshot.columns.len(), 2);
        assert_eq!(snapshot.tasks[&ColumnId(10)].len(), 1);
        assert!(snapshot.tasks[&ColumnId(20)].is_empty());
    }

    #[tokio::test]
    async fn test_fetch_snapshot_propagates_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/boards/1/columns"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "not yours"})))
            .mount(&mock_server)
            .await;

        let api = api(&mock_server).await;
        let err = fetch_snapshot(&api, BoardId(1)).await.unwrap_err();
        assert!(matches!(err, BoardError::Forbidden(_)));
    }
}
