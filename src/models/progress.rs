use std::collections::BTreeMap;

use serde::Serialize;

/// ユーザーの学習進捗
///
/// キーが存在するタスクは完了済み。未完了のタスクはキーを持たない。
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub user_id: i64,
    pub completed: BTreeMap<i64, bool>,
}

impl UserProgress {
    pub fn from_task_ids(user_id: i64, task_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            user_id,
            completed: task_ids.into_iter().map(|id| (id, true)).collect(),
        }
    }

    pub fn is_completed(&self, task_id: i64) -> bool {
        self.completed.contains_key(&task_id)
    }
}
