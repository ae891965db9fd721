use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::now_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    Active,
    Completed,
    Failed,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub name: String,
    pub status: StepStatus,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub steps: Vec<Step>,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Incoming step payload; ids and statuses are assigned server-side unless
/// the client supplies them (PUT round-trips existing steps).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDraft {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<StepStatus>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDraft {
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<WorkflowStatus>,
    #[serde(default)]
    pub steps: Option<Vec<StepDraft>>,
}

/// In-memory CRUD store. Status transitions are manual client edits; there
/// is no scheduler driving them.
pub struct WorkflowStore {
    items: RwLock<HashMap<String, Workflow>>,
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    pub async fn list(&self) -> Vec<Workflow> {
        let mut all: Vec<Workflow> = self.items.read().await.values().cloned().collect();
        all.sort_by_key(|w| w.created_at);
        all
    }

    pub async fn count(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn get(&self, id: &str) -> Option<Workflow> {
        self.items.read().await.get(id).cloned()
    }

    /// Create a workflow; a missing or blank `name` is the one rejection.
    pub async fn create(&self, draft: WorkflowDraft) -> Result<Workflow, String> {
        let name = match draft.name.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => return Err("Invalid workflow data".to_string()),
        };

        let now = now_millis();
        let workflow = Workflow {
            id: Uuid::new_v4().to_string(),
            name,
            description: draft.description.unwrap_or_default(),
            status: draft.status.unwrap_or(WorkflowStatus::Draft),
            steps: draft
                .steps
                .unwrap_or_default()
                .into_iter()
                .map(materialize_step)
                .collect(),
            created_at: now,
            updated_at: now,
        };

        self.items
            .write()
            .await
            .insert(workflow.id.clone(), workflow.clone());
        Ok(workflow)
    }

    /// Merge a draft onto an existing workflow; absent fields keep their
    /// current value. Returns `None` for unknown ids.
    pub async fn update(&self, id: &str, draft: WorkflowDraft) -> Option<Workflow> {
        let mut items = self.items.write().await;
        let workflow = items.get_mut(id)?;

        if let Some(name) = draft.name {
            let trimmed = name.trim();
            if !trimmed.is_empty() {
                workflow.name = trimmed.to_string();
            }
        }
        if let Some(description) = draft.description {
            workflow.description = description;
        }
        if let Some(status) = draft.status {
            workflow.status = status;
        }
        if let Some(steps) = draft.steps {
            workflow.steps = steps.into_iter().map(materialize_step).collect();
        }
        workflow.updated_at = now_millis();
        Some(workflow.clone())
    }

    pub async fn delete(&self, id: &str) -> bool {
        self.items.write().await.remove(id).is_some()
    }

    /// "Run" only marks state: workflow goes active, the first step moves to
    /// in_progress. Step completion remains a manual dashboard action.
    pub async fn run(&self, id: &str) -> Option<Workflow> {
        let mut items = self.items.write().await;
        let workflow = items.get_mut(id)?;
        workflow.status = WorkflowStatus::Active;
        if let Some(first) = workflow.steps.first_mut() {
            first.status = StepStatus::InProgress;
        }
        workflow.updated_at = now_millis();
        Some(workflow.clone())
    }
}

impl Default for WorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

fn materialize_step(draft: StepDraft) -> Step {
    Step {
        id: draft.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        name: draft.name,
        status: draft.status.unwrap_or(StepStatus::Pending),
        description: draft.description,
        agent_id: draft.agent_id,
        dependencies: draft.dependencies,
    }
}
