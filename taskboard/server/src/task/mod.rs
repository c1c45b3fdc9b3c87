use crate::entities::*;
use chrono::{DateTime, SubsecRound, Utc};
use sea_orm::*;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

pub mod api;

#[derive(Debug, PartialEq, Clone, Eq)]
pub struct Task {
    id: Uuid,
    title: String,
    description: String,
    completed: bool,
    owner_id: Uuid,
    created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        id: Uuid,
        title: String,
        description: String,
        completed: bool,
        owner_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            description,
            completed,
            owner_id,
            created_at,
        }
    }

    /// Returns the ID of the task.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the title of the task.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the description of the task.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns whether the task has been completed.
    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Returns the ID of the user who owns the task.
    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    /// Returns when the task was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl From<task::Model> for Task {
    fn from(model: task::Model) -> Self {
        Task::new(
            model.id,
            model.title,
            model.description,
            model.completed,
            model.owner_id,
            model.created_at.with_timezone(&Utc),
        )
    }
}

/// Fields supplied when creating a task.
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct NewTask {
    /// Title of the task. Required and must not be blank.
    #[serde(default)]
    pub title: Option<String>,
    /// Optional description, empty when omitted.
    #[serde(default)]
    pub description: Option<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Sparse patch applied to an existing task. Absent fields are left unchanged.
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.completed.is_none()
    }
}

/// Error type for TaskService operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskServiceError {
    /// Represents a request that failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),
    /// Represents a task that does not exist or belongs to another user.
    #[error("Task {0} not found")]
    NotFound(Uuid),
    /// Represents a database error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

#[derive(Clone, Debug)]
pub struct TaskState {
    pub db: Arc<sea_orm::DatabaseConnection>,
}

pub struct TaskService<'a> {
    db: &'a sea_orm::DatabaseConnection,
}

impl TaskService<'_> {
    pub fn new(db: &sea_orm::DatabaseConnection) -> TaskService<'_> {
        TaskService { db }
    }

    /// Retrieves every task owned by the given user, most recently created first.
    #[tracing::instrument(skip(self))]
    pub async fn list_tasks(&self, owner_id: Uuid) -> Result<Vec<Task>, TaskServiceError> {
        let tasks = task::Entity::find()
            .filter(task::Column::OwnerId.eq(owner_id))
            .order_by_desc(task::Column::CreatedAt)
            .order_by_desc(task::Column::Id)
            .all(self.db)
            .await?
            .into_iter()
            .map(Task::from)
            .collect();
        Ok(tasks)
    }

    /// Creates a new task owned by the given user.
    ///
    /// # Arguments
    ///
    /// * `owner_id` - The ID of the authenticated user creating the task.
    /// * `new_task` - The title and optional description of the task.
    ///
    /// # Returns
    ///
    /// A `Result` containing the persisted `Task`, or `Validation` if the title is missing or blank.
    #[tracing::instrument(skip(self, new_task))]
    pub async fn create_task(
        &self,
        owner_id: Uuid,
        new_task: NewTask,
    ) -> Result<Task, TaskServiceError> {
        let title = new_task.title.unwrap_or_default();
        validate_title(&title)?;

        let active_model = task::ActiveModel {
            id: ActiveValue::Set(Uuid::now_v7()),
            title: ActiveValue::Set(title),
            description: ActiveValue::Set(new_task.description.unwrap_or_default()),
            completed: ActiveValue::Set(false),
            owner_id: ActiveValue::Set(owner_id),
            created_at: ActiveValue::Set(Utc::now().trunc_subsecs(6).fixed_offset()),
        };
        let created_model = active_model.insert(self.db).await?;
        Ok(Task::from(created_model))
    }

    /// Applies a sparse patch to a task owned by the given user.
    ///
    /// # Arguments
    ///
    /// * `owner_id` - The ID of the authenticated user.
    /// * `id` - The ID of the task to update.
    /// * `patch` - The fields to change. Absent fields keep their stored value.
    ///
    /// # Returns
    ///
    /// A `Result` containing the updated `Task`, `NotFound` if the user owns no such task,
    /// or `Validation` if the patch carries a blank title.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_task(
        &self,
        owner_id: Uuid,
        id: Uuid,
        patch: TaskPatch,
    ) -> Result<Task, TaskServiceError> {
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }

        let task_to_update = self.find_owned_task(owner_id, id).await?;
        if patch.is_empty() {
            return Ok(Task::from(task_to_update));
        }

        let mut active_model: task::ActiveModel = task_to_update.into();
        if let Some(title) = patch.title {
            active_model.title = ActiveValue::Set(title);
        }
        if let Some(description) = patch.description {
            active_model.description = ActiveValue::Set(description);
        }
        if let Some(completed) = patch.completed {
            active_model.completed = ActiveValue::Set(completed);
        }
        let updated_model = active_model.update(self.db).await?;

        Ok(Task::from(updated_model))
    }

    /// Permanently deletes a task owned by the given user.
    ///
    /// # Returns
    ///
    /// A `Result` containing the deleted `Task`, or `NotFound` if the user owns no such task.
    #[tracing::instrument(skip(self))]
    pub async fn delete_task(&self, owner_id: Uuid, id: Uuid) -> Result<Task, TaskServiceError> {
        let task_to_delete = self.find_owned_task(owner_id, id).await?;

        let result = task::Entity::delete_many()
            .filter(task::Column::Id.eq(id))
            .filter(task::Column::OwnerId.eq(owner_id))
            .exec(self.db)
            .await?;
        // A concurrent delete can remove the row between the lookup and this statement.
        if result.rows_affected == 0 {
            return Err(TaskServiceError::NotFound(id));
        }

        Ok(Task::from(task_to_delete))
    }

    /// Looks up a task by ID, scoped to its owner.
    ///
    /// A task that exists but belongs to someone else yields the same `NotFound`
    /// as a task that does not exist at all.
    #[tracing::instrument(skip(self))]
    pub async fn find_owned_task(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<task::Model, TaskServiceError> {
        task::Entity::find_by_id(id)
            .filter(task::Column::OwnerId.eq(owner_id))
            .one(self.db)
            .await?
            .ok_or(TaskServiceError::NotFound(id))
    }
}

fn validate_title(title: &str) -> Result<(), TaskServiceError> {
    if title.trim().is_empty() {
        return Err(TaskServiceError::Validation("Title is required".to_string()));
    }
    Ok(())
}
