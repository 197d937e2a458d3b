use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use super::tags::TagRepository;
use crate::{
    entities::{NewTask, Task, TaskStatus, TaskWithTags},
    error::{AppError, Result},
};

/// Status narrowing for the task list. Unknown tokens mean `All`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    pub fn parse(token: &str) -> Self {
        match token {
            "active" => StatusFilter::Active,
            "completed" => StatusFilter::Completed,
            _ => StatusFilter::All,
        }
    }

    fn status(self) -> Option<TaskStatus> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Active => Some(TaskStatus::NotDone),
            StatusFilter::Completed => Some(TaskStatus::Done),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Case-insensitive substring of the description.
    pub search: Option<String>,
    pub status: StatusFilter,
    /// Ignored when no tag with this id exists.
    pub tag_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct TaskRepository {
    pool: SqlitePool,
}

impl TaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The user's non-archived tasks matching every filter, by sort order.
    pub async fn list(&self, user_id: i64, filter: &TaskFilter) -> Result<Vec<TaskWithTags>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT t.* FROM tasks t WHERE t.is_archived = 0 AND t.user_id = ");
        query.push_bind(user_id);

        if let Some(status) = filter.status.status() {
            query.push(" AND t.status = ").push_bind(status);
        }

        if let Some(tag_id) = self.existing_tag(filter.tag_id).await? {
            query
                .push(" AND EXISTS (SELECT 1 FROM task_tags tt WHERE tt.task_id = t.id AND tt.tag_id = ")
                .push_bind(tag_id)
                .push(")");
        }

        query.push(" ORDER BY t.sort_order, t.id");

        let mut tasks = query.build_query_as::<Task>().fetch_all(&self.pool).await?;

        // SQLite only folds ASCII case, so the text match happens here.
        if let Some(needle) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            tasks.retain(|task| matches_search(&task.description, needle));
        }

        self.with_tags(tasks).await
    }

    /// Archived tasks of the user, most recently added first.
    pub async fn archived(&self, user_id: i64) -> Result<Vec<TaskWithTags>> {
        let tasks = sqlx::query_as(
            "SELECT * FROM tasks WHERE user_id = ? AND is_archived = 1 ORDER BY added DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.with_tags(tasks).await
    }

    pub async fn find(&self, user_id: i64, task_id: i64) -> Result<Option<Task>> {
        let task = sqlx::query_as("SELECT * FROM tasks WHERE id = ? AND user_id = ?")
            .bind(task_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    /// Insert a task at the end of the user's order and link its tags.
    pub async fn create(&self, user_id: i64, new: NewTask, added: NaiveDateTime) -> Result<Task> {
        let mut tx = self.pool.begin().await?;

        let max_order: Option<i64> =
            sqlx::query_scalar("SELECT MAX(sort_order) FROM tasks WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        let sort_order = max_order.map_or(0, |max| max + 1);

        let task: Task = sqlx::query_as(
            "INSERT INTO tasks \
             (user_id, description, added, deadline, status, is_archived, priority, sort_order, attachment_filename) \
             VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?) RETURNING *",
        )
        .bind(user_id)
        .bind(&new.description)
        .bind(added)
        .bind(new.deadline)
        .bind(TaskStatus::NotDone)
        .bind(new.priority)
        .bind(sort_order)
        .bind(&new.attachment_filename)
        .fetch_one(&mut *tx)
        .await?;

        for name in &new.tag_names {
            let tag = TagRepository::find_or_create(&mut tx, name).await?;
            TagRepository::attach(&mut tx, task.id, tag.id).await?;
        }

        tx.commit().await?;
        Ok(task)
    }

    pub async fn complete(&self, user_id: i64, task_id: i64, today: NaiveDate) -> Result<()> {
        let result = sqlx::query(
            "UPDATE tasks SET status = ?, completed_date = ? WHERE id = ? AND user_id = ?",
        )
        .bind(TaskStatus::Done)
        .bind(today)
        .bind(task_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        found(result.rows_affected())
    }

    pub async fn archive(&self, user_id: i64, task_id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE tasks SET is_archived = 1 WHERE id = ? AND user_id = ?")
            .bind(task_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        found(result.rows_affected())
    }

    /// Unarchive and reset to not-done, dropping any completion date.
    pub async fn restore(&self, user_id: i64, task_id: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE tasks SET is_archived = 0, status = ?, completed_date = NULL \
             WHERE id = ? AND user_id = ?",
        )
        .bind(TaskStatus::NotDone)
        .bind(task_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        found(result.rows_affected())
    }

    /// Remove the task and its tag links, returning the deleted row.
    pub async fn delete(&self, user_id: i64, task_id: i64) -> Result<Task> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM task_tags WHERE task_id IN (SELECT id FROM tasks WHERE id = ? AND user_id = ?)",
        )
        .bind(task_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let deleted: Option<Task> =
            sqlx::query_as("DELETE FROM tasks WHERE id = ? AND user_id = ? RETURNING *")
                .bind(task_id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;

        let task = deleted.ok_or(AppError::NotFound)?;
        tx.commit().await?;
        Ok(task)
    }

    /// Give each owned id its position in `ordered_ids` as sort order.
    /// Ids the user does not own are skipped. Returns the number updated.
    pub async fn reorder(&self, user_id: i64, ordered_ids: &[i64]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut updated = 0;

        for (position, &task_id) in ordered_ids.iter().enumerate() {
            let result = sqlx::query("UPDATE tasks SET sort_order = ? WHERE id = ? AND user_id = ?")
                .bind(position as i64)
                .bind(task_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            updated += result.rows_affected();
        }

        tx.commit().await?;
        debug!(user_id, requested = ordered_ids.len(), updated, "reorder applied");
        Ok(updated)
    }

    /// Done tasks whose completion date falls in `from..=to`.
    pub async fn count_completed_between(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tasks \
             WHERE user_id = ? AND status = ? AND completed_date BETWEEN ? AND ?",
        )
        .bind(user_id)
        .bind(TaskStatus::Done)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Per-day completion counts in `from..=to`; days without completions
    /// are absent.
    pub async fn completions_by_day(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(NaiveDate, i64)>> {
        let rows = sqlx::query_as(
            "SELECT completed_date, COUNT(*) FROM tasks \
             WHERE user_id = ? AND status = ? AND completed_date BETWEEN ? AND ? \
             GROUP BY completed_date",
        )
        .bind(user_id)
        .bind(TaskStatus::Done)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn existing_tag(&self, tag_id: Option<i64>) -> Result<Option<i64>> {
        let Some(tag_id) = tag_id else {
            return Ok(None);
        };
        let tag = TagRepository::new(self.pool.clone()).find(tag_id).await?;
        Ok(tag.map(|tag| tag.id))
    }

    async fn with_tags(&self, tasks: Vec<Task>) -> Result<Vec<TaskWithTags>> {
        let ids: Vec<i64> = tasks.iter().map(|task| task.id).collect();
        let mut tags = TagRepository::new(self.pool.clone()).for_tasks(&ids).await?;

        Ok(tasks
            .into_iter()
            .map(|task| TaskWithTags {
                tags: tags.remove(&task.id).unwrap_or_default(),
                task,
            })
            .collect())
    }
}

fn found(rows_affected: u64) -> Result<()> {
    if rows_affected > 0 {
        Ok(())
    } else {
        Err(AppError::NotFound)
    }
}

fn matches_search(description: &str, needle: &str) -> bool {
    description.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entities::DEFAULT_PRIORITY,
        store::{testing, TagRepository},
    };
    use chrono::Duration;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_task(description: &str, tags: &[&str]) -> NewTask {
        NewTask {
            description: description.into(),
            priority: DEFAULT_PRIORITY,
            deadline: None,
            tag_names: tags.iter().map(|t| t.to_string()).collect(),
            attachment_filename: None,
        }
    }

    async fn add(repo: &TaskRepository, user_id: i64, description: &str, tags: &[&str]) -> Task {
        let added = day(2024, 5, 1).and_hms_opt(12, 0, 0).unwrap();
        repo.create(user_id, new_task(description, tags), added)
            .await
            .unwrap()
    }

    fn descriptions(tasks: &[TaskWithTags]) -> Vec<&str> {
        tasks.iter().map(|t| t.task.description.as_str()).collect()
    }

    #[tokio::test]
    async fn sort_order_starts_at_zero_and_increments() {
        let pool = testing::pool().await;
        let alice = testing::user(&pool, "alice").await;
        let repo = TaskRepository::new(pool);

        assert_eq!(add(&repo, alice.id, "first", &[]).await.sort_order, 0);
        assert_eq!(add(&repo, alice.id, "second", &[]).await.sort_order, 1);
        assert_eq!(add(&repo, alice.id, "third", &[]).await.sort_order, 2);
    }

    #[tokio::test]
    async fn sort_order_is_per_user() {
        let pool = testing::pool().await;
        let alice = testing::user(&pool, "alice").await;
        let bob = testing::user(&pool, "bob").await;
        let repo = TaskRepository::new(pool);

        add(&repo, alice.id, "a1", &[]).await;
        add(&repo, alice.id, "a2", &[]).await;
        assert_eq!(add(&repo, bob.id, "b1", &[]).await.sort_order, 0);
    }

    #[tokio::test]
    async fn sort_order_follows_max_after_reorder() {
        let pool = testing::pool().await;
        let alice = testing::user(&pool, "alice").await;
        let repo = TaskRepository::new(pool);

        let a = add(&repo, alice.id, "a", &[]).await;
        let b = add(&repo, alice.id, "b", &[]).await;
        repo.reorder(alice.id, &[b.id, a.id]).await.unwrap();
        sqlx::query("UPDATE tasks SET sort_order = 9 WHERE id = ?")
            .bind(a.id)
            .execute(&repo.pool)
            .await
            .unwrap();

        assert_eq!(add(&repo, alice.id, "c", &[]).await.sort_order, 10);
    }

    #[tokio::test]
    async fn listing_hides_other_users_and_archived_tasks() {
        let pool = testing::pool().await;
        let alice = testing::user(&pool, "alice").await;
        let bob = testing::user(&pool, "bob").await;
        let repo = TaskRepository::new(pool);

        add(&repo, alice.id, "visible", &[]).await;
        let hidden = add(&repo, alice.id, "archived", &[]).await;
        add(&repo, bob.id, "bob's", &[]).await;
        repo.archive(alice.id, hidden.id).await.unwrap();

        let listed = repo.list(alice.id, &TaskFilter::default()).await.unwrap();
        assert_eq!(descriptions(&listed), vec!["visible"]);
        assert!(listed.iter().all(|t| t.task.user_id == alice.id && !t.task.is_archived));
    }

    #[tokio::test]
    async fn filters_combine_with_and() {
        let pool = testing::pool().await;
        let alice = testing::user(&pool, "alice").await;
        let repo = TaskRepository::new(pool);
        let today = day(2024, 5, 10);

        let milk = add(&repo, alice.id, "Buy milk", &["errands"]).await;
        add(&repo, alice.id, "Buy bread", &["errands"]).await;
        add(&repo, alice.id, "Call mom", &["home"]).await;
        repo.complete(alice.id, milk.id, today).await.unwrap();

        let errands = TagRepository::new(repo.pool.clone())
            .all()
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.name == "errands")
            .unwrap();

        let filter = TaskFilter {
            search: Some("BUY".into()),
            status: StatusFilter::Active,
            tag_id: Some(errands.id),
        };
        let listed = repo.list(alice.id, &filter).await.unwrap();
        assert_eq!(descriptions(&listed), vec!["Buy bread"]);

        let completed = TaskFilter {
            status: StatusFilter::Completed,
            ..TaskFilter::default()
        };
        let listed = repo.list(alice.id, &completed).await.unwrap();
        assert_eq!(descriptions(&listed), vec!["Buy milk"]);
    }

    #[tokio::test]
    async fn search_folds_non_ascii_case() {
        let pool = testing::pool().await;
        let alice = testing::user(&pool, "alice").await;
        let repo = TaskRepository::new(pool);

        add(&repo, alice.id, "Купить молоко", &[]).await;
        add(&repo, alice.id, "Позвонить", &[]).await;

        let filter = TaskFilter {
            search: Some("МОЛОКО".into()),
            ..TaskFilter::default()
        };
        let listed = repo.list(alice.id, &filter).await.unwrap();
        assert_eq!(descriptions(&listed), vec!["Купить молоко"]);
    }

    #[tokio::test]
    async fn unknown_tag_filter_is_ignored() {
        let pool = testing::pool().await;
        let alice = testing::user(&pool, "alice").await;
        let repo = TaskRepository::new(pool);

        add(&repo, alice.id, "one", &["x"]).await;
        add(&repo, alice.id, "two", &[]).await;

        let unfiltered = repo.list(alice.id, &TaskFilter::default()).await.unwrap();
        let bogus = TaskFilter {
            tag_id: Some(4242),
            ..TaskFilter::default()
        };
        let filtered = repo.list(alice.id, &bogus).await.unwrap();
        assert_eq!(descriptions(&filtered), descriptions(&unfiltered));
    }

    #[tokio::test]
    async fn tags_are_shared_and_deduplicated() {
        let pool = testing::pool().await;
        let alice = testing::user(&pool, "alice").await;
        let bob = testing::user(&pool, "bob").await;
        let repo = TaskRepository::new(pool);

        add(&repo, alice.id, "a", &["errands", "home"]).await;
        add(&repo, bob.id, "b", &["home"]).await;

        let tags = TagRepository::new(repo.pool.clone()).all().await.unwrap();
        assert_eq!(tags.len(), 2);

        let listed = repo.list(alice.id, &TaskFilter::default()).await.unwrap();
        let names: Vec<&str> = listed[0].tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["errands", "home"]);
    }

    #[tokio::test]
    async fn complete_and_restore_cycle() {
        let pool = testing::pool().await;
        let alice = testing::user(&pool, "alice").await;
        let repo = TaskRepository::new(pool);
        let today = day(2024, 5, 10);

        let task = add(&repo, alice.id, "cycle", &[]).await;
        repo.complete(alice.id, task.id, today).await.unwrap();
        let done = repo.find(alice.id, task.id).await.unwrap().unwrap();
        assert_eq!(done.status, TaskStatus::Done);
        assert_eq!(done.completed_date, Some(today));

        repo.archive(alice.id, task.id).await.unwrap();
        assert!(repo.list(alice.id, &TaskFilter::default()).await.unwrap().is_empty());
        assert_eq!(repo.archived(alice.id).await.unwrap().len(), 1);

        repo.restore(alice.id, task.id).await.unwrap();
        let restored = repo.find(alice.id, task.id).await.unwrap().unwrap();
        assert_eq!(restored.status, TaskStatus::NotDone);
        assert_eq!(restored.completed_date, None);
        assert!(!restored.is_archived);
    }

    #[tokio::test]
    async fn restore_resets_even_an_active_task() {
        let pool = testing::pool().await;
        let alice = testing::user(&pool, "alice").await;
        let repo = TaskRepository::new(pool);

        let task = add(&repo, alice.id, "never archived", &[]).await;
        repo.complete(alice.id, task.id, day(2024, 5, 10)).await.unwrap();
        repo.restore(alice.id, task.id).await.unwrap();

        let restored = repo.find(alice.id, task.id).await.unwrap().unwrap();
        assert_eq!(restored.status, TaskStatus::NotDone);
        assert_eq!(restored.completed_date, None);
    }

    #[tokio::test]
    async fn mutations_on_foreign_tasks_are_not_found() {
        let pool = testing::pool().await;
        let alice = testing::user(&pool, "alice").await;
        let mallory = testing::user(&pool, "mallory").await;
        let repo = TaskRepository::new(pool);
        let task = add(&repo, alice.id, "private", &[]).await;

        for result in [
            repo.complete(mallory.id, task.id, day(2024, 5, 10)).await,
            repo.archive(mallory.id, task.id).await,
            repo.restore(mallory.id, task.id).await,
            repo.delete(mallory.id, task.id).await.map(|_| ()),
            repo.complete(alice.id, 9999, day(2024, 5, 10)).await,
        ] {
            assert!(matches!(result, Err(AppError::NotFound)));
        }

        let untouched = repo.find(alice.id, task.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, TaskStatus::NotDone);
        assert!(!untouched.is_archived);
    }

    #[tokio::test]
    async fn delete_removes_task_and_tag_links() {
        let pool = testing::pool().await;
        let alice = testing::user(&pool, "alice").await;
        let repo = TaskRepository::new(pool);

        let task = add(&repo, alice.id, "gone", &["tmp"]).await;
        let deleted = repo.delete(alice.id, task.id).await.unwrap();
        assert_eq!(deleted.id, task.id);
        assert!(repo.find(alice.id, task.id).await.unwrap().is_none());

        let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM task_tags")
            .fetch_one(&repo.pool)
            .await
            .unwrap();
        assert_eq!(links, 0);
        // orphaned tags are kept
        assert_eq!(TagRepository::new(repo.pool.clone()).all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn complete_reorder_assigns_positions() {
        let pool = testing::pool().await;
        let alice = testing::user(&pool, "alice").await;
        let repo = TaskRepository::new(pool);

        let a = add(&repo, alice.id, "a", &[]).await;
        let b = add(&repo, alice.id, "b", &[]).await;
        let c = add(&repo, alice.id, "c", &[]).await;

        let updated = repo.reorder(alice.id, &[c.id, a.id, b.id]).await.unwrap();
        assert_eq!(updated, 3);

        let listed = repo.list(alice.id, &TaskFilter::default()).await.unwrap();
        assert_eq!(descriptions(&listed), vec!["c", "a", "b"]);
        let orders: Vec<i64> = listed.iter().map(|t| t.task.sort_order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn reorder_skips_foreign_and_unknown_ids() {
        let pool = testing::pool().await;
        let alice = testing::user(&pool, "alice").await;
        let bob = testing::user(&pool, "bob").await;
        let repo = TaskRepository::new(pool);

        let mine = add(&repo, alice.id, "mine", &[]).await;
        add(&repo, alice.id, "filler", &[]).await;
        add(&repo, bob.id, "theirs first", &[]).await;
        let theirs = add(&repo, bob.id, "theirs", &[]).await;

        let updated = repo.reorder(alice.id, &[theirs.id, 777, mine.id]).await.unwrap();
        assert_eq!(updated, 1);
        assert_eq!(repo.find(alice.id, mine.id).await.unwrap().unwrap().sort_order, 2);
        assert_eq!(repo.find(bob.id, theirs.id).await.unwrap().unwrap().sort_order, 1);
    }

    #[tokio::test]
    async fn completion_counts_ignore_archive_flag() {
        let pool = testing::pool().await;
        let alice = testing::user(&pool, "alice").await;
        let repo = TaskRepository::new(pool);
        let today = day(2024, 5, 10);

        let a = add(&repo, alice.id, "a", &[]).await;
        let b = add(&repo, alice.id, "b", &[]).await;
        repo.complete(alice.id, a.id, today).await.unwrap();
        repo.complete(alice.id, b.id, today).await.unwrap();
        repo.archive(alice.id, b.id).await.unwrap();

        let count = repo
            .count_completed_between(alice.id, today - Duration::days(1), today)
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            repo.completions_by_day(alice.id, today, today).await.unwrap(),
            vec![(today, 2)]
        );
    }
}
