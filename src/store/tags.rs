use std::collections::HashMap;

use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::{
    entities::{Tag, MAX_TAG_LEN},
    error::Result,
};

#[derive(FromRow)]
struct TaskTagRow {
    task_id: i64,
    id: i64,
    name: String,
}

/// Tags live in one global namespace shared by every user.
#[derive(Debug, Clone)]
pub struct TagRepository {
    pool: SqlitePool,
}

impl TagRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn all(&self) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as("SELECT id, name FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    pub async fn find(&self, id: i64) -> Result<Option<Tag>> {
        let tag = sqlx::query_as("SELECT id, name FROM tags WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tag)
    }

    /// Tags of each listed task, keyed by task id and sorted by name.
    pub async fn for_tasks(&self, task_ids: &[i64]) -> Result<HashMap<i64, Vec<Tag>>> {
        let mut by_task: HashMap<i64, Vec<Tag>> = HashMap::new();
        if task_ids.is_empty() {
            return Ok(by_task);
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT tt.task_id, t.id, t.name FROM task_tags tt \
             JOIN tags t ON t.id = tt.tag_id WHERE tt.task_id IN (",
        );
        let mut ids = query.separated(", ");
        for id in task_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(") ORDER BY t.name");

        let rows = query.build_query_as::<TaskTagRow>().fetch_all(&self.pool).await?;
        for row in rows {
            by_task.entry(row.task_id).or_default().push(Tag {
                id: row.id,
                name: row.name,
            });
        }
        Ok(by_task)
    }

    /// Look a tag up by exact name, creating it on first use.
    pub(crate) async fn find_or_create(conn: &mut SqliteConnection, name: &str) -> Result<Tag> {
        sqlx::query("INSERT INTO tags (name) VALUES (?) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(&mut *conn)
            .await?;

        let tag = sqlx::query_as("SELECT id, name FROM tags WHERE name = ?")
            .bind(name)
            .fetch_one(&mut *conn)
            .await?;
        Ok(tag)
    }

    pub(crate) async fn attach(conn: &mut SqliteConnection, task_id: i64, tag_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO task_tags (task_id, tag_id) VALUES (?, ?)")
            .bind(task_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

/// Split a comma separated tag list into trimmed, unique, non-empty names,
/// keeping first-seen order. Lengths are left to [`tag_name_fits`].
pub fn parse_tag_list(csv: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in csv.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        if !names.iter().any(|seen| seen == name) {
            names.push(name.to_owned());
        }
    }
    names
}

pub fn tag_name_fits(name: &str) -> bool {
    name.chars().count() <= MAX_TAG_LEN
}
