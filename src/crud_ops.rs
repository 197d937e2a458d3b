use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::HeaderMap,
    response::{Html, Redirect},
    Json,
};
use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tera::Context;
use tracing::{debug, info};

use crate::{
    analytics,
    authentication::{current_user, AuthSession},
    entities::{NewTask, TaskWithTags, DEFAULT_PRIORITY, MAX_DESCRIPTION_LEN},
    error::Result,
    preferences::Preferences,
    store::{parse_tag_list, tag_name_fits, StatusFilter, TaskFilter},
    views::redirect_back,
    AppState,
};

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum DeadlineState {
    Overdue,
    Today,
    Upcoming,
}

/// A listed task plus what the page shows about its deadline.
#[derive(Debug, Serialize)]
struct TaskView {
    #[serde(flatten)]
    item: TaskWithTags,
    deadline_state: Option<DeadlineState>,
    /// Absolute distance to the deadline in days.
    deadline_days: i64,
}

impl TaskView {
    fn new(item: TaskWithTags, today: NaiveDate) -> Self {
        let days = item.task.days_until_deadline(today);
        let deadline_state = days.map(|days| match days {
            d if d < 0 => DeadlineState::Overdue,
            0 => DeadlineState::Today,
            _ => DeadlineState::Upcoming,
        });
        Self {
            item,
            deadline_state,
            deadline_days: days.unwrap_or(0).abs(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    // kept as text: an empty or non-numeric value means "no tag filter"
    pub tag: Option<String>,
}

impl ListQuery {
    fn filter(&self) -> TaskFilter {
        TaskFilter {
            search: self.search.clone().filter(|s| !s.is_empty()),
            status: StatusFilter::parse(self.status.as_deref().unwrap_or("all")),
            tag_id: self.tag.as_deref().and_then(|tag| tag.trim().parse().ok()),
        }
    }
}

pub async fn index(
    auth_session: AuthSession,
    prefs: Preferences,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Html<String>> {
    let user = current_user(&auth_session)?;
    let filter = query.filter();
    let today = today();

    let tasks: Vec<TaskView> = state
        .tasks
        .list(user.id, &filter)
        .await?
        .into_iter()
        .map(|item| TaskView::new(item, today))
        .collect();
    let all_tags = state.tags.all().await?;

    let mut context = Context::new();
    context.insert("tasks", &tasks);
    context.insert("all_tags", &all_tags);
    context.insert("today", &today);
    context.insert("search_term", filter.search.as_deref().unwrap_or_default());
    context.insert("status_filter", &filter.status);
    context.insert("tag_filter_id", &filter.tag_id);
    state
        .views
        .render("index.html", prefs, Some(&user.username), context)
}

#[derive(Debug, Default)]
struct AddTaskForm {
    description: String,
    priority: Option<String>,
    deadline: Option<String>,
    tags: Option<String>,
    /// Client filename and contents; absent when no file was chosen.
    attachment: Option<(String, Bytes)>,
}

impl AddTaskForm {
    async fn read(multipart: &mut Multipart) -> Result<Self> {
        let mut form = AddTaskForm::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            match name.as_str() {
                "description" => form.description = field.text().await?,
                "priority" => form.priority = Some(field.text().await?),
                "deadline" => form.deadline = Some(field.text().await?),
                "tags" => form.tags = Some(field.text().await?),
                "attachment" => {
                    let file_name = field.file_name().unwrap_or_default().to_owned();
                    let contents = field.bytes().await?;
                    if !file_name.is_empty() {
                        form.attachment = Some((file_name, contents));
                    }
                }
                other => debug!(field = other, "ignoring unknown form field"),
            }
        }
        Ok(form)
    }
}

fn parse_deadline(raw: Option<&str>) -> Result<Option<NaiveDate>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => Ok(Some(NaiveDate::parse_from_str(text, "%Y-%m-%d")?)),
        None => Ok(None),
    }
}

fn parse_priority(raw: Option<&str>) -> i64 {
    raw.and_then(|p| p.trim().parse().ok())
        .unwrap_or(DEFAULT_PRIORITY)
}

pub async fn add_task(
    auth_session: AuthSession,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Redirect> {
    let user = current_user(&auth_session)?;
    let form = AddTaskForm::read(&mut multipart).await?;

    let description = form.description.trim();
    if description.is_empty() || description.chars().count() > MAX_DESCRIPTION_LEN {
        debug!(user_id = user.id, "rejected task without a usable description");
        return Ok(Redirect::to("/"));
    }

    let tag_names = form.tags.as_deref().map(parse_tag_list).unwrap_or_default();
    if !tag_names.iter().all(|name| tag_name_fits(name)) {
        debug!(user_id = user.id, "rejected task with an over-long tag");
        return Ok(Redirect::to("/"));
    }

    let deadline = parse_deadline(form.deadline.as_deref())?;

    // the file lands before the row that references it is committed
    let attachment_filename = match &form.attachment {
        Some((file_name, contents)) => state.files.save(file_name, contents).await?,
        None => None,
    };

    let new = NewTask {
        description: description.to_owned(),
        priority: parse_priority(form.priority.as_deref()),
        deadline,
        tag_names,
        attachment_filename,
    };
    let task = state.tasks.create(user.id, new, Utc::now().naive_utc()).await?;
    info!(user_id = user.id, task_id = task.id, "task added");

    Ok(Redirect::to("/"))
}

#[derive(Debug, Deserialize)]
pub struct OrderPayload {
    #[serde(default)]
    pub order: Vec<i64>,
}

pub async fn update_order(
    auth_session: AuthSession,
    State(state): State<AppState>,
    Json(payload): Json<OrderPayload>,
) -> Result<Json<Value>> {
    let user = current_user(&auth_session)?;
    state.tasks.reorder(user.id, &payload.order).await?;
    Ok(Json(json!({ "status": "success" })))
}

pub async fn complete_task(
    auth_session: AuthSession,
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
) -> Result<Redirect> {
    let user = current_user(&auth_session)?;
    state.tasks.complete(user.id, task_id, today()).await?;
    Ok(redirect_back(&headers, "/"))
}

pub async fn archive_task(
    auth_session: AuthSession,
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
) -> Result<Redirect> {
    let user = current_user(&auth_session)?;
    state.tasks.archive(user.id, task_id).await?;
    Ok(redirect_back(&headers, "/"))
}

pub async fn restore_task(
    auth_session: AuthSession,
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
) -> Result<Redirect> {
    let user = current_user(&auth_session)?;
    state.tasks.restore(user.id, task_id).await?;
    Ok(redirect_back(&headers, "/archive"))
}

pub async fn delete_task(
    auth_session: AuthSession,
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
) -> Result<Redirect> {
    let user = current_user(&auth_session)?;
    let task = state.tasks.delete(user.id, task_id).await?;
    if let Some(file_name) = &task.attachment_filename {
        state.files.remove(file_name).await;
    }
    info!(user_id = user.id, task_id, "task deleted");
    Ok(redirect_back(&headers, "/"))
}

pub async fn archive(
    auth_session: AuthSession,
    prefs: Preferences,
    State(state): State<AppState>,
) -> Result<Html<String>> {
    let user = current_user(&auth_session)?;
    let tasks = state.tasks.archived(user.id).await?;

    let mut context = Context::new();
    context.insert("tasks", &tasks);
    state
        .views
        .render("archive.html", prefs, Some(&user.username), context)
}

pub async fn analytics(
    auth_session: AuthSession,
    prefs: Preferences,
    State(state): State<AppState>,
) -> Result<Html<String>> {
    let user = current_user(&auth_session)?;
    let stats = analytics::completion_stats(&state.tasks, user.id, today()).await?;

    let peak = stats.daily.iter().map(|day| day.count).max().unwrap_or(0).max(1);
    let chart: Vec<Value> = stats
        .daily
        .iter()
        .map(|day| {
            json!({
                "label": day.label,
                "count": day.count,
                "percent": day.count * 100 / peak,
            })
        })
        .collect();

    let mut context = Context::new();
    context.insert("tasks_this_week", &stats.this_week);
    context.insert("tasks_this_month", &stats.this_month);
    context.insert("chart", &chart);
    state
        .views
        .render("analytics.html", prefs, Some(&user.username), context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Task, TaskStatus};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn item(deadline: Option<NaiveDate>) -> TaskWithTags {
        TaskWithTags {
            task: Task {
                id: 3,
                user_id: 1,
                description: "file taxes".into(),
                added: day(2024, 4, 1).and_hms_opt(10, 0, 0).unwrap(),
                completed_date: None,
                deadline,
                status: TaskStatus::NotDone,
                is_archived: false,
                priority: 1,
                sort_order: 0,
                attachment_filename: None,
            },
            tags: Vec::new(),
        }
    }

    #[test]
    fn deadline_state_relative_to_today() {
        let today = day(2024, 4, 15);
        let overdue = TaskView::new(item(Some(day(2024, 4, 12))), today);
        assert_eq!(overdue.deadline_state, Some(DeadlineState::Overdue));
        assert_eq!(overdue.deadline_days, 3);

        let due = TaskView::new(item(Some(today)), today);
        assert_eq!(due.deadline_state, Some(DeadlineState::Today));

        let later = TaskView::new(item(Some(day(2024, 4, 20))), today);
        assert_eq!(later.deadline_state, Some(DeadlineState::Upcoming));
        assert_eq!(later.deadline_days, 5);

        assert_eq!(TaskView::new(item(None), today).deadline_state, None);
    }

    #[test]
    fn task_view_serializes_flat() {
        let view = TaskView::new(item(None), day(2024, 4, 15));
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["description"], "file taxes");
        assert_eq!(value["status"], "not_done");
        assert!(value["tags"].as_array().unwrap().is_empty());
    }

    #[test]
    fn list_query_tolerates_junk() {
        let query = ListQuery {
            search: Some(String::new()),
            status: Some("bogus".into()),
            tag: Some("".into()),
        };
        let filter = query.filter();
        assert_eq!(filter.search, None);
        assert_eq!(filter.status, StatusFilter::All);
        assert_eq!(filter.tag_id, None);

        let query = ListQuery {
            search: Some("milk".into()),
            status: Some("completed".into()),
            tag: Some("4".into()),
        };
        let filter = query.filter();
        assert_eq!(filter.search.as_deref(), Some("milk"));
        assert_eq!(filter.status, StatusFilter::Completed);
        assert_eq!(filter.tag_id, Some(4));
    }

    #[test]
    fn deadline_and_priority_parsing() {
        assert_eq!(parse_deadline(None).unwrap(), None);
        assert_eq!(parse_deadline(Some("  ")).unwrap(), None);
        assert_eq!(
            parse_deadline(Some("2024-06-01")).unwrap(),
            Some(day(2024, 6, 1))
        );
        assert!(parse_deadline(Some("01/06/2024")).is_err());

        assert_eq!(parse_priority(Some("1")), 1);
        assert_eq!(parse_priority(Some("high")), DEFAULT_PRIORITY);
        assert_eq!(parse_priority(None), DEFAULT_PRIORITY);
    }
}
