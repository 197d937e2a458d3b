//! UI text tables for the supported languages.

use std::{collections::HashMap, str::FromStr};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Ru,
    En,
}

impl Lang {
    pub fn code(self) -> &'static str {
        match self {
            Lang::Ru => "ru",
            Lang::En => "en",
        }
    }
}

impl FromStr for Lang {
    type Err = ();

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        match code {
            "ru" => Ok(Lang::Ru),
            "en" => Ok(Lang::En),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn name(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl FromStr for Theme {
    type Err = ();

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(()),
        }
    }
}

const RU: &[(&str, &str)] = &[
    ("title", "Менеджер задач"),
    ("header_tasks", "Мои задачи"),
    ("header_archive", "Архив задач"),
    ("header_analytics", "Аналитика"),
    ("auth_login_title", "Вход"),
    ("auth_register_title", "Регистрация"),
    ("username", "Имя пользователя"),
    ("password", "Пароль"),
    ("login_btn", "Войти"),
    ("register_btn", "Зарегистрироваться"),
    ("no_account", "Нет аккаунта?"),
    ("have_account", "Уже есть аккаунт?"),
    ("placeholder_desc", "Описание задачи"),
    ("label_priority", "Приоритет:"),
    ("priority_high", "Высокий"),
    ("priority_medium", "Средний"),
    ("priority_low", "Низкий"),
    ("label_tags", "Теги (через запятую):"),
    ("placeholder_tags", "работа, учеба"),
    ("label_deadline", "Дедлайн:"),
    ("label_attachment", "Прикрепить файл:"),
    ("add_task_btn", "Добавить задачу"),
    ("filter_search_placeholder", "Поиск по задачам..."),
    ("filter_all_statuses", "Все статусы"),
    ("filter_active", "Активные"),
    ("filter_completed", "Выполненные"),
    ("filter_all_tags", "Все теги"),
    ("filter_search_btn", "🔍"),
    ("filter_reset_btn", "Сбросить"),
    ("attachment_link", "📎 Файл"),
    ("deadline_overdue", "Просрочено"),
    ("deadline_today", "Сегодня"),
    ("deadline_days_left", "Осталось"),
    ("days_unit", "дн."),
    ("user_controls_analytics", "Аналитика"),
    ("user_controls_archive", "Архив"),
    ("user_controls_logout", "Выйти"),
    ("archive_restore_btn", "Восстановить"),
    ("archive_delete_forever_btn", "Удалить навсегда"),
    ("archive_back_link", "К задачам ↩️"),
    ("stats_this_week", "задач выполнено на этой неделе"),
    ("stats_this_month", "задач выполнено в этом месяце"),
    ("stats_header", "Активность за последние 30 дней"),
    ("chart_label", "Выполненные задачи"),
    ("complete_btn", "Выполнить"),
    ("archive_btn", "В архив"),
    ("delete_btn", "Удалить"),
    ("status_done", "выполнено"),
    ("status_not_done", "не выполнено"),
    ("theme_light", "Светлая тема"),
    ("theme_dark", "Тёмная тема"),
    ("empty_list", "Задач пока нет"),
    ("error_username_taken", "Имя пользователя уже занято"),
    ("error_invalid_credentials", "Неверное имя пользователя или пароль"),
    ("error_fields_required", "Заполните имя пользователя и пароль"),
    ("error_username_too_long", "Имя пользователя слишком длинное"),
];

const EN: &[(&str, &str)] = &[
    ("title", "Task Manager"),
    ("header_tasks", "My Tasks"),
    ("header_archive", "Task Archive"),
    ("header_analytics", "Analytics"),
    ("auth_login_title", "Login"),
    ("auth_register_title", "Register"),
    ("username", "Username"),
    ("password", "Password"),
    ("login_btn", "Login"),
    ("register_btn", "Register"),
    ("no_account", "No account?"),
    ("have_account", "Already have an account?"),
    ("placeholder_desc", "Task description"),
    ("label_priority", "Priority:"),
    ("priority_high", "High"),
    ("priority_medium", "Medium"),
    ("priority_low", "Low"),
    ("label_tags", "Tags (comma-separated):"),
    ("placeholder_tags", "work, study"),
    ("label_deadline", "Deadline:"),
    ("label_attachment", "Attach file:"),
    ("add_task_btn", "Add Task"),
    ("filter_search_placeholder", "Search tasks..."),
    ("filter_all_statuses", "All statuses"),
    ("filter_active", "Active"),
    ("filter_completed", "Completed"),
    ("filter_all_tags", "All tags"),
    ("filter_search_btn", "🔍"),
    ("filter_reset_btn", "Reset"),
    ("attachment_link", "📎 File"),
    ("deadline_overdue", "Overdue by"),
    ("deadline_today", "Today"),
    ("deadline_days_left", "days left"),
    ("days_unit", "d."),
    ("user_controls_analytics", "Analytics"),
    ("user_controls_archive", "Archive"),
    ("user_controls_logout", "Logout"),
    ("archive_restore_btn", "Restore"),
    ("archive_delete_forever_btn", "Delete permanently"),
    ("archive_back_link", "To tasks ↩️"),
    ("stats_this_week", "tasks completed this week"),
    ("stats_this_month", "tasks completed this month"),
    ("stats_header", "Activity in the last 30 days"),
    ("chart_label", "Completed tasks"),
    ("complete_btn", "Complete"),
    ("archive_btn", "Archive"),
    ("delete_btn", "Delete"),
    ("status_done", "done"),
    ("status_not_done", "not done"),
    ("theme_light", "Light theme"),
    ("theme_dark", "Dark theme"),
    ("empty_list", "No tasks yet"),
    ("error_username_taken", "Username is already taken"),
    ("error_invalid_credentials", "Invalid username or password"),
    ("error_fields_required", "Username and password are required"),
    ("error_username_too_long", "Username is too long"),
];

static TRANSLATIONS: Lazy<HashMap<Lang, HashMap<&'static str, &'static str>>> = Lazy::new(|| {
    HashMap::from([
        (Lang::Ru, RU.iter().copied().collect()),
        (Lang::En, EN.iter().copied().collect()),
    ])
});

/// Display string for `key`, or the key itself when it has no entry.
pub fn text<'a>(lang: Lang, key: &'a str) -> &'a str {
    TRANSLATIONS
        .get(&lang)
        .and_then(|table| table.get(key).copied())
        .unwrap_or(key)
}

/// Tera function backing `{{ t(key="...", lang=lang) }}`. An unknown or
/// missing language falls back to the default one.
pub fn tera_text(args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
    let key = args
        .get("key")
        .and_then(tera::Value::as_str)
        .ok_or_else(|| tera::Error::msg("t() needs a string `key` argument"))?;
    let lang = args
        .get("lang")
        .and_then(tera::Value::as_str)
        .and_then(|code| code.parse().ok())
        .unwrap_or_default();

    Ok(tera::Value::String(text(lang, key).to_owned()))
}
