//! Relational storage: one repository per entity over a shared SQLite pool.

mod tags;
mod tasks;
mod users;

use std::str::FromStr;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

pub use tags::{parse_tag_list, tag_name_fits, TagRepository};
pub use tasks::{StatusFilter, TaskFilter, TaskRepository};
pub use users::UserRepository;

/// Open (creating if needed) the database and apply pending migrations.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
