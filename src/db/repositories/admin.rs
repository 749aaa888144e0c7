//! Admin list repository
//!
//! Builds one SELECT per `ModelAdmin` from its declared fields. Field names
//! and SQL expressions come only from the static admin registrations; every
//! user-supplied value is bound.

use super::escape_like;
use crate::db::DynDatabasePool;
use crate::models::{AdminFilter, AdminPage, ColumnKind, FilterValue, ModelAdmin};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite};
use std::sync::Arc;

#[async_trait]
pub trait AdminRepository: Send + Sync {
    /// One page of rows matching every filter and every search term
    async fn list(
        &self,
        admin: &ModelAdmin,
        filters: &[AdminFilter],
        terms: &[String],
        page: u32,
    ) -> Result<AdminPage>;
}

pub struct SqlxAdminRepository {
    pool: DynDatabasePool,
}

impl SqlxAdminRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AdminRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(Debug, Clone)]
enum BindValue {
    Int(i64),
    Text(String),
}

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

fn bind_all<'q>(mut query: SqliteQuery<'q>, values: &[BindValue]) -> SqliteQuery<'q> {
    for value in values {
        query = match value {
            BindValue::Int(i) => query.bind(*i),
            BindValue::Text(s) => query.bind(s.clone()),
        };
    }
    query
}

/// WHERE clause and its bind values
fn build_where(
    admin: &ModelAdmin,
    filters: &[AdminFilter],
    terms: &[String],
) -> Result<(String, Vec<BindValue>)> {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();

    for filter in filters {
        let field = admin
            .field(filter.field)
            .ok_or_else(|| anyhow::anyhow!("Unknown admin field: {}", filter.field))?;

        match &filter.value {
            FilterValue::Int(i) => {
                clauses.push(format!("{} = ?", field.expr));
                binds.push(BindValue::Int(*i));
            }
            FilterValue::Bool(b) => {
                clauses.push(format!("{} = ?", field.expr));
                binds.push(BindValue::Int(i64::from(*b)));
            }
            FilterValue::Text(s) => {
                clauses.push(format!("{} = ?", field.expr));
                binds.push(BindValue::Text(s.clone()));
            }
            FilterValue::Range { start, end } => {
                clauses.push(format!(
                    "datetime({0}) >= datetime(?) AND datetime({0}) < datetime(?)",
                    field.expr
                ));
                binds.push(BindValue::Text(start.clone()));
                binds.push(BindValue::Text(end.clone()));
            }
            FilterValue::IsNull(true) => clauses.push(format!("{} IS NULL", field.expr)),
            FilterValue::IsNull(false) => clauses.push(format!("{} IS NOT NULL", field.expr)),
        }
    }

    let search_exprs: Vec<&str> = admin
        .search_fields
        .iter()
        .filter_map(|name| admin.field(name).map(|f| f.expr))
        .collect();

    if !search_exprs.is_empty() {
        for term in terms {
            let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
            let any_field: Vec<String> = search_exprs
                .iter()
                .map(|expr| format!("LOWER({}) LIKE ? ESCAPE '\\'", expr))
                .collect();
            clauses.push(format!("({})", any_field.join(" OR ")));
            for _ in &search_exprs {
                binds.push(BindValue::Text(pattern.clone()));
            }
        }
    }

    let sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    Ok((sql, binds))
}

fn build_order_by(admin: &ModelAdmin) -> String {
    let mut parts: Vec<String> = admin
        .ordering
        .iter()
        .filter_map(|spec| {
            let (name, dir) = match spec.strip_prefix('-') {
                Some(name) => (name, "DESC"),
                None => (*spec, "ASC"),
            };
            admin.field(name).map(|f| format!("{} {}", f.expr, dir))
        })
        .collect();
    // stable paging needs a total order
    parts.push(format!("{} DESC", admin.pk));
    format!("ORDER BY {}", parts.join(", "))
}

fn row_to_json(admin: &ModelAdmin, row: &SqliteRow) -> Result<Value> {
    let mut object = Map::new();
    object.insert("id".to_string(), Value::from(row.try_get::<i64, _>("id")?));

    for name in &admin.list_display {
        let field = admin
            .field(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown admin field: {}", name))?;
        let value = match field.kind {
            ColumnKind::Int => row
                .try_get::<Option<i64>, _>(field.name)?
                .map(Value::from)
                .unwrap_or(Value::Null),
            ColumnKind::Bool => row
                .try_get::<Option<bool>, _>(field.name)?
                .map(Value::from)
                .unwrap_or(Value::Null),
            ColumnKind::Text | ColumnKind::Date => row
                .try_get::<Option<String>, _>(field.name)?
                .map(Value::from)
                .unwrap_or(Value::Null),
            ColumnKind::DateTime => row
                .try_get::<Option<DateTime<Utc>>, _>(field.name)?
                .map(|dt| Value::from(dt.to_rfc3339()))
                .unwrap_or(Value::Null),
        };
        object.insert(field.name.to_string(), value);
    }

    Ok(Value::Object(object))
}

#[async_trait]
impl AdminRepository for SqlxAdminRepository {
    async fn list(
        &self,
        admin: &ModelAdmin,
        filters: &[AdminFilter],
        terms: &[String],
        page: u32,
    ) -> Result<AdminPage> {
        let pool = self.pool.sqlite();
        let (where_sql, binds) = build_where(admin, filters, terms)?;

        let count_sql = format!("SELECT COUNT(*) AS n {} {}", admin.from, where_sql);
        let count: i64 = bind_all(sqlx::query(&count_sql), &binds)
            .fetch_one(pool)
            .await
            .context("Failed to count admin rows")?
            .try_get("n")?;

        let full_count = if admin.show_full_result_count {
            let full: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {}", admin.from))
                .fetch_one(pool)
                .await
                .context("Failed to count admin rows")?;
            Some(full)
        } else {
            None
        };

        let mut columns = vec![format!("{} AS id", admin.pk)];
        for name in &admin.list_display {
            if let Some(field) = admin.field(name) {
                columns.push(format!("{} AS {}", field.expr, field.name));
            }
        }

        let per_page = admin.per_page.max(1);
        let page = page.max(1);
        let select_sql = format!(
            "SELECT {} {} {} {} LIMIT ? OFFSET ?",
            columns.join(", "),
            admin.from,
            where_sql,
            build_order_by(admin)
        );
        let rows = bind_all(sqlx::query(&select_sql), &binds)
            .bind(per_page as i64)
            .bind((page as i64 - 1) * per_page as i64)
            .fetch_all(pool)
            .await
            .context("Failed to list admin rows")?;

        let rows = rows
            .iter()
            .map(|row| row_to_json(admin, row))
            .collect::<Result<Vec<_>>>()?;

        let total_pages = if count <= 0 {
            0
        } else {
            (count as u64).div_ceil(per_page as u64) as u32
        };

        Ok(AdminPage {
            model: admin.name,
            columns: admin.list_display.clone(),
            rows,
            count,
            full_count,
            page,
            per_page,
            total_pages,
        })
    }
}
