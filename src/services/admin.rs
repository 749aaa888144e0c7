//! Admin back office
//!
//! Registered `ModelAdmin`s and the translation of list query strings into
//! typed filters and search terms.

use crate::db::repositories::{AdminRepository, UserRepository};
use crate::models::{
    AdminField, AdminFilter, AdminPage, AdminQuery, ColumnKind, DateRange, FilterValue,
    ModelAdmin, User,
};
use anyhow::Context;
use chrono::{Datelike, Duration, NaiveDate, Utc};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Unknown admin model: {0}")]
    UnknownModel(String),

    #[error("User not found")]
    UserNotFound,

    /// Bad filter field or value in the query string
    #[error("{0}")]
    InvalidFilter(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Book list: default ordering, 100 per page
pub fn books_admin() -> ModelAdmin {
    ModelAdmin {
        name: "books",
        from: "FROM books b JOIN authors a ON a.id = b.author_id",
        pk: "b.id",
        fields: vec![
            AdminField::new("title", "b.title", ColumnKind::Text),
            AdminField::new("author", "a.name", ColumnKind::Text),
            AdminField::new("publication_year", "b.publication_year", ColumnKind::Int),
        ],
        list_display: vec!["title", "author", "publication_year"],
        list_filter: vec!["publication_year", "author"],
        search_fields: vec!["title", "author"],
        ordering: vec![],
        per_page: 100,
        show_full_result_count: true,
        list_editable: vec![],
    }
}

pub fn users_admin() -> ModelAdmin {
    ModelAdmin {
        name: "users",
        from: "FROM users u",
        pk: "u.id",
        fields: vec![
            AdminField::new("username", "u.username", ColumnKind::Text),
            AdminField::new("email", "u.email", ColumnKind::Text),
            AdminField::new("first_name", "u.first_name", ColumnKind::Text),
            AdminField::new("last_name", "u.last_name", ColumnKind::Text),
            AdminField::new("date_of_birth", "u.date_of_birth", ColumnKind::Date).nullable(),
            AdminField::new("is_staff", "u.is_staff", ColumnKind::Bool),
            AdminField::new("is_superuser", "u.is_superuser", ColumnKind::Bool),
            AdminField::new("is_active", "u.is_active", ColumnKind::Bool),
            AdminField::new("date_joined", "u.date_joined", ColumnKind::DateTime),
            AdminField::new("last_login", "u.last_login", ColumnKind::DateTime).nullable(),
        ],
        list_display: vec![
            "username",
            "email",
            "first_name",
            "last_name",
            "date_of_birth",
            "is_staff",
            "is_active",
            "date_joined",
        ],
        list_filter: vec!["is_staff", "is_superuser", "is_active", "date_joined", "last_login"],
        search_fields: vec!["username", "email", "first_name", "last_name"],
        ordering: vec!["-date_joined"],
        per_page: 25,
        show_full_result_count: true,
        list_editable: vec!["is_active"],
    }
}

pub struct AdminService {
    repo: Arc<dyn AdminRepository>,
    user_repo: Arc<dyn UserRepository>,
    registry: Vec<ModelAdmin>,
}

impl AdminService {
    pub fn new(repo: Arc<dyn AdminRepository>, user_repo: Arc<dyn UserRepository>) -> Self {
        Self {
            repo,
            user_repo,
            registry: vec![books_admin(), users_admin()],
        }
    }

    pub fn model(&self, name: &str) -> Option<&ModelAdmin> {
        self.registry.iter().find(|m| m.name == name)
    }

    /// One page of the model's change list
    pub async fn list(&self, model: &str, query: &AdminQuery) -> Result<AdminPage, AdminError> {
        let admin = self
            .model(model)
            .ok_or_else(|| AdminError::UnknownModel(model.to_string()))?;

        let filters = parse_filters(admin, query, Utc::now().date_naive())?;
        let terms = search_terms(query.q.as_deref());

        let page = self
            .repo
            .list(admin, &filters, &terms, query.page)
            .await
            .context("Failed to list admin rows")?;
        Ok(page)
    }

    /// The list-editable `is_active` flag on users
    pub async fn set_user_active(&self, id: i64, active: bool) -> Result<User, AdminError> {
        let updated = self
            .user_repo
            .set_active(id, active)
            .await
            .context("Failed to update user")?;
        if !updated {
            return Err(AdminError::UserNotFound);
        }

        tracing::info!("User {} active set to {}", id, active);
        self.user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user")?
            .ok_or(AdminError::UserNotFound)
    }
}

/// Whitespace-separated search terms
pub fn search_terms(q: Option<&str>) -> Vec<String> {
    q.map(|q| q.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Turn the query's filter parameters into typed filters.
///
/// Only fields in `list_filter` are accepted. Date ranges are computed
/// relative to `today` (UTC).
pub fn parse_filters(
    admin: &ModelAdmin,
    query: &AdminQuery,
    today: NaiveDate,
) -> Result<Vec<AdminFilter>, AdminError> {
    let mut names: Vec<&String> = query.filters.keys().collect();
    names.sort();

    let mut filters = Vec::with_capacity(names.len());
    for name in names {
        let raw = &query.filters[name];
        let field = admin
            .list_filter
            .iter()
            .find(|f| **f == name.as_str())
            .and_then(|f| admin.field(f))
            .ok_or_else(|| AdminError::InvalidFilter(format!("Cannot filter on {}", name)))?;

        let invalid = || AdminError::InvalidFilter(format!("Invalid value for {}: {}", name, raw));
        let value = match field.kind {
            ColumnKind::Bool => match raw.as_str() {
                "1" | "true" => FilterValue::Bool(true),
                "0" | "false" => FilterValue::Bool(false),
                _ => return Err(invalid()),
            },
            ColumnKind::Int => FilterValue::Int(raw.parse().map_err(|_| invalid())?),
            ColumnKind::Text => FilterValue::Text(raw.clone()),
            ColumnKind::Date | ColumnKind::DateTime => {
                let range = DateRange::parse(raw).ok_or_else(invalid)?;
                date_range_value(range, today).ok_or_else(invalid)?
            }
        };

        filters.push(AdminFilter {
            field: field.name,
            value,
        });
    }

    Ok(filters)
}

fn date_range_value(range: DateRange, today: NaiveDate) -> Option<FilterValue> {
    let (start, end) = match range {
        DateRange::NoDate => return Some(FilterValue::IsNull(true)),
        DateRange::HasDate => return Some(FilterValue::IsNull(false)),
        DateRange::Today => (today, today.succ_opt()?),
        DateRange::Past7Days => (today - Duration::days(7), today.succ_opt()?),
        DateRange::ThisMonth => {
            let start = today.with_day(1)?;
            let end = if today.month() == 12 {
                NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)?
            } else {
                NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)?
            };
            (start, end)
        }
        DateRange::ThisYear => (
            NaiveDate::from_ymd_opt(today.year(), 1, 1)?,
            NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)?,
        ),
    };

    Some(FilterValue::Range {
        start: format!("{} 00:00:00", start),
        end: format!("{} 00:00:00", end),
    })
}
