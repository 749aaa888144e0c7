//! Admin list configuration and query types
//!
//! A `ModelAdmin` describes how one table is listed in the back office:
//! which columns are shown, which can be filtered, which are searched and
//! how rows are ordered and paged.

use serde::Serialize;
use std::collections::HashMap;

/// How a column's values are parsed for filtering and rendered to JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int,
    Text,
    Bool,
    /// `YYYY-MM-DD`
    Date,
    /// Stored timestamp
    DateTime,
}

/// A field the admin knows how to select, filter and sort on
#[derive(Debug, Clone)]
pub struct AdminField {
    pub name: &'static str,
    /// SQL expression over the admin's FROM clause
    pub expr: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
}

impl AdminField {
    pub const fn new(name: &'static str, expr: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            expr,
            kind,
            nullable: false,
        }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Declarative list configuration for one model
#[derive(Debug, Clone)]
pub struct ModelAdmin {
    /// URL segment, e.g. `books`
    pub name: &'static str,
    /// FROM clause including joins
    pub from: &'static str,
    /// Primary key expression, always selected as `id`
    pub pk: &'static str,
    pub fields: Vec<AdminField>,
    pub list_display: Vec<&'static str>,
    pub list_filter: Vec<&'static str>,
    pub search_fields: Vec<&'static str>,
    /// Field names, `-` prefix for descending
    pub ordering: Vec<&'static str>,
    pub per_page: u32,
    pub show_full_result_count: bool,
    pub list_editable: Vec<&'static str>,
}

impl ModelAdmin {
    pub fn field(&self, name: &str) -> Option<&AdminField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Date filter choices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    Today,
    Past7Days,
    ThisMonth,
    ThisYear,
    NoDate,
    HasDate,
}

impl DateRange {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "today" => Some(DateRange::Today),
            "past_7_days" => Some(DateRange::Past7Days),
            "this_month" => Some(DateRange::ThisMonth),
            "this_year" => Some(DateRange::ThisYear),
            "no_date" => Some(DateRange::NoDate),
            "has_date" => Some(DateRange::HasDate),
            _ => None,
        }
    }
}

/// A parsed filter value, ready to bind
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Int(i64),
    Text(String),
    Bool(bool),
    /// Half-open `[start, end)` range, as `YYYY-MM-DD HH:MM:SS`
    Range { start: String, end: String },
    IsNull(bool),
}

/// Filter on one admin field
#[derive(Debug, Clone, PartialEq)]
pub struct AdminFilter {
    pub field: &'static str,
    pub value: FilterValue,
}

/// Search text, filters and page from the admin list query string
#[derive(Debug, Clone, Default)]
pub struct AdminQuery {
    pub q: Option<String>,
    pub filters: HashMap<String, String>,
    pub page: u32,
}

impl AdminQuery {
    /// Split raw query parameters into `q`, `page` and field filters.
    /// Empty values are dropped.
    pub fn from_params(mut params: HashMap<String, String>) -> Self {
        let q = params.remove("q").filter(|q| !q.trim().is_empty());
        let page = params
            .remove("page")
            .and_then(|p| p.parse::<u32>().ok())
            .unwrap_or(1)
            .max(1);
        params.retain(|_, v| !v.is_empty());

        Self {
            q,
            filters: params,
            page,
        }
    }
}

/// One page of admin rows
#[derive(Debug, Clone, Serialize)]
pub struct AdminPage {
    pub model: &'static str,
    pub columns: Vec<&'static str>,
    pub rows: Vec<serde_json::Value>,
    /// Rows matching the filters and search
    pub count: i64,
    /// Rows in the table, when the admin shows it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_count: Option<i64>,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}
