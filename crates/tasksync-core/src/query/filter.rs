use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::model::task::{ParseEnumError, normalize};
use crate::model::Status;
use crate::query::key::{ListParams, QueryKey};
use crate::wire;

/// Page size used until the user picks another.
pub const DEFAULT_PER_PAGE: u32 = 10;

/// Fields the server can sort a collection by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    CreatedAt,
    Name,
    DueDate,
}

impl SortField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Name => "name",
            Self::DueDate => "due_date",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "createdat" | "created" => Ok(Self::CreatedAt),
            "name" => Ok(Self::Name),
            "duedate" | "due" => Ok(Self::DueDate),
            _ => Err(ParseEnumError {
                expected: "sort field",
                got: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            _ => Err(ParseEnumError {
                expected: "sort direction",
                got: s.to_string(),
            }),
        }
    }
}

/// The effective filter behind a collection query.
///
/// `page: None` leaves the page to the server (the first one).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskFilter {
    pub status: Option<Status>,
    pub due_date_from: Option<NaiveDate>,
    pub due_date_to: Option<NaiveDate>,
    pub search: String,
    pub sort_by: SortField,
    pub sort_direction: SortDirection,
    pub per_page: u32,
    pub page: Option<u32>,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            status: None,
            due_date_from: None,
            due_date_to: None,
            search: String::new(),
            sort_by: SortField::CreatedAt,
            sort_direction: SortDirection::Desc,
            per_page: DEFAULT_PER_PAGE,
            page: None,
        }
    }
}

/// One edit to a [`TaskFilter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterChange {
    Status(Option<Status>),
    DueDateFrom(Option<NaiveDate>),
    DueDateTo(Option<NaiveDate>),
    Search(String),
    SortBy(SortField),
    SortDirection(SortDirection),
    /// Same field flips direction; a new field starts ascending.
    ToggleSort(SortField),
    PerPage(u32),
    Page(Option<u32>),
}

impl TaskFilter {
    /// Apply one change. Anything other than a page change goes back to
    /// the first page.
    pub fn apply(&mut self, change: FilterChange) {
        if !matches!(change, FilterChange::Page(_)) {
            self.page = None;
        }
        match change {
            FilterChange::Status(status) => self.status = status,
            FilterChange::DueDateFrom(date) => self.due_date_from = date,
            FilterChange::DueDateTo(date) => self.due_date_to = date,
            FilterChange::Search(text) => self.search = text,
            FilterChange::SortBy(field) => self.sort_by = field,
            FilterChange::SortDirection(direction) => self.sort_direction = direction,
            FilterChange::ToggleSort(field) => {
                if self.sort_by == field {
                    self.sort_direction = self.sort_direction.flipped();
                } else {
                    self.sort_by = field;
                    self.sort_direction = SortDirection::Asc;
                }
            }
            FilterChange::PerPage(n) => self.per_page = n.max(1),
            FilterChange::Page(page) => self.page = page.filter(|p| *p > 1),
        }
    }

    #[must_use]
    pub fn with(mut self, changes: impl IntoIterator<Item = FilterChange>) -> Self {
        for change in changes {
            self.apply(change);
        }
        self
    }

    /// Normalized request parameters. Empty fields are omitted, search is
    /// trimmed, dates stay ISO.
    #[must_use]
    pub fn params(&self) -> ListParams {
        let mut pairs: Vec<(&str, String)> = Vec::with_capacity(8);
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(from) = self.due_date_from {
            pairs.push(("due_date_from", wire::format_iso_date(from)));
        }
        if let Some(to) = self.due_date_to {
            pairs.push(("due_date_to", wire::format_iso_date(to)));
        }
        pairs.push(("search", self.search.clone()));
        pairs.push(("sort_by", self.sort_by.as_str().to_string()));
        pairs.push(("sort_direction", self.sort_direction.as_str().to_string()));
        pairs.push(("per_page", self.per_page.to_string()));
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        ListParams::from_pairs(pairs)
    }

    #[must_use]
    pub fn query_key(&self) -> QueryKey {
        QueryKey::Tasks(self.params())
    }

    /// Rebuild a filter from request parameters, skipping anything that
    /// does not parse.
    #[must_use]
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filter = Self::default();
        for (key, value) in pairs {
            let value = value.as_ref().trim();
            match key.as_ref() {
                "status" => filter.status = value.parse().ok(),
                "due_date_from" => filter.due_date_from = wire::parse_date(value),
                "due_date_to" => filter.due_date_to = wire::parse_date(value),
                "search" => filter.search = value.to_string(),
                "sort_by" => {
                    if let Ok(field) = value.parse() {
                        filter.sort_by = field;
                    }
                }
                "sort_direction" => {
                    if let Ok(direction) = value.parse() {
                        filter.sort_direction = direction;
                    }
                }
                "per_page" => {
                    if let Ok(n) = value.parse::<u32>() {
                        filter.per_page = n.max(1);
                    }
                }
                "page" => filter.page = value.parse::<u32>().ok().filter(|p| *p > 1),
                _ => {}
            }
        }
        filter
    }
}
