use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::error::ApiError;
use crate::model::{QueryData, TaskId};
use crate::transport::ApiRequest;
use crate::wire;

/// Normalized collection parameters.
///
/// Keys are sorted and values trimmed; empty values are dropped. Two
/// parameter sets with the same effective values compare equal however they
/// were built.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListParams(BTreeMap<String, String>);

impl ListParams {
    #[must_use]
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self(
            pairs
                .into_iter()
                .filter_map(|(k, v)| {
                    let v = v.as_ref().trim();
                    (!v.is_empty()).then(|| (k.as_ref().to_string(), v.to_string()))
                })
                .collect(),
        )
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

/// Identity of a cached read.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryKey {
    /// `GET /tasks` with filter parameters.
    Tasks(ListParams),
    /// `GET /tasks/{id}`.
    Task(TaskId),
}

impl QueryKey {
    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(self, Self::Tasks(_))
    }

    #[must_use]
    pub fn request(&self) -> ApiRequest {
        match self {
            Self::Tasks(params) => ApiRequest::get("/tasks").with_params(params.as_map().clone()),
            Self::Task(id) => ApiRequest::get(format!("/tasks/{id}")),
        }
    }

    /// Decode a successful response for this key.
    ///
    /// # Errors
    ///
    /// Returns a malformed-response failure when the body has the wrong shape.
    pub fn decode(&self, body: &Value) -> Result<QueryData, ApiError> {
        match self {
            Self::Tasks(_) => wire::decode_page(body).map(QueryData::Collection),
            Self::Task(_) => wire::decode_task(body).map(QueryData::Single),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tasks(params) => {
                f.write_str("tasks")?;
                let mut sep = '?';
                for (k, v) in params.iter() {
                    write!(f, "{sep}{k}={v}")?;
                    sep = '&';
                }
                Ok(())
            }
            Self::Task(id) => write!(f, "task/{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Method;

    #[test]
    fn insertion_order_does_not_matter() {
        let a = ListParams::from_pairs([("status", "Done"), ("search", "x")]);
        let b = ListParams::from_pairs([("search", "x"), ("status", "Done")]);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_values_are_dropped() {
        let p = ListParams::from_pairs([("status", ""), ("search", " ")]);
        assert_eq!(p, ListParams::default());
        assert_eq!(QueryKey::Tasks(p).to_string(), "tasks");
    }

    #[test]
    fn request_targets_endpoint() {
        let req = QueryKey::Task(TaskId::from(9)).request();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.path, "/tasks/9");

        let key = QueryKey::Tasks(ListParams::from_pairs([("per_page", "10")]));
        let req = key.request();
        assert_eq!(req.path, "/tasks");
        assert_eq!(req.params.get("per_page").map(String::as_str), Some("10"));
    }
}
