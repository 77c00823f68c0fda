//! Population category table: label strings to stable zero-based class codes and back.

use crate::types::UnknownCategoryError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Lexically ordered population categories. Codes are positions in `categories`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTable {
    categories: Vec<String>,
}

impl CategoryTable {
    /// Fit over every label observed; duplicates collapse and order is lexical.
    pub fn fit<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let categories: BTreeSet<&str> = labels.into_iter().collect();
        Self {
            categories: categories.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn contains(&self, label: &str) -> bool {
        self.encode(label).is_ok()
    }

    pub fn encode(&self, label: &str) -> Result<usize, UnknownCategoryError> {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| UnknownCategoryError::Label(label.to_string()))
    }

    pub fn encode_all<'a>(
        &self,
        labels: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<usize>, UnknownCategoryError> {
        labels.into_iter().map(|l| self.encode(l)).collect()
    }

    pub fn decode(&self, code: usize) -> Result<&str, UnknownCategoryError> {
        self.categories
            .get(code)
            .map(String::as_str)
            .ok_or(UnknownCategoryError::Code {
                code,
                len: self.categories.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_lexical_order() {
        let table = CategoryTable::fit(["SAS", "AFR", "EUR", "AFR"]);
        assert_eq!(table.categories(), &["AFR", "EUR", "SAS"]);
        assert_eq!(table.encode("EUR"), Ok(1));
    }
}
