//! Institution registry: maps document URLs to the institution that owns them

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crawler::DocumentType;
use crate::index::error::DbError;

/// A known institution and the URL prefix its pages live under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    pub id: i64,
    pub url_prefix: String,
}

/// Ordered list of institutions; the first matching prefix wins
#[derive(Debug, Clone, Default)]
pub struct InstitutionRegistry {
    institutions: Vec<Institution>,
}

impl InstitutionRegistry {
    pub fn new(institutions: Vec<Institution>) -> Self {
        Self { institutions }
    }

    /// Parse a JSON array of `{"id", "url_prefix"}` objects
    pub fn from_json(json: &str) -> Result<Self, DbError> {
        let institutions: Vec<Institution> = serde_json::from_str(json)
            .map_err(|e| DbError::Registry(format!("Invalid institutions file: {}", e)))?;
        Ok(Self::new(institutions))
    }

    /// Load the registry from a JSON file
    pub async fn load(path: &Path) -> Result<Self, DbError> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            DbError::Registry(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn institutions(&self) -> &[Institution] {
        &self.institutions
    }

    /// Type and owning institution for a document URL
    pub fn classify(&self, url: &str) -> (DocumentType, Option<i64>) {
        match self
            .institutions
            .iter()
            .find(|institution| url.starts_with(&institution.url_prefix))
        {
            Some(institution) => (DocumentType::School, Some(institution.id)),
            None => (DocumentType::General, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> InstitutionRegistry {
        InstitutionRegistry::from_json(
            r#"[
                {"id": 1, "url_prefix": "https://uni.example.edu/"},
                {"id": 2, "url_prefix": "https://uni.example.edu/medicine/"},
                {"id": 3, "url_prefix": "https://college.example.org"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_first_matching_prefix_wins() {
        let registry = registry();
        assert_eq!(
            registry.classify("https://uni.example.edu/medicine/courses"),
            (DocumentType::School, Some(1))
        );
        assert_eq!(
            registry.classify("https://college.example.org/apply"),
            (DocumentType::School, Some(3))
        );
    }

    #[test]
    fn test_unmatched_urls_are_general() {
        assert_eq!(
            registry().classify("https://studentaid.example.gov/loans"),
            (DocumentType::General, None)
        );
        assert_eq!(
            InstitutionRegistry::default().classify("https://uni.example.edu/"),
            (DocumentType::General, None)
        );
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            InstitutionRegistry::from_json(r#"[{"id": "one"}]"#),
            Err(DbError::Registry(_))
        ));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("institutions.json");
        tokio::fs::write(&path, r#"[{"id": 7, "url_prefix": "https://a.example.edu"}]"#)
            .await
            .unwrap();

        let registry = InstitutionRegistry::load(&path).await.unwrap();
        assert_eq!(registry.institutions().len(), 1);
        assert_eq!(registry.institutions()[0].id, 7);

        assert!(InstitutionRegistry::load(&dir.path().join("missing.json")).await.is_err());
    }
}
