// Cadence — Knowledge corpus
//
// Immutable reference material the assistant may draw on. Each item carries a
// sensitivity tier; the retriever filters by tier before it ever looks at text.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::access::Tier;

use super::KnowledgeError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub tier: Tier,
}

impl KnowledgeItem {
    pub fn new(id: &str, title: &str, content: &str, category: &str, tier: Tier) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            category: category.to_string(),
            tier,
        }
    }

    /// Case-insensitive substring match on title, content, or category.
    /// `needle` must already be lowercased.
    pub(crate) fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.content.to_lowercase().contains(needle)
            || self.category.to_lowercase().contains(needle)
    }
}

/// The full corpus, validated at construction.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    items: Vec<KnowledgeItem>,
}

impl KnowledgeBase {
    pub fn from_items(items: Vec<KnowledgeItem>) -> Result<Self, KnowledgeError> {
        let mut seen = HashSet::new();
        for item in &items {
            if item.id.trim().is_empty() {
                return Err(KnowledgeError::InvalidItem {
                    id: item.id.clone(),
                    reason: "id must not be empty".to_string(),
                });
            }
            if item.title.trim().is_empty() {
                return Err(KnowledgeError::InvalidItem {
                    id: item.id.clone(),
                    reason: "title must not be empty".to_string(),
                });
            }
            if !seen.insert(item.id.as_str()) {
                return Err(KnowledgeError::DuplicateId(item.id.clone()));
            }
        }
        Ok(Self { items })
    }

    /// Load a JSON array of items from disk.
    pub fn load(path: &Path) -> Result<Self, KnowledgeError> {
        let raw = std::fs::read_to_string(path)?;
        let items: Vec<KnowledgeItem> = serde_json::from_str(&raw)?;
        let corpus = Self::from_items(items)?;
        tracing::info!(
            path = %path.display(),
            items = corpus.len(),
            "Knowledge corpus loaded"
        );
        Ok(corpus)
    }

    /// The corpus shipped with the binary.
    pub fn builtin() -> Self {
        Self {
            items: builtin_items(),
        }
    }

    pub fn items(&self) -> &[KnowledgeItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn builtin_items() -> Vec<KnowledgeItem> {
    vec![
        KnowledgeItem::new(
            "kb-001",
            "Major Scales",
            "A major scale follows the whole-whole-half-whole-whole-whole-half step pattern. \
             Practice each scale hands separately, then together, at a steady tempo.",
            "theory",
            Tier::Public,
        ),
        KnowledgeItem::new(
            "kb-002",
            "Reading Rhythm Notation",
            "Count subdivisions out loud. Whole, half, quarter and eighth notes divide the \
             beat by four, two, one and one half respectively.",
            "theory",
            Tier::Public,
        ),
        KnowledgeItem::new(
            "kb-003",
            "Booking a Lesson",
            "Lessons are booked from the appointments page. Cancellations less than 24 hours \
             before the lesson are not refunded.",
            "platform",
            Tier::Public,
        ),
        KnowledgeItem::new(
            "kb-010",
            "Building a Practice Routine",
            "Split a practice session into warm-up, technique, repertoire and review. \
             Track tempo increases in a practice log.",
            "practice",
            Tier::Intermediate,
        ),
        KnowledgeItem::new(
            "kb-011",
            "Diatonic Chord Progressions",
            "The I-IV-V-I and ii-V-I progressions anchor most tonal music. Learn them in \
             every key before moving to secondary dominants.",
            "theory",
            Tier::Intermediate,
        ),
        KnowledgeItem::new(
            "kb-020",
            "Voice Leading in Four-Part Harmony",
            "Avoid parallel fifths and octaves, resolve leading tones upward, and keep common \
             tones between chords in the same voice.",
            "theory",
            Tier::Advanced,
        ),
        KnowledgeItem::new(
            "kb-021",
            "Assessing Student Progress",
            "Grade performances against the studio rubric: accuracy, tone, rhythm, and \
             expression, each scored from one to five.",
            "pedagogy",
            Tier::Advanced,
        ),
        KnowledgeItem::new(
            "kb-030",
            "Managing Instructor Accounts",
            "Administrators approve new instructor accounts and assign them to courses from \
             the admin console. Deactivated accounts keep their lesson history.",
            "administration",
            Tier::Admin,
        ),
        KnowledgeItem::new(
            "kb-031",
            "Rotating Integration Credentials",
            "Calendar and streaming integrations use per-user credentials held in the vault. \
             Rotate them by storing a new value under the same credential name.",
            "administration",
            Tier::Admin,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_corpus_is_valid_and_covers_every_tier() {
        let corpus = KnowledgeBase::builtin();
        assert!(KnowledgeBase::from_items(corpus.items().to_vec()).is_ok());
        for tier in [Tier::Public, Tier::Intermediate, Tier::Advanced, Tier::Admin] {
            assert!(corpus.items().iter().any(|i| i.tier == tier), "{} missing", tier);
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let items = vec![
            KnowledgeItem::new("a", "One", "x", "c", Tier::Public),
            KnowledgeItem::new("a", "Two", "y", "c", Tier::Public),
        ];
        assert!(matches!(
            KnowledgeBase::from_items(items),
            Err(KnowledgeError::DuplicateId(id)) if id == "a"
        ));
    }

    #[test]
    fn test_empty_title_rejected() {
        let items = vec![KnowledgeItem::new("a", " ", "x", "c", Tier::Public)];
        assert!(matches!(
            KnowledgeBase::from_items(items),
            Err(KnowledgeError::InvalidItem { .. })
        ));
    }

    #[test]
    fn test_load_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id":"k1","title":"Basic Scales","content":"c","category":"theory","tier":"public"}},
               {{"id":"k2","title":"Advanced Harmony","content":"c","category":"theory","tier":"advanced"}}]"#
        )
        .unwrap();

        let corpus = KnowledgeBase::load(file.path()).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.items()[1].tier, Tier::Advanced);
    }

    #[test]
    fn test_load_rejects_unknown_tier() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id":"k1","title":"T","content":"c","category":"x","tier":"secret"}}]"#
        )
        .unwrap();
        assert!(matches!(
            KnowledgeBase::load(file.path()),
            Err(KnowledgeError::Json(_))
        ));
    }

    #[test]
    fn test_matching_is_case_insensitive_across_fields() {
        let item = KnowledgeItem::new("k", "Basic Scales", "Finger patterns", "Theory", Tier::Public);
        assert!(item.matches("scale"));
        assert!(item.matches("finger"));
        assert!(item.matches("theory"));
        assert!(!item.matches("harmony"));
    }
}
