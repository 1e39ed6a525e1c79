use anyhow::Result;
use std::future::Future;

use crate::config::ClassifierConfig;
use crate::models::{Category, PlaylistEntry};
use crate::scanner::normalize::{extract_year, normalize_title};

const DOCUMENTARY_GENRE: &str = "Documentary";

/// External service that knows the genres of a movie title
pub trait GenreLookup {
    fn movie_genres(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// One step of the classification order: the first rule with a keyword
/// contained in the group label decides the category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRule {
    pub category: Category,
    pub keywords: Vec<String>,
}

impl ClassificationRule {
    pub fn new(category: Category, keywords: &[String]) -> Self {
        Self {
            category,
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    fn matches(&self, group_lower: &str) -> bool {
        self.keywords.iter().any(|k| group_lower.contains(k.as_str()))
    }

    /// Rules in precedence order: TV, Animation, Documentary, StandUp, Movie
    pub fn ordered(config: &ClassifierConfig) -> Vec<Self> {
        vec![
            Self::new(Category::TvShow, &config.tv_keywords),
            Self::new(Category::Animation, &config.animation_keywords),
            Self::new(Category::Documentary, &config.documentary_keywords),
            Self::new(Category::StandUp, &config.standup_keywords),
            Self::new(Category::Movie, &config.movie_keywords),
        ]
    }
}

pub struct Classifier<G> {
    rules: Vec<ClassificationRule>,
    genre_lookup: Option<G>,
}

impl<G: GenreLookup> Classifier<G> {
    pub fn new(rules: Vec<ClassificationRule>, genre_lookup: Option<G>) -> Self {
        Self {
            rules,
            genre_lookup,
        }
    }

    /// Keyword classification only; unmatched groups default to Movie
    pub fn classify_group(&self, group: &str) -> Category {
        let group = group.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&group))
            .map(|rule| rule.category)
            .unwrap_or(Category::Movie)
    }

    /// Keyword classification, then genre enrichment for movies.
    /// Lookup failures keep the keyword result.
    pub async fn classify(&self, entry: &PlaylistEntry) -> Category {
        let category = self.classify_group(&entry.group);
        if category != Category::Movie {
            return category;
        }

        let Some(lookup) = &self.genre_lookup else {
            return category;
        };

        let title = normalize_title(&entry.title);
        let year = extract_year(&entry.title);

        match lookup.movie_genres(&title, year).await {
            Ok(genres) if genres.iter().any(|g| g.eq_ignore_ascii_case(DOCUMENTARY_GENRE)) => {
                tracing::info!("Reclassified '{}' as documentary (genres: {:?})", title, genres);
                Category::Documentary
            }
            Ok(genres) => {
                tracing::debug!("Genres for '{}': {:?}", title, genres);
                category
            }
            Err(e) => {
                tracing::warn!("Genre lookup failed for '{}': {:#}", title, e);
                category
            }
        }
    }
}
