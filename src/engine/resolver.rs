//! Resolvers: match what a user typed to a project or a user.

use std::collections::HashSet;

use rusqlite::Connection;
use tracing::debug;

use super::error::{Result, TrackerError};
use super::repo::{ProjectRepo, UserRepo};
use super::types::{Project, User};

pub struct ResolveResult {
    pub project: Project,
    pub confidence: f64,
}

pub struct ProjectResolver<'a> {
    repo: ProjectRepo<'a>,
    strict: bool,
}

impl<'a> ProjectResolver<'a> {
    #[must_use]
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            repo: ProjectRepo::new(conn),
            strict: false,
        }
    }

    /// Exact id or name only.
    #[must_use]
    pub fn strict(conn: &'a Connection) -> Self {
        Self {
            repo: ProjectRepo::new(conn),
            strict: true,
        }
    }

    /// Resolves an id, an exact name, or (unless strict) the best fuzzy match.
    ///
    /// # Errors
    /// Returns `NotFound` when nothing matches well enough.
    pub fn resolve(&self, query: &str) -> Result<ResolveResult> {
        if let Ok(id) = query.trim().parse::<i64>() {
            if let Some(project) = self.repo.find_by_id(id)? {
                return Ok(ResolveResult {
                    project,
                    confidence: 1.0,
                });
            }
        }

        if let Some(project) = self.repo.find_by_name(query)? {
            return Ok(ResolveResult {
                project,
                confidence: 1.0,
            });
        }

        if self.strict {
            return Err(TrackerError::not_found("Project", query));
        }
        self.fuzzy_resolve(query)
    }

    fn fuzzy_resolve(&self, query: &str) -> Result<ResolveResult> {
        let query_lower = query.trim().to_lowercase();
        let words: Vec<_> = query_lower.split_whitespace().collect();

        let mut matches: Vec<_> = self
            .repo
            .get_all()?
            .into_iter()
            .map(|p| (calculate_score(&p.name, &query_lower, &words), p))
            .filter(|(s, _)| *s > 0.3)
            .collect();

        matches.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let (confidence, project) = matches
            .into_iter()
            .next()
            .ok_or_else(|| TrackerError::not_found("Project", query))?;
        debug!(query, project = project.id, confidence, "fuzzy project match");

        Ok(ResolveResult {
            project,
            confidence,
        })
    }
}

/// Resolves a SAP number or a username.
///
/// # Errors
/// Returns `NotFound` when neither matches.
pub fn resolve_user(conn: &Connection, query: &str) -> Result<User> {
    let repo = UserRepo::new(conn);
    if let Ok(sap) = query.trim().parse::<i64>() {
        if let Some(user) = repo.find_by_sap(sap)? {
            return Ok(user);
        }
    }
    repo.find_by_username(query)?
        .ok_or_else(|| TrackerError::not_found("User", query))
}

/// Calculates a match score between a project name and a query.
fn calculate_score(name: &str, query: &str, query_words: &[&str]) -> f64 {
    let name_lower = name.to_lowercase();
    let mut score = 0.0;

    if name_lower.contains(query) {
        score += 0.8;
    }
    for word in query_words {
        if name_lower.contains(word) {
            score += 0.3;
        }
    }
    if name_lower.starts_with(query) {
        score += 0.5;
    }
    score += string_similarity(&name_lower, query) * 0.4;

    score.min(1.0)
}

#[allow(clippy::cast_precision_loss)]
fn string_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let a_chars: HashSet<char> = a.chars().collect();
    let b_chars: HashSet<char> = b.chars().collect();

    let intersection = a_chars.intersection(&b_chars).count();
    let union = a_chars.union(&b_chars).count();

    if union == 0 {
        return 0.0;
    }

    intersection as f64 / union as f64
}
