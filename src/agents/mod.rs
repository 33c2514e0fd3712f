//! Analysis agents and their orchestration.
//!
//! Categorization runs four agents in order: the classifier decides
//! whether the article concerns Costa Rica at all, the labeler tries to
//! fit it into the existing smart categories, the namer drafts a fresh
//! category, and the finalizer arbitrates between the best existing match
//! and the draft. Summarization runs two more: an English summarizer and
//! one translator per configured language.
//!
//! All agents of one article share a session id, so raw-response dumps of
//! one analysis land in the same directory.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::db::notifier_repo::Relation;
use crate::db::smart_category_repo::UNKNOWN_CATEGORY;
use crate::llm::{Engine, LlmError};
use crate::runtime::Shutdown;
use crate::settings::LlmSettings;

pub mod classifier;
pub mod finalizer;
pub mod labeler;
pub mod namer;
pub mod prompts;
pub mod summarizer;
pub mod translator;

use classifier::Classifier;
use finalizer::LabelFinalizer;
use labeler::Labeler;
use namer::Namer;
use summarizer::Summarizer;
use translator::Translator;

/// Categorization result for one article.
#[derive(Debug, Clone)]
pub struct ArticleCategory {
    pub relation: Relation,
    pub category: String,
    /// Set when the category is a fresh proposal not yet in the catalog.
    pub description: Option<String>,
}

/// Summaries for one article: the English original plus translations.
#[derive(Debug, Clone)]
pub struct ArticleSummaries {
    pub summary: String,
    pub translations: Vec<(String, String)>,
}

/// Runs the four-stage categorization pipeline on one article.
pub fn categorize_article(
    engine: &dyn Engine,
    llm: &LlmSettings,
    shutdown: &Shutdown,
    session_id: &str,
    article: &str,
    existing: &BTreeMap<String, String>,
) -> Result<ArticleCategory, LlmError> {
    let relation = Classifier::new(engine, llm, session_id).classify(shutdown, article)?;
    debug!(session_id, ?relation, "Classifier verdict");
    if relation == Relation::NotApplicable {
        return Ok(ArticleCategory {
            relation,
            category: UNKNOWN_CATEGORY.to_string(),
            description: None,
        });
    }

    let labeled = Labeler::new(engine, llm, session_id, existing).label(shutdown, article)?;
    let best_existing = labeled.best_existing(existing);

    // The namer always drafts a fresh option; without an existing match the
    // draft wins by default, otherwise the finalizer arbitrates.
    let proposal = Namer::new(engine, llm, session_id).propose(shutdown, article)?;
    debug!(session_id, proposal = %proposal.category, existing = ?best_existing, "Category candidates");

    let Some(existing_name) = best_existing else {
        return Ok(ArticleCategory {
            relation,
            category: proposal.category,
            description: Some(proposal.description),
        });
    };

    let existing_description = existing.get(&existing_name).cloned().unwrap_or_default();
    let verdict = LabelFinalizer::new(
        engine,
        llm,
        session_id,
        (existing_name, existing_description),
        (proposal.category.clone(), proposal.description.clone()),
    )
    .finalize(shutdown, article)?;

    info!(session_id, category = %verdict.category, new = verdict.new_chosen, "Category finalized");
    Ok(ArticleCategory {
        relation,
        category: verdict.category,
        description: verdict.new_chosen.then_some(proposal.description),
    })
}

/// Runs summarization and translation on one article.
pub fn summarize_article(
    engine: &dyn Engine,
    llm: &LlmSettings,
    shutdown: &Shutdown,
    session_id: &str,
    article: &str,
) -> Result<ArticleSummaries, LlmError> {
    let summary = Summarizer::new(engine, llm, session_id).summarize(shutdown, article)?;

    let mut translations = Vec::with_capacity(llm.translate_languages.len());
    for lang in &llm.translate_languages {
        let translation =
            Translator::new(engine, llm, session_id, lang).translate(shutdown, &summary)?;
        translations.push((lang.clone(), translation));
    }

    Ok(ArticleSummaries { summary, translations })
}
