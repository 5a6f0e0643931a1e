use tracing::warn;

use crate::eventregistry::client::{ArticleSearch, NewsApiError};
use crate::eventregistry::types::{Article, QuerySpec};

/// Runs one (keyword, source) query: validates the spec, asks the remote
/// index, drops articles mentioning an excluded topic, and stops consuming
/// once `per_source_limit` articles are kept.
///
/// The excluded-topic check is applied on top of the server-side
/// `ignoreKeyword` parameter; server filtering has proven leaky for phrases
/// inside article bodies.
pub async fn execute(
    client: &impl ArticleSearch,
    spec: &QuerySpec,
) -> Result<Vec<Article>, NewsApiError> {
    validate(spec)?;

    let fetched = client.search(spec).await?;

    let mut kept = Vec::new();
    for article in fetched {
        if kept.len() >= spec.per_source_limit {
            break;
        }
        if mentions_excluded_topic(&article, &spec.excluded_topics) {
            continue;
        }
        kept.push(article);
    }
    Ok(kept)
}

/// Failure policy for a single combination: any error is logged and treated
/// as zero results, so one failing keyword/source pair never aborts the run.
pub async fn execute_or_empty(client: &impl ArticleSearch, spec: &QuerySpec) -> Vec<Article> {
    match execute(client, spec).await {
        Ok(articles) => articles,
        Err(e) => {
            warn!(
                keyword = %spec.keyword,
                source = %spec.source_domain,
                error = %e,
                "query failed (treating as empty)"
            );
            Vec::new()
        }
    }
}

fn validate(spec: &QuerySpec) -> Result<(), NewsApiError> {
    if spec.keyword.trim().is_empty() {
        return Err(NewsApiError::InvalidQuery("keyword must not be empty".into()));
    }
    if spec.source_domain.trim().is_empty() {
        return Err(NewsApiError::InvalidQuery(
            "source domain must not be empty".into(),
        ));
    }
    if spec.date_start > spec.date_end {
        return Err(NewsApiError::InvalidQuery(format!(
            "date window starts after it ends ({} > {})",
            spec.date_start, spec.date_end
        )));
    }
    if spec.per_source_limit < 1 {
        return Err(NewsApiError::InvalidQuery(
            "per-source limit must be at least 1".into(),
        ));
    }
    Ok(())
}

fn mentions_excluded_topic(article: &Article, topics: &[String]) -> bool {
    if topics.is_empty() {
        return false;
    }
    let title = article.title.to_lowercase();
    let body = article.body.to_lowercase();
    topics.iter().any(|topic| {
        let topic = topic.to_lowercase();
        !topic.is_empty() && (title.contains(&topic) || body.contains(&topic))
    })
}
