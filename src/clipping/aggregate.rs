use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::{debug, info};

use super::query;
use crate::eventregistry::client::ArticleSearch;
use crate::eventregistry::types::{Article, QuerySpec};

/// Filters shared by every combination of one aggregation run.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub languages: Vec<String>,
    pub excluded_topics: Vec<String>,
    pub allowed_authors: Vec<String>,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub per_source_limit: usize,
}

impl QueryPlan {
    pub fn spec_for(&self, keyword: &str, source_domain: &str) -> QuerySpec {
        QuerySpec {
            keyword: keyword.to_string(),
            source_domain: source_domain.to_string(),
            languages: self.languages.clone(),
            excluded_topics: self.excluded_topics.clone(),
            allowed_authors: self.allowed_authors.clone(),
            date_start: self.date_start,
            date_end: self.date_end,
            per_source_limit: self.per_source_limit,
            dedupe: true,
        }
    }
}

/// Queries every keyword × source combination in order (keywords outer,
/// sources inner) and merges the results, keeping the first article seen for
/// each URL.
///
/// `global_limit` gates fetching, not the final list: the cumulative count of
/// PRE-dedup combination results decides when to stop querying, and the
/// merged list is never truncated afterwards. The output may therefore end up
/// smaller than the cap (duplicates dropped) or larger (one combination
/// over-returning past it).
pub async fn aggregate(
    client: &impl ArticleSearch,
    plan: &QueryPlan,
    keywords: &[String],
    sources: &[String],
    global_limit: usize,
) -> Vec<Article> {
    // Seen-set is scoped to this run; nothing leaks across invocations.
    let mut seen = HashSet::new();
    let mut merged: Vec<Article> = Vec::new();
    let mut fetched_total = 0usize;

    'combinations: for keyword in keywords {
        for source in sources {
            let spec = plan.spec_for(keyword, source);
            let articles = query::execute_or_empty(client, &spec).await;

            fetched_total += articles.len();
            debug!(
                keyword = %keyword,
                source = %source,
                fetched = articles.len(),
                fetched_total,
                "combination queried"
            );

            for article in articles {
                if seen.insert(article.url.clone()) {
                    merged.push(article);
                }
            }

            if fetched_total >= global_limit {
                break 'combinations;
            }
        }
    }

    info!(
        articles = merged.len(),
        fetched_total, "aggregation complete"
    );
    merged
}

/// On-screen listing of the aggregated articles, one block per article in
/// document order.
pub fn format_preview(articles: &[Article]) -> String {
    let mut output = String::new();
    for article in articles {
        output.push_str(&format!("Title: {}\n", article.title));
        output.push_str(&format!("Source: {}\n", article.url));
        output.push_str(&format!("Content: {}\n", article.body));
        output.push_str("---\n");
    }
    output
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::eventregistry::client::NewsApiError;

    struct MockSearch {
        responses: Mutex<VecDeque<Result<Vec<Article>, NewsApiError>>>,
        queried: Mutex<Vec<(String, String)>>,
    }

    impl MockSearch {
        fn with_responses(
            responses: Vec<Result<Vec<Article>, NewsApiError>>,
        ) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                queried: Mutex::new(Vec::new()),
            }
        }

        fn queried_combinations(&self) -> Vec<(String, String)> {
            self.queried.lock().unwrap().clone()
        }
    }

    impl ArticleSearch for MockSearch {
        async fn search(&self, spec: &QuerySpec) -> Result<Vec<Article>, NewsApiError> {
            self.queried
                .lock()
                .unwrap()
                .push((spec.keyword.clone(), spec.source_domain.clone()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(Vec::new()))
        }
    }

    fn article(url: &str) -> Article {
        Article {
            title: format!("title {url}"),
            url: url.into(),
            body: format!("body {url}"),
            extra: serde_json::Map::new(),
        }
    }

    fn plan() -> QueryPlan {
        QueryPlan {
            languages: vec!["eng".into()],
            excluded_topics: vec![],
            allowed_authors: vec![],
            date_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            date_end: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            per_source_limit: 5,
        }
    }

    fn keywords(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn deduplicates_across_combinations_first_seen_wins() {
        let mock = MockSearch::with_responses(vec![
            Ok(vec![article("https://u/1"), article("https://u/2"), article("https://u/3")]),
            Ok(vec![article("https://u/3"), article("https://u/4"), article("https://u/5")]),
        ]);

        let result = aggregate(
            &mock,
            &plan(),
            &keywords(&["K1"]),
            &keywords(&["S1", "S2"]),
            10,
        )
        .await;

        let urls: Vec<_> = result.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(
            urls,
            ["https://u/1", "https://u/2", "https://u/3", "https://u/4", "https://u/5"]
        );
        assert_eq!(
            mock.queried_combinations(),
            [("K1".to_string(), "S1".to_string()), ("K1".to_string(), "S2".to_string())]
        );
    }

    #[tokio::test]
    async fn first_seen_article_wins_on_duplicate_url() {
        let mut later = article("https://u/1");
        later.title = "a different headline".into();
        let mock = MockSearch::with_responses(vec![
            Ok(vec![article("https://u/1")]),
            Ok(vec![later]),
        ]);

        let result = aggregate(
            &mock,
            &plan(),
            &keywords(&["K1"]),
            &keywords(&["S1", "S2"]),
            10,
        )
        .await;

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].title, "title https://u/1");
    }

    #[tokio::test]
    async fn stops_querying_once_prededup_count_reaches_cap() {
        let mock = MockSearch::with_responses(vec![Ok(vec![
            article("https://u/1"),
            article("https://u/2"),
            article("https://u/3"),
        ])]);

        let result = aggregate(
            &mock,
            &plan(),
            &keywords(&["K1", "K2"]),
            &keywords(&["S1", "S2"]),
            3,
        )
        .await;

        assert_eq!(result.len(), 3);
        // Cap reached on the very first combination; no further queries at all.
        assert_eq!(mock.queried_combinations().len(), 1);
    }

    #[tokio::test]
    async fn queried_combinations_nondecreasing_in_cap() {
        let responses = || {
            vec![
                Ok(vec![article("https://u/1"), article("https://u/2")]),
                Ok(vec![article("https://u/3"), article("https://u/4")]),
                Ok(vec![article("https://u/5")]),
                Ok(vec![article("https://u/6")]),
            ]
        };

        let small = MockSearch::with_responses(responses());
        aggregate(&small, &plan(), &keywords(&["K1", "K2"]), &keywords(&["S1", "S2"]), 3).await;

        let large = MockSearch::with_responses(responses());
        aggregate(&large, &plan(), &keywords(&["K1", "K2"]), &keywords(&["S1", "S2"]), 100).await;

        assert_eq!(small.queried_combinations().len(), 2);
        assert_eq!(large.queried_combinations().len(), 4);
    }

    #[tokio::test]
    async fn gating_uses_prededup_counts_so_result_may_undershoot_cap() {
        // Both combinations return the same two URLs: 4 fetched, 2 unique.
        let mock = MockSearch::with_responses(vec![
            Ok(vec![article("https://u/1"), article("https://u/2")]),
            Ok(vec![article("https://u/1"), article("https://u/2")]),
        ]);

        let result = aggregate(
            &mock,
            &plan(),
            &keywords(&["K1"]),
            &keywords(&["S1", "S2"]),
            4,
        )
        .await;

        assert_eq!(mock.queried_combinations().len(), 2);
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn final_list_is_not_truncated_to_cap() {
        let mock = MockSearch::with_responses(vec![Ok((0..5)
            .map(|i| article(&format!("https://u/{i}")))
            .collect())]);

        let result = aggregate(
            &mock,
            &plan(),
            &keywords(&["K1"]),
            &keywords(&["S1"]),
            3,
        )
        .await;

        assert_eq!(result.len(), 5);
    }

    #[tokio::test]
    async fn failing_combination_is_isolated() {
        let mock = MockSearch::with_responses(vec![
            Err(NewsApiError::RateLimited),
            Ok(vec![article("https://u/1"), article("https://u/2")]),
        ]);

        let result = aggregate(
            &mock,
            &plan(),
            &keywords(&["K1"]),
            &keywords(&["S1", "S2"]),
            10,
        )
        .await;

        let urls: Vec<_> = result.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, ["https://u/1", "https://u/2"]);
        assert_eq!(mock.queried_combinations().len(), 2);
    }

    #[tokio::test]
    async fn aggregation_is_deterministic_for_identical_inputs() {
        let responses = || {
            vec![
                Ok(vec![article("https://u/1"), article("https://u/2")]),
                Ok(vec![article("https://u/2"), article("https://u/3")]),
            ]
        };

        let first = MockSearch::with_responses(responses());
        let second = MockSearch::with_responses(responses());

        let a = aggregate(&first, &plan(), &keywords(&["K1"]), &keywords(&["S1", "S2"]), 10).await;
        let b = aggregate(&second, &plan(), &keywords(&["K1"]), &keywords(&["S1", "S2"]), 10).await;

        assert_eq!(a, b);
        assert_eq!(first.queried_combinations(), second.queried_combinations());
    }

    #[tokio::test]
    async fn seen_urls_do_not_leak_across_runs() {
        let first = MockSearch::with_responses(vec![Ok(vec![article("https://u/1")])]);
        let second = MockSearch::with_responses(vec![Ok(vec![article("https://u/1")])]);

        let a = aggregate(&first, &plan(), &keywords(&["K1"]), &keywords(&["S1"]), 10).await;
        let b = aggregate(&second, &plan(), &keywords(&["K1"]), &keywords(&["S1"]), 10).await;

        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn spec_for_copies_filters_and_enables_dedupe() {
        let plan = plan();
        let spec = plan.spec_for("K1", "S1");

        assert_eq!(spec.keyword, "K1");
        assert_eq!(spec.source_domain, "S1");
        assert_eq!(spec.languages, plan.languages);
        assert_eq!(spec.per_source_limit, plan.per_source_limit);
        assert!(spec.dedupe);
    }

    #[test]
    fn preview_lists_title_source_and_content_in_order() {
        let articles = vec![article("https://u/1"), article("https://u/2")];
        let text = format_preview(&articles);

        assert!(text.contains("Title: title https://u/1\n"));
        assert!(text.contains("Source: https://u/1\n"));
        assert!(text.contains("Content: body https://u/1\n"));
        let first = text.find("https://u/1").unwrap();
        let second = text.find("https://u/2").unwrap();
        assert!(first < second);
        assert_eq!(text.matches("---\n").count(), 2);
    }
}
