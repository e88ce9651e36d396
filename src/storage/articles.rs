use anyhow::Result;

use super::schema::Database;
use super::types::{Article, ArticleRow, ArticleSort, NewArticle};
use crate::metrics::{ArticleMetrics, Scores};

const ARTICLE_COLUMNS: &str = r#"
    id, account_id, title, author, url, guid, content, content_html,
    summary, ai_summary, cover_image, images, videos, tags,
    published_at, word_count, reading_time_minutes,
    read_count, like_count, wow_count, comment_count, share_count, favorite_count,
    engagement_rate, virality_index, content_value_index, heat_score,
    is_simulated, metrics_updated_at, created_at, updated_at
"#;

fn encode_list(list: &[String]) -> Option<String> {
    if list.is_empty() {
        None
    } else {
        serde_json::to_string(list).ok()
    }
}

impl Database {
    // ========================================================================
    // Article Operations
    // ========================================================================

    /// Insert a new article, returning its row id.
    ///
    /// The `url` column is unique; callers dedup via
    /// [`get_article_by_url`](Self::get_article_by_url) before inserting.
    pub async fn insert_article(&self, article: &NewArticle) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO articles (
                account_id, title, author, url, guid, content, content_html,
                summary, cover_image, images, videos,
                published_at, word_count, reading_time_minutes,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(article.account_id)
        .bind(&article.title)
        .bind(&article.author)
        .bind(&article.url)
        .bind(&article.guid)
        .bind(&article.content)
        .bind(&article.content_html)
        .bind(&article.summary)
        .bind(&article.cover_image)
        .bind(encode_list(&article.images))
        .bind(encode_list(&article.videos))
        .bind(article.published_at)
        .bind(article.word_count)
        .bind(article.reading_time_minutes)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Overwrite an existing article's processed content fields.
    ///
    /// Used by full sync: the row id, URL, and accumulated metrics are
    /// preserved; only what the content processor produces is replaced.
    pub async fn update_article_content(&self, id: i64, article: &NewArticle) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            UPDATE articles SET
                title = ?, author = ?, guid = ?, content = ?, content_html = ?,
                summary = ?, cover_image = ?, images = ?, videos = ?,
                published_at = ?, word_count = ?, reading_time_minutes = ?,
                updated_at = ?
            WHERE id = ?
        "#,
        )
        .bind(&article.title)
        .bind(&article.author)
        .bind(&article.guid)
        .bind(&article.content)
        .bind(&article.content_html)
        .bind(&article.summary)
        .bind(&article.cover_image)
        .bind(encode_list(&article.images))
        .bind(encode_list(&article.videos))
        .bind(article.published_at)
        .bind(article.word_count)
        .bind(article.reading_time_minutes)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Apply engagement counters and recomputed scores to an article.
    pub async fn apply_metrics(
        &self,
        id: i64,
        metrics: &ArticleMetrics,
        scores: &Scores,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            UPDATE articles SET
                read_count = ?, like_count = ?, wow_count = ?,
                comment_count = ?, share_count = ?, favorite_count = ?,
                engagement_rate = ?, virality_index = ?,
                content_value_index = ?, heat_score = ?,
                is_simulated = ?, metrics_updated_at = ?, updated_at = ?
            WHERE id = ?
        "#,
        )
        .bind(metrics.read_count)
        .bind(metrics.like_count)
        .bind(metrics.wow_count)
        .bind(metrics.comment_count)
        .bind(metrics.share_count)
        .bind(metrics.favorite_count)
        .bind(scores.engagement_rate)
        .bind(scores.virality_index)
        .bind(scores.content_value_index)
        .bind(scores.heat_score)
        .bind(metrics.is_simulated)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Look up an article by its canonical URL; the dedup key.
    pub async fn get_article_by_url(&self, url: &str) -> Result<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>(&format!(
            "SELECT {} FROM articles WHERE url = ?",
            ARTICLE_COLUMNS
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ArticleRow::into_article))
    }

    /// Look up an article by row id.
    pub async fn get_article(&self, id: i64) -> Result<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>(&format!(
            "SELECT {} FROM articles WHERE id = ?",
            ARTICLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ArticleRow::into_article))
    }

    /// Fast existence check by URL, without decoding the row.
    pub async fn article_exists(&self, url: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM articles WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// List one account's articles with the given sort order.
    pub async fn get_articles_by_account(
        &self,
        account_id: i64,
        limit: i64,
        sort: ArticleSort,
    ) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRow>(&format!(
            "SELECT {} FROM articles WHERE account_id = ? ORDER BY {} LIMIT ?",
            ARTICLE_COLUMNS,
            sort.order_clause()
        ))
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ArticleRow::into_article).collect())
    }

    /// List articles across all accounts with the given sort order.
    pub async fn get_recent_articles(
        &self,
        limit: i64,
        sort: ArticleSort,
    ) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRow>(&format!(
            "SELECT {} FROM articles ORDER BY {} LIMIT ?",
            ARTICLE_COLUMNS,
            sort.order_clause()
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ArticleRow::into_article).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    async fn test_db_with_account() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let account = db
            .create_account("wx-1", "Test Account", "http://agg/feeds/wx-1.json", None)
            .await
            .unwrap();
        (db, account.id)
    }

    fn draft(account_id: i64, url: &str, title: &str) -> NewArticle {
        NewArticle {
            account_id,
            title: title.to_string(),
            author: Some("Author".to_string()),
            url: url.to_string(),
            guid: Some(url.to_string()),
            content: "body text".to_string(),
            content_html: Some("<p>body text</p>".to_string()),
            summary: Some("summary".to_string()),
            images: vec!["https://img.example.com/1.jpg".to_string()],
            word_count: 2,
            reading_time_minutes: 1,
            ..NewArticle::default()
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_by_url() {
        let (db, account_id) = test_db_with_account().await;
        let id = db
            .insert_article(&draft(account_id, "https://example.com/a", "First"))
            .await
            .unwrap();
        assert!(id > 0);

        let article = db
            .get_article_by_url("https://example.com/a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(article.id, id);
        assert_eq!(article.title, "First");
        assert_eq!(article.images, vec!["https://img.example.com/1.jpg"]);
        assert!(article.tags.is_empty());
        assert!(db.article_exists("https://example.com/a").await.unwrap());
        assert!(!db.article_exists("https://example.com/b").await.unwrap());
    }

    #[tokio::test]
    async fn test_url_uniqueness_enforced() {
        let (db, account_id) = test_db_with_account().await;
        db.insert_article(&draft(account_id, "https://example.com/a", "First"))
            .await
            .unwrap();
        let duplicate = db
            .insert_article(&draft(account_id, "https://example.com/a", "Again"))
            .await;
        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn test_update_content_preserves_identity_and_metrics() {
        let (db, account_id) = test_db_with_account().await;
        let id = db
            .insert_article(&draft(account_id, "https://example.com/a", "Old Title"))
            .await
            .unwrap();

        let metrics = ArticleMetrics {
            read_count: 1000,
            like_count: 50,
            ..ArticleMetrics::default()
        };
        let scores = crate::metrics::compute_scores(&metrics);
        db.apply_metrics(id, &metrics, &scores).await.unwrap();

        let mut updated = draft(account_id, "https://example.com/a", "New Title");
        updated.content = "fresh body".to_string();
        db.update_article_content(id, &updated).await.unwrap();

        let article = db.get_article(id).await.unwrap().unwrap();
        assert_eq!(article.id, id);
        assert_eq!(article.url, "https://example.com/a");
        assert_eq!(article.title, "New Title");
        assert_eq!(article.content, "fresh body");
        // Metrics survive the content overwrite
        assert_eq!(article.read_count, 1000);
        assert_eq!(article.engagement_rate, 50.0);
    }

    #[tokio::test]
    async fn test_apply_metrics_sets_counters_scores_and_flag() {
        let (db, account_id) = test_db_with_account().await;
        let id = db
            .insert_article(&draft(account_id, "https://example.com/a", "First"))
            .await
            .unwrap();

        let metrics = ArticleMetrics {
            read_count: 1000,
            like_count: 50,
            wow_count: 20,
            comment_count: 5,
            share_count: 15,
            favorite_count: 10,
            is_simulated: true,
        };
        let scores = crate::metrics::compute_scores(&metrics);
        db.apply_metrics(id, &metrics, &scores).await.unwrap();

        let article = db.get_article(id).await.unwrap().unwrap();
        assert_eq!(article.read_count, 1000);
        assert_eq!(article.favorite_count, 10);
        assert_eq!(article.engagement_rate, 70.0);
        assert_eq!(article.virality_index, 50.0);
        assert_eq!(article.content_value_index, 25.0);
        assert_eq!(article.heat_score, 22.0);
        assert!(article.is_simulated);
        assert!(article.metrics_updated_at.is_some());
    }

    #[tokio::test]
    async fn test_listing_sorted_by_heat() {
        let (db, account_id) = test_db_with_account().await;
        for (n, heat) in [("a", 10), ("b", 30), ("c", 20)] {
            let id = db
                .insert_article(&draft(account_id, &format!("https://example.com/{n}"), n))
                .await
                .unwrap();
            let metrics = ArticleMetrics {
                read_count: 100,
                like_count: heat,
                ..ArticleMetrics::default()
            };
            db.apply_metrics(id, &metrics, &crate::metrics::compute_scores(&metrics))
                .await
                .unwrap();
        }

        let articles = db
            .get_articles_by_account(account_id, 10, ArticleSort::HeatScore)
            .await
            .unwrap();
        let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "c", "a"]);

        let limited = db
            .get_recent_articles(2, ArticleSort::HeatScore)
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }
}
