use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use np_core::types::normalize_email;
use np_core::{
    Ad, AdPatch, AdQuery, Comment, Error, NewAd, NewComment, NewPost, NewsStorage, Post, PostId,
    PostPatch, PostQuery, Result, Subscriber,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::{BackendConfig, StorageBackend};

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        excerpt TEXT,
        content TEXT,
        image_url TEXT,
        read_time TEXT,
        post_type TEXT NOT NULL DEFAULT 'article',
        section TEXT,
        published INTEGER NOT NULL DEFAULT 0,
        featured_home INTEGER NOT NULL DEFAULT 0,
        featured_section INTEGER NOT NULL DEFAULT 0,
        trending_home INTEGER NOT NULL DEFAULT 0,
        trending_section INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ads (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        image_url TEXT,
        link_url TEXT,
        position TEXT NOT NULL DEFAULT 'sidebar',
        page TEXT,
        active INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        author_name TEXT NOT NULL,
        author_email TEXT,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS mailing_list_subscribers (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        subscribed_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS posts_created_at ON posts (created_at DESC)",
    // Add future migrations here
];

pub struct SQLiteStorage {
    pool: Arc<SqlitePool>,
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    fn get_error_message() -> &'static str {
        "SQLite database should be available at ./newsroom.db"
    }

    async fn connect(config: &BackendConfig) -> Result<Self> {
        let db_path = config
            .url
            .as_deref()
            .map(|u| u.trim_start_matches("sqlite:").to_string())
            .unwrap_or_else(|| "newsroom.db".to_string());
        Self::new_with_path(Path::new(&db_path)).await
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| db_error("Failed to connect to database", e))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| db_error(&format!("Failed to run migration {}", i), e))?;
        }
        debug!("SQLite migrations applied to {}", db_path.display());

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Insert or overwrite a post row in place.
    async fn write_post(&self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts
            (id, title, excerpt, content, image_url, read_time, post_type, section,
             published, featured_home, featured_section, trending_home, trending_section, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                excerpt = excluded.excerpt,
                content = excluded.content,
                image_url = excluded.image_url,
                read_time = excluded.read_time,
                post_type = excluded.post_type,
                section = excluded.section,
                published = excluded.published,
                featured_home = excluded.featured_home,
                featured_section = excluded.featured_section,
                trending_home = excluded.trending_home,
                trending_section = excluded.trending_section
            "#,
        )
        .bind(post.id.to_string())
        .bind(&post.title)
        .bind(post.excerpt.as_deref())
        .bind(post.content.as_deref())
        .bind(post.image_url.as_deref())
        .bind(post.read_time.as_deref())
        .bind(&post.post_type)
        .bind(post.section.as_deref())
        .bind(post.published)
        .bind(post.featured_home)
        .bind(post.featured_section)
        .bind(post.trending_home)
        .bind(post.trending_section)
        .bind(timestamp(&post.created_at))
        .execute(&*self.pool)
        .await
        .map_err(|e| db_error("Failed to store post", e))?;
        Ok(())
    }

    async fn write_ad(&self, ad: &Ad) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ads (id, title, image_url, link_url, position, page, active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                image_url = excluded.image_url,
                link_url = excluded.link_url,
                position = excluded.position,
                page = excluded.page,
                active = excluded.active
            "#,
        )
        .bind(ad.id.to_string())
        .bind(&ad.title)
        .bind(ad.image_url.as_deref())
        .bind(ad.link_url.as_deref())
        .bind(&ad.position)
        .bind(ad.page.as_deref())
        .bind(ad.active)
        .bind(timestamp(&ad.created_at))
        .execute(&*self.pool)
        .await
        .map_err(|e| db_error("Failed to store ad", e))?;
        Ok(())
    }

    async fn get_ad(&self, id: Uuid) -> Result<Option<Ad>> {
        let row = sqlx::query("SELECT * FROM ads WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to get ad", e))?;
        row.as_ref().map(ad_from_row).transpose()
    }
}

#[async_trait]
impl NewsStorage for SQLiteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM posts WHERE 1 = 1");
        if let Some(published) = query.published {
            builder.push(" AND published = ").push_bind(published);
        }
        if let Some(section) = &query.section {
            builder
                .push(" AND LOWER(TRIM(section)) = LOWER(TRIM(")
                .push_bind(section.clone())
                .push("))");
        }
        if let Some(flag) = query.flag {
            builder.push(format!(" AND {} = 1", flag.column()));
        }
        builder.push(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = builder
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to list posts", e))?;
        rows.iter().map(post_from_row).collect()
    }

    async fn get_post(&self, id: PostId) -> Result<Option<Post>> {
        let row = sqlx::query("SELECT * FROM posts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to get post", e))?;
        row.as_ref().map(post_from_row).transpose()
    }

    async fn create_post(&self, post: NewPost) -> Result<Post> {
        post.validate()?;
        let post = post.into_post(Uuid::new_v4(), Utc::now());
        self.write_post(&post).await?;
        Ok(post)
    }

    async fn update_post(&self, id: PostId, patch: PostPatch) -> Result<Post> {
        patch.validate()?;
        let mut post = self
            .get_post(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("post {}", id)))?;
        patch.apply(&mut post);
        self.write_post(&post).await?;
        Ok(post)
    }

    async fn delete_post(&self, id: PostId) -> Result<()> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id.to_string())
            .execute(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to delete post", e))?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("post {}", id)));
        }
        Ok(())
    }

    async fn list_ads(&self, query: &AdQuery) -> Result<Vec<Ad>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM ads WHERE 1 = 1");
        if let Some(active) = query.active {
            builder.push(" AND active = ").push_bind(active);
        }
        if let Some(position) = &query.position {
            builder.push(" AND position = ").push_bind(position.clone());
        }
        builder.push(" ORDER BY created_at DESC, id DESC");

        let rows = builder
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to list ads", e))?;
        rows.iter().map(ad_from_row).collect()
    }

    async fn create_ad(&self, ad: NewAd) -> Result<Ad> {
        ad.validate()?;
        let ad = ad.into_ad(Uuid::new_v4(), Utc::now());
        self.write_ad(&ad).await?;
        Ok(ad)
    }

    async fn update_ad(&self, id: Uuid, patch: AdPatch) -> Result<Ad> {
        patch.validate()?;
        let mut ad = self
            .get_ad(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("ad {}", id)))?;
        patch.apply(&mut ad);
        self.write_ad(&ad).await?;
        Ok(ad)
    }

    async fn delete_ad(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM ads WHERE id = ?")
            .bind(id.to_string())
            .execute(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to delete ad", e))?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("ad {}", id)));
        }
        Ok(())
    }

    async fn list_comments(&self, post_id: PostId) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM comments
            WHERE post_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(post_id.to_string())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| db_error("Failed to list comments", e))?;
        rows.iter().map(comment_from_row).collect()
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        let (post_id, author_name, author_email, content) = comment.validate()?;
        if self.get_post(post_id).await?.is_none() {
            return Err(Error::NotFound(format!("post {}", post_id)));
        }
        let comment = Comment {
            id: Uuid::new_v4(),
            post_id,
            author_name,
            author_email,
            content,
            created_at: Utc::now(),
        };
        sqlx::query(
            r#"
            INSERT INTO comments (id, post_id, author_name, author_email, content, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(comment.id.to_string())
        .bind(comment.post_id.to_string())
        .bind(&comment.author_name)
        .bind(comment.author_email.as_deref())
        .bind(&comment.content)
        .bind(timestamp(&comment.created_at))
        .execute(&*self.pool)
        .await
        .map_err(|e| db_error("Failed to store comment", e))?;
        Ok(comment)
    }

    async fn list_subscribers(&self) -> Result<Vec<Subscriber>> {
        let rows = sqlx::query("SELECT * FROM mailing_list_subscribers ORDER BY subscribed_at DESC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to list subscribers", e))?;
        rows.iter()
            .map(|row| {
                Ok(Subscriber {
                    id: uuid_column(row, "id")?,
                    email: row.get("email"),
                    subscribed_at: time_column(row, "subscribed_at")?,
                })
            })
            .collect()
    }

    async fn add_subscriber(&self, email: &str) -> Result<Subscriber> {
        let subscriber = Subscriber {
            id: Uuid::new_v4(),
            email: normalize_email(email)?,
            subscribed_at: Utc::now(),
        };
        let result = sqlx::query(
            "INSERT INTO mailing_list_subscribers (id, email, subscribed_at) VALUES (?, ?, ?)",
        )
        .bind(subscriber.id.to_string())
        .bind(&subscriber.email)
        .bind(timestamp(&subscriber.subscribed_at))
        .execute(&*self.pool)
        .await;

        match result {
            Ok(_) => Ok(subscriber),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(Error::AlreadySubscribed(subscriber.email))
            }
            Err(e) => Err(db_error("Failed to add subscriber", e)),
        }
    }
}

fn db_error(context: &str, e: sqlx::Error) -> Error {
    Error::Database(format!("{}: {}", context, e))
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn time_column(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let raw: String = row.get(column);
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Database(format!("Failed to parse {} '{}': {}", column, raw, e)))
}

fn uuid_column(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let raw: String = row.get(column);
    Uuid::parse_str(&raw)
        .map_err(|e| Error::Database(format!("Failed to parse {} '{}': {}", column, raw, e)))
}

fn post_from_row(row: &SqliteRow) -> Result<Post> {
    Ok(Post {
        id: uuid_column(row, "id")?,
        title: row.get("title"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        image_url: row.get("image_url"),
        read_time: row.get("read_time"),
        post_type: row.get("post_type"),
        section: row.get("section"),
        published: row.get("published"),
        featured_home: row.get("featured_home"),
        featured_section: row.get("featured_section"),
        trending_home: row.get("trending_home"),
        trending_section: row.get("trending_section"),
        created_at: time_column(row, "created_at")?,
    })
}

fn ad_from_row(row: &SqliteRow) -> Result<Ad> {
    Ok(Ad {
        id: uuid_column(row, "id")?,
        title: row.get("title"),
        image_url: row.get("image_url"),
        link_url: row.get("link_url"),
        position: row.get("position"),
        page: row.get("page"),
        active: row.get("active"),
        created_at: time_column(row, "created_at")?,
    })
}

fn comment_from_row(row: &SqliteRow) -> Result<Comment> {
    Ok(Comment {
        id: uuid_column(row, "id")?,
        post_id: uuid_column(row, "post_id")?,
        author_name: row.get("author_name"),
        author_email: row.get("author_email"),
        content: row.get("content"),
        created_at: time_column(row, "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use np_core::PostFlag;
    use tempfile::tempdir;

    fn new_post(title: &str, minutes_ago: i64) -> NewPost {
        NewPost {
            title: title.to_string(),
            section: Some("Politics".to_string()),
            published: true,
            created_at: Some(Utc::now() - Duration::minutes(minutes_ago)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_sqlite_storage() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let storage = SQLiteStorage::new_with_path(&db_path).await.unwrap();

        storage.create_post(new_post("First", 20)).await.unwrap();
        let second = storage.create_post(new_post("Second", 10)).await.unwrap();

        let posts = storage
            .list_posts(&PostQuery::published().in_section("politics"))
            .await
            .unwrap();
        let titles: Vec<&str> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Second", "First"]);

        let patch = PostPatch {
            trending_home: Some(true),
            ..Default::default()
        };
        storage.update_post(second.id, patch).await.unwrap();
        let trending = storage
            .list_posts(&PostQuery::published().flagged(PostFlag::TrendingHome).limit(5))
            .await
            .unwrap();
        assert_eq!(trending.len(), 1);
        assert_eq!(trending[0], storage.get_post(second.id).await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_created_rows_read_back_unchanged() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db"))
            .await
            .unwrap();

        let post = storage
            .create_post(NewPost {
                title: "Fresh".to_string(),
                published: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(storage.get_post(post.id).await.unwrap(), Some(post));

        let ad = storage
            .create_ad(NewAd {
                title: "Bakery".to_string(),
                active: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(storage.list_ads(&AdQuery::default()).await.unwrap(), vec![ad]);
    }

    #[tokio::test]
    async fn test_comments_and_subscribers() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        let post = storage.create_post(new_post("Story", 1)).await.unwrap();

        storage
            .create_comment(NewComment {
                post_id: Some(post.id),
                author_name: "Ana".to_string(),
                author_email: Some("ana@example.com".to_string()),
                content: " Thanks ".to_string(),
            })
            .await
            .unwrap();
        let comments = storage.list_comments(post.id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].content, "Thanks");

        storage.delete_post(post.id).await.unwrap();
        assert!(storage.list_comments(post.id).await.unwrap().is_empty());

        storage.add_subscriber("reader@example.com").await.unwrap();
        let duplicate = storage.add_subscriber("READER@example.com").await;
        assert!(matches!(duplicate, Err(Error::AlreadySubscribed(_))));
        assert_eq!(storage.list_subscribers().await.unwrap().len(), 1);
    }
}
