use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gallery_model::{
    Album, AlbumId, BucketName, NewAlbum, Permission, PermissionMap, Tag,
};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::debug;

use super::{AlbumPermissions, AlbumRepository};
use crate::{
    error::{CatalogError, CatalogResult},
    filter::AlbumFilters,
};

const SELECT_ALBUMS: &str = r#"
    SELECT
        a.id, a.name, a.description, a.location, a.created_at,
        a.owner_id, a.bucket, a.thumbnail,
        ARRAY(
            SELECT up.user_id || ':' || up.permission
            FROM album_user_permissions up
            WHERE up.album_id = a.id
            ORDER BY 1
        ) AS user_permissions,
        ARRAY(
            SELECT gp.group_name || ':' || gp.permission
            FROM album_group_permissions gp
            WHERE gp.album_id = a.id
            ORDER BY 1
        ) AS group_permissions,
        ARRAY(
            SELECT t.name
            FROM album_tags atg JOIN tag t ON t.id = atg.tag_id
            WHERE atg.album_id = a.id
            ORDER BY t.name
        ) AS tag_names,
        ARRAY(
            SELECT t.color
            FROM album_tags atg JOIN tag t ON t.id = atg.tag_id
            WHERE atg.album_id = a.id
            ORDER BY t.name
        ) AS tag_colors
    FROM album a
    WHERE TRUE"#;

#[derive(Clone, Debug)]
pub struct PostgresAlbumRepository {
    pool: PgPool,
}

impl PostgresAlbumRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run `SELECT_ALBUMS` with `restrict` appending the path-specific
    /// restriction and `filters` appended after it.
    async fn select<F>(
        &self,
        filters: &AlbumFilters,
        restrict: F,
    ) -> CatalogResult<Vec<Album>>
    where
        F: FnOnce(&mut QueryBuilder<'_, Postgres>) + Send,
    {
        let mut builder = QueryBuilder::<Postgres>::new(SELECT_ALBUMS);
        restrict(&mut builder);
        filters.push_where(&mut builder);
        builder.push(" ORDER BY a.id");

        let rows = builder
            .build_query_as::<AlbumRow>()
            .fetch_all(self.pool())
            .await?;
        rows.into_iter().map(Album::try_from).collect()
    }

    async fn insert_grants(
        tx: &mut Transaction<'_, Postgres>,
        id: AlbumId,
        permissions: &AlbumPermissions,
    ) -> CatalogResult<()> {
        for (table, column, grants) in [
            ("album_user_permissions", "user_id", &permissions.users),
            ("album_group_permissions", "group_name", &permissions.groups),
        ] {
            let rows: Vec<(&str, Permission)> = grants
                .iter()
                .flat_map(|(grantee, set)| {
                    set.iter().map(move |p| (grantee.as_str(), *p))
                })
                .collect();
            if rows.is_empty() {
                continue;
            }

            let mut builder = QueryBuilder::<Postgres>::new(format!(
                "INSERT INTO {table} (album_id, {column}, permission) "
            ));
            builder.push_values(rows, |mut row, (grantee, permission)| {
                row.push_bind(id.as_i32())
                    .push_bind(grantee.to_string())
                    .push_bind(permission.as_str());
            });
            builder.push(" ON CONFLICT DO NOTHING");
            builder.build().execute(&mut **tx).await?;
        }
        Ok(())
    }

    /// Upsert the owner's tag and link it to the album.
    async fn attach_tag(
        tx: &mut Transaction<'_, Postgres>,
        id: AlbumId,
        tag: &Tag,
    ) -> CatalogResult<()> {
        let tag_id: Option<(i32,)> = sqlx::query_as(
            r#"
            INSERT INTO tag (user_id, name, color)
            SELECT a.owner_id, $2, $3 FROM album a WHERE a.id = $1
            ON CONFLICT (user_id, name)
            DO UPDATE SET color = COALESCE(EXCLUDED.color, tag.color)
            RETURNING id
            "#,
        )
        .bind(id.as_i32())
        .bind(&tag.name)
        .bind(&tag.color)
        .fetch_optional(&mut **tx)
        .await?;
        let Some((tag_id,)) = tag_id else {
            return Err(CatalogError::NotFound(id));
        };

        sqlx::query(
            "INSERT INTO album_tags (album_id, tag_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(id.as_i32())
        .bind(tag_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AlbumRepository for PostgresAlbumRepository {
    async fn create(
        &self,
        album: NewAlbum,
        bucket: BucketName,
    ) -> CatalogResult<Album> {
        let mut tx = self.pool().begin().await?;

        let (id,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO album (
                name, description, location, created_at,
                owner_id, bucket, thumbnail
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&album.name)
        .bind(&album.description)
        .bind(&album.location)
        .bind(album.created_at)
        .bind(&album.owner_id)
        .bind(bucket.as_str())
        .bind(&album.thumbnail)
        .fetch_one(&mut *tx)
        .await?;

        let id = AlbumId(id);
        let grants = AlbumPermissions::new(
            album.user_permissions.clone(),
            album.group_permissions.clone(),
        );
        Self::insert_grants(&mut tx, id, &grants).await?;
        for tag in &album.tags {
            Self::attach_tag(&mut tx, id, tag).await?;
        }
        tx.commit().await?;

        debug!(album_id = %id, bucket = %bucket, "inserted album row");
        Ok(album.into_album(id, bucket))
    }

    async fn update(&self, album: &Album) -> CatalogResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE album
            SET name = $2, description = $3, location = $4,
                created_at = $5, thumbnail = $6
            WHERE id = $1
            "#,
        )
        .bind(album.id.as_i32())
        .bind(&album.name)
        .bind(&album.description)
        .bind(&album.location)
        .bind(album.created_at)
        .bind(&album.thumbnail)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(album.id));
        }
        Ok(())
    }

    async fn delete(&self, id: AlbumId) -> CatalogResult<()> {
        let result = sqlx::query("DELETE FROM album WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(id));
        }
        Ok(())
    }

    async fn get_by_id(&self, id: AlbumId) -> CatalogResult<Option<Album>> {
        let mut albums = self
            .select(&AlbumFilters::new(), |builder| {
                builder.push(" AND a.id = ");
                builder.push_bind(id.as_i32());
            })
            .await?;
        Ok(albums.pop())
    }

    async fn get_all(&self, filters: &AlbumFilters) -> CatalogResult<Vec<Album>> {
        self.select(filters, |_| {}).await
    }

    async fn get_by_owner_id(
        &self,
        owner_id: &str,
        filters: &AlbumFilters,
    ) -> CatalogResult<Vec<Album>> {
        let owner_id = owner_id.to_string();
        self.select(filters, move |builder| {
            builder.push(" AND a.owner_id = ");
            builder.push_bind(owner_id);
        })
        .await
    }

    async fn get_by_user_id(
        &self,
        user_id: &str,
        filters: &AlbumFilters,
    ) -> CatalogResult<Vec<Album>> {
        let user_id = user_id.to_string();
        self.select(filters, move |builder| {
            builder.push(
                " AND EXISTS (SELECT 1 FROM album_user_permissions up \
                 WHERE up.album_id = a.id AND up.user_id = ",
            );
            builder.push_bind(user_id);
            builder.push(")");
        })
        .await
    }

    async fn get_by_group_name(
        &self,
        group: &str,
        filters: &AlbumFilters,
    ) -> CatalogResult<Vec<Album>> {
        self.get_by_groups(&[group.to_string()], filters).await
    }

    async fn get_by_groups(
        &self,
        groups: &[String],
        filters: &AlbumFilters,
    ) -> CatalogResult<Vec<Album>> {
        if groups.is_empty() {
            return Ok(Vec::new());
        }
        let groups = groups.to_vec();
        self.select(filters, move |builder| {
            builder.push(
                " AND EXISTS (SELECT 1 FROM album_group_permissions gp \
                 WHERE gp.album_id = a.id AND gp.group_name = ANY(",
            );
            builder.push_bind(groups);
            builder.push("))");
        })
        .await
    }

    async fn set_permissions(
        &self,
        id: AlbumId,
        permissions: &AlbumPermissions,
    ) -> CatalogResult<()> {
        let mut tx = self.pool().begin().await?;
        let exists: Option<(i32,)> =
            sqlx::query_as("SELECT id FROM album WHERE id = $1 FOR UPDATE")
                .bind(id.as_i32())
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(CatalogError::NotFound(id));
        }
        Self::insert_grants(&mut tx, id, permissions).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn remove_permissions(&self, id: AlbumId) -> CatalogResult<()> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM album_user_permissions WHERE album_id = $1")
            .bind(id.as_i32())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM album_group_permissions WHERE album_id = $1")
            .bind(id.as_i32())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn associate_tag(&self, id: AlbumId, tag: &Tag) -> CatalogResult<()> {
        let mut tx = self.pool().begin().await?;
        Self::attach_tag(&mut tx, id, tag).await?;
        tx.commit().await?;
        debug!(album_id = %id, tag = %tag.name, "tag associated");
        Ok(())
    }

    async fn dissociate_tag(&self, id: AlbumId, name: &str) -> CatalogResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM album_tags atg
            USING tag t
            WHERE atg.tag_id = t.id AND atg.album_id = $1 AND t.name = $2
            "#,
        )
        .bind(id.as_i32())
        .bind(name)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<(i32,)> =
                sqlx::query_as("SELECT id FROM album WHERE id = $1")
                    .bind(id.as_i32())
                    .fetch_optional(self.pool())
                    .await?;
            if exists.is_none() {
                return Err(CatalogError::NotFound(id));
            }
        }
        Ok(())
    }
}

// Database row type for albums
#[derive(sqlx::FromRow)]
struct AlbumRow {
    id: i32,
    name: String,
    description: Option<String>,
    location: Option<String>,
    created_at: DateTime<Utc>,
    owner_id: String,
    bucket: String,
    thumbnail: Option<String>,
    user_permissions: Vec<String>,
    group_permissions: Vec<String>,
    tag_names: Vec<String>,
    tag_colors: Vec<Option<String>>,
}

/// Decode `grantee:permission` pairs produced by `SELECT_ALBUMS`.
fn decode_grants(pairs: Vec<String>) -> CatalogResult<PermissionMap> {
    let mut map = PermissionMap::new();
    for pair in pairs {
        let (grantee, permission) = pair.rsplit_once(':').ok_or_else(|| {
            CatalogError::Corrupt(format!("malformed grant `{pair}`"))
        })?;
        map.entry(grantee.to_string())
            .or_insert_with(BTreeSet::new)
            .insert(permission.parse()?);
    }
    Ok(map)
}

/// Pair the parallel name and color arrays produced by `SELECT_ALBUMS`.
fn decode_tags(
    names: Vec<String>,
    colors: Vec<Option<String>>,
) -> CatalogResult<Vec<Tag>> {
    if names.len() != colors.len() {
        return Err(CatalogError::Corrupt(format!(
            "{} tag names but {} colors",
            names.len(),
            colors.len()
        )));
    }
    Ok(names
        .into_iter()
        .zip(colors)
        .map(|(name, color)| Tag { name, color })
        .collect())
}

impl TryFrom<AlbumRow> for Album {
    type Error = CatalogError;

    fn try_from(row: AlbumRow) -> CatalogResult<Self> {
        Ok(Album {
            id: AlbumId(row.id),
            name: row.name,
            description: row.description,
            location: row.location,
            created_at: row.created_at,
            owner_id: row.owner_id,
            bucket: BucketName::new(row.bucket)?,
            thumbnail: row.thumbnail,
            user_permissions: decode_grants(row.user_permissions)?,
            group_permissions: decode_grants(row.group_permissions)?,
            tags: decode_tags(row.tag_names, row.tag_colors)?,
            photos: Vec::new(),
            videos: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_decode_on_last_colon() {
        let map = decode_grants(vec![
            "family:album.read".into(),
            "team:ops:album.edit".into(),
            "family:album.write".into(),
        ])
        .unwrap();
        assert_eq!(
            map.get("family"),
            Some(&BTreeSet::from([Permission::AlbumRead, Permission::AlbumWrite]))
        );
        assert!(map["team:ops"].contains(&Permission::AlbumEdit));
    }

    #[test]
    fn tags_pair_names_with_colors() {
        let tags = decode_tags(
            vec!["alps".into(), "sea".into()],
            vec![None, Some("blue".into())],
        )
        .unwrap();
        assert_eq!(tags, [Tag::new("alps"), Tag::new("sea").with_color("blue")]);

        assert!(matches!(
            decode_tags(vec!["alps".into()], vec![]),
            Err(CatalogError::Corrupt(_))
        ));
    }

    #[test]
    fn unknown_permission_is_corrupt() {
        let err = decode_grants(vec!["u1:album.share".into()]).unwrap_err();
        assert!(matches!(err, CatalogError::Corrupt(_)));
    }
}
