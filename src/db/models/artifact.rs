// src/db/models/artifact.rs

//! Artifact model - one stored conversion job
//!
//! The artifact's output is its canonical current result. After creation it
//! only changes when a history entry is accepted.

use super::{invalid_column, timestamp};
use crate::config::NamingConfig;
use crate::conversion::ConversionKind;
use crate::conversion::naming;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::Serialize;
use tracing::{debug, info};

/// Give up after this many random suffixes all collide
const MAX_NAME_ATTEMPTS: usize = 8;

/// Default page size for listings
pub const DEFAULT_PER_PAGE: u32 = 10;

const COLUMNS: &str = "id, uuid, user_id, name, conversion_kind, description, input_text, \
                       output_text, public, share_key, created_at, updated_at";

/// A stored conversion job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub id: Option<i64>,
    pub uuid: String,
    pub user_id: Option<i64>,
    pub name: String,
    pub kind: ConversionKind,
    pub description: Option<String>,
    pub input_text: String,
    pub output_text: String,
    pub public: bool,
    #[serde(skip_serializing)]
    pub share_key: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Request to store a first conversion
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub user_id: Option<i64>,
    pub name: Option<String>,
    pub kind: ConversionKind,
    pub description: Option<String>,
    pub input_text: String,
    pub output_text: String,
    pub public: bool,
}

impl NewArtifact {
    pub fn new(kind: ConversionKind, input_text: String, output_text: String) -> Self {
        Self {
            user_id: None,
            name: None,
            kind,
            description: None,
            input_text,
            output_text,
            public: false,
        }
    }
}

/// Who is looking at artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Viewer {
    /// Sees public artifacts only
    #[default]
    Anonymous,
    /// Sees public artifacts and their own
    User(i64),
    /// Sees everything
    Admin(i64),
}

impl Viewer {
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(id) | Viewer::Admin(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(format!("Invalid sort order: {s}")),
        }
    }
}

/// Listing filters
#[derive(Debug, Clone)]
pub struct ArtifactQuery {
    pub viewer: Viewer,
    pub kind: Option<ConversionKind>,
    /// Case-insensitive substring of name or description
    pub search: Option<String>,
    pub sort: SortOrder,
    /// Restrict to the viewer's own artifacts (ignored for anonymous viewers)
    pub only_mine: bool,
    /// 1-based
    pub page: u32,
    pub per_page: u32,
}

impl Default for ArtifactQuery {
    fn default() -> Self {
        Self {
            viewer: Viewer::Anonymous,
            kind: None,
            search: None,
            sort: SortOrder::Desc,
            only_mine: false,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactPage {
    pub items: Vec<Artifact>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl ArtifactPage {
    pub fn pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.per_page.max(1)))
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.pages()
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

impl Artifact {
    /// Store a first conversion, resolving the name
    ///
    /// A missing name becomes `<OUTPUT>_<timestamp>`; a taken name gets a
    /// random suffix.
    pub fn create(conn: &Connection, new: NewArtifact, config: &NamingConfig) -> Result<Self> {
        let now = Utc::now();
        let requested = new
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| naming::default_name(new.kind, now));

        let name = Self::available_name(conn, &requested, config)?;
        let stamp = timestamp_of(now);
        let description = new
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| naming::default_description(new.kind, now));

        let mut artifact = Self {
            id: None,
            uuid: uuid::Uuid::new_v4().to_string(),
            user_id: new.user_id,
            name,
            kind: new.kind,
            description: Some(description),
            input_text: new.input_text,
            output_text: new.output_text,
            public: new.public,
            share_key: naming::generate_share_key(config.share_key_len),
            created_at: stamp.clone(),
            updated_at: stamp,
        };
        artifact.insert(conn)?;
        info!("Created artifact {} ({})", artifact.name, artifact.uuid);
        Ok(artifact)
    }

    /// `requested` cut to the limit, or a suffixed variant if it is taken
    fn available_name(conn: &Connection, requested: &str, config: &NamingConfig) -> Result<String> {
        let mut name = naming::truncate_chars(requested, config.max_name_len).to_string();
        for _ in 0..MAX_NAME_ATTEMPTS {
            if !Self::name_exists(conn, &name)? {
                return Ok(name);
            }
            let candidate = naming::disambiguate(requested, config);
            debug!("Artifact name {} is taken, trying {}", name, candidate);
            name = candidate;
        }
        Err(Error::AlreadyExists(format!("artifact name '{requested}'")))
    }

    /// Insert this artifact into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO artifacts (uuid, user_id, name, conversion_kind, description, input_text,
                                    output_text, public, share_key, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                &self.uuid,
                self.user_id,
                &self.name,
                self.kind.as_str(),
                &self.description,
                &self.input_text,
                &self.output_text,
                self.public,
                &self.share_key,
                &self.created_at,
                &self.updated_at,
            ],
        )
        .map_err(|e| {
            let err = Error::from(e);
            if err.is_unique_violation() {
                Error::AlreadyExists(format!("artifact name '{}'", self.name))
            } else {
                err
            }
        })?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find an artifact by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM artifacts WHERE id = ?1"))?;
        Ok(stmt.query_row([id], Self::from_row).optional()?)
    }

    /// Find an artifact by its external UUID
    pub fn find_by_uuid(conn: &Connection, uuid: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM artifacts WHERE uuid = ?1"))?;
        Ok(stmt.query_row([uuid], Self::from_row).optional()?)
    }

    /// Resolve a share link; both parts must match
    pub fn find_shared(conn: &Connection, uuid: &str, share_key: &str) -> Result<Option<Self>> {
        Ok(Self::find_by_uuid(conn, uuid)?.filter(|a| a.share_key == share_key))
    }

    pub fn name_exists(conn: &Connection, name: &str) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row("SELECT id FROM artifacts WHERE name = ?1", [name], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// Delete an artifact and its history; false when it did not exist
    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let deleted = conn.execute("DELETE FROM artifacts WHERE id = ?1", [id])?;
        if deleted > 0 {
            info!("Deleted artifact {}", id);
        }
        Ok(deleted > 0)
    }

    /// Rename and/or re-describe an artifact
    ///
    /// Renaming onto another artifact's name is refused, never suffixed.
    pub fn update_details(
        conn: &Connection,
        id: i64,
        name: Option<&str>,
        description: Option<&str>,
        config: &NamingConfig,
    ) -> Result<Self> {
        let mut artifact =
            Self::find_by_id(conn, id)?.ok_or_else(|| Error::NotFound(format!("artifact {id}")))?;

        if let Some(name) = name.map(str::trim) {
            if name.is_empty() {
                return Err(Error::invalid_option("name", "must not be empty"));
            }
            if name.chars().count() > config.max_name_len {
                return Err(Error::invalid_option(
                    "name",
                    format!("longer than {} characters", config.max_name_len),
                ));
            }
            if name != artifact.name && Self::name_exists(conn, name)? {
                return Err(Error::AlreadyExists(format!("artifact name '{name}'")));
            }
            artifact.name = name.to_string();
        }
        if let Some(description) = description {
            artifact.description = Some(description.to_string());
        }

        conn.execute(
            "UPDATE artifacts SET name = ?1, description = ?2 WHERE id = ?3",
            params![&artifact.name, &artifact.description, id],
        )?;
        Ok(artifact)
    }

    /// Flip the public flag; returns the new value
    pub fn toggle_public(conn: &Connection, id: i64) -> Result<bool> {
        let updated = conn.execute(
            "UPDATE artifacts SET public = NOT public WHERE id = ?1",
            [id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("artifact {id}")));
        }
        let public: bool =
            conn.query_row("SELECT public FROM artifacts WHERE id = ?1", [id], |row| row.get(0))?;
        Ok(public)
    }

    /// Replace the share key; returns the new key
    pub fn regenerate_share_key(conn: &Connection, id: i64, config: &NamingConfig) -> Result<String> {
        let key = naming::generate_share_key(config.share_key_len);
        let updated = conn.execute(
            "UPDATE artifacts SET share_key = ?1 WHERE id = ?2",
            params![&key, id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("artifact {id}")));
        }
        Ok(key)
    }

    /// Replace the canonical output
    pub(crate) fn set_output(conn: &Connection, id: i64, output: &str, updated_at: &str) -> Result<()> {
        let updated = conn.execute(
            "UPDATE artifacts SET output_text = ?1, updated_at = ?2 WHERE id = ?3",
            params![output, updated_at, id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("artifact {id}")));
        }
        Ok(())
    }

    /// Whether a viewer may see this artifact
    pub fn visible_to(&self, viewer: Viewer) -> bool {
        match viewer {
            Viewer::Admin(_) => true,
            Viewer::User(id) => self.public || self.user_id == Some(id),
            Viewer::Anonymous => self.public,
        }
    }

    /// Whether a viewer may edit or delete this artifact
    pub fn editable_by(&self, viewer: Viewer) -> bool {
        match viewer {
            Viewer::Admin(_) => true,
            Viewer::User(id) => self.user_id == Some(id),
            Viewer::Anonymous => false,
        }
    }

    /// Paged listing with visibility rules applied
    pub fn list(conn: &Connection, query: &ArtifactQuery) -> Result<ArtifactPage> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();

        if let Some(kind) = query.kind {
            values.push(SqlValue::Text(kind.as_str().to_string()));
            clauses.push(format!("conversion_kind = ?{}", values.len()));
        }

        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            values.push(SqlValue::Text(format!("%{}%", escape_like(&search.to_lowercase()))));
            let n = values.len();
            clauses.push(format!(
                "(lower(name) LIKE ?{n} ESCAPE '\\' OR lower(coalesce(description, '')) LIKE ?{n} ESCAPE '\\')"
            ));
        }

        match query.viewer {
            Viewer::Anonymous => clauses.push("public = 1".to_string()),
            Viewer::User(user_id) | Viewer::Admin(user_id) if query.only_mine => {
                values.push(SqlValue::Integer(user_id));
                clauses.push(format!("user_id = ?{}", values.len()));
            }
            Viewer::User(user_id) => {
                values.push(SqlValue::Integer(user_id));
                clauses.push(format!("(public = 1 OR user_id = ?{})", values.len()));
            }
            Viewer::Admin(_) => {}
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM artifacts{where_sql}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let page = query.page.max(1);
        let per_page = query.per_page.max(1);
        values.push(SqlValue::Integer(i64::from(per_page)));
        values.push(SqlValue::Integer(i64::from(page - 1) * i64::from(per_page)));
        let order = query.sort.as_sql();
        let sql = format!(
            "SELECT {COLUMNS} FROM artifacts{where_sql}
             ORDER BY created_at {order}, id {order}
             LIMIT ?{} OFFSET ?{}",
            values.len() - 1,
            values.len()
        );

        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(values.iter()), Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(ArtifactPage {
            items,
            page,
            per_page,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    /// Convert a database row to an Artifact
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let kind_str: String = row.get(4)?;
        let kind = kind_str
            .parse::<ConversionKind>()
            .map_err(|e| invalid_column(4, e))?;

        Ok(Self {
            id: Some(row.get(0)?),
            uuid: row.get(1)?,
            user_id: row.get(2)?,
            name: row.get(3)?,
            kind,
            description: row.get(5)?,
            input_text: row.get(6)?,
            output_text: row.get(7)?,
            public: row.get(8)?,
            share_key: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

fn timestamp_of(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();
        (temp_file, conn)
    }

    fn new_artifact(name: Option<&str>, user_id: Option<i64>, public: bool) -> NewArtifact {
        NewArtifact {
            user_id,
            name: name.map(str::to_string),
            public,
            ..NewArtifact::new(
                ConversionKind::MispToStix,
                r#"{"Event": {"info": "x"}}"#.to_string(),
                r#"{"type": "bundle"}"#.to_string(),
            )
        }
    }

    #[test]
    fn test_artifact_crud() {
        let (_temp, conn) = create_test_db();
        let config = NamingConfig::default();

        let artifact = Artifact::create(&conn, new_artifact(Some("feed"), Some(7), false), &config).unwrap();
        let id = artifact.id.unwrap();
        assert_eq!(artifact.name, "feed");
        assert_eq!(artifact.share_key.len(), 36);
        assert!(artifact.description.as_deref().unwrap().starts_with("MISP to STIX"));

        let found = Artifact::find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(found, artifact);
        assert_eq!(Artifact::find_by_uuid(&conn, &artifact.uuid).unwrap().unwrap().id, Some(id));

        assert!(Artifact::delete(&conn, id).unwrap());
        assert!(!Artifact::delete(&conn, id).unwrap());
        assert!(Artifact::find_by_id(&conn, id).unwrap().is_none());
    }

    #[test]
    fn test_default_name_uses_output_format() {
        let (_temp, conn) = create_test_db();
        let artifact = Artifact::create(&conn, new_artifact(None, None, false), &NamingConfig::default()).unwrap();
        assert!(artifact.name.starts_with("STIX_"));
        assert_eq!(artifact.name.len(), "STIX_".len() + 14);
    }

    #[test]
    fn test_name_collision_gets_suffix() {
        let (_temp, conn) = create_test_db();
        let config = NamingConfig::default();

        let first = Artifact::create(&conn, new_artifact(Some("report"), None, false), &config).unwrap();
        let second = Artifact::create(&conn, new_artifact(Some("report"), None, false), &config).unwrap();

        assert_eq!(first.name, "report");
        assert_ne!(second.name, "report");
        assert!(second.name.starts_with("report_"));
        assert_eq!(second.name.len(), "report_".len() + 6);
    }

    #[test]
    fn test_long_colliding_name_is_truncated() {
        let (_temp, conn) = create_test_db();
        let config = NamingConfig::default();
        let long = "a".repeat(140);

        let first = Artifact::create(&conn, new_artifact(Some(&long), None, false), &config).unwrap();
        assert_eq!(first.name.chars().count(), 100);

        let second = Artifact::create(&conn, new_artifact(Some(&long), None, false), &config).unwrap();
        assert_eq!(second.name.chars().count(), 100);
        assert_ne!(first.name, second.name);
    }

    #[test]
    fn test_rename_onto_existing_name_is_refused() {
        let (_temp, conn) = create_test_db();
        let config = NamingConfig::default();
        Artifact::create(&conn, new_artifact(Some("one"), None, false), &config).unwrap();
        let two = Artifact::create(&conn, new_artifact(Some("two"), None, false), &config).unwrap();
        let id = two.id.unwrap();

        assert!(matches!(
            Artifact::update_details(&conn, id, Some("one"), None, &config),
            Err(Error::AlreadyExists(_))
        ));

        let renamed = Artifact::update_details(&conn, id, Some("three"), Some("desc"), &config).unwrap();
        assert_eq!(renamed.name, "three");
        assert_eq!(renamed.description.as_deref(), Some("desc"));

        // Keeping the same name is not a collision
        assert!(Artifact::update_details(&conn, id, Some("three"), None, &config).is_ok());
        assert!(matches!(
            Artifact::update_details(&conn, 999, Some("x"), None, &config),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_toggle_public_and_share_key() {
        let (_temp, conn) = create_test_db();
        let config = NamingConfig::default();
        let artifact = Artifact::create(&conn, new_artifact(Some("a"), None, false), &config).unwrap();
        let id = artifact.id.unwrap();

        assert!(Artifact::toggle_public(&conn, id).unwrap());
        assert!(!Artifact::toggle_public(&conn, id).unwrap());

        let key = Artifact::regenerate_share_key(&conn, id, &config).unwrap();
        assert_ne!(key, artifact.share_key);
        assert!(Artifact::find_shared(&conn, &artifact.uuid, &key).unwrap().is_some());
        assert!(Artifact::find_shared(&conn, &artifact.uuid, &artifact.share_key).unwrap().is_none());
        assert!(matches!(Artifact::toggle_public(&conn, 999), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_listing_visibility() {
        let (_temp, conn) = create_test_db();
        let config = NamingConfig::default();
        Artifact::create(&conn, new_artifact(Some("public-by-1"), Some(1), true), &config).unwrap();
        Artifact::create(&conn, new_artifact(Some("private-by-1"), Some(1), false), &config).unwrap();
        Artifact::create(&conn, new_artifact(Some("private-by-2"), Some(2), false), &config).unwrap();

        let names = |query: ArtifactQuery| -> Vec<String> {
            Artifact::list(&conn, &query)
                .unwrap()
                .items
                .into_iter()
                .map(|a| a.name)
                .collect()
        };

        assert_eq!(names(ArtifactQuery::default()), vec!["public-by-1"]);

        let mut user2 = ArtifactQuery {
            viewer: Viewer::User(2),
            sort: SortOrder::Asc,
            ..Default::default()
        };
        assert_eq!(names(user2.clone()), vec!["public-by-1", "private-by-2"]);
        user2.only_mine = true;
        assert_eq!(names(user2), vec!["private-by-2"]);

        let admin = ArtifactQuery {
            viewer: Viewer::Admin(99),
            ..Default::default()
        };
        assert_eq!(names(admin).len(), 3);
    }

    #[test]
    fn test_listing_search_kind_and_paging() {
        let (_temp, conn) = create_test_db();
        let config = NamingConfig::default();
        for i in 0..12 {
            let mut new = new_artifact(Some(&format!("Feed {i:02}")), None, true);
            if i % 2 == 0 {
                new.kind = ConversionKind::StixToMisp;
            }
            Artifact::create(&conn, new, &config).unwrap();
        }
        Artifact::create(&conn, new_artifact(Some("100%_sure"), None, true), &config).unwrap();

        let first = Artifact::list(&conn, &ArtifactQuery::default()).unwrap();
        assert_eq!(first.total, 13);
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.pages(), 2);
        assert!(first.has_next());

        let second = Artifact::list(&conn, &ArtifactQuery { page: 2, ..Default::default() }).unwrap();
        assert_eq!(second.items.len(), 3);
        assert!(!second.has_next());

        let search = ArtifactQuery {
            search: Some("FEED 1".to_string()),
            ..Default::default()
        };
        assert_eq!(Artifact::list(&conn, &search).unwrap().total, 2);

        let literal = ArtifactQuery {
            search: Some("%_".to_string()),
            ..Default::default()
        };
        assert_eq!(Artifact::list(&conn, &literal).unwrap().total, 1);

        let stix_to_misp = ArtifactQuery {
            kind: Some(ConversionKind::StixToMisp),
            ..Default::default()
        };
        assert_eq!(Artifact::list(&conn, &stix_to_misp).unwrap().total, 6);
    }

    #[test]
    fn test_visibility_helpers() {
        let (_temp, conn) = create_test_db();
        let artifact =
            Artifact::create(&conn, new_artifact(Some("mine"), Some(5), false), &NamingConfig::default()).unwrap();
        assert!(artifact.visible_to(Viewer::User(5)));
        assert!(!artifact.visible_to(Viewer::User(6)));
        assert!(!artifact.visible_to(Viewer::Anonymous));
        assert!(artifact.visible_to(Viewer::Admin(1)));
        assert!(artifact.editable_by(Viewer::User(5)));
        assert!(!artifact.editable_by(Viewer::User(6)));
    }
}
