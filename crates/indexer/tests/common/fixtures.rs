//! Model fixtures for indexer testing.
//!
//! A small blog domain: posts embed their author, nest their comments and
//! carry a flat tag list. Categories embed their parent category (a
//! self-referencing type), audit entries are persistent but not searchable,
//! and tickets may lack a primary key (useful for provoking write failures).

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use helios_indexer::model::{
    AnalysisSettings, EmbedDeclaration, FieldDescriptor, FieldMapping, HostType, IndexHint, Model,
    ModelDescriptor, Searchable, StoreHint,
};

/// Author of a post, embedded flat under `author.`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
    /// Never indexed.
    pub secret: String,
}

impl Model for Author {
    fn descriptor() -> ModelDescriptor {
        ModelDescriptor::of::<Self>()
            .named("blog.Author")
            .key("email")
            .field(FieldDescriptor::new("name", HostType::String))
            .field(FieldDescriptor::new("email", HostType::String))
            .field(FieldDescriptor::new("secret", HostType::String).ignore())
    }
}

/// Comment on a post, nested as a sub-document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub author: String,
    pub body: String,
}

impl Model for Comment {
    fn descriptor() -> ModelDescriptor {
        ModelDescriptor::of::<Self>()
            .named("blog.Comment")
            .searchable(Searchable::new())
            .field(FieldDescriptor::new("id", HostType::I64))
            .field(FieldDescriptor::new("author", HostType::String))
            .field(FieldDescriptor::new("body", HostType::String))
    }
}

/// Blog post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub views: i32,
    pub rating: f64,
    pub published: bool,
    pub created: DateTime<Utc>,
    pub tags: Vec<String>,
    pub author: Option<Author>,
    pub comments: Vec<Comment>,
    /// Render cache, never indexed.
    pub cache: Option<String>,
}

impl Model for Post {
    fn descriptor() -> ModelDescriptor {
        ModelDescriptor::of::<Self>()
            .named("blog.Post")
            .searchable(
                Searchable::new().analysis(
                    AnalysisSettings::default()
                        .analyzer("folding", "standard", ["lowercase", "asciifolding"]),
                ),
            )
            .field(FieldDescriptor::new("id", HostType::I64))
            .field(
                FieldDescriptor::new("title", HostType::String).multi_field([
                    FieldMapping::new().index(IndexHint::Analyzed),
                    FieldMapping::new().index(IndexHint::NotAnalyzed),
                ]),
            )
            .field(FieldDescriptor::new("body", HostType::String))
            .field(FieldDescriptor::new("views", HostType::I32))
            .field(FieldDescriptor::new("rating", HostType::F64))
            .field(FieldDescriptor::new("published", HostType::Bool))
            .field(
                FieldDescriptor::new("created", HostType::Date)
                    .mapping(FieldMapping::new().store(StoreHint::Yes)),
            )
            .field(FieldDescriptor::new("tags", HostType::list(HostType::String)))
            .field(FieldDescriptor::new("author", HostType::object::<Author>()).embed(EmbedDeclaration::embedded()))
            .field(
                FieldDescriptor::new("comments", HostType::list(HostType::object::<Comment>()))
                    .embed(EmbedDeclaration::nested()),
            )
            .field(FieldDescriptor::new("cache", HostType::String).ignore())
    }
}

/// Category tree; every category embeds its parent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub parent: Option<Box<Category>>,
}

impl Model for Category {
    fn descriptor() -> ModelDescriptor {
        ModelDescriptor::of::<Self>()
            .named("catalog.Category")
            .searchable(Searchable::new())
            .field(FieldDescriptor::new("id", HostType::I64))
            .field(FieldDescriptor::new("name", HostType::String))
            .field(FieldDescriptor::new("parent", HostType::object::<Category>()).embed(EmbedDeclaration::object()))
    }
}

/// Short-lived login session with a default time-to-live.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: String,
}

impl Model for Session {
    fn descriptor() -> ModelDescriptor {
        ModelDescriptor::of::<Self>()
            .named("auth.Session")
            .key("token")
            .searchable(Searchable::new().index_name("sessions").type_name("session").ttl("30m"))
            .field(FieldDescriptor::new("token", HostType::String))
            .field(FieldDescriptor::new("user", HostType::String))
    }
}

/// Support ticket whose key may be unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Option<String>,
    pub subject: String,
}

impl Model for Ticket {
    fn descriptor() -> ModelDescriptor {
        ModelDescriptor::of::<Self>()
            .named("support.Ticket")
            .searchable(Searchable::new())
            .field(FieldDescriptor::new("id", HostType::String))
            .field(FieldDescriptor::new("subject", HostType::String))
    }
}

/// Persistent but not searchable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub action: String,
}

impl Model for AuditEntry {
    fn descriptor() -> ModelDescriptor {
        ModelDescriptor::of::<Self>()
            .named("audit.AuditEntry")
            .field(FieldDescriptor::new("id", HostType::I64))
            .field(FieldDescriptor::new("action", HostType::String))
    }
}

/// Profile embedding its owner as a structured object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub handle: String,
    pub owner: Author,
}

impl Model for Profile {
    fn descriptor() -> ModelDescriptor {
        ModelDescriptor::of::<Self>()
            .named("people.Profile")
            .searchable(Searchable::new())
            .field(FieldDescriptor::new("id", HostType::I64))
            .field(FieldDescriptor::new("handle", HostType::String))
            .field(FieldDescriptor::new("owner", HostType::object::<Author>()).embed(EmbedDeclaration::object()))
    }
}

/// Team nesting its members, whose ignored fields never reach the index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub members: Vec<Author>,
}

impl Model for Team {
    fn descriptor() -> ModelDescriptor {
        ModelDescriptor::of::<Self>()
            .named("people.Team")
            .searchable(Searchable::new())
            .field(FieldDescriptor::new("id", HostType::I64))
            .field(FieldDescriptor::new("name", HostType::String))
            .field(
                FieldDescriptor::new("members", HostType::list(HostType::object::<Author>()))
                    .embed(EmbedDeclaration::nested()),
            )
    }
}

// ============================================================================
// Builders
// ============================================================================

/// A fixed creation timestamp.
pub fn created_at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 10, 30, 0)
        .single()
        .unwrap_or_default()
}

/// A published post with an author and no comments.
pub fn post(id: i64, title: &str) -> Post {
    Post {
        id,
        title: title.to_string(),
        body: format!("Body of {}", title),
        views: (id as i32) * 10,
        rating: 4.5,
        published: true,
        created: created_at(1),
        tags: vec!["rust".to_string()],
        author: Some(Author {
            name: "Ann".to_string(),
            email: "ann@example.org".to_string(),
            secret: String::new(),
        }),
        comments: Vec::new(),
        cache: None,
    }
}

/// A post with every field populated, including nested comments.
pub fn full_post() -> Post {
    Post {
        id: 42,
        title: "Ownership explained".to_string(),
        body: "Borrowing without tears".to_string(),
        views: 1234,
        rating: 4.75,
        published: true,
        created: created_at(15),
        tags: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        author: Some(Author {
            name: "Bob".to_string(),
            email: "bob@example.org".to_string(),
            secret: String::new(),
        }),
        comments: vec![
            Comment {
                id: 1,
                author: "Cleo".to_string(),
                body: "Great read".to_string(),
            },
            Comment {
                id: 2,
                author: "Dan".to_string(),
                body: "Thanks".to_string(),
            },
        ],
        cache: None,
    }
}

/// A chain of `depth` categories, the leaf first.
pub fn category_chain(depth: usize) -> Category {
    let mut current: Option<Box<Category>> = None;
    for level in (0..depth).rev() {
        current = Some(Box::new(Category {
            id: level as i64 + 1,
            name: format!("level-{}", level),
            parent: current,
        }));
    }
    current.map(|c| *c).unwrap_or_default()
}

/// A profile owned by `name`.
pub fn profile(id: i64, name: &str) -> Profile {
    Profile {
        id,
        handle: format!("@{}", name.to_lowercase()),
        owner: Author {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            secret: "hunter2".to_string(),
        },
    }
}
