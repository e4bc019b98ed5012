//! # Restmap Client
//!
//! Persistence and relationships for [`restmap_engine`] records over a REST
//! document backend.
//!
//! A [`Mapper`] pairs a [`Registry`](restmap_engine::Registry) of class schemas
//! with a [`RemoteResource`] transport. [`HttpResource`] talks to a real backend;
//! [`MemoryBackend`] answers the same endpoints from memory.
//!
//! ```rust
//! use restmap_client::{Mapper, MemoryBackend};
//! use restmap_engine::{ClassSchema, FieldDef, FieldType, Registry};
//!
//! let registry = Registry::new()
//!     .with_class(
//!         ClassSchema::new("Post")
//!             .field(FieldDef::required("title", FieldType::String))
//!             .has_many("comments", "Comment"),
//!     )
//!     .with_class(ClassSchema::new("Comment").declare("text").belongs_to("post", "Post"));
//! let mapper = Mapper::new(MemoryBackend::new(), registry);
//!
//! let mut post = mapper.build("Post").unwrap();
//! post.set("title", "Hello");
//! assert!(mapper.save(&mut post).unwrap());
//!
//! let mut comments = mapper.children(&post, "comments").unwrap();
//! let mut comment = mapper.build("Comment").unwrap();
//! comment.set("text", "First");
//! comments.push(&mapper, &mut comment).unwrap();
//!
//! assert_eq!(mapper.children(&post, "comments").unwrap().len(), 1);
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod http;
pub mod mapper;
pub mod memory;
pub mod query;
pub mod relations;
pub mod transport;

pub use config::{Config, ConfigError, Credentials};
pub use error::{Error, Result};
pub use http::HttpResource;
pub use mapper::{parse_timestamp, FieldValue, Mapper};
pub use memory::MemoryBackend;
pub use query::QueryBuilder;
pub use relations::{HasMany, ParentRef};
pub use transport::{Method, RemoteResource, Request, Response, TransportError};
