//! `belongs_to` assignment and `has_many` traversal.
//!
//! Both relationships are stored as pointers on the child. Assigning one is a
//! remote write, not a pending local change: the target is saved first if it
//! has no id yet, then the owner is updated with the pointer straight away.
//!
//! A `has_many` traversal captures the parent it started from in a
//! [`ParentRef`] owned by the returned [`HasMany`], so two collections from
//! different parents never share state.

use crate::error::{Error, Result};
use crate::mapper::{Mapper, TRACING_TARGET};
use crate::transport::RemoteResource;
use restmap_engine::{ClassName, FieldName, ObjectId, Pointer, Record, RelationshipDescriptor};

/// The parent a `has_many` collection was loaded for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub class_name: ClassName,
    pub object_id: ObjectId,
}

impl ParentRef {
    pub fn to_pointer(&self) -> Pointer {
        Pointer::new(self.class_name.clone(), self.object_id.clone())
    }
}

/// Children of one parent, with the foreign key that links them.
#[derive(Debug, Clone)]
pub struct HasMany {
    parent: ParentRef,
    target_class: ClassName,
    foreign_key: FieldName,
    items: Vec<Record>,
}

impl HasMany {
    pub fn parent(&self) -> &ParentRef {
        &self.parent
    }

    pub fn target_class(&self) -> &str {
        &self.target_class
    }

    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    pub fn records(&self) -> &[Record] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.items
    }

    /// Append a child: save it if new, point its foreign key at the parent
    /// (pushed to the backend immediately), then add a copy to this collection.
    ///
    /// `child` is updated in place, so after a failed link it still carries
    /// the id it was created with and the pending pointer.
    pub fn push<T: RemoteResource>(&mut self, mapper: &Mapper<T>, child: &mut Record) -> Result<()> {
        if child.class_name() != self.target_class {
            return Err(restmap_engine::Error::TypeMismatch {
                field: self.foreign_key.clone(),
                expected: self.target_class.clone(),
                got: child.class_name().to_string(),
            }
            .into());
        }

        if !child.is_persisted() {
            save_or_reject(mapper, child)?;
        }
        mapper.point_at(child, &self.foreign_key, self.parent.to_pointer())?;
        self.items.push(child.clone());
        Ok(())
    }
}

impl IntoIterator for HasMany {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a HasMany {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: RemoteResource> Mapper<T> {
    /// Assign `target` to the `belongs_to` field `field` of `owner`.
    ///
    /// An unsaved target is saved first. When the owner is persisted the
    /// pointer is sent in an update right away; otherwise it stays pending
    /// and goes out with the owner's create.
    ///
    /// The update goes through [`Mapper::update`], so any other pending writes
    /// on the owner are sent with the pointer and are not validated first.
    /// Call [`Mapper::save`] beforehand to have them checked.
    pub fn assign(&self, owner: &mut Record, field: &str, target: &mut Record) -> Result<()> {
        let target_class = match owner.schema().relationship(field)? {
            RelationshipDescriptor::BelongsTo { target_class, .. } => target_class.clone(),
            RelationshipDescriptor::HasMany { .. } => {
                return Err(restmap_engine::Error::WrongRelationshipKind {
                    class: owner.class_name().to_string(),
                    field: field.to_string(),
                    expected: "belongs_to",
                }
                .into())
            }
        };
        if target.class_name() != target_class {
            return Err(restmap_engine::Error::TypeMismatch {
                field: field.to_string(),
                expected: target_class,
                got: target.class_name().to_string(),
            }
            .into());
        }

        if !target.is_persisted() {
            tracing::debug!(
                target: TRACING_TARGET,
                class = target.class_name(),
                "Saving unsaved target before assignment"
            );
            save_or_reject(self, target)?;
        }
        let pointer = target.to_pointer()?;
        self.point_at(owner, field, pointer)
    }

    /// Load the children of a `has_many` relationship.
    pub fn children(&self, owner: &Record, field: &str) -> Result<HasMany> {
        let (target_class, foreign_key) = match owner.schema().relationship(field)? {
            RelationshipDescriptor::HasMany {
                target_class,
                foreign_key,
                ..
            } => (target_class.clone(), foreign_key.clone()),
            RelationshipDescriptor::BelongsTo { .. } => {
                return Err(restmap_engine::Error::WrongRelationshipKind {
                    class: owner.class_name().to_string(),
                    field: field.to_string(),
                    expected: "has_many",
                }
                .into())
            }
        };

        let pointer = owner.to_pointer()?;
        let parent = ParentRef {
            class_name: pointer.class_name.clone(),
            object_id: pointer.object_id.clone(),
        };
        let items = self
            .query(&target_class)
            .where_pointer(foreign_key.clone(), &pointer)
            .all()?;

        Ok(HasMany {
            parent,
            target_class,
            foreign_key,
            items,
        })
    }

    /// Store a pointer on `owner` and push it to the backend if `owner` exists there.
    pub(crate) fn point_at(&self, owner: &mut Record, field: &str, pointer: Pointer) -> Result<()> {
        owner.set(field, pointer.to_value());
        if !owner.is_persisted() {
            return Ok(());
        }
        if self.update(owner)? {
            Ok(())
        } else {
            Err(rejected(owner))
        }
    }
}

fn save_or_reject<T: RemoteResource>(mapper: &Mapper<T>, record: &mut Record) -> Result<()> {
    if mapper.save(record)? {
        Ok(())
    } else {
        Err(rejected(record))
    }
}

fn rejected(record: &Record) -> Error {
    Error::Rejected {
        class: record.class_name().to_string(),
        messages: record.errors().full_messages(),
    }
}
