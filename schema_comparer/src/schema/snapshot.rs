//! Immutable point-in-time views of a schema
//!
//! A [`Snapshot`] maps object names to fully loaded objects of one
//! [`ObjectType`]. It is built once per comparison, either from a live
//! [`MetadataSource`] or from an in-memory collection of objects, and is
//! never mutated afterwards.

use futures::future::try_join_all;
use indexmap::IndexMap;
use std::sync::Arc;

use crate::db::source::MetadataSource;
use crate::error::{Error, Result};
use crate::schema::types::{DatabaseObject, ObjectType};
use crate::table::DatabaseTable;

/// Name-keyed objects of a single type, in source order
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    object_type: ObjectType,
    objects: IndexMap<String, DatabaseObject>,
}

impl Snapshot {
    /// Build a snapshot from an in-memory collection, such as editor objects.
    ///
    /// Objects of other types are ignored. A repeated name is rejected since
    /// identity within a snapshot is by name.
    pub fn from_objects<I>(object_type: ObjectType, objects: I) -> Result<Self>
    where
        I: IntoIterator<Item = DatabaseObject>,
    {
        ensure_top_level(object_type)?;

        let mut map = IndexMap::new();
        for object in objects {
            if object.object_type() != object_type {
                continue;
            }
            let name = object.name().to_string();
            if name.trim().is_empty() {
                return Err(Error::InvalidArgumentError(format!(
                    "{} without a name",
                    object_type
                )));
            }
            if map.insert(name.clone(), object).is_some() {
                return Err(Error::InvalidArgumentError(format!(
                    "duplicate {} name: {}",
                    object_type, name
                )));
            }
        }

        Ok(Self {
            object_type,
            objects: map,
        })
    }

    /// Build a snapshot by querying a live source.
    ///
    /// Tables are loaded through [`DatabaseTable`] handles, concurrently.
    pub async fn from_source(source: Arc<dyn MetadataSource>, object_type: ObjectType) -> Result<Self> {
        ensure_top_level(object_type)?;

        let objects: Vec<DatabaseObject> = match object_type {
            ObjectType::Table => {
                let names = source.table_names().await?;
                let tables: Vec<DatabaseTable> = names
                    .into_iter()
                    .map(|name| DatabaseTable::new(&name, Arc::clone(&source)))
                    .collect();
                let definitions = try_join_all(tables.iter().map(|table| table.definition())).await?;
                definitions.into_iter().map(DatabaseObject::Table).collect()
            }
            ObjectType::View => source
                .views()
                .await?
                .into_iter()
                .map(DatabaseObject::View)
                .collect(),
            ObjectType::Procedure => source
                .procedures()
                .await?
                .into_iter()
                .map(DatabaseObject::Procedure)
                .collect(),
            ObjectType::Trigger => source
                .triggers()
                .await?
                .into_iter()
                .map(DatabaseObject::Trigger)
                .collect(),
            ObjectType::Index | ObjectType::Constraint => Vec::new(),
        };

        let snapshot = Self::from_objects(object_type, objects)?;
        tracing::info!(
            object_type = %object_type,
            count = snapshot.len(),
            "Snapshot built from live source"
        );
        Ok(snapshot)
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn get(&self, name: &str) -> Option<&DatabaseObject> {
        self.objects.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    pub fn objects(&self) -> impl Iterator<Item = &DatabaseObject> {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

fn ensure_top_level(object_type: ObjectType) -> Result<()> {
    if object_type.is_top_level() {
        Ok(())
    } else {
        Err(Error::InvalidArgumentError(format!(
            "{} objects belong to a table and cannot be snapshotted on their own",
            object_type
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{TableDefinition, View};

    #[test]
    fn test_from_objects_filters_by_type() {
        let objects = vec![
            DatabaseObject::Table(TableDefinition::new("B")),
            DatabaseObject::View(View {
                name: "V".to_string(),
                columns: vec![],
                source: "SELECT 1 FROM RDB$DATABASE".to_string(),
            }),
            DatabaseObject::Table(TableDefinition::new("A")),
        ];

        let snapshot = Snapshot::from_objects(ObjectType::Table, objects).unwrap();

        assert_eq!(snapshot.names().collect::<Vec<_>>(), vec!["B", "A"]);
        assert!(!snapshot.contains("V"));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let objects = vec![
            DatabaseObject::Table(TableDefinition::new("A")),
            DatabaseObject::Table(TableDefinition::new("A")),
        ];

        let result = Snapshot::from_objects(ObjectType::Table, objects);
        assert!(matches!(result, Err(Error::InvalidArgumentError(_))));
    }

    #[test]
    fn test_index_snapshot_is_invalid() {
        let result = Snapshot::from_objects(ObjectType::Index, Vec::new());
        assert!(matches!(result, Err(Error::InvalidArgumentError(_))));
    }
}
