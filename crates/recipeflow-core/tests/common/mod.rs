#![allow(dead_code)]

use recipeflow_core::{EntityContext, EntityType, TableSet};

/// A table entity with a full location.
pub fn table_entity(database: &str, schema: &str, table: &str) -> EntityContext {
    let mut entity = EntityContext::new(EntityType::Table);
    entity.guid = Some(format!("guid-{}", table.to_lowercase()));
    entity.name = Some(table.to_string());
    entity.database = Some(database.to_string());
    entity.schema = Some(schema.to_string());
    entity.table = Some(table.to_string());
    entity
}

pub fn tables(names: &[&str]) -> TableSet {
    names.iter().collect()
}
