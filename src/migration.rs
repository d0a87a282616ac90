//! Apply the resolved model to the database: schema, then one table per resource, parents first.

use crate::config::{ResolvedModel, ResolvedResource, ID_FIELD};
use crate::error::AppError;
use crate::routing::ResourceKind;
use crate::store::builder::{column_type, qualified_table, quoted};
use crate::store::PgStore;

/// CREATE TABLE for one resource. Parent links cascade on delete; singletons are unique per parent.
pub fn table_ddl(schema: &str, resource: &ResolvedResource, model: &ResolvedModel) -> String {
    let mut defs = vec![format!("{} BIGSERIAL PRIMARY KEY", quoted(ID_FIELD))];
    for f in &resource.fields {
        let mut def = format!("{} {}", quoted(&f.name), column_type(f.field_type));
        if !f.nullable && (f.required() || f.default.is_some() || f.read_only) {
            def.push_str(" NOT NULL");
        }
        defs.push(def);
    }
    if let Some(parent) = &resource.parent {
        if let Some(target) = model.resource(&parent.resource) {
            defs.push(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE",
                quoted(&parent.field),
                qualified_table(schema, &target.table_name),
                quoted(ID_FIELD)
            ));
        }
        if resource.kind == ResourceKind::Singleton {
            defs.push(format!("UNIQUE ({})", quoted(&parent.field)));
        }
    }
    for group in &resource.unique_together {
        let cols: Vec<String> = group.iter().map(|c| quoted(c)).collect();
        defs.push(format!("UNIQUE ({})", cols.join(", ")));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified_table(schema, &resource.table_name),
        defs.join(",\n  ")
    )
}

/// CREATE SCHEMA and CREATE TABLE for every resource. Idempotent (IF NOT EXISTS); existing tables are left as they are.
pub async fn apply_migrations(store: &PgStore, model: &ResolvedModel) -> Result<(), AppError> {
    let schema = store.schema();
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema)))
        .execute(store.pool())
        .await?;
    for resource in &model.resources {
        let sql = table_ddl(schema, resource, model);
        tracing::debug!(sql = %sql, "migration");
        sqlx::query(&sql).execute(store.pool()).await?;
    }
    tracing::info!(schema, tables = model.resources.len(), "migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_from_str, resolve};

    #[test]
    fn ddl_for_nested_resources() {
        let model = resolve(
            &load_from_str(
                r#"{"resources": [
                    {"name": "collection", "path_segment": "collections",
                     "fields": [{"name": "title", "type": "string"}], "actions": ["list"]},
                    {"name": "nested-resource", "path_segment": "nested-resources",
                     "fields": [{"name": "title", "type": "string", "nullable": true}],
                     "actions": ["retrieve"],
                     "parent": {"resource": "collection", "kind": "singleton"}},
                    {"name": "nested-collection", "path_segment": "nested-collections",
                     "fields": [{"name": "title", "type": "string"}], "actions": ["list"],
                     "parent": {"resource": "collection"},
                     "unique_together": [["parent", "title"]]}
                ]}"#,
            )
            .unwrap(),
        )
        .unwrap();

        let singleton = table_ddl("public", model.resource("nested-resource").unwrap(), &model);
        assert!(singleton.contains("\"parent\" BIGINT NOT NULL"));
        assert!(singleton.contains("\"title\" TEXT,"));
        assert!(singleton.contains("REFERENCES \"public\".\"collection\" (\"id\") ON DELETE CASCADE"));
        assert!(singleton.contains("UNIQUE (\"parent\")"));

        let nested = table_ddl("public", model.resource("nested-collection").unwrap(), &model);
        assert!(nested.contains("UNIQUE (\"parent\", \"title\")"));
        assert!(nested.starts_with("CREATE TABLE IF NOT EXISTS \"public\".\"nested_collection\""));
    }
}
