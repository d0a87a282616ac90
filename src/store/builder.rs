//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE for a resolved resource.
//! Identifiers come from declarations only; values are always parameters.

use crate::config::{FieldType, ResolvedResource, ID_FIELD};
use crate::store::query::{Condition, OrderTerm, Query, Record};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from config).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

/// Column type used in DDL and placeholder casts.
pub fn column_type(ty: FieldType) -> &'static str {
    match ty {
        FieldType::String => "TEXT",
        FieldType::Integer | FieldType::Reference => "BIGINT",
        FieldType::Boolean => "BOOLEAN",
    }
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value and return its placeholder cast to the column type.
    fn placeholder(&mut self, resource: &ResolvedResource, column: &str, v: Value) -> String {
        self.params.push(v);
        match cast_for(resource, column) {
            Some(ty) => format!("${}::{}", self.params.len(), ty),
            None => format!("${}", self.params.len()),
        }
    }
}

fn cast_for(resource: &ResolvedResource, column: &str) -> Option<&'static str> {
    if column == ID_FIELD {
        return Some("BIGINT");
    }
    resource.field(column).map(|f| column_type(f.field_type))
}

/// Whether `v` can be bound to the column's cast. Values that cannot never match.
fn fits(resource: &ResolvedResource, column: &str, v: &Value) -> bool {
    match cast_for(resource, column) {
        Some("BIGINT") => v.is_i64(),
        Some("BOOLEAN") => v.is_boolean(),
        _ => true,
    }
}

fn is_column(resource: &ResolvedResource, column: &str) -> bool {
    column == ID_FIELD || resource.field(column).is_some()
}

fn column_list(resource: &ResolvedResource) -> String {
    resource
        .column_names()
        .iter()
        .map(|c| quoted(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `%`, `_` and `\` are literal inside ILIKE patterns.
fn like_pattern(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn where_clause(q: &mut QueryBuf, resource: &ResolvedResource, query: &Query) -> String {
    let mut parts = Vec::new();
    for condition in &query.conditions {
        if !is_column(resource, condition.field()) {
            continue;
        }
        let col = quoted(condition.field());
        match condition {
            Condition::Eq { value, .. } if value.is_null() => parts.push(format!("{} IS NULL", col)),
            Condition::Eq { field, value } if !fits(resource, field, value) => parts.push("FALSE".into()),
            Condition::Eq { field, value } => {
                let ph = q.placeholder(resource, field, value.clone());
                parts.push(format!("{} = {}", col, ph));
            }
            Condition::In { field, values } => {
                let phs: Vec<String> = values
                    .iter()
                    .filter(|v| fits(resource, field, v))
                    .map(|v| q.placeholder(resource, field, v.clone()))
                    .collect();
                if phs.is_empty() {
                    parts.push("FALSE".into());
                } else {
                    parts.push(format!("{} IN ({})", col, phs.join(", ")));
                }
            }
            Condition::IContains { value, .. } => {
                q.params.push(Value::String(like_pattern(value)));
                parts.push(format!("{}::text ILIKE ${}", col, q.params.len()));
            }
        }
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn order_clause(resource: &ResolvedResource, ordering: &[OrderTerm]) -> String {
    let mut terms: Vec<String> = ordering
        .iter()
        .filter(|t| is_column(resource, &t.field))
        .map(|t| format!("{}{}", quoted(&t.field), if t.descending { " DESC" } else { "" }))
        .collect();
    if !ordering.iter().any(|t| t.field == ID_FIELD) {
        terms.push(quoted(ID_FIELD));
    }
    format!(" ORDER BY {}", terms.join(", "))
}

/// SELECT with filters, ordering (id as tiebreak), optional LIMIT/OFFSET.
pub fn select(schema: &str, resource: &ResolvedResource, query: &Query) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, &resource.table_name);
    let where_sql = where_clause(&mut q, resource, query);
    let limit = query.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset = if query.offset > 0 {
        format!(" OFFSET {}", query.offset)
    } else {
        String::new()
    };
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        column_list(resource),
        table,
        where_sql,
        order_clause(resource, &query.ordering),
        limit,
        offset
    );
    q
}

pub fn count(schema: &str, resource: &ResolvedResource, query: &Query) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, &resource.table_name);
    let where_sql = where_clause(&mut q, resource, query);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", table, where_sql);
    q
}

/// INSERT of the declared columns present in `values`; `id` is assigned by the database.
pub fn insert(schema: &str, resource: &ResolvedResource, values: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, &resource.table_name);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for f in &resource.fields {
        let Some(v) = values.get(&f.name) else { continue };
        placeholders.push(q.placeholder(resource, &f.name, v.clone()));
        cols.push(quoted(&f.name));
    }
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, column_list(resource))
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            column_list(resource)
        )
    };
    q
}

/// UPDATE by id: SET only declared columns present in `values`.
pub fn update(schema: &str, resource: &ResolvedResource, id: i64, values: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, &resource.table_name);
    let mut sets = Vec::new();
    for f in &resource.fields {
        let Some(v) = values.get(&f.name) else { continue };
        let ph = q.placeholder(resource, &f.name, v.clone());
        sets.push(format!("{} = {}", quoted(&f.name), ph));
    }
    let id_ph = q.placeholder(resource, ID_FIELD, Value::from(id));
    q.sql = if sets.is_empty() {
        format!(
            "SELECT {} FROM {} WHERE {} = {}",
            column_list(resource),
            table,
            quoted(ID_FIELD),
            id_ph
        )
    } else {
        format!(
            "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
            table,
            sets.join(", "),
            quoted(ID_FIELD),
            id_ph,
            column_list(resource)
        )
    };
    q
}

/// DELETE by id. Dependent rows go with it through ON DELETE CASCADE.
pub fn delete(schema: &str, resource: &ResolvedResource, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, &resource.table_name);
    let id_ph = q.placeholder(resource, ID_FIELD, Value::from(id));
    q.sql = format!("DELETE FROM {} WHERE {} = {}", table, quoted(ID_FIELD), id_ph);
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_from_str, resolve};
    use serde_json::json;

    fn resource() -> ResolvedResource {
        let config = load_from_str(
            r#"{"resources": [
                {"name": "collection", "path_segment": "collections",
                 "fields": [{"name": "title", "type": "string"}],
                 "actions": ["list"]},
                {"name": "nested-collection", "path_segment": "nested-collections",
                 "fields": [{"name": "title", "type": "string"}, {"name": "done", "type": "boolean"}],
                 "actions": ["list"],
                 "parent": {"resource": "collection"}}
            ]}"#,
        )
        .unwrap();
        resolve(&config).unwrap().resource("nested-collection").unwrap().clone()
    }

    #[test]
    fn select_with_conditions_and_ordering() {
        let r = resource();
        let query = Query::new()
            .filter(Condition::eq("parent", json!(3)))
            .filter(Condition::In {
                field: "id".into(),
                values: vec![json!(1), json!(2)],
            })
            .filter(Condition::IContains {
                field: "title".into(),
                value: "50%".into(),
            });
        let query = Query {
            ordering: vec![OrderTerm::desc("title")],
            limit: Some(10),
            offset: 20,
            ..query
        };
        let q = select("public", &r, &query);
        assert_eq!(
            q.sql,
            "SELECT \"id\", \"parent\", \"title\", \"done\" FROM \"public\".\"nested_collection\" \
             WHERE \"parent\" = $1::BIGINT AND \"id\" IN ($2::BIGINT, $3::BIGINT) AND \"title\"::text ILIKE $4 \
             ORDER BY \"title\" DESC, \"id\" LIMIT 10 OFFSET 20"
        );
        assert_eq!(q.params[3], json!("%50\\%%"));
    }

    #[test]
    fn empty_in_matches_nothing() {
        let r = resource();
        let query = Query::new().filter(Condition::In {
            field: "id".into(),
            values: vec![],
        });
        let q = count("public", &r, &query);
        assert_eq!(q.sql, "SELECT COUNT(*) FROM \"public\".\"nested_collection\" WHERE FALSE");
    }

    #[test]
    fn uncastable_values_match_nothing() {
        let r = resource();
        let query = Query::new()
            .filter(Condition::eq("id", json!("abc")))
            .filter(Condition::In {
                field: "done".into(),
                values: vec![json!("maybe"), json!(true)],
            });
        let q = count("public", &r, &query);
        assert_eq!(
            q.sql,
            "SELECT COUNT(*) FROM \"public\".\"nested_collection\" WHERE FALSE AND \"done\" IN ($1::BOOLEAN)"
        );
        assert_eq!(q.params, vec![json!(true)]);
    }

    #[test]
    fn update_sets_only_declared_columns() {
        let r = resource();
        let values = json!({"title": "x", "bogus": 1}).as_object().cloned().unwrap();
        let q = update("public", &r, 9, &values);
        assert_eq!(
            q.sql,
            "UPDATE \"public\".\"nested_collection\" SET \"title\" = $1::TEXT WHERE \"id\" = $2::BIGINT \
             RETURNING \"id\", \"parent\", \"title\", \"done\""
        );
        assert_eq!(q.params, vec![json!("x"), json!(9)]);
    }
}
