//! Generic CRUD execution over the store. Every write passes the validate-only guard first.

use crate::config::{ResolvedModel, ResolvedResource, ID_FIELD};
use crate::error::AppError;
use crate::pipeline::{ValidateOnlyState, WILDCARD};
use crate::store::{Condition, Query, Record, Store};
use serde_json::Value;
use std::collections::BTreeMap;

const PARENT_PK_PLACEHOLDER: &str = "{parent_pk}";

pub struct CrudService<'a> {
    store: &'a dyn Store,
    model: &'a ResolvedModel,
}

impl<'a> CrudService<'a> {
    pub fn new(store: &'a dyn Store, model: &'a ResolvedModel) -> Self {
        CrudService { store, model }
    }

    pub async fn count(&self, resource: &ResolvedResource, query: &Query) -> Result<u64, AppError> {
        self.store.count(resource, query).await
    }

    pub async fn list(&self, resource: &ResolvedResource, query: &Query) -> Result<Vec<Record>, AppError> {
        self.store.select(resource, query).await
    }

    /// The single row matching `query`, or not found.
    pub async fn fetch(&self, resource: &ResolvedResource, query: &Query) -> Result<Record, AppError> {
        self.store
            .select_one(resource, query)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} not found", resource.name)))
    }

    /// Insert one row, then the singleton children declared under its resource.
    pub async fn create(
        &self,
        guard: &ValidateOnlyState,
        resource: &ResolvedResource,
        values: Record,
    ) -> Result<Record, AppError> {
        guard.ensure_writable("create")?;
        let row = self.store.insert(resource, values).await?;
        tracing::debug!(resource = %resource.name, id = ?row.get(ID_FIELD), "created");
        if let Some(id) = row.get(ID_FIELD).and_then(Value::as_i64) {
            self.create_singletons(guard, resource, id).await?;
        }
        Ok(row)
    }

    async fn create_singletons(
        &self,
        guard: &ValidateOnlyState,
        parent: &ResolvedResource,
        parent_id: i64,
    ) -> Result<(), AppError> {
        for (name, initial) in &parent.singletons {
            let child = self
                .model
                .resource(name)
                .ok_or_else(|| AppError::Internal(format!("unknown singleton {}", name)))?;
            let link = child
                .parent
                .as_ref()
                .ok_or_else(|| AppError::Internal(format!("singleton {} has no parent link", name)))?;
            let mut values: Record = initial
                .iter()
                .map(|(k, v)| (k.clone(), substitute_parent_pk(v, parent_id)))
                .collect();
            for field in &child.fields {
                if let (false, Some(default)) = (values.contains_key(&field.name), &field.default) {
                    values.insert(field.name.clone(), default.clone());
                }
            }
            values.insert(link.field.clone(), Value::from(parent_id));
            guard.ensure_writable("create")?;
            let row = self.store.insert(child, values).await?;
            tracing::debug!(resource = %child.name, id = ?row.get(ID_FIELD), parent_id, "created singleton");
        }
        Ok(())
    }

    pub async fn update(
        &self,
        guard: &ValidateOnlyState,
        resource: &ResolvedResource,
        id: i64,
        values: Record,
    ) -> Result<Record, AppError> {
        guard.ensure_writable("update")?;
        let row = self
            .store
            .update(resource, id, values)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} not found", resource.name)))?;
        tracing::debug!(resource = %resource.name, id, "updated");
        Ok(row)
    }

    /// Delete one row; children follow through the resource's dependents.
    pub async fn destroy(&self, guard: &ValidateOnlyState, resource: &ResolvedResource, id: i64) -> Result<(), AppError> {
        guard.ensure_writable("delete")?;
        if !self.store.delete(resource, id).await? {
            return Err(AppError::NotFound(format!("{} not found", resource.name)));
        }
        tracing::debug!(resource = %resource.name, id, "deleted");
        Ok(())
    }

    /// Check every concrete ancestor named in the path, root first: each must exist
    /// under the ancestors above it, or the request is not found. When the direct
    /// parent is the wildcard but a higher ancestor is concrete, returns the
    /// condition limiting `resource` rows to parents inside that ancestor.
    pub async fn check_ancestors(
        &self,
        resource: &ResolvedResource,
        path_values: &BTreeMap<String, String>,
    ) -> Result<Option<Condition>, AppError> {
        let mut chain = Vec::new();
        let mut current = resource;
        while let Some(link) = &current.parent {
            let parent = self
                .model
                .resource(&link.resource)
                .ok_or_else(|| AppError::Internal(format!("unknown parent {}", link.resource)))?;
            chain.push((link, parent));
            current = parent;
        }

        // Condition on the rows of the ancestor being checked, from the levels above it.
        let mut scope: Option<Condition> = None;
        for (link, parent) in chain.into_iter().rev() {
            let raw = path_values.get(&link.variable).ok_or_else(AppError::route_not_found)?;
            scope = if raw == WILDCARD {
                match scope {
                    None => None,
                    Some(above) => {
                        let rows = self.store.select(parent, &Query::new().filter(above)).await?;
                        let values = rows.iter().filter_map(|r| r.get(ID_FIELD).cloned()).collect();
                        Some(Condition::In {
                            field: link.field.clone(),
                            values,
                        })
                    }
                }
            } else {
                let id = parent.coerce(ID_FIELD, raw);
                let mut query = Query::new().filter(Condition::eq(ID_FIELD, id.clone()));
                if let Some(above) = scope {
                    query = query.filter(above);
                }
                if self.store.count(parent, &query).await? == 0 {
                    return Err(AppError::NotFound(format!("{} not found", parent.name)));
                }
                Some(Condition::eq(link.field.clone(), id))
            };
        }
        // A concrete direct parent is already an equality filter of the path-variable stage.
        Ok(scope.filter(|c| matches!(c, Condition::In { .. })))
    }
}

fn substitute_parent_pk(v: &Value, parent_id: i64) -> Value {
    match v {
        Value::String(s) if s.contains(PARENT_PK_PLACEHOLDER) => {
            Value::String(s.replace(PARENT_PK_PLACEHOLDER, &parent_id.to_string()))
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_from_str, resolve};
    use crate::pipeline::ValidateOnlyContext;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn model() -> ResolvedModel {
        resolve(
            &load_from_str(
                r#"{"resources": [
                    {"name": "collection", "path_segment": "collections",
                     "fields": [{"name": "title", "type": "string"}],
                     "actions": ["list", "create", "destroy"]},
                    {"name": "nested-resource", "path_segment": "nested-resources",
                     "fields": [{"name": "title", "type": "string"}],
                     "actions": ["retrieve"],
                     "parent": {"resource": "collection", "kind": "singleton",
                                "initial": {"title": "settings of {parent_pk}"}}}
                ]}"#,
            )
            .unwrap(),
        )
        .unwrap()
    }

    fn rec(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn create_builds_singletons() {
        let model = model();
        let store = MemoryStore::new();
        let crud = CrudService::new(&store, &model);
        let guard = ValidateOnlyState::new(ValidateOnlyContext::default());
        let c = model.resource("collection").unwrap();
        let s = model.resource("nested-resource").unwrap();
        crud.create(&guard, c, rec(json!({"title": "a"}))).await.unwrap();

        let child = crud
            .fetch(s, &Query::new().filter(Condition::eq("parent", json!(1))))
            .await
            .unwrap();
        assert_eq!(child["title"], json!("settings of 1"));

        crud.destroy(&guard, c, 1).await.unwrap();
        assert!(matches!(
            crud.fetch(s, &Query::new().filter(Condition::eq("parent", json!(1)))).await,
            Err(AppError::NotFound(_))
        ));
    }

    fn three_levels() -> ResolvedModel {
        resolve(
            &load_from_str(
                r#"{"resources": [
                    {"name": "collection", "path_segment": "collections", "actions": ["list"]},
                    {"name": "item", "path_segment": "items", "actions": ["list"],
                     "parent": {"resource": "collection"}},
                    {"name": "note", "path_segment": "notes", "actions": ["list"],
                     "parent": {"resource": "item", "field": "item", "wildcard_actions": ["list"]}}
                ]}"#,
            )
            .unwrap(),
        )
        .unwrap()
    }

    fn path(collection: &str, item: &str) -> BTreeMap<String, String> {
        [("collection_pk", collection), ("item_pk", item)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn ancestors_checked_from_the_root() {
        let model = three_levels();
        let store = MemoryStore::new();
        let crud = CrudService::new(&store, &model);
        let guard = ValidateOnlyState::new(ValidateOnlyContext::default());
        let (c, i, n) = (
            model.resource("collection").unwrap(),
            model.resource("item").unwrap(),
            model.resource("note").unwrap(),
        );
        crud.create(&guard, c, Record::new()).await.unwrap();
        crud.create(&guard, c, Record::new()).await.unwrap();
        crud.create(&guard, i, rec(json!({"parent": 1}))).await.unwrap();
        crud.create(&guard, i, rec(json!({"parent": 2}))).await.unwrap();

        assert_eq!(crud.check_ancestors(n, &path("1", "1")).await.unwrap(), None);
        assert_eq!(crud.check_ancestors(n, &path("-", "-")).await.unwrap(), None);
        assert!(matches!(crud.check_ancestors(n, &path("2", "1")).await, Err(AppError::NotFound(_))));
        assert!(matches!(crud.check_ancestors(n, &path("9", "1")).await, Err(AppError::NotFound(_))));
        assert!(matches!(crud.check_ancestors(n, &path("-", "9")).await, Err(AppError::NotFound(_))));
        assert_eq!(
            crud.check_ancestors(n, &path("2", "-")).await.unwrap(),
            Some(Condition::In {
                field: "item".into(),
                values: vec![json!(2)],
            })
        );
    }

    #[tokio::test]
    async fn blocked_guard_stops_every_write() {
        let model = model();
        let store = MemoryStore::new();
        let crud = CrudService::new(&store, &model);
        let c = model.resource("collection").unwrap();
        let interceptor = crate::pipeline::ValidateOnlyInterceptor::default();
        let mut guard = ValidateOnlyState::new(ValidateOnlyContext { validate_only: true });
        let outcome = interceptor.intercept(&mut guard, Ok(())).unwrap();
        assert!(matches!(outcome, crate::pipeline::Outcome::NoContent));

        let err = crud.create(&guard, c, rec(json!({"title": "a"}))).await.unwrap_err();
        assert!(matches!(err, AppError::BlockedSideEffect("create")));
        assert!(matches!(crud.destroy(&guard, c, 1).await, Err(AppError::BlockedSideEffect("delete"))));
        assert_eq!(crud.count(c, &Query::new()).await.unwrap(), 0);
    }
}
