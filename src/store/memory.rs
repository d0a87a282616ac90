//! In-process store. Tables are created on first write.

use crate::config::{Dependent, ResolvedResource, ID_FIELD};
use crate::error::AppError;
use crate::store::query::{compare_values, Query, Record};
use crate::store::Store;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<i64, Record>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Table>>, AppError> {
        self.tables
            .read()
            .map_err(|_| AppError::Internal("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Table>>, AppError> {
        self.tables
            .write()
            .map_err(|_| AppError::Internal("memory store lock poisoned".into()))
    }

    fn matching<'a>(tables: &'a HashMap<String, Table>, table: &str, query: &Query) -> Vec<&'a Record> {
        tables
            .get(table)
            .map(|t| t.rows.values().filter(|r| query.matches(r)).collect())
            .unwrap_or_default()
    }
}

/// Keep declared fields only.
fn declared(resource: &ResolvedResource, values: Record) -> impl Iterator<Item = (String, Value)> + '_ {
    values
        .into_iter()
        .filter(move |(k, _)| resource.field(k).is_some())
}

fn cascade(tables: &mut HashMap<String, Table>, dependents: &[Dependent], ids: &[i64]) {
    for dep in dependents {
        let Some(table) = tables.get_mut(&dep.table) else { continue };
        let doomed: Vec<i64> = table
            .rows
            .iter()
            .filter(|(_, row)| {
                row.get(&dep.field)
                    .and_then(Value::as_i64)
                    .map(|parent| ids.contains(&parent))
                    .unwrap_or(false)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in &doomed {
            table.rows.remove(id);
        }
        if !doomed.is_empty() {
            cascade(tables, &dep.dependents, &doomed);
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn count(&self, resource: &ResolvedResource, query: &Query) -> Result<u64, AppError> {
        let tables = self.read()?;
        Ok(Self::matching(&tables, &resource.table_name, query).len() as u64)
    }

    async fn select(&self, resource: &ResolvedResource, query: &Query) -> Result<Vec<Record>, AppError> {
        let tables = self.read()?;
        let mut rows = Self::matching(&tables, &resource.table_name, query);
        // Stable sort over id order, so id breaks ties.
        rows.sort_by(|a, b| {
            query
                .ordering
                .iter()
                .map(|term| {
                    let (x, y) = (
                        a.get(&term.field).unwrap_or(&Value::Null),
                        b.get(&term.field).unwrap_or(&Value::Null),
                    );
                    let ord = compare_values(x, y);
                    if term.descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                })
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).cloned().collect())
    }

    async fn insert(&self, resource: &ResolvedResource, values: Record) -> Result<Record, AppError> {
        let mut tables = self.write()?;
        let table = tables.entry(resource.table_name.clone()).or_default();
        table.last_id += 1;
        let id = table.last_id;
        let mut row = Record::new();
        row.insert(ID_FIELD.into(), Value::from(id));
        for f in &resource.fields {
            row.insert(f.name.clone(), Value::Null);
        }
        row.extend(declared(resource, values));
        table.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn update(&self, resource: &ResolvedResource, id: i64, values: Record) -> Result<Option<Record>, AppError> {
        let mut tables = self.write()?;
        let Some(row) = tables
            .get_mut(&resource.table_name)
            .and_then(|t| t.rows.get_mut(&id))
        else {
            return Ok(None);
        };
        row.extend(declared(resource, values));
        Ok(Some(row.clone()))
    }

    async fn delete(&self, resource: &ResolvedResource, id: i64) -> Result<bool, AppError> {
        let mut tables = self.write()?;
        let removed = tables
            .get_mut(&resource.table_name)
            .and_then(|t| t.rows.remove(&id))
            .is_some();
        if removed {
            cascade(&mut tables, &resource.dependents, &[id]);
        }
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.read().map(|_| ())
    }
}
