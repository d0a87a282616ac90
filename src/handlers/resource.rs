//! Standard operations. Custom actions land here through their delegate.

use crate::config::ID_FIELD;
use crate::error::AppError;
use crate::handlers::RequestContext;
use crate::pipeline::{paginate, Outcome, ValidateOnlyState};
use crate::response::{no_content, success_one, success_page};
use crate::routing::StandardAction;
use crate::service::{CrudService, RequestValidator, WriteMode, WriteRequest};
use crate::store::{Record, Store};
use axum::{http::StatusCode, response::Response};
use serde_json::Value;

/// Client-supplied keys never written through the body.
const STRIPPED: &[&str] = &[ID_FIELD];

pub async fn handle(ctx: RequestContext<'_>, body: Record) -> Result<Response, AppError> {
    match ctx.action.operation() {
        StandardAction::List => list(&ctx).await,
        StandardAction::Retrieve => retrieve(&ctx).await,
        StandardAction::Create => create(&ctx, body).await,
        StandardAction::Replace => update(&ctx, WriteMode::Full, body).await,
        StandardAction::Modify => update(&ctx, WriteMode::Partial, body).await,
        StandardAction::Destroy => destroy(&ctx).await,
    }
}

fn store<'a>(ctx: &'a RequestContext<'_>) -> &'a dyn Store {
    ctx.state.store.as_ref()
}

async fn list(ctx: &RequestContext<'_>) -> Result<Response, AppError> {
    let crud = CrudService::new(store(ctx), &ctx.state.model);
    let mut query = ctx.scoped_query().await?;
    let count = crud.count(ctx.resource, &query).await?;
    let window = paginate(ctx.params, &ctx.resource.pagination, count)?;
    query.limit = Some(window.limit);
    query.offset = window.offset;
    let rows = crud.list(ctx.resource, &query).await?;
    Ok(success_page(rows, window.meta))
}

async fn retrieve(ctx: &RequestContext<'_>) -> Result<Response, AppError> {
    let crud = CrudService::new(store(ctx), &ctx.state.model);
    let row = crud.fetch(ctx.resource, &ctx.object_query().await?).await?;
    Ok(success_one(StatusCode::OK, row))
}

async fn create(ctx: &RequestContext<'_>, body: Record) -> Result<Response, AppError> {
    let model = &ctx.state.model;
    let crud = CrudService::new(store(ctx), model);
    crud.check_ancestors(ctx.resource, ctx.path_values).await?;
    let bound: Record = ctx.parent_binding()?.into_iter().collect();
    let validated = RequestValidator::new(store(ctx), model)
        .validate(
            WriteRequest {
                resource: ctx.resource,
                mode: WriteMode::Full,
                writable: ctx.writable_fields(),
                strip: STRIPPED,
                instance: None,
                bound,
            },
            body,
        )
        .await;

    let mut guard = ValidateOnlyState::new(ctx.validate_only);
    match ctx.state.interceptor.intercept(&mut guard, validated)? {
        Outcome::NoContent => Ok(no_content()),
        Outcome::Proceed(values) => {
            let row = crud.create(&guard, ctx.resource, values).await?;
            Ok(success_one(StatusCode::CREATED, row))
        }
    }
}

async fn update(ctx: &RequestContext<'_>, mode: WriteMode, body: Record) -> Result<Response, AppError> {
    let model = &ctx.state.model;
    let crud = CrudService::new(store(ctx), model);
    let instance = crud.fetch(ctx.resource, &ctx.object_query().await?).await?;
    let id = row_id(&instance)?;
    let validated = RequestValidator::new(store(ctx), model)
        .validate(
            WriteRequest {
                resource: ctx.resource,
                mode,
                writable: ctx.writable_fields(),
                strip: STRIPPED,
                instance: Some(&instance),
                bound: Record::new(),
            },
            body,
        )
        .await;

    let mut guard = ValidateOnlyState::new(ctx.validate_only);
    match ctx.state.interceptor.intercept(&mut guard, validated)? {
        Outcome::NoContent => Ok(no_content()),
        Outcome::Proceed(values) => {
            let row = crud.update(&guard, ctx.resource, id, values).await?;
            Ok(success_one(StatusCode::OK, row))
        }
    }
}

async fn destroy(ctx: &RequestContext<'_>) -> Result<Response, AppError> {
    let crud = CrudService::new(store(ctx), &ctx.state.model);
    let instance = crud.fetch(ctx.resource, &ctx.object_query().await?).await?;
    let guard = ValidateOnlyState::new(ctx.validate_only);
    crud.destroy(&guard, ctx.resource, row_id(&instance)?).await?;
    Ok(no_content())
}

fn row_id(row: &Record) -> Result<i64, AppError> {
    row.get(ID_FIELD)
        .and_then(Value::as_i64)
        .ok_or_else(|| AppError::Internal("row without integer id".into()))
}
