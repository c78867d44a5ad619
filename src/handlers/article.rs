//! Article CRUD handlers used by the sample site.
//!
//! Every success reply is `{status: 200, statusText: "success", article}`.
//! Create and update reject a payload where both `name` and `price` are falsy
//! with the 400 `Bad request` envelope.

use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::handlers::{handler_fn, is_truthy, HandlerContext, HandlerError, HandlerRegistry};
use crate::http::request::RequestView;
use crate::http::response::Reply;
use crate::store::Filter;

const DEFAULT_TABLE: &str = "article";
const FIELDS: [&str; 2] = ["name", "price"];

/// Register the article handlers under `article.*`.
pub fn register(registry: &mut HandlerRegistry) {
    registry
        .register("article.list", handler_fn(list))
        .register("article.create", handler_fn(create))
        .register("article.update", handler_fn(update))
        .register("article.delete", handler_fn(delete));
}

/// Table name, overridable per route with `options.table`.
fn table(ctx: &HandlerContext) -> &str {
    ctx.option_str("table").unwrap_or(DEFAULT_TABLE)
}

fn success(reply: &mut Reply, article: Value) -> Result<(), HandlerError> {
    reply.status(200).status_text("success");
    reply.json(&json!({
        "status": 200,
        "statusText": "success",
        "article": article,
    }))?;
    Ok(())
}

fn bad_request(reply: &mut Reply) -> Result<(), HandlerError> {
    reply.envelope(StatusCode::BAD_REQUEST, "Bad request")?;
    Ok(())
}

/// Name and price from the payload, or `None` if both are falsy.
fn payload(req: &RequestView) -> Option<[Value; 2]> {
    let name = req.json_field("name");
    let price = req.json_field("price");
    if !is_truthy(name) && !is_truthy(price) {
        return None;
    }
    Some([
        name.cloned().unwrap_or(Value::Null),
        price.cloned().unwrap_or(Value::Null),
    ])
}

fn list(_req: &RequestView, reply: &mut Reply, ctx: &HandlerContext) -> Result<(), HandlerError> {
    let rows = ctx.store().get(table(ctx), &["*"], None)?;
    let articles = rows.into_iter().map(Value::Object).collect();
    success(reply, Value::Array(articles))
}

fn create(req: &RequestView, reply: &mut Reply, ctx: &HandlerContext) -> Result<(), HandlerError> {
    let Some(values) = payload(req) else {
        return bad_request(reply);
    };
    let row = ctx.store().create(table(ctx), &FIELDS, &values)?;
    tracing::debug!(article = ?row, "Article created");
    success(reply, Value::Object(row))
}

fn update(req: &RequestView, reply: &mut Reply, ctx: &HandlerContext) -> Result<(), HandlerError> {
    let Some(values) = payload(req) else {
        return bad_request(reply);
    };
    let Some(id) = req.param("id") else {
        return bad_request(reply);
    };
    let row = ctx
        .store()
        .update(table(ctx), &FIELDS, &values, &Filter::eq("id", id))?;
    success(reply, row.map(Value::Object).unwrap_or(Value::Null))
}

fn delete(req: &RequestView, reply: &mut Reply, ctx: &HandlerContext) -> Result<(), HandlerError> {
    // The sample route file is `[name].delete.toml` but the value is an id.
    let Some(id) = req.param("id").or_else(|| req.param("name")) else {
        return bad_request(reply);
    };
    let row = ctx.store().delete(table(ctx), &Filter::eq("id", id))?;
    success(reply, row.map(Value::Object).unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::PathParams;
    use crate::store::{DataStore, MemoryStore};
    use axum::http::Method;
    use std::sync::Arc;

    fn context() -> (Arc<MemoryStore>, HandlerContext) {
        let store = Arc::new(MemoryStore::new(["article"]));
        let ctx = HandlerContext::new(store.clone());
        (store, ctx)
    }

    fn request(method: Method, path: &str, body: &str) -> RequestView {
        let mut req = RequestView::new(method, path).with_body(body.to_string());
        req.parse_json().unwrap();
        req
    }

    fn body(reply: &Reply) -> Value {
        serde_json::from_slice(reply.body()).unwrap()
    }

    #[test]
    fn create_requires_name_or_price() {
        let (_, ctx) = context();
        let mut reply = Reply::new();
        create(&request(Method::POST, "/article", "{}"), &mut reply, &ctx).unwrap();
        assert_eq!(reply.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&reply), json!({"status": 400, "statusText": "Bad request"}));
    }

    #[test]
    fn create_accepts_name_only() {
        let (store, ctx) = context();
        let mut reply = Reply::new();
        create(&request(Method::POST, "/article", r#"{"name":"widget"}"#), &mut reply, &ctx).unwrap();
        assert_eq!(reply.status_code(), StatusCode::OK);
        assert_eq!(body(&reply)["article"]["name"], json!("widget"));
        assert_eq!(store.row_count("article"), Some(1));
    }

    #[test]
    fn update_and_delete_by_id() {
        let (store, ctx) = context();
        store.create("article", &FIELDS, &[json!("a"), json!(1)]).unwrap();

        let mut params = PathParams::new();
        params.insert("id", "1");
        let req = request(Method::PUT, "/article/1", r#"{"price":9}"#).with_params(params);
        let mut reply = Reply::new();
        update(&req, &mut reply, &ctx).unwrap();
        assert_eq!(body(&reply)["article"]["price"], json!(9));

        let mut params = PathParams::new();
        params.insert("name", "1");
        let req = RequestView::new(Method::DELETE, "/article/1").with_params(params);
        let mut reply = Reply::new();
        delete(&req, &mut reply, &ctx).unwrap();
        assert_eq!(body(&reply)["article"]["id"], json!(1));
        assert_eq!(store.row_count("article"), Some(0));
    }

    #[test]
    fn list_returns_array() {
        let (store, ctx) = context();
        store.create("article", &FIELDS, &[json!("a"), json!(1)]).unwrap();
        let mut reply = Reply::new();
        list(&RequestView::new(Method::GET, "/article"), &mut reply, &ctx).unwrap();
        assert_eq!(body(&reply)["article"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn store_errors_propagate() {
        let store = Arc::new(MemoryStore::new(Vec::<String>::new()));
        let ctx = HandlerContext::new(store);
        let mut reply = Reply::new();
        let err = list(&RequestView::new(Method::GET, "/article"), &mut reply, &ctx).unwrap_err();
        assert!(matches!(err, HandlerError::Store(_)));
        assert!(!reply.is_finalized());
    }
}
