//! Journal API routes exercising the repository facade through the
//! request's session scope.

use axum::{
    extract::Path,
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use rowboat_common::Error;
use rowboat_db::repo::Repository;
use rowboat_db::value::Value;
use serde::Deserialize;

use crate::journal::Post;
use crate::server::scope::RequestScope;
use crate::server::AppContext;

pub fn journal_routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/posts",
            get(list_posts).post(create_post).delete(clear_posts),
        )
        .route("/posts/{id}", get(get_post))
}

/// New post payload
#[derive(Deserialize)]
pub struct CreatePost {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub published: bool,
}

fn internal(err: Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

async fn list_posts(
    Extension(rs): Extension<RequestScope>,
) -> Result<Json<Vec<Post>>, (StatusCode, String)> {
    let posts = Repository::<Post>::find_all(rs.scope()).map_err(internal)?;
    Ok(Json(posts))
}

async fn create_post(
    Extension(rs): Extension<RequestScope>,
    Json(payload): Json<CreatePost>,
) -> Result<(StatusCode, Json<Post>), (StatusCode, String)> {
    let post = Post::new(&payload.title, &payload.body, payload.published);
    Repository::<Post>::save(rs.scope(), &post).map_err(internal)?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_post(
    Extension(rs): Extension<RequestScope>,
    Path(id): Path<String>,
) -> Result<Json<Post>, (StatusCode, String)> {
    let found = Repository::<Post>::find_by_key(rs.scope(), &Value::from(id.as_str()))
        .map_err(internal)?;
    match found {
        Some(post) => Ok(Json(post)),
        None => Err((StatusCode::NOT_FOUND, format!("post '{id}' not found"))),
    }
}

async fn clear_posts(
    Extension(rs): Extension<RequestScope>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let deleted = Repository::<Post>::delete_all(rs.scope()).map_err(internal)?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}
