//! HTTP handlers for the catalog pages.

use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, Path, Query, State},
    response::{Html, Redirect},
    routing::{get, post},
    Form, Router,
};
use bookshelf_http::error::AppError;

use super::form::{BookForm, SearchParams};
use super::models::{BookId, DeleteOutcome};
use super::repository::BookRepository;
use super::search::SearchQuery;
use super::views;

pub type SharedRepository = Arc<dyn BookRepository>;

/// Catalog routes, rooted at `/`.
pub fn router(repository: SharedRepository) -> Router {
    Router::new()
        .route("/", get(list_books))
        .route("/add", get(add_form).post(create_book))
        .route("/edit/{id}", get(edit_form).post(update_book))
        .route("/search", get(search_books))
        .route("/delete/{id}", post(delete_book))
        .with_state(repository)
}

async fn list_books(State(repository): State<SharedRepository>) -> Result<Html<String>, AppError> {
    let books = repository
        .list_all()
        .await
        .map_err(|err| AppError::store("Error fetching books.", err))?;

    Ok(Html(views::index(&books)))
}

async fn add_form() -> Html<String> {
    Html(views::add_form())
}

async fn edit_form(
    State(repository): State<SharedRepository>,
    Path(raw_id): Path<String>,
) -> Result<Html<String>, AppError> {
    let message = "Error fetching book for edit.";
    let id = BookId::parse(&raw_id).map_err(|err| AppError::store(message, err))?;
    let book = repository
        .get_by_id(id)
        .await
        .map_err(|err| AppError::store(message, err))?
        .ok_or_else(|| AppError::not_found("Book not found."))?;

    Ok(Html(views::edit_form(&book)))
}

async fn search_books(
    State(repository): State<SharedRepository>,
    Query(params): Query<SearchParams>,
) -> Result<Html<String>, AppError> {
    let query = SearchQuery::from(params);
    let books = repository
        .search(&query)
        .await
        .map_err(|err| AppError::store("Error searching books.", err))?;

    Ok(Html(views::search_results(&query.text, &books)))
}

/// Undecodable bodies answer 400 with the route's plain-text message.
fn decode_form(
    form: Result<Form<BookForm>, FormRejection>,
    message: &str,
) -> Result<BookForm, AppError> {
    let Form(form) = form.map_err(|rejection| {
        tracing::debug!(error = %rejection, "book form rejected");
        AppError::bad_request(message)
    })?;
    Ok(form)
}

async fn create_book(
    State(repository): State<SharedRepository>,
    form: Result<Form<BookForm>, FormRejection>,
) -> Result<Redirect, AppError> {
    let message = "Error adding book.";
    let form = decode_form(form, message)?;
    form.validate()
        .map_err(|err| AppError::validation(err.messages(), message))?;

    let book = repository
        .create(form.into_input())
        .await
        .map_err(|err| AppError::store(message, err))?;

    tracing::info!(id = %book.id, "book added");
    Ok(Redirect::to("/"))
}

async fn delete_book(
    State(repository): State<SharedRepository>,
    Path(raw_id): Path<String>,
) -> Result<Redirect, AppError> {
    let message = "Error deleting book.";
    let id = BookId::parse(&raw_id).map_err(|err| AppError::store(message, err))?;
    let outcome = repository
        .delete_by_id(id)
        .await
        .map_err(|err| AppError::store(message, err))?;

    match outcome {
        DeleteOutcome::Deleted => tracing::info!(%id, "book deleted"),
        DeleteOutcome::NotFound => tracing::info!(%id, "delete requested for missing book"),
    }
    Ok(Redirect::to("/"))
}

async fn update_book(
    State(repository): State<SharedRepository>,
    Path(raw_id): Path<String>,
    form: Result<Form<BookForm>, FormRejection>,
) -> Result<Redirect, AppError> {
    let message = "Error updating book.";
    let id = BookId::parse(&raw_id).map_err(|err| AppError::store(message, err))?;
    let form = decode_form(form, message)?;
    form.validate()
        .map_err(|err| AppError::validation(err.messages(), message))?;

    let book = repository
        .update(id, form.into_input())
        .await
        .map_err(|err| AppError::store(message, err))?
        .ok_or_else(|| AppError::not_found("Book not found."))?;

    tracing::info!(id = %book.id, "book updated");
    Ok(Redirect::to("/"))
}
