//! Server-rendered pages. Every interpolated value goes through
//! [`escape_html`].

use std::fmt::Write;

use super::models::Book;
use crate::utils::escape_html;

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{title}</title>
  <link rel="stylesheet" href="/styles/main.css">
</head>
<body>
  <header>
    <h1><a href="/">Book Catalog</a></h1>
    <form action="/search" method="get" class="search">
      <input type="search" name="q" placeholder="Search title, author or genre">
      <button type="submit">Search</button>
    </form>
  </header>
  <main>
{body}
  </main>
</body>
</html>
"#,
        title = escape_html(title),
        body = body,
    )
}

fn book_table(books: &[Book]) -> String {
    if books.is_empty() {
        return "    <p class=\"empty\">No books found.</p>\n".to_string();
    }

    let mut html = String::from(
        "    <table>\n      <thead><tr><th>Title</th><th>Author</th><th>ISBN</th><th>Genre</th><th>Available</th><th></th></tr></thead>\n      <tbody>\n",
    );
    for book in books {
        // Writing to a String cannot fail.
        let _ = write!(
            html,
            r#"        <tr>
          <td>{title}</td>
          <td>{author}</td>
          <td>{isbn}</td>
          <td>{genre}</td>
          <td>{available}</td>
          <td>
            <a href="/edit/{id}">Edit</a>
            <form action="/delete/{id}" method="post" class="inline">
              <button type="submit">Delete</button>
            </form>
          </td>
        </tr>
"#,
            id = book.id,
            title = escape_html(&book.title),
            author = escape_html(&book.author),
            isbn = escape_html(&book.isbn),
            genre = escape_html(&book.genre),
            available = if book.available { "Yes" } else { "No" },
        );
    }
    html.push_str("      </tbody>\n    </table>\n");
    html
}

/// Form shared by add and edit. `book` pre-fills the fields.
fn book_form(action: &str, submit: &str, book: Option<&Book>) -> String {
    let value = |field: fn(&Book) -> &str| book.map(field).map(escape_html).unwrap_or_default();
    let checked = if book.is_some_and(|book| book.available) {
        " checked"
    } else {
        ""
    };

    format!(
        r#"    <form action="{action}" method="post" class="book-form">
      <label>Title <input type="text" name="title" value="{title}" required></label>
      <label>Author <input type="text" name="author" value="{author}" required></label>
      <label>ISBN <input type="text" name="isbn" value="{isbn}"></label>
      <label>Genre <input type="text" name="genre" value="{genre}"></label>
      <label><input type="checkbox" name="available"{checked}> Available</label>
      <button type="submit">{submit}</button>
    </form>
"#,
        action = escape_html(action),
        title = value(|book| &book.title),
        author = value(|book| &book.author),
        isbn = value(|book| &book.isbn),
        genre = value(|book| &book.genre),
        checked = checked,
        submit = escape_html(submit),
    )
}

pub fn index(books: &[Book]) -> String {
    let body = format!(
        "    <p><a href=\"/add\">Add a book</a></p>\n{}",
        book_table(books)
    );
    layout("Book Catalog", &body)
}

pub fn add_form() -> String {
    let body = format!("    <h2>Add a book</h2>\n{}", book_form("/add", "Add", None));
    layout("Add a book", &body)
}

pub fn edit_form(book: &Book) -> String {
    let action = format!("/edit/{}", book.id);
    let body = format!(
        "    <h2>Edit book</h2>\n{}",
        book_form(&action, "Save", Some(book))
    );
    layout("Edit book", &body)
}

pub fn search_results(query: &str, books: &[Book]) -> String {
    let body = format!(
        "    <h2>Results for &quot;{query}&quot;</h2>\n{table}    <p><a href=\"/\">Back to catalog</a></p>\n",
        query = escape_html(query),
        table = book_table(books),
    );
    layout("Search results", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::models::BookId;

    fn book() -> Book {
        Book {
            id: BookId::new(3),
            title: "Tom & Jerry".to_string(),
            author: "<script>".to_string(),
            isbn: "42".to_string(),
            genre: "Comics".to_string(),
            available: true,
        }
    }

    #[test]
    fn index_lists_books_with_actions() {
        let html = index(&[book()]);
        assert!(html.contains("Tom &amp; Jerry"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains(r#"href="/edit/3""#));
        assert!(html.contains(r#"action="/delete/3""#));
        assert!(html.contains("<td>Yes</td>"));
    }

    #[test]
    fn empty_index_says_so() {
        assert!(index(&[]).contains("No books found."));
    }

    #[test]
    fn edit_form_is_prefilled() {
        let html = edit_form(&book());
        assert!(html.contains(r#"action="/edit/3""#));
        assert!(html.contains(r#"name="title" value="Tom &amp; Jerry""#));
        assert!(html.contains(r#"name="available" checked"#));
    }

    #[test]
    fn add_form_is_blank() {
        let html = add_form();
        assert!(html.contains(r#"action="/add""#));
        assert!(html.contains(r#"name="title" value="""#));
        assert!(!html.contains(" checked"));
    }

    #[test]
    fn search_results_echo_the_query() {
        let html = search_results("<b>", &[]);
        assert!(html.contains("Results for &quot;&lt;b&gt;&quot;"));
        assert!(html.contains("No books found."));
    }
}
