use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use bookshelf::books::{Book, BookId, BookRepository, SearchQuery};
use bookshelf_kernel::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "bookshelf-cli", version, about = "Manage the book catalog")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Print every book in id order
    List {
        #[arg(long)]
        json: bool,
    },
    /// Find books whose title, author or genre contains QUERY
    Search {
        #[arg(default_value = "")]
        query: String,
        #[arg(long)]
        json: bool,
    },
    /// Print one book
    Show { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load bookshelf settings")?;
    bookshelf_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Serve => bookshelf::app::serve(&settings).await,
        Command::List { json } => {
            let repository = bookshelf::app::open_catalog(&settings).await?;
            let books = repository.list_all().await.context("failed to list books")?;
            print_books(&books, json)
        }
        Command::Search { query, json } => {
            let repository = bookshelf::app::open_catalog(&settings).await?;
            let books = repository
                .search(&SearchQuery::new(query))
                .await
                .context("failed to search books")?;
            print_books(&books, json)
        }
        Command::Show { id } => {
            let id = BookId::parse(&id)?;
            let repository = bookshelf::app::open_catalog(&settings).await?;
            match repository.get_by_id(id).await.context("failed to fetch book")? {
                Some(book) => println!("{}", serde_json::to_string_pretty(&book)?),
                None => anyhow::bail!("book {id} not found"),
            }
            Ok(())
        }
    }
}

fn print_books(books: &[Book], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(books)?);
        return Ok(());
    }

    for book in books {
        println!(
            "{:>5}  {}  by {}  [{}]{}",
            book.id,
            book.title,
            book.author,
            book.genre,
            if book.available { "" } else { "  (unavailable)" }
        );
    }
    tracing::debug!(count = books.len(), "books printed");
    Ok(())
}
