#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

mod answer;
pub mod config;
pub mod index;
pub mod loader;
mod prompt;
pub mod provider;
mod retriever;
pub mod session;
mod splitter;

pub use answer::{generate_answer, Answer};
pub use config::{Config, Provider};
pub use index::{BuildError, Distance, PointResult, VectorIndex};
pub use loader::{Document, LoadError, Loader};
pub use prompt::build_prompt;
pub use provider::{Embedder, Generator, ServiceError};
pub use retriever::retrieve_context;
pub use session::{IngestError, Session, State};
pub use splitter::{split_documents, Chunk};

/// Retrieves the `k` most relevant chunks for `query` and asks the model to answer from them.
pub async fn process_query(
    embedder: &dyn Embedder,
    generator: &dyn Generator,
    index: Option<&VectorIndex>,
    query: &str,
    k: usize,
) -> Answer {
    let context = retrieve_context(embedder, index, query, k).await;

    generate_answer(generator, query, &context).await
}
