use tracing::{debug, error, info};

use crate::{
    index::{PointResult, VectorIndex},
    provider::Embedder,
};

/// Finds the `k` chunks most similar to `query`.
///
/// Never fails: a missing index, `k == 0` or any embedding/search error all produce an
/// empty result, the latter being logged.
pub async fn retrieve_context(
    embedder: &dyn Embedder,
    index: Option<&VectorIndex>,
    query: &str,
    k: usize,
) -> Vec<PointResult> {
    let Some(index) = index else {
        error!("Vector store is not available for retrieval.");
        return vec![];
    };

    if k == 0 || index.is_empty() {
        return vec![];
    }

    info!("Retrieving context for query: '{query}'");

    let vector = match embedder.embed_query(query).await {
        Ok(vector) => vector,
        Err(err) => {
            error!("Error during context retrieval: {err}");
            return vec![];
        }
    };

    match index.query(&vector, k) {
        Ok(results) => {
            info!("Retrieved {} relevant chunks.", results.len());
            for result in &results {
                debug!(
                    "{:.4} {}#{}",
                    result.score,
                    result.payload.metadata.source.display(),
                    result.payload.index
                );
            }

            results
        }
        Err(err) => {
            error!("Error during context retrieval: {err}");
            vec![]
        }
    }
}
