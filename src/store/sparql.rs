use std::collections::HashMap;

use serde::Deserialize;

use super::StoreError;

#[derive(Deserialize)]
struct SparqlSelectResponse {
    results: SparqlSelectResults,
}

#[derive(Deserialize)]
struct SparqlSelectResults {
    bindings: Vec<HashMap<String, SparqlSelectBinding>>,
}

#[derive(Deserialize)]
struct SparqlSelectBinding {
    value: String,
}

/// Parse SPARQL results JSON into one variable-to-value map per solution.
pub(crate) fn parse_select_rows(json: &str) -> Result<Vec<HashMap<String, String>>, StoreError> {
    let response: SparqlSelectResponse =
        serde_json::from_str(json).map_err(|e| StoreError::Parse {
            reason: format!("Failed to parse SELECT response: {e}"),
        })?;

    Ok(response
        .results
        .bindings
        .into_iter()
        .map(|binding| {
            binding
                .into_iter()
                .map(|(var, value)| (var, value.value))
                .collect()
        })
        .collect())
}
