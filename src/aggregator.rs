//! Agregación de sugerencias: cada grupo se envía al backend elegido, los
//! términos se aplanan y se deduplican por grupo, y se construye la lista
//! plana de términos seleccionables.
//!
//! Política todo-o-nada: si la llamada de cualquier grupo falla (o supera el
//! tiempo límite) se descarta el resultado completo.

use std::collections::HashSet;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{error, info};

use crate::backend::{Backends, SuggestionSource};
use crate::error::SuggestError;
use crate::models::{
    BackendKind, KeywordGroup, SelectableTerm, SelectionKey, SuggestionRecord, SuggestionResult,
    Suggestions,
};

/// Sugiere términos para todos los grupos con el backend `kind`.
pub async fn suggest(
    groups: &[KeywordGroup],
    kind: BackendKind,
    backends: &Backends,
    timeout: Duration,
) -> Result<Suggestions, SuggestError> {
    if groups.is_empty() {
        return Ok(Suggestions::default());
    }

    let backend = backends.select(kind)?;
    info!("Sugiriendo términos MeSH para {} grupo(s) con {kind}", groups.len());

    let suggestions = aggregate(groups, &backend, timeout, kind.max_concurrent_calls()).await?;
    info!(
        "Sugerencia completada: {} término(s) seleccionable(s)",
        suggestions.choices.len()
    );
    Ok(suggestions)
}

/// Llama a `source` una vez por grupo, con como mucho `concurrency`
/// llamadas en curso, y conserva el orden de los grupos.
pub async fn aggregate<S>(
    groups: &[KeywordGroup],
    source: &S,
    timeout: Duration,
    concurrency: usize,
) -> Result<Suggestions, SuggestError>
where
    S: SuggestionSource + ?Sized,
{
    let calls: Vec<_> = groups.iter().enumerate().map(|(group_index, group)| async move {
        let records = tokio::time::timeout(timeout, source.suggest(group.keywords()))
            .await
            .map_err(|_| {
                SuggestError::BackendCall(format!(
                    "el grupo {} superó el tiempo límite de {}s",
                    group_index + 1,
                    timeout.as_secs_f32()
                ))
            })?
            .map_err(|err| SuggestError::BackendCall(format!("grupo {}: {err:#}", group_index + 1)))?;

        Ok::<_, SuggestError>(SuggestionResult {
            group_index,
            keywords: group.keywords().to_vec(),
            terms: merge_terms(&records),
        })
    }).collect();

    let results: Vec<SuggestionResult> = stream::iter(calls)
        .buffered(concurrency.max(1))
        .try_collect()
        .await
        .inspect_err(|err| {
            error!("Agregación abortada: {err}");
        })?;

    let choices = results
        .iter()
        .flat_map(|result| {
            result
                .terms
                .iter()
                .map(|term| SelectableTerm::from(SelectionKey::new(result.group_index, term.clone())))
        })
        .collect();

    Ok(Suggestions { results, choices })
}

/// Aplana los términos de todos los registros; gana la primera aparición.
pub fn merge_terms(records: &[SuggestionRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .flat_map(|record| record.mesh_terms.values())
        .filter(|term| seen.insert(term.as_str()))
        .cloned()
        .collect()
}
