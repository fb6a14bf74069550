//! Reconstrucción de un fragmento booleano a partir de los términos
//! seleccionados y su anexión a la consulta en construcción.
//!
//! No se deduplica contra el texto existente: añadir dos veces la misma
//! selección repite el fragmento.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::models::{SelectableTerm, SelectionKey};

const MESH_FIELD: &str = "[MeSH Terms]";

/// Añade a `current` el fragmento construido con las etiquetas `selected`.
///
/// Las etiquetas se resuelven contra `choices`; las que no existen se
/// ignoran. Sin etiquetas (o sin ninguna resuelta) devuelve `current` intacto.
pub fn append(selected: &[String], choices: &[SelectableTerm], current: &str) -> String {
    if selected.is_empty() {
        return current.to_string();
    }

    let by_label: HashMap<&str, &SelectionKey> = choices
        .iter()
        .map(|choice| (choice.label.as_str(), &choice.key))
        .collect();

    let keys: Vec<&SelectionKey> = selected
        .iter()
        .filter_map(|label| {
            let key = by_label.get(label.as_str()).copied();
            if key.is_none() {
                debug!("Etiqueta de selección desconocida ignorada: '{label}'");
            }
            key
        })
        .collect();

    match build_fragment(keys) {
        Some(fragment) => join_with(current, &fragment),
        None => current.to_string(),
    }
}

/// Fragmento para un conjunto de claves: grupos en orden numérico
/// ascendente, términos en el orden de selección.
pub fn build_fragment<'a>(keys: impl IntoIterator<Item = &'a SelectionKey>) -> Option<String> {
    let mut by_group: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
    for key in keys {
        by_group.entry(key.group_index).or_default().push(key.term.as_str());
    }

    if by_group.is_empty() {
        return None;
    }

    let fragments: Vec<String> = by_group
        .into_values()
        .map(|terms| match terms.as_slice() {
            [single] => mesh_atom(single),
            many => format!(
                "({})",
                many.iter().map(|t| mesh_atom(t)).collect::<Vec<_>>().join(" OR ")
            ),
        })
        .collect();

    Some(fragments.join(" AND "))
}

fn mesh_atom(term: &str) -> String {
    format!("\"{term}\"{MESH_FIELD}")
}

fn join_with(current: &str, fragment: &str) -> String {
    let base = current.trim();
    if base.is_empty() {
        fragment.to_string()
    } else {
        format!("{base} AND {fragment}")
    }
}
