//! Descomposición de consultas booleanas estilo PubMed en grupos de palabras clave.
//!
//! Flujo:
//!   1. Se protege el `NOT` de `AND NOT` con un centinela, de modo que el
//!      fragmento negado quede marcado tras dividir por `AND`.
//!   2. Se divide por `AND`; los fragmentos negados se descartan enteros.
//!   3. Cada fragmento se divide por `OR` y cada término se limpia
//!      (etiquetas de campo, comodines, paréntesis, comillas, `NOT` inicial).
//!   4. Si no hay estructura booleana, se usa la lista separada por comas
//!      o la entrada completa como un único grupo.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::KeywordGroup;

const NEGATION_SENTINEL: &str = "\u{0}NOT\u{0}";

const STOP_WORDS: [&str; 4] = ["and", "or", "not", "and not"];

/// Etiquetas de campo de PubMed: `[tiab]`, `[MeSH Terms]`, `[mh:noexp]`, ...
static FIELD_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\[\s*(?:",
        r"ti|ab|tiab|tw|all\s+fields|mesh\s+terms?|major\s+mesh|mp|mh|sh|rn|nm|ot|",
        r"pt|la|jw|so|af|aud|cois|mf|px|rf|ro|rx|sb|si|subh|ec|ip|lr|od|pg|pl|vi|",
        r"au|corp|fau|gr|invt|ir|irad|cn|ed|fd|auid|book|series|pmid|tr|dn|ddt|isbn|",
        r"edat|pdat|mhda|crdt|entrez\s+date|publication\s+date|mesh\s+date|create\s+date",
        r")\s*(?::\w+)?\s*\]",
    ))
    .expect("regex de etiquetas de campo válida")
});

static AND_NOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bAND\s+NOT\b").expect("regex AND NOT válida"));

static AND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bAND\b").expect("regex AND válida"));

static OR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bOR\b").expect("regex OR válida"));

static OPERATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:AND|OR)\b").expect("regex de operadores válida"));

static LEADING_NOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*NOT\s+").expect("regex NOT inicial válida"));

/// Descompone una consulta en grupos ordenados (OR dentro del grupo, AND entre grupos).
///
/// Es una función total: cualquier cadena produce un resultado, posiblemente vacío.
pub fn decompose(query: &str) -> Vec<KeywordGroup> {
    if query.trim().is_empty() {
        return Vec::new();
    }

    // Lista de palabras clave sin operadores: "diabetes, insulin, heart attack".
    if !OPERATOR.is_match(query) && query.contains(',') {
        return fallback_group(query).into_iter().collect();
    }

    let work = AND_NOT.replace_all(query, format!("AND {NEGATION_SENTINEL}").as_str());

    let groups: Vec<KeywordGroup> = AND
        .split(&work)
        .filter(|fragment| !fragment.contains(NEGATION_SENTINEL))
        .filter_map(|fragment| {
            let terms = OR
                .split(fragment)
                .map(clean_term)
                .filter(|term| !term.is_empty() && !is_stop_word(term))
                .collect();
            KeywordGroup::new(terms)
        })
        .collect();

    if groups.is_empty() {
        return fallback_group(query).into_iter().collect();
    }
    groups
}

/// Quita etiquetas de campo, comodines, paréntesis, comillas y un `NOT` inicial.
pub fn clean_term(raw: &str) -> String {
    let term = FIELD_TAG.replace_all(raw, "");
    let term: String = term
        .chars()
        .filter(|c| !matches!(c, '*' | '(' | ')' | '"' | '\'' | '\u{201c}' | '\u{201d}'))
        .collect();
    LEADING_NOT.replace(&term, "").trim().to_string()
}

fn is_stop_word(term: &str) -> bool {
    let lower = term.to_lowercase();
    STOP_WORDS.contains(&lower.as_str())
}

fn fallback_group(query: &str) -> Option<KeywordGroup> {
    let terms = if query.contains(',') {
        query
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        vec![query.trim().to_string()]
    };
    KeywordGroup::new(terms)
}
