//! Localized user-facing strings.

use once_cell::sync::Lazy;
use std::collections::HashMap;

type Table = HashMap<&'static str, HashMap<&'static str, &'static str>>;

static STRINGS: Lazy<Table> = Lazy::new(|| {
    let table: &[(&str, &str, &str)] = &[
        (
            "en",
            "error_convert_accessibility",
            "Error converting from MathML to accessible text.",
        ),
        (
            "es",
            "error_convert_accessibility",
            "Error al convertir de MathML a texto accesible.",
        ),
        (
            "ca",
            "error_convert_accessibility",
            "Error en convertir de MathML a text accessible.",
        ),
        (
            "fr",
            "error_convert_accessibility",
            "Erreur de conversion de MathML en texte accessible.",
        ),
        (
            "de",
            "error_convert_accessibility",
            "Fehler beim Konvertieren von MathML in barrierefreien Text.",
        ),
        (
            "it",
            "error_convert_accessibility",
            "Errore di conversione da MathML a testo accessibile.",
        ),
        (
            "pt",
            "error_convert_accessibility",
            "Erro ao converter de MathML para texto acessível.",
        ),
    ];
    let mut strings = Table::new();
    for &(lang, key, value) in table {
        strings.entry(lang).or_default().insert(key, value);
    }
    strings
});

/// String `key` in `lang`.
///
/// Region suffixes are dropped when the full tag is unknown (`pt_br` and
/// `pt-BR` fall back to `pt`), then English is tried, then the key itself.
pub fn get<'a>(key: &'a str, lang: &str) -> &'a str {
    let lang = lang.to_ascii_lowercase();
    let base = lang.split(['_', '-']).next().unwrap_or("");

    let found = [lang.as_str(), base, "en"]
        .into_iter()
        .find_map(|candidate| STRINGS.get(candidate)?.get(key).copied());
    found.unwrap_or(key)
}
