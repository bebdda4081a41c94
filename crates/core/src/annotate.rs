//! Bio normalisation, language and location annotation of followers

use crate::records::FollowerRecord;
use crate::table::Table;
use markerprep_filters::language::{canonical_code, language_shares, LanguageClassifier, LanguageShare};
use markerprep_filters::location::LocationClassifier;
use markerprep_filters::text_preprocessing::TextNormalizer;
use rayon::prelude::*;
use tracing::{debug, info};

/// Normalise every bio and detect its language.
///
/// With `parallel` set the work fans out over the rayon pool; results are
/// collected back in row order, so the output is identical either way.
pub fn classify_languages(
    table: Table<FollowerRecord>,
    normalizer: &TextNormalizer,
    classifier: &dyn LanguageClassifier,
    seed: u64,
    parallel: bool,
) -> Table<FollowerRecord> {
    let name = table.name().to_string();
    let annotate = |mut record: FollowerRecord| {
        record.description_cleantext = normalizer.normalize_field(record.description.as_deref());
        let guess = classifier.classify(record.description_cleantext.as_deref().unwrap_or(""), seed);
        record.set_language(&guess);
        record
    };

    let rows: Vec<FollowerRecord> = if parallel {
        table.into_rows().into_par_iter().map(annotate).collect()
    } else {
        table.into_iter().map(annotate).collect()
    };

    let undetermined = rows
        .iter()
        .filter(|r| r.language_guess().is_undetermined())
        .count();
    info!(
        "Classified languages of {} followers ({} undetermined)",
        rows.len(),
        undetermined
    );

    Table::new(name, rows)
}

/// Flag every follower whose location lies in the target country.
pub fn classify_locations(
    table: Table<FollowerRecord>,
    classifier: &LocationClassifier,
) -> Table<FollowerRecord> {
    let name = table.name().to_string();
    let rows: Vec<FollowerRecord> = table
        .into_iter()
        .map(|mut record| {
            record.in_target_country = Some(classifier.is_target_country(record.location.as_deref()));
            record
        })
        .collect();

    let in_country = rows
        .iter()
        .filter(|r| r.in_target_country == Some(true))
        .count();
    info!(
        "Classified locations of {} followers ({} in target country)",
        rows.len(),
        in_country
    );

    Table::new(name, rows)
}

/// Keep followers detected in `language`, and, when `require_country` is
/// set, located in the target country.
///
/// Followers not yet classified never pass.
pub fn restrict_to_target(
    table: Table<FollowerRecord>,
    language: &str,
    require_country: bool,
) -> Table<FollowerRecord> {
    let code = canonical_code(language);
    let before = table.len();
    let name = table.name().to_string();

    let rows: Vec<FollowerRecord> = table
        .into_iter()
        .filter(|record| {
            record.language.as_deref() == Some(code.as_str())
                && (!require_country || record.in_target_country == Some(true))
        })
        .collect();

    info!(
        "Restricted to language '{}'{}: removed {} followers, {} left",
        code,
        if require_country { " and target country" } else { "" },
        before - rows.len(),
        rows.len()
    );

    Table::new(name, rows)
}

/// Partition followers into those detected in `language` and all others.
///
/// Both halves keep the input order.
pub fn split_by_language(
    table: Table<FollowerRecord>,
    language: &str,
) -> (Table<FollowerRecord>, Table<FollowerRecord>) {
    let code = canonical_code(language);
    let name = table.name().to_string();
    let (matching, others): (Vec<_>, Vec<_>) = table
        .into_iter()
        .partition(|record| record.language.as_deref() == Some(code.as_str()));

    debug!(
        "Split '{}' on language '{}': {} matching, {} others",
        name,
        code,
        matching.len(),
        others.len()
    );

    (
        Table::new(name.clone(), matching),
        Table::new(format!("{}_other", name), others),
    )
}

/// Share of each detected language among classified followers.
pub fn language_summary(table: &Table<FollowerRecord>) -> Vec<LanguageShare> {
    let guesses: Vec<_> = table.iter().map(FollowerRecord::language_guess).collect();
    language_shares(&guesses)
}
