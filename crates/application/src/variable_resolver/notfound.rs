//! "Did you mean" recommendations for missing variables

use scopevar_domain::{Sigil, VariableError};

const MAX_RECOMMENDATIONS: usize = 10;
const CUTOFF: f64 = 0.6;

/// Builds a not-found error for the decorated `name`, recommending
/// similarly named candidates whose value shape fits the requested sigil.
///
/// `candidates` are bare names paired with the sigil matching their value
/// shape (`$` for anything that is neither a list nor a dictionary).
#[must_use]
pub fn variable_not_found(name: &str, candidates: &[(String, Sigil)]) -> VariableError {
    VariableError::not_found(name, recommend(name, candidates))
}

/// Builds an environment not-found error for `%{name}`.
#[must_use]
pub fn environment_not_found(name: &str, environment_names: &[String]) -> VariableError {
    let candidates: Vec<(String, Sigil)> = environment_names
        .iter()
        .map(|candidate| (candidate.clone(), Sigil::Scalar))
        .collect();
    VariableError::EnvironmentNotFound {
        name: name.to_string(),
        recommendations: recommend(name, &candidates),
    }
}

fn recommend(name: &str, candidates: &[(String, Sigil)]) -> Vec<String> {
    let Some(sigil) = name.chars().next().and_then(Sigil::from_char) else {
        return Vec::new();
    };
    let wanted = normalize(name);
    if wanted.is_empty() {
        return Vec::new();
    }
    let mut scored: Vec<(f64, String)> = candidates
        .iter()
        .filter(|(_, shape)| match sigil {
            Sigil::List | Sigil::Dict => *shape == sigil,
            Sigil::Scalar | Sigil::Environment | Sigil::Reserved => true,
        })
        .filter_map(|(candidate, _)| {
            let score = similarity(&wanted, &normalize(candidate));
            (score >= CUTOFF).then(|| (score, sigil.decorate(candidate)))
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.dedup_by(|a, b| a.1 == b.1);
    scored
        .into_iter()
        .take(MAX_RECOMMENDATIONS)
        .map(|(_, candidate)| candidate)
        .collect()
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && !"$@&%{}_".contains(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - edit_distance(a, b) as f64 / longest as f64
}

/// Edit distance counting an adjacent transposition as a single edit.
fn edit_distance(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    let a_chars = a.chars().collect::<Vec<_>>();
    let b_chars = b.chars().collect::<Vec<_>>();
    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut before_prev = vec![0; b_chars.len() + 1];
    let mut prev = (0..=b_chars.len()).collect::<Vec<_>>();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (curr[j] + 1).min(prev[j + 1] + 1).min(prev[j] + cost);
            if i > 0 && j > 0 && *ca == b_chars[j - 1] && a_chars[i - 1] == *cb {
                curr[j + 1] = curr[j + 1].min(before_prev[j - 1] + 1);
            }
        }
        before_prev.clone_from(&prev);
        prev.clone_from(&curr);
    }

    prev[b_chars.len()]
}
