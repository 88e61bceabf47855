//! Fail-open merging of batch results.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use super::client::{Analytics, Completion};
use crate::parallel::Outcome;

/// Fulfilled responses merged into one object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Combined {
    /// Shallow merge of every fulfilled object response; later keys win.
    pub response: Map<String, Value>,
    /// Analytics of each fulfilled completion, keyed by input index.
    pub analytics: BTreeMap<usize, Analytics>,
}

/// Merges the fulfilled outcomes of a batch, in index order.
///
/// Rejected outcomes are skipped. A fulfilled completion still contributes its
/// analytics when its response is empty or is not a JSON object.
pub fn combine<E>(outcomes: &[Outcome<Completion, E>]) -> Combined {
    let mut combined = Combined::default();

    for (index, outcome) in outcomes.iter().enumerate() {
        let Some(completion) = outcome.value() else {
            continue;
        };
        if let Some(Value::Object(response)) = &completion.response {
            for (key, value) in response {
                combined.response.insert(key.clone(), value.clone());
            }
        }
        combined.analytics.insert(index, completion.analytics.clone());
    }

    combined
}
