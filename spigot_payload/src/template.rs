//! Weighted message templates.

use rand::Rng;

use crate::Error;

/// Body returned when floating-point rounding leaves the draw at or above
/// every cumulative sum. A defined fallback, never an error.
const FALLBACK: &str = "{}";

#[derive(Debug, Clone)]
struct Template {
    /// Cumulative probability. This template is selected by the first draw
    /// that lands below this value and at or above the previous template's.
    cumulative: f64,
    body: String,
}

/// A fixed set of weighted message templates.
///
/// Raw weights are normalized to probabilities at construction and the
/// cumulative distribution is walked in input order, so equal inputs with
/// equal seeds reproduce the same draws. Read-only after construction and
/// safe to share across any number of in-flight send tasks.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    templates: Vec<Template>,
}

impl TemplateStore {
    /// Build a store from `(weight, body)` pairs.
    ///
    /// # Errors
    ///
    /// Fails if any weight is negative or not finite, or if the weights sum
    /// to zero. An empty input has a zero sum and is rejected the same way.
    pub fn new<I>(entries: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (f64, String)>,
    {
        let entries: Vec<(f64, String)> = entries.into_iter().collect();

        let mut total = 0.0;
        for (weight, _) in &entries {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(Error::InvalidWeight(*weight));
            }
            total += weight;
        }
        if total <= 0.0 {
            return Err(Error::ZeroTotalWeight);
        }

        let mut templates = Vec::with_capacity(entries.len());
        let mut acc = 0.0;
        for (weight, body) in entries {
            acc += weight / total;
            templates.push(Template {
                cumulative: acc,
                body,
            });
        }

        Ok(Self { templates })
    }

    /// Draw one template body at random, weighted by probability.
    ///
    /// Never panics and never indexes out of range: if rounding in the
    /// cumulative sums leaves the draw unclaimed the neutral empty-object
    /// body is returned.
    pub fn pick_random<R>(&self, rng: &mut R) -> &str
    where
        R: Rng + ?Sized,
    {
        self.pick_at(rng.random())
    }

    /// Select the first template whose cumulative sum exceeds `r`.
    fn pick_at(&self, r: f64) -> &str {
        for template in &self.templates {
            if r < template.cumulative {
                return &template.body;
            }
        }
        FALLBACK
    }

    /// Normalized probability of each template, in input order.
    #[must_use]
    pub fn probabilities(&self) -> Vec<f64> {
        let mut prev = 0.0;
        self.templates
            .iter()
            .map(|t| {
                let p = t.cumulative - prev;
                prev = t.cumulative;
                p
            })
            .collect()
    }

    /// Number of templates in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// True if the store holds no templates. Unreachable through [`Self::new`],
    /// which rejects empty inputs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
