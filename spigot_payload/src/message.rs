//! Placeholder substitution over weighted templates.

use bytes::Bytes;
use rand::Rng;

use crate::{IdPool, TemplateStore};

/// Composes a [`TemplateStore`] and an [`IdPool`] into ready-to-send JSON
/// message bodies.
///
/// Substitution is pure text replacement: the generator does not parse or
/// re-validate the result. Templates must be authored so that substituted
/// values keep the document well-formed.
#[derive(Debug, Clone)]
pub struct MessageGenerator {
    templates: TemplateStore,
    pools: IdPool,
}

impl MessageGenerator {
    /// Create a new [`MessageGenerator`].
    #[must_use]
    pub fn new(templates: TemplateStore, pools: IdPool) -> Self {
        Self { templates, pools }
    }

    /// Produce one message body.
    ///
    /// Draws a weighted template, substitutes every `#ID#` with a fresh
    /// `CALLER-<n>` identifier, then for each pool name `k` substitutes
    /// every quoted `"##k##"` (the replacement lands as a raw, unquoted
    /// fragment) followed by every bare `#k#`. Each occurrence re-draws
    /// from the pool; unknown or empty pools leave their placeholders in
    /// place. Inserted text is never re-scanned.
    pub fn generate<R>(&self, rng: &mut R) -> Bytes
    where
        R: Rng + ?Sized,
    {
        let mut body = self.templates.pick_random(rng).to_owned();

        // One caller id per message, shared by every #ID# occurrence. A
        // random u64 makes collisions across a run improbable rather than
        // impossible, which is sufficient here.
        let caller: u64 = rng.random();
        body = body.replace("#ID#", &format!("CALLER-{caller}"));

        for name in self.pools.names() {
            // Quoted form first: its replacement swallows the quotes, so
            // the bare-form pass that follows must not see them again.
            body = self.substitute(&body, &format!("\"##{name}##\""), name, rng);
            body = self.substitute(&body, &format!("#{name}#"), name, rng);
        }

        Bytes::from(body)
    }

    /// Replace each occurrence of `token` with an independent draw from the
    /// named pool. Scanning resumes past the inserted text, so replacements
    /// are never themselves re-scanned. An absent pool leaves the text
    /// unchanged.
    fn substitute<R>(&self, body: &str, token: &str, name: &str, rng: &mut R) -> String
    where
        R: Rng + ?Sized,
    {
        let mut out = String::with_capacity(body.len());
        let mut rest = body;
        while let Some(at) = rest.find(token) {
            out.push_str(&rest[..at]);
            match self.pools.pick_random(rng, name) {
                Some(value) => out.push_str(value),
                None => out.push_str(token),
            }
            rest = &rest[at + token.len()..];
        }
        out.push_str(rest);
        out
    }
}
