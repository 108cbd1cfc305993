use crate::rules::{load_noise_list, RuleSpec, RuleTable};
use recon_core::{CanonConfig, MissingNoiseListPolicy, ReconError, Result};

/// Pure, idempotent name normalizer over a fixed rule table.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    table: RuleTable,
}

impl Canonicalizer {
    /// Rejects tables whose alias labels are not fixed points, since those
    /// would make a second pass change the output.
    pub fn new(table: RuleTable) -> Result<Self> {
        let canon = Self { table };
        canon.check_alias_labels()?;
        Ok(canon)
    }

    pub fn from_spec(spec: &RuleSpec) -> Result<Self> {
        Self::new(RuleTable::compile(spec)?)
    }

    pub fn builtin() -> Result<Self> {
        Self::from_spec(&RuleSpec::builtin())
    }

    pub fn trim_only() -> Self {
        Self { table: RuleTable::default() }
    }

    /// Build the run's canonicalizer, loading the external noise list once.
    pub fn from_config(config: &CanonConfig) -> Result<Self> {
        let Some(path) = &config.noise_list_path else {
            tracing::debug!("no external noise list configured, using built-in rules");
            return Self::builtin();
        };
        match load_noise_list(path) {
            Ok(terms) => {
                tracing::info!(terms = terms.len(), path = %path.display(), "loaded noise list");
                Self::from_spec(&RuleSpec::builtin().with_noise_terms(terms))
            }
            Err(err @ ReconError::ConfigurationMissing { .. }) => match config.on_missing_noise_list {
                MissingNoiseListPolicy::Fail => Err(err),
                MissingNoiseListPolicy::TrimOnly => {
                    tracing::warn!(error = %err, "noise list unavailable, canonicalizing with trim only");
                    Ok(Self::trim_only())
                }
            },
            Err(err) => Err(err),
        }
    }

    /// Missing values pass through unchanged.
    pub fn canonicalize(&self, raw: Option<&str>) -> Option<String> {
        raw.map(|name| self.canonicalize_str(name))
    }

    pub fn canonicalize_str(&self, raw: &str) -> String {
        let reduced = self.reduce(raw);
        match self.table.alias_index(&reduced) {
            Some(i) => self.table.aliases[i].label.clone(),
            None => reduced,
        }
    }

    /// Apply passes until the text no longer changes. Each productive pass
    /// strictly shortens the text, so this terminates.
    fn reduce(&self, raw: &str) -> String {
        let mut current = raw.to_string();
        loop {
            let next = self.table.apply_pass(&current);
            if next == current {
                return next;
            }
            current = next;
        }
    }

    fn check_alias_labels(&self) -> Result<()> {
        for (i, alias) in self.table.aliases.iter().enumerate() {
            let reduced = self.reduce(&alias.label);
            if reduced != alias.label {
                return Err(ReconError::InvalidRule(format!(
                    "alias label `{}` is rewritten to `{}`",
                    alias.label, reduced
                )));
            }
            match self.table.alias_index(&alias.label) {
                Some(j) if j == i => {}
                Some(j) => {
                    return Err(ReconError::InvalidRule(format!(
                        "alias label `{}` is captured by earlier alias `{}`",
                        alias.label, self.table.aliases[j].label
                    )))
                }
                None => {
                    return Err(ReconError::InvalidRule(format!(
                        "alias label `{}` contains none of its markers",
                        alias.label
                    )))
                }
            }
        }
        Ok(())
    }
}
