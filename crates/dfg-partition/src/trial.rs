use std::collections::BTreeMap;

use common::dfg::Dfg;
use tracing::{info, instrument};

use crate::catalog::Catalog;
use crate::config::PartitionParams;
use crate::constraints;
use crate::groups::{LabelParseError, MemoryGroups};
use crate::model::{Family, Model};
use crate::objective;

/// Sizes of a trial model.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelStats {
    /// `X` variables.
    pub assign_vars: usize,
    /// `L` variables.
    pub presence_vars: usize,
    /// `Y` and `W` variables.
    pub crossing_vars: usize,
    /// Rows per constraint family.
    pub rows: BTreeMap<Family, usize>,
}

impl ModelStats {
    fn of(model: &Model, catalog: &Catalog) -> Self {
        Self {
            assign_vars: catalog.assign_count(),
            presence_vars: catalog.presence_count(),
            crossing_vars: catalog.crossing_count(),
            rows: model.row_counts(),
        }
    }

    /// All variables.
    pub fn variables(&self) -> usize {
        self.assign_vars + self.presence_vars + self.crossing_vars
    }

    /// All rows.
    pub fn constraints(&self) -> usize {
        self.rows.values().sum()
    }

    /// Rows of one family.
    pub fn rows_of(&self, family: Family) -> usize {
        self.rows.get(&family).copied().unwrap_or(0)
    }
}

/// The complete model for one partition count. Each trial is built from scratch and owns its
/// model and catalog.
#[derive(Clone, Debug)]
pub struct Trial {
    num_parts: usize,
    model: Model,
    catalog: Catalog,
    stats: ModelStats,
}

impl Trial {
    /// Build the model for `num_parts` partitions.
    ///
    /// # Errors
    ///
    /// Fails on memory-access labels without a valid group id.
    pub fn build(dfg: &Dfg, params: &PartitionParams, num_parts: usize) -> Result<Self, LabelParseError> {
        let groups = MemoryGroups::scan(dfg)?;
        Ok(Self::with_groups(dfg, params, groups, num_parts))
    }

    /// Build the model for `num_parts` partitions from already scanned groups.
    #[instrument(skip_all, fields(num_parts = num_parts))]
    pub fn with_groups(dfg: &Dfg, params: &PartitionParams, groups: MemoryGroups, num_parts: usize) -> Self {
        let mut model = Model::new(format!("{}_{num_parts}", dfg.name()));
        let catalog = Catalog::build(&mut model, dfg, groups, num_parts);
        constraints::add_all(&mut model, dfg, &catalog, params.capacity, params.transaction_limit);
        objective::set_objective(&mut model, dfg, &catalog, params.memory_weight);

        let stats = ModelStats::of(&model, &catalog);
        info!(
            assign_vars = stats.assign_vars,
            presence_vars = stats.presence_vars,
            crossing_vars = stats.crossing_vars,
            rows = stats.constraints()
        );
        Self { num_parts, model, catalog, stats }
    }

    /// Number of partitions of the trial.
    pub fn num_parts(&self) -> usize {
        self.num_parts
    }

    /// The model handed to the solver.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The variable catalog of the model.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Model sizes.
    pub fn stats(&self) -> &ModelStats {
        &self.stats
    }

    /// Consume the trial and return its model.
    pub fn into_model(self) -> Model {
        self.model
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::instances;

    #[test]
    fn model_name_and_stats() {
        let dfg = instances::chain(6);
        let trial = Trial::build(&dfg, &PartitionParams::new(3, 1), 2).unwrap();
        assert_eq!(trial.model().name(), "chain6_2");
        assert_eq!(trial.num_parts(), 2);
        assert_eq!(trial.stats().variables(), trial.model().num_variables());
        assert_eq!(trial.stats().constraints(), trial.model().num_constraints());
        assert_eq!(trial.stats().rows_of(Family::GroupPresence), 0);
    }

    #[test]
    fn label_errors_surface() {
        let mut dfg = Dfg::new("bad");
        dfg.add_node("STR");
        assert!(Trial::build(&dfg, &PartitionParams::new(1, 1), 1).is_err());
    }
}
