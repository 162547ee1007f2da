//! The measure document aggregate
//!
//! Data criteria and population criteria are kept in source order and are
//! indexed by id. References between entities stay as ids and are resolved
//! on demand with [`DocumentModel::resolve`]; [`DocumentModel::validate`]
//! checks every reference of the document at once.

use indexmap::IndexMap;
use indexmap::map::Entry;
use octofhir_hqmf_diagnostics::{Diagnostic, HqmfError, Result};
use std::collections::HashMap;

use crate::data_criteria::{CriteriaType, DataCriteria};
use crate::precondition::PopulationCriteria;
use crate::temporal::Reference;
use crate::value::RangeValue;

/// What a [`Reference`] points at
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedReference<'a> {
    DataCriteria(&'a DataCriteria),
    /// The reserved `MeasurePeriod` id; `None` when the document declares no period
    MeasurePeriod(Option<&'a RangeValue>),
}

impl<'a> ResolvedReference<'a> {
    pub fn as_data_criteria(&self) -> Option<&'a DataCriteria> {
        match self {
            Self::DataCriteria(criteria) => Some(criteria),
            Self::MeasurePeriod(_) => None,
        }
    }
}

/// A quality measure document
#[derive(Debug, PartialEq)]
pub struct DocumentModel {
    id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Reporting period, the target of `MeasurePeriod` references
    pub measure_period: Option<RangeValue>,
    data_criteria: IndexMap<String, DataCriteria>,
    population_criteria: IndexMap<String, PopulationCriteria>,
}

impl DocumentModel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            description: None,
            measure_period: None,
            data_criteria: IndexMap::new(),
            population_criteria: IndexMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Append a data criterion, rejecting an id already in use
    pub fn add_data_criteria(&mut self, criteria: DataCriteria) -> Result<()> {
        match self.data_criteria.entry(criteria.id().to_string()) {
            Entry::Occupied(entry) => Err(HqmfError::DuplicateCriteriaId {
                id: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(criteria);
                Ok(())
            }
        }
    }

    /// Append a population criterion, rejecting a code already in use
    pub fn add_population_criteria(&mut self, population: PopulationCriteria) -> Result<()> {
        match self.population_criteria.entry(population.id().to_string()) {
            Entry::Occupied(entry) => Err(HqmfError::DuplicatePopulationId {
                id: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(population);
                Ok(())
            }
        }
    }

    pub fn data_criteria(&self, id: &str) -> Option<&DataCriteria> {
        self.data_criteria.get(id)
    }

    pub fn data_criteria_mut(&mut self, id: &str) -> Option<&mut DataCriteria> {
        self.data_criteria.get_mut(id)
    }

    /// Every data criterion in document order
    pub fn all_data_criteria(&self) -> impl ExactSizeIterator<Item = &DataCriteria> {
        self.data_criteria.values()
    }

    pub fn population_criteria(&self, code: &str) -> Option<&PopulationCriteria> {
        self.population_criteria.get(code)
    }

    /// Every population criterion in document order
    pub fn all_population_criteria(&self) -> impl ExactSizeIterator<Item = &PopulationCriteria> {
        self.population_criteria.values()
    }

    /// Data criteria of one category, in document order
    pub fn data_criteria_by_type<'a>(
        &'a self,
        criteria_type: &'a CriteriaType,
    ) -> impl Iterator<Item = &'a DataCriteria> {
        self.data_criteria
            .values()
            .filter(move |criteria| criteria.criteria_type.as_ref() == Some(criteria_type))
    }

    /// Resolve a reference made by `referrer`
    ///
    /// A data criterion with the reference's id wins; otherwise the reserved
    /// `MeasurePeriod` id names the measure period.
    pub fn resolve(&self, reference: &Reference, referrer: &str) -> Result<ResolvedReference<'_>> {
        if let Some(criteria) = self.data_criteria.get(&reference.id) {
            return Ok(ResolvedReference::DataCriteria(criteria));
        }
        if reference.is_measure_period() {
            return Ok(ResolvedReference::MeasurePeriod(self.measure_period.as_ref()));
        }
        Err(HqmfError::unresolved(reference.id.as_str(), referrer))
    }

    fn require_criteria(&self, id: &str, referrer: &str) -> Result<()> {
        if self.data_criteria.contains_key(id) {
            Ok(())
        } else {
            Err(HqmfError::unresolved(id, referrer))
        }
    }

    /// Every reference and derivation problem, in document order
    fn problems(&self) -> Vec<HqmfError> {
        let mut problems = Vec::new();

        for criteria in self.data_criteria.values() {
            if let Err(err) = criteria.validate() {
                problems.push(err);
            }
            for temporal in &criteria.temporal_references {
                if let Err(err) = self.resolve(&temporal.reference, criteria.id()) {
                    problems.push(err);
                }
            }
            for child in &criteria.children_criteria {
                if let Err(err) = self.require_criteria(child, criteria.id()) {
                    problems.push(err);
                }
            }
        }

        for population in self.population_criteria.values() {
            for reference in population.root.references() {
                if let Err(err) = self.require_criteria(&reference.id, population.id()) {
                    problems.push(err);
                }
            }
        }

        problems.extend(self.derivation_cycles());
        problems
    }

    /// Criteria closing a cycle through derivation children
    fn derivation_cycles(&self) -> Vec<HqmfError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Visiting,
            Done,
        }

        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut cycles = Vec::new();

        for start in self.data_criteria.keys() {
            if marks.contains_key(start.as_str()) {
                continue;
            }
            marks.insert(start.as_str(), Mark::Visiting);
            let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];

            while let Some(top) = stack.last_mut() {
                let (id, next) = *top;
                let children = self
                    .data_criteria
                    .get(id)
                    .map(|criteria| criteria.children_criteria.as_slice())
                    .unwrap_or_default();

                let Some(child) = children.get(next) else {
                    marks.insert(id, Mark::Done);
                    stack.pop();
                    continue;
                };
                top.1 += 1;

                let child = child.as_str();
                match marks.get(child) {
                    Some(Mark::Visiting) => cycles.push(HqmfError::CircularReference {
                        id: child.to_string(),
                    }),
                    Some(Mark::Done) => {}
                    None if self.data_criteria.contains_key(child) => {
                        marks.insert(child, Mark::Visiting);
                        stack.push((child, 0));
                    }
                    None => {}
                }
            }
        }
        cycles
    }

    /// Check that every reference resolves and no derivation is circular
    ///
    /// All problems are reported together, as `Multiple` when there are
    /// several.
    pub fn validate(&self) -> Result<()> {
        match HqmfError::collect(self.problems()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Validation errors followed by lint warnings
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics: Vec<Diagnostic> =
            self.problems().iter().map(HqmfError::to_diagnostic).collect();
        diagnostics.extend(self.data_criteria.values().flat_map(DataCriteria::lint));
        diagnostics
    }
}
