//! Property tests for precondition tree shape preservation
//!
//! Random trees survive a structural round trip with the same leaf count,
//! depth and conjunction codes in the same positions, both on their own and
//! inside a whole document.

use octofhir_hqmf::{
    ConjunctionCode, DocumentModel, NodePath, PopulationCriteria, Precondition, to_model,
    to_structural,
};
use proptest::prelude::*;

fn precondition() -> impl Strategy<Value = Precondition> {
    let leaf = "[A-Za-z][A-Za-z0-9]{0,11}".prop_map(Precondition::leaf);
    leaf.prop_recursive(6, 96, 5, |inner| {
        (
            prop::sample::select(ConjunctionCode::ALL.to_vec()),
            prop::collection::vec(inner, 1..5),
        )
            .prop_map(|(code, children)| Precondition::conjunction(code, children))
    })
}

/// Conjunction codes in pre-order; `None` marks a leaf
fn shape(tree: &Precondition) -> Vec<Option<ConjunctionCode>> {
    let mut codes = Vec::new();
    let mut stack = vec![tree];
    while let Some(node) = stack.pop() {
        codes.push(node.conjunction_code());
        stack.extend(node.preconditions().iter().rev());
    }
    codes
}

proptest! {
    #[test]
    fn tree_round_trip_preserves_shape(tree in precondition()) {
        let reloaded = Precondition::from_structural(&tree.to_structural(), NodePath::root()).unwrap();

        prop_assert_eq!(reloaded.leaf_count(), tree.leaf_count());
        prop_assert_eq!(reloaded.depth(), tree.depth());
        prop_assert_eq!(shape(&reloaded), shape(&tree));
        prop_assert_eq!(reloaded, tree);
    }

    #[test]
    fn document_round_trip_preserves_populations(
        trees in prop::collection::vec(precondition(), 1..4)
    ) {
        let mut model = DocumentModel::new("generated");
        for (i, tree) in trees.iter().enumerate() {
            model
                .add_population_criteria(PopulationCriteria::new(format!("POP{}", i), tree.clone()))
                .unwrap();
        }

        let reloaded = to_model(&to_structural(&model)).unwrap();
        prop_assert_eq!(reloaded.all_population_criteria().len(), trees.len());
        for (population, tree) in reloaded.all_population_criteria().zip(&trees) {
            prop_assert_eq!(&population.root, tree);
        }
        prop_assert_eq!(reloaded, model);
    }
}
