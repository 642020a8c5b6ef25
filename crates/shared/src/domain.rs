use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new_random() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_newtype!(RecipeId);
id_newtype!(StepId);
id_newtype!(IngredientId);

/// Recipe as exported by the backing store: steps and ingredients carry
/// their ordering keys but arrive in arbitrary order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeRecord {
    pub id: RecipeId,
    pub title: String,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
    #[serde(default)]
    pub ingredients: Vec<IngredientRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: StepId,
    pub step_number: i32,
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_duration: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientRecord {
    pub id: IngredientId,
    pub text: String,
    pub order_index: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub index: usize,
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_duration_seconds: Option<u32>,
}

impl Step {
    pub fn has_timer(&self) -> bool {
        self.timer_duration_seconds.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub text: String,
}

/// Read-only recipe handed to a cooking session. Steps are in cooking order
/// and `steps[i].index == i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub title: String,
    pub steps: Vec<Step>,
    pub ingredients: Vec<Ingredient>,
}

impl Recipe {
    /// Orders steps by `step_number` and ingredients by `order_index`.
    ///
    /// A zero `timer_duration` means the step has no timer.
    pub fn from_record(record: RecipeRecord) -> Self {
        let RecipeRecord {
            id,
            title,
            mut steps,
            mut ingredients,
        } = record;

        steps.sort_by_key(|step| step.step_number);
        ingredients.sort_by_key(|ingredient| ingredient.order_index);

        let steps = steps
            .into_iter()
            .enumerate()
            .map(|(index, step)| Step {
                id: step.id,
                index,
                instruction: step.instruction,
                timer_duration_seconds: step.timer_duration.filter(|seconds| *seconds > 0),
            })
            .collect();

        let ingredients = ingredients
            .into_iter()
            .map(|ingredient| Ingredient {
                id: ingredient.id,
                text: ingredient.text,
            })
            .collect();

        Self {
            id,
            title,
            steps,
            ingredients,
        }
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}
