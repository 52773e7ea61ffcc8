use serde::{Deserialize, Serialize};

use crate::ai::recognition::RecognizedIngredient;

#[derive(Debug, Serialize)]
pub struct RecognizeResponse {
    pub ingredients: Vec<RecognizedIngredient>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuggestionResponse {
    pub suggestions: Vec<String>,
}
