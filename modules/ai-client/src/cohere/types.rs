use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub(crate) struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    pub generations: Vec<Generation>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Generation {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_without_generations_is_empty() {
        let response: GenerateResponse = serde_json::from_str("{\"id\": \"abc\"}").unwrap();
        assert!(response.generations.is_empty());
    }
}
